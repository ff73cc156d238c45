//! Mapping-table I/O.
//!
//! The mapping table is a hand-curated CSV (`lxx_ref,mt_ref`) correlating
//! verse addresses across the two traditions. A blank cell records
//! structural absence. The skeleton writer bootstraps curation with one
//! identity row per verse of a chosen source.

use std::path::Path;

use tracing::{info, instrument};

use verseweave_shared::{BookText, MappingEntry, Result, VerseweaveError};

/// Load and validate the mapping table.
///
/// Every non-blank cell must parse as a verse reference (LXX side) or a
/// reference span (MT side); rows with both sides blank are curation errors.
/// Entries come back in file order, which is the authoritative output order
/// for the parallel table.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_mapping(path: &Path) -> Result<Vec<MappingEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| VerseweaveError::Csv(format!("{}: {e}", path.display())))?;

    let headers = reader
        .headers()
        .map_err(|e| VerseweaveError::Csv(format!("{}: {e}", path.display())))?;
    let lxx_col = headers.iter().position(|h| h == "lxx_ref").ok_or_else(|| {
        VerseweaveError::mapping(format!("{}: missing lxx_ref column", path.display()))
    })?;
    let mt_col = headers.iter().position(|h| h == "mt_ref").ok_or_else(|| {
        VerseweaveError::mapping(format!("{}: missing mt_ref column", path.display()))
    })?;

    let mut entries = Vec::new();

    for (i, record) in reader.records().enumerate() {
        // +2: 1-based, after the header line
        let row = i + 2;
        let record =
            record.map_err(|e| VerseweaveError::Csv(format!("{} row {row}: {e}", path.display())))?;

        let lxx_cell = record.get(lxx_col).unwrap_or("").trim();
        let mt_cell = record.get(mt_col).unwrap_or("").trim();

        let lxx = if lxx_cell.is_empty() {
            None
        } else {
            Some(lxx_cell.parse().map_err(|e| {
                VerseweaveError::mapping(format!("row {row}, lxx_ref: {e}"))
            })?)
        };

        let mt = if mt_cell.is_empty() {
            None
        } else {
            Some(mt_cell.parse().map_err(|e| {
                VerseweaveError::mapping(format!("row {row}, mt_ref: {e}"))
            })?)
        };

        if lxx.is_none() && mt.is_none() {
            return Err(VerseweaveError::mapping(format!(
                "row {row}: both sides blank"
            )));
        }

        entries.push(MappingEntry { lxx, mt, row });
    }

    if entries.is_empty() {
        return Err(VerseweaveError::mapping(format!(
            "{}: no mapping entries",
            path.display()
        )));
    }

    info!(entries = entries.len(), "loaded mapping table");
    Ok(entries)
}

/// Render the identity mapping skeleton for a source's verse list.
///
/// One `lxx_ref == mt_ref` row per verse, in verse order — the starting
/// point for hand curation.
pub fn skeleton_csv(book: &BookText) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["lxx_ref", "mt_ref"])
        .map_err(|e| VerseweaveError::Csv(e.to_string()))?;

    for r in book.verses.keys() {
        let s = r.to_string();
        writer
            .write_record([&s, &s])
            .map_err(|e| VerseweaveError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| VerseweaveError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| VerseweaveError::Csv(e.to_string()))
}

/// Write the mapping skeleton to disk.
///
/// The table is hand-curated after generation, so an existing file is never
/// overwritten unless `force` is set.
#[instrument(skip(book), fields(path = %path.display()))]
pub fn write_skeleton(book: &BookText, path: &Path, force: bool) -> Result<usize> {
    if path.exists() && !force {
        return Err(VerseweaveError::mapping(format!(
            "{} already exists — it may contain hand curation; pass --force to overwrite",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| VerseweaveError::io(parent, e))?;
    }

    let csv = skeleton_csv(book)?;
    std::fs::write(path, &csv).map_err(|e| VerseweaveError::io(path, e))?;

    let rows = book.verses.len();
    info!(rows, "wrote mapping skeleton");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use verseweave_shared::{VerseRef, VerseSpan};

    fn small_book() -> BookText {
        let mut book = BookText::new("JER");
        for (r, t) in [("1:1", "alpha"), ("1:2", "beta"), ("2:1", "gamma")] {
            book.verses.insert(r.parse().unwrap(), t.into());
        }
        book
    }

    #[test]
    fn skeleton_is_identity_in_verse_order() {
        let csv = skeleton_csv(&small_book()).unwrap();
        assert_eq!(csv, "lxx_ref,mt_ref\n1:1,1:1\n1:2,1:2\n2:1,2:1\n");
    }

    #[test]
    fn skeleton_refuses_to_clobber_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        std::fs::write(&path, "lxx_ref,mt_ref\n1:1,2:2\n").unwrap();

        let err = write_skeleton(&small_book(), &path, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
        // Hand curation untouched
        assert!(std::fs::read_to_string(&path).unwrap().contains("2:2"));

        write_skeleton(&small_book(), &path, true).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("1:1,1:1"));
    }

    #[test]
    fn load_mapping_parses_rows_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.csv");
        std::fs::write(
            &path,
            "lxx_ref,mt_ref\n25:14,49:34\n25:15,49:35-49:37\n26:1,\n,33:14\n",
        )
        .unwrap();

        let entries = load_mapping(&path).unwrap();
        assert_eq!(entries.len(), 4);

        assert_eq!(entries[0].lxx, Some(VerseRef::new(25, 14)));
        assert_eq!(
            entries[0].mt,
            Some(VerseSpan::Single(VerseRef::new(49, 34)))
        );
        assert_eq!(
            entries[1].mt,
            Some(VerseSpan::Range(
                VerseRef::new(49, 35),
                VerseRef::new(49, 37)
            ))
        );
        // LXX-only passage
        assert_eq!(entries[2].mt, None);
        // MT-only passage
        assert_eq!(entries[3].lxx, None);
        assert_eq!(entries[3].row, 5);
    }

    #[test]
    fn load_mapping_rejects_blank_rows_and_bad_refs() {
        let dir = tempfile::tempdir().unwrap();

        let blank = dir.path().join("blank.csv");
        std::fs::write(&blank, "lxx_ref,mt_ref\n1:1,1:1\n,\n").unwrap();
        let err = load_mapping(&blank).unwrap_err();
        assert!(err.to_string().contains("row 3"));

        let bad = dir.path().join("bad.csv");
        std::fs::write(&bad, "lxx_ref,mt_ref\nnot-a-ref,1:1\n").unwrap();
        let err = load_mapping(&bad).unwrap_err();
        assert!(err.to_string().contains("row 2"));
    }

    #[test]
    fn load_mapping_requires_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noheader.csv");
        std::fs::write(&path, "a,b\n1:1,1:1\n").unwrap();
        assert!(load_mapping(&path).is_err());
    }
}
