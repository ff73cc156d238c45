//! The alignment join: two parsed record sets + the mapping table → one
//! aligned row per mapping entry.
//!
//! The mapping table is ground truth. There is no fuzzy matching, scoring,
//! or heuristic reconciliation here — just a deterministic lookup join, with
//! the one hard rule that a non-blank reference which fails to resolve
//! aborts the build instead of silently emitting a blank cell.

pub mod mapping;

use tracing::{info, instrument, warn};

use verseweave_shared::{AlignedRow, BookText, MappingEntry, Result, VerseweaveError};

pub use mapping::{load_mapping, skeleton_csv, write_skeleton};

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Join the two traditions through the mapping table.
///
/// Produces exactly one [`AlignedRow`] per mapping entry, in mapping-table
/// order (the Septuagint sequence). A blank mapping cell yields an absent
/// side; a non-blank reference that does not resolve in its tradition's
/// record set is an error naming the offending mapping row.
#[instrument(skip_all, fields(entries = mapping.len()))]
pub fn align(lxx: &BookText, mt: &BookText, mapping: &[MappingEntry]) -> Result<Vec<AlignedRow>> {
    let mut rows = Vec::with_capacity(mapping.len());

    for entry in mapping {
        let lxx_text = match &entry.lxx {
            None => None,
            Some(r) => Some(
                lxx.get(r)
                    .ok_or_else(|| VerseweaveError::UnresolvedRef {
                        tradition: "lxx".into(),
                        reference: r.to_string(),
                        row: entry.row,
                    })?
                    .to_string(),
            ),
        };

        let mt_text = match &entry.mt {
            None => None,
            Some(span) => {
                let mut parts = Vec::new();
                for r in span.refs() {
                    let text = mt.get(&r).ok_or_else(|| VerseweaveError::UnresolvedRef {
                        tradition: "mt".into(),
                        reference: r.to_string(),
                        row: entry.row,
                    })?;
                    parts.push(text);
                }
                Some(parts.join(" ").trim().to_string())
            }
        };

        if lxx_text.as_deref() == Some("") || mt_text.as_deref() == Some("") {
            warn!(row = entry.row, "mapped verse resolved to empty text");
        }

        rows.push(AlignedRow {
            lxx_ref: entry.lxx,
            mt_ref: entry.mt,
            lxx_text,
            mt_text,
        });
    }

    info!(rows = rows.len(), "alignment join complete");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Parallel table serialization
// ---------------------------------------------------------------------------

/// Header row of the parallel CSV.
const PARALLEL_HEADERS: [&str; 6] = [
    "lxx_ref",
    "lxx_text",
    "mt_ref",
    "mt_text",
    "lxx_present",
    "mt_present",
];

/// Render aligned rows as the parallel CSV.
///
/// Absent sides carry `absence_marker` in both the ref and text columns,
/// plus a `false` presence flag, so downstream consumers never need to
/// guess what an empty cell means.
pub fn to_parallel_csv(rows: &[AlignedRow], absence_marker: &str) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(PARALLEL_HEADERS)
        .map_err(|e| VerseweaveError::Csv(e.to_string()))?;

    for row in rows {
        let lxx_ref = row
            .lxx_ref
            .map_or_else(|| absence_marker.to_string(), |r| r.to_string());
        let mt_ref = row
            .mt_ref
            .map_or_else(|| absence_marker.to_string(), |s| s.to_string());
        let lxx_text = row.lxx_text.clone().unwrap_or_else(|| absence_marker.into());
        let mt_text = row.mt_text.clone().unwrap_or_else(|| absence_marker.into());

        writer
            .write_record([
                lxx_ref.as_str(),
                lxx_text.as_str(),
                mt_ref.as_str(),
                mt_text.as_str(),
                if row.lxx_present() { "true" } else { "false" },
                if row.mt_present() { "true" } else { "false" },
            ])
            .map_err(|e| VerseweaveError::Csv(e.to_string()))?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| VerseweaveError::Csv(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| VerseweaveError::Csv(e.to_string()))
}

/// Parse a parallel CSV back into aligned rows (the LaTeX stage's input).
pub fn parse_parallel_csv(content: &str) -> Result<Vec<AlignedRow>> {
    let mut reader = csv::Reader::from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| VerseweaveError::Csv(e.to_string()))?
        .clone();
    for required in PARALLEL_HEADERS {
        if !headers.iter().any(|h| h == required) {
            return Err(VerseweaveError::Csv(format!(
                "parallel table missing column {required}"
            )));
        }
    }
    let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
    let (c_lref, c_ltxt, c_mref, c_mtxt, c_lp, c_mp) = (
        col("lxx_ref"),
        col("lxx_text"),
        col("mt_ref"),
        col("mt_text"),
        col("lxx_present"),
        col("mt_present"),
    );

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let row = i + 2;
        let record = record.map_err(|e| VerseweaveError::Csv(format!("row {row}: {e}")))?;
        let field = |c: usize| record.get(c).unwrap_or("").to_string();

        let lxx_present = field(c_lp) == "true";
        let mt_present = field(c_mp) == "true";

        let lxx_ref = if lxx_present {
            Some(field(c_lref).parse().map_err(|e| {
                VerseweaveError::Csv(format!("row {row}, lxx_ref: {e}"))
            })?)
        } else {
            None
        };
        let mt_ref = if mt_present {
            Some(field(c_mref).parse().map_err(|e| {
                VerseweaveError::Csv(format!("row {row}, mt_ref: {e}"))
            })?)
        } else {
            None
        };

        rows.push(AlignedRow {
            lxx_ref,
            mt_ref,
            lxx_text: lxx_present.then(|| field(c_ltxt)),
            mt_text: mt_present.then(|| field(c_mtxt)),
        });
    }

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use verseweave_shared::{VerseRef, VerseSpan};

    fn book(entries: &[(&str, &str)]) -> BookText {
        let mut b = BookText::new("JER");
        for (r, t) in entries {
            b.verses.insert(r.parse().unwrap(), t.to_string());
        }
        b
    }

    fn entry(lxx: Option<&str>, mt: Option<&str>, row: usize) -> MappingEntry {
        MappingEntry {
            lxx: lxx.map(|s| s.parse().unwrap()),
            mt: mt.map(|s| s.parse().unwrap()),
            row,
        }
    }

    fn sample_inputs() -> (BookText, BookText, Vec<MappingEntry>) {
        let lxx = book(&[
            ("1:1", "LXX one one"),
            ("1:2", "LXX one two"),
            ("25:14", "LXX twenty-five fourteen"),
        ]);
        let mt = book(&[
            ("1:1", "MT one one"),
            ("49:34", "MT forty-nine thirty-four"),
            ("49:35", "MT forty-nine thirty-five"),
            ("33:14", "MT thirty-three fourteen"),
        ]);
        let mapping = vec![
            entry(Some("1:1"), Some("1:1"), 2),
            entry(Some("1:2"), None, 3),
            entry(Some("25:14"), Some("49:34-49:35"), 4),
            entry(None, Some("33:14"), 5),
        ];
        (lxx, mt, mapping)
    }

    #[test]
    fn row_count_equals_mapping_entry_count() {
        let (lxx, mt, mapping) = sample_inputs();
        let rows = align(&lxx, &mt, &mapping).unwrap();
        assert_eq!(rows.len(), mapping.len());
    }

    #[test]
    fn both_present_rows_carry_both_texts() {
        let (lxx, mt, mapping) = sample_inputs();
        let rows = align(&lxx, &mt, &mapping).unwrap();

        assert_eq!(rows[0].lxx_text.as_deref(), Some("LXX one one"));
        assert_eq!(rows[0].mt_text.as_deref(), Some("MT one one"));
        assert!(rows[0].lxx_present() && rows[0].mt_present());
    }

    #[test]
    fn absent_side_is_none_and_other_side_populated() {
        let (lxx, mt, mapping) = sample_inputs();
        let rows = align(&lxx, &mt, &mapping).unwrap();

        // LXX-only passage
        assert!(rows[1].lxx_present() && !rows[1].mt_present());
        assert_eq!(rows[1].mt_text, None);
        assert_eq!(rows[1].lxx_text.as_deref(), Some("LXX one two"));

        // MT-only passage
        assert!(!rows[3].lxx_present() && rows[3].mt_present());
        assert_eq!(rows[3].lxx_text, None);
        assert_eq!(rows[3].mt_text.as_deref(), Some("MT thirty-three fourteen"));
    }

    #[test]
    fn range_spans_concatenate_in_order() {
        let (lxx, mt, mapping) = sample_inputs();
        let rows = align(&lxx, &mt, &mapping).unwrap();
        assert_eq!(
            rows[2].mt_text.as_deref(),
            Some("MT forty-nine thirty-four MT forty-nine thirty-five")
        );
    }

    #[test]
    fn unresolved_lxx_ref_fails_loudly() {
        let (lxx, mt, _) = sample_inputs();
        let mapping = vec![entry(Some("99:1"), Some("1:1"), 7)];
        let err = align(&lxx, &mt, &mapping).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("99:1"));
        assert!(msg.contains("row 7"));
        assert!(msg.contains("lxx"));
    }

    #[test]
    fn unresolved_verse_inside_range_fails_loudly() {
        let (lxx, mt, _) = sample_inputs();
        // 49:36 does not exist in the MT record set
        let mapping = vec![entry(Some("25:14"), Some("49:34-49:36"), 9)];
        let err = align(&lxx, &mt, &mapping).unwrap_err();
        assert!(err.to_string().contains("49:36"));
    }

    #[test]
    fn join_is_deterministic() {
        let (lxx, mt, mapping) = sample_inputs();
        let a = align(&lxx, &mt, &mapping).unwrap();
        let b = align(&lxx, &mt, &mapping).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parallel_csv_roundtrip() {
        let (lxx, mt, mapping) = sample_inputs();
        let rows = align(&lxx, &mt, &mapping).unwrap();

        let csv = to_parallel_csv(&rows, "\u{2014}").unwrap();
        let parsed = parse_parallel_csv(&csv).unwrap();
        assert_eq!(parsed, rows);

        // Byte-identical on re-serialization
        assert_eq!(csv, to_parallel_csv(&parsed, "\u{2014}").unwrap());
    }

    #[test]
    fn absence_marker_fills_absent_columns() {
        let rows = vec![AlignedRow {
            lxx_ref: Some(VerseRef::new(1, 2)),
            mt_ref: None,
            lxx_text: Some("LXX one two".into()),
            mt_text: None,
        }];
        let csv = to_parallel_csv(&rows, "\u{2014}").unwrap();
        let data_line = csv.lines().nth(1).unwrap();
        assert_eq!(data_line, "1:2,LXX one two,\u{2014},\u{2014},true,false");
    }

    #[test]
    fn parallel_csv_rejects_missing_columns() {
        assert!(parse_parallel_csv("lxx_ref,mt_ref\n1:1,1:1\n").is_err());
    }

    #[test]
    fn mapping_entry_with_span_display() {
        let e = entry(Some("25:14"), Some("49:34-49:35"), 2);
        assert_eq!(
            e.mt,
            Some(VerseSpan::Range(VerseRef::new(49, 34), VerseRef::new(49, 35)))
        );
    }
}
