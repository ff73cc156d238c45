//! USFM parsing: marked-up book files → per-verse records.
//!
//! The parser is a line-oriented state machine over the structural markers
//! (`\id`, `\c`, `\v`) plus the poetry and paragraph markers that shape
//! verse-internal structure (`\q`/`\q1`/`\q2`, `\m`, `\p`, `\d`). Footnotes
//! and inline character styles are folded into the verse text as in-band
//! markers (see `verseweave_shared::markers`), so one flat string per verse
//! survives the CSV round trip to the LaTeX generator.

mod normalize;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use verseweave_shared::markers::{STYLE_HDG, STYLE_PARA, encode_poetry, encode_prose};
use verseweave_shared::{BookText, Result, VerseRef, VerseweaveError};

use normalize::{extract_footnotes, normalize_line};

// ---------------------------------------------------------------------------
// Structural marker patterns
// ---------------------------------------------------------------------------

/// Matches `\c 12`.
static C_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\c\s+(\d+)\s*$").expect("chapter regex"));

/// Matches `\v 7 text…` with an optional split suffix (`\v 7a text…`).
static V_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\v\s+(\d+)([a-z]?)\s+(.*)$").expect("verse regex"));

/// Matches `\q text`, `\q1 text`, `\q2 text`, ….
static Q_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\\q(\d*)\s+(.*)$").expect("poetry regex"));

/// Matches `\m text` (flush-left poetry continuation).
static M_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\\m\s+(.*)$").expect("m regex"));

/// Matches `\p text` (prose paragraph with inline content).
static P_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\\p\s+(.*)$").expect("p regex"));

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse one USFM book into verse records keyed by [`VerseRef`].
///
/// Captures `\c`/`\v` boundaries, extracts footnote blocks, encodes poetry
/// and paragraph structure into the verse strings, and normalizes inline
/// markup. A `\d` (descriptive heading) or bare `\p` line styles the verse
/// that immediately follows it.
#[instrument(skip_all)]
pub fn parse_book(content: &str) -> Result<BookText> {
    let mut book: Option<String> = None;
    let mut chapter: Option<u32> = None;
    let mut current: Option<VerseRef> = None;
    let mut chunks: Vec<String> = Vec::new();
    let mut verses = std::collections::BTreeMap::new();
    let mut after_d = false;
    let mut after_p = false;

    fn flush(
        verses: &mut std::collections::BTreeMap<VerseRef, String>,
        current: &mut Option<VerseRef>,
        chunks: &mut Vec<String>,
    ) {
        if let Some(key) = current.take() {
            verses.insert(key, chunks.join(" ").trim().to_string());
        }
        chunks.clear();
    }

    for raw in content.lines() {
        let line = raw.trim_end_matches('\n');

        // Book id
        if let Some(rest) = line.strip_prefix("\\id ") {
            if let Some(code) = rest.split_whitespace().next() {
                book = Some(code.to_uppercase());
            }
            continue;
        }

        let s = line.trim();

        // Descriptive heading: styles the next verse
        if s == "\\d" || s.starts_with("\\d ") {
            after_d = true;
            continue;
        }
        // Bare paragraph marker: the next verse opens a paragraph
        if s == "\\p" {
            after_p = true;
            continue;
        }

        // Chapter marker
        if let Some(caps) = C_RE.captures(s) {
            flush(&mut verses, &mut current, &mut chunks);
            chapter = Some(
                caps[1]
                    .parse()
                    .map_err(|_| VerseweaveError::usfm(format!("bad chapter number in {s:?}")))?,
            );
            continue;
        }

        // Verse marker
        if let Some(caps) = V_RE.captures(s) {
            if let Some(ch) = chapter {
                flush(&mut verses, &mut current, &mut chunks);

                let vnum: u32 = caps[1]
                    .parse()
                    .map_err(|_| VerseweaveError::usfm(format!("bad verse number in {s:?}")))?;
                let suffix = caps[2].chars().next().map(|c| c.to_ascii_lowercase());
                current = Some(VerseRef {
                    chapter: ch,
                    verse: vnum,
                    suffix,
                });

                let is_heading = std::mem::take(&mut after_d);
                let is_para = std::mem::take(&mut after_p);

                let mut t = normalize_line(&extract_footnotes(&caps[3]));
                if !t.is_empty() {
                    if is_heading {
                        t = format!("{STYLE_HDG}{t}");
                    }
                    if is_para {
                        t = format!("{STYLE_PARA}{t}");
                    }
                    chunks.push(encode_prose(&t));
                }
                continue;
            }
        }

        // Continuation lines within a verse
        if current.is_some() && !s.is_empty() {
            // Poetry line
            if let Some(caps) = Q_RE.captures(s) {
                let level: u32 = if caps[1].is_empty() {
                    1
                } else {
                    caps[1].parse().unwrap_or(1)
                };
                let t = normalize_line(&extract_footnotes(&caps[2]));
                if !t.is_empty() {
                    chunks.push(encode_poetry(level, &t));
                }
                continue;
            }

            // Flush-left poetry paragraph
            if let Some(caps) = M_RE.captures(s) {
                let t = normalize_line(&extract_footnotes(&caps[1]));
                if !t.is_empty() {
                    chunks.push(encode_poetry(1, &t));
                }
                continue;
            }

            // Prose paragraph with inline content
            if let Some(caps) = P_RE.captures(s) {
                let t = normalize_line(&extract_footnotes(&caps[1]));
                if !t.is_empty() {
                    chunks.push(encode_prose(&format!("{STYLE_PARA}{t}")));
                }
                continue;
            }

            // Default: prose continuation
            let t = normalize_line(&extract_footnotes(s));
            if !t.is_empty() {
                chunks.push(encode_prose(&t));
            }
        }
    }

    flush(&mut verses, &mut current, &mut chunks);

    if verses.is_empty() {
        return Err(VerseweaveError::usfm(
            "no verses found — is this a USFM book file?",
        ));
    }

    debug!(
        book = book.as_deref().unwrap_or(""),
        verses = verses.len(),
        "parsed USFM book"
    );

    Ok(BookText {
        book: book.unwrap_or_default(),
        verses,
    })
}

// ---------------------------------------------------------------------------
// Book file location
// ---------------------------------------------------------------------------

/// Find the USFM file for `book_id` under `folder`.
///
/// Prefers a file whose content opens with `\id <book_id>`; falls back to
/// the first file whose name contains the book code. Search order is
/// path-sorted so repeated runs pick the same file.
pub fn find_book_file(folder: &Path, book_id: &str) -> Result<PathBuf> {
    let mut candidates = Vec::new();
    collect_usfm_files(folder, &mut candidates)?;
    candidates.sort();

    for path in &candidates {
        if let Ok(text) = std::fs::read_to_string(path) {
            if text.starts_with(&format!("\\id {book_id}")) {
                return Ok(path.clone());
            }
        }
    }

    for path in &candidates {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if name.to_uppercase().contains(&book_id.to_uppercase()) {
                return Ok(path.clone());
            }
        }
    }

    Err(VerseweaveError::validation(format!(
        "could not find {book_id} under {}",
        folder.display()
    )))
}

/// Find the staged source folder for a label under `build/usfm/`.
///
/// Matches any directory whose name contains the label (case-insensitive),
/// the way archive stems usually embed the source name.
pub fn find_source_dir(usfm_root: &Path, label: &str) -> Result<PathBuf> {
    let entries = std::fs::read_dir(usfm_root).map_err(|e| VerseweaveError::io(usfm_root, e))?;

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    if dirs.is_empty() {
        return Err(VerseweaveError::validation(format!(
            "no unpacked USFM folders under {} — run the unpack stage first",
            usfm_root.display()
        )));
    }

    let needle = label.to_lowercase();
    dirs.iter()
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.to_lowercase().contains(&needle))
        })
        .cloned()
        .ok_or_else(|| {
            VerseweaveError::validation(format!(
                "no folder under {} matches source '{label}'",
                usfm_root.display()
            ))
        })
}

fn collect_usfm_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| VerseweaveError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| VerseweaveError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            collect_usfm_files(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("usfm"))
        {
            out.push(path);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use verseweave_shared::markers::{FOOTNOTE_DELIM, STRUCT_DELIM};

    const SAMPLE: &str = "\\id JER World English Bible\n\
\\h Jeremiah\n\
\\c 1\n\
\\p\n\
\\v 1 The words of Jeremiah the son of Hilkiah.\n\
\\v 2 Yahweh\u{2019}s word came to him.\n\
\\q1 This is a poetry line,\n\
\\q2 and an indented one.\n\
\\c 2\n\
\\v 1 Another chapter begins here.\n";

    #[test]
    fn parses_chapters_and_verses() {
        let text = parse_book(SAMPLE).unwrap();
        assert_eq!(text.book, "JER");
        assert_eq!(text.verses.len(), 3);

        let v11 = text.get(&"1:1".parse().unwrap()).unwrap();
        assert!(v11.contains("The words of Jeremiah"));
        // \p before \v 1 marks the paragraph start
        assert!(v11.contains("STYLE:PARA"));

        let v21 = text.get(&"2:1".parse().unwrap()).unwrap();
        assert!(v21.contains("Another chapter begins"));
    }

    #[test]
    fn poetry_lines_encode_indent_levels() {
        let text = parse_book(SAMPLE).unwrap();
        let v12 = text.get(&"1:2".parse().unwrap()).unwrap();
        assert!(v12.contains(&format!("{STRUCT_DELIM}Q:1{STRUCT_DELIM}This is a poetry line")));
        assert!(v12.contains(&format!("{STRUCT_DELIM}Q:2{STRUCT_DELIM}and an indented one")));
    }

    #[test]
    fn verse_suffixes_are_captured() {
        let usfm = "\\id JER\n\\c 24\n\\v 40a First half.\n\\v 40b Second half.\n";
        let text = parse_book(usfm).unwrap();
        assert!(text.get(&"24:40a".parse().unwrap()).is_some());
        assert!(text.get(&"24:40b".parse().unwrap()).is_some());
        assert!(text.get(&"24:40".parse().unwrap()).is_none());
    }

    #[test]
    fn heading_context_styles_next_verse_only() {
        let usfm = "\\id JER\n\\c 3\n\\d\n\\v 1 A heading-styled verse.\n\\v 2 A plain verse.\n";
        let text = parse_book(usfm).unwrap();
        assert!(text.get(&"3:1".parse().unwrap()).unwrap().contains("STYLE:HDG"));
        assert!(!text.get(&"3:2".parse().unwrap()).unwrap().contains("STYLE:HDG"));
    }

    #[test]
    fn footnotes_survive_as_markers() {
        let usfm = "\\id JER\n\\c 1\n\\v 5 Before I formed you \\f + \\fr 1:5 \\ft Or, chose you.\\f* I knew you.\n";
        let text = parse_book(usfm).unwrap();
        let v = text.get(&"1:5".parse().unwrap()).unwrap();
        assert!(v.contains(&format!("{FOOTNOTE_DELIM}1:5: Or, chose you.{FOOTNOTE_DELIM}")));
        assert!(v.contains("I knew you"));
    }

    #[test]
    fn continuation_prose_joins_verse() {
        let usfm = "\\id JER\n\\c 1\n\\v 3 It came also\nin the days of Jehoiakim.\n";
        let text = parse_book(usfm).unwrap();
        let v = text.get(&"1:3".parse().unwrap()).unwrap();
        assert!(v.contains("It came also"));
        assert!(v.contains("in the days of Jehoiakim"));
    }

    #[test]
    fn verse_before_chapter_is_ignored() {
        let usfm = "\\id JER\n\\v 1 Stray verse.\n\\c 1\n\\v 1 Real verse.\n";
        let text = parse_book(usfm).unwrap();
        assert_eq!(text.verses.len(), 1);
        assert!(text.get(&"1:1".parse().unwrap()).unwrap().contains("Real verse"));
    }

    #[test]
    fn non_usfm_content_fails() {
        assert!(parse_book("just some text\nwith no markers\n").is_err());
    }

    #[test]
    fn find_book_file_prefers_id_header() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("aaa.usfm"), "\\id GEN\n\\c 1\n\\v 1 x\n").unwrap();
        std::fs::write(
            dir.path().join("nested/bbb.usfm"),
            "\\id JER\n\\c 1\n\\v 1 y\n",
        )
        .unwrap();

        let found = find_book_file(dir.path(), "JER").unwrap();
        assert!(found.ends_with("nested/bbb.usfm"));
    }

    #[test]
    fn find_book_file_falls_back_to_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("25-JEReng.usfm"), "no id header\n").unwrap();

        let found = find_book_file(dir.path(), "JER").unwrap();
        assert!(found.ends_with("25-JEReng.usfm"));
    }

    #[test]
    fn find_source_dir_matches_label_substring() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("engwebp_usfm")).unwrap();
        std::fs::create_dir_all(dir.path().join("eng-Prideaux_usfm")).unwrap();

        let found = find_source_dir(dir.path(), "prideaux").unwrap();
        assert!(found.ends_with("eng-Prideaux_usfm"));

        assert!(find_source_dir(dir.path(), "brenton").is_err());
    }
}
