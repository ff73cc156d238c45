//! Inline cleanup passes for USFM verse text.
//!
//! Each pass is a function `&str -> String` applied in sequence. The passes
//! extract footnote blocks into in-band markers, translate inline character
//! styles, strip leftover markup, and normalize spacing and punctuation.
//! Footnote extraction must run before the inline passes — footnote bodies
//! contain backslash markers the inline passes would mangle.

use std::sync::LazyLock;

use regex::Regex;

use verseweave_shared::markers::{
    ADD_CLOSE, ADD_OPEN, FOOTNOTE_DELIM, SC_CLOSE, SC_OPEN, SUP_CLOSE, SUP_OPEN,
};

/// Run the full inline pipeline on a verse-text fragment.
///
/// Footnotes should already be extracted via [`extract_footnotes`].
pub(crate) fn normalize_line(line: &str) -> String {
    let mut result = line.to_string();

    result = normalize_nbsp(&result);
    result = translate_character_styles(&result);
    result = strip_pipe_attributes(&result);
    result = strip_stray_stars(&result);
    result = strip_inline_markers(&result);
    result = collapse_whitespace(&result);
    result = fix_apostrophes(&result);
    result = fix_quote_spacing(&result);
    result = fix_punctuation_spacing(&result);

    result
}

// ---------------------------------------------------------------------------
// Footnote extraction
// ---------------------------------------------------------------------------

/// Matches a whole footnote block: `\f + \fr 1:2 \ft Note text \f*`.
static FOOTNOTE_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\\f\b.*?\\f\*").expect("footnote block regex"));

/// Matches the `\fr` origin reference inside a footnote block.
static FR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\fr\b\s*([^\\]+)").expect("fr regex"));

/// Matches one `\ft` text run inside a footnote block.
static FT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\ft\b\s*([^\\]+)").expect("ft regex"));

/// Matches nested character-style runs like `\+wh` / `\+wh*`.
///
/// These contain backslashes and would truncate the `\ft` capture
/// unless removed first.
static PLUS_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\+[A-Za-z]+[* ]?").expect("plus mark regex"));

/// Replace USFM footnote blocks with in-band [`FOOTNOTE_DELIM`] markers.
///
/// Turns `… \f + \fr 1:2 \ft Note text\f* …` into
/// `… ␞FOOTNOTE␞1:2: Note text␞FOOTNOTE␞ …`. Multiple `\ft` runs are
/// concatenated; an `\fr` reference prefixes the note; empty footnote
/// blocks are deleted.
pub(crate) fn extract_footnotes(raw: &str) -> String {
    FOOTNOTE_BLOCK_RE
        .replace_all(raw, |caps: &regex::Captures| {
            let block = PLUS_MARK_RE.replace_all(&caps[0], "");

            let fr = FR_RE
                .captures(&block)
                .map(|c| c[1].trim().to_string())
                .unwrap_or_default();

            let ft = FT_RE
                .captures_iter(&block)
                .map(|c| c[1].trim().to_string())
                .collect::<Vec<_>>()
                .join(" ")
                .trim()
                .to_string();

            if ft.is_empty() {
                // Delete empty footnote blocks
                return " ".to_string();
            }

            let note = if fr.is_empty() {
                ft
            } else {
                format!("{fr}: {ft}")
            };

            format!("{FOOTNOTE_DELIM}{note}{FOOTNOTE_DELIM} ")
        })
        .to_string()
}

// ---------------------------------------------------------------------------
// Pass 1: Normalize non-breaking spaces
// ---------------------------------------------------------------------------

fn normalize_nbsp(line: &str) -> String {
    line.replace('\u{00A0}', " ")
}

// ---------------------------------------------------------------------------
// Pass 2: Translate inline character styles to in-band markers
// ---------------------------------------------------------------------------

/// Map `\add`, `\sc`, and `\sup` (and their closers) to in-band markers the
/// LaTeX generator turns back into styled text. Closers first — `\add*`
/// contains `\add `'s prefix.
fn translate_character_styles(line: &str) -> String {
    line.replace("\\add*", ADD_CLOSE)
        .replace("\\add ", ADD_OPEN)
        .replace("\\sc*", SC_CLOSE)
        .replace("\\sc ", SC_OPEN)
        .replace("\\sup*", SUP_CLOSE)
        .replace("\\sup ", SUP_OPEN)
}

// ---------------------------------------------------------------------------
// Pass 3: Remove pipe attributes (Strong's numbers, lemmas, etc.)
// ---------------------------------------------------------------------------

static PIPE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\|[A-Za-z]+="[^"]*""#).expect("pipe attr regex"));

fn strip_pipe_attributes(line: &str) -> String {
    PIPE_ATTR_RE.replace_all(line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Remove stray star markers (some editions)
// ---------------------------------------------------------------------------

static STAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*+").expect("star regex"));

fn strip_stray_stars(line: &str) -> String {
    STAR_RE.replace_all(line, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 5: Strip remaining inline USFM markers
// ---------------------------------------------------------------------------

/// Matches `\w`, `\w*`, `\wj`, `\qs1`, etc. Replaced with a space to
/// preserve word breaks.
static USFM_MARK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[A-Za-z]+\d*\*?").expect("inline marker regex"));

fn strip_inline_markers(line: &str) -> String {
    let line = USFM_MARK_RE.replace_all(line, " ");
    // Stray pipes left over from attribute syntax
    line.replace('|', " ")
}

// ---------------------------------------------------------------------------
// Pass 6: Collapse whitespace
// ---------------------------------------------------------------------------

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("ws regex"));

fn collapse_whitespace(line: &str) -> String {
    WS_RE.replace_all(line, " ").trim().to_string()
}

// ---------------------------------------------------------------------------
// Pass 7: Rejoin contractions and possessives
// ---------------------------------------------------------------------------

/// `don ' t` → `don't`, `Yahweh ’s` → `Yahweh’s`.
static APOSTROPHE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)\s*([’'])\s*(\w)").expect("apostrophe regex"));

fn fix_apostrophes(line: &str) -> String {
    // Two passes: the first consumes the trailing word character, so
    // back-to-back contractions need a second sweep.
    let once = APOSTROPHE_RE.replace_all(line, "$1$2$3").to_string();
    APOSTROPHE_RE.replace_all(&once, "$1$2$3").to_string()
}

// ---------------------------------------------------------------------------
// Pass 8: Quote spacing
// ---------------------------------------------------------------------------

/// `‘ I` → `‘I` (no space after an opening quote).
static OPEN_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([‘“'"])\s+(\w)"#).expect("open quote regex"));

/// `”for` → `” for` (space after a closing double quote before a word).
static CLOSE_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([”"])(\w)"#).expect("close quote regex"));

fn fix_quote_spacing(line: &str) -> String {
    let line = OPEN_QUOTE_RE.replace_all(line, "$1$2");
    CLOSE_QUOTE_RE.replace_all(&line, "$1 $2").to_string()
}

// ---------------------------------------------------------------------------
// Pass 9: Punctuation spacing
// ---------------------------------------------------------------------------

/// `;’for` → `;’ for` (closing single quote after punctuation, before a word).
static PUNCT_QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([,.;:!?])([’'])(\w)").expect("punct quote regex"));

/// `word ,` → `word,` (no space before closing punctuation).
static SPACE_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([,.;:!?])").expect("space punct regex"));

fn fix_punctuation_spacing(line: &str) -> String {
    let line = PUNCT_QUOTE_RE.replace_all(line, "$1$2 $3");
    SPACE_PUNCT_RE.replace_all(&line, "$1").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
