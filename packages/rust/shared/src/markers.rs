//! In-band structure markers shared by the USFM parser and LaTeX generator.
//!
//! Verse text travels through the pipeline as a flat string with U+241E
//! (symbol for record separator) delimited tokens encoding structure the
//! flat CSV would otherwise lose: poetry lines, paragraph breaks, footnotes,
//! and inline character styles. The delimiter is vanishingly unlikely to
//! occur in source text.

/// The token delimiter: U+241E, symbol for record separator.
pub const STRUCT_DELIM: &str = "\u{241E}";

/// Wraps an extracted footnote: `…␞FOOTNOTE␞1:2: note text␞FOOTNOTE␞…`.
pub const FOOTNOTE_DELIM: &str = "\u{241E}FOOTNOTE\u{241E}";

/// Translator-supplied words (`\add … \add*`).
pub const ADD_OPEN: &str = "\u{241E}ADDOPEN\u{241E}";
pub const ADD_CLOSE: &str = "\u{241E}ADDCLOSE\u{241E}";

/// Small caps (`\sc … \sc*`), conventionally the divine name.
pub const SC_OPEN: &str = "\u{241E}SCOPEN\u{241E}";
pub const SC_CLOSE: &str = "\u{241E}SCCLOSE\u{241E}";

/// Superscript (`\sup … \sup*`).
pub const SUP_OPEN: &str = "\u{241E}SUPOPEN\u{241E}";
pub const SUP_CLOSE: &str = "\u{241E}SUPCLOSE\u{241E}";

/// Verse follows a `\d` descriptive heading (psalm-title style).
pub const STYLE_HDG: &str = "\u{241E}STYLE:HDG\u{241E}";

/// Verse opens a new prose paragraph (`\p`).
pub const STYLE_PARA: &str = "\u{241E}STYLE:PARA\u{241E}";

/// Encode a poetry chunk: `␞Q:<indent>␞line text`.
pub fn encode_poetry(indent: u32, text: &str) -> String {
    format!("{STRUCT_DELIM}Q:{indent}{STRUCT_DELIM}{text}")
}

/// Encode a prose chunk: `␞P␞prose text`.
pub fn encode_prose(text: &str) -> String {
    format!("{STRUCT_DELIM}P{STRUCT_DELIM}{text}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_encoding() {
        assert_eq!(encode_poetry(2, "a line"), "\u{241E}Q:2\u{241E}a line");
        assert_eq!(encode_prose("words"), "\u{241E}P\u{241E}words");
    }

    #[test]
    fn markers_are_distinct() {
        let all = [
            FOOTNOTE_DELIM,
            ADD_OPEN,
            ADD_CLOSE,
            SC_OPEN,
            SC_CLOSE,
            SUP_OPEN,
            SUP_CLOSE,
            STYLE_HDG,
            STYLE_PARA,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
