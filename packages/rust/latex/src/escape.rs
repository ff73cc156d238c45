//! LaTeX text escaping and script handling.

use std::sync::LazyLock;

use regex::Regex;

/// Escape LaTeX special characters in plain text.
///
/// Character-by-character so the replacement text itself is never
/// re-escaped.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str(r"\textbackslash{}"),
            '&' => out.push_str(r"\&"),
            '%' => out.push_str(r"\%"),
            '$' => out.push_str(r"\$"),
            '#' => out.push_str(r"\#"),
            '_' => out.push_str(r"\_"),
            '{' => out.push_str(r"\{"),
            '}' => out.push_str(r"\}"),
            '~' => out.push_str(r"\textasciitilde{}"),
            '^' => out.push_str(r"\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    out
}

/// Matches a contiguous run of Hebrew-block characters (U+0590–U+05FF).
static HEBREW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\u{0590}-\u{05FF}]+").expect("hebrew regex"));

/// Wrap Hebrew script runs in `\texthebrew{…}` so the RTL engine takes over.
pub fn wrap_hebrew(text: &str) -> String {
    HEBREW_RE
        .replace_all(text, |caps: &regex::Captures| {
            format!(r"\texthebrew{{{}}}", &caps[0])
        })
        .to_string()
}
