//! LaTeX generation: the parallel table → a typeset-ready document.
//!
//! Each verse cell passes through a fixed render chain — escape, Hebrew
//! wrapping, footnote injection, inline-style replacement, structure-token
//! rendering — and the document assembler groups rows into per-chapter
//! two-column `paracol` environments. The external engine (`pdf` stage)
//! does the actual typesetting.

mod escape;

use tracing::{debug, instrument};

use verseweave_shared::markers::{
    ADD_CLOSE, ADD_OPEN, FOOTNOTE_DELIM, SC_CLOSE, SC_OPEN, STRUCT_DELIM, STYLE_HDG, STYLE_PARA,
    SUP_CLOSE, SUP_OPEN,
};
use verseweave_shared::{AlignedRow, Result, VerseweaveError};

pub use escape::{escape, wrap_hebrew};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Options for document assembly.
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// Section title printed above the parallel text.
    pub title: String,
    /// Marker rendered where a tradition lacks a counterpart.
    pub absence_marker: String,
}

// ---------------------------------------------------------------------------
// Footnote injection
// ---------------------------------------------------------------------------

/// Replace in-band footnote markers with `\footnote{…}`.
///
/// The input alternates text/note/text/note on [`FOOTNOTE_DELIM`]
/// boundaries; empty notes are dropped. Expects already-escaped text.
pub fn inject_footnotes(escaped: &str) -> String {
    let parts: Vec<&str> = escaped.split(FOOTNOTE_DELIM).collect();
    if parts.len() == 1 {
        return escaped.to_string();
    }

    let mut out = String::from(parts[0]);
    let mut i = 1;
    while i < parts.len() {
        let note = parts[i].trim();
        if !note.is_empty() {
            out.push_str(r"\footnote{");
            out.push_str(note);
            out.push('}');
        }
        if i + 1 < parts.len() {
            out.push_str(parts[i + 1]);
        }
        i += 2;
    }
    out
}

// ---------------------------------------------------------------------------
// Inline character styles
// ---------------------------------------------------------------------------

/// Replace inline style markers with LaTeX commands.
///
/// Runs before the structural split so styled spans stay nested inside
/// whatever poetry or prose chunk contains them.
fn apply_inline_styles(escaped: &str) -> String {
    escaped
        .replace(ADD_OPEN, r"\textit{")
        .replace(ADD_CLOSE, "}")
        .replace(SC_OPEN, r"\textsc{")
        .replace(SC_CLOSE, "}")
        .replace(SUP_OPEN, r"\textsuperscript{")
        .replace(SUP_CLOSE, "}")
        .replace(STYLE_HDG, r"\HeadingStyle{}")
        .replace(STYLE_PARA, r"\ParagraphMark{}")
}

// ---------------------------------------------------------------------------
// Structure rendering
// ---------------------------------------------------------------------------

/// Render remaining structure tokens (`Q:<n>` poetry lines, `P` prose
/// separators) into LaTeX.
///
/// Poetry lines become `\poemline{indent}{text}`; a cell that used any
/// poemline is wrapped in a `\raggedright` group to keep the line breaks
/// safe inside the column.
fn render_structured(escaped: &str) -> String {
    if !escaped.contains(STRUCT_DELIM) {
        return escaped.to_string();
    }

    let parts: Vec<&str> = escaped.split(STRUCT_DELIM).collect();
    let mut out = String::new();
    let mut i = 0;

    while i < parts.len() {
        let token = parts[i];

        if let Some(level) = token.strip_prefix("Q:") {
            let indent: u32 = level.parse().unwrap_or(1);
            let line = parts.get(i + 1).map(|s| s.trim()).unwrap_or("");
            out.push_str(&format!("\\poemline{{{indent}}}{{{line}}}"));
            i += 2;
        } else if token == "P" {
            // Prose separator; the text itself is the next part
            i += 1;
        } else {
            let t = token.trim();
            if !t.is_empty() {
                out.push_str(t);
                out.push(' ');
            }
            i += 1;
        }
    }

    let rendered = out.trim().to_string();
    if rendered.contains("\\poemline") {
        format!("{{\\raggedright {rendered}}}")
    } else {
        rendered
    }
}

/// Run the full render chain on one verse cell.
pub fn render_cell(text: &str) -> String {
    render_structured(&apply_inline_styles(&inject_footnotes(&wrap_hebrew(
        &escape(text),
    ))))
}

// ---------------------------------------------------------------------------
// Document assembly
// ---------------------------------------------------------------------------

/// Generate the parallel document body from aligned rows.
///
/// Rows are grouped into chapters by their LXX reference (rows lacking one
/// stay with the chapter in progress), each chapter wrapped in a
/// two-column `paracol` environment with one `\VersePair` per row.
#[instrument(skip_all, fields(rows = rows.len()))]
pub fn generate_document(rows: &[AlignedRow], opts: &DocumentOptions) -> Result<String> {
    if rows.is_empty() {
        return Err(VerseweaveError::Render(
            "no aligned rows to typeset".into(),
        ));
    }

    let mut out = String::new();
    out.push_str("\\input{preamble.tex}\n");
    out.push_str("\\begin{document}\n");
    out.push_str(&format!("\\section*{{{}}}\n", escape(&opts.title)));

    let mut current_chapter: Option<u32> = None;

    for row in rows {
        let chapter = row
            .lxx_ref
            .map(|r| r.chapter)
            .or(current_chapter)
            .or_else(|| row.mt_ref.map(|s| s.start().chapter));

        if chapter != current_chapter {
            if current_chapter.is_some() {
                out.push_str("\\end{paracol}\n");
            }
            let ch = chapter.unwrap_or(0);
            out.push_str(&format!("\\ChapterHeading{{{ch}}}\n"));
            out.push_str("\\begin{paracol}{2}\n");
            current_chapter = chapter;
        }

        let marker = escape(&opts.absence_marker);
        let lxx_ref = row
            .lxx_ref
            .map_or_else(|| marker.clone(), |r| escape(&r.to_string()));
        let mt_ref = row
            .mt_ref
            .map_or_else(|| marker.clone(), |s| escape(&s.to_string()));
        let lxx_text = row
            .lxx_text
            .as_deref()
            .map_or_else(|| marker.clone(), render_cell);
        let mt_text = row
            .mt_text
            .as_deref()
            .map_or_else(|| marker.clone(), render_cell);

        out.push_str(&format!(
            "\\VersePair{{{lxx_ref}}}{{{lxx_text}}}{{{mt_ref}}}{{{mt_text}}}\n"
        ));
    }

    if current_chapter.is_some() {
        out.push_str("\\end{paracol}\n");
    }
    out.push_str("\\end{document}\n");

    debug!(bytes = out.len(), "document generated");
    Ok(out)
}

/// The default `preamble.tex`, written once when the project has none.
///
/// Hand edits to the file are never overwritten.
pub fn default_preamble() -> &'static str {
    r"\documentclass[10pt,a4paper]{article}
\usepackage[margin=2cm]{geometry}
\usepackage{fontspec}
\usepackage{polyglossia}
\setdefaultlanguage{english}
\setotherlanguage{hebrew}
\newfontfamily\hebrewfont[Script=Hebrew]{Ezra SIL}
\usepackage{paracol}
\setlength{\columnsep}{1.5em}

% Chapter number, spanning both columns
\newcommand{\ChapterHeading}[1]{%
  \par\medskip{\centering\Large\bfseries #1\par}\medskip}

% One aligned verse pair: LXX ref/text left, MT ref/text right
\newcommand{\VersePair}[4]{%
  {\footnotesize\textbf{#1}}~#2\par\switchcolumn
  {\footnotesize\textbf{#3}}~#4\par\switchcolumn*}

% A poetry line at the given indent level
\newcommand{\poemline}[2]{\par\hspace*{#1em}#2\par}

% Style switch for verses following a descriptive heading
\newcommand{\HeadingStyle}{\itshape}

% Paragraph-opening marker
\newcommand{\ParagraphMark}{\P\,}
"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
