//! Core domain types for VerseWeave parallel editions.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VerseweaveError};

/// Current schema version for the build manifest format.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// VerseRef
// ---------------------------------------------------------------------------

/// Matches `24:40` or `24:40a` (optional single-letter split suffix).
static REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+):(\d+)([a-zA-Z]?)$").expect("ref regex"));

/// A verse address within one book: chapter, verse, and an optional
/// split suffix (`24:40a` / `24:40b` for verses divided across traditions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VerseRef {
    pub chapter: u32,
    pub verse: u32,
    pub suffix: Option<char>,
}

impl VerseRef {
    /// Construct a plain (suffix-less) reference.
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self {
            chapter,
            verse,
            suffix: None,
        }
    }

    /// Ordering rank of the suffix: `40 < 40a < 40b < 41`.
    fn suffix_ord(&self) -> u32 {
        match self.suffix {
            None => 0,
            Some(c) => (c as u32) - ('a' as u32) + 1,
        }
    }

    /// Sort key `(chapter, verse, suffix rank)`.
    pub fn sort_key(&self) -> (u32, u32, u32) {
        (self.chapter, self.verse, self.suffix_ord())
    }
}

impl Ord for VerseRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for VerseRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for VerseRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)?;
        if let Some(c) = self.suffix {
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

impl FromStr for VerseRef {
    type Err = VerseweaveError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let caps = REF_RE
            .captures(s)
            .ok_or_else(|| VerseweaveError::bad_ref(s, "expected CH:V or CH:Vs"))?;

        let chapter: u32 = caps[1]
            .parse()
            .map_err(|_| VerseweaveError::bad_ref(s, "chapter out of range"))?;
        let verse: u32 = caps[2]
            .parse()
            .map_err(|_| VerseweaveError::bad_ref(s, "verse out of range"))?;
        let suffix = caps[3].chars().next().map(|c| c.to_ascii_lowercase());

        Ok(Self {
            chapter,
            verse,
            suffix,
        })
    }
}

impl Serialize for VerseRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VerseRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// VerseSpan
// ---------------------------------------------------------------------------

/// Matches `31:35 - 31:37` (whitespace around the dash tolerated).
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+:\d+[a-zA-Z]?)\s*-\s*(\d+:\d+[a-zA-Z]?)$").expect("range regex"));

/// One side of a mapping entry: a single verse or an inclusive range.
///
/// Ranges never carry split suffixes and never cross chapters — both are
/// curation errors in the mapping table and rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerseSpan {
    Single(VerseRef),
    Range(VerseRef, VerseRef),
}

impl VerseSpan {
    /// First reference of the span (the sort anchor).
    pub fn start(&self) -> VerseRef {
        match self {
            Self::Single(r) => *r,
            Self::Range(s, _) => *s,
        }
    }

    /// Every reference covered by the span, in verse order.
    pub fn refs(&self) -> Vec<VerseRef> {
        match self {
            Self::Single(r) => vec![*r],
            Self::Range(s, e) => (s.verse..=e.verse)
                .map(|v| VerseRef::new(s.chapter, v))
                .collect(),
        }
    }
}

impl std::fmt::Display for VerseSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(r) => write!(f, "{r}"),
            Self::Range(s, e) => write!(f, "{s}-{e}"),
        }
    }
}

impl FromStr for VerseSpan {
    type Err = VerseweaveError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();

        if let Some(caps) = RANGE_RE.captures(s) {
            let start: VerseRef = caps[1].parse()?;
            let end: VerseRef = caps[2].parse()?;

            if start.suffix.is_some() || end.suffix.is_some() {
                return Err(VerseweaveError::bad_ref(
                    s,
                    "ranges with split suffixes are not supported",
                ));
            }
            if start.chapter != end.chapter {
                return Err(VerseweaveError::bad_ref(s, "range crosses chapters"));
            }
            if start.verse > end.verse {
                return Err(VerseweaveError::bad_ref(s, "range runs backwards"));
            }
            return Ok(Self::Range(start, end));
        }

        Ok(Self::Single(s.parse()?))
    }
}

impl Serialize for VerseSpan {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VerseSpan {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// BookText
// ---------------------------------------------------------------------------

/// One tradition's parsed verse records for a single book.
///
/// Immutable once parsed. The `BTreeMap` keying keeps the JSON stage output
/// deterministically ordered, so re-running the parse stage on unchanged
/// input produces byte-identical files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookText {
    /// USFM book code (e.g. `JER`).
    pub book: String,
    /// Verse address → normalized verse text (with in-band structure markers).
    pub verses: BTreeMap<VerseRef, String>,
}

impl BookText {
    pub fn new(book: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            verses: BTreeMap::new(),
        }
    }

    /// Look up a verse's text by address.
    pub fn get(&self, r: &VerseRef) -> Option<&str> {
        self.verses.get(r).map(String::as_str)
    }

    /// Serialize the verse map as pretty JSON (the `build/json/` file format).
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.verses)
            .map_err(|e| VerseweaveError::validation(format!("verse map serialization: {e}")))
    }

    /// Parse a `build/json/` verse map back into a `BookText`.
    pub fn from_json_str(book: impl Into<String>, json: &str) -> Result<Self> {
        let verses: BTreeMap<VerseRef, String> = serde_json::from_str(json)
            .map_err(|e| VerseweaveError::validation(format!("invalid verse map: {e}")))?;
        Ok(Self {
            book: book.into(),
            verses,
        })
    }
}

// ---------------------------------------------------------------------------
// MappingEntry / AlignedRow
// ---------------------------------------------------------------------------

/// One row of the hand-curated correspondence table.
///
/// A blank side records structural absence (a passage present in only one
/// tradition). At least one side is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Septuagint-side verse address.
    pub lxx: Option<VerseRef>,
    /// Masoretic-side verse address or same-chapter range.
    pub mt: Option<VerseSpan>,
    /// 1-based data row in the mapping file, for diagnostics.
    pub row: usize,
}

/// One aligned output record — exactly one per mapping entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRow {
    pub lxx_ref: Option<VerseRef>,
    pub mt_ref: Option<VerseSpan>,
    /// Resolved LXX verse text; `None` when the LXX side is absent.
    pub lxx_text: Option<String>,
    /// Resolved MT text (range spans concatenated); `None` when absent.
    pub mt_text: Option<String>,
}

impl AlignedRow {
    pub fn lxx_present(&self) -> bool {
        self.lxx_ref.is_some()
    }

    pub fn mt_present(&self) -> bool {
        self.mt_ref.is_some()
    }
}

// ---------------------------------------------------------------------------
// BuildId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for build-run identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildId(pub Uuid);

impl BuildId {
    /// Generate a new time-sortable build identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BuildId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BuildId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for BuildId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Build manifest
// ---------------------------------------------------------------------------

/// The `build/manifest.json` structure: provenance for every stage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    /// Schema version for forward compatibility.
    pub schema_version: u32,
    /// Unique identifier for this build directory.
    pub id: BuildId,
    /// Tool version that created this build.
    pub tool_version: String,
    /// When the build directory was first populated.
    pub created_at: DateTime<Utc>,
    /// When any stage last wrote outputs.
    pub updated_at: DateTime<Utc>,
    /// Per-stage output records, keyed by stage name.
    #[serde(default)]
    pub stages: BTreeMap<String, StageRecord>,
}

impl BuildManifest {
    pub fn new(tool_version: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            id: BuildId::new(),
            tool_version: tool_version.into(),
            created_at: now,
            updated_at: now,
            stages: BTreeMap::new(),
        }
    }
}

/// Outputs recorded for one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    /// When the stage last completed.
    pub completed_at: DateTime<Utc>,
    /// Files the stage wrote.
    pub outputs: Vec<OutputMeta>,
}

/// Checksum metadata for a single stage output file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputMeta {
    /// Path relative to the project root.
    pub path: String,
    /// SHA-256 of the file contents.
    pub sha256: String,
    /// Size in bytes.
    pub size_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verse_ref_parse_and_display() {
        let r: VerseRef = "24:40".parse().unwrap();
        assert_eq!(r, VerseRef::new(24, 40));
        assert_eq!(r.to_string(), "24:40");

        let r: VerseRef = "24:40a".parse().unwrap();
        assert_eq!(r.suffix, Some('a'));
        assert_eq!(r.to_string(), "24:40a");

        // Uppercase suffixes are folded to lowercase
        let r: VerseRef = "24:40B".parse().unwrap();
        assert_eq!(r.suffix, Some('b'));
    }

    #[test]
    fn verse_ref_rejects_garbage() {
        assert!("".parse::<VerseRef>().is_err());
        assert!("12".parse::<VerseRef>().is_err());
        assert!("12:7:3".parse::<VerseRef>().is_err());
        assert!("a:b".parse::<VerseRef>().is_err());
    }

    #[test]
    fn verse_ref_ordering() {
        let plain: VerseRef = "2:40".parse().unwrap();
        let a: VerseRef = "2:40a".parse().unwrap();
        let b: VerseRef = "2:40b".parse().unwrap();
        let next: VerseRef = "2:41".parse().unwrap();

        assert!(plain < a);
        assert!(a < b);
        assert!(b < next);
        assert!(next < "3:1".parse::<VerseRef>().unwrap());
    }

    #[test]
    fn verse_span_single_and_range() {
        let s: VerseSpan = "31:35".parse().unwrap();
        assert_eq!(s.refs().len(), 1);

        let s: VerseSpan = "31:35-31:37".parse().unwrap();
        assert_eq!(
            s.refs(),
            vec![
                VerseRef::new(31, 35),
                VerseRef::new(31, 36),
                VerseRef::new(31, 37)
            ]
        );
        assert_eq!(s.to_string(), "31:35-31:37");
    }

    #[test]
    fn verse_span_rejects_bad_ranges() {
        assert!("31:35a-31:37".parse::<VerseSpan>().is_err());
        assert!("31:35-32:2".parse::<VerseSpan>().is_err());
        assert!("31:37-31:35".parse::<VerseSpan>().is_err());
    }

    #[test]
    fn book_text_json_roundtrip_is_deterministic() {
        let mut text = BookText::new("JER");
        text.verses
            .insert("2:1".parse().unwrap(), "Verse two one".into());
        text.verses
            .insert("1:2".parse().unwrap(), "Verse one two".into());
        text.verses
            .insert("1:10".parse().unwrap(), "Verse one ten".into());

        let json = text.to_json_string().unwrap();
        let parsed = BookText::from_json_str("JER", &json).unwrap();
        assert_eq!(parsed, text);

        // BTreeMap ordering: 1:2 before 1:10 before 2:1
        let pos = |needle: &str| json.find(needle).unwrap();
        assert!(pos("1:2") < pos("1:10"));
        assert!(pos("1:10") < pos("2:1"));

        // Byte-identical on re-serialization
        assert_eq!(json, parsed.to_json_string().unwrap());
    }

    #[test]
    fn build_id_roundtrip() {
        let id = BuildId::new();
        let parsed: BuildId = id.to_string().parse().expect("parse BuildId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn manifest_serialization() {
        let mut manifest = BuildManifest::new("0.1.0");
        manifest.stages.insert(
            "parse".into(),
            StageRecord {
                completed_at: Utc::now(),
                outputs: vec![OutputMeta {
                    path: "build/json/web_JER.json".into(),
                    sha256: "deadbeef".into(),
                    size_bytes: 42,
                }],
            },
        );

        let json = serde_json::to_string_pretty(&manifest).expect("serialize");
        let parsed: BuildManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.schema_version, CURRENT_SCHEMA_VERSION);
        assert_eq!(parsed.stages["parse"].outputs.len(), 1);
    }
}
