//! Project configuration for VerseWeave.
//!
//! A project is a directory holding `verseweave.toml` plus the `sources/`,
//! `data/`, `build/`, and `tex/` trees it names. The config file is looked up
//! in the project directory first, then `~/.verseweave/verseweave.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VerseweaveError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "verseweave.toml";

/// Fallback config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".verseweave";

// ---------------------------------------------------------------------------
// Config structs (matching verseweave.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Project identity.
    #[serde(default)]
    pub project: ProjectConfig,

    /// Directory layout.
    #[serde(default)]
    pub paths: PathsConfig,

    /// Registered USFM sources.
    #[serde(default)]
    pub sources: Vec<SourceEntry>,

    /// Alignment settings.
    #[serde(default)]
    pub alignment: AlignmentConfig,

    /// Typesetting settings.
    #[serde(default)]
    pub render: RenderConfig,
}

/// `[project]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name, used in summaries and the build manifest.
    #[serde(default = "default_project_name")]
    pub name: String,

    /// USFM book code to extract from each source (e.g. `JER`).
    #[serde(default = "default_book")]
    pub book: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            book: default_book(),
        }
    }
}

fn default_project_name() -> String {
    "parallel-edition".into()
}
fn default_book() -> String {
    "JER".into()
}

/// `[paths]` section — all relative to the project directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Where source archives and loose USFM files live.
    #[serde(default = "default_sources_dir")]
    pub sources_dir: String,

    /// Generated intermediates (unpacked USFM, verse JSON, parallel CSV).
    #[serde(default = "default_build_dir")]
    pub build_dir: String,

    /// Hand-curated data (the mapping table).
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// LaTeX sources and the generated document.
    #[serde(default = "default_tex_dir")]
    pub tex_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources_dir: default_sources_dir(),
            build_dir: default_build_dir(),
            data_dir: default_data_dir(),
            tex_dir: default_tex_dir(),
        }
    }
}

fn default_sources_dir() -> String {
    "sources".into()
}
fn default_build_dir() -> String {
    "build".into()
}
fn default_data_dir() -> String {
    "data".into()
}
fn default_tex_dir() -> String {
    "tex".into()
}

/// `[[sources]]` entry — one USFM text to unpack and parse.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Label identifying this source (also the `build/usfm/` folder match).
    pub name: String,

    /// Zip archive under `sources_dir` to extract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,

    /// Loose USFM file under `sources_dir` to stage directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

/// `[alignment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Source label supplying the Septuagint-order column.
    #[serde(default = "default_lxx_source")]
    pub lxx_source: String,

    /// Source label supplying the Masoretic column.
    #[serde(default = "default_mt_source")]
    pub mt_source: String,

    /// Source whose verse list seeds the mapping skeleton.
    /// Defaults to `lxx_source` when empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skeleton_source: Option<String>,

    /// Mapping table file name under `data_dir`.
    #[serde(default = "default_mapping_file")]
    pub mapping_file: String,

    /// Marker written where a tradition lacks a counterpart.
    #[serde(default = "default_absence_marker")]
    pub absence_marker: String,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            lxx_source: default_lxx_source(),
            mt_source: default_mt_source(),
            skeleton_source: None,
            mapping_file: default_mapping_file(),
            absence_marker: default_absence_marker(),
        }
    }
}

fn default_lxx_source() -> String {
    "lxx".into()
}
fn default_mt_source() -> String {
    "mt".into()
}
fn default_mapping_file() -> String {
    "mapping_lxx_to_mt.csv".into()
}
fn default_absence_marker() -> String {
    "\u{2014}".into() // em dash
}

/// `[render]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Document section title.
    #[serde(default = "default_title")]
    pub title: String,

    /// External typesetting engine invoked by the `pdf` stage.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Generated document file name under `tex_dir`.
    #[serde(default = "default_document")]
    pub document: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            engine: default_engine(),
            document: default_document(),
        }
    }
}

fn default_title() -> String {
    "Parallel Edition".into()
}
fn default_engine() -> String {
    "xelatex".into()
}
fn default_document() -> String {
    "parallel.tex".into()
}

impl AppConfig {
    /// The source label whose verse list seeds the mapping skeleton.
    pub fn skeleton_source(&self) -> &str {
        self.alignment
            .skeleton_source
            .as_deref()
            .unwrap_or(&self.alignment.lxx_source)
    }

    /// Look up a registered source by label.
    pub fn source(&self, name: &str) -> Option<&SourceEntry> {
        self.sources.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the fallback config directory (`~/.verseweave/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| VerseweaveError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Resolve the config file for a project directory: `<project>/verseweave.toml`
/// first, then `~/.verseweave/verseweave.toml`.
pub fn config_file_path(project_dir: &Path) -> Result<PathBuf> {
    let local = project_dir.join(CONFIG_FILE_NAME);
    if local.exists() {
        return Ok(local);
    }
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the config for a project directory. Returns defaults if no file exists.
pub fn load_config(project_dir: &Path) -> Result<AppConfig> {
    let path = config_file_path(project_dir)?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| VerseweaveError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| VerseweaveError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Write a default config file into the project directory.
/// Returns the path to the created file.
pub fn init_config(project_dir: &Path) -> Result<PathBuf> {
    let path = project_dir.join(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(VerseweaveError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let config = AppConfig {
        sources: vec![
            SourceEntry {
                name: "lxx".into(),
                archive: Some("lxx_usfm.zip".into()),
                file: None,
            },
            SourceEntry {
                name: "mt".into(),
                archive: Some("mt_usfm.zip".into()),
                file: None,
            },
        ],
        ..AppConfig::default()
    };
    let content =
        toml::to_string_pretty(&config).map_err(|e| VerseweaveError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| VerseweaveError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the config is internally consistent before running any stage.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.sources.is_empty() {
        return Err(VerseweaveError::config(
            "no [[sources]] registered — add at least the two traditions to align",
        ));
    }

    for (i, s) in config.sources.iter().enumerate() {
        if s.name.trim().is_empty() {
            return Err(VerseweaveError::config(format!(
                "sources[{i}] has an empty name"
            )));
        }
        if s.archive.is_none() && s.file.is_none() {
            return Err(VerseweaveError::config(format!(
                "source '{}' names neither an archive nor a file",
                s.name
            )));
        }
        if config.sources[..i].iter().any(|p| p.name == s.name) {
            return Err(VerseweaveError::config(format!(
                "duplicate source label '{}'",
                s.name
            )));
        }
    }

    for (side, label) in [
        ("lxx_source", &config.alignment.lxx_source),
        ("mt_source", &config.alignment.mt_source),
    ] {
        if config.source(label).is_none() {
            return Err(VerseweaveError::config(format!(
                "alignment.{side} '{label}' does not match any [[sources]] entry"
            )));
        }
    }

    if config.source(config.skeleton_source()).is_none() {
        return Err(VerseweaveError::config(format!(
            "alignment.skeleton_source '{}' does not match any [[sources]] entry",
            config.skeleton_source()
        )));
    }

    Ok(())
}
