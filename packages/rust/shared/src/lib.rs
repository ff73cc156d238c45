//! Shared types, error model, and configuration for VerseWeave.
//!
//! This crate is the foundation depended on by all other VerseWeave crates.
//! It provides:
//! - [`VerseweaveError`] — the unified error type
//! - Domain types ([`VerseRef`], [`VerseSpan`], [`BookText`], [`MappingEntry`],
//!   [`AlignedRow`], [`BuildManifest`])
//! - In-band structure markers shared by the parser and the LaTeX generator
//! - Configuration ([`AppConfig`], config loading and validation)

pub mod config;
pub mod error;
pub mod markers;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AlignmentConfig, AppConfig, PathsConfig, ProjectConfig, RenderConfig, SourceEntry,
    config_dir, config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{Result, VerseweaveError};
pub use types::{
    AlignedRow, BookText, BuildId, BuildManifest, CURRENT_SCHEMA_VERSION, MappingEntry,
    OutputMeta, StageRecord, VerseRef, VerseSpan,
};
