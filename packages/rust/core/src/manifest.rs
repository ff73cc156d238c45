//! Build-manifest maintenance.
//!
//! `build/manifest.json` records provenance for every stage output: what was
//! written, when, and its content hash. Stage outputs and the manifest are
//! written atomically (temp file, then rename) so an interrupted stage never
//! leaves a half-written file behind.

use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::debug;

use verseweave_shared::{BuildManifest, OutputMeta, Result, StageRecord, VerseweaveError};

/// Manifest file name within the build directory.
const MANIFEST_FILE: &str = "manifest.json";

/// Hex-encoded SHA-256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Write a file atomically: temp file in the same directory, then rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| VerseweaveError::validation(format!("{} has no parent", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| VerseweaveError::io(parent, e))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| VerseweaveError::validation(format!("bad file name {}", path.display())))?;
    let temp = parent.join(format!(".{file_name}.tmp"));

    std::fs::write(&temp, content).map_err(|e| VerseweaveError::io(&temp, e))?;
    std::fs::rename(&temp, path).map_err(|e| VerseweaveError::io(path, e))?;

    Ok(())
}

/// Load the manifest from a build directory, if one exists.
pub fn load_manifest(build_dir: &Path) -> Result<Option<BuildManifest>> {
    let path = build_dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(&path).map_err(|e| VerseweaveError::io(&path, e))?;
    let manifest: BuildManifest = serde_json::from_str(&content)
        .map_err(|e| VerseweaveError::validation(format!("invalid {}: {e}", path.display())))?;
    Ok(Some(manifest))
}

/// Load the manifest or start a fresh one for this build directory.
pub fn load_or_create(build_dir: &Path, tool_version: &str) -> Result<BuildManifest> {
    Ok(load_manifest(build_dir)?.unwrap_or_else(|| BuildManifest::new(tool_version)))
}

/// Record a completed stage's outputs and persist the manifest.
///
/// `outputs` pairs each project-relative path with the bytes that were
/// written there.
pub fn record_stage(
    build_dir: &Path,
    manifest: &mut BuildManifest,
    stage: &str,
    outputs: &[(String, &[u8])],
) -> Result<()> {
    let metas: Vec<OutputMeta> = outputs
        .iter()
        .map(|(path, bytes)| OutputMeta {
            path: path.clone(),
            sha256: sha256_hex(bytes),
            size_bytes: bytes.len(),
        })
        .collect();

    let now = Utc::now();
    manifest.stages.insert(
        stage.to_string(),
        StageRecord {
            completed_at: now,
            outputs: metas,
        },
    );
    manifest.updated_at = now;

    let json = serde_json::to_string_pretty(manifest)
        .map_err(|e| VerseweaveError::validation(format!("manifest serialization: {e}")))?;
    write_atomic(&build_dir.join(MANIFEST_FILE), json.as_bytes())?;

    debug!(stage, outputs = outputs.len(), "recorded stage in manifest");
    Ok(())
}

/// Project-relative display path for manifest entries.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// The manifest path for a build directory.
pub fn manifest_path(build_dir: &Path) -> PathBuf {
    build_dir.join(MANIFEST_FILE)
}
