//! Source unpacking: stage USFM archives and loose files into `build/usfm/`.
//!
//! Every `*.zip` in the sources directory is extracted into
//! `build/usfm/<archive stem>/`; loose `*.usfm` files named by a source
//! entry are copied into `build/usfm/<label>/`. The stage is the pipeline's
//! acquisition step — everything downstream reads the staged tree only.

use std::fs::File;
use std::io;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use verseweave_shared::{Result, SourceEntry, VerseweaveError};

/// Summary of one unpack run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnpackReport {
    /// Archives extracted.
    pub archives: usize,
    /// Files written (archive entries plus staged loose files).
    pub files: usize,
}

/// Unpack every configured source into `<usfm_root>` (normally `build/usfm/`).
///
/// Sources naming an `archive` are extracted into a folder named after the
/// archive stem; sources naming a `file` are copied into a folder named
/// after the source label. Archives in `sources_dir` not named by any
/// source entry are left alone.
#[instrument(skip_all, fields(sources = sources.len()))]
pub fn unpack_sources(
    sources_dir: &Path,
    usfm_root: &Path,
    sources: &[SourceEntry],
) -> Result<UnpackReport> {
    if !sources_dir.is_dir() {
        return Err(VerseweaveError::validation(format!(
            "sources directory {} does not exist",
            sources_dir.display()
        )));
    }

    std::fs::create_dir_all(usfm_root).map_err(|e| VerseweaveError::io(usfm_root, e))?;

    let mut report = UnpackReport::default();

    for source in sources {
        if let Some(archive) = &source.archive {
            let archive_path = sources_dir.join(archive);
            let stem = archive_path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| {
                    VerseweaveError::Archive(format!("bad archive name {archive:?}"))
                })?;
            let target = usfm_root.join(stem);

            let written = extract_archive(&archive_path, &target)?;
            info!(
                archive = %archive_path.display(),
                target = %target.display(),
                files = written,
                "extracted archive"
            );
            report.archives += 1;
            report.files += written;
        }

        if let Some(file) = &source.file {
            let src = sources_dir.join(file);
            if !src.is_file() {
                return Err(VerseweaveError::validation(format!(
                    "source file {} does not exist",
                    src.display()
                )));
            }

            let target_dir = usfm_root.join(&source.name);
            std::fs::create_dir_all(&target_dir)
                .map_err(|e| VerseweaveError::io(&target_dir, e))?;

            let file_name = src
                .file_name()
                .ok_or_else(|| VerseweaveError::validation(format!("bad file name {file:?}")))?;
            let dest = target_dir.join(file_name);
            std::fs::copy(&src, &dest).map_err(|e| VerseweaveError::io(&dest, e))?;

            debug!(file = %src.display(), dest = %dest.display(), "staged loose USFM file");
            report.files += 1;
        }
    }

    Ok(report)
}

/// Extract a zip archive into `target`, rejecting entries that escape it.
fn extract_archive(archive_path: &Path, target: &Path) -> Result<usize> {
    let file = File::open(archive_path).map_err(|e| VerseweaveError::io(archive_path, e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| VerseweaveError::Archive(format!("{}: {e}", archive_path.display())))?;

    std::fs::create_dir_all(target).map_err(|e| VerseweaveError::io(target, e))?;

    let mut written = 0;
    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| VerseweaveError::Archive(format!("{}: {e}", archive_path.display())))?;

        // enclosed_name rejects absolute paths and `..` traversal
        let Some(rel) = entry.enclosed_name() else {
            warn!(name = entry.name(), "skipping zip entry with unsafe path");
            continue;
        };
        let dest = target.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&dest).map_err(|e| VerseweaveError::io(&dest, e))?;
            continue;
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| VerseweaveError::io(parent, e))?;
        }

        let mut out = File::create(&dest).map_err(|e| VerseweaveError::io(&dest, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| VerseweaveError::io(&dest, e))?;
        written += 1;
    }

    Ok(written)
}
