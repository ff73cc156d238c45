//! Stage orchestration: archives → verse JSON → parallel CSV → LaTeX → PDF.
//!
//! Each stage is a strictly sequential batch transformation that fully
//! consumes its predecessor's output files. Freshness follows the build-tool
//! model: a stage is skipped when its outputs are newer than all of its
//! inputs, unless forced. Outputs are written atomically and recorded in the
//! build manifest.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use tracing::{info, instrument, warn};

use verseweave_align::{align, load_mapping, to_parallel_csv, write_skeleton};
use verseweave_latex::{DocumentOptions, generate_document};
use verseweave_shared::{AppConfig, BookText, Result, VerseweaveError};
use verseweave_usfm::{find_book_file, find_source_dir, parse_book};

use crate::manifest;

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A VerseWeave project: a root directory plus its loaded configuration.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project root (where `verseweave.toml` lives).
    pub root: PathBuf,
    /// Loaded configuration.
    pub config: AppConfig,
    /// Tool version stamped into the build manifest.
    pub tool_version: String,
}

impl Project {
    pub fn new(root: impl Into<PathBuf>, config: AppConfig, tool_version: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            config,
            tool_version: tool_version.into(),
        }
    }

    pub fn sources_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.sources_dir)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.build_dir)
    }

    pub fn usfm_root(&self) -> PathBuf {
        self.build_dir().join("usfm")
    }

    pub fn json_dir(&self) -> PathBuf {
        self.build_dir().join("json")
    }

    pub fn json_path(&self, label: &str) -> PathBuf {
        self.json_dir()
            .join(format!("{label}_{}.json", self.config.project.book))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.data_dir)
    }

    pub fn mapping_path(&self) -> PathBuf {
        self.data_dir().join(&self.config.alignment.mapping_file)
    }

    pub fn parallel_csv_path(&self) -> PathBuf {
        self.build_dir().join(format!(
            "{}_parallel.csv",
            self.config.project.book.to_lowercase()
        ))
    }

    pub fn tex_dir(&self) -> PathBuf {
        self.root.join(&self.config.paths.tex_dir)
    }

    pub fn document_path(&self) -> PathBuf {
        self.tex_dir().join(&self.config.render.document)
    }

    pub fn preamble_path(&self) -> PathBuf {
        self.tex_dir().join("preamble.tex")
    }
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new stage or phase.
    fn phase(&self, name: &str);
    /// Called for per-item progress within a stage.
    fn note(&self, msg: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn note(&self, _msg: &str) {}
}

// ---------------------------------------------------------------------------
// Stage outcomes
// ---------------------------------------------------------------------------

/// What one stage invocation did.
#[derive(Debug, Clone)]
pub struct StageOutcome {
    /// Stage name (`unpack`, `parse`, `mapping`, `csv`, `tex`, `pdf`, `clean`).
    pub stage: &'static str,
    /// Whether the stage actually ran (false when outputs were fresh).
    pub ran: bool,
    /// Files the stage wrote.
    pub outputs: Vec<PathBuf>,
    /// Human-readable result detail for summaries.
    pub detail: Option<String>,
}

impl StageOutcome {
    fn skipped(stage: &'static str) -> Self {
        Self {
            stage,
            ran: false,
            outputs: Vec::new(),
            detail: Some("up to date".into()),
        }
    }
}

/// Result of a full `build` run.
#[derive(Debug)]
pub struct BuildSummary {
    /// Per-stage outcomes in execution order.
    pub outcomes: Vec<StageOutcome>,
    /// Aligned row count from the csv stage (when it ran or was fresh).
    pub rows: Option<usize>,
    /// Total elapsed time.
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Freshness
// ---------------------------------------------------------------------------

fn mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// An output is stale when it is missing or any input is newer.
fn is_stale(output: &Path, inputs: &[PathBuf]) -> bool {
    let Some(out_time) = mtime(output) else {
        return true;
    };
    inputs
        .iter()
        .any(|input| mtime(input).is_none_or(|t| t > out_time))
}

// ---------------------------------------------------------------------------
// Stage: unpack
// ---------------------------------------------------------------------------

/// Extract source archives and stage loose USFM files into `build/usfm/`.
#[instrument(skip_all)]
pub fn run_unpack(
    project: &Project,
    progress: &dyn ProgressReporter,
    force: bool,
) -> Result<StageOutcome> {
    progress.phase("Unpacking sources");

    let usfm_root = project.usfm_root();
    let inputs: Vec<PathBuf> = project
        .config
        .sources
        .iter()
        .flat_map(|s| {
            s.archive
                .iter()
                .chain(s.file.iter())
                .map(|name| project.sources_dir().join(name))
        })
        .collect();

    if !force && !is_stale(&usfm_root, &inputs) {
        info!("unpack outputs up to date, skipping");
        return Ok(StageOutcome::skipped("unpack"));
    }

    let report =
        verseweave_unpack::unpack_sources(&project.sources_dir(), &usfm_root, &project.config.sources)?;
    progress.note(&format!(
        "{} archives, {} files staged",
        report.archives, report.files
    ));

    let build_dir = project.build_dir();
    let mut m = manifest::load_or_create(&build_dir, &project.tool_version)?;
    manifest::record_stage(&build_dir, &mut m, "unpack", &[])?;

    Ok(StageOutcome {
        stage: "unpack",
        ran: true,
        outputs: vec![usfm_root],
        detail: Some(format!(
            "{} archives, {} files",
            report.archives, report.files
        )),
    })
}

// ---------------------------------------------------------------------------
// Stage: parse
// ---------------------------------------------------------------------------

/// Parse every configured source's book file into `build/json/` verse maps.
#[instrument(skip_all)]
pub fn run_parse(
    project: &Project,
    progress: &dyn ProgressReporter,
    force: bool,
) -> Result<StageOutcome> {
    progress.phase("Parsing USFM");

    let book_id = project.config.project.book.clone();
    let usfm_root = project.usfm_root();
    let build_dir = project.build_dir();

    let mut written: Vec<(String, Vec<u8>)> = Vec::new();
    let mut outputs = Vec::new();

    for source in &project.config.sources {
        let source_dir = find_source_dir(&usfm_root, &source.name)?;
        let usfm_file = find_book_file(&source_dir, &book_id)?;
        let out_path = project.json_path(&source.name);

        if !force && !is_stale(&out_path, &[usfm_file.clone()]) {
            progress.note(&format!("{}: up to date", source.name));
            continue;
        }

        let content =
            std::fs::read_to_string(&usfm_file).map_err(|e| VerseweaveError::io(&usfm_file, e))?;
        let parsed = parse_book(&content)
            .map_err(|e| VerseweaveError::usfm(format!("{}: {e}", usfm_file.display())))?;

        if !parsed.book.is_empty() && parsed.book != book_id {
            warn!(
                source = %source.name,
                found = %parsed.book,
                expected = %book_id,
                "book code mismatch in USFM file"
            );
        }

        let json = parsed.to_json_string()?;
        manifest::write_atomic(&out_path, json.as_bytes())?;
        progress.note(&format!("{}: {} verses", source.name, parsed.verses.len()));

        written.push((
            manifest::relative_path(&project.root, &out_path),
            json.into_bytes(),
        ));
        outputs.push(out_path);
    }

    if written.is_empty() {
        return Ok(StageOutcome::skipped("parse"));
    }

    let records: Vec<(String, &[u8])> = written
        .iter()
        .map(|(p, b)| (p.clone(), b.as_slice()))
        .collect();
    let mut m = manifest::load_or_create(&build_dir, &project.tool_version)?;
    manifest::record_stage(&build_dir, &mut m, "parse", &records)?;

    Ok(StageOutcome {
        stage: "parse",
        ran: true,
        detail: Some(format!("{} sources parsed", outputs.len())),
        outputs,
    })
}

// ---------------------------------------------------------------------------
// Stage: mapping skeleton
// ---------------------------------------------------------------------------

/// Generate the identity mapping skeleton for hand curation.
#[instrument(skip_all)]
pub fn run_mapping_skeleton(
    project: &Project,
    progress: &dyn ProgressReporter,
    force: bool,
) -> Result<StageOutcome> {
    progress.phase("Generating mapping skeleton");

    let label = project.config.skeleton_source().to_string();
    let json_path = project.json_path(&label);
    if !json_path.exists() {
        return Err(VerseweaveError::validation(format!(
            "{} not found — run the parse stage first",
            json_path.display()
        )));
    }

    let json =
        std::fs::read_to_string(&json_path).map_err(|e| VerseweaveError::io(&json_path, e))?;
    let book = BookText::from_json_str(&project.config.project.book, &json)?;

    let mapping_path = project.mapping_path();
    let rows = write_skeleton(&book, &mapping_path, force)?;
    progress.note(&format!("{rows} identity rows"));

    let content =
        std::fs::read(&mapping_path).map_err(|e| VerseweaveError::io(&mapping_path, e))?;
    let build_dir = project.build_dir();
    let mut m = manifest::load_or_create(&build_dir, &project.tool_version)?;
    manifest::record_stage(
        &build_dir,
        &mut m,
        "mapping",
        &[(
            manifest::relative_path(&project.root, &mapping_path),
            content.as_slice(),
        )],
    )?;

    Ok(StageOutcome {
        stage: "mapping",
        ran: true,
        outputs: vec![mapping_path],
        detail: Some(format!("{rows} rows — curate before building the table")),
    })
}

// ---------------------------------------------------------------------------
// Stage: csv (the alignment join)
// ---------------------------------------------------------------------------

/// Join the two traditions through the mapping table into the parallel CSV.
#[instrument(skip_all)]
pub fn run_csv(
    project: &Project,
    progress: &dyn ProgressReporter,
    force: bool,
) -> Result<StageOutcome> {
    progress.phase("Building parallel table");

    let lxx_path = project.json_path(&project.config.alignment.lxx_source);
    let mt_path = project.json_path(&project.config.alignment.mt_source);
    let mapping_path = project.mapping_path();

    for (what, path) in [
        ("verse records", &lxx_path),
        ("verse records", &mt_path),
        ("mapping table", &mapping_path),
    ] {
        if !path.exists() {
            return Err(VerseweaveError::validation(format!(
                "{} not found ({what}) — run the earlier stages first",
                path.display()
            )));
        }
    }

    let out_path = project.parallel_csv_path();
    let inputs = vec![lxx_path.clone(), mt_path.clone(), mapping_path.clone()];
    if !force && !is_stale(&out_path, &inputs) {
        info!("parallel table up to date, skipping");
        return Ok(StageOutcome::skipped("csv"));
    }

    let book_id = &project.config.project.book;
    let lxx = BookText::from_json_str(
        book_id,
        &std::fs::read_to_string(&lxx_path).map_err(|e| VerseweaveError::io(&lxx_path, e))?,
    )?;
    let mt = BookText::from_json_str(
        book_id,
        &std::fs::read_to_string(&mt_path).map_err(|e| VerseweaveError::io(&mt_path, e))?,
    )?;

    let mapping = load_mapping(&mapping_path)?;
    let rows = align(&lxx, &mt, &mapping)?;
    let csv = to_parallel_csv(&rows, &project.config.alignment.absence_marker)?;

    manifest::write_atomic(&out_path, csv.as_bytes())?;
    progress.note(&format!("{} aligned rows", rows.len()));

    let build_dir = project.build_dir();
    let mut m = manifest::load_or_create(&build_dir, &project.tool_version)?;
    manifest::record_stage(
        &build_dir,
        &mut m,
        "csv",
        &[(
            manifest::relative_path(&project.root, &out_path),
            csv.as_bytes(),
        )],
    )?;

    Ok(StageOutcome {
        stage: "csv",
        ran: true,
        outputs: vec![out_path],
        detail: Some(format!("{} rows", rows.len())),
    })
}

// ---------------------------------------------------------------------------
// Stage: tex
// ---------------------------------------------------------------------------

/// Convert the parallel CSV into the LaTeX document (plus a default
/// preamble when the project has none).
#[instrument(skip_all)]
pub fn run_tex(
    project: &Project,
    progress: &dyn ProgressReporter,
    force: bool,
) -> Result<StageOutcome> {
    progress.phase("Generating LaTeX");

    let csv_path = project.parallel_csv_path();
    if !csv_path.exists() {
        return Err(VerseweaveError::validation(format!(
            "{} not found — run the csv stage first",
            csv_path.display()
        )));
    }

    let doc_path = project.document_path();
    if !force && !is_stale(&doc_path, &[csv_path.clone()]) {
        info!("LaTeX document up to date, skipping");
        return Ok(StageOutcome::skipped("tex"));
    }

    let csv =
        std::fs::read_to_string(&csv_path).map_err(|e| VerseweaveError::io(&csv_path, e))?;
    let rows = verseweave_align::parse_parallel_csv(&csv)?;

    let opts = DocumentOptions {
        title: project.config.render.title.clone(),
        absence_marker: project.config.alignment.absence_marker.clone(),
    };
    let document = generate_document(&rows, &opts)?;
    manifest::write_atomic(&doc_path, document.as_bytes())?;

    let mut outputs = vec![doc_path.clone()];
    let mut written: Vec<(String, Vec<u8>)> = vec![(
        manifest::relative_path(&project.root, &doc_path),
        document.into_bytes(),
    )];

    // Seed a preamble once; hand edits are never clobbered
    let preamble_path = project.preamble_path();
    if !preamble_path.exists() {
        let preamble = verseweave_latex::default_preamble();
        manifest::write_atomic(&preamble_path, preamble.as_bytes())?;
        progress.note("wrote default preamble.tex");
        written.push((
            manifest::relative_path(&project.root, &preamble_path),
            preamble.as_bytes().to_vec(),
        ));
        outputs.push(preamble_path);
    }

    progress.note(&format!("{} verse pairs typeset", rows.len()));

    let records: Vec<(String, &[u8])> = written
        .iter()
        .map(|(p, b)| (p.clone(), b.as_slice()))
        .collect();
    let build_dir = project.build_dir();
    let mut m = manifest::load_or_create(&build_dir, &project.tool_version)?;
    manifest::record_stage(&build_dir, &mut m, "tex", &records)?;

    Ok(StageOutcome {
        stage: "tex",
        ran: true,
        detail: Some(format!("{} verse pairs", rows.len())),
        outputs,
    })
}

// ---------------------------------------------------------------------------
// Stage: pdf (external renderer)
// ---------------------------------------------------------------------------

/// Invoke the external typesetting engine on the generated document.
#[instrument(skip_all)]
pub fn run_pdf(project: &Project, progress: &dyn ProgressReporter) -> Result<StageOutcome> {
    progress.phase("Rendering PDF");

    let doc_path = project.document_path();
    if !doc_path.exists() {
        return Err(VerseweaveError::validation(format!(
            "{} not found — run the tex stage first",
            doc_path.display()
        )));
    }

    let engine = &project.config.render.engine;

    // Probe availability before handing over the terminal
    let probe = std::process::Command::new(engine).arg("--version").output();
    match probe {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            info!(engine, version = %version.lines().next().unwrap_or(""), "engine found");
        }
        _ => {
            return Err(VerseweaveError::Render(format!(
                "typesetting engine '{engine}' not found on PATH"
            )));
        }
    }

    let doc_name = project.config.render.document.clone();
    progress.note(&format!("{engine} {doc_name}"));

    let status = std::process::Command::new(engine)
        .arg("-interaction=nonstopmode")
        .arg(&doc_name)
        .current_dir(project.tex_dir())
        .stdin(std::process::Stdio::inherit())
        .stdout(std::process::Stdio::inherit())
        .stderr(std::process::Stdio::inherit())
        .status()
        .map_err(|e| VerseweaveError::Render(format!("failed to spawn {engine}: {e}")))?;

    if !status.success() {
        return Err(VerseweaveError::Render(format!(
            "{engine} exited with status {}",
            status.code().unwrap_or(-1)
        )));
    }

    let pdf_path = doc_path.with_extension("pdf");
    Ok(StageOutcome {
        stage: "pdf",
        ran: true,
        outputs: vec![pdf_path],
        detail: None,
    })
}

// ---------------------------------------------------------------------------
// Stage: clean
// ---------------------------------------------------------------------------

/// Remove generated intermediates: the build directory and the generated
/// document. Sources, the mapping table, and the (possibly hand-edited)
/// preamble are never touched.
#[instrument(skip_all)]
pub fn run_clean(project: &Project, progress: &dyn ProgressReporter) -> Result<StageOutcome> {
    progress.phase("Cleaning build outputs");

    let mut removed = Vec::new();

    let build_dir = project.build_dir();
    if build_dir.exists() {
        std::fs::remove_dir_all(&build_dir).map_err(|e| VerseweaveError::io(&build_dir, e))?;
        removed.push(build_dir);
    }

    let doc_path = project.document_path();
    if doc_path.exists() {
        std::fs::remove_file(&doc_path).map_err(|e| VerseweaveError::io(&doc_path, e))?;
        removed.push(doc_path);
    }

    Ok(StageOutcome {
        stage: "clean",
        ran: !removed.is_empty(),
        detail: Some(format!("{} paths removed", removed.len())),
        outputs: removed,
    })
}

// ---------------------------------------------------------------------------
// Full build
// ---------------------------------------------------------------------------

/// Run unpack → parse → csv → tex in order, honoring per-stage freshness.
///
/// The mapping table is hand-curated ground truth, so `build` requires it to
/// exist rather than generating a skeleton implicitly.
#[instrument(skip_all)]
pub fn run_build(
    project: &Project,
    progress: &dyn ProgressReporter,
    force: bool,
) -> Result<BuildSummary> {
    let start = Instant::now();

    if !project.mapping_path().exists() {
        return Err(VerseweaveError::validation(format!(
            "mapping table {} not found — run the mapping stage and curate it first",
            project.mapping_path().display()
        )));
    }

    let mut outcomes = Vec::new();
    outcomes.push(run_unpack(project, progress, force)?);
    outcomes.push(run_parse(project, progress, force)?);
    let csv = run_csv(project, progress, force)?;
    let rows = csv
        .detail
        .as_deref()
        .and_then(|d| d.split_whitespace().next())
        .and_then(|n| n.parse().ok());
    outcomes.push(csv);
    outcomes.push(run_tex(project, progress, force)?);

    let summary = BuildSummary {
        outcomes,
        rows,
        elapsed: start.elapsed(),
    };

    info!(
        stages_run = summary.outcomes.iter().filter(|o| o.ran).count(),
        elapsed_ms = summary.elapsed.as_millis(),
        "build complete"
    );

    Ok(summary)
}
