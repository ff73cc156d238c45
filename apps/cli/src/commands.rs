//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use verseweave_core::{ProgressReporter, Project, StageOutcome};
use verseweave_shared::{AppConfig, init_config, load_config, load_config_from, validate_config};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// VerseWeave — build parallel biblical editions from USFM sources.
#[derive(Parser)]
#[command(
    name = "verseweave",
    version,
    about = "Align two textual traditions verse-by-verse and typeset the parallel edition.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Project directory (defaults to the current directory).
    #[arg(short = 'C', long, global = true)]
    pub project: Option<PathBuf>,

    /// Explicit config file (overrides project-directory lookup).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands — one per pipeline stage, plus project chores.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract source archives into the build tree.
    Unpack {
        /// Re-extract even if outputs look up to date.
        #[arg(long)]
        force: bool,
    },

    /// Parse USFM sources into per-verse JSON records.
    Parse {
        /// Re-parse even if outputs look up to date.
        #[arg(long)]
        force: bool,
    },

    /// Generate the identity mapping skeleton for hand curation.
    Mapping {
        /// Overwrite an existing (possibly curated) mapping table.
        #[arg(long)]
        force: bool,
    },

    /// Build the aligned parallel table from the mapping and verse records.
    Csv {
        /// Rebuild even if the table looks up to date.
        #[arg(long)]
        force: bool,
    },

    /// Generate the LaTeX document from the parallel table.
    Tex {
        /// Regenerate even if the document looks up to date.
        #[arg(long)]
        force: bool,
    },

    /// Run the external typesetting engine on the generated document.
    Pdf,

    /// Run unpack → parse → csv → tex in order.
    Build {
        /// Force every stage to re-run.
        #[arg(long)]
        force: bool,
    },

    /// Remove generated intermediates (build tree and generated document).
    Clean,

    /// Show the build manifest: completed stages and output checksums.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a starter verseweave.toml into the project directory.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "verseweave=info",
        1 => "verseweave=debug",
        _ => "verseweave=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) fn run(cli: Cli) -> Result<()> {
    let project_dir = match &cli.project {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()
            .map_err(|e| eyre!("cannot determine working directory: {e}"))?,
    };

    // Config management works without a valid pipeline config
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(&project_dir),
            ConfigAction::Show => cmd_config_show(&project_dir, cli.config.as_deref()),
        };
    }

    let config = match cli.config.as_deref() {
        Some(path) => load_config_from(path)?,
        None => load_config(&project_dir)?,
    };

    // Status only reads the manifest; everything else needs a sound config
    if !matches!(cli.command, Command::Status) {
        validate_config(&config)?;
    }

    let project = Project::new(project_dir, config, env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Unpack { force } => {
            cmd_stage(|p| verseweave_core::run_unpack(&project, p, force))
        }
        Command::Parse { force } => cmd_stage(|p| verseweave_core::run_parse(&project, p, force)),
        Command::Mapping { force } => {
            cmd_stage(|p| verseweave_core::run_mapping_skeleton(&project, p, force))
        }
        Command::Csv { force } => cmd_stage(|p| verseweave_core::run_csv(&project, p, force)),
        Command::Tex { force } => cmd_stage(|p| verseweave_core::run_tex(&project, p, force)),
        Command::Pdf => cmd_stage(|p| verseweave_core::run_pdf(&project, p)),
        Command::Build { force } => cmd_build(&project, force),
        Command::Clean => cmd_stage(|p| verseweave_core::run_clean(&project, p)),
        Command::Status => cmd_status(&project),
        Command::Config { .. } => unreachable!("handled above"),
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn note(&self, msg: &str) {
        self.spinner.set_message(msg.to_string());
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn print_outcome(outcome: &StageOutcome) {
    let status = if outcome.ran { "done" } else { "up to date" };
    match &outcome.detail {
        Some(detail) if outcome.ran => println!("  {}: {detail}", outcome.stage),
        _ => println!("  {}: {status}", outcome.stage),
    }
    for path in &outcome.outputs {
        println!("    -> {}", path.display());
    }
}

fn cmd_stage<F>(stage: F) -> Result<()>
where
    F: FnOnce(&dyn ProgressReporter) -> verseweave_shared::Result<StageOutcome>,
{
    let progress = CliProgress::new();
    let result = stage(&progress);
    progress.finish();

    let outcome = result?;
    info!(stage = outcome.stage, ran = outcome.ran, "stage finished");
    println!();
    print_outcome(&outcome);
    println!();
    Ok(())
}

fn cmd_build(project: &Project, force: bool) -> Result<()> {
    info!(force, "running full build");
    let progress = CliProgress::new();
    let result = verseweave_core::run_build(project, &progress, force);
    progress.finish();

    let summary = result?;

    println!();
    println!("  Parallel edition built!");
    for outcome in &summary.outcomes {
        print_outcome(outcome);
    }
    if let Some(rows) = summary.rows {
        println!("  Rows:  {rows}");
    }
    println!("  Time:  {:.1}s", summary.elapsed.as_secs_f64());
    println!();

    Ok(())
}

fn cmd_status(project: &Project) -> Result<()> {
    let manifest = verseweave_core::manifest::load_manifest(&project.build_dir())?;

    let Some(manifest) = manifest else {
        println!("No build manifest found — nothing has been built yet.");
        return Ok(());
    };

    println!();
    println!("  Build:   {}", manifest.id);
    println!("  Tool:    {}", manifest.tool_version);
    println!("  Created: {}", manifest.created_at.to_rfc3339());
    println!("  Updated: {}", manifest.updated_at.to_rfc3339());
    println!();

    for (stage, record) in &manifest.stages {
        println!("  {stage} ({})", record.completed_at.to_rfc3339());
        for output in &record.outputs {
            println!(
                "    {} ({} bytes, sha256 {})",
                output.path,
                output.size_bytes,
                &output.sha256[..12.min(output.sha256.len())]
            );
        }
    }
    println!();

    Ok(())
}

fn cmd_config_init(project_dir: &std::path::Path) -> Result<()> {
    let path = init_config(project_dir)?;
    println!("Config initialized at: {}", path.display());
    println!("Register your USFM sources under [[sources]] before building.");
    Ok(())
}

fn cmd_config_show(project_dir: &std::path::Path, explicit: Option<&std::path::Path>) -> Result<()> {
    let config: AppConfig = match explicit {
        Some(path) => load_config_from(path)?,
        None => load_config(project_dir)?,
    };
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
