//! VerseWeave CLI — parallel-edition build pipeline.
//!
//! Unpacks USFM sources, parses them into verse records, aligns two textual
//! traditions through a hand-curated mapping table, and renders the parallel
//! table into LaTeX for an external typesetting engine.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
