//! PageGraph CLI: markup trees in, knowledge graph and embedding documents out.
//!
//! Reads scraped page trees (JSON) or raw HTML, runs extraction,
//! normalization and document building, and writes JSON/JSONL output.

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
