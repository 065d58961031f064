//! JobAtlas CLI — occupational complexity data pipeline.
//!
//! Imports occupational survey CSVs into a local row-store, computes
//! normalized complexity scores, and exports hierarchical JSON views
//! for visualization.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
