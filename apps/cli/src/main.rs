//! ka-progress CLI: report a learner's Khan Academy progress per course unit.
//!
//! Logs in through a real browser session, walks each configured course
//! and tallies the completion of every unit's articles, videos and exercises.

mod commands;
mod render;

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
