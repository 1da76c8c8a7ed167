//! CLI command handlers

use clap::Subcommand;

pub mod diagnostics;
pub mod launch;
pub mod root;

#[derive(Subcommand)]
pub enum Commands {
    /// Run diagnostics and display container engine connectivity information
    Diagnostics,
    /// In-container entrypoint; resolves a task by name and runs it,
    /// writing artifacts to --outdir. Not meant to be invoked by hand.
    Launch {
        #[arg(long)]
        outdir: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        params: String,
    },
}
