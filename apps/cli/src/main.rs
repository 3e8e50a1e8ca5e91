//! Elliptics storage command line client.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to the platform config path).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Upload a file (or stdin) under a key.
    Put {
        key: String,
        /// Source file; reads stdin when omitted.
        file: Option<PathBuf>,
        /// Append to the stored object instead of replacing it.
        #[arg(long)]
        append: bool,
    },
    /// Download an object to a file (or stdout).
    Get {
        key: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Exit with status 0 when the object exists, 1 otherwise.
    Exists { key: String },
    /// Remove an object.
    Delete { key: String },
    /// Print the public URL of a key.
    Url { key: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;
    tracing::debug!(private_url = %config.private_url, prefix = %config.prefix, "configuration loaded");

    let rt = tokio::runtime::Runtime::new()?;
    let code = rt.block_on(commands::run(config, cli.command))?;
    drop(rt);
    std::process::exit(code);
}
