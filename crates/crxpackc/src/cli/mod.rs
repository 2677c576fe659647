#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod keygen;
pub mod pack;
pub mod verify;

#[derive(Debug, Parser)]
#[command(name = "crxpackc", about = "Signed extension container packer", version)]
pub struct Cli {
    /// Logging filter (overrides CRXPACK_LOG)
    #[arg(long = "log", default_value = "info", global = true)]
    pub verbosity: String,

    /// Emit machine-readable JSON output where applicable
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a 2048-bit RSA private key (PKCS#8 PEM)
    Keygen(keygen::KeygenArgs),
    /// Zip and sign a directory, or sign an existing zip, into a container
    Pack(pack::PackArgs),
    /// Check a container's layout and embedded signature
    Verify(verify::VerifyArgs),
}

/// Resolve the logging filter to use for telemetry initialisation.
pub fn resolve_env_filter(cli: &Cli) -> String {
    std::env::var("CRXPACK_LOG").unwrap_or_else(|_| cli.verbosity.clone())
}

/// Execute the CLI using a pre-parsed argument set.
pub async fn run_with_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Keygen(args) => keygen::handle(args, cli.json).await?,
        Command::Pack(args) => pack::handle(args, cli.json).await?,
        Command::Verify(args) => verify::handle(args, cli.json)?,
    }

    Ok(())
}

pub(crate) fn normalize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    }
}
