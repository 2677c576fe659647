#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crxpack::{Container, read_container};
use serde::Serialize;
use tracing::info;

use super::normalize;

#[derive(Debug, Parser)]
pub struct VerifyArgs {
    /// Container file to check
    #[arg(value_name = "FILE")]
    pub path: PathBuf,
}

pub fn handle(args: VerifyArgs, json: bool) -> Result<()> {
    let path = normalize(args.path);
    info!(path = %path.display(), "verifying container");

    let bytes = read_container(&path).with_context(|| format!("failed to read {}", path.display()))?;
    let container =
        Container::parse(&bytes).with_context(|| format!("{} is not a valid container", path.display()))?;
    container
        .verify()
        .with_context(|| format!("signature check failed for {}", path.display()))?;

    if json {
        print_json(&container, &path)?;
    } else {
        println!(
            "verified container {}\n  version: {}\n  fingerprint: {}\n  signature: {} bytes\n  payload: {} bytes",
            path.display(),
            container.version,
            container.fingerprint(),
            container.signature.len(),
            container.payload.len()
        );
    }

    Ok(())
}

fn print_json(container: &Container<'_>, path: &Path) -> Result<()> {
    #[derive(Serialize)]
    struct Payload<'a> {
        container: &'a Path,
        version: u32,
        fingerprint: String,
        signature_len: usize,
        payload_len: usize,
    }

    let payload = Payload {
        container: path,
        version: container.version,
        fingerprint: container.fingerprint().to_string(),
        signature_len: container.signature.len(),
        payload_len: container.payload.len(),
    };

    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}
