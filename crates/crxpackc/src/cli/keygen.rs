#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crxpack::{KeyFingerprint, KeygenOptions};
use serde::Serialize;

use super::normalize;

#[derive(Debug, Parser)]
pub struct KeygenArgs {
    /// Where to write the private key
    #[arg(long = "key", value_name = "FILE")]
    pub key: PathBuf,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

pub async fn handle(args: KeygenArgs, json: bool) -> Result<()> {
    let opts = KeygenOptions {
        private_key: normalize(args.key),
        overwrite: args.force,
    };

    let fingerprint = crxpack::keygen(&opts)
        .await
        .with_context(|| format!("failed to generate {}", opts.private_key.display()))?;

    if json {
        print_json(&opts.private_key, &fingerprint)?;
    } else {
        println!(
            "generated private key\n  key: {}\n  fingerprint: {}",
            opts.private_key.display(),
            fingerprint
        );
    }

    Ok(())
}

fn print_json(key: &Path, fingerprint: &KeyFingerprint) -> Result<()> {
    #[derive(Serialize)]
    struct Payload<'a> {
        key: &'a Path,
        fingerprint: &'a str,
    }

    let payload = Payload {
        key,
        fingerprint: fingerprint.as_str(),
    };

    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}
