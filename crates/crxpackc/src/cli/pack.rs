#![forbid(unsafe_code)]

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use crxpack::{PackOptions, PackOutcome};
use serde::Serialize;

use super::normalize;

/// Extension given to containers when `--out` is omitted.
pub const DEFAULT_EXTENSION: &str = "crx";

#[derive(Debug, Parser)]
pub struct PackArgs {
    /// RSA private key in PKCS#8 PEM format
    #[arg(long = "key", value_name = "FILE")]
    pub key: PathBuf,

    /// Directory to zip, or an existing zip file
    #[arg(long = "src", value_name = "PATH")]
    pub src: PathBuf,

    /// Output container (defaults to the source path with a .crx extension)
    #[arg(long = "out", value_name = "FILE")]
    pub out: Option<PathBuf>,

    /// Overwrite an existing output file
    #[arg(long)]
    pub force: bool,
}

impl From<PackArgs> for PackOptions {
    fn from(args: PackArgs) -> Self {
        let source = normalize(args.src);
        let out = args
            .out
            .map(normalize)
            .unwrap_or_else(|| default_out(&source));

        Self {
            private_key: normalize(args.key),
            source,
            out,
            overwrite: args.force,
        }
    }
}

pub async fn handle(args: PackArgs, json: bool) -> Result<()> {
    let opts = PackOptions::from(args);

    let outcome = crxpack::pack(&opts)
        .await
        .with_context(|| format!("failed to pack {}", opts.source.display()))?;

    if json {
        print_json(&outcome, &opts.source)?;
    } else {
        println!(
            "packed extension\n  source: {}\n  out: {}\n  payload: {} bytes\n  container: {} bytes\n  fingerprint: {}",
            opts.source.display(),
            outcome.out.display(),
            outcome.payload_len,
            outcome.container_len,
            outcome.fingerprint
        );
    }

    Ok(())
}

/// `ext/` becomes `ext.crx`, `ext.zip` becomes `ext.crx`.
fn default_out(source: &Path) -> PathBuf {
    let trimmed: PathBuf = source
        .components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect();
    trimmed.with_extension(DEFAULT_EXTENSION)
}

fn print_json(outcome: &PackOutcome, source: &Path) -> Result<()> {
    #[derive(Serialize)]
    struct Payload<'a> {
        source: &'a Path,
        out: &'a Path,
        payload_len: usize,
        container_len: usize,
        fingerprint: &'a str,
    }

    let payload = Payload {
        source,
        out: &outcome.out,
        payload_len: outcome.payload_len,
        container_len: outcome.container_len,
        fingerprint: outcome.fingerprint.as_str(),
    };

    println!("{}", serde_json::to_string(&payload)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_out_replaces_extension() {
        assert_eq!(
            default_out(Path::new("/work/ext.zip")),
            PathBuf::from("/work/ext.crx")
        );
        assert_eq!(
            default_out(Path::new("/work/ext/")),
            PathBuf::from("/work/ext.crx")
        );
        assert_eq!(
            default_out(Path::new("/work/ext/.")),
            PathBuf::from("/work/ext.crx")
        );
    }

    #[test]
    fn explicit_out_wins() {
        let opts = PackOptions::from(PackArgs {
            key: PathBuf::from("/keys/k.pem"),
            src: PathBuf::from("/work/ext"),
            out: Some(PathBuf::from("/dist/ext.crx")),
            force: true,
        });
        assert_eq!(opts.out, PathBuf::from("/dist/ext.crx"));
        assert_eq!(opts.source, PathBuf::from("/work/ext"));
        assert!(opts.overwrite);
    }
}
