#![forbid(unsafe_code)]

use std::fs::{self, Metadata};
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use tokio::task;
use tracing::{debug, info};

use crate::error::{PackError, Result};
use crate::keys::{self, KeyFingerprint};
use crate::{archive, container, signing};

/// Inputs for [`keygen`].
#[derive(Debug, Clone)]
pub struct KeygenOptions {
    pub private_key: PathBuf,
    pub overwrite: bool,
}

/// Inputs for [`pack`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// PKCS#8 PEM private key used to sign the payload.
    pub private_key: PathBuf,
    /// Directory to zip, or an existing zip file taken verbatim.
    pub source: PathBuf,
    /// Destination of the container.
    pub out: PathBuf,
    pub overwrite: bool,
}

/// Summary of a finished pack.
#[derive(Debug, Clone)]
pub struct PackOutcome {
    pub out: PathBuf,
    pub container_len: usize,
    pub payload_len: usize,
    pub fingerprint: KeyFingerprint,
}

/// Generates a private key file and returns the fingerprint of its public key.
pub async fn keygen(opts: &KeygenOptions) -> Result<KeyFingerprint> {
    info!(
        path = %opts.private_key.display(),
        overwrite = opts.overwrite,
        "generating private key"
    );

    let path = opts.private_key.clone();
    let overwrite = opts.overwrite;
    let key = task::spawn_blocking(move || keys::generate(&path, overwrite)).await??;

    let fingerprint = key.fingerprint()?;
    info!(fingerprint = %fingerprint, "key generation complete");
    Ok(fingerprint)
}

/// Packs `opts.source` into a signed container at `opts.out`.
///
/// All path checks run before the key is parsed or any archive work starts.
/// The output is written through a temporary file in the destination
/// directory and renamed into place, so a failed pack never leaves a
/// partial container behind.
pub async fn pack(opts: &PackOptions) -> Result<PackOutcome> {
    info!(
        key = %opts.private_key.display(),
        source = %opts.source.display(),
        out = %opts.out.display(),
        overwrite = opts.overwrite,
        "packing extension"
    );

    let source_meta = validate(opts).await?;

    let key_path = opts.private_key.clone();
    let key = task::spawn_blocking(move || keys::load(&key_path)).await??;
    let public_key_der = key.public_key_der()?;
    let fingerprint = KeyFingerprint::of_der(&public_key_der);
    debug!(fingerprint = %fingerprint, "loaded signing key");

    let payload = obtain_payload(&opts.source, &source_meta).await?;
    info!(len = payload.len(), "payload ready");

    let (payload, signature) = task::spawn_blocking(move || {
        let signature = signing::sign(&payload, key.private_key())?;
        Ok::<_, PackError>((payload, signature))
    })
    .await??;
    debug!(len = signature.len(), "signed payload");

    let bytes = container::assemble(&public_key_der, &signature, &payload)?;
    let container_len = bytes.len();

    let out = opts.out.clone();
    let overwrite = opts.overwrite;
    task::spawn_blocking(move || write_atomic(&out, &bytes, overwrite)).await??;
    info!(path = %opts.out.display(), len = container_len, "wrote container");

    Ok(PackOutcome {
        out: opts.out.clone(),
        container_len,
        payload_len: payload.len(),
        fingerprint,
    })
}

async fn validate(opts: &PackOptions) -> Result<Metadata> {
    if !path_exists(&opts.private_key).await? {
        return Err(PackError::NotFound {
            path: opts.private_key.clone(),
        });
    }

    let source_meta = match tokio::fs::metadata(&opts.source).await {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(PackError::NotFound {
                path: opts.source.clone(),
            });
        }
        Err(err) => return Err(PackError::source_read(&opts.source, err)),
    };

    if !opts.overwrite && path_exists(&opts.out).await? {
        return Err(PackError::AlreadyExists {
            path: opts.out.clone(),
        });
    }

    Ok(source_meta)
}

async fn path_exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|err| PackError::source_read(path, err))
}

async fn obtain_payload(source: &Path, meta: &Metadata) -> Result<Vec<u8>> {
    let file_type = meta.file_type();
    if file_type.is_dir() {
        debug!(source = %source.display(), "zipping source directory");
        let source = source.to_path_buf();
        task::spawn_blocking(move || archive::produce_zip(&source)).await?
    } else if file_type.is_file() {
        debug!(source = %source.display(), "using source file as payload");
        tokio::fs::read(source)
            .await
            .map_err(|err| PackError::source_read(source, err))
    } else {
        Err(PackError::UnsupportedSourceType {
            path: source.to_path_buf(),
        })
    }
}

fn write_atomic(out: &Path, bytes: &[u8], overwrite: bool) -> Result<()> {
    let parent = match out.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| PackError::write(parent, err))?;

    let mut staged = tempfile::Builder::new()
        .prefix(".crxpack-")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(|err| PackError::write(out, err))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|err| PackError::write(out, err))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt as _;
        staged
            .as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))
            .map_err(|err| PackError::write(out, err))?;
    }

    let persisted = if overwrite {
        staged.persist(out)
    } else {
        staged.persist_noclobber(out)
    };

    persisted.map(|_| ()).map_err(|err| {
        if !overwrite && err.error.kind() == io::ErrorKind::AlreadyExists {
            PackError::AlreadyExists {
                path: out.to_path_buf(),
            }
        } else {
            PackError::write(out, err.error)
        }
    })
}
