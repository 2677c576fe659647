#![forbid(unsafe_code)]

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = PackError> = std::result::Result<T, E>;

/// Errors raised by key handling and the pack pipeline.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("{} already exists (pass force to overwrite)", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("{} does not exist", path.display())]
    NotFound { path: PathBuf },
    #[error("{} is not a valid RSA private key: {reason}", path.display())]
    InvalidKey { path: PathBuf, reason: String },
    #[error("{} is neither a regular file nor a directory", path.display())]
    UnsupportedSourceType { path: PathBuf },
    #[error("failed to read {}: {source}", path.display())]
    SourceRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to build archive for {}: {message}", path.display())]
    Packaging { path: PathBuf, message: String },
    #[error("failed to sign payload: {0}")]
    Sign(#[source] rsa::signature::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to generate RSA key: {0}")]
    KeyGeneration(#[source] rsa::Error),
    #[error("failed to encode key: {0}")]
    KeyEncoding(String),
    #[error("{section} section is {len} bytes, larger than a u32 length field allows")]
    SectionTooLarge { section: &'static str, len: usize },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl PackError {
    pub(crate) fn source_read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::SourceRead {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Returns true for failures detected from filesystem metadata alone,
    /// before any archive or signature work started.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::NotFound { .. } | Self::UnsupportedSourceType { .. }
        )
    }
}
