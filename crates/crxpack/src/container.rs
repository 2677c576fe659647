#![forbid(unsafe_code)]

//! Binary layout of a signed extension container.
//!
//! ```text
//! Offset        Size  Field
//! 0             4     magic ("Cr24")
//! 4             4     version (u32 LE)
//! 8             4     public key length (u32 LE)
//! 12            4     signature length (u32 LE)
//! 16            pk    public key (SPKI DER)
//! 16+pk         sig   signature over payload
//! 16+pk+sig     rest  payload (zip)
//! ```
//!
//! There is no checksum. Any header that does not account for the buffer
//! exactly is rejected outright.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::error::{PackError, Result};
use crate::keys::KeyFingerprint;
use crate::signing::{self, SignatureError};

/// Magic bytes identifying a container.
pub const MAGIC: &[u8; 4] = b"Cr24";

/// Current format version.
pub const FORMAT_VERSION: u32 = 2;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 16;

/// Errors raised while reading a container back.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("container is {len} bytes, shorter than the 16-byte header")]
    TruncatedHeader { len: usize },
    #[error("container does not start with the Cr24 magic")]
    InvalidMagic,
    #[error("unsupported container version {0}")]
    UnsupportedVersion(u32),
    #[error(
        "header declares {public_key_len} key bytes and {signature_len} signature bytes but only {available} bytes follow the header"
    )]
    Truncated {
        public_key_len: u32,
        signature_len: u32,
        available: usize,
    },
    #[error("failed to read container: {0}")]
    Io(#[from] std::io::Error),
    #[error("signature check failed: {0}")]
    Signature(#[from] SignatureError),
}

/// Serializes the three sections into the container layout.
pub fn assemble(public_key_der: &[u8], signature: &[u8], payload: &[u8]) -> Result<Vec<u8>> {
    let public_key_len = section_len("public key", public_key_der)?;
    let signature_len = section_len("signature", signature)?;

    let mut buf =
        Vec::with_capacity(HEADER_SIZE + public_key_der.len() + signature.len() + payload.len());
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    buf.extend_from_slice(&public_key_len.to_le_bytes());
    buf.extend_from_slice(&signature_len.to_le_bytes());
    buf.extend_from_slice(public_key_der);
    buf.extend_from_slice(signature);
    buf.extend_from_slice(payload);
    Ok(buf)
}

fn section_len(section: &'static str, bytes: &[u8]) -> Result<u32> {
    u32::try_from(bytes.len()).map_err(|_| PackError::SectionTooLarge {
        section,
        len: bytes.len(),
    })
}

/// A parsed container borrowing its sections from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Container<'a> {
    pub version: u32,
    pub public_key: &'a [u8],
    pub signature: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> Container<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ContainerError> {
        if bytes.len() < HEADER_SIZE {
            return Err(ContainerError::TruncatedHeader { len: bytes.len() });
        }
        if &bytes[0..4] != MAGIC {
            return Err(ContainerError::InvalidMagic);
        }

        let version = read_u32(bytes, 4);
        if version != FORMAT_VERSION {
            return Err(ContainerError::UnsupportedVersion(version));
        }

        let public_key_len = read_u32(bytes, 8);
        let signature_len = read_u32(bytes, 12);
        let body = &bytes[HEADER_SIZE..];

        let truncated = || ContainerError::Truncated {
            public_key_len,
            signature_len,
            available: body.len(),
        };
        let pk_end = usize::try_from(public_key_len).map_err(|_| truncated())?;
        let sig_end = usize::try_from(signature_len)
            .ok()
            .and_then(|len| pk_end.checked_add(len))
            .ok_or_else(truncated)?;
        if sig_end > body.len() {
            return Err(truncated());
        }

        Ok(Self {
            version,
            public_key: &body[..pk_end],
            signature: &body[pk_end..sig_end],
            payload: &body[sig_end..],
        })
    }

    /// Checks the embedded signature against the embedded public key.
    pub fn verify(&self) -> Result<(), ContainerError> {
        signing::verify(self.public_key, self.signature, self.payload)?;
        Ok(())
    }

    pub fn fingerprint(&self) -> KeyFingerprint {
        KeyFingerprint::of_der(self.public_key)
    }

    /// Size of the serialized container this was parsed from.
    pub fn total_len(&self) -> usize {
        HEADER_SIZE + self.public_key.len() + self.signature.len() + self.payload.len()
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(field)
}

/// Reads a container file into memory. Parse it with [`Container::parse`].
pub fn read_container(path: &Path) -> Result<Vec<u8>, ContainerError> {
    Ok(fs::read(path)?)
}
