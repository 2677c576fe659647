#![forbid(unsafe_code)]

//! RSA PKCS#1 v1.5 signatures with a SHA-1 digest, the scheme extension
//! containers are checked with.

use pkcs8::DecodePublicKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding as _, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha1::Sha1;
use thiserror::Error;

use crate::error::{PackError, Result};

/// Errors that may occur while checking a signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to parse public key (SPKI): {0}")]
    PublicKey(#[from] pkcs8::spki::Error),
    #[error("signature bytes were malformed")]
    Malformed,
    #[error("signature does not match payload")]
    Mismatch,
}

/// Signs `payload` exactly as given.
pub fn sign(payload: &[u8], private_key: &RsaPrivateKey) -> Result<Vec<u8>> {
    let signing_key = SigningKey::<Sha1>::new(private_key.clone());
    let signature = signing_key.try_sign(payload).map_err(PackError::Sign)?;
    Ok(signature.to_vec())
}

/// Checks `signature` over `payload` against a DER encoded public key.
pub fn verify(
    public_key_der: &[u8],
    signature: &[u8],
    payload: &[u8],
) -> std::result::Result<(), SignatureError> {
    let public_key = RsaPublicKey::from_public_key_der(public_key_der)?;
    verify_with(&public_key, signature, payload)
}

pub fn verify_with(
    public_key: &RsaPublicKey,
    signature: &[u8],
    payload: &[u8],
) -> std::result::Result<(), SignatureError> {
    let verifying_key = VerifyingKey::<Sha1>::new(public_key.clone());
    let signature = Signature::try_from(signature).map_err(|_| SignatureError::Malformed)?;
    verifying_key
        .verify(payload, &signature)
        .map_err(|_| SignatureError::Mismatch)
}
