use jsonwebtoken::{DecodingKey, EncodingKey};
use std::fs;
use std::path::Path;

use crate::error::AppError;

/// The Ed25519 key pair used to sign and verify tokens.
///
/// Loaded once at startup and shared by reference with the token codec. The
/// private half only signs; the public half is enough to verify, so it can be
/// handed to other services without exposing the signing key.
pub struct KeyProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyProvider {
    /// Builds the provider from a PKCS#8 private key PEM and its SPKI public key PEM.
    pub fn from_pem(private_pem: &[u8], public_pem: &[u8]) -> Result<Self, AppError> {
        let encoding = EncodingKey::from_ed_pem(private_pem)
            .map_err(|e| AppError::Internal(format!("Invalid signing key: {}", e)))?;
        let decoding = DecodingKey::from_ed_pem(public_pem)
            .map_err(|e| AppError::Internal(format!("Invalid verification key: {}", e)))?;
        Ok(Self { encoding, decoding })
    }

    pub fn from_files(private_path: &Path, public_path: &Path) -> Result<Self, AppError> {
        let private_pem = read_key(private_path)?;
        let public_pem = read_key(public_path)?;
        Self::from_pem(&private_pem, &public_pem)
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, AppError> {
    fs::read(path)
        .map_err(|e| AppError::Internal(format!("Failed to read key {}: {}", path.display(), e)))
}
