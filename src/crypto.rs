//! Cryptographic primitives.
//!
//! SHA3-256 content hashing and Ed25519 endorsement keys used by the
//! permissioned ledger node.

use crate::core::{Error, Hash256, Result};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha3::{Digest, Sha3_256};
use std::path::Path;
use tracing::info;

/// Ed25519 key pair used to endorse ledger entries.
#[derive(Clone)]
pub struct EndorsementKey {
    signing_key: SigningKey,
}

impl EndorsementKey {
    /// Create a new key with random bytes from the OS.
    pub fn generate() -> Self {
        use rand::RngCore;
        let mut csprng = rand::rngs::OsRng;
        let mut secret_key_bytes = [0u8; 32];
        csprng.fill_bytes(&mut secret_key_bytes);
        Self {
            signing_key: SigningKey::from_bytes(&secret_key_bytes),
        }
    }

    /// Create from existing signing key bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Secret key bytes.
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Load a hex-encoded key from `path`, or generate one and write it
    /// there if the file does not exist yet.
    pub fn load_or_generate(path: &Path) -> Result<Self> {
        if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|e| {
                Error::Storage(format!("failed to read key {}: {}", path.display(), e))
            })?;
            let bytes: [u8; 32] = hex::decode(raw.trim())
                .ok()
                .and_then(|b| b.try_into().ok())
                .ok_or_else(|| {
                    Error::Storage(format!("{} does not hold a 32-byte hex key", path.display()))
                })?;
            return Ok(Self::from_bytes(&bytes));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Storage(format!("failed to create {}: {}", parent.display(), e))
                })?;
            }
        }
        let key = Self::generate();
        std::fs::write(path, format!("{}\n", hex::encode(key.to_bytes()))).map_err(|e| {
            Error::Storage(format!("failed to write key {}: {}", path.display(), e))
        })?;
        info!(path = %path.display(), "endorsement key generated");
        Ok(key)
    }

    /// Get the verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }

    /// Verify a signature made by this key.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<()> {
        verify(&self.verifying_key(), message, signature)
    }
}

impl Default for EndorsementKey {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Debug for EndorsementKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndorsementKey")
            .field("public", &hex::encode(self.verifying_key().to_bytes()))
            .finish()
    }
}

/// Verify a signature with a public key.
pub fn verify(public_key: &VerifyingKey, message: &[u8], signature: &[u8]) -> Result<()> {
    let sig_bytes: [u8; 64] = signature
        .try_into()
        .map_err(|_| Error::Validation("Invalid signature length".into()))?;
    let sig = Signature::from_bytes(&sig_bytes);
    public_key.verify(message, &sig)?;
    Ok(())
}

/// Compute SHA3-256 hash of data.
pub fn sha3_256(data: &[u8]) -> Hash256 {
    sha3_256_multi(&[data])
}

/// Compute SHA3-256 hash of multiple data chunks.
pub fn sha3_256_multi(chunks: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha3_256::new();
    for chunk in chunks {
        hasher.update(chunk);
    }
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    Hash256::new(bytes)
}
