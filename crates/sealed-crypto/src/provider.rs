//! The crypto boundary: a provider exposing sign/verify/encrypt/decrypt over
//! the process-wide key. Injected explicitly wherever it is needed.
//!
//! Ciphertext layout: `[12 bytes of nonce][AES-256-GCM ciphertext + tag]`.

use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng, Payload},
    Aes256Gcm, Nonce,
};
use ed25519_dalek::{Signer as _, SigningKey, Verifier as _, VerifyingKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::key_provider::{KeyError, KeyMaterial, KeyProvider};

const NONCE_SIZE: usize = 12;
const SIGN_DOMAIN: &[u8] = b"sealed.v1.sign:";
const ENCRYPT_DOMAIN: &[u8] = b"sealed.v1.encrypt:";

#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key material could not be obtained.
    #[error("key unavailable: {0}")]
    KeyUnavailable(#[from] KeyError),
    /// Ciphertext failed authentication or is truncated.
    #[error("ciphertext failed authentication")]
    Integrity,
    #[error("malformed sealed field: {0}")]
    Encoding(String),
    #[error("crypto failure: {0}")]
    Internal(String),
}

impl CryptoError {
    /// True when the failure points at tampered data rather than at the
    /// crypto infrastructure.
    pub fn is_integrity(&self) -> bool {
        matches!(self, CryptoError::Integrity | CryptoError::Encoding(_))
    }
}

/// Signing and encryption primitives keyed by a process-wide secret.
pub trait CryptoProvider: Send + Sync {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// `Ok(false)` on mismatch; errors are reserved for infrastructure failures.
    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError>;

    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;

    fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError>;
}

/// Local provider: Ed25519 signatures and AES-256-GCM, both derived from one
/// master key.
pub struct LocalCrypto {
    key_id: String,
    cipher: Aes256Gcm,
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl LocalCrypto {
    pub fn new(material: &KeyMaterial) -> Result<Self, CryptoError> {
        let enc_key = derive(ENCRYPT_DOMAIN, &material.bytes);
        let sign_key = derive(SIGN_DOMAIN, &material.bytes);

        let cipher = Aes256Gcm::new_from_slice(enc_key.as_slice())
            .map_err(|e| CryptoError::Internal(format!("cipher init failed: {e}")))?;
        let signing_key = SigningKey::from_bytes(&sign_key);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            key_id: material.id.clone(),
            cipher,
            signing_key,
            verifying_key,
        })
    }

    pub fn from_provider(provider: &dyn KeyProvider) -> Result<Self, CryptoError> {
        let material = provider.get_or_create()?;
        let crypto = Self::new(&material)?;
        tracing::debug!(key_id = %crypto.key_id, "crypto provider ready");
        Ok(crypto)
    }

    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}

impl CryptoProvider for LocalCrypto {
    fn sign(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(self.signing_key.sign(data).to_bytes().to_vec())
    }

    fn verify(&self, data: &[u8], signature: &[u8]) -> Result<bool, CryptoError> {
        let Ok(signature) = ed25519_dalek::Signature::from_slice(signature) else {
            return Ok(false);
        };
        Ok(self.verifying_key.verify(data, &signature).is_ok())
    }

    fn encrypt(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut ciphertext = self
            .cipher
            .encrypt(&nonce, Payload { msg: plaintext, aad })
            .map_err(|e| CryptoError::Internal(format!("encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.append(&mut ciphertext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if ciphertext.len() < NONCE_SIZE {
            return Err(CryptoError::Integrity);
        }
        let (nonce, msg) = ciphertext.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg, aad })
            .map_err(|_| CryptoError::Integrity)
    }
}

fn derive(domain: &[u8], master: &[u8; 32]) -> Zeroizing<[u8; 32]> {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(master);
    Zeroizing::new(hasher.finalize().into())
}
