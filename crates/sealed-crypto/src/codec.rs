//! Per-field encryption of sensitive values.
//!
//! Each sealed field is bound to its entity, parent scope and field name
//! through AAD, so ciphertext cannot be moved between rows or columns.

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::provider::{CryptoError, CryptoProvider};

/// Whether a read opens sealed fields or leaves them sealed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptMode {
    Skip,
    Decrypt,
}

/// Ciphertext of one field as persisted (URL-safe base64, no padding).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedField(String);

impl SealedField {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Encryption context of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAad {
    entity: &'static str,
    scope_id: i64,
    field: &'static str,
}

impl FieldAad {
    pub fn new(entity: &'static str, scope_id: i64, field: &'static str) -> Self {
        Self {
            entity,
            scope_id,
            field,
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{}:{}:{}", self.entity, self.scope_id, self.field).into_bytes()
    }
}

#[derive(Clone)]
pub struct FieldCodec {
    crypto: Arc<dyn CryptoProvider>,
}

impl FieldCodec {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// Seal a plaintext value. Callers always pass the caller-owned clear
    /// value; ciphertext is never fed back in.
    pub fn encrypt_field(
        &self,
        aad: &FieldAad,
        plaintext: &str,
    ) -> Result<SealedField, CryptoError> {
        let sealed = self.crypto.encrypt(plaintext.as_bytes(), &aad.to_bytes())?;
        Ok(SealedField(URL_SAFE_NO_PAD.encode(sealed)))
    }

    /// Open a sealed value. Returns `None` when `mode` is [`DecryptMode::Skip`].
    pub fn decrypt_field(
        &self,
        aad: &FieldAad,
        sealed: &SealedField,
        mode: DecryptMode,
    ) -> Result<Option<String>, CryptoError> {
        if mode == DecryptMode::Skip {
            return Ok(None);
        }
        let raw = URL_SAFE_NO_PAD
            .decode(&sealed.0)
            .map_err(|e| CryptoError::Encoding(format!("base64: {e}")))?;
        let clear = self.crypto.decrypt(&raw, &aad.to_bytes())?;
        String::from_utf8(clear)
            .map(Some)
            .map_err(|e| CryptoError::Encoding(format!("utf-8: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{key_provider::InMemoryKeyProvider, provider::LocalCrypto};

    fn codec() -> FieldCodec {
        let crypto = LocalCrypto::from_provider(&InMemoryKeyProvider::default()).unwrap();
        FieldCodec::new(Arc::new(crypto))
    }

    #[test]
    fn sealed_field_hides_plaintext() {
        let codec = codec();
        let aad = FieldAad::new("application", 1, "password");
        let sealed = codec.encrypt_field(&aad, "hunter2").unwrap();
        assert!(!sealed.as_str().contains("hunter2"));

        let json = serde_json::to_string(&sealed).unwrap();
        assert_eq!(json, format!("\"{}\"", sealed.as_str()));

        let clear = codec
            .decrypt_field(&aad, &sealed, DecryptMode::Decrypt)
            .unwrap();
        assert_eq!(clear.as_deref(), Some("hunter2"));
    }

    #[test]
    fn skip_mode_leaves_field_sealed() {
        let codec = codec();
        let aad = FieldAad::new("application", 1, "password");
        let sealed = codec.encrypt_field(&aad, "hunter2").unwrap();
        assert_eq!(codec.decrypt_field(&aad, &sealed, DecryptMode::Skip).unwrap(), None);
    }

    #[test]
    fn field_swap_is_detected() {
        let codec = codec();
        let sealed = codec
            .encrypt_field(&FieldAad::new("application", 1, "password"), "hunter2")
            .unwrap();
        let err = codec
            .decrypt_field(
                &FieldAad::new("application", 1, "ssh_key_content"),
                &sealed,
                DecryptMode::Decrypt,
            )
            .expect_err("aad mismatch");
        assert!(err.is_integrity());
    }

    #[test]
    fn garbage_is_an_integrity_failure() {
        let codec = codec();
        let aad = FieldAad::new("application", 1, "password");
        let garbage = SealedField("%%%".into());
        let err = codec
            .decrypt_field(&aad, &garbage, DecryptMode::Decrypt)
            .expect_err("bad base64");
        assert!(err.is_integrity());
    }
}
