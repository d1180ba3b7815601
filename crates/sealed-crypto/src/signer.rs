use std::sync::Arc;

use sealed_core::canonical::CanonicalForm;

use crate::provider::{CryptoError, CryptoProvider};

/// Integrity signature of a stored record, tagged with the canonical template
/// it was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub form_id: String,
    pub bytes: Vec<u8>,
}

/// Signs canonical forms at write time and checks them at read time.
#[derive(Clone)]
pub struct Signer {
    crypto: Arc<dyn CryptoProvider>,
}

impl Signer {
    pub fn new(crypto: Arc<dyn CryptoProvider>) -> Self {
        Self { crypto }
    }

    /// Sign the current (first) canonical form.
    pub fn sign(&self, forms: &[CanonicalForm]) -> Result<Signature, CryptoError> {
        let current = forms
            .first()
            .ok_or_else(|| CryptoError::Internal("no canonical form to sign".to_string()))?;
        Ok(Signature {
            form_id: current.form_id.clone(),
            bytes: self.crypto.sign(current.as_bytes())?,
        })
    }

    /// Recompute against the form the signature names. A signature produced by
    /// a template no longer declared is a mismatch.
    pub fn verify(
        &self,
        forms: &[CanonicalForm],
        signature: &Signature,
    ) -> Result<bool, CryptoError> {
        match forms.iter().find(|f| f.form_id == signature.form_id) {
            Some(form) => self.crypto.verify(form.as_bytes(), &signature.bytes),
            None => Ok(false),
        }
    }
}
