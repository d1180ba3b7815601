//! Signature checks on the read path, expressed as a typed outcome instead of
//! a boolean: the caller decides whether a corrupted row is skipped (collection
//! loads) or turned into "not found" (single loads).

use std::fmt;

use sealed_core::canonical::{CanonicalForms, SignedEntity};
use sealed_crypto::{Signature, Signer};

use crate::StoreError;

/// Outcome of loading and checking one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification<T> {
    Valid(T),
    Corrupted(Corruption),
    Absent,
}

impl<T> Verification<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Verification<U> {
        match self {
            Verification::Valid(value) => Verification::Valid(f(value)),
            Verification::Corrupted(c) => Verification::Corrupted(c),
            Verification::Absent => Verification::Absent,
        }
    }

    pub fn valid(self) -> Option<T> {
        match self {
            Verification::Valid(value) => Some(value),
            _ => None,
        }
    }
}

/// Where and why a stored row failed its integrity checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corruption {
    pub entity: &'static str,
    pub id: i64,
    pub reason: CorruptionReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptionReason {
    /// Recomputed canonical form does not match the stored signature.
    SignatureMismatch,
    /// A sealed field failed authentication.
    UnreadableSecret(String),
    /// The serialized payload could not be decoded.
    UnreadablePayload(String),
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} data corrupted: ", self.entity, self.id)?;
        match &self.reason {
            CorruptionReason::SignatureMismatch => f.write_str("signature mismatch"),
            CorruptionReason::UnreadableSecret(detail) => write!(f, "unreadable secret ({detail})"),
            CorruptionReason::UnreadablePayload(detail) => {
                write!(f, "unreadable payload ({detail})")
            }
        }
    }
}

/// Canonical forms of one entity type bound to the signer.
pub struct Integrity<E> {
    forms: CanonicalForms<E>,
    signer: Signer,
}

impl<E: SignedEntity> Integrity<E> {
    /// Compiles the entity's canonical templates; fails on a template that
    /// references an unknown field.
    pub fn new(signer: Signer) -> Result<Self, StoreError> {
        Ok(Self {
            forms: CanonicalForms::compile()?,
            signer,
        })
    }

    pub fn sign(&self, entity: &E) -> Result<Signature, StoreError> {
        let forms = self.forms.render(entity)?;
        Ok(self.signer.sign(&forms)?)
    }

    /// Check a decoded record against its stored signature.
    pub fn check(
        &self,
        id: i64,
        entity: E,
        signature: &Signature,
    ) -> Result<Verification<E>, StoreError> {
        let forms = self.forms.render(&entity)?;
        if self.signer.verify(&forms, signature)? {
            Ok(Verification::Valid(entity))
        } else {
            Ok(Verification::Corrupted(Corruption {
                entity: E::ENTITY,
                id,
                reason: CorruptionReason::SignatureMismatch,
            }))
        }
    }
}
