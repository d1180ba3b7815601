use std::fmt;

use serde::{Serialize, Serializer};

/// Text rendering of [`Secret::Unchanged`] at user-facing boundaries.
pub const PLACEHOLDER: &str = "**********";

/// A sensitive value as seen by callers of the repository.
///
/// `Unchanged` stands in for a stored secret the caller is not allowed to see.
/// Handing it back on update means "keep whatever is stored", and because it is
/// a distinct variant no real value can ever be mistaken for it.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Secret {
    #[default]
    Unchanged,
    Value(String),
}

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Secret::Value(value.into())
    }

    pub fn empty() -> Self {
        Secret::Value(String::new())
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, Secret::Unchanged)
    }

    /// Clear value, if the caller holds one.
    pub fn expose(&self) -> Option<&str> {
        match self {
            Secret::Unchanged => None,
            Secret::Value(value) => Some(value),
        }
    }
}

/// Never prints the value.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Secret::Unchanged => f.write_str("Secret::Unchanged"),
            Secret::Value(v) if v.is_empty() => f.write_str("Secret::Value(\"\")"),
            Secret::Value(_) => f.write_str("Secret::Value([REDACTED])"),
        }
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Secret::Unchanged => serializer.serialize_str(PLACEHOLDER),
            Secret::Value(value) => serializer.serialize_str(value),
        }
    }
}

/// Policy applied to every record handed back on the default read path and
/// after every write.
pub trait Mask {
    /// Replace primary secrets with [`Secret::Unchanged`] and clear auxiliary
    /// key material.
    fn mask(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_value() {
        let secret = Secret::new("hunter2");
        let out = format!("{secret:?}");
        assert!(!out.contains("hunter2"));
        assert!(out.contains("REDACTED"));
    }

    #[test]
    fn unchanged_serializes_as_placeholder() {
        let json = serde_json::to_string(&Secret::Unchanged).unwrap();
        assert_eq!(json, format!("\"{PLACEHOLDER}\""));
    }

    #[test]
    fn placeholder_text_is_a_real_value_not_unchanged() {
        // A caller whose password literally is the placeholder text keeps it.
        let secret = Secret::new(PLACEHOLDER);
        assert!(!secret.is_unchanged());
        assert_eq!(secret.expose(), Some(PLACEHOLDER));
    }
}
