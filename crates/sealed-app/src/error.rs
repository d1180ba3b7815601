use std::fmt;

use sealed_core::application::ValidationError;
use sealed_store::StoreError;
use thiserror::Error;

/// Caller-visible error surface of the repository.
#[derive(Debug, Error)]
pub enum Error {
    /// No such row, or the row failed verification. Deliberately the same.
    #[error("{entity} not found ({key})")]
    NotFound { entity: &'static str, key: String },

    #[error("application is not valid: {0}")]
    Validation(#[from] ValidationError),

    #[error("{op} failed for {target}: {source}")]
    Infrastructure {
        op: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("load option failed: {0}")]
    Decorator(#[source] anyhow::Error),
}

/// The three kinds of failure a caller has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Infrastructure,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Infrastructure { .. } | Error::Decorator(_) => ErrorKind::Infrastructure,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

pub(crate) fn infra(
    op: &'static str,
    target: impl fmt::Display,
) -> impl FnOnce(StoreError) -> Error {
    move |source| Error::Infrastructure {
        op,
        target: target.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_cover_the_surface() {
        let not_found = Error::NotFound {
            entity: "application",
            key: "id 1".into(),
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(not_found.to_string(), "application not found (id 1)");

        let invalid = Error::from(ValidationError::IconFormat);
        assert_eq!(invalid.kind(), ErrorKind::Validation);

        let infra = infra("load", "id 1")(StoreError::Cancelled);
        assert_eq!(infra.kind(), ErrorKind::Infrastructure);
        assert_eq!(infra.to_string(), "load failed for id 1: operation cancelled");

        let decorator = Error::Decorator(anyhow::anyhow!("no keys"));
        assert_eq!(decorator.kind(), ErrorKind::Infrastructure);
    }
}
