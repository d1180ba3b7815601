use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    canonical::SignedEntity,
    secret::{Mask, Secret},
};

/// Upper bound for an inline icon, in bytes.
pub const MAX_ICON_SIZE: usize = 120_000;

/// How the repository strategy authenticates against the VCS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    #[default]
    Https,
    Ssh,
}

impl ConnectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionType::Https => "https",
            ConnectionType::Ssh => "ssh",
        }
    }
}

impl FromStr for ConnectionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "https" => Ok(ConnectionType::Https),
            "ssh" => Ok(ConnectionType::Ssh),
            other => Err(ValidationError::ConnectionType(other.to_string())),
        }
    }
}

/// Credentials and branch settings used to reach the application's repository.
#[derive(Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepositoryStrategy {
    pub connection_type: ConnectionType,
    /// Name of the SSH key to use; not secret.
    pub ssh_key: String,
    /// Private key material. Cleared on every masked view.
    pub ssh_key_content: String,
    pub user: String,
    pub password: Secret,
    pub branch: String,
    pub default_branch: String,
    pub pgp_key: String,
}

impl fmt::Debug for RepositoryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key_content = if self.ssh_key_content.is_empty() {
            ""
        } else {
            "[REDACTED]"
        };
        f.debug_struct("RepositoryStrategy")
            .field("connection_type", &self.connection_type)
            .field("ssh_key", &self.ssh_key)
            .field("ssh_key_content", &key_content)
            .field("user", &self.user)
            .field("password", &self.password)
            .field("branch", &self.branch)
            .field("default_branch", &self.default_branch)
            .field("pgp_key", &self.pgp_key)
            .finish()
    }
}

impl Mask for RepositoryStrategy {
    fn mask(&mut self) {
        self.password = Secret::Unchanged;
        self.ssh_key_content.clear();
    }
}

/// Application entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: i64,
    pub project_id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub from_repository: String,
    pub last_modified: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
    pub repository_strategy: RepositoryStrategy,
}

impl Application {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Business invariants checked before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !is_valid_name(&self.name) {
            return Err(ValidationError::Name(self.name.clone()));
        }
        if !self.icon.is_empty() {
            if !self.icon.starts_with("data:image/") {
                return Err(ValidationError::IconFormat);
            }
            if self.icon.len() > MAX_ICON_SIZE {
                return Err(ValidationError::IconSize {
                    size: self.icon.len(),
                    max: MAX_ICON_SIZE,
                });
            }
        }
        Ok(())
    }
}

impl Mask for Application {
    fn mask(&mut self) {
        self.repository_strategy.mask();
    }
}

impl SignedEntity for Application {
    const ENTITY: &'static str = "application";

    fn canonical_templates() -> &'static [&'static str] {
        &["{project_id}{name}"]
    }

    fn canonical_fields() -> &'static [&'static str] {
        &["project_id", "name"]
    }

    fn canonical_value(&self, field: &str) -> Option<String> {
        match field {
            "project_id" => Some(self.project_id.to_string()),
            "name" => Some(self.name.clone()),
            _ => None,
        }
    }
}

/// Lightweight listing entry; never signed, never carries secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdName {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid application name `{0}`: only letters, digits, '.', '_' and '-' are allowed")]
    Name(String),
    #[error("invalid icon: expected a data:image/ URI")]
    IconFormat,
    #[error("icon too large: {size} bytes (max {max})")]
    IconSize { size: usize, max: usize },
    #[error("unknown connection type `{0}` (expected https or ssh)")]
    ConnectionType(String),
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}
