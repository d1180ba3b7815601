use std::{path::PathBuf, sync::Arc};

use color_eyre::Result;
use dirs::data_dir;
use sealed_app::ApplicationStore;
use sealed_crypto::{KeyProvider, KeyringProvider, LocalCrypto, StaticKeyProvider};
use sealed_store::Database;
use tracing::debug;

use crate::config::Config;

pub const MASTER_KEY_ENV: &str = "SEALED_MASTER_KEY";

/// An open database plus the application store bound to its key.
pub struct Workspace {
    pub db: Database,
    pub store: ApplicationStore,
}

/// Resolve the default database location.
pub fn default_database() -> Result<PathBuf> {
    let base = data_dir().ok_or_else(|| color_eyre::eyre::eyre!("no data dir available"))?;
    Ok(base.join("sealed").join("sealed.db"))
}

/// Open the configured database and load (or create) the master key.
pub fn open(config: &Config) -> Result<Workspace> {
    let path = match &config.database {
        Some(path) => path.clone(),
        None => default_database()?,
    };
    debug!(?path, "opening database");
    let db = Database::open(&path)?;
    let keys = key_provider(config, std::env::var(MASTER_KEY_ENV).ok());
    workspace(db, keys.as_ref())
}

fn workspace(db: Database, keys: &dyn KeyProvider) -> Result<Workspace> {
    let crypto = LocalCrypto::from_provider(keys)?;
    let store = ApplicationStore::new(Arc::new(crypto))?;
    Ok(Workspace { db, store })
}

/// Env key first, then the configured key, then the OS keyring.
fn key_provider(config: &Config, env_key: Option<String>) -> Box<dyn KeyProvider> {
    if let Some(encoded) = env_key.or_else(|| config.master_key.clone()) {
        return Box::new(StaticKeyProvider::new(encoded));
    }
    let keyring = config.keyring.clone().unwrap_or_default();
    Box::new(KeyringProvider::new(keyring.service, keyring.account))
}

/// Workspace over an in-memory database with an ephemeral key.
#[cfg(test)]
pub fn test_workspace() -> Workspace {
    let db = Database::open_in_memory().expect("in-memory db");
    workspace(db, &sealed_crypto::InMemoryKeyProvider::default())
        .expect("workspace")
}

#[cfg(test)]
mod tests {
    use sealed_crypto::generate_encoded_key;

    use super::*;
    use crate::config::KeyringConfig;

    #[test]
    fn env_key_overrides_config() {
        let config = Config {
            master_key: Some("not base64 !!".into()),
            ..Config::default()
        };
        let provider = key_provider(&config, Some(generate_encoded_key()));
        assert!(provider.get_or_create().is_ok());

        let provider = key_provider(&config, None);
        assert!(provider.get_or_create().is_err());
    }

    #[test]
    fn opens_a_database_on_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            database: Some(dir.path().join("data").join("sealed.db")),
            master_key: Some(generate_encoded_key()),
            ..Config::default()
        };
        let keys = key_provider(&config, None);
        let db = Database::open(config.database.as_deref().unwrap()).expect("open");
        workspace(db, keys.as_ref()).expect("workspace");
        assert!(dir.path().join("data").join("sealed.db").exists());
    }

    #[test]
    fn default_keyring_entry() {
        let keyring = KeyringConfig::default();
        assert_eq!(keyring.service, "sealed");
        assert_eq!(keyring.account, "master-key");
    }
}
