use std::{
    fs, io,
    path::{Path, PathBuf},
};

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

/// Where the database lives and where the master key comes from.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Override for the SQLite database file.
    pub database: Option<PathBuf>,
    /// OS keyring entry holding the master key.
    pub keyring: Option<KeyringConfig>,
    /// Base64 master key; bypasses the keyring. `SEALED_MASTER_KEY` wins over it.
    pub master_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct KeyringConfig {
    pub service: String,
    pub account: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            service: "sealed".into(),
            account: "master-key".into(),
        }
    }
}

/// Read `config.toml` from the platform config dir; no file means defaults.
pub fn load() -> Result<Config> {
    load_from_path(default_path()?)
}

/// Parse the TOML file at `path`. A missing or blank file yields
/// [`Config::default`], so the keyring and data-dir defaults apply.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(err) => return Err(err).wrap_err_with(|| format!("reading {}", path.display())),
    };
    if contents.trim().is_empty() {
        return Ok(Config::default());
    }
    toml::from_str(&contents).wrap_err_with(|| format!("parsing {}", path.display()))
}

/// `<config_dir>/sealed/config.toml`.
pub fn default_path() -> Result<PathBuf> {
    let base = config_dir().ok_or_else(|| eyre!("no config dir available"))?;
    Ok(base.join("sealed").join("config.toml"))
}

/// Persist `config` at the default path. An existing file is left untouched
/// and its path returned.
pub fn write_default_if_missing(config: &Config) -> Result<PathBuf> {
    write_if_missing(config, &default_path()?)
}

fn write_if_missing(config: &Config, path: &Path) -> Result<PathBuf> {
    if path.exists() {
        return Ok(path.to_path_buf());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = toml::to_string_pretty(config)?;
    fs::write(path, body)?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_default_when_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = load_from_path(dir.path().join("config.toml")).expect("load");
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn parses_custom_config() {
        let contents = r#"
            database = "/tmp/sealed/apps.db"
            master_key = "c2VjcmV0"
            [keyring]
            service = "sealed-ci"
            account = "ci"
        "#;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, contents).expect("write temp config");

        let cfg = load_from_path(&path).expect("load");
        assert_eq!(
            cfg,
            Config {
                database: Some(PathBuf::from("/tmp/sealed/apps.db")),
                keyring: Some(KeyringConfig {
                    service: "sealed-ci".into(),
                    account: "ci".into(),
                }),
                master_key: Some("c2VjcmV0".into()),
            }
        );
    }

    #[test]
    fn blank_file_means_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "  \n").expect("write");
        assert_eq!(load_from_path(&path).expect("load"), Config::default());
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "database = [").expect("write");
        let err = load_from_path(&path).expect_err("malformed");
        assert!(format!("{err}").contains("config.toml"));
    }

    #[test]
    fn write_default_creates_file_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");
        let cfg = Config {
            database: Some(PathBuf::from("/tmp/sealed/apps.db")),
            keyring: Some(KeyringConfig::default()),
            master_key: None,
        };

        write_if_missing(&cfg, &path).expect("write should succeed");
        let other = Config::default();
        let second = write_if_missing(&other, &path).expect("second write ok");
        assert_eq!(second, path);
        assert_eq!(load_from_path(&path).expect("load"), cfg);
    }
}
