//! Configuration loading
//!
//! Sources, lowest to highest precedence: built-in defaults, an optional
//! YAML file, then environment variables. CLI flags are applied by the
//! binary on top of the loaded value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "cavacrm.yaml";

/// Which storage engine the process should bind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Remote when credentials are present, local otherwise
    #[default]
    Auto,
    Local,
    Remote,
}

/// Hosted backend credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,
    pub api_key: String,
    /// Path of the table API below the project URL
    #[serde(default = "default_rest_path")]
    pub rest_path: String,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            rest_path: default_rest_path(),
        }
    }

    /// Base URL of the table API, without a trailing slash
    pub fn endpoint(&self) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            self.rest_path.trim_matches('/')
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub backup_dir: PathBuf,
    pub export_dir: PathBuf,
    pub backend: BackendChoice,
    pub remote: Option<RemoteConfig>,
    /// Code that must accompany a full reset; reset is refused when unset
    pub reset_access_code: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("db/cavacrm.db"),
            backup_dir: PathBuf::from("backups"),
            export_dir: PathBuf::from("."),
            backend: BackendChoice::Auto,
            remote: None,
            reset_access_code: None,
        }
    }
}

fn default_rest_path() -> String {
    "rest/v1".to_string()
}

impl Config {
    /// Load defaults, then the config file, then the process environment
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env(std::env::vars());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::FileReadError {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Overlay environment variables
    ///
    /// `SUPABASE_URL` plus `SUPABASE_KEY` (or `SUPABASE_ANON_KEY`) configure
    /// the remote engine; `FORCE_SUPABASE=true` forces it.
    pub fn apply_env<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut url = None;
        let mut key = None;
        let mut anon_key = None;

        for (name, value) in vars {
            let value = value.trim().to_string();
            if value.is_empty() {
                continue;
            }
            match name.as_str() {
                "SUPABASE_URL" => url = Some(value),
                "SUPABASE_KEY" => key = Some(value),
                "SUPABASE_ANON_KEY" => anon_key = Some(value),
                "FORCE_SUPABASE" => {
                    if value.eq_ignore_ascii_case("true") || value == "1" {
                        self.backend = BackendChoice::Remote;
                    }
                }
                "CAVACRM_BACKEND" => match value.to_ascii_lowercase().as_str() {
                    "local" => self.backend = BackendChoice::Local,
                    "remote" => self.backend = BackendChoice::Remote,
                    "auto" => self.backend = BackendChoice::Auto,
                    other => tracing::warn!(value = other, "Ignoring unknown CAVACRM_BACKEND"),
                },
                "CAVACRM_DB_PATH" => self.database_path = PathBuf::from(value),
                "CAVACRM_BACKUP_DIR" => self.backup_dir = PathBuf::from(value),
                "CAVACRM_EXPORT_DIR" => self.export_dir = PathBuf::from(value),
                "CAVACRM_RESET_CODE" => self.reset_access_code = Some(value),
                _ => {}
            }
        }

        match (url, key.or(anon_key)) {
            (Some(url), Some(api_key)) => {
                let rest_path = self
                    .remote
                    .as_ref()
                    .map(|r| r.rest_path.clone())
                    .unwrap_or_else(default_rest_path);
                self.remote = Some(RemoteConfig {
                    url,
                    api_key,
                    rest_path,
                });
            }
            (Some(url), None) => {
                if let Some(remote) = self.remote.as_mut() {
                    remote.url = url;
                }
            }
            (None, Some(api_key)) => {
                if let Some(remote) = self.remote.as_mut() {
                    remote.api_key = api_key;
                }
            }
            (None, None) => {}
        }
    }

    /// Whether the remote engine should be tried first
    pub fn wants_remote(&self) -> bool {
        match self.backend {
            BackendChoice::Local => false,
            BackendChoice::Remote => true,
            BackendChoice::Auto => self.remote.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database_path, PathBuf::from("db/cavacrm.db"));
        assert!(!config.wants_remote());
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let config = Config::from_yaml(
            "database_path: /tmp/crm.db\nremote:\n  url: https://demo.supabase.co\n  api_key: k\n",
        )
        .unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/crm.db"));
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert!(config.wants_remote());
        assert_eq!(
            config.remote.unwrap().endpoint(),
            "https://demo.supabase.co/rest/v1"
        );
    }

    #[test]
    fn test_env_credentials_select_remote() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("SUPABASE_URL", "https://demo.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
        ]));
        assert!(config.wants_remote());
        assert_eq!(config.remote.as_ref().unwrap().api_key, "anon");
    }

    #[test]
    fn test_force_without_credentials() {
        let mut config = Config::default();
        config.apply_env(env(&[("FORCE_SUPABASE", "true")]));
        assert_eq!(config.backend, BackendChoice::Remote);
        assert!(config.wants_remote());
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_explicit_local_wins_over_credentials() {
        let mut config = Config::default();
        config.apply_env(env(&[
            ("SUPABASE_URL", "https://demo.supabase.co"),
            ("SUPABASE_KEY", "k"),
            ("CAVACRM_BACKEND", "local"),
        ]));
        assert!(!config.wants_remote());
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = Config::load(Some(&tmp.path().join("nope.yaml"))).unwrap_err();
        assert!(matches!(err, Error::FileReadError { .. }));
    }
}
