//! Backend selection
//!
//! Runs once at startup and yields the single [`Store`] the rest of the
//! process talks to. A remote engine that cannot be built downgrades to the
//! local engine with a warning; selection never fails half-way.

use tracing::{info, warn};

use crate::config::{BackendChoice, Config};
use crate::error::{Error, Result};
use crate::store::{LocalStore, RemoteStore, Store};

pub use crate::store::BackendKind;

/// Bind the engine requested by `config`
///
/// Remote is tried when forced or when credentials are present in `auto`
/// mode. In `auto` mode an unreachable remote also falls back; a forced
/// remote is kept so the first call reports the connectivity failure.
pub async fn open_store(config: &Config) -> Result<Box<dyn Store>> {
    if config.wants_remote() {
        match remote_store(config).await {
            Ok(store) => return Ok(store),
            Err(e) => warn!(error = %e, "Remote backend unavailable, falling back to local"),
        }
    }

    let store = LocalStore::open(&config.database_path)?;
    info!(path = %config.database_path.display(), "Using local backend");
    Ok(Box::new(store))
}

async fn remote_store(config: &Config) -> Result<Box<dyn Store>> {
    let remote = config.remote.as_ref().ok_or_else(|| Error::Config {
        message: "remote backend requested but SUPABASE_URL/SUPABASE_KEY are not set".to_string(),
    })?;
    let store = RemoteStore::connect(remote)?;

    if config.backend == BackendChoice::Auto {
        store.ping().await?;
    } else if let Err(e) = store.ping().await {
        warn!(error = %e, "Remote backend did not answer the startup check");
    }

    info!(url = %remote.url, "Using remote backend");
    Ok(Box::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RemoteConfig;
    use tempfile::TempDir;

    fn local_config(tmp: &TempDir) -> Config {
        Config {
            database_path: tmp.path().join("crm.db"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_defaults_to_local() {
        let tmp = TempDir::new().unwrap();
        let store = open_store(&local_config(&tmp)).await.unwrap();
        assert_eq!(store.kind(), BackendKind::Local);
        assert!(tmp.path().join("crm.db").exists());
    }

    #[tokio::test]
    async fn test_forced_remote_without_credentials_falls_back() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            backend: BackendChoice::Remote,
            ..local_config(&tmp)
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.kind(), BackendKind::Local);
    }

    #[tokio::test]
    async fn test_invalid_remote_url_falls_back() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            backend: BackendChoice::Remote,
            remote: Some(RemoteConfig::new("not a url", "key")),
            ..local_config(&tmp)
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.kind(), BackendKind::Local);
    }

    #[tokio::test]
    async fn test_explicit_local_ignores_credentials() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            backend: BackendChoice::Local,
            remote: Some(RemoteConfig::new("https://demo.supabase.co", "key")),
            ..local_config(&tmp)
        };
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.kind(), BackendKind::Local);
    }
}
