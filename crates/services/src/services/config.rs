use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub const DEFAULT_TOKEN_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_MAX_ATTACHMENT_SIZE_BYTES: u64 = 10 * 1024 * 1024;

/// Runtime configuration persisted as JSON in the asset directory. The
/// token secret is generated on first run and kept across restarts so
/// issued tokens survive a server restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub token_secret: String,
    pub token_ttl_hours: i64,
    pub max_attachment_size_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_secret: format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple()),
            token_ttl_hours: DEFAULT_TOKEN_TTL_HOURS,
            max_attachment_size_bytes: DEFAULT_MAX_ATTACHMENT_SIZE_BYTES,
        }
    }
}

/// Read the config file, falling back to defaults when it is missing or
/// unreadable. A corrupt file is replaced rather than fatal.
pub async fn load_config_from_file(path: &Path) -> Config {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "Config file is corrupt; regenerating defaults"
                );
                Config::default()
            }
        },
        Err(_) => Config::default(),
    }
}

pub async fn save_config_to_file(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let contents = serde_json::to_string_pretty(config)?;
    tokio::fs::write(path, contents).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_generates_a_secret() {
        let a = Config::default();
        let b = Config::default();
        assert!(!a.token_secret.is_empty());
        assert_ne!(a.token_secret, b.token_secret);
        assert_eq!(a.token_ttl_hours, DEFAULT_TOKEN_TTL_HOURS);
    }

    #[tokio::test]
    async fn save_and_reload_preserves_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = Config::default();
        save_config_to_file(&config, &path).await.unwrap();

        let reloaded = load_config_from_file(&path).await;
        assert_eq!(reloaded.token_secret, config.token_secret);
    }

    #[tokio::test]
    async fn missing_and_corrupt_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();

        let missing = load_config_from_file(&dir.path().join("nope.json")).await;
        assert!(!missing.token_secret.is_empty());

        let corrupt_path = dir.path().join("corrupt.json");
        tokio::fs::write(&corrupt_path, "{not json").await.unwrap();
        let corrupt = load_config_from_file(&corrupt_path).await;
        assert!(!corrupt.token_secret.is_empty());
    }
}
