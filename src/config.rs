//! Configuration loader and validator for the course player.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub remote: Remote,
    pub auth: Auth,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub position_save_interval_seconds: u64,
}

/// Remote course store settings (REST API + object storage).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Remote {
    pub base_url: String,
    pub project_key: String,
    pub storage: Storage,
}

/// Object storage settings for native video files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Storage {
    pub bucket: String,
    pub signed_url_ttl_seconds: u64,
}

/// Identity provider settings. An empty `session_token` means the player
/// runs anonymously: catalog browsing works, progress writes are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Auth {
    pub token_url: String,
    pub session_token: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.position_save_interval_seconds == 0 {
        return Err(ConfigError::Invalid(
            "app.position_save_interval_seconds must be > 0",
        ));
    }

    if cfg.remote.base_url.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.base_url must be non-empty"));
    }
    if cfg.remote.project_key.trim().is_empty() {
        return Err(ConfigError::Invalid("remote.project_key must be non-empty"));
    }

    if cfg.remote.storage.bucket.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "remote.storage.bucket must be non-empty",
        ));
    }
    if cfg.remote.storage.signed_url_ttl_seconds == 0 {
        return Err(ConfigError::Invalid(
            "remote.storage.signed_url_ttl_seconds must be > 0",
        ));
    }

    // A session token without a token endpoint can never be exchanged.
    if !cfg.auth.session_token.trim().is_empty() && cfg.auth.token_url.trim().is_empty() {
        return Err(ConfigError::Invalid(
            "auth.token_url must be non-empty when auth.session_token is set",
        ));
    }

    Ok(())
}

/// Returns an example YAML config document.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  position_save_interval_seconds: 5

remote:
  base_url: "https://YOUR-PROJECT.supabase.co"
  project_key: "YOUR_PROJECT_API_KEY"
  storage:
    bucket: "course-videos"
    signed_url_ttl_seconds: 3600

auth:
  token_url: "https://YOUR-PROJECT.supabase.co/auth/v1/token?grant_type=refresh_token"
  session_token: ""
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parse_example_ok() {
        let cfg: Config = serde_yaml::from_str(example()).unwrap();
        validate(&cfg).unwrap();
    }

    #[test]
    fn invalid_base_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.base_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("remote.base_url")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_project_key_and_bucket() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.project_key = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("project_key")),
            _ => panic!("wrong error"),
        }

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.storage.bucket = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("storage.bucket")),
            _ => panic!("wrong error"),
        }
    }

    #[test]
    fn invalid_intervals() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.position_save_interval_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.remote.storage.signed_url_ttl_seconds = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn session_token_requires_token_url() {
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.auth.session_token = "some-refresh-token".into();
        cfg.auth.token_url = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("auth.token_url")),
            _ => panic!("wrong error"),
        }

        // Anonymous config (both empty) stays valid.
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.auth.token_url = "".into();
        cfg.auth.session_token = "".into();
        validate(&cfg).unwrap();
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg: Config = serde_yaml::from_str(example()).unwrap();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        let mut f = fs::File::create(&p).unwrap();
        f.write_all(example().as_bytes()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.remote.storage.bucket, "course-videos");
        assert_eq!(cfg.app.position_save_interval_seconds, 5);
    }
}
