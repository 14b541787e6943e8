//! Runtime configuration for gemini-relay.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! The API key is never part of the file; it is injected at start-up from the
//! command line or the `GEMINI_API_KEY` environment variable.

use std::fmt;
use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "gemini-relay", about = "Streaming Gemini prompt relay")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address (overrides the config file).
    #[arg(long)]
    pub listen: Option<String>,

    /// Gemini API key.
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Process-wide credential for the remote model API.
///
/// Set once at start-up and shared read-only afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key, rejecting blank values.
    pub fn new(key: impl Into<String>) -> Result<Self, RelayError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(RelayError::MissingApiKey);
        }
        Ok(Self(key))
    }

    /// Resolve the key from the parsed CLI (which already folds in the environment).
    pub fn from_cli(cli: &Cli) -> Result<Self, RelayError> {
        match &cli.api_key {
            Some(key) => Self::new(key.clone()),
            None => Err(RelayError::MissingApiKey),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Remote model configuration.
    pub model: ModelConfig,

    /// Vision upload handling.
    pub vision: VisionConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:8000").
    pub listen: String,

    /// Maximum request body size in bytes (bounds `/vision` uploads).
    pub max_body_bytes: usize,

    /// Capacity of the per-request fragment channel.
    pub stream_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8000".to_string(),
            max_body_bytes: 20 * 1024 * 1024, // 20 MiB
            stream_buffer: 32,
        }
    }
}

/// Remote generative model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Model identifier used for both text and vision prompts.
    pub name: String,

    /// API base URL (override for testing or proxies).
    pub base_url: String,

    /// Whole-request timeout for the outbound call in seconds (0 = none).
    pub request_timeout_secs: u64,

    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            request_timeout_secs: 0,
            connect_timeout_secs: 10,
        }
    }
}

/// Vision upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Mime type attached to every uploaded image.
    pub mime_type: String,

    /// Use the multipart part's declared content type instead of `mime_type`.
    pub trust_upload_content_type: bool,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            mime_type: "image/jpeg".to_string(),
            trust_upload_content_type: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)
                .map_err(|e| RelayError::Config(format!("{}: {e}", path.display())))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }

    /// Apply command-line overrides on top of the loaded file.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.model.name.trim().is_empty() {
            return Err(RelayError::Config("model.name must not be empty".into()));
        }
        if self.server.stream_buffer == 0 {
            return Err(RelayError::Config(
                "server.stream_buffer must be at least 1".into(),
            ));
        }
        if self.vision.mime_type.trim().is_empty() {
            return Err(RelayError::Config("vision.mime_type must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.model.name, "gemini-2.5-flash");
        assert_eq!(cfg.vision.mime_type, "image/jpeg");
        assert!(!cfg.vision.trust_upload_content_type);
        assert_eq!(cfg.server.stream_buffer, 32);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"model": {{"name": "gemini-2.0-flash"}}}}"#).unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(cfg.model.name, "gemini-2.0-flash");
        assert_eq!(
            cfg.model.base_url,
            "https://generativelanguage.googleapis.com"
        );
        assert_eq!(cfg.server.listen, "0.0.0.0:8000");
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg.server.max_body_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"server": {{"stream_buffer": 0}}}}"#).unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_blank_api_key_rejected() {
        assert!(matches!(ApiKey::new("  "), Err(RelayError::MissingApiKey)));
        let key = ApiKey::new("secret").unwrap();
        assert_eq!(key.expose(), "secret");
        assert!(!format!("{key:?}").contains("secret"));
    }

    #[test]
    fn test_cli_listen_override() {
        let cli = Cli::parse_from(["gemini-relay", "--listen", "127.0.0.1:9000"]);
        let mut cfg = Config::default();
        cfg.apply_cli(&cli);
        assert_eq!(cfg.server.listen, "127.0.0.1:9000");
    }
}
