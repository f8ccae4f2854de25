use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_NAME: &str = "resume-coach";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine {0} directory")]
    NoDirectory(&'static str),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Top-level configuration, constructed once at startup and passed into constructors
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CoachConfig {
    pub server: ServerConfig,
    pub completion: CompletionConfig,
    pub store: StoreConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub http_addr: SocketAddr,
    /// Install a permissive CORS layer (local development only)
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors: false,
        }
    }
}

/// Settings for the completion gateway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            timeout_ms: 30_000,
        }
    }
}

impl CompletionConfig {
    /// The credential, if one is present and non-blank
    pub fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    File,
}

/// Settings for the conversation store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Directory for the file backend; resolved under the user data dir when unset
    pub path: Option<PathBuf>,
    pub retention_hours: u32,
    /// Interval of the expiry sweep; 0 disables it
    pub sweep_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: None,
            retention_hours: 24,
            sweep_interval_secs: 300,
        }
    }
}

impl StoreConfig {
    /// Resolve the session directory, falling back to the platform data directory
    pub fn resolve_path(&self) -> ConfigResult<PathBuf> {
        if let Some(path) = &self.path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_local_dir().ok_or(ConfigError::NoDirectory("data"))?;
        Ok(data_dir.join(APP_NAME).join("sessions"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

impl CoachConfig {
    /// Loads configuration from a file if it exists, otherwise returns the default config
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `.env`, the default config file and the process environment, in that order
    pub fn load() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::load_from_file(&get_default_config_file()?)?;
        config.apply_env();
        Ok(config)
    }

    /// Reject values that would make the service unusable
    pub fn validate(&self) -> ConfigResult<()> {
        if self.store.retention_hours == 0 {
            return Err(ConfigError::Invalid(
                "store.retention_hours must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from an environment lookup; blank values are ignored
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Some(model) = get("COACH_MODEL") {
            self.completion.model = model;
        }
        if let Some(path) = get("COACH_STORE_PATH") {
            self.store.path = Some(PathBuf::from(path));
        }
        if let Some(path) = get("COACH_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(path));
        }
    }
}

/// Helper function to get default config directory
pub fn get_default_config_dir() -> ConfigResult<PathBuf> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
    Ok(config_dir.join(APP_NAME))
}

/// Helper function to get default config file path
pub fn get_default_config_file() -> ConfigResult<PathBuf> {
    Ok(get_default_config_dir()?.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = CoachConfig::load_from_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, CoachConfig::default());
        assert_eq!(config.store.retention_hours, 24);
        assert_eq!(config.completion.model, "gpt-4o-mini");
    }

    #[test]
    fn partial_file_keeps_defaults_for_other_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[completion]\nmodel = \"gpt-4o\"\ntimeout_ms = 500\n\n[store]\nbackend = \"memory\"\n",
        )
        .unwrap();

        let config = CoachConfig::load_from_file(&path).unwrap();
        assert_eq!(config.completion.model, "gpt-4o");
        assert_eq!(config.completion.timeout(), Duration::from_millis(500));
        assert_eq!(config.completion.max_tokens, 1500);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store\nbackend = 1").unwrap();

        let err = CoachConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn zero_retention_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[store]\nretention_hours = 0\n").unwrap();

        let err = CoachConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(CoachConfig::default().validate().is_ok());
    }

    #[test]
    fn env_overrides_file_values_and_ignores_blanks() {
        let env: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-env"),
            ("COACH_MODEL", "  "),
            ("COACH_STORE_PATH", "/var/lib/coach"),
        ]
        .into_iter()
        .collect();

        let mut config = CoachConfig::default();
        config.apply_env_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.completion.credential(), Some("sk-env"));
        assert_eq!(config.completion.model, "gpt-4o-mini");
        assert_eq!(config.store.path, Some(PathBuf::from("/var/lib/coach")));
        assert_eq!(config.catalog.path, None);
    }

    #[test]
    fn example_config_parses() {
        let config: CoachConfig =
            toml::from_str(include_str!("../../config/coach.example.toml")).unwrap();
        assert_eq!(config.store.backend, StoreBackend::File);
        assert_eq!(config.completion.credential(), None);
        assert!(config.catalog.path.is_some());
    }

    #[test]
    fn blank_credential_counts_as_absent() {
        let mut completion = CompletionConfig::default();
        assert_eq!(completion.credential(), None);
        completion.api_key = Some("   ".to_string());
        assert_eq!(completion.credential(), None);
    }
}
