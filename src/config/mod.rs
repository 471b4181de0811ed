use crate::error::{AgentMapError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";
pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_DATAVERSE_URL: &str = "DATAVERSE_URL";

pub const DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com";
pub const DEFAULT_GRAPH_ENDPOINT: &str = "https://graph.microsoft.com/beta";
pub const DEFAULT_DATAVERSE_API_VERSION: &str = "v9.2";

/// App registration credentials used for the client credentials flow
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// Every missing (or empty) variable is reported at once.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut read = |key: &str| match lookup(key).filter(|v| !v.trim().is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let client_id = read(ENV_CLIENT_ID);
        let client_secret = read(ENV_CLIENT_SECRET);
        let tenant_id = read(ENV_TENANT_ID);

        if !missing.is_empty() {
            return Err(AgentMapError::MissingEnv(missing));
        }

        Ok(Self {
            client_id,
            client_secret,
            tenant_id,
        })
    }
}

/// Read and normalize `DATAVERSE_URL`
pub fn dataverse_url_from_env() -> Result<String> {
    std::env::var(ENV_DATAVERSE_URL)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(|v| normalize_dataverse_url(&v))
        .ok_or_else(|| AgentMapError::MissingEnv(vec![ENV_DATAVERSE_URL.to_string()]))
}

/// Trim trailing slashes and add `https://` when no scheme is given
pub fn normalize_dataverse_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Load a `.env` file into the process environment.
///
/// An explicit path must exist; the implicit `./.env` is optional.
pub fn load_dotenv(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            dotenvy::from_path(p).map_err(|e| {
                AgentMapError::ConfigError(format!("Failed to load {}: {}", p.display(), e))
            })?;
        }
        None => match dotenvy::dotenv() {
            Ok(loaded) => tracing::debug!("Loaded environment from {}", loaded.display()),
            Err(e) if e.not_found() => {}
            Err(e) => tracing::warn!("Ignoring unreadable .env file: {}", e),
        },
    }
    Ok(())
}

/// Retry behaviour for transient API failures
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

/// Optional settings file (`config.toml`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub authority: String,
    pub graph_endpoint: String,
    pub dataverse_api_version: String,

    /// Pages to follow on paginated collections, 0 for no limit
    pub max_pages: usize,

    pub timeout_secs: u64,

    pub retry: RetrySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            authority: DEFAULT_AUTHORITY.to_string(),
            graph_endpoint: DEFAULT_GRAPH_ENDPOINT.to_string(),
            dataverse_api_version: DEFAULT_DATAVERSE_API_VERSION.to_string(),
            max_pages: 0,
            timeout_secs: 60,
            retry: RetrySettings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Load settings from an explicit file, or from the platform config
    /// directory when a `config.toml` exists there.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) => {
                if !p.exists() {
                    return Err(AgentMapError::ConfigError(format!(
                        "Config file not found: {}",
                        p.display()
                    )));
                }
                p.to_path_buf()
            }
            None => match default_config_file() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        tracing::debug!("Loading settings from {}", path.display());
        let contents = fs::read_to_string(&path)?;
        Self::from_toml(&contents)
    }
}

/// `<config dir>/agentmap/config.toml`, if the platform has a config dir
pub fn default_config_file() -> Option<PathBuf> {
    ProjectDirs::from("com", "agentmap", "agentmap").map(|dirs| dirs.config_dir().join("config.toml"))
}
