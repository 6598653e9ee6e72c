//! Endpoint configuration
//!
//! Each LGU runs its own eBPLS backend. The API base URL is either typed in
//! by hand or picked from the municipality presets below, and the choice
//! is persisted in a small YAML file. Environment variables (and `.env`)
//! can override both for scripted use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ebpls_client::{ClientError, ClientTimeouts, HttpClient};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default store location when `EBPLS_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "ebpls.yaml";

/// Municipality code → API base URL (Leyte LGUs)
pub const MUNICIPALITY_APIS: &[(&str, &str)] = &[
    ("abuyog", "http://192.168.1.101:8080/ebpls/api/mobile"),
    ("alangalang", "http://192.168.1.102:8080/ebpls/api/mobile"),
    ("albuera", "http://192.168.1.103:8080/ebpls/api/mobile"),
    ("babatngon", "http://192.168.1.104:8080/ebpls/api/mobile"),
    ("barugo", "http://192.168.1.105:8080/ebpls/api/mobile"),
    ("bato", "http://192.168.1.106:8080/ebpls/api/mobile"),
    ("baybay", "http://192.168.0.180:8080/ebpls/api/mobile"),
    ("burauen", "http://192.168.1.108:8080/ebpls/api/mobile"),
    ("calubian", "http://192.168.1.109:8080/ebpls/api/mobile"),
    ("capoocan", "http://192.168.1.110:8080/ebpls/api/mobile"),
    ("carigara", "http://192.168.1.111:8080/ebpls/api/mobile"),
    ("dagami", "http://192.168.1.112:8080/ebpls/api/mobile"),
    ("dulag", "http://192.168.1.113:8080/ebpls/api/mobile"),
    ("hilongos", "http://192.168.1.114:8080/ebpls/api/mobile"),
    ("hindang", "http://192.168.1.115:8080/ebpls/api/mobile"),
    ("inopacan", "http://192.168.1.116:8080/ebpls/api/mobile"),
    ("isabel", "http://192.168.1.117:8080/ebpls/api/mobile"),
    ("jaro", "http://192.168.1.118:8080/ebpls/api/mobile"),
    ("javier", "http://192.168.1.119:8080/ebpls/api/mobile"),
    ("julita", "http://192.168.1.120:8080/ebpls/api/mobile"),
    ("kananga", "http://192.168.1.121:8080/ebpls/api/mobile"),
    ("lapaz", "http://192.168.1.122:8080/ebpls/api/mobile"),
    ("leyte", "http://192.168.1.123:8080/ebpls/api/mobile"),
    ("macarthur", "http://192.168.1.124:8080/ebpls/api/mobile"),
    ("mahaplag", "http://192.168.1.125:8080/ebpls/api/mobile"),
    ("matagob", "http://192.168.1.126:8080/ebpls/api/mobile"),
    ("matalom", "http://192.168.1.127:8080/ebpls/api/mobile"),
    ("mayorga", "http://192.168.1.128:8080/ebpls/api/mobile"),
    ("merida", "http://192.168.1.129:8080/ebpls/api/mobile"),
    ("palo", "http://192.168.1.130:8080/ebpls/api/mobile"),
    ("palompon", "http://192.168.1.131:8080/ebpls/api/mobile"),
    ("pastrana", "http://192.168.1.132:8080/ebpls/api/mobile"),
    ("sanisidro", "http://192.168.1.133:8080/ebpls/api/mobile"),
    ("sanmiguel", "http://192.168.1.134:8080/ebpls/api/mobile"),
    ("santafe", "http://192.168.1.135:8080/ebpls/api/mobile"),
    ("tabango", "http://192.168.1.136:8080/ebpls/api/mobile"),
    ("tanauan", "http://192.168.1.137:8080/ebpls/api/mobile"),
    ("tolosa", "http://192.168.1.138:8080/ebpls/api/mobile"),
    ("tunga", "http://192.168.1.139:8080/ebpls/api/mobile"),
    ("villaba", "http://192.168.1.140:8080/ebpls/api/mobile"),
];

pub fn municipality_api_url(code: &str) -> Option<&'static str> {
    MUNICIPALITY_APIS
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, url)| *url)
}

pub fn available_municipalities() -> Vec<&'static str> {
    MUNICIPALITY_APIS.iter().map(|(code, _)| *code).collect()
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API configuration not set. Please configure in settings.")]
    NotConfigured,

    #[error("Manual API URL not configured")]
    ManualUrlMissing,

    #[error("Municipality not selected")]
    MunicipalityMissing,

    #[error("API URL not found for municipality: {0}")]
    UnknownMunicipality(String),

    #[error("Invalid municipality: {0}")]
    InvalidMunicipality(String),

    #[error("invalid API URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidEnv { key: String, value: String },

    #[error("failed to access config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Which kind of endpoint the user picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOption {
    Manual,
    Municipality,
}

/// On-disk shape of the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    #[serde(default)]
    pub option: Option<ConfigOption>,
    #[serde(default)]
    pub manual_url: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
}

impl StoredConfig {
    pub fn is_configured(&self) -> bool {
        match self.option {
            Some(ConfigOption::Manual) => self.manual_url.as_deref().is_some_and(|u| !u.is_empty()),
            Some(ConfigOption::Municipality) => {
                self.municipality.as_deref().is_some_and(|m| !m.is_empty())
            }
            None => false,
        }
    }

    /// The API base URL this configuration points at
    pub fn resolve_base_url(&self) -> Result<String, ConfigError> {
        match self.option {
            None => Err(ConfigError::NotConfigured),
            Some(ConfigOption::Manual) => self
                .manual_url
                .clone()
                .filter(|u| !u.is_empty())
                .ok_or(ConfigError::ManualUrlMissing),
            Some(ConfigOption::Municipality) => {
                let code = self
                    .municipality
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .ok_or(ConfigError::MunicipalityMissing)?;
                municipality_api_url(code)
                    .map(str::to_string)
                    .ok_or_else(|| ConfigError::UnknownMunicipality(code.to_string()))
            }
        }
    }
}

/// File-backed endpoint configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    stored: StoredConfig,
}

impl ConfigStore {
    /// Open the store at `path`; a missing file is an empty configuration
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let stored = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => StoredConfig::default(),
            Ok(content) => serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoredConfig::default(),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        Ok(Self { path, stored })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stored(&self) -> &StoredConfig {
        &self.stored
    }

    pub fn is_configured(&self) -> bool {
        self.stored.is_configured()
    }

    pub fn resolve_base_url(&self) -> Result<String, ConfigError> {
        self.stored.resolve_base_url()
    }

    pub fn set_manual_url(&mut self, url: &str) -> Result<(), ConfigError> {
        let url = validate_base_url(url)?;
        self.stored = StoredConfig {
            option: Some(ConfigOption::Manual),
            manual_url: Some(url.clone()),
            municipality: None,
        };
        self.save()?;
        tracing::info!(url = %url, "Manual API URL set");
        Ok(())
    }

    pub fn set_municipality(&mut self, code: &str) -> Result<(), ConfigError> {
        let Some(url) = municipality_api_url(code) else {
            return Err(ConfigError::InvalidMunicipality(code.to_string()));
        };
        self.stored = StoredConfig {
            option: Some(ConfigOption::Municipality),
            manual_url: None,
            municipality: Some(code.to_string()),
        };
        self.save()?;
        tracing::info!(municipality = code, url, "Municipality set");
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), ConfigError> {
        self.stored = StoredConfig::default();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ConfigError::Io {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        }
        tracing::info!(path = %self.path.display(), "API configuration cleared");
        Ok(())
    }

    fn save(&self) -> Result<(), ConfigError> {
        let io = |e| ConfigError::Io {
            path: self.path.display().to_string(),
            source: e,
        };
        let yaml = serde_yaml::to_string(&self.stored).map_err(|e| ConfigError::Parse {
            path: self.path.display().to_string(),
            source: e,
        })?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(io)?;
        }
        std::fs::write(&self.path, yaml).map_err(io)
    }
}

/// Accept only absolute http(s) URLs; the trailing slash is dropped
pub fn validate_base_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|e| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl {
            url: raw.to_string(),
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

// =============================================================================
// PROCESS CONFIGURATION
// =============================================================================

/// Everything needed to talk to a backend, assembled from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store_path: PathBuf,
    /// `EBPLS_API_URL`, wins over everything else
    pub api_url: Option<String>,
    /// `EBPLS_MUNICIPALITY`, wins over the store
    pub municipality: Option<String>,
    pub timeouts: ClientTimeouts,
}

impl AppConfig {
    /// Read the process environment, after loading `.env` if present
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut timeouts = ClientTimeouts::default();
        if let Some(secs) = seconds(&var, "EBPLS_DIRECTORY_TIMEOUT_SECS")? {
            timeouts.directory = secs;
        }
        if let Some(secs) = seconds(&var, "EBPLS_APPLICATION_TIMEOUT_SECS")? {
            timeouts.application = secs;
        }

        let store_path = var("EBPLS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                tracing::debug!("EBPLS_CONFIG not set, using default: {DEFAULT_CONFIG_FILE}");
                PathBuf::from(DEFAULT_CONFIG_FILE)
            });

        Ok(Self {
            store_path,
            api_url: var("EBPLS_API_URL").map(|u| validate_base_url(&u)).transpose()?,
            municipality: var("EBPLS_MUNICIPALITY"),
            timeouts,
        })
    }

    pub fn store(&self) -> Result<ConfigStore, ConfigError> {
        ConfigStore::open(&self.store_path)
    }

    pub fn base_url(&self) -> Result<String, ConfigError> {
        if let Some(url) = &self.api_url {
            return Ok(url.clone());
        }
        if let Some(code) = &self.municipality {
            return municipality_api_url(code)
                .map(str::to_string)
                .ok_or_else(|| ConfigError::UnknownMunicipality(code.clone()));
        }
        self.store()?.resolve_base_url()
    }

    pub fn http_client(&self) -> Result<HttpClient, ConfigError> {
        let base_url = self.base_url()?;
        tracing::info!(base_url = %base_url, "Using eBPLS API");
        Ok(HttpClient::new(&base_url, self.timeouts)?)
    }
}

fn seconds(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = var(key) else {
        return Ok(None);
    };
    match value.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Some(Duration::from_secs(secs))),
        _ => {
            tracing::warn!("Invalid {key} value: {value}");
            Err(ConfigError::InvalidEnv {
                key: key.to_string(),
                value,
            })
        }
    }
}
