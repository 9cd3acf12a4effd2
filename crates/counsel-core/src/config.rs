use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CounselError, Result};

/// Top-level configuration for the Counsel gateway.
///
/// Loaded from `~/.counsel/config.toml` by default. Each section corresponds
/// to a bounded context or cross-cutting concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CounselConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for CounselConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            backend: BackendConfig::default(),
            auth: AuthConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl CounselConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CounselConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| CounselError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Port for the HTTP API server.
    pub port: u16,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.counsel/data".to_string(),
            log_level: "info".to_string(),
            port: 4000,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Remote AI backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the inference backend.
    pub base_url: String,
    /// Outbound request timeout in seconds. Generous by default because the
    /// remote service may be cold-starting.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 120,
        }
    }
}

/// Credential issuance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Signing secret for access tokens.
    pub jwt_secret: String,
    /// Signing secret for refresh tokens.
    pub refresh_secret: String,
    /// Access token lifetime in minutes.
    pub access_ttl_minutes: i64,
    /// Refresh token lifetime in days.
    pub refresh_ttl_days: i64,
    /// Bcrypt work factor for password hashing.
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me".to_string(),
            refresh_secret: "change-me-too".to_string(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
            bcrypt_cost: 10,
        }
    }
}

/// TTLs for the advisory key-value cache, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// AI reply cache lifetime (2 hours).
    pub ai_response_ttl_secs: u64,
    /// Per-user conversation list cache lifetime (30 minutes).
    pub user_list_ttl_secs: u64,
    /// Translation cache lifetime (24 hours).
    pub translation_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ai_response_ttl_secs: 7200,
            user_list_ttl_secs: 1800,
            translation_ttl_secs: 86400,
        }
    }
}
