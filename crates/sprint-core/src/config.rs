use crate::entity::IdScheme;
use crate::error::{Result, SprintError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "sprint.yaml";

/// Longest accepted hub token lifetime: one year.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// HubSettings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubSettings {
    #[serde(default = "default_hub_name")]
    pub name: String,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// HMAC secret for access tokens. Generated at startup when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_secret: Option<String>,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

fn default_hub_name() -> String {
    "sprintPlanningHub".to_string()
}

fn default_capacity() -> usize {
    256
}

fn default_token_ttl() -> u64 {
    3600
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            name: default_hub_name(),
            capacity: default_capacity(),
            token_secret: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally reachable base URL, used to build hub URLs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    /// redb file. The in-memory store is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
    #[serde(default)]
    pub hub: HubSettings,
    #[serde(default)]
    pub id_scheme: IdScheme,
    /// Reject writes with a missing field as 400 instead of acknowledging them.
    #[serde(default)]
    pub strict_validation: bool,
}

fn default_port() -> u16 {
    7071
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            public_url: None,
            database: None,
            hub: HubSettings::default(),
            id_scheme: IdScheme::default(),
            strict_validation: false,
        }
    }
}

impl ServerConfig {
    /// Load from `path`, failing on any error-level validation finding.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: ServerConfig = serde_yaml::from_str(&data)?;
        let errors: Vec<String> = cfg
            .validate()
            .into_iter()
            .filter(|w| w.level == WarnLevel::Error)
            .map(|w| w.message)
            .collect();
        if !errors.is_empty() {
            return Err(SprintError::ConfigInvalid(errors.join("; ")));
        }
        Ok(cfg)
    }

    /// Load from `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(path, data.as_bytes())
    }

    /// `public_url` if set, else `http://localhost:{port}`.
    pub fn resolved_public_url(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.hub.name.trim().is_empty() {
            push(WarnLevel::Error, "hub.name must not be empty".into());
        } else if !self
            .hub
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            push(
                WarnLevel::Error,
                format!(
                    "hub.name '{}' must be ASCII alphanumeric, '-' or '_'",
                    self.hub.name
                ),
            );
        }
        if self.hub.capacity == 0 {
            push(WarnLevel::Error, "hub.capacity must be at least 1".into());
        }
        if self.hub.token_ttl_secs == 0 {
            push(WarnLevel::Error, "hub.token_ttl_secs must be at least 1".into());
        } else if self.hub.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            push(
                WarnLevel::Error,
                format!("hub.token_ttl_secs must be at most {MAX_TOKEN_TTL_SECS}"),
            );
        }
        match &self.hub.token_secret {
            Some(secret) if secret.len() < 16 => push(
                WarnLevel::Warning,
                "hub.token_secret is shorter than 16 characters".into(),
            ),
            None => push(
                WarnLevel::Warning,
                "hub.token_secret not set; a random secret is generated at startup".into(),
            ),
            _ => {}
        }
        if let Some(url) = &self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                push(
                    WarnLevel::Error,
                    format!("public_url '{url}' must start with http:// or https://"),
                );
            }
        }
        if self.id_scheme == IdScheme::Concat {
            push(
                WarnLevel::Warning,
                "id_scheme 'concat' can map different member tuples to one id".into(),
            );
        }
        warnings
    }
}
