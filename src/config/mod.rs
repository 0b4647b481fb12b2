//! Security configuration file.
//!
//! A JSON document listing groups, users and the access limits protecting
//! URL prefixes. It feeds [`crate::security::ConfigStore`] and
//! [`crate::security::PolicyTable`].

use crate::security::{AccessLimit, AccessMethod};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid security config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate {kind} `{name}`")]
    Duplicate { kind: &'static str, name: String },
    #[error("{owner} `{name}` refers to unknown group `{group}`")]
    UnknownGroup {
        owner: &'static str,
        name: String,
        group: String,
    },
    #[error("access limit path must start with '/': `{0}`")]
    InvalidPath(String),
}

const fn enabled_by_default() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    pub name: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessLimitConfig {
    pub path: String,
    pub method: AccessMethod,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub group: Option<String>,
}

impl From<&AccessLimitConfig> for AccessLimit {
    fn from(config: &AccessLimitConfig) -> Self {
        Self {
            path: config.path.clone(),
            method: config.method,
            secure_required: config.secure,
            group: config.group.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Account whose password falls back to the server-wide vault.
    #[serde(default)]
    pub default_user: Option<String>,
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    #[serde(default)]
    pub users: Vec<UserConfig>,
    #[serde(default)]
    pub access_limits: Vec<AccessLimitConfig>,
}

impl SecurityConfig {
    /// Read and validate a config file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    #[instrument]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw)?;

        debug!(
            "loaded {} users, {} groups, {} access limits",
            config.users.len(),
            config.groups.len(),
            config.access_limits.len()
        );

        Ok(config)
    }

    /// Parse and validate a config document.
    ///
    /// # Errors
    /// Returns an error on malformed JSON, duplicates or dangling group references.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut groups = HashSet::new();
        for group in &self.groups {
            if !groups.insert(group.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "group",
                    name: group.name.clone(),
                });
            }
        }

        let mut users = HashSet::new();
        for user in &self.users {
            if !users.insert(user.name.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "user",
                    name: user.name.clone(),
                });
            }
            if let Some(group) = user.group.as_deref().filter(|g| !groups.contains(g)) {
                return Err(ConfigError::UnknownGroup {
                    owner: "user",
                    name: user.name.clone(),
                    group: group.to_string(),
                });
            }
        }

        let mut paths = HashSet::new();
        for limit in &self.access_limits {
            if !limit.path.starts_with('/') {
                return Err(ConfigError::InvalidPath(limit.path.clone()));
            }
            if !paths.insert(limit.path.as_str()) {
                return Err(ConfigError::Duplicate {
                    kind: "access limit",
                    name: limit.path.clone(),
                });
            }
            if let Some(group) = limit.group.as_deref().filter(|g| !groups.contains(g)) {
                return Err(ConfigError::UnknownGroup {
                    owner: "access limit",
                    name: limit.path.clone(),
                    group: group.to_string(),
                });
            }
        }

        Ok(())
    }
}
