//! Credential lookups consumed by the decision engine.

use super::{limit::AccessLimit, vault::PasswordVault};
use crate::config::SecurityConfig;
use secrecy::SecretString;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("credential store unavailable: {0}")]
    Unavailable(String),
}

pub trait CredentialStore: Send + Sync {
    /// Whether `user_id` is a known account.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot answer.
    fn user_exists(&self, user_id: &str) -> Result<bool, StoreError>;

    /// Whether `user_id` may pass `limit`.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot answer.
    fn user_can_access(&self, user_id: &str, limit: &AccessLimit) -> Result<bool, StoreError>;

    /// The decoded password for `user_id`, or `None` when none is available.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot answer.
    fn user_password(&self, user_id: &str) -> Result<Option<SecretString>, StoreError>;
}

/// Store used when no user management is configured.
///
/// Nobody is a known user, everybody may access everything, and the only
/// password is the server-wide fallback held by the vault.
#[derive(Debug, Clone)]
pub struct NullStore {
    vault: Arc<PasswordVault>,
}

impl NullStore {
    #[must_use]
    pub fn new(vault: Arc<PasswordVault>) -> Self {
        Self { vault }
    }
}

impl CredentialStore for NullStore {
    fn user_exists(&self, _user_id: &str) -> Result<bool, StoreError> {
        Ok(false)
    }

    fn user_can_access(&self, _user_id: &str, _limit: &AccessLimit) -> Result<bool, StoreError> {
        Ok(true)
    }

    fn user_password(&self, _user_id: &str) -> Result<Option<SecretString>, StoreError> {
        Ok(Some(self.vault.password()))
    }
}

#[derive(Debug)]
struct UserRecord {
    password: Option<SecretString>,
    group: Option<String>,
    enabled: bool,
}

/// In-memory store built from the security config file.
#[derive(Debug)]
pub struct ConfigStore {
    users: HashMap<String, UserRecord>,
    groups: HashMap<String, bool>,
    default_user: Option<String>,
    vault: Arc<PasswordVault>,
}

impl ConfigStore {
    #[must_use]
    pub fn new(config: &SecurityConfig, vault: Arc<PasswordVault>) -> Self {
        let users = config
            .users
            .iter()
            .map(|user| {
                (
                    user.name.clone(),
                    UserRecord {
                        password: user.password.clone().map(SecretString::from),
                        group: user.group.clone(),
                        enabled: user.enabled,
                    },
                )
            })
            .collect();

        let groups = config
            .groups
            .iter()
            .map(|group| (group.name.clone(), group.enabled))
            .collect();

        Self {
            users,
            groups,
            default_user: config.default_user.clone(),
            vault,
        }
    }
}

impl CredentialStore for ConfigStore {
    fn user_exists(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(user_id))
    }

    fn user_can_access(&self, user_id: &str, limit: &AccessLimit) -> Result<bool, StoreError> {
        let Some(user) = self.users.get(user_id) else {
            return Ok(false);
        };
        if !user.enabled {
            return Ok(false);
        }

        Ok(match limit.group.as_deref() {
            None => true,
            Some(required) => {
                user.group.as_deref() == Some(required)
                    && self.groups.get(required).copied().unwrap_or(false)
            }
        })
    }

    fn user_password(&self, user_id: &str) -> Result<Option<SecretString>, StoreError> {
        let Some(user) = self.users.get(user_id) else {
            return Ok(None);
        };
        if let Some(password) = &user.password {
            return Ok(Some(password.clone()));
        }

        // The default account borrows the server-wide password.
        if self.default_user.as_deref() == Some(user_id) && !self.vault.is_empty() {
            return Ok(Some(self.vault.password()));
        }

        Ok(None)
    }
}
