//! Server-wide fallback password.
//!
//! The vault holds a single decoded password for deployments without user
//! management, or for the one default account a config file may leave without
//! its own password. It is created empty by the startup context, written with
//! [`PasswordVault::set_password`] and shared behind an `Arc`.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{PoisonError, RwLock};
use tracing::warn;

/// Longest password the vault keeps, in characters.
pub const MAX_PASSWORD_LEN: usize = 31;

#[derive(Debug, Default)]
pub struct PasswordVault {
    password: RwLock<SecretString>,
}

impl PasswordVault {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_password(password: &str) -> Self {
        let vault = Self::new();
        vault.set_password(password);
        vault
    }

    /// Store a decoded password, truncated to [`MAX_PASSWORD_LEN`] characters.
    pub fn set_password(&self, password: &str) {
        let stored = match password.char_indices().nth(MAX_PASSWORD_LEN) {
            Some((cut, _)) => {
                warn!(
                    "fallback password longer than {} characters, truncating",
                    MAX_PASSWORD_LEN
                );
                &password[..cut]
            }
            None => password,
        };

        let mut slot = self
            .password
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = SecretString::from(stored);
    }

    /// Copy of the stored password; empty if none was ever set.
    #[must_use]
    pub fn password(&self) -> SecretString {
        self.password
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.password
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .expose_secret()
            .is_empty()
    }
}
