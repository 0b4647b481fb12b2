//! Path to access-limit resolution.

use super::limit::AccessLimit;
use crate::config::SecurityConfig;
use std::collections::HashMap;

pub trait AccessPolicyResolver: Send + Sync {
    /// The limit protecting `path`, or `None` when the path is unrestricted.
    fn resolve(&self, path: &str) -> Option<AccessLimit>;
}

/// Resolver for servers without user management: nothing is protected.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unrestricted;

impl AccessPolicyResolver for Unrestricted {
    fn resolve(&self, _path: &str) -> Option<AccessLimit> {
        None
    }
}

/// Access limits keyed by URL prefix.
///
/// Lookup tries the full path, then walks up one segment at a time
/// (`/a/b/c`, `/a/b/`, `/a/b`, `/a/`, `/a`, `/`) and returns the first hit.
#[derive(Clone, Debug, Default)]
pub struct PolicyTable {
    limits: HashMap<String, AccessLimit>,
}

impl PolicyTable {
    #[must_use]
    pub fn new(limits: impl IntoIterator<Item = AccessLimit>) -> Self {
        Self {
            limits: limits
                .into_iter()
                .map(|limit| (limit.path.clone(), limit))
                .collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.access_limits.iter().map(AccessLimit::from))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.limits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }
}

impl AccessPolicyResolver for PolicyTable {
    fn resolve(&self, path: &str) -> Option<AccessLimit> {
        let mut candidate = path;
        loop {
            if let Some(limit) = self.limits.get(candidate) {
                return Some(limit.clone());
            }

            let trimmed = candidate.trim_end_matches('/');
            if trimmed.is_empty() {
                return None;
            }
            if trimmed.len() != candidate.len() {
                if let Some(limit) = self.limits.get(trimmed) {
                    return Some(limit.clone());
                }
            }

            let cut = trimmed.rfind('/')?;
            candidate = &trimmed[..=cut];
        }
    }
}
