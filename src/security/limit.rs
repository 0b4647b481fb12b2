//! Access-limit descriptors attached to protected resources.

use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// How a protected resource must be accessed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMethod {
    /// Resource is hidden; requests are answered as if it did not exist.
    None,
    /// No authentication required.
    Full,
    /// A user id and a cleartext (basic) password are required.
    #[serde(alias = "basic")]
    BasicOrBetter,
    /// Challenge-response digest authentication is required.
    Digest,
}

impl AccessMethod {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Full => "full",
            Self::BasicOrBetter => "basic",
            Self::Digest => "digest",
        }
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "full" => Ok(Self::Full),
            "basic" | "basic_or_better" => Ok(Self::BasicOrBetter),
            "digest" => Ok(Self::Digest),
            other => Err(format!("unknown access method: {other}")),
        }
    }
}

/// Policy resolved for a single request path.
///
/// `group` is the opaque reference the credential store uses to decide whether
/// a particular user may pass this limit; the engine only forwards it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessLimit {
    pub path: String,
    pub method: AccessMethod,
    pub secure_required: bool,
    pub group: Option<String>,
}

impl AccessLimit {
    #[must_use]
    pub fn new(path: impl Into<String>, method: AccessMethod) -> Self {
        Self {
            path: path.into(),
            method,
            secure_required: false,
            group: None,
        }
    }

    #[must_use]
    pub fn with_secure_required(mut self, secure: bool) -> Self {
        self.secure_required = secure;
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }
}
