//! Credentials and transport flags presented by an incoming request.
//!
//! Parsing only covers the `Authorization` header schemes the server
//! understands (`Basic` and `Digest`). Anything else is carried as an opaque
//! scheme tag with no credential material.

use base64ct::{Base64, Encoding};
use regex::Regex;
use secrecy::SecretString;
use std::{collections::HashMap, sync::LazyLock};

/// `key=value` or `key="quoted value"` pairs of a digest parameter list.
static DIGEST_PARAM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z0-9_-]+)\s*=\s*(?:"((?:[^"\\]|\\.)*)"|([^,\s]*))"#)
        .expect("digest parameter regex is valid")
});

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthScheme {
    Basic,
    Digest,
    Other(String),
}

impl AuthScheme {
    fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("basic") {
            Self::Basic
        } else if token.eq_ignore_ascii_case("digest") {
            Self::Digest
        } else {
            Self::Other(token.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("invalid base64 in basic credentials")]
    InvalidEncoding,
    #[error("basic credentials are not valid UTF-8")]
    InvalidUtf8,
    #[error("basic credentials are missing the ':' separator")]
    MissingSeparator,
    #[error("digest credentials are missing the `{0}` parameter")]
    MissingDigestParam(&'static str),
}

/// Everything a digest verifier needs to recompute the client's response.
///
/// The engine never looks inside; it only forwards the bundle.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DigestParams {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    /// The `uri` parameter as the client sent it.
    pub uri: String,
    /// The hex digest submitted by the client.
    pub response: String,
    pub qop: Option<String>,
    pub nc: Option<String>,
    pub cnonce: Option<String>,
    pub opaque: Option<String>,
    pub algorithm: Option<String>,
    /// HTTP method of the request being verified.
    pub method: String,
    /// Request target as received, including any query string.
    pub request_target: String,
}

impl DigestParams {
    /// Parse the parameter list that follows `Digest ` in an `Authorization` header.
    ///
    /// # Errors
    /// Returns an error if a required parameter is missing.
    pub fn parse(
        params: &str,
        method: &str,
        request_target: &str,
    ) -> Result<Self, CredentialsError> {
        let mut values: HashMap<String, String> = HashMap::new();
        for caps in DIGEST_PARAM.captures_iter(params) {
            let key = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .map_or("", |m| m.as_str())
                .replace("\\\"", "\"");
            values.insert(key, value);
        }

        let mut required = |name: &'static str| {
            values
                .remove(name)
                .ok_or(CredentialsError::MissingDigestParam(name))
        };

        Ok(Self {
            username: required("username")?,
            nonce: required("nonce")?,
            uri: required("uri")?,
            response: required("response")?,
            realm: values.remove("realm").unwrap_or_default(),
            qop: values.remove("qop"),
            nc: values.remove("nc"),
            cnonce: values.remove("cnonce"),
            opaque: values.remove("opaque"),
            algorithm: values.remove("algorithm"),
            method: method.to_string(),
            request_target: request_target.to_string(),
        })
    }
}

/// Immutable snapshot of the credentials attached to a request.
#[derive(Clone, Debug, Default)]
pub struct RequestCredentials {
    pub auth_scheme: Option<AuthScheme>,
    pub user_id: Option<String>,
    pub password: Option<SecretString>,
    pub digest: Option<DigestParams>,
}

impl RequestCredentials {
    /// A request that presented nothing.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn basic(user_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            auth_scheme: Some(AuthScheme::Basic),
            user_id: Some(user_id.into()),
            password: Some(SecretString::from(password.into())),
            digest: None,
        }
    }

    /// A user id with no password and no digest payload.
    #[must_use]
    pub fn user_only(user_id: impl Into<String>) -> Self {
        Self {
            auth_scheme: None,
            user_id: Some(user_id.into()),
            password: None,
            digest: None,
        }
    }

    #[must_use]
    pub fn digest(params: DigestParams) -> Self {
        Self {
            auth_scheme: Some(AuthScheme::Digest),
            user_id: Some(params.username.clone()),
            password: None,
            digest: Some(params),
        }
    }

    /// Build credentials from an `Authorization` header value.
    ///
    /// A missing header yields anonymous credentials.
    ///
    /// # Errors
    /// Returns an error if a `Basic` or `Digest` header is malformed.
    pub fn from_authorization(
        header: Option<&str>,
        method: &str,
        request_target: &str,
    ) -> Result<Self, CredentialsError> {
        let Some(header) = header.map(str::trim).filter(|h| !h.is_empty()) else {
            return Ok(Self::anonymous());
        };

        let (scheme, rest) = header.split_once(' ').unwrap_or((header, ""));
        let rest = rest.trim();

        match AuthScheme::from_token(scheme) {
            AuthScheme::Basic => {
                let decoded =
                    Base64::decode_vec(rest).map_err(|_| CredentialsError::InvalidEncoding)?;
                let decoded =
                    String::from_utf8(decoded).map_err(|_| CredentialsError::InvalidUtf8)?;
                let (user, password) = decoded
                    .split_once(':')
                    .ok_or(CredentialsError::MissingSeparator)?;
                Ok(Self::basic(user, password))
            }
            AuthScheme::Digest => Ok(Self::digest(DigestParams::parse(
                rest,
                method,
                request_target,
            )?)),
            other => Ok(Self {
                auth_scheme: Some(other),
                ..Self::default()
            }),
        }
    }

    /// The submitted user id, if present and non-empty.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Transport facts computed before evaluation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestFlags {
    pub secure_transport: bool,
    pub local_origin: bool,
    /// The request authenticated with the digest scheme.
    pub digest_requested: bool,
}
