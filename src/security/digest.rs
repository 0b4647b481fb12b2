//! Digest authentication (RFC 2617, MD5).
//!
//! Two expected responses are computed for every request: the standard one,
//! over the `uri` parameter the client signed, and a URL-qualified one, over
//! the request target the server actually received. Clients behind proxies or
//! with query strings do not agree on which of the two they sign.
//!
//! Before either is computed the bundle must be bound to this server and this
//! request: the realm is ours, the `uri` names the same path as the received
//! target, and the nonce was issued by this process and has not expired.
//! Nonces are `timestamp | salt | HMAC-SHA256(timestamp | salt | realm)` under
//! a key drawn at startup, so nothing has to be remembered between requests.

use super::credentials::DigestParams;
use hmac::{
    digest::{Key, KeyInit},
    Hmac, Mac,
};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// How long an issued nonce is accepted.
pub const DEFAULT_NONCE_TTL: Duration = Duration::from_secs(300);

// Allowed clock skew for nonces stamped in the future.
const NONCE_SKEW_SECS: u64 = 5;
const NONCE_PREFIX_LEN: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DigestRejection {
    #[error("realm `{0}` is not served here")]
    RealmMismatch(String),
    #[error("uri `{uri}` does not name the requested target `{target}`")]
    UriMismatch { uri: String, target: String },
    #[error("nonce was not issued by this server")]
    UnknownNonce,
    #[error("nonce has expired")]
    StaleNonce,
}

pub trait DigestVerifier: Send + Sync {
    /// Fresh nonce for a `WWW-Authenticate` challenge.
    fn issue_nonce(&self) -> String;

    /// Accept the bundle only if it is bound to this server and this request.
    ///
    /// # Errors
    /// Returns the reason the bundle cannot be verified.
    fn check(&self, params: &DigestParams) -> Result<(), DigestRejection>;

    /// Expected response over the client's `uri` parameter.
    fn compute_digest(&self, params: &DigestParams, password: &SecretString) -> String;

    /// Expected response over the request target as received.
    fn compute_url_digest(&self, params: &DigestParams, password: &SecretString) -> String;
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

/// Path of a request target or digest `uri`, without scheme, authority or query.
fn target_path(uri: &str) -> &str {
    let path = match uri.find("://") {
        Some(at) => {
            let rest = &uri[at + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => uri,
    };
    path.split(&['?', '#'][..]).next().unwrap_or(path)
}

#[derive(Clone)]
pub struct Md5DigestVerifier {
    realm: String,
    mac: HmacSha256,
    nonce_ttl: Duration,
}

impl std::fmt::Debug for Md5DigestVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Md5DigestVerifier")
            .field("realm", &self.realm)
            .field("nonce_ttl", &self.nonce_ttl)
            .finish_non_exhaustive()
    }
}

impl Md5DigestVerifier {
    /// Verifier for `realm` with a nonce key drawn from the OS RNG.
    #[must_use]
    pub fn new(realm: impl Into<String>) -> Self {
        let mut key = Key::<HmacSha256>::default();
        rand::thread_rng().fill_bytes(&mut key);

        Self {
            realm: realm.into(),
            mac: <HmacSha256 as KeyInit>::new(&key),
            nonce_ttl: DEFAULT_NONCE_TTL,
        }
    }

    #[must_use]
    pub fn with_nonce_ttl(mut self, ttl: Duration) -> Self {
        self.nonce_ttl = ttl;
        self
    }

    #[must_use]
    pub fn realm(&self) -> &str {
        &self.realm
    }

    fn nonce_mac(&self, prefix: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(prefix.as_bytes());
        mac.update(b":");
        mac.update(self.realm.as_bytes());
        mac
    }

    fn nonce_at(&self, timestamp: u64) -> String {
        let mut salt = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut salt);

        let prefix = format!("{timestamp:016x}{}", hex::encode(salt));
        let tag = self.nonce_mac(&prefix).finalize().into_bytes();
        format!("{prefix}{}", hex::encode(tag))
    }

    fn check_nonce_at(&self, nonce: &str, now: u64) -> Result<(), DigestRejection> {
        if !nonce.is_ascii() {
            return Err(DigestRejection::UnknownNonce);
        }
        let (prefix, tag) = nonce
            .split_at_checked(NONCE_PREFIX_LEN)
            .ok_or(DigestRejection::UnknownNonce)?;
        let tag = hex::decode(tag).map_err(|_| DigestRejection::UnknownNonce)?;
        self.nonce_mac(prefix)
            .verify_slice(&tag)
            .map_err(|_| DigestRejection::UnknownNonce)?;

        let issued = u64::from_str_radix(&prefix[..16], 16)
            .map_err(|_| DigestRejection::UnknownNonce)?;
        if issued > now + NONCE_SKEW_SECS {
            return Err(DigestRejection::UnknownNonce);
        }
        if now.saturating_sub(issued) > self.nonce_ttl.as_secs() {
            return Err(DigestRejection::StaleNonce);
        }

        Ok(())
    }

    fn response_for(&self, params: &DigestParams, password: &SecretString, uri: &str) -> String {
        let ha1 = md5_hex(&format!(
            "{}:{}:{}",
            params.username,
            self.realm,
            password.expose_secret()
        ));
        let ha2 = md5_hex(&format!("{}:{}", params.method, uri));

        match &params.qop {
            Some(qop) => md5_hex(&format!(
                "{ha1}:{}:{}:{}:{qop}:{ha2}",
                params.nonce,
                params.nc.as_deref().unwrap_or_default(),
                params.cnonce.as_deref().unwrap_or_default(),
            )),
            None => md5_hex(&format!("{ha1}:{}:{ha2}", params.nonce)),
        }
    }
}

impl DigestVerifier for Md5DigestVerifier {
    fn issue_nonce(&self) -> String {
        self.nonce_at(unix_now())
    }

    fn check(&self, params: &DigestParams) -> Result<(), DigestRejection> {
        if params.realm != self.realm {
            return Err(DigestRejection::RealmMismatch(params.realm.clone()));
        }

        if target_path(&params.uri) != target_path(&params.request_target) {
            return Err(DigestRejection::UriMismatch {
                uri: params.uri.clone(),
                target: params.request_target.clone(),
            });
        }

        self.check_nonce_at(&params.nonce, unix_now())
    }

    fn compute_digest(&self, params: &DigestParams, password: &SecretString) -> String {
        self.response_for(params, password, &params.uri)
    }

    fn compute_url_digest(&self, params: &DigestParams, password: &SecretString) -> String {
        self.response_for(params, password, &params.request_target)
    }
}

/// `WWW-Authenticate` value asking for digest credentials.
#[must_use]
pub fn digest_challenge(realm: &str, nonce: &str) -> String {
    format!(r#"Digest realm="{realm}", nonce="{nonce}", qop="auth", algorithm=MD5"#)
}

/// `WWW-Authenticate` value asking for basic credentials.
#[must_use]
pub fn basic_challenge(realm: &str) -> String {
    format!(r#"Basic realm="{realm}""#)
}
