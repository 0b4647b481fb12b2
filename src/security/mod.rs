//! Request authorization.
//!
//! Flow Overview: resolve the access limit for the request path, gather the
//! credentials and transport flags, evaluate, then let the caller count the
//! outcome and emit the HTTP response.

mod credentials;
mod decision;
mod digest;
mod engine;
mod limit;
mod resolver;
mod stats;
mod store;
mod vault;

pub use credentials::{AuthScheme, CredentialsError, DigestParams, RequestCredentials, RequestFlags};
pub use decision::{Counter, Decision, Denial};
pub use digest::{
    basic_challenge, digest_challenge, DigestRejection, DigestVerifier, Md5DigestVerifier,
    DEFAULT_NONCE_TTL,
};
pub use engine::AuthDecisionEngine;
pub use limit::{AccessLimit, AccessMethod};
pub use resolver::{AccessPolicyResolver, PolicyTable, Unrestricted};
pub use stats::{SecurityStats, StatsSnapshot};
pub use store::{ConfigStore, CredentialStore, NullStore, StoreError};
pub use vault::{PasswordVault, MAX_PASSWORD_LEN};
