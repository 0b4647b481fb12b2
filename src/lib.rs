//! # Gatehouse
//!
//! `gatehouse` serves documents over HTTP and decides, for every request,
//! whether it may proceed.
//!
//! ## Authorization
//!
//! Each request path resolves to an access limit (or to nothing, meaning the
//! path is unrestricted). The limit names an access method (`none`, `full`,
//! `basic`, `digest`), whether TLS is required, and optionally the group a
//! user must belong to. [`security::AuthDecisionEngine`] evaluates the request
//! credentials against that limit with a fixed rule order and returns a
//! [`security::Decision`].
//!
//! - **Hidden resources:** limits with method `none` answer `404 Page Not Found`
//!   so protected paths cannot be discovered.
//! - **Local callers** bypass authentication unless `--debug-security` is set.
//! - **Digest:** responses are checked against the client's `uri` and, failing
//!   that, against the request target the server received.
//!
//! ## User Management
//!
//! Without a security config every path is unrestricted and the server-wide
//! password (`--password`) is the only credential. With a config, users,
//! groups and access limits come from a JSON file.

pub mod cli;
pub mod config;
pub mod gatehouse;
pub mod security;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};
