//! Request authorization decisions.
//!
//! Rules are checked in a fixed order and the first one that matches decides:
//!
//! 1. secure transport required but missing: 405
//! 2. local caller, unless authentication is forced: allow
//! 3. hidden resource: 404
//! 4. a user id was submitted: unknown (401), prohibited (403), then basic
//!    password or digest verification, else 401 asking for a password
//! 5. no user id and the resource is not open: 401 asking for a user id
//! 6. allow
//!
//! Evaluation has no side effects beyond logging. Counters and the HTTP
//! response are the caller's job.

use super::{
    credentials::{RequestCredentials, RequestFlags},
    decision::{Decision, Denial},
    digest::DigestVerifier,
    limit::{AccessLimit, AccessMethod},
    resolver::AccessPolicyResolver,
    store::{CredentialStore, StoreError},
};
use secrecy::ExposeSecret;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, instrument, warn};

fn same(submitted: &str, expected: &str) -> bool {
    submitted.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Clone)]
pub struct AuthDecisionEngine {
    store: Arc<dyn CredentialStore>,
    digest: Option<Arc<dyn DigestVerifier>>,
    force_auth: bool,
}

impl std::fmt::Debug for AuthDecisionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthDecisionEngine")
            .field("digest", &self.digest.is_some())
            .field("force_auth", &self.force_auth)
            .finish_non_exhaustive()
    }
}

impl AuthDecisionEngine {
    /// Engine without digest support that lets local callers through.
    #[must_use]
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            digest: None,
            force_auth: false,
        }
    }

    #[must_use]
    pub fn with_digest(mut self, verifier: Arc<dyn DigestVerifier>) -> Self {
        self.digest = Some(verifier);
        self
    }

    /// Require authentication from local callers too.
    #[must_use]
    pub fn with_forced_auth(mut self, force: bool) -> Self {
        self.force_auth = force;
        self
    }

    #[must_use]
    pub fn digest_enabled(&self) -> bool {
        self.digest.is_some()
    }

    /// Nonce for a digest challenge, or `None` when digest is disabled.
    #[must_use]
    pub fn issue_nonce(&self) -> Option<String> {
        self.digest.as_ref().map(|verifier| verifier.issue_nonce())
    }

    /// Resolve the policy for `path` and evaluate the request against it.
    ///
    /// Unrestricted paths are allowed without looking at the credentials.
    #[instrument(skip_all, fields(path = %path))]
    pub fn authorize(
        &self,
        resolver: &dyn AccessPolicyResolver,
        path: &str,
        creds: &RequestCredentials,
        flags: RequestFlags,
    ) -> Decision {
        let Some(limit) = resolver.resolve(path) else {
            return Decision::Allow;
        };
        debug!("access limit {} ({})", limit.path, limit.method);

        self.evaluate(creds, flags, &limit)
    }

    #[must_use]
    pub fn evaluate(
        &self,
        creds: &RequestCredentials,
        flags: RequestFlags,
        limit: &AccessLimit,
    ) -> Decision {
        if limit.secure_required && !flags.secure_transport {
            info!(limit = %limit.path, "non-secure access attempted");
            return Decision::deny(Denial::TransportViolation);
        }

        if flags.local_origin && !self.force_auth {
            return Decision::Allow;
        }

        if limit.method == AccessMethod::None {
            return Decision::deny(Denial::HiddenResource);
        }

        let challenge = self.digest.is_some() && limit.method == AccessMethod::Digest;

        let Some(user_id) = creds.user_id() else {
            if limit.method == AccessMethod::Full {
                return Decision::Allow;
            }
            return Decision::challenge(Denial::MissingUserId, challenge);
        };

        self.evaluate_user(user_id, creds, flags, limit)
            .unwrap_or_else(|err| {
                error!(user = user_id, "credential store failed: {err}");
                Decision::deny(Denial::Internal)
            })
    }

    fn evaluate_user(
        &self,
        user_id: &str,
        creds: &RequestCredentials,
        flags: RequestFlags,
        limit: &AccessLimit,
    ) -> Result<Decision, StoreError> {
        if !self.store.user_exists(user_id)? {
            info!(user = user_id, limit = %limit.path, "unknown user");
            return Ok(Decision::deny(Denial::UnknownUser));
        }

        if !self.store.user_can_access(user_id, limit)? {
            info!(user = user_id, limit = %limit.path, "prohibited user");
            return Ok(Decision::deny(Denial::ForbiddenUser));
        }

        if let Some(password) = creds
            .password
            .as_ref()
            .filter(|p| !p.expose_secret().is_empty())
        {
            let Some(stored) = self.store.user_password(user_id)? else {
                warn!(user = user_id, "no stored password for a permitted user");
                return Ok(Decision::deny(Denial::WrongPassword));
            };

            if !same(password.expose_secret(), stored.expose_secret()) {
                info!(user = user_id, limit = %limit.path, "password failure");
                return Ok(Decision::deny(Denial::WrongPassword));
            }

            return Ok(Decision::Allow);
        }

        if let (Some(verifier), true, Some(params)) =
            (&self.digest, flags.digest_requested, &creds.digest)
        {
            if let Err(reason) = verifier.check(params) {
                info!(user = user_id, limit = %limit.path, %reason, "digest rejected");
                return Ok(Decision::deny(Denial::WrongDigest));
            }

            let Some(stored) = self.store.user_password(user_id)? else {
                warn!(user = user_id, "no stored password for a permitted user");
                return Ok(Decision::deny(Denial::WrongDigest));
            };

            if same(&params.response, &verifier.compute_digest(params, &stored)) {
                return Ok(Decision::Allow);
            }
            if same(&params.response, &verifier.compute_url_digest(params, &stored)) {
                return Ok(Decision::Allow);
            }

            info!(user = user_id, limit = %limit.path, "digest failure");
            return Ok(Decision::deny(Denial::WrongDigest));
        }

        let challenge = self.digest.is_some() && limit.method == AccessMethod::Digest;
        Ok(Decision::challenge(Denial::MissingPassword, challenge))
    }
}
