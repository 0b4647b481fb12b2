//! Outcome of an authorization evaluation.

use std::fmt;

/// Why a request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Denial {
    /// Secure transport required but the request arrived in the clear.
    TransportViolation,
    /// The resource is hidden and answered as missing.
    HiddenResource,
    UnknownUser,
    ForbiddenUser,
    WrongPassword,
    WrongDigest,
    /// A user id was submitted without any password or digest material.
    MissingPassword,
    /// No user id was submitted for a resource that needs one.
    MissingUserId,
    /// A collaborator failed; the request is refused without blaming the caller.
    Internal,
}

/// Which statistics counter a denial is charged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Counter {
    /// An identity or transport was rejected.
    AccessDenied,
    /// The request was incomplete, or the server could not decide.
    Error,
}

impl Denial {
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::TransportViolation => 405,
            Self::HiddenResource => 404,
            Self::ForbiddenUser => 403,
            Self::Internal => 500,
            Self::UnknownUser
            | Self::WrongPassword
            | Self::WrongDigest
            | Self::MissingPassword
            | Self::MissingUserId => 401,
        }
    }

    /// Response body sent to the client. These strings are part of the wire contract.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::TransportViolation => "Access Denied\nSecure access is required.",
            Self::HiddenResource => "Page Not Found",
            Self::UnknownUser => "Access Denied\nUnknown User",
            Self::ForbiddenUser => "Access Denied\nProhibited User",
            Self::WrongPassword | Self::WrongDigest => "Access Denied\nWrong Password",
            Self::MissingPassword => "Access to this document requires a password",
            Self::MissingUserId => "Access to this document requires a User ID",
            Self::Internal => "Internal Server Error",
        }
    }

    #[must_use]
    pub const fn counter(self) -> Counter {
        match self {
            Self::MissingPassword | Self::MissingUserId | Self::Internal => Counter::Error,
            _ => Counter::AccessDenied,
        }
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status(), self.message().replace('\n', ": "))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny {
        denial: Denial,
        /// Ask the client to retry with digest authentication instead of basic.
        set_digest_challenge: bool,
    },
}

impl Decision {
    #[must_use]
    pub const fn deny(denial: Denial) -> Self {
        Self::Deny {
            denial,
            set_digest_challenge: false,
        }
    }

    #[must_use]
    pub const fn challenge(denial: Denial, set_digest_challenge: bool) -> Self {
        Self::Deny {
            denial,
            set_digest_challenge,
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub const fn denial(&self) -> Option<Denial> {
        match self {
            Self::Allow => None,
            Self::Deny { denial, .. } => Some(*denial),
        }
    }

    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Allow => None,
            Self::Deny { denial, .. } => Some(denial.status()),
        }
    }

    #[must_use]
    pub const fn message(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { denial, .. } => Some(denial.message()),
        }
    }

    #[must_use]
    pub const fn set_digest_challenge(&self) -> bool {
        match self {
            Self::Allow => false,
            Self::Deny {
                set_digest_challenge,
                ..
            } => *set_digest_challenge,
        }
    }
}
