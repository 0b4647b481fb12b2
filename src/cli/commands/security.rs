use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;
use std::path::PathBuf;

pub const ARG_CONFIG: &str = "config";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_REALM: &str = "realm";
pub const ARG_DEBUG_SECURITY: &str = "debug-security";
pub const ARG_NO_DIGEST: &str = "no-digest";
pub const ARG_TRUST_FORWARDED_PROTO: &str = "trust-forwarded-proto";
pub const ARG_DISABLE_SECURITY: &str = "disable-security";

pub const DEFAULT_REALM: &str = "gatehouse";

#[derive(Debug, Clone)]
pub struct Options {
    pub config_path: Option<PathBuf>,
    pub password: Option<SecretString>,
    pub realm: String,
    pub debug_security: bool,
    pub digest: bool,
    pub trust_forwarded_proto: bool,
    pub enabled: bool,
}

impl Options {
    /// Parse security arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the realm is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let realm = matches
            .get_one::<String>(ARG_REALM)
            .cloned()
            .unwrap_or_else(|| DEFAULT_REALM.to_string());
        if realm.trim().is_empty() {
            return Err(anyhow::anyhow!("--{ARG_REALM} must not be empty"));
        }
        if realm.contains('"') {
            return Err(anyhow::anyhow!("--{ARG_REALM} must not contain quotes"));
        }

        Ok(Self {
            config_path: matches.get_one::<String>(ARG_CONFIG).map(PathBuf::from),
            password: matches
                .get_one::<String>(ARG_PASSWORD)
                .cloned()
                .map(SecretString::from),
            realm,
            debug_security: matches.get_flag(ARG_DEBUG_SECURITY),
            digest: !matches.get_flag(ARG_NO_DIGEST),
            trust_forwarded_proto: matches.get_flag(ARG_TRUST_FORWARDED_PROTO),
            enabled: !matches.get_flag(ARG_DISABLE_SECURITY),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_CONFIG)
                .short('c')
                .long(ARG_CONFIG)
                .help("Path to the security config (JSON users, groups and access limits)")
                .long_help(
                    "Path to the security config. Without it no user management is available and every path is unrestricted.",
                )
                .env("GATEHOUSE_CONFIG"),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Server-wide fallback password")
                .env("GATEHOUSE_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_REALM)
                .long(ARG_REALM)
                .help("Authentication realm sent in challenges")
                .default_value(DEFAULT_REALM)
                .env("GATEHOUSE_REALM"),
        )
        .arg(
            Arg::new(ARG_DEBUG_SECURITY)
                .long(ARG_DEBUG_SECURITY)
                .help("Require authentication from local callers too")
                .env("GATEHOUSE_DEBUG_SECURITY")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_NO_DIGEST)
                .long(ARG_NO_DIGEST)
                .help("Disable digest authentication")
                .env("GATEHOUSE_NO_DIGEST")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_TRUST_FORWARDED_PROTO)
                .long(ARG_TRUST_FORWARDED_PROTO)
                .help("Treat X-Forwarded-Proto: https as secure transport (behind a TLS proxy; disables the local bypass)")
                .env("GATEHOUSE_TRUST_FORWARDED_PROTO")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_DISABLE_SECURITY)
                .long(ARG_DISABLE_SECURITY)
                .help("Serve documents without the security handler")
                .env("GATEHOUSE_DISABLE_SECURITY")
                .action(ArgAction::SetTrue),
        )
}
