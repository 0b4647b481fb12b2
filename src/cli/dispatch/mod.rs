//! Map validated CLI arguments to the action to run.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{security, ARG_PORT, ARG_WEB_ROOT};
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let web_root = matches
        .get_one::<String>(ARG_WEB_ROOT)
        .map(PathBuf::from)
        .context("missing required argument: --web-root")?;

    let security = security::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        web_root,
        security,
    }))
}
