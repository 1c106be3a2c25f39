//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action to run, currently only the API
//! server with its full configuration.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_PORT, auth, directory, keys};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);

    let auth_opts = auth::Options::parse(matches)?;
    let key_opts = keys::Options::parse(matches)?;
    let directory_opts = directory::Options::parse(matches);

    Ok(Action::Server(Args {
        port,
        access_token_ttl: auth_opts.access_token_ttl,
        refresh_token_ttl: auth_opts.refresh_token_ttl,
        cookie_secure: auth_opts.cookie_secure,
        cookie_same_site: auth_opts.cookie_same_site,
        frontend_origin: auth_opts.frontend_origin,
        mock_identities: auth_opts.mock_identities,
        collaborator_timeout: auth_opts.collaborator_timeout,
        encryption_key_path: key_opts.encryption_key_path,
        encryption_padding: key_opts.encryption_padding,
        signing_key_path: key_opts.signing_key_path,
        signing_key_id: key_opts.signing_key_id,
        directory_url: directory_opts.directory_url,
        dsn: directory_opts.dsn,
    }))
}
