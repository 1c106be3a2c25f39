use clap::{Arg, ArgAction, ArgMatches, Command};
use std::time::Duration;

use crate::api::SameSite;

pub const ARG_ACCESS_TOKEN_TTL_MS: &str = "access-token-ttl-ms";
pub const ARG_REFRESH_TOKEN_TTL_MS: &str = "refresh-token-ttl-ms";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_COOKIE_SAME_SITE: &str = "cookie-same-site";
pub const ARG_FRONTEND_ORIGIN: &str = "frontend-origin";
pub const ARG_MOCK_IDENTITIES: &str = "mock-identities";
pub const ARG_COLLABORATOR_TIMEOUT_MS: &str = "collaborator-timeout-ms";

#[derive(Debug, Clone)]
pub struct Options {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub frontend_origin: Option<String>,
    pub mock_identities: bool,
    pub collaborator_timeout: Duration,
}

impl Options {
    /// Parse session and cookie arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let millis = |id: &str| -> anyhow::Result<Duration> {
            matches
                .get_one::<u64>(id)
                .copied()
                .map(Duration::from_millis)
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        Ok(Self {
            access_token_ttl: millis(ARG_ACCESS_TOKEN_TTL_MS)?,
            refresh_token_ttl: millis(ARG_REFRESH_TOKEN_TTL_MS)?,
            cookie_secure: matches.get_flag(ARG_COOKIE_SECURE),
            cookie_same_site: matches
                .get_one::<SameSite>(ARG_COOKIE_SAME_SITE)
                .copied()
                .unwrap_or_default(),
            frontend_origin: matches
                .get_one::<String>(ARG_FRONTEND_ORIGIN)
                .cloned()
                .filter(|v| !v.trim().is_empty()),
            mock_identities: matches.get_flag(ARG_MOCK_IDENTITIES),
            collaborator_timeout: millis(ARG_COLLABORATOR_TIMEOUT_MS)?,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_token_args(command);
    with_cookie_args(command)
}

fn with_token_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL_MS)
                .long(ARG_ACCESS_TOKEN_TTL_MS)
                .help("Access token lifetime in milliseconds")
                .env("PORTERO_ACCESS_TOKEN_TTL_MS")
                .default_value("86400000")
                .value_parser(clap::value_parser!(u64).range(1000..)),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL_MS)
                .long(ARG_REFRESH_TOKEN_TTL_MS)
                .help("Refresh token lifetime in milliseconds")
                .env("PORTERO_REFRESH_TOKEN_TTL_MS")
                .default_value("604800000")
                .value_parser(clap::value_parser!(u64).range(1000..)),
        )
        .arg(
            Arg::new(ARG_MOCK_IDENTITIES)
                .long(ARG_MOCK_IDENTITIES)
                .help("Enable the built-in test identities (never in production)")
                .env("PORTERO_MOCK_IDENTITIES")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_COLLABORATOR_TIMEOUT_MS)
                .long(ARG_COLLABORATOR_TIMEOUT_MS)
                .help("Deadline for directory and permission lookups in milliseconds")
                .env("PORTERO_COLLABORATOR_TIMEOUT_MS")
                .default_value("5000")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

fn with_cookie_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark session cookies Secure (HTTPS only)")
                .env("PORTERO_COOKIE_SECURE")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(ARG_COOKIE_SAME_SITE)
                .long(ARG_COOKIE_SAME_SITE)
                .help("SameSite attribute for session cookies: Strict, Lax or None")
                .env("PORTERO_COOKIE_SAME_SITE")
                .default_value("Lax")
                .value_parser(|value: &str| value.parse::<SameSite>()),
        )
        .arg(
            Arg::new(ARG_FRONTEND_ORIGIN)
                .long(ARG_FRONTEND_ORIGIN)
                .help("Frontend origin allowed to call the API with credentials (enables CORS)")
                .env("PORTERO_FRONTEND_ORIGIN"),
        )
}
