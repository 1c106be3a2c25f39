use clap::{Arg, ArgMatches, Command};

use crate::keys::Padding;

pub const ARG_ENCRYPTION_KEY_PATH: &str = "encryption-key-path";
pub const ARG_ENCRYPTION_PADDING: &str = "encryption-padding";
pub const ARG_SIGNING_KEY_PATH: &str = "signing-key-path";
pub const ARG_SIGNING_KEY_ID: &str = "signing-key-id";

pub const DEFAULT_SIGNING_KEY_ID: &str = "portero-1";

#[derive(Debug, Clone)]
pub struct Options {
    pub encryption_key_path: Option<String>,
    pub encryption_padding: Padding,
    pub signing_key_path: Option<String>,
    pub signing_key_id: String,
}

impl Options {
    /// Parse key material arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing key id is blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let signing_key_id = match get_non_empty(ARG_SIGNING_KEY_ID) {
            Some(kid) => kid.trim().to_string(),
            None => anyhow::bail!("missing required argument: --{ARG_SIGNING_KEY_ID}"),
        };

        Ok(Self {
            encryption_key_path: get_non_empty(ARG_ENCRYPTION_KEY_PATH),
            encryption_padding: matches
                .get_one::<Padding>(ARG_ENCRYPTION_PADDING)
                .copied()
                .unwrap_or_default(),
            signing_key_path: get_non_empty(ARG_SIGNING_KEY_PATH),
            signing_key_id,
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENCRYPTION_KEY_PATH)
                .long(ARG_ENCRYPTION_KEY_PATH)
                .help("RSA private key (PEM) used to decrypt login passwords")
                .long_help(
                    "RSA private key (PKCS#8 or PKCS#1 PEM) used to decrypt login passwords.\n\nWhen omitted a 2048-bit key is generated at startup, so clients must fetch the public key again after every restart.",
                )
                .env("PORTERO_ENCRYPTION_KEY_PATH"),
        )
        .arg(
            Arg::new(ARG_ENCRYPTION_PADDING)
                .long(ARG_ENCRYPTION_PADDING)
                .help("RSA padding expected from clients: pkcs1 or oaep")
                .env("PORTERO_ENCRYPTION_PADDING")
                .default_value("pkcs1")
                .value_parser(|value: &str| value.parse::<Padding>()),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY_PATH)
                .long(ARG_SIGNING_KEY_PATH)
                .help("RSA private key (PEM) used to sign tokens")
                .long_help(
                    "RSA private key (PKCS#8 or PKCS#1 PEM) used to sign access and refresh tokens.\n\nWhen omitted a key is generated at startup and every token issued before a restart becomes invalid.",
                )
                .env("PORTERO_SIGNING_KEY_PATH"),
        )
        .arg(
            Arg::new(ARG_SIGNING_KEY_ID)
                .long(ARG_SIGNING_KEY_ID)
                .help("Key id (kid) written into token headers")
                .env("PORTERO_SIGNING_KEY_ID")
                .default_value(DEFAULT_SIGNING_KEY_ID),
        )
}
