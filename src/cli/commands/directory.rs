use clap::{Arg, ArgMatches, Command};

pub const ARG_DIRECTORY_URL: &str = "directory-url";
pub const ARG_DSN: &str = "dsn";

/// External collaborators. Both are optional: without a directory only mock
/// identities can log in, and without a DSN every directory user gets an empty
/// permission set.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub directory_url: Option<String>,
    pub dsn: Option<String>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        Self {
            directory_url: get_non_empty(ARG_DIRECTORY_URL),
            dsn: get_non_empty(ARG_DSN),
        }
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_DIRECTORY_URL)
                .long(ARG_DIRECTORY_URL)
                .help("Base URL of the credential directory (POST <url>/authenticate)")
                .env("PORTERO_DIRECTORY_URL"),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long(ARG_DSN)
                .help("Postgres connection string for the permission store")
                .long_help(
                    "Postgres connection string for the permission store.\n\nPermissions are read from `user_permissions(username, permission)`.",
                )
                .env("PORTERO_DSN"),
        )
}
