//! Identity sources and authorization data.
//!
//! Flow Overview: the orchestrator asks [`IdentitySources::select`] which
//! source owns a username. Mock identities answer from a compiled-in table and
//! already know their permissions; everything else goes to the external
//! directory, whose permissions are looked up separately through a
//! [`PermissionResolver`].

pub mod directory;
pub mod mock;
pub mod permissions;

pub use directory::{DirectoryClient, DisabledDirectory};
pub use mock::{MockIdentity, MockIdentitySource};
pub use permissions::{NoopPermissionResolver, PermissionResolver, PgPermissionResolver};

use secrecy::SecretString;
use serde::Serialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Role assigned to directory users on refresh, where the original
/// authorities are no longer available.
pub const PLACEHOLDER_ROLE: &str = "USER";
/// User id assigned to directory users on refresh.
pub const PLACEHOLDER_USER_ID: &str = "0";

const ROLE_PREFIX: &str = "ROLE_";

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Authenticated identity plus its authorization data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Principal {
    /// Principal rebuilt on refresh for a directory user.
    #[must_use]
    pub fn placeholder(username: &str, permissions: BTreeSet<String>) -> Self {
        Self {
            user_id: PLACEHOLDER_USER_ID.to_string(),
            username: username.to_string(),
            roles: BTreeSet::from([PLACEHOLDER_ROLE.to_string()]),
            permissions,
        }
    }
}

/// Result of a successful credential check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub username: String,
    /// Granted authorities, e.g. `ROLE_USER`.
    pub authorities: Vec<String>,
    /// Present when the source already knows the permission set.
    pub permissions: Option<BTreeSet<String>>,
}

impl AuthenticatedIdentity {
    /// Roles derived from the granted authorities with any `ROLE_` prefix removed.
    #[must_use]
    pub fn roles(&self) -> BTreeSet<String> {
        self.authorities
            .iter()
            .map(|authority| authority.trim())
            .filter(|authority| !authority.is_empty())
            .map(|authority| {
                authority
                    .strip_prefix(ROLE_PREFIX)
                    .unwrap_or(authority)
                    .to_string()
            })
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("bad credentials")]
    BadCredentials,
    #[error("identity backend unavailable: {0}")]
    Unavailable(String),
}

/// External credential check (the directory).
pub trait Authenticator: Send + Sync {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, Result<AuthenticatedIdentity, IdentityError>>;
}

/// The source responsible for a given username.
pub enum IdentitySource<'a> {
    Mock(&'static MockIdentity),
    Directory(&'a dyn Authenticator),
}

impl IdentitySource<'_> {
    /// Check the credentials against this source.
    ///
    /// # Errors
    /// Returns [`IdentityError::BadCredentials`] on a mismatch, or
    /// [`IdentityError::Unavailable`] when the directory cannot be reached.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        match self {
            Self::Mock(identity) => {
                if identity.verify_password(password) {
                    Ok(identity.authenticated())
                } else {
                    Err(IdentityError::BadCredentials)
                }
            }
            Self::Directory(directory) => directory.authenticate(username, password).await,
        }
    }

    #[must_use]
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock(_))
    }
}

/// Routes usernames to the mock table or the directory.
pub struct IdentitySources {
    mock: Option<MockIdentitySource>,
    directory: Arc<dyn Authenticator>,
}

impl IdentitySources {
    #[must_use]
    pub fn new(directory: Arc<dyn Authenticator>) -> Self {
        Self {
            mock: None,
            directory,
        }
    }

    #[must_use]
    pub fn with_mock_identities(mut self, mock: MockIdentitySource) -> Self {
        self.mock = Some(mock);
        self
    }

    #[must_use]
    pub fn mock_enabled(&self) -> bool {
        self.mock.is_some()
    }

    /// Pure routing decision: mock when enabled and listed, else the directory.
    #[must_use]
    pub fn select(&self, username: &str) -> IdentitySource<'_> {
        match self.mock.as_ref().and_then(|mock| mock.lookup(username)) {
            Some(identity) => IdentitySource::Mock(identity),
            None => IdentitySource::Directory(self.directory.as_ref()),
        }
    }
}
