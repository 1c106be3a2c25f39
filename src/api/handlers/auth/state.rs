//! Auth state and configuration.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::identity::{IdentitySources, PermissionResolver};
use crate::keys::KeyProvider;
use crate::token::TokenProvider;

const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_millis(5000);

/// `SameSite` attribute written on both session cookies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

impl FromStr for SameSite {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lax" => Ok(Self::Lax),
            "none" => Ok(Self::None),
            other => Err(format!("invalid SameSite value: {other}")),
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    cookie_secure: bool,
    cookie_same_site: SameSite,
    collaborator_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthConfig {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cookie_secure: false,
            cookie_same_site: SameSite::default(),
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: bool) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn with_cookie_same_site(mut self, same_site: SameSite) -> Self {
        self.cookie_same_site = same_site;
        self
    }

    #[must_use]
    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    #[must_use]
    pub fn cookie_secure(&self) -> bool {
        self.cookie_secure
    }

    #[must_use]
    pub fn cookie_same_site(&self) -> SameSite {
        self.cookie_same_site
    }

    /// Upper bound for a single directory or permission lookup.
    #[must_use]
    pub fn collaborator_timeout(&self) -> Duration {
        self.collaborator_timeout
    }
}

/// Everything the auth handlers share. Immutable after startup.
pub struct AuthState {
    config: AuthConfig,
    keys: KeyProvider,
    tokens: TokenProvider,
    identities: IdentitySources,
    permissions: Arc<dyn PermissionResolver>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        keys: KeyProvider,
        tokens: TokenProvider,
        identities: IdentitySources,
        permissions: Arc<dyn PermissionResolver>,
    ) -> Self {
        Self {
            config,
            keys,
            tokens,
            identities,
            permissions,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn keys(&self) -> &KeyProvider {
        &self.keys
    }

    pub(super) fn tokens(&self) -> &TokenProvider {
        &self.tokens
    }

    pub(super) fn identities(&self) -> &IdentitySources {
        &self.identities
    }

    pub(super) fn permissions(&self) -> &dyn PermissionResolver {
        self.permissions.as_ref()
    }
}
