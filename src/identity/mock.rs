//! Compiled-in test identities.
//!
//! Only enabled with `--mock-identities`. Each entry is deterministic so a
//! refresh can rebuild the exact principal issued at login.

use secrecy::{ExposeSecret, SecretString};
use std::collections::BTreeSet;

use super::{AuthenticatedIdentity, Principal};

#[derive(Debug)]
pub struct MockIdentity {
    pub user_id: &'static str,
    pub username: &'static str,
    password: &'static str,
    pub authorities: &'static [&'static str],
    pub permissions: &'static [&'static str],
}

const IDENTITIES: &[MockIdentity] = &[
    MockIdentity {
        user_id: "1000",
        username: "admin",
        password: "admin123",
        authorities: &["ROLE_ADMIN", "ROLE_USER"],
        permissions: &[
            "BO_ACCOUNT.FIND",
            "BO_ACCOUNT.VIEW",
            "BO_ACCOUNT.UPDATE",
            "BO_CUSTOMER.FIND",
            "BO_CUSTOMER.VIEW",
            "BO_CUSTOMER.UPDATE",
            "BO_USER.MANAGE",
        ],
    },
    MockIdentity {
        user_id: "1001",
        username: "alice",
        password: "secret123",
        authorities: &["ROLE_USER"],
        permissions: &["BO_ACCOUNT.FIND", "BO_CUSTOMER.FIND", "BO_CUSTOMER.VIEW"],
    },
    MockIdentity {
        user_id: "1002",
        username: "operator",
        password: "operator123",
        authorities: &["ROLE_OPERATOR", "ROLE_USER"],
        permissions: &[
            "BO_ACCOUNT.FIND",
            "BO_ACCOUNT.VIEW",
            "BO_CUSTOMER.FIND",
            "BO_CUSTOMER.VIEW",
        ],
    },
];

impl MockIdentity {
    #[must_use]
    pub fn permission_set(&self) -> BTreeSet<String> {
        self.permissions.iter().map(ToString::to_string).collect()
    }

    /// Password check without early exit on the first differing byte.
    #[must_use]
    pub fn verify_password(&self, candidate: &SecretString) -> bool {
        let expected = self.password.as_bytes();
        let candidate = candidate.expose_secret().as_bytes();
        if expected.len() != candidate.len() {
            return false;
        }
        expected
            .iter()
            .zip(candidate)
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
    }

    #[must_use]
    pub fn authenticated(&self) -> AuthenticatedIdentity {
        AuthenticatedIdentity {
            user_id: self.user_id.to_string(),
            username: self.username.to_string(),
            authorities: self.authorities.iter().map(ToString::to_string).collect(),
            permissions: Some(self.permission_set()),
        }
    }

    #[must_use]
    pub fn principal(&self) -> Principal {
        let identity = self.authenticated();
        Principal {
            roles: identity.roles(),
            user_id: identity.user_id,
            username: identity.username,
            permissions: self.permission_set(),
        }
    }
}

/// Lookup over the compiled-in table.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockIdentitySource;

impl MockIdentitySource {
    /// Exact, case-sensitive match on the username.
    #[must_use]
    pub fn lookup(&self, username: &str) -> Option<&'static MockIdentity> {
        IDENTITIES
            .iter()
            .find(|identity| identity.username == username)
    }

    #[must_use]
    pub fn usernames(&self) -> Vec<&'static str> {
        IDENTITIES.iter().map(|identity| identity.username).collect()
    }
}
