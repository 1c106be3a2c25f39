//! Permission lookup for directory users.
//!
//! Mock identities ship their own permissions, so a resolver is only consulted
//! for usernames handled by the directory.

use anyhow::{Context, Result};
use sqlx::PgPool;
use std::collections::BTreeSet;
use tracing::{debug, instrument};

use super::BoxFuture;

pub trait PermissionResolver: Send + Sync {
    fn resolve<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<BTreeSet<String>>>;
}

/// Used when no permission store is configured: every user gets an empty set.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPermissionResolver;

impl PermissionResolver for NoopPermissionResolver {
    fn resolve<'a>(&'a self, _username: &'a str) -> BoxFuture<'a, Result<BTreeSet<String>>> {
        Box::pin(async { Ok(BTreeSet::new()) })
    }
}

#[derive(Clone, Debug)]
pub struct PgPermissionResolver {
    pool: PgPool,
}

impl PgPermissionResolver {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the permission codes granted to `username`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    #[instrument(skip(self))]
    pub async fn permissions_for(&self, username: &str) -> Result<BTreeSet<String>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT permission FROM user_permissions WHERE username = $1")
                .bind(username)
                .fetch_all(&self.pool)
                .await
                .context("Failed to load user permissions")?;

        debug!("Resolved {} permissions", rows.len());

        Ok(rows
            .into_iter()
            .map(|permission| permission.trim().to_string())
            .filter(|permission| !permission.is_empty())
            .collect())
    }
}

impl PermissionResolver for PgPermissionResolver {
    fn resolve<'a>(&'a self, username: &'a str) -> BoxFuture<'a, Result<BTreeSet<String>>> {
        Box::pin(self.permissions_for(username))
    }
}
