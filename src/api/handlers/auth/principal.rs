//! Authenticated principal extraction and collaborator calls.
//!
//! Flow Overview: take the access token from the `access_token` cookie, or
//! from `Authorization: Bearer` when no cookie is present, verify it as an
//! access token, and rebuild the principal from its claims.

use axum::http::HeaderMap;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, error};

use super::{
    cookies::{ACCESS_TOKEN_COOKIE, bearer_token, read_cookie},
    error::{AuthError, NOT_AUTHENTICATED},
    state::AuthState,
};
use crate::identity::Principal;
use crate::token::{TokenClaims, TokenType};

/// Cookie first, then the bearer header.
pub(super) fn presented_access_token(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, ACCESS_TOKEN_COOKIE).or_else(|| bearer_token(headers))
}

fn principal_from_claims(claims: TokenClaims) -> Option<Principal> {
    Some(Principal {
        user_id: claims.uid?,
        username: claims.sub,
        roles: claims.roles?,
        permissions: claims.permissions?,
    })
}

/// Resolve the presented access token into a principal, or 401.
///
/// # Errors
/// Returns [`AuthError::Unauthorized`] when the token is missing, invalid,
/// expired, or not an access token.
pub fn require_auth(headers: &HeaderMap, auth_state: &AuthState) -> Result<Principal, AuthError> {
    let token =
        presented_access_token(headers).ok_or(AuthError::Unauthorized(NOT_AUTHENTICATED))?;

    let claims = auth_state
        .tokens()
        .verify(&token, TokenType::Access)
        .map_err(|err| {
            debug!("Access token rejected: {err}");
            AuthError::Unauthorized(NOT_AUTHENTICATED)
        })?;

    principal_from_claims(claims).ok_or(AuthError::Unauthorized(NOT_AUTHENTICATED))
}

/// Run a collaborator call under the configured deadline.
pub(super) async fn within_deadline<T>(
    timeout: Duration,
    collaborator: &'static str,
    call: impl Future<Output = T>,
) -> Result<T, AuthError> {
    tokio::time::timeout(timeout, call).await.map_err(|_| {
        error!("{collaborator} did not answer within {}ms", timeout.as_millis());
        AuthError::Unavailable
    })
}

/// Look up permissions for a directory user.
pub(super) async fn resolve_permissions(
    auth_state: &AuthState,
    username: &str,
) -> Result<BTreeSet<String>, AuthError> {
    within_deadline(
        auth_state.config().collaborator_timeout(),
        "Permission resolver",
        auth_state.permissions().resolve(username),
    )
    .await?
    .map_err(|err| {
        error!("Failed to resolve permissions: {err:#}");
        AuthError::Unavailable
    })
}
