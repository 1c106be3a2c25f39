//! Refresh-token rotation.
//!
//! A valid refresh token buys a brand new access token and a brand new refresh
//! token. The presented refresh token is not revoked; it stays usable until
//! its own expiry because nothing is stored server-side.

use axum::{extract::Extension, http::HeaderMap, response::Response};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    cookies::{REFRESH_TOKEN_COOKIE, read_cookie},
    error::{AuthError, INVALID_REFRESH_TOKEN},
    principal::resolve_permissions,
    session::issue_session,
    state::AuthState,
    types::{ErrorResponse, PrincipalResponse},
};
use crate::identity::{IdentitySource, Principal};
use crate::token::TokenType;

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Tokens rotated; session cookies replaced", body = PrincipalResponse),
        (status = 401, description = "Missing, invalid or non-refresh token", body = ErrorResponse),
        (status = 503, description = "Permission store unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let token = read_cookie(&headers, REFRESH_TOKEN_COOKIE)
        .ok_or(AuthError::Unauthorized(INVALID_REFRESH_TOKEN))?;

    let username = auth_state
        .tokens()
        .verify(&token, TokenType::Refresh)
        .map_err(|err| {
            debug!("Refresh token rejected: {err}");
            AuthError::Unauthorized(INVALID_REFRESH_TOKEN)
        })?
        .sub;

    let principal = match auth_state.identities().select(&username) {
        IdentitySource::Mock(identity) => identity.principal(),
        // Directory authorities are not kept anywhere, so the role set and
        // user id fall back to placeholders. Permissions are re-read.
        IdentitySource::Directory(_) => {
            let permissions = resolve_permissions(&auth_state, &username).await?;
            Principal::placeholder(&username, permissions)
        }
    };

    info!(username = %principal.username, "Session refreshed");

    issue_session(&auth_state, principal)
}
