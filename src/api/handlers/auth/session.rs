//! Session endpoints: token issuance, logout and token introspection.

use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{error, info};

use super::{
    cookies::{clear_session_cookies, set_session_cookies},
    error::AuthError,
    principal::require_auth,
    state::AuthState,
    types::{ErrorResponse, LogoutResponse, PrincipalResponse, ValidateResponse},
};
use crate::identity::Principal;

const LOGOUT_MESSAGE: &str = "Logged out successfully";

fn no_store(headers: &mut HeaderMap) {
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
}

/// Mint a fresh token pair for `principal` and write both cookies.
/// Tokens only travel in cookies; the body carries the principal.
pub(super) fn issue_session(
    auth_state: &AuthState,
    principal: Principal,
) -> Result<Response, AuthError> {
    let tokens = auth_state.tokens();
    let access_token = tokens
        .generate_token(
            &principal.username,
            &principal.user_id,
            &principal.roles,
            &principal.permissions,
        )
        .map_err(|err| {
            error!("Failed to sign access token: {err}");
            AuthError::Internal
        })?;
    let refresh_token = tokens
        .generate_refresh_token(&principal.username)
        .map_err(|err| {
            error!("Failed to sign refresh token: {err}");
            AuthError::Internal
        })?;

    let mut headers = HeaderMap::new();
    set_session_cookies(
        &mut headers,
        auth_state.config(),
        &access_token,
        tokens.access_ttl(),
        &refresh_token,
        tokens.refresh_ttl(),
    )?;
    no_store(&mut headers);

    Ok((
        StatusCode::OK,
        headers,
        Json(PrincipalResponse::from(principal)),
    )
        .into_response())
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Session cookies cleared", body = LogoutResponse)
    ),
    tag = "auth"
)]
pub async fn logout(auth_state: Extension<Arc<AuthState>>) -> Result<Response, AuthError> {
    // Stateless: nothing to revoke, only the cookies are overwritten.
    let mut headers = HeaderMap::new();
    clear_session_cookies(&mut headers, auth_state.config())?;
    no_store(&mut headers);

    info!("Session cookies cleared");

    let body = LogoutResponse {
        success: true,
        message: LOGOUT_MESSAGE.to_string(),
    };
    Ok((StatusCode::OK, headers, Json(body)).into_response())
}

#[utoipa::path(
    get,
    path = "/api/auth/validate",
    responses(
        (status = 200, description = "Access token is valid", body = ValidateResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn validate(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<ValidateResponse>, AuthError> {
    let principal = require_auth(&headers, &auth_state)?;
    Ok(Json(ValidateResponse::from(principal)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses(
        (status = 200, description = "Current principal", body = PrincipalResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Json<PrincipalResponse>, AuthError> {
    let principal = require_auth(&headers, &auth_state)?;
    Ok(Json(PrincipalResponse::from(principal)))
}
