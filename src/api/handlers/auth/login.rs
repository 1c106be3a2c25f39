//! Login with an RSA-encrypted password.
//!
//! Flow Overview: the client fetches `/api/auth/public-key`, encrypts the
//! password locally, and posts `{username, password}` where `password` is the
//! base64 ciphertext. Decryption failures, unknown users and wrong passwords
//! all produce the same 401 so the response never reveals which step failed.

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    response::Response,
};
use rand::{Rng, distributions::Alphanumeric};
use regex::Regex;
use secrecy::SecretString;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{
    error::{AuthError, INVALID_CREDENTIALS},
    principal::{resolve_permissions, within_deadline},
    session::issue_session,
    state::AuthState,
    types::{ErrorResponse, LoginRequest, PrincipalResponse, PublicKeyResponse},
};
use crate::identity::{IdentityError, Principal};

const DECOY_PASSWORD_LEN: usize = 24;

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[A-Za-z0-9._@-]{1,128}$").is_ok_and(|re| re.is_match(username))
}

/// Random stand-in for a password that could not be decrypted.
fn decoy_password() -> SecretString {
    let decoy: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(DECOY_PASSWORD_LEN)
        .map(char::from)
        .collect();
    SecretString::from(decoy)
}

#[utoipa::path(
    get,
    path = "/api/auth/public-key",
    responses(
        (status = 200, description = "RSA public key for password encryption", body = PublicKeyResponse)
    ),
    tag = "auth"
)]
pub async fn public_key(auth_state: Extension<Arc<AuthState>>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        public_key: auth_state.keys().public_key_base64().to_string(),
    })
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated; session cookies set", body = PrincipalResponse),
        (status = 400, description = "Missing or malformed input", body = ErrorResponse),
        (status = 401, description = "Invalid username or password", body = ErrorResponse),
        (status = 503, description = "Identity backend unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip_all)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AuthError> {
    let Json(request) = payload.map_err(|rejection| {
        debug!("Rejected login body: {rejection}");
        AuthError::Validation("Invalid request body".to_string())
    })?;

    let username = request.username.trim();
    if username.is_empty() || request.password.trim().is_empty() {
        return Err(AuthError::Validation(
            "Username and password are required".to_string(),
        ));
    }
    if !valid_username(username) {
        return Err(AuthError::Validation("Invalid username".to_string()));
    }

    // An undecryptable ciphertext still goes through the identity source with
    // a random password, so both paths cost the same and make the same calls.
    let (password, decrypted) = match auth_state.keys().decrypt(&request.password) {
        Ok(password) => (password, true),
        Err(err) => {
            debug!("Password decryption failed: {err}");
            (decoy_password(), false)
        }
    };

    let source = auth_state.identities().select(username);
    let is_mock = source.is_mock();
    let outcome = within_deadline(
        auth_state.config().collaborator_timeout(),
        "Directory",
        source.authenticate(username, &password),
    )
    .await?;

    let identity = match outcome {
        Ok(identity) if decrypted => identity,
        Ok(_) | Err(IdentityError::BadCredentials) => {
            debug!("Credentials rejected");
            return Err(AuthError::Unauthorized(INVALID_CREDENTIALS));
        }
        Err(IdentityError::Unavailable(_)) => return Err(AuthError::Unavailable),
    };

    let roles = identity.roles();
    let permissions = match identity.permissions {
        Some(permissions) => permissions,
        None => resolve_permissions(&auth_state, &identity.username).await?,
    };

    let principal = Principal {
        user_id: identity.user_id,
        username: identity.username,
        roles,
        permissions,
    };

    info!(
        username = %principal.username,
        mock = is_mock,
        "Login succeeded"
    );

    issue_session(&auth_state, principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(valid_username("alice"));
        assert!(valid_username("first.last@bank.example"));
        assert!(valid_username("ops_team-2"));
        assert!(!valid_username(""));
        assert!(!valid_username("alice smith"));
        assert!(!valid_username("alice;drop"));
        assert!(!valid_username(&"a".repeat(129)));
    }

    #[test]
    fn decoy_passwords_are_random() {
        use secrecy::ExposeSecret;

        let first = decoy_password();
        let second = decoy_password();
        assert_eq!(first.expose_secret().len(), DECOY_PASSWORD_LEN);
        assert_ne!(first.expose_secret(), second.expose_secret());
    }
}
