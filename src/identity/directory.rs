//! HTTP client for the external credential directory.
//!
//! The directory exposes `POST /authenticate` accepting `{username, password}`
//! and answering `{userId, username?, authorities[], permissions?}`.
//! `401`/`403` mean the credentials were rejected; any other failure is
//! reported as the directory being unavailable.

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, error, instrument};
use url::Url;

use super::{AuthenticatedIdentity, Authenticator, BoxFuture, IdentityError};
use crate::APP_USER_AGENT;

const AUTHENTICATE_PATH: &str = "authenticate";

#[derive(Serialize)]
struct AuthenticateRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthenticateResponse {
    user_id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    authorities: Vec<String>,
    #[serde(default)]
    permissions: Option<BTreeSet<String>>,
}

#[derive(Clone, Debug)]
pub struct DirectoryClient {
    client: Client,
    endpoint: Url,
}

impl DirectoryClient {
    /// Build a client for the directory rooted at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join(AUTHENTICATE_PATH)?;
        let client = Client::builder().user_agent(APP_USER_AGENT).build()?;
        Ok(Self { client, endpoint })
    }

    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    #[instrument(skip(self, password), fields(endpoint = %self.endpoint))]
    async fn post_credentials(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<AuthenticatedIdentity, IdentityError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&AuthenticateRequest {
                username,
                password: password.expose_secret(),
            })
            .send()
            .await
            .map_err(|err| {
                error!("Directory request failed: {err}");
                IdentityError::Unavailable(err.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            debug!("Directory rejected credentials");
            return Err(IdentityError::BadCredentials);
        }
        if !status.is_success() {
            error!("Directory answered {status}");
            return Err(IdentityError::Unavailable(format!(
                "unexpected status {status}"
            )));
        }

        let body: AuthenticateResponse = response.json().await.map_err(|err| {
            error!("Invalid directory response: {err}");
            IdentityError::Unavailable(err.to_string())
        })?;

        Ok(AuthenticatedIdentity {
            user_id: body.user_id,
            username: body.username.unwrap_or_else(|| username.to_string()),
            authorities: body.authorities,
            permissions: body.permissions,
        })
    }
}

impl Authenticator for DirectoryClient {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a SecretString,
    ) -> BoxFuture<'a, Result<AuthenticatedIdentity, IdentityError>> {
        Box::pin(self.post_credentials(username, password))
    }
}

/// Stand-in when no directory is configured; every credential is rejected.
#[derive(Clone, Copy, Debug, Default)]
pub struct DisabledDirectory;

impl Authenticator for DisabledDirectory {
    fn authenticate<'a>(
        &'a self,
        _username: &'a str,
        _password: &'a SecretString,
    ) -> BoxFuture<'a, Result<AuthenticatedIdentity, IdentityError>> {
        Box::pin(async { Err(IdentityError::BadCredentials) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Result, anyhow};
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    async fn authenticate(Json(body): Json<Value>) -> (AxumStatus, Json<Value>) {
        let username = body.get("username").and_then(Value::as_str).unwrap_or("");
        let password = body.get("password").and_then(Value::as_str).unwrap_or("");
        match (username, password) {
            ("carol", "hunter2") => (
                AxumStatus::OK,
                Json(json!({
                    "userId": "42",
                    "authorities": ["ROLE_USER", "ROLE_AUDITOR"]
                })),
            ),
            ("broken", _) => (AxumStatus::BAD_GATEWAY, Json(json!({}))),
            ("garbled", _) => (AxumStatus::OK, Json(json!({"unexpected": true}))),
            _ => (AxumStatus::UNAUTHORIZED, Json(json!({}))),
        }
    }

    async fn spawn_directory() -> Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().route("/directory/authenticate", post(authenticate));
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        Ok(format!("http://{addr}/directory"))
    }

    #[test]
    fn endpoint_is_joined_under_base_path() -> Result<()> {
        let client = DirectoryClient::new("http://directory.internal/api")?;
        assert_eq!(
            client.endpoint().as_str(),
            "http://directory.internal/api/authenticate"
        );
        let client = DirectoryClient::new("http://directory.internal/api/")?;
        assert_eq!(
            client.endpoint().as_str(),
            "http://directory.internal/api/authenticate"
        );
        assert!(DirectoryClient::new("not a url").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn accepts_valid_credentials() -> Result<()> {
        let client = DirectoryClient::new(&spawn_directory().await?)?;
        let identity = client
            .authenticate("carol", &SecretString::from("hunter2"))
            .await
            .map_err(|err| anyhow!("unexpected failure: {err}"))?;
        assert_eq!(identity.user_id, "42");
        assert_eq!(identity.username, "carol");
        assert!(identity.permissions.is_none());
        assert_eq!(
            identity.roles(),
            BTreeSet::from(["AUDITOR".to_string(), "USER".to_string()])
        );
        Ok(())
    }

    #[tokio::test]
    async fn maps_rejections_and_failures() -> Result<()> {
        let client = DirectoryClient::new(&spawn_directory().await?)?;
        let password = SecretString::from("wrong");

        let rejected = client.authenticate("carol", &password).await;
        assert!(matches!(rejected, Err(IdentityError::BadCredentials)));

        let broken = client.authenticate("broken", &password).await;
        assert!(matches!(broken, Err(IdentityError::Unavailable(_))));

        let garbled = client.authenticate("garbled", &password).await;
        assert!(matches!(garbled, Err(IdentityError::Unavailable(_))));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_directory_is_unavailable() -> Result<()> {
        let client = DirectoryClient::new("http://127.0.0.1:1")?;
        let result = client
            .authenticate("carol", &SecretString::from("hunter2"))
            .await;
        assert!(matches!(result, Err(IdentityError::Unavailable(_))));
        Ok(())
    }

    #[tokio::test]
    async fn disabled_directory_rejects_everyone() {
        let result = DisabledDirectory
            .authenticate("carol", &SecretString::from("hunter2"))
            .await;
        assert!(matches!(result, Err(IdentityError::BadCredentials)));
    }
}
