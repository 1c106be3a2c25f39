use anyhow::{Context, Result};
use axum::{
    Json, Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE},
    },
    response::{IntoResponse, Response},
    routing::post,
};
use portero::{
    api::{self, ACCESS_TOKEN_COOKIE, AuthConfig, AuthState, REFRESH_TOKEN_COOKIE},
    identity::{BoxFuture, DirectoryClient, IdentitySources, MockIdentitySource, PermissionResolver},
    keys::{KeyProvider, Padding, encrypt_with_public_key, private_key_from_pem},
    token::{ManualClock, TokenProvider, TokenType},
};
use serde_json::{Value, json};
use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};
use tower::ServiceExt;

const TEST_KEY_PEM: &str = include_str!("fixtures/rsa_test_key.pem");
const NOW: i64 = 1_750_000_000;

#[derive(Default)]
struct CountingResolver {
    calls: AtomicUsize,
}

impl CountingResolver {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PermissionResolver for CountingResolver {
    fn resolve<'a>(&'a self, _username: &'a str) -> BoxFuture<'a, Result<BTreeSet<String>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async { Ok(BTreeSet::from(["BO_REPORT.VIEW".to_string()])) })
    }
}

struct Gateway {
    app: Router,
    public_key: String,
    clock: Arc<ManualClock>,
    resolver: Arc<CountingResolver>,
}

impl Gateway {
    fn new(directory_url: &str) -> Result<Self> {
        let keys = KeyProvider::from_pem(TEST_KEY_PEM, Padding::Oaep)?;
        let public_key = keys.public_key_base64().to_string();
        let clock = Arc::new(ManualClock::new(NOW));
        let tokens = TokenProvider::new(private_key_from_pem(TEST_KEY_PEM)?, "it-1")
            .with_access_ttl(Duration::from_secs(300))
            .with_refresh_ttl(Duration::from_secs(7200))
            .with_clock(clock.clone());
        let identities = IdentitySources::new(Arc::new(DirectoryClient::new(directory_url)?))
            .with_mock_identities(MockIdentitySource);
        let resolver = Arc::new(CountingResolver::default());
        let config = AuthConfig::new()
            .with_cookie_secure(true)
            .with_collaborator_timeout(Duration::from_millis(500));
        let state = AuthState::new(config, keys, tokens, identities, resolver.clone());

        Ok(Self {
            app: api::app(Arc::new(state)),
            public_key,
            clock,
            resolver,
        })
    }

    async fn send(&self, request: Request<Body>) -> Result<Response> {
        Ok(self.app.clone().oneshot(request).await?)
    }

    async fn login(&self, username: &str, password: &str) -> Result<Response> {
        let ciphertext = encrypt_with_public_key(&self.public_key, password, Padding::Oaep)?;
        self.post_json(
            "/api/auth/login",
            &json!({"username": username, "password": ciphertext}),
        )
        .await
    }

    async fn post_json(&self, uri: &str, body: &Value) -> Result<Response> {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
        )
        .await
    }

    async fn with_cookie(&self, method: Method, uri: &str, cookie: &str) -> Result<Response> {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(COOKIE, cookie)
                .body(Body::empty())?,
        )
        .await
    }
}

/// Directory double reachable over HTTP: `dave/letmein` succeeds and
/// `broken` answers 500.
async fn spawn_directory() -> Result<String> {
    async fn authenticate(Json(body): Json<Value>) -> Response {
        match (body["username"].as_str(), body["password"].as_str()) {
            (Some("dave"), Some("letmein")) => Json(json!({
                "userId": "7001",
                "authorities": ["ROLE_USER", "ROLE_SUPPORT"],
            }))
            .into_response(),
            (Some("broken"), _) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
            _ => StatusCode::UNAUTHORIZED.into_response(),
        }
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/directory/authenticate", post(authenticate));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{addr}/directory/"))
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn cookie_value(response: &Response, name: &str) -> Option<String> {
    set_cookies(response)
        .iter()
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

async fn json_body(response: Response) -> Result<Value> {
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&body)?)
}

#[tokio::test]
async fn mock_session_lifecycle() -> Result<()> {
    let gateway = Gateway::new(&spawn_directory().await?)?;

    let login = gateway.login("alice", "secret123").await?;
    assert_eq!(login.status(), StatusCode::OK);
    let cookies = set_cookies(&login);
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().all(|cookie| cookie.contains("; Secure")));
    let access = cookie_value(&login, ACCESS_TOKEN_COOKIE).context("no access cookie")?;

    let me = gateway
        .with_cookie(Method::GET, "/api/auth/me", &format!("{ACCESS_TOKEN_COOKIE}={access}"))
        .await?;
    assert_eq!(me.status(), StatusCode::OK);
    let body = json_body(me).await?;
    assert_eq!(body["username"], "alice");
    assert_eq!(
        body["permissions"],
        json!(["BO_ACCOUNT.FIND", "BO_CUSTOMER.FIND", "BO_CUSTOMER.VIEW"])
    );

    let logout = gateway
        .with_cookie(Method::POST, "/api/auth/logout", &format!("{ACCESS_TOKEN_COOKIE}={access}"))
        .await?;
    assert_eq!(logout.status(), StatusCode::OK);
    assert_eq!(cookie_value(&logout, ACCESS_TOKEN_COOKIE).as_deref(), Some(""));
    assert_eq!(cookie_value(&logout, REFRESH_TOKEN_COOKIE).as_deref(), Some(""));

    // A browser honours the cleared cookie and sends an empty value.
    let me = gateway
        .with_cookie(Method::GET, "/api/auth/me", &format!("{ACCESS_TOKEN_COOKIE}="))
        .await?;
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.resolver.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn refresh_rotates_and_keeps_old_token_usable() -> Result<()> {
    let gateway = Gateway::new(&spawn_directory().await?)?;

    let login = gateway.login("admin", "admin123").await?;
    let refresh = cookie_value(&login, REFRESH_TOKEN_COOKIE).context("no refresh cookie")?;

    gateway.clock.advance(60);
    let rotated = gateway
        .with_cookie(Method::POST, "/api/auth/refresh", &format!("{REFRESH_TOKEN_COOKIE}={refresh}"))
        .await?;
    assert_eq!(rotated.status(), StatusCode::OK);
    let new_refresh = cookie_value(&rotated, REFRESH_TOKEN_COOKIE).context("no rotated cookie")?;
    assert_ne!(new_refresh, refresh);
    let body = json_body(rotated).await?;
    assert_eq!(body["userId"], "1000");
    assert_eq!(body["roles"], json!(["ADMIN", "USER"]));

    // Rotation does not revoke the previous refresh token.
    let again = gateway
        .with_cookie(Method::POST, "/api/auth/refresh", &format!("{REFRESH_TOKEN_COOKIE}={refresh}"))
        .await?;
    assert_eq!(again.status(), StatusCode::OK);

    gateway.clock.advance(7200);
    let expired = gateway
        .with_cookie(Method::POST, "/api/auth/refresh", &format!("{REFRESH_TOKEN_COOKIE}={refresh}"))
        .await?;
    assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.resolver.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn directory_users_over_http() -> Result<()> {
    let gateway = Gateway::new(&spawn_directory().await?)?;

    let login = gateway.login("dave", "letmein").await?;
    assert_eq!(login.status(), StatusCode::OK);
    assert_eq!(gateway.resolver.calls(), 1);
    let refresh = cookie_value(&login, REFRESH_TOKEN_COOKIE).context("no refresh cookie")?;
    let body = json_body(login).await?;
    assert_eq!(body["userId"], "7001");
    assert_eq!(body["roles"], json!(["SUPPORT", "USER"]));
    assert_eq!(body["permissions"], json!(["BO_REPORT.VIEW"]));

    let refreshed = gateway
        .with_cookie(Method::POST, "/api/auth/refresh", &format!("{REFRESH_TOKEN_COOKIE}={refresh}"))
        .await?;
    assert_eq!(refreshed.status(), StatusCode::OK);
    assert_eq!(gateway.resolver.calls(), 2);
    let body = json_body(refreshed).await?;
    assert_eq!(body["userId"], "0");
    assert_eq!(body["roles"], json!(["USER"]));

    let rejected = gateway.login("dave", "wrong").await?;
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);

    let broken = gateway.login("broken", "whatever").await?;
    assert_eq!(broken.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn unreachable_directory_is_unavailable() -> Result<()> {
    let gateway = Gateway::new("http://127.0.0.1:1/directory/")?;
    let response = gateway.login("dave", "letmein").await?;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(response).await?;
    assert_eq!(body["message"], "Authentication service unavailable");

    let mock = gateway.login("operator", "operator123").await?;
    assert_eq!(mock.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn cookie_wins_over_bearer() -> Result<()> {
    let gateway = Gateway::new(&spawn_directory().await?)?;
    let login = gateway.login("alice", "secret123").await?;
    let access = cookie_value(&login, ACCESS_TOKEN_COOKIE).context("no access cookie")?;

    let response = gateway
        .send(
            Request::builder()
                .uri("/api/auth/validate")
                .header(COOKIE, format!("{ACCESS_TOKEN_COOKIE}=garbage"))
                .header(AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = gateway
        .send(
            Request::builder()
                .uri("/api/auth/validate")
                .header(AUTHORIZATION, format!("Bearer {access}"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await?;
    assert_eq!(body["valid"], true);
    assert_eq!(body["userId"], "1001");
    Ok(())
}

#[tokio::test]
async fn issued_tokens_keep_their_type() -> Result<()> {
    let tokens = TokenProvider::new(private_key_from_pem(TEST_KEY_PEM)?, "it-1");
    let roles = BTreeSet::from(["USER".to_string()]);
    let permissions = BTreeSet::new();

    let access = tokens.generate_token("alice", "1001", &roles, &permissions)?;
    let refresh = tokens.generate_refresh_token("alice")?;

    assert!(tokens.verify(&access, TokenType::Access).is_ok());
    assert!(tokens.verify(&access, TokenType::Refresh).is_err());
    assert!(tokens.verify(&refresh, TokenType::Refresh).is_ok());
    assert!(tokens.verify(&refresh, TokenType::Access).is_err());
    assert!(!tokens.is_refresh_token(&access));
    assert!(tokens.is_refresh_token(&refresh));
    assert!(tokens.user_id_from_token(&refresh).is_err());

    let mut tampered = access.clone();
    tampered.push('x');
    assert!(!tokens.validate_token(&tampered));
    Ok(())
}
