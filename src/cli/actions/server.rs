use crate::{
    api::{self, AuthConfig, AuthState, SameSite},
    cli::telemetry,
    identity::{
        Authenticator, DirectoryClient, DisabledDirectory, IdentitySources, MockIdentitySource,
        NoopPermissionResolver, PermissionResolver, PgPermissionResolver,
    },
    keys::{self, DEFAULT_KEY_BITS, KeyProvider, Padding},
    token::TokenProvider,
};
use anyhow::{Context, Result};
use rsa::RsaPrivateKey;
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    pub frontend_origin: Option<String>,
    pub mock_identities: bool,
    pub collaborator_timeout: Duration,
    pub encryption_key_path: Option<String>,
    pub encryption_padding: Padding,
    pub signing_key_path: Option<String>,
    pub signing_key_id: String,
    pub directory_url: Option<String>,
    pub dsn: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if a key cannot be loaded, a collaborator is misconfigured, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let keys = load_encryption_keys(args.encryption_key_path.as_deref(), args.encryption_padding)
        .await?;
    info!(
        "Password encryption key ready: fingerprint={} padding={}",
        keys.fingerprint(),
        keys.padding()
    );

    let signing_key = load_signing_key(args.signing_key_path.as_deref()).await?;
    let tokens = TokenProvider::new(signing_key, args.signing_key_id.clone())
        .with_access_ttl(args.access_token_ttl)
        .with_refresh_ttl(args.refresh_token_ttl);
    info!("Token signing key ready: kid={}", tokens.kid());

    let identities = identity_sources(args.directory_url.as_deref(), args.mock_identities)?;
    let permissions = permission_resolver(args.dsn.as_deref())?;

    if args.cookie_same_site == SameSite::None && !args.cookie_secure {
        warn!("SameSite=None without Secure: browsers will drop the session cookies");
    }

    let config = AuthConfig::new()
        .with_cookie_secure(args.cookie_secure)
        .with_cookie_same_site(args.cookie_same_site)
        .with_collaborator_timeout(args.collaborator_timeout);

    let state = AuthState::new(config, keys, tokens, identities, permissions);

    let result = api::new(args.port, Arc::new(state), args.frontend_origin).await;

    telemetry::shutdown_tracer();

    result
}

async fn load_encryption_keys(path: Option<&str>, padding: Padding) -> Result<KeyProvider> {
    if let Some(path) = path {
        let pem = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read encryption key: {path}"))?;
        return KeyProvider::from_pem(&pem, padding)
            .with_context(|| format!("Invalid encryption key: {path}"));
    }

    debug!("Generating {DEFAULT_KEY_BITS}-bit password encryption key");
    tokio::task::spawn_blocking(move || KeyProvider::generate(DEFAULT_KEY_BITS, padding))
        .await
        .context("Key generation task failed")?
        .context("Failed to generate encryption key")
}

async fn load_signing_key(path: Option<&str>) -> Result<RsaPrivateKey> {
    if let Some(path) = path {
        let pem = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read signing key: {path}"))?;
        return keys::private_key_from_pem(&pem)
            .with_context(|| format!("Invalid signing key: {path}"));
    }

    warn!("No signing key configured, tokens will not survive a restart");
    tokio::task::spawn_blocking(|| RsaPrivateKey::new(&mut rand::rngs::OsRng, DEFAULT_KEY_BITS))
        .await
        .context("Key generation task failed")?
        .context("Failed to generate signing key")
}

fn identity_sources(directory_url: Option<&str>, mock_identities: bool) -> Result<IdentitySources> {
    let directory: Arc<dyn Authenticator> = match directory_url {
        Some(url) => {
            let client = DirectoryClient::new(url)?;
            info!("Directory authentication via {}", client.endpoint());
            Arc::new(client)
        }
        None => {
            warn!("No directory configured, only mock identities can log in");
            Arc::new(DisabledDirectory)
        }
    };

    let sources = IdentitySources::new(directory);

    if mock_identities {
        let mock = MockIdentitySource;
        warn!(
            "Mock identities enabled for: {}",
            mock.usernames().join(", ")
        );
        Ok(sources.with_mock_identities(mock))
    } else {
        Ok(sources)
    }
}

fn permission_resolver(dsn: Option<&str>) -> Result<Arc<dyn PermissionResolver>> {
    match dsn {
        Some(dsn) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Duration::from_secs(3))
                .connect_lazy(dsn)
                .context("Invalid database connection string")?;
            Ok(Arc::new(PgPermissionResolver::new(pool)))
        }
        None => {
            debug!("No database configured, directory users get no extra permissions");
            Ok(Arc::new(NoopPermissionResolver))
        }
    }
}

fn log_startup_args(args: &Args) {
    debug!(
        port = args.port,
        access_token_ttl_ms = args.access_token_ttl.as_millis(),
        refresh_token_ttl_ms = args.refresh_token_ttl.as_millis(),
        cookie_secure = args.cookie_secure,
        cookie_same_site = %args.cookie_same_site,
        frontend_origin = ?args.frontend_origin,
        mock_identities = args.mock_identities,
        collaborator_timeout_ms = args.collaborator_timeout.as_millis(),
        encryption_key_path = ?args.encryption_key_path,
        signing_key_path = ?args.signing_key_path,
        signing_key_id = %args.signing_key_id,
        directory_url = ?args.directory_url,
        dsn_configured = args.dsn.is_some(),
        "Startup configuration"
    );
}
