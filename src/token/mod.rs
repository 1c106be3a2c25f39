//! Access and refresh token issuance and validation.
//!
//! A token is `Valid` when its RS256 signature verifies against a trusted key,
//! every required claim is present, and `exp > now`. A token with a good
//! signature whose expiry has passed is `Expired`. Anything else is `Invalid`.
//!
//! The provider signs with exactly one active key (`kid`). Extra public keys
//! can be trusted for verification so a key swap does not invalidate tokens
//! already handed out by this process.

mod clock;
mod error;
mod jwt;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::Error;
pub use jwt::{
    ALG_RS256, KeySet, TOKEN_VERSION, TokenClaims, TokenHeader, TokenType, decode_verified,
    sign_rs256, verify_rs256,
};

use rsa::pkcs1v15::SigningKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use ulid::Ulid;

pub const DEFAULT_ACCESS_TOKEN_TTL: Duration = Duration::from_millis(86_400_000);
pub const DEFAULT_REFRESH_TOKEN_TTL: Duration = Duration::from_millis(604_800_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Valid(TokenClaims),
    Expired,
    Invalid,
}

pub struct TokenProvider {
    signing_key: SigningKey<Sha256>,
    kid: String,
    keys: KeySet,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenProvider {
    #[must_use]
    pub fn new(private_key: RsaPrivateKey, kid: impl Into<String>) -> Self {
        let kid = kid.into();
        let mut keys = KeySet::default();
        keys.insert(kid.clone(), RsaPublicKey::from(&private_key));
        Self {
            signing_key: SigningKey::<Sha256>::new(private_key),
            kid,
            keys,
            access_ttl: DEFAULT_ACCESS_TOKEN_TTL,
            refresh_ttl: DEFAULT_REFRESH_TOKEN_TTL,
            clock: Arc::new(SystemClock),
        }
    }

    #[must_use]
    pub fn with_access_ttl(mut self, ttl: Duration) -> Self {
        self.access_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl(mut self, ttl: Duration) -> Self {
        self.refresh_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Trust an additional verification key. The signing key is unaffected.
    #[must_use]
    pub fn with_verification_key(mut self, kid: impl Into<String>, public_key: RsaPublicKey) -> Self {
        self.keys.insert(kid, public_key);
        self
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    #[must_use]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    #[must_use]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Mint an access token carrying the full claim set.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn generate_token(
        &self,
        username: &str,
        user_id: &str,
        roles: &BTreeSet<String>,
        permissions: &BTreeSet<String>,
    ) -> Result<String, Error> {
        let mut claims = self.base_claims(username, TokenType::Access, self.access_ttl);
        claims.uid = Some(user_id.to_string());
        claims.roles = Some(roles.clone());
        claims.permissions = Some(permissions.clone());
        sign_rs256(&self.signing_key, &self.kid, &claims)
    }

    /// Mint a refresh token that carries only the subject.
    ///
    /// # Errors
    /// Returns an error if signing fails.
    pub fn generate_refresh_token(&self, username: &str) -> Result<String, Error> {
        let claims = self.base_claims(username, TokenType::Refresh, self.refresh_ttl);
        sign_rs256(&self.signing_key, &self.kid, &claims)
    }

    fn base_claims(&self, username: &str, token_type: TokenType, ttl: Duration) -> TokenClaims {
        let iat = self.clock.now_unix();
        let ttl_seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        TokenClaims {
            v: TOKEN_VERSION,
            sub: username.to_string(),
            token_type,
            iat,
            exp: iat.saturating_add(ttl_seconds),
            jti: Ulid::new().to_string(),
            uid: None,
            roles: None,
            permissions: None,
        }
    }

    #[must_use]
    pub fn inspect(&self, token: &str) -> TokenStatus {
        match verify_rs256(token, &self.keys, self.clock.now_unix()) {
            Ok(claims) => TokenStatus::Valid(claims),
            Err(Error::Expired) => TokenStatus::Expired,
            Err(err) => {
                debug!("token rejected: {err}");
                TokenStatus::Invalid
            }
        }
    }

    #[must_use]
    pub fn validate_token(&self, token: &str) -> bool {
        matches!(self.inspect(token), TokenStatus::Valid(_))
    }

    /// True iff the token is a structurally valid, correctly signed refresh
    /// token. Expiry is not considered; call [`Self::validate_token`] first.
    #[must_use]
    pub fn is_refresh_token(&self, token: &str) -> bool {
        decode_verified(token, &self.keys)
            .is_ok_and(|claims| claims.token_type == TokenType::Refresh)
    }

    /// Validate a token and require a specific type in one step.
    ///
    /// # Errors
    /// Returns the validation error, or [`Error::WrongType`] on a type mismatch.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<TokenClaims, Error> {
        let claims = verify_rs256(token, &self.keys, self.clock.now_unix())?;
        if claims.token_type != expected {
            return Err(Error::WrongType {
                expected,
                actual: claims.token_type,
            });
        }
        Ok(claims)
    }

    fn valid_claims(&self, token: &str) -> Result<TokenClaims, Error> {
        verify_rs256(token, &self.keys, self.clock.now_unix())
    }

    /// # Errors
    /// Fails closed on any token that is not valid.
    pub fn username_from_token(&self, token: &str) -> Result<String, Error> {
        self.valid_claims(token).map(|claims| claims.sub)
    }

    /// # Errors
    /// Fails closed on invalid tokens and on tokens without a user id.
    pub fn user_id_from_token(&self, token: &str) -> Result<String, Error> {
        self.valid_claims(token)?
            .uid
            .ok_or(Error::MissingClaim("uid"))
    }

    /// # Errors
    /// Fails closed on invalid tokens and on tokens without roles.
    pub fn roles_from_token(&self, token: &str) -> Result<BTreeSet<String>, Error> {
        self.valid_claims(token)?
            .roles
            .ok_or(Error::MissingClaim("roles"))
    }

    /// # Errors
    /// Fails closed on invalid tokens and on tokens without permissions.
    pub fn permissions_from_token(&self, token: &str) -> Result<BTreeSet<String>, Error> {
        self.valid_claims(token)?
            .permissions
            .ok_or(Error::MissingClaim("permissions"))
    }
}
