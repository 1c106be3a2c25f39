use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::{BTreeSet, HashMap};
use std::fmt;

use super::error::Error;

pub const TOKEN_VERSION: u8 = 1;
pub const ALG_RS256: &str = "RS256";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
    pub kid: String,
}

impl TokenHeader {
    fn rs256(kid: impl Into<String>) -> Self {
        Self {
            alg: ALG_RS256.to_string(),
            typ: "JWT".to_string(),
            kid: kid.into(),
        }
    }
}

/// Signed claim set. Access tokens carry `uid`, `roles` and `permissions`;
/// refresh tokens carry none of them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenClaims {
    pub v: u8,
    pub sub: String,
    #[serde(rename = "typ")]
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roles: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<BTreeSet<String>>,
}

impl TokenClaims {
    fn check_required(&self) -> Result<(), Error> {
        if self.v != TOKEN_VERSION {
            return Err(Error::InvalidVersion);
        }
        if self.sub.is_empty() {
            return Err(Error::MissingClaim("sub"));
        }
        if self.token_type == TokenType::Access {
            if self.uid.is_none() {
                return Err(Error::MissingClaim("uid"));
            }
            if self.roles.is_none() {
                return Err(Error::MissingClaim("roles"));
            }
            if self.permissions.is_none() {
                return Err(Error::MissingClaim("permissions"));
            }
        }
        Ok(())
    }
}

/// Trusted verification keys indexed by `kid`.
#[derive(Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, VerifyingKey<Sha256>>,
}

impl KeySet {
    pub fn insert(&mut self, kid: impl Into<String>, public_key: RsaPublicKey) {
        self.keys
            .insert(kid.into(), VerifyingKey::<Sha256>::new(public_key));
    }

    #[must_use]
    pub fn find_by_kid(&self, kid: &str) -> Option<&VerifyingKey<Sha256>> {
        self.keys.get(kid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, Error> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, Error> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| Error::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Sign `claims` into a compact RS256 token.
///
/// # Errors
/// Returns an error if the claims cannot be encoded or signing fails.
pub fn sign_rs256(
    signing_key: &SigningKey<Sha256>,
    kid: &str,
    claims: &TokenClaims,
) -> Result<String, Error> {
    let header_b64 = b64e_json(&TokenHeader::rs256(kid))?;
    let claims_b64 = b64e_json(claims)?;
    let signing_input = format!("{header_b64}.{claims_b64}");

    let signature: Signature = signing_key
        .try_sign(signing_input.as_bytes())
        .map_err(|_| Error::Signing)?;
    let signature_b64 = Base64UrlUnpadded::encode_string(&signature.to_vec());

    Ok(format!("{signing_input}.{signature_b64}"))
}

/// Check signature and claim structure, ignoring expiry.
///
/// # Errors
/// Returns an error for malformed tokens, unsupported algorithms, unknown
/// keys, bad signatures and missing claims.
pub fn decode_verified(token: &str, keys: &KeySet) -> Result<TokenClaims, Error> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let claims_b64 = parts.next().ok_or(Error::TokenFormat)?;
    let sig_b64 = parts.next().ok_or(Error::TokenFormat)?;
    if parts.next().is_some() {
        return Err(Error::TokenFormat);
    }

    let header: TokenHeader = b64d_json(header_b64)?;
    if header.alg != ALG_RS256 {
        return Err(Error::UnsupportedAlg(header.alg));
    }

    let verifying_key = keys
        .find_by_kid(&header.kid)
        .ok_or_else(|| Error::UnknownKid(header.kid.clone()))?;

    let signing_input = format!("{header_b64}.{claims_b64}");
    let signature_bytes = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| Error::Base64)?;
    let signature =
        Signature::try_from(signature_bytes.as_slice()).map_err(|_| Error::InvalidSignature)?;
    verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| Error::InvalidSignature)?;

    let claims: TokenClaims = b64d_json(claims_b64)?;
    claims.check_required()?;
    Ok(claims)
}

/// Full validation: signature, structure and `exp > now`.
///
/// # Errors
/// Returns [`Error::Expired`] once `now >= exp`, otherwise the errors of
/// [`decode_verified`].
pub fn verify_rs256(token: &str, keys: &KeySet, now_unix_seconds: i64) -> Result<TokenClaims, Error> {
    let claims = decode_verified(token, keys)?;
    if claims.exp <= now_unix_seconds {
        return Err(Error::Expired);
    }
    Ok(claims)
}
