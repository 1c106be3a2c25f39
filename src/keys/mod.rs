//! Asymmetric key provider used for client-side password encryption.
//!
//! The server publishes the SPKI public key; the browser encrypts the password
//! with it and sends the base64 ciphertext. Only this module ever touches the
//! private half. Key material is immutable after construction, so a single
//! `KeyProvider` is shared across requests without locking.

use base64ct::{Base64, Base64UrlUnpadded, Encoding};
use rand::rngs::OsRng;
use rsa::{
    Oaep, Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey,
    pkcs1::DecodeRsaPrivateKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey},
};
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};
use thiserror::Error;

pub const DEFAULT_KEY_BITS: usize = 2048;

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("failed to generate RSA key")]
    Generate(#[source] rsa::Error),
    #[error("failed to parse RSA private key")]
    Parse,
    #[error("failed to parse RSA public key")]
    PublicKey,
    #[error("failed to encode RSA public key")]
    Encode,
    #[error("failed to encrypt payload")]
    Encrypt(#[source] rsa::Error),
}

/// Reasons a ciphertext could not be turned back into a password.
///
/// Callers must collapse every variant into the same generic authentication
/// failure before answering the client.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecryptionError {
    #[error("ciphertext is empty")]
    Empty,
    #[error("ciphertext is not valid base64")]
    Base64,
    #[error("ciphertext could not be decrypted")]
    Decrypt,
    #[error("plaintext is not valid UTF-8")]
    Utf8,
}

/// RSA encryption padding expected from clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Padding {
    /// PKCS#1 v1.5, what browser RSA libraries produce by default.
    #[default]
    Pkcs1v15,
    /// RSA-OAEP with SHA-256.
    Oaep,
}

impl Padding {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pkcs1v15 => "pkcs1",
            Self::Oaep => "oaep",
        }
    }
}

impl FromStr for Padding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pkcs1" | "pkcs1v15" => Ok(Self::Pkcs1v15),
            "oaep" => Ok(Self::Oaep),
            other => Err(format!("unsupported padding: {other}")),
        }
    }
}

impl fmt::Display for Padding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide RSA keypair for password transport.
pub struct KeyProvider {
    private_key: RsaPrivateKey,
    public_key_b64: String,
    fingerprint: String,
    padding: Padding,
}

impl KeyProvider {
    /// Build a provider around an existing private key.
    ///
    /// # Errors
    /// Returns an error if the public key cannot be DER encoded.
    pub fn new(private_key: RsaPrivateKey, padding: Padding) -> Result<Self, KeyError> {
        let der = RsaPublicKey::from(&private_key)
            .to_public_key_der()
            .map_err(|_| KeyError::Encode)?;
        let fingerprint = Base64UrlUnpadded::encode_string(&Sha256::digest(der.as_bytes()));
        Ok(Self {
            private_key,
            public_key_b64: Base64::encode_string(der.as_bytes()),
            fingerprint,
            padding,
        })
    }

    /// Generate a fresh keypair. CPU heavy; run it off the async executor.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn generate(bits: usize, padding: Padding) -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits).map_err(KeyError::Generate)?;
        Self::new(private_key, padding)
    }

    /// Load the keypair from a PKCS#8 or PKCS#1 PEM document.
    ///
    /// # Errors
    /// Returns an error if the PEM cannot be parsed.
    pub fn from_pem(pem: &str, padding: Padding) -> Result<Self, KeyError> {
        Self::new(private_key_from_pem(pem)?, padding)
    }

    /// Base64 (standard alphabet) of the DER/SPKI public key.
    #[must_use]
    pub fn public_key_base64(&self) -> &str {
        &self.public_key_b64
    }

    /// SHA-256 fingerprint of the public key, safe to log.
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    #[must_use]
    pub fn padding(&self) -> Padding {
        self.padding
    }

    /// Decrypt a base64 ciphertext produced with [`Self::public_key_base64`].
    ///
    /// # Errors
    /// Returns a [`DecryptionError`] for malformed base64, wrong padding, a key
    /// mismatch, or plaintext that is not UTF-8.
    pub fn decrypt(&self, ciphertext_b64: &str) -> Result<SecretString, DecryptionError> {
        let trimmed = ciphertext_b64.trim();
        if trimmed.is_empty() {
            return Err(DecryptionError::Empty);
        }
        let ciphertext = Base64::decode_vec(trimmed).map_err(|_| DecryptionError::Base64)?;

        let plaintext = match self.padding {
            Padding::Pkcs1v15 => self.private_key.decrypt(Pkcs1v15Encrypt, &ciphertext),
            Padding::Oaep => self
                .private_key
                .decrypt(Oaep::new::<Sha256>(), &ciphertext),
        }
        .map_err(|_| DecryptionError::Decrypt)?;

        String::from_utf8(plaintext)
            .map(SecretString::from)
            .map_err(|_| DecryptionError::Utf8)
    }
}

impl fmt::Debug for KeyProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyProvider")
            .field("private_key", &"***")
            .field("fingerprint", &self.fingerprint)
            .field("padding", &self.padding)
            .finish()
    }
}

/// Parse an RSA private key from PEM, accepting PKCS#8 and PKCS#1 encodings.
///
/// # Errors
/// Returns [`KeyError::Parse`] if neither encoding matches.
pub fn private_key_from_pem(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    let pem = pem.trim();
    if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
        return Ok(key);
    }
    RsaPrivateKey::from_pkcs1_pem(pem).map_err(|_| KeyError::Parse)
}

/// Encrypt `plaintext` the way a browser client does with the published key.
///
/// # Errors
/// Returns an error if the public key is not valid base64 SPKI or encryption fails.
pub fn encrypt_with_public_key(
    public_key_b64: &str,
    plaintext: &str,
    padding: Padding,
) -> Result<String, KeyError> {
    let der = Base64::decode_vec(public_key_b64.trim()).map_err(|_| KeyError::PublicKey)?;
    let public_key = RsaPublicKey::from_public_key_der(&der).map_err(|_| KeyError::PublicKey)?;
    let ciphertext = match padding {
        Padding::Pkcs1v15 => public_key.encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext.as_bytes()),
        Padding::Oaep => public_key.encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext.as_bytes()),
    }
    .map_err(KeyError::Encrypt)?;
    Ok(Base64::encode_string(&ciphertext))
}
