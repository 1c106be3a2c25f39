//! # Portero (Back-office authentication gateway)
//!
//! `portero` fronts the back-office API with a stateless authentication core.
//! Clients fetch an RSA public key, encrypt the password locally, and exchange
//! it for a pair of signed tokens delivered as `HttpOnly` cookies.
//!
//! ## Tokens
//!
//! - **Access token:** short-lived, carries the user id, roles and fine-grained
//!   permissions. Presented as the `access_token` cookie or as a bearer header.
//! - **Refresh token:** long-lived, carries only the subject. Roles and
//!   permissions are resolved again on every refresh, and both tokens rotate.
//!
//! Tokens are RS256 compact JWS values. Nothing is stored server-side, so a
//! token stays valid until it expires.
//!
//! ## Identity sources
//!
//! A small compiled-in table of mock identities can be enabled for test
//! environments. Every other username is authenticated against the external
//! directory, and its permissions are looked up through a `PermissionResolver`.
//!
//! ## Failure reporting
//!
//! Login failures always answer `401 Invalid username or password`, whether
//! the ciphertext was malformed, the user unknown, or the password wrong.

pub mod api;
pub mod cli;
pub mod identity;
pub mod keys;
pub mod token;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
