//! Auth handlers and supporting modules.
//!
//! This module implements the stateless session flow: login with an
//! RSA-encrypted password, refresh-token rotation, logout, and access-token
//! introspection.
//!
//! ## Token transport
//!
//! Tokens never appear in response bodies. Both travel as `HttpOnly` cookies
//! (`access_token`, `refresh_token`). Protected reads also accept an
//! `Authorization: Bearer` header when no access cookie is present.
//!
//! ## Collaborators
//!
//! The directory and the permission store are called under a deadline
//! (`AuthConfig::collaborator_timeout`). A timeout or transport failure is
//! reported as `503 Authentication service unavailable`.

pub(crate) mod cookies;
pub(crate) mod error;
pub(crate) mod login;
pub(crate) mod principal;
pub(crate) mod refresh;
pub(crate) mod session;
mod state;
pub(crate) mod types;

pub use cookies::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, SessionCookie};
pub use error::AuthError;
pub use principal::require_auth;
pub use state::{AuthConfig, AuthState, SameSite};
