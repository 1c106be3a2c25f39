//! Session cookie transport.
//!
//! Both tokens travel as `HttpOnly` cookies. Each response that touches a
//! session writes exactly one `Set-Cookie` header per cookie name.

use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue, SET_COOKIE},
};
use std::fmt;
use std::time::Duration;
use tracing::error;

use super::{
    error::AuthError,
    state::{AuthConfig, SameSite},
};

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

/// One `Set-Cookie` value with its security attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie<'a> {
    name: &'static str,
    value: &'a str,
    max_age_seconds: u64,
    same_site: SameSite,
    secure: bool,
}

impl<'a> SessionCookie<'a> {
    #[must_use]
    pub fn new(name: &'static str, value: &'a str, max_age: Duration, config: &AuthConfig) -> Self {
        Self {
            name,
            value,
            max_age_seconds: max_age.as_secs(),
            same_site: config.cookie_same_site(),
            secure: config.cookie_secure(),
        }
    }

    /// Same attributes, empty value and `Max-Age=0` so the browser drops it.
    #[must_use]
    pub fn cleared(name: &'static str, config: &AuthConfig) -> Self {
        Self::new(name, "", Duration::ZERO, config)
    }

    /// # Errors
    /// Returns an error if the value contains bytes not allowed in a header.
    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_string())
    }
}

impl fmt::Display for SessionCookie<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            self.name, self.value, self.max_age_seconds, self.same_site
        )?;
        if self.secure {
            f.write_str("; Secure")?;
        }
        Ok(())
    }
}

fn append(headers: &mut HeaderMap, cookie: &SessionCookie<'_>) -> Result<(), AuthError> {
    let value = cookie.header_value().map_err(|err| {
        error!("Failed to encode session cookie: {err}");
        AuthError::Internal
    })?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

/// Write both session cookies.
pub(super) fn set_session_cookies(
    headers: &mut HeaderMap,
    config: &AuthConfig,
    access_token: &str,
    access_ttl: Duration,
    refresh_token: &str,
    refresh_ttl: Duration,
) -> Result<(), AuthError> {
    append(
        headers,
        &SessionCookie::new(ACCESS_TOKEN_COOKIE, access_token, access_ttl, config),
    )?;
    append(
        headers,
        &SessionCookie::new(REFRESH_TOKEN_COOKIE, refresh_token, refresh_ttl, config),
    )
}

/// Overwrite both session cookies with expired, empty values.
pub(super) fn clear_session_cookies(
    headers: &mut HeaderMap,
    config: &AuthConfig,
) -> Result<(), AuthError> {
    append(headers, &SessionCookie::cleared(ACCESS_TOKEN_COOKIE, config))?;
    append(headers, &SessionCookie::cleared(REFRESH_TOKEN_COOKIE, config))
}

/// Read a cookie value by name. Empty values count as absent.
#[must_use]
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, val) = pair.trim().split_once('=')?;
            (key.trim() == name).then(|| val.trim())
        })
        .find(|val| !val.is_empty())
        .map(ToString::to_string)
}

#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
