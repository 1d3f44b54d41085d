//! Request abstraction handed to the message handlers
//!
//! Carries only what the handlers consume: the raw query string, the
//! collected body and the session username taken from the `username` cookie.

use hyper::body::Bytes;
use hyper::header::{HeaderMap, COOKIE};
use hyper::http::request::Parts;

/// Cookie carrying the acting username
const USERNAME_COOKIE: &str = "username";

#[derive(Debug, Clone, Default)]
pub struct BoardRequest {
    /// Query string without the leading `?`
    pub query: Option<String>,
    pub body: Bytes,
    /// Username from the session cookie, if any
    pub session_username: Option<String>,
}

impl BoardRequest {
    pub fn from_parts(parts: &Parts, body: Bytes) -> Self {
        Self {
            query: parts.uri.query().map(ToString::to_string),
            body,
            session_username: username_from_cookies(&parts.headers),
        }
    }

    /// First value of a percent-decoded query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Find the username cookie across all `Cookie` headers
fn username_from_cookies(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == USERNAME_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}
