//! OAuth implicit-grant callback handling.
//!
//! The identity provider redirects back with the token in the URL fragment
//! (`#access_token=...&token_type=bearer&expires_in=...`). The token is parked
//! in the hand-off slot so the login screen can finish the sign-in.

use thiserror::Error;
use tracing::debug;

use super::store::{StorageKey, StoreError, TokenStore};

const ACCESS_TOKEN_PARAM: &str = "access_token";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OAuthError {
    #[error("Fragment carries no access_token")]
    NoToken,

    #[error("Fragment carries an empty access_token")]
    EmptyToken,
}

/// Find the access token in a URL fragment. The leading `#` is optional.
///
/// A hash-routed callback may put the parameters behind a path
/// (`#/login?access_token=...`), so `?` also starts a parameter.
pub fn extract_access_token(fragment: &str) -> Result<&str, OAuthError> {
    let fragment = fragment.strip_prefix('#').unwrap_or(fragment);

    let value = fragment
        .split(['&', '?'])
        .find_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            (name == ACCESS_TOKEN_PARAM).then_some(value)
        })
        .ok_or(OAuthError::NoToken)?;

    if value.is_empty() {
        return Err(OAuthError::EmptyToken);
    }
    Ok(value)
}

/// Outcome of inspecting a navigation's fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Callback {
    /// Token stored under the hand-off key; the fragment must be dropped.
    Received,
    /// Not an OAuth callback. Navigation proceeds untouched.
    Absent,
}

/// Park the fragment's access token in the hand-off slot, if there is one.
///
/// Malformed or empty tokens are not an error for the caller: they are
/// treated as no callback at all.
pub fn capture_callback(fragment: Option<&str>, store: &mut dyn TokenStore) -> Result<Callback, StoreError> {
    let Some(fragment) = fragment else {
        return Ok(Callback::Absent);
    };

    match extract_access_token(fragment) {
        Ok(token) => {
            store.set(StorageKey::OAuthHandoff, token)?;
            debug!("Captured OAuth access token from fragment");
            Ok(Callback::Received)
        }
        Err(e @ OAuthError::EmptyToken) => {
            debug!(error = %e, "Ignoring OAuth callback");
            Ok(Callback::Absent)
        }
        Err(OAuthError::NoToken) => Ok(Callback::Absent),
    }
}

// ============================================================================
// Tests
// ============================================================================
