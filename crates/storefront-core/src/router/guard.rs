//! Navigation guard.
//!
//! Every navigation is checked before it is committed. The decision is a
//! pure function of the session and the requirements of the matched route
//! chain; the only side effect is parking an OAuth callback token.

use thiserror::Error;
use tracing::{debug, warn};

use crate::auth::{capture_callback, Callback, Session, TokenStore};

use super::routes::RouteRequirement;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/home";

/// Why a navigation was redirected. None of these are surfaced to the user
/// as errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectCause {
    #[error("OAuth callback received")]
    OAuthCallback,

    #[error("Authentication required")]
    AuthRequired,

    #[error("Administrator access required")]
    AdminRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allowed,
    RedirectLogin(RedirectCause),
    RedirectHome(RedirectCause),
}

impl GuardDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GuardDecision::Allowed)
    }

    pub fn cause(&self) -> Option<RedirectCause> {
        match self {
            GuardDecision::Allowed => None,
            GuardDecision::RedirectLogin(cause) | GuardDecision::RedirectHome(cause) => Some(*cause),
        }
    }
}

/// One navigation attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavigationRequest {
    pub target_path: String,
    /// URL fragment at navigation time, without the `#`
    pub fragment: Option<String>,
    pub matched_requirements: Vec<RouteRequirement>,
}

/// Decide a navigation from explicit inputs.
///
/// Precedence: OAuth callback, then authentication, then admin role.
pub fn decide(oauth_callback: bool, requirements: &[RouteRequirement], session: &Session) -> GuardDecision {
    if oauth_callback {
        return GuardDecision::RedirectLogin(RedirectCause::OAuthCallback);
    }
    if requirements.iter().any(|r| r.requires_auth) && !session.is_authenticated() {
        return GuardDecision::RedirectLogin(RedirectCause::AuthRequired);
    }
    if requirements.iter().any(|r| r.requires_admin) && !session.is_admin {
        return GuardDecision::RedirectHome(RedirectCause::AdminRequired);
    }
    GuardDecision::Allowed
}

#[derive(Debug, Clone)]
pub struct RouteGuard {
    login_path: String,
    home_path: String,
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(LOGIN_PATH, HOME_PATH)
    }
}

impl RouteGuard {
    pub fn new(login_path: &str, home_path: &str) -> Self {
        Self {
            login_path: login_path.to_string(),
            home_path: home_path.to_string(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub fn home_path(&self) -> &str {
        &self.home_path
    }

    /// Run the guard for a request: capture any OAuth callback into the
    /// store, then decide against the stored session.
    pub fn check(&self, request: &NavigationRequest, store: &mut dyn TokenStore) -> GuardDecision {
        let callback = match capture_callback(request.fragment.as_deref(), store) {
            Ok(callback) => callback,
            Err(e) => {
                // The token was in the URL; it still must not stay there
                warn!(error = %e, "Failed to persist OAuth hand-off token");
                Callback::Received
            }
        };

        let session = Session::load(store);
        let decision = decide(
            callback == Callback::Received,
            &request.matched_requirements,
            &session,
        );
        debug!(path = %request.target_path, ?decision, "Guard decision");
        decision
    }

    /// Path the decision sends the user to, if it is a redirect
    pub fn redirect_target(&self, decision: GuardDecision) -> Option<&str> {
        match decision {
            GuardDecision::Allowed => None,
            GuardDecision::RedirectLogin(_) => Some(self.login_path.as_str()),
            GuardDecision::RedirectHome(_) => Some(self.home_path.as_str()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
