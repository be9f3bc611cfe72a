use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, warn};

use crate::auth::{Session, TokenStore};

use super::guard::{GuardDecision, NavigationRequest, RouteGuard};
use super::routes::{normalize_path, RouteTable};

/// Maximum number of static redirects followed for one navigation.
/// Guards against redirect cycles in a misconfigured table.
const MAX_STATIC_REDIRECTS: usize = 8;

/// A client-side URL split into its parts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub path: String,
    pub query: Option<String>,
    pub fragment: Option<String>,
}

impl Location {
    /// Parse `path[?query][#fragment]`. Empty query/fragment parts are dropped.
    pub fn parse(url: &str) -> Self {
        let (rest, fragment) = match url.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment)),
            None => (url, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        Self {
            path: normalize_path(path),
            query: query.filter(|q| !q.is_empty()).map(str::to_string),
            fragment: fragment.filter(|f| !f.is_empty()).map(str::to_string),
        }
    }

    pub fn from_path(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            query: None,
            fragment: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(ref query) = self.query {
            write!(f, "?{}", query)?;
        }
        if let Some(ref fragment) = self.fragment {
            write!(f, "#{}", fragment)?;
        }
        Ok(())
    }
}

/// Outcome of one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub requested: Location,
    pub decision: GuardDecision,
    /// Where the navigation ended up
    pub location: Location,
    /// Name of the route at `location`, if it has one
    pub route: Option<String>,
    pub params: BTreeMap<String, String>,
}

impl Navigation {
    pub fn is_redirect(&self) -> bool {
        !self.decision.is_allowed()
    }
}

/// Owns the current location and the token store, and runs the guard
/// on every navigation before committing it.
pub struct Navigator<S: TokenStore> {
    table: RouteTable,
    guard: RouteGuard,
    store: S,
    current: Location,
}

impl<S: TokenStore> Navigator<S> {
    pub fn new(table: RouteTable, guard: RouteGuard, store: S) -> Self {
        Self {
            table,
            guard,
            store,
            current: Location::from_path("/"),
        }
    }

    pub fn current(&self) -> &Location {
        &self.current
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn session(&self) -> Session {
        Session::load(&self.store)
    }

    /// Navigate to `url`. The guard decides before anything is committed;
    /// a redirect commits the redirect target instead, without a fragment.
    pub fn navigate(&mut self, url: &str) -> Navigation {
        let requested = Location::parse(url);
        let target = self.follow_static_redirects(&requested);
        let matched = self.table.resolve(&target.path);

        let request = NavigationRequest {
            target_path: target.path.clone(),
            fragment: target.fragment.clone(),
            matched_requirements: matched
                .as_ref()
                .map(|m| m.requirements.clone())
                .unwrap_or_default(),
        };
        let decision = self.guard.check(&request, &mut self.store);

        let navigation = match self.guard.redirect_target(decision) {
            None => {
                let (route, params) = matched.map(|m| (m.name, m.params)).unwrap_or_default();
                Navigation {
                    requested,
                    decision,
                    location: target,
                    route,
                    params,
                }
            }
            Some(redirect) => {
                let location = Location::from_path(redirect);
                let route = self.table.resolve(&location.path).and_then(|m| m.name);
                info!(
                    from = %request.target_path,
                    to = %location.path,
                    cause = ?decision.cause(),
                    "Navigation redirected"
                );
                Navigation {
                    requested,
                    decision,
                    location,
                    route,
                    params: BTreeMap::new(),
                }
            }
        };

        self.current = navigation.location.clone();
        navigation
    }

    fn follow_static_redirects(&self, requested: &Location) -> Location {
        let mut target = requested.clone();
        for _ in 0..MAX_STATIC_REDIRECTS {
            let Some(redirect) = self.table.resolve(&target.path).and_then(|m| m.redirect) else {
                return target;
            };
            debug!(from = %target.path, to = %redirect, "Following static redirect");
            target.path = normalize_path(&redirect);
        }
        warn!(path = %requested.path, "Too many static redirects");
        target
    }
}

// ============================================================================
// Tests
// ============================================================================
