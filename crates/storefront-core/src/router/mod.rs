//! Client-side routing with a navigation guard.
//!
//! This module provides:
//! - `RouteTable`: route definitions with access requirements, nested
//!   children, `:param` segments and static redirects
//! - `RouteGuard`: the allow / redirect-to-login / redirect-home decision
//! - `Navigator`: applies the guard to each navigation and tracks the
//!   current location
//!
//! Requirements are inherited: a route is protected if it or any ancestor
//! declares the flag.

pub mod guard;
pub mod navigator;
pub mod routes;

pub use guard::{decide, GuardDecision, NavigationRequest, RedirectCause, RouteGuard, HOME_PATH, LOGIN_PATH};
pub use navigator::{Location, Navigation, Navigator};
pub use routes::{Route, RouteMatch, RouteRequirement, RouteTable};
