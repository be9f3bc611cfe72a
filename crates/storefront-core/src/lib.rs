//! Storefront client core.
//!
//! The part of the storefront single-page application with real contracts:
//! the session store, the navigation guard (including OAuth callback
//! capture), and the toast notification queue with its telemetry side
//! channel. Views call into this crate; nothing here renders anything.

pub mod auth;
pub mod config;
pub mod notify;
pub mod router;

pub use auth::{FileTokenStore, LoginCredentials, MemoryTokenStore, Session, StorageKey, TokenStore};
pub use config::{Config, TelemetryConfig};
pub use notify::{NotificationQueue, Severity, ToastEntry, ToastEvent, ToastId};
pub use router::{GuardDecision, Location, Navigation, Navigator, RedirectCause, RouteGuard, RouteTable};
