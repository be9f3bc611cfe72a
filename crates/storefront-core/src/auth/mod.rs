//! Authentication state for the storefront client.
//!
//! This module provides:
//! - `TokenStore`: durable key/value storage for credentials (memory or file backed)
//! - `Session`: typed view of the stored credentials with login/logout
//! - OAuth callback capture for tokens delivered in the URL fragment
//!
//! Sessions have no expiry; they last until logout.

pub mod oauth;
pub mod session;
pub mod store;

pub use oauth::{capture_callback, extract_access_token, Callback, OAuthError};
pub use session::{LoginCredentials, Session};
pub use store::{FileTokenStore, MemoryTokenStore, StorageKey, StoreError, TokenStore};
