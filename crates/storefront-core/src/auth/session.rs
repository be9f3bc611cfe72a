use serde::{Deserialize, Serialize};
use tracing::info;

use super::store::{StorageKey, StoreError, TokenStore};

/// Value stored under `isAdmin` for administrators. Anything else,
/// including absence, means not an admin.
const ADMIN_FLAG: &str = "true";

/// Typed snapshot of the session keys held in a [`TokenStore`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
    pub is_admin: bool,
}

/// Tokens returned by the backend on a successful login.
#[derive(Debug, Clone, Default)]
pub struct LoginCredentials {
    pub access: String,
    pub refresh: Option<String>,
    pub username: String,
    pub is_admin: bool,
}

impl Session {
    /// Read the current session from the store
    pub fn load(store: &dyn TokenStore) -> Self {
        Self {
            token: non_empty(store.get(StorageKey::Token)),
            refresh_token: non_empty(store.get(StorageKey::RefreshToken)),
            username: non_empty(store.get(StorageKey::Username)),
            is_admin: store.get(StorageKey::IsAdmin).as_deref() == Some(ADMIN_FLAG),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Persist a freshly issued login
    pub fn login(store: &mut dyn TokenStore, credentials: &LoginCredentials) -> Result<Self, StoreError> {
        store.set(StorageKey::Token, &credentials.access)?;
        match credentials.refresh {
            Some(ref refresh) => store.set(StorageKey::RefreshToken, refresh)?,
            None => store.clear(StorageKey::RefreshToken)?,
        }
        store.set(StorageKey::Username, &credentials.username)?;
        if credentials.is_admin {
            store.set(StorageKey::IsAdmin, ADMIN_FLAG)?;
        } else {
            store.clear(StorageKey::IsAdmin)?;
        }

        info!(username = %credentials.username, admin = credentials.is_admin, "Logged in");
        Ok(Self::load(store))
    }

    /// Remove every session key. The OAuth hand-off slot is left alone.
    pub fn logout(store: &mut dyn TokenStore) -> Result<(), StoreError> {
        for key in StorageKey::SESSION {
            store.clear(key)?;
        }
        info!("Logged out");
        Ok(())
    }

    /// Take the token left by the OAuth callback, clearing the slot
    pub fn take_oauth_handoff(store: &mut dyn TokenStore) -> Result<Option<String>, StoreError> {
        let token = non_empty(store.get(StorageKey::OAuthHandoff));
        if token.is_some() {
            store.clear(StorageKey::OAuthHandoff)?;
        }
        Ok(token)
    }

    /// Finish a login started by the OAuth redirect.
    ///
    /// Returns `None` when no hand-off token is waiting. The provider does not
    /// issue a refresh token, and OAuth logins never carry the admin flag.
    pub fn complete_oauth_login(
        store: &mut dyn TokenStore,
        username: &str,
    ) -> Result<Option<Self>, StoreError> {
        let Some(access) = Self::take_oauth_handoff(store)? else {
            return Ok(None);
        };
        let credentials = LoginCredentials {
            access,
            refresh: None,
            username: username.to_string(),
            is_admin: false,
        };
        Self::login(store, &credentials).map(Some)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;

    fn credentials(is_admin: bool) -> LoginCredentials {
        LoginCredentials {
            access: "access-token".to_string(),
            refresh: Some("refresh-token".to_string()),
            username: "testuser".to_string(),
            is_admin,
        }
    }

    #[test]
    fn test_load_empty_store() {
        let store = MemoryTokenStore::new();
        let session = Session::load(&store);
        assert_eq!(session, Session::default());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_login_writes_all_keys() {
        let mut store = MemoryTokenStore::new();
        let session = Session::login(&mut store, &credentials(false)).unwrap();

        assert_eq!(store.get(StorageKey::Token).as_deref(), Some("access-token"));
        assert_eq!(store.get(StorageKey::RefreshToken).as_deref(), Some("refresh-token"));
        assert_eq!(store.get(StorageKey::Username).as_deref(), Some("testuser"));
        assert_eq!(store.get(StorageKey::IsAdmin), None);
        assert!(session.is_authenticated());
        assert!(!session.is_admin);
    }

    #[test]
    fn test_admin_flag_must_be_exactly_true() {
        let mut store = MemoryTokenStore::new();
        for value in ["True", "1", "yes", "false", ""] {
            store.set(StorageKey::IsAdmin, value).unwrap();
            assert!(!Session::load(&store).is_admin, "{value:?} must not grant admin");
        }
        store.set(StorageKey::IsAdmin, "true").unwrap();
        assert!(Session::load(&store).is_admin);
    }

    #[test]
    fn test_empty_token_is_not_authenticated() {
        let mut store = MemoryTokenStore::new();
        store.set(StorageKey::Token, "").unwrap();
        assert!(!Session::load(&store).is_authenticated());
    }

    #[test]
    fn test_logout_clears_session_but_not_handoff() {
        let mut store = MemoryTokenStore::new();
        Session::login(&mut store, &credentials(true)).unwrap();
        store.set(StorageKey::OAuthHandoff, "pending").unwrap();

        Session::logout(&mut store).unwrap();

        assert_eq!(Session::load(&store), Session::default());
        assert_eq!(store.get(StorageKey::OAuthHandoff).as_deref(), Some("pending"));
    }

    #[test]
    fn test_relogin_as_non_admin_drops_flag() {
        let mut store = MemoryTokenStore::new();
        Session::login(&mut store, &credentials(true)).unwrap();
        let session = Session::login(&mut store, &credentials(false)).unwrap();
        assert!(!session.is_admin);
    }

    #[test]
    fn test_take_oauth_handoff_clears_slot() {
        let mut store = MemoryTokenStore::new();
        assert_eq!(Session::take_oauth_handoff(&mut store).unwrap(), None);

        store.set(StorageKey::OAuthHandoff, "abc123").unwrap();
        assert_eq!(
            Session::take_oauth_handoff(&mut store).unwrap().as_deref(),
            Some("abc123")
        );
        assert_eq!(store.get(StorageKey::OAuthHandoff), None);
    }

    #[test]
    fn test_complete_oauth_login() {
        let mut store = MemoryTokenStore::new();
        assert_eq!(Session::complete_oauth_login(&mut store, "oauth-user").unwrap(), None);

        store.set(StorageKey::OAuthHandoff, "abc123").unwrap();
        let session = Session::complete_oauth_login(&mut store, "oauth-user")
            .unwrap()
            .unwrap();

        assert_eq!(session.token.as_deref(), Some("abc123"));
        assert_eq!(session.username.as_deref(), Some("oauth-user"));
        assert_eq!(session.refresh_token, None);
        assert!(!session.is_admin);
        assert_eq!(store.get(StorageKey::OAuthHandoff), None);
    }
}
