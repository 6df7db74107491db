/// Session management for caller authentication

use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Authenticated part of a session; present only while logged in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAuth {
    pub login: String,
    /// Stored verbatim, as the mock credential rule requires
    pub password_echo: String,
    pub session_key: u64,
}

/// Per-caller session, keyed by the opaque cookie token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub auth: Option<SessionAuth>,
}

impl Session {
    pub fn is_logged_in(&self) -> bool {
        self.auth.is_some()
    }

    pub fn session_key(&self) -> Option<u64> {
        self.auth.as_ref().map(|a| a.session_key)
    }
}

/// Session state machine errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("user '{login}' is already logged in")]
    AlreadyLoggedIn { login: String },

    #[error("invalid login or password")]
    InvalidCredentials,

    #[error("user is not logged in")]
    NotLoggedIn,
}

struct SessionTable {
    sessions: HashMap<String, Session>,
    next_session_key: u64,
}

/// Session store shared by all gateway handlers.
///
/// Every check-and-mutate runs under the same write lock, so two racing logins
/// on one token resolve first-writer-wins and session keys are never reused.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionTable>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionTable {
                sessions: HashMap::new(),
                next_session_key: 1,
            })),
        }
    }

    /// Get the session for `token`; an unknown token yields an empty session.
    ///
    /// Only `login` inserts into the table, so anonymous traffic leaves no state.
    pub async fn get_or_create(&self, token: &str) -> Session {
        self.inner
            .read()
            .await
            .sessions
            .get(token)
            .cloned()
            .unwrap_or_default()
    }

    /// Log the session in, returning its freshly assigned key
    pub async fn login(&self, token: &str, login: &str, password: &str) -> Result<u64, SessionError> {
        let mut table = self.inner.write().await;

        if let Some(auth) = table.sessions.get(token).and_then(|s| s.auth.as_ref()) {
            return Err(SessionError::AlreadyLoggedIn {
                login: auth.login.clone(),
            });
        }

        if login != password {
            return Err(SessionError::InvalidCredentials);
        }

        let session_key = table.next_session_key;
        table.next_session_key += 1;

        let session = table.sessions.entry(token.to_string()).or_default();
        session.auth = Some(SessionAuth {
            login: login.to_string(),
            password_echo: password.to_string(),
            session_key,
        });

        Ok(session_key)
    }

    /// Drop the session, returning what was cleared
    pub async fn logout(&self, token: &str) -> Result<SessionAuth, SessionError> {
        let mut table = self.inner.write().await;
        table
            .sessions
            .remove(token)
            .and_then(|s| s.auth)
            .ok_or(SessionError::NotLoggedIn)
    }

    /// Get total session count
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
