//! Login session and logged-in user tracking.
//!
//! The backend keeps the session in a cookie; this side logs in and out
//! and remembers who `/me` says we are, publishing changes on a watch
//! channel.

use std::sync::Arc;
use std::time::Duration;

use ebpls_client::{ClientError, SessionApi};
use ebpls_types::User;
use thiserror::Error;
use tokio::sync::watch;

use crate::error::Alert;

/// Budget for clearing a stale session before a new login
pub const STALE_LOGOUT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum LoginError {
    /// Blank username or password; nothing was sent
    #[error("{0} is required")]
    MissingField(&'static str),

    /// HTTP 401 from `/login`
    #[error("invalid credentials: {message}")]
    InvalidCredentials { message: String },

    #[error("login rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("server did not answer in time")]
    Timeout,

    #[error("cannot reach the server: {0}")]
    Network(#[source] ClientError),

    /// Login succeeded but `/me` still reports nobody
    #[error("logged in but no session user was returned")]
    UserUnavailable,

    #[error("login failed: {0}")]
    Failed(#[source] ClientError),
}

impl LoginError {
    pub fn alert(&self) -> Alert {
        match self {
            Self::MissingField(field) => Alert::new("Login Failed", format!("{field} is required")),
            Self::InvalidCredentials { message } | Self::Rejected { message, .. } => {
                credential_alert(message)
            }
            Self::Timeout => Alert::new(
                "Connection Timeout",
                "The server is taking too long to respond. Please check your API configuration.",
            ),
            Self::Network(_) => Alert::new(
                "Network Error",
                "Cannot connect to the server. Please check your API configuration and internet connection.",
            ),
            Self::UserUnavailable => {
                Alert::new("Login Failed", "Could not load your account. Please try again.")
            }
            Self::Failed(e) => Alert::new("Login Failed", e.user_message()),
        }
    }
}

/// Pick the message box from what the backend said about the credentials
fn credential_alert(message: &str) -> Alert {
    let lower = message.to_lowercase();
    if lower.contains("username") {
        Alert::new(
            "Username and Password Error",
            "Username and password not found. Please check and try again.",
        )
    } else if lower.contains("password") {
        Alert::new("Password Error", "Incorrect password. Please try again.")
    } else if lower.contains("credentials") || lower.contains("invalid") {
        Alert::new(
            "Login Failed",
            "Invalid username or password. Please try again.",
        )
    } else if message.is_empty() {
        Alert::new("Login Failed", "Invalid credentials")
    } else {
        Alert::new("Login Failed", message)
    }
}

impl From<ClientError> for LoginError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Timeout { .. } => Self::Timeout,
            ClientError::Status {
                status: 401,
                message,
                ..
            } => Self::InvalidCredentials { message },
            ClientError::Status {
                status, message, ..
            } => Self::Rejected { status, message },
            e @ ClientError::Transport { .. } => Self::Network(e),
            other => Self::Failed(other),
        }
    }
}

pub struct SessionState {
    api: Arc<dyn SessionApi>,
    user: watch::Sender<Option<User>>,
    loading: bool,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("user", &*self.user.borrow())
            .field("loading", &self.loading)
            .finish_non_exhaustive()
    }
}

impl SessionState {
    /// Starts in the loading state until the first [`refetch`](Self::refetch)
    pub fn new(api: Arc<dyn SessionApi>) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            api,
            user,
            loading: true,
        }
    }

    pub fn user(&self) -> Option<User> {
        self.user.borrow().clone()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<User>> {
        self.user.subscribe()
    }

    pub fn set_user(&self, user: Option<User>) {
        self.user.send_replace(user);
    }

    /// Ask the backend who is logged in. Any failure counts as logged out.
    pub async fn refetch(&mut self) -> Option<User> {
        self.loading = true;
        let user = match self.api.current_user().await {
            Ok(Some(user)) => {
                tracing::info!(user_id = user.id, username = %user.username, "Session user loaded");
                Some(user)
            }
            Ok(None) => {
                tracing::info!("Not authenticated");
                None
            }
            Err(e) => {
                log_failure("Fetching session user failed", &e);
                None
            }
        };
        self.set_user(user.clone());
        self.loading = false;
        user
    }

    /// Log in and load the session user.
    ///
    /// Any old session is cleared first (best effort, bounded by
    /// [`STALE_LOGOUT_TIMEOUT`]), then `/login` is posted and `/me` read
    /// back. On failure the local user is left logged out.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<User, LoginError> {
        if username.trim().is_empty() {
            return Err(LoginError::MissingField("Username"));
        }
        if password.trim().is_empty() {
            return Err(LoginError::MissingField("Password"));
        }

        self.loading = true;
        let result = self.open_session(username, password).await;
        self.loading = false;

        match &result {
            Ok(user) => {
                tracing::info!(user_id = user.id, username = %user.username, "Logged in");
                self.set_user(Some(user.clone()));
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "Login failed");
                self.set_user(None);
            }
        }
        result
    }

    async fn open_session(&self, username: &str, password: &str) -> Result<User, LoginError> {
        match tokio::time::timeout(STALE_LOGOUT_TIMEOUT, self.api.logout()).await {
            Ok(Ok(())) => tracing::debug!("Cleared previous session"),
            Ok(Err(e)) => tracing::debug!(error = %e, "No previous session to clear"),
            Err(_) => tracing::debug!("Clearing previous session timed out"),
        }

        self.api.login(username, password).await?;
        self.api
            .current_user()
            .await?
            .ok_or(LoginError::UserUnavailable)
    }

    /// End the session. The local user is cleared even if the request fails.
    pub async fn logout(&self) {
        match self.api.logout().await {
            Ok(()) => tracing::info!("Logged out"),
            Err(e) => log_failure("Logout request failed", &e),
        }
        self.set_user(None);
    }
}

fn log_failure(what: &str, error: &ClientError) {
    tracing::warn!(error = %error, retryable = error.is_retryable(), "{what}");
}
