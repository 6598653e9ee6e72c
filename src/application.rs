//! Opening a saved application for editing.
//!
//! Fetches `/applications/{id}/edit` (debounced, cancellable) and replays
//! its stored addresses into an [`AddressForm`].

use std::time::Duration;

use ebpls_client::{cancellable, AddressDirectory, ApplicationSource, CancellationToken, ClientError};
use ebpls_types::ApplicationEdit;
use thiserror::Error;

use crate::address::{AddressForm, MirrorFlags};
use crate::error::{AddressError, Alert};

/// Quiet period before an edit fetch goes out
pub const EDIT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Status code of a released (permit issued) application
pub const RELEASED_STATUS: i32 = 6;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("application request cancelled")]
    Cancelled,

    #[error("session expired")]
    SessionExpired,

    #[error("not allowed to edit this application")]
    Forbidden,

    #[error("application not found")]
    NotFound,

    /// Any other non-2xx answer; `message` is what the backend said
    #[error("application request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("failed to load application: {0}")]
    Fetch(#[source] ClientError),

    #[error(transparent)]
    Address(#[from] AddressError),
}

impl ApplicationError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::Address(e) => e.is_cancelled(),
            _ => false,
        }
    }

    pub fn alert(&self) -> Option<Alert> {
        let message = match self {
            Self::Cancelled => return None,
            Self::Address(e) => return e.alert(),
            Self::SessionExpired => "Session expired. Please log in again.".to_string(),
            Self::Forbidden => "You don't have permission to edit this application.".to_string(),
            Self::NotFound => "Application not found.".to_string(),
            Self::Rejected { message, .. } if !message.is_empty() => message.clone(),
            Self::Rejected { .. } | Self::Fetch(_) => "Failed to load application data".to_string(),
        };
        Some(Alert::new("Error", message))
    }
}

impl From<ClientError> for ApplicationError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Cancelled => Self::Cancelled,
            ClientError::Status { status: 401, .. } => Self::SessionExpired,
            ClientError::Status { status: 403, .. } => Self::Forbidden,
            ClientError::Status { status: 404, .. } => Self::NotFound,
            ClientError::Status {
                status, message, ..
            } => Self::Rejected { status, message },
            other => Self::Fetch(other),
        }
    }
}

/// Wait out [`EDIT_DEBOUNCE`], then fetch the application.
///
/// Cancelling `token` during the wait means the request is never sent.
pub async fn load_application_for_edit(
    source: &dyn ApplicationSource,
    application_id: &str,
    token: &CancellationToken,
) -> Result<ApplicationEdit, ApplicationError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => return Err(ApplicationError::Cancelled),
        _ = tokio::time::sleep(EDIT_DEBOUNCE) => {}
    }

    let application = cancellable(token, source.fetch_application_for_edit(application_id))
        .await
        .map_err(|e| {
            let e = ApplicationError::from(e);
            if !e.is_cancelled() {
                tracing::warn!(application_id, error = %e, "Application fetch failed");
            }
            e
        })?;

    tracing::info!(
        application_id,
        status = ?application.status,
        renewal = application.is_renewal_mode(),
        "Application loaded for edit"
    );
    Ok(application)
}

/// An application loaded into a form
#[derive(Debug, Clone)]
pub struct OpenedApplication {
    pub application: ApplicationEdit,
    pub mirror: MirrorFlags,
}

impl OpenedApplication {
    /// Released permits keep their addresses read-only, unless renewing
    pub fn is_released(&self) -> bool {
        !self.application.is_renewal_mode() && self.application.status == Some(RELEASED_STATUS)
    }
}

/// Fetch `application_id` and preload its addresses into `form`.
///
/// Supersedes any edit request the form already has in flight.
pub async fn open_for_edit(
    form: &mut AddressForm,
    directory: &dyn AddressDirectory,
    source: &dyn ApplicationSource,
    application_id: &str,
) -> Result<OpenedApplication, ApplicationError> {
    let token = form.begin_edit();
    let application = load_application_for_edit(source, application_id, &token).await?;

    let mirror = match &application.addresses {
        Some(addresses) => form.preload_application(directory, addresses, &token).await?,
        None => {
            tracing::debug!(application_id, "Application has no stored addresses");
            form.mirror_flags()
        }
    };

    Ok(OpenedApplication {
        application,
        mirror,
    })
}
