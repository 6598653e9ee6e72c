//! Error handling for the address cascade
//!
//! Every failure the cascade can produce is an [`AddressError`]. Nothing
//! here is meant to escape to the top of the app: callers turn errors into
//! an [`Alert`] with [`AddressError::alert`], which is `None` for
//! cancellations so superseded work stays silent.

use std::fmt;

use ebpls_client::ClientError;
use serde::Serialize;
use thiserror::Error;

use crate::address::{AddressGroup, AddressLevel};

/// A user-visible message box
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

#[derive(Debug, Error)]
pub enum AddressError {
    /// Superseded by a newer change, or the screen went away
    #[error("address request cancelled")]
    Cancelled,

    #[error("{source_group} address must be complete before copying it to the {target} address")]
    IncompleteSource {
        source_group: AddressGroup,
        target: AddressGroup,
    },

    #[error("failed to load {level} data for the {group} address: {source}")]
    DirectoryFetch {
        group: AddressGroup,
        level: AddressLevel,
        #[source]
        source: ClientError,
    },

    #[error("no {level} record {id} found while loading the {group} address")]
    PreloadLookup {
        group: AddressGroup,
        level: AddressLevel,
        id: i64,
    },

    #[error("{level} {id} is not an option for the {group} address")]
    UnknownOption {
        group: AddressGroup,
        level: AddressLevel,
        id: i64,
    },

    #[error("the {group} address is mirrored and cannot be edited")]
    MirrorLocked { group: AddressGroup },

    #[error("failed to load address data: {0}")]
    InitialLoad(#[source] ClientError),
}

impl AddressError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Wrap a directory failure, keeping cancellation distinct
    pub(crate) fn from_client(group: AddressGroup, level: AddressLevel, err: ClientError) -> Self {
        if err.is_cancelled() {
            Self::Cancelled
        } else {
            Self::DirectoryFetch {
                group,
                level,
                source: err,
            }
        }
    }

    /// The prompt to show for this error; `None` means stay silent
    pub fn alert(&self) -> Option<Alert> {
        let alert = match self {
            Self::Cancelled => return None,
            Self::IncompleteSource {
                source_group,
                target: _,
            } => Alert::new(
                "Incomplete Address",
                format!(
                    "Please complete the {title} first before using 'Same as {title}'",
                    title = source_group.title()
                ),
            ),
            Self::DirectoryFetch {
                group,
                level,
                source,
            } => Alert::new(
                "Error",
                format!(
                    "Failed to load {} for {} address: {}",
                    level.plural(),
                    group,
                    source.user_message()
                ),
            ),
            Self::PreloadLookup { group, level, id } => Alert::new(
                "Address Load Error",
                format!("Failed to load address information: no {level} with id {id} ({group} address)"),
            ),
            Self::UnknownOption { group, level, id } => Alert::new(
                "Error",
                format!("Selected {level} ({id}) is not available for {group} address"),
            ),
            Self::MirrorLocked { group } => Alert::new(
                "Address Locked",
                format!(
                    "The {} is copied from another address. Uncheck 'Same as' to edit it.",
                    group.title()
                ),
            ),
            Self::InitialLoad(_) => {
                Alert::new("Error", "Failed to load address data. Please try again.")
            }
        };
        Some(alert)
    }
}
