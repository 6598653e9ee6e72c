use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request cancelled")]
    Cancelled,

    #[error("request to {path} timed out")]
    Timeout { path: String },

    #[error("{path} returned HTTP {status}: {message}")]
    Status {
        path: String,
        status: u16,
        message: String,
    },

    #[error("transport error on {path}: {source}")]
    Transport {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),
}

impl ClientError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Timeouts, transport failures and 5xx responses may succeed on retry.
    /// Nothing here retries automatically; the caller decides.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Transport { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// HTTP status, when the backend answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Backend-supplied message for status errors, else the display text
    pub fn user_message(&self) -> String {
        match self {
            Self::Status { message, .. } if !message.is_empty() => message.clone(),
            Self::Timeout { .. } => "The server took too long to respond".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> ClientError {
        ClientError::Status {
            path: "/regions".into(),
            status: code,
            message: String::new(),
        }
    }

    #[test]
    fn retryable_classification() {
        assert!(ClientError::Timeout {
            path: "/regions".into()
        }
        .is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!ClientError::Cancelled.is_retryable());
    }

    #[test]
    fn user_message_prefers_backend_text() {
        let err = ClientError::Status {
            path: "/applications/9/edit".into(),
            status: 422,
            message: "Application is locked".into(),
        };
        assert_eq!(err.user_message(), "Application is locked");
        assert_eq!(status(500).user_message(), "/regions returned HTTP 500: ");
    }
}
