//! Error types for the import flow.

use thiserror::Error;

/// Errors raised while selecting, uploading or committing assets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    /// User-fixable input problem. Never retried, never hits the network.
    #[error("{0}")]
    Validation(String),

    /// Network or chunk failure that the retry policy may absorb.
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A transient failure that kept happening until the retry cap.
    #[error("{message}")]
    RetriesExhausted { message: String, last_error: String },

    /// The server would not open an upload session. Never retried.
    #[error("Failed to initialize upload. Try again later.")]
    InitFailed { last_error: String },

    /// Structured 400 from the commit endpoint. Shown verbatim.
    #[error("{0}")]
    ServerRejection(String),

    /// The server answered with something we could not interpret.
    #[error("Unexpected server response: {0}")]
    UnexpectedResponse(String),

    /// The session was cancelled before it finished.
    #[error("Upload cancelled")]
    Cancelled,

    /// Local I/O error while reading an asset.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl UploadError {
    pub fn validation(message: impl Into<String>) -> Self {
        UploadError::Validation(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        UploadError::Transport {
            message: message.into(),
        }
    }

    /// Whether the retry policy should get another shot at this error.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::Transport { .. } => true,
            // Reading the chunk can fail transiently too (network mounts).
            UploadError::Io { .. } => true,
            UploadError::Validation(_)
            | UploadError::RetriesExhausted { .. }
            | UploadError::InitFailed { .. }
            | UploadError::ServerRejection(_)
            | UploadError::UnexpectedResponse(_)
            | UploadError::Cancelled
            | UploadError::Config(_) => false,
        }
    }

    /// Message suitable for showing inline next to the upload controls.
    pub fn user_message(&self) -> String {
        match self {
            UploadError::UnexpectedResponse(_) => {
                "The server returned an unexpected response. Try again later.".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UploadError::UnexpectedResponse(err.to_string())
        } else {
            UploadError::transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, UploadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(UploadError::transport("reset by peer").is_retryable());
        assert!(!UploadError::validation("missing name").is_retryable());
        assert!(!UploadError::ServerRejection("bad".into()).is_retryable());
        assert!(!UploadError::UnexpectedResponse("html".into()).is_retryable());
        assert!(!UploadError::Cancelled.is_retryable());
    }

    #[test]
    fn test_init_failure_is_fatal_with_plain_message() {
        let err = UploadError::InitFailed {
            last_error: "Transport error: refused".into(),
        };
        assert!(!err.is_retryable());
        assert_eq!(
            err.user_message(),
            "Failed to initialize upload. Try again later."
        );
    }

    #[test]
    fn test_server_rejection_is_verbatim() {
        let err = UploadError::ServerRejection("Name field is required".into());
        assert_eq!(err.user_message(), "Name field is required");
    }

    #[test]
    fn test_unexpected_response_hides_details() {
        let err = UploadError::UnexpectedResponse("<html>502</html>".into());
        assert!(!err.user_message().contains("<html>"));
    }
}
