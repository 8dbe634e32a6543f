use thiserror::Error;

/// One file that failed its direct-to-storage PUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    /// Sanitized filename the upload target was issued for.
    pub filename: String,
    /// Storage or transport message, backend text where available.
    pub message: String,
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.filename, self.message)
    }
}

/// Complere upload-and-analyze client errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Caller input insufficient (no files and no message); surfaced before
    /// any network call is made
    #[error("Validation error: {0}")]
    Validation(String),

    /// No session token available, or the backend answered 401 mid-flow
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Upload-URL negotiation rejected or returned an incomplete target list
    #[error("Upload URL error: {0}")]
    UploadUrl(String),

    /// One or more storage PUTs failed; the whole run is aborted.
    /// `abandoned_paths` lists sibling files that had already uploaded;
    /// pre-signed URLs carry no delete capability, so those objects stay
    /// behind in storage.
    #[error("Transfer error: {} upload(s) failed", .failures.len())]
    Transfer {
        failures: Vec<TransferFailure>,
        abandoned_paths: Vec<String>,
    },

    /// Analysis Job Service rejected the create call
    #[error("Job submission error: {0}")]
    JobSubmission(String),

    /// Poll budget exhausted while the job stayed in the generating state;
    /// the job may still complete asynchronously on the backend
    #[error("Analysis still processing after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    /// A second run was requested while one is already in flight
    #[error("Analysis request already in progress")]
    InFlight,

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AnalysisError {
    /// True for failures that require the user to sign in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, AnalysisError::Auth(_))
    }

    /// True when the job might still finish on the backend even though the
    /// client gave up waiting. Callers should word this as "still
    /// processing" rather than as a hard failure.
    pub fn may_still_complete(&self) -> bool {
        matches!(self, AnalysisError::PollTimeout { .. })
    }
}

/// Convert AnalysisError to String for host-app command handlers that can
/// only surface string errors to the frontend
impl From<AnalysisError> for String {
    fn from(err: AnalysisError) -> String {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::Validation("no documents and no message".to_string());
        assert_eq!(
            err.to_string(),
            "Validation error: no documents and no message"
        );
    }

    #[test]
    fn test_transfer_display_counts_failures() {
        let err = AnalysisError::Transfer {
            failures: vec![
                TransferFailure {
                    filename: "a.pdf".to_string(),
                    message: "status 500".to_string(),
                },
                TransferFailure {
                    filename: "b.pdf".to_string(),
                    message: "status 503".to_string(),
                },
            ],
            abandoned_paths: vec!["uploads/c.pdf".to_string()],
        };
        assert_eq!(err.to_string(), "Transfer error: 2 upload(s) failed");
    }

    #[test]
    fn test_poll_timeout_is_soft() {
        let err = AnalysisError::PollTimeout { attempts: 45 };
        assert!(err.may_still_complete());
        assert!(!err.is_auth());

        let err = AnalysisError::Auth("session expired".to_string());
        assert!(err.is_auth());
        assert!(!err.may_still_complete());
    }

    #[test]
    fn test_error_conversion_to_string() {
        let err = AnalysisError::Config("missing server URL".to_string());
        let s: String = err.into();
        assert_eq!(s, "Configuration error: missing server URL");
    }
}
