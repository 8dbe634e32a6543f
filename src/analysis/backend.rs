//! Backend seam for the analysis pipeline.
//!
//! The orchestrator talks to the outside world only through
//! [`AnalysisBackend`], so tests can swap in a fake and count calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::types::{AnalysisRecord, InputFile, JobType, UploadTarget};
use crate::error::{AnalysisError, TransferFailure};
use crate::token::SessionToken;

/// Body for the upload-URL negotiation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlRequest {
    pub filenames: Vec<String>,
    pub chat_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_analysis_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadUrlResponse {
    pub document_uploads: Vec<UploadTarget>,
}

/// Body for the job-creation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub chat_type: JobType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_analysis_id: Option<String>,
}

/// 202 body from the job-creation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAccepted {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// What the job-creation call produced.
#[derive(Debug, Clone)]
pub enum CreateOutcome {
    /// Synchronous 2xx with the finished record in the body.
    Completed(AnalysisRecord),
    /// 202: the job runs async and must be polled by id.
    Accepted { id: String, task_id: Option<String> },
}

/// One status check against the backend.
#[derive(Debug, Clone)]
pub enum StatusOutcome {
    Found(AnalysisRecord),
    /// Primary endpoint 404; caller decides whether to try the fallback.
    NotFound,
}

/// Everything the orchestrator needs from the outside world.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Negotiates one pre-signed upload destination per filename.
    async fn generate_upload_urls(
        &self,
        token: &SessionToken,
        request: &UploadUrlRequest,
    ) -> Result<Vec<UploadTarget>, AnalysisError>;

    /// PUTs raw bytes to a pre-signed URL. The URL itself is the
    /// capability; no session token is attached.
    async fn put_file(
        &self,
        target: &UploadTarget,
        file: &InputFile,
    ) -> Result<(), TransferFailure>;

    /// Submits the job-creation request.
    async fn create_analysis(
        &self,
        token: &SessionToken,
        request: &CreateAnalysisRequest,
    ) -> Result<CreateOutcome, AnalysisError>;

    /// Checks job status on the primary submissions endpoint.
    async fn fetch_submission(
        &self,
        token: &SessionToken,
        id: &str,
    ) -> Result<StatusOutcome, AnalysisError>;

    /// Checks job status on the fallback analyze endpoint.
    async fn fetch_analysis(
        &self,
        token: &SessionToken,
        id: &str,
    ) -> Result<StatusOutcome, AnalysisError>;
}

/// Pulls a human-readable message out of a backend error body.
///
/// Bodies are usually JSON with one of a few conventional keys; anything
/// else is passed through as raw text.
pub fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["error", "message", "detail"] {
            if let Some(text) = value.get(key).and_then(|v| v.as_str()) {
                return text.to_string();
            }
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_error_message_prefers_json_keys() {
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"error": "bad filenames"}"#),
            "bad filenames"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"message": "quota exceeded"}"#),
            "quota exceeded"
        );
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"detail": "unknown job type"}"#),
            "unknown job type"
        );
    }

    #[test]
    fn test_error_message_falls_back_to_text() {
        assert_eq!(
            error_message(StatusCode::BAD_GATEWAY, "upstream unavailable"),
            "upstream unavailable"
        );
        // JSON without a conventional key still surfaces the raw body
        assert_eq!(
            error_message(StatusCode::BAD_REQUEST, r#"{"code": 17}"#),
            r#"{"code": 17}"#
        );
        assert_eq!(
            error_message(StatusCode::INTERNAL_SERVER_ERROR, "  "),
            "HTTP 500 Internal Server Error"
        );
    }

    #[test]
    fn test_create_request_omits_absent_fields() {
        let request = CreateAnalysisRequest {
            document_paths: None,
            message: Some("what changed?".to_string()),
            chat_type: JobType::Summary,
            parent_analysis_id: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("document_paths").is_none());
        assert!(json.get("parent_analysis_id").is_none());
        assert_eq!(json["chat_type"], "SUMMARY");
    }
}
