//! reqwest transport for the backend seam.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;
use url::Url;

use super::backend::{
    error_message, AnalysisBackend, CreateAccepted, CreateAnalysisRequest, CreateOutcome,
    StatusOutcome, UploadUrlRequest, UploadUrlResponse,
};
use super::types::{AnalysisRecord, InputFile, UploadTarget};
use crate::error::{AnalysisError, TransferFailure};
use crate::token::SessionToken;

/// Talks to the analysis backend over HTTP.
///
/// No timeout overrides here; outside the poll budget the underlying
/// client's defaults apply.
#[derive(Debug, Clone)]
pub struct HttpAnalysisBackend {
    client: reqwest::Client,
    base: String,
}

impl HttpAnalysisBackend {
    pub fn new(base_url: &str) -> Result<Self, AnalysisError> {
        Self::with_client(base_url, reqwest::Client::new())
    }

    pub fn with_client(base_url: &str, client: reqwest::Client) -> Result<Self, AnalysisError> {
        Url::parse(base_url).map_err(|e| {
            AnalysisError::Config(format!("Invalid backend URL '{}': {}", base_url, e))
        })?;

        Ok(Self {
            client,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn bearer(token: &SessionToken) -> String {
        format!("Bearer {}", token.expose())
    }
}

#[async_trait]
impl AnalysisBackend for HttpAnalysisBackend {
    async fn generate_upload_urls(
        &self,
        token: &SessionToken,
        request: &UploadUrlRequest,
    ) -> Result<Vec<UploadTarget>, AnalysisError> {
        let url = format!("{}/documents/upload-urls", self.base);
        debug!(count = request.filenames.len(), "requesting upload urls");

        let response = self
            .client
            .post(&url)
            .header("Authorization", Self::bearer(token))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AnalysisError::Auth(
                "session rejected by backend".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::UploadUrl(error_message(status, &body)));
        }

        let parsed: UploadUrlResponse = response.json().await?;
        Ok(parsed.document_uploads)
    }

    async fn put_file(
        &self,
        target: &UploadTarget,
        file: &InputFile,
    ) -> Result<(), TransferFailure> {
        // The pre-signed URL is the whole capability; no session header
        let response = self
            .client
            .put(&target.upload_url)
            .header("Content-Type", file.content_type_or_default())
            // Body clone is a refcount bump, not a copy of the file
            .body(file.bytes.clone())
            .send()
            .await
            .map_err(|e| TransferFailure {
                filename: target.filename.clone(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransferFailure {
                filename: target.filename.clone(),
                message: error_message(status, &body),
            });
        }

        Ok(())
    }

    async fn create_analysis(
        &self,
        token: &SessionToken,
        request: &CreateAnalysisRequest,
    ) -> Result<CreateOutcome, AnalysisError> {
        let url = format!("{}/analyze", self.base);
        debug!(chat_type = %request.chat_type, "submitting analysis job");

        let response = self
            .client
            .post(&url)
            .header("Authorization", Self::bearer(token))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AnalysisError::Auth(
                "session rejected by backend".to_string(),
            ));
        }
        if status == StatusCode::ACCEPTED {
            let accepted: CreateAccepted = response.json().await?;
            return Ok(CreateOutcome::Accepted {
                id: accepted.id,
                task_id: accepted.task_id,
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisError::JobSubmission(error_message(status, &body)));
        }

        let record: AnalysisRecord = response.json().await?;
        Ok(CreateOutcome::Completed(record))
    }

    async fn fetch_submission(
        &self,
        token: &SessionToken,
        id: &str,
    ) -> Result<StatusOutcome, AnalysisError> {
        let url = format!("{}/submissions/{}", self.base, id);

        let response = self
            .client
            .get(&url)
            .header("Authorization", Self::bearer(token))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(AnalysisError::Auth(
                "session expired during polling".to_string(),
            )),
            StatusCode::NOT_FOUND => Ok(StatusOutcome::NotFound),
            _ => {
                let record: AnalysisRecord = response.error_for_status()?.json().await?;
                Ok(StatusOutcome::Found(record))
            }
        }
    }

    async fn fetch_analysis(
        &self,
        token: &SessionToken,
        id: &str,
    ) -> Result<StatusOutcome, AnalysisError> {
        let url = format!("{}/analyze", self.base);

        let response = self
            .client
            .get(&url)
            .query(&[("id", id)])
            .header("Authorization", Self::bearer(token))
            .send()
            .await?;

        match response.status() {
            StatusCode::UNAUTHORIZED => Err(AnalysisError::Auth(
                "session expired during polling".to_string(),
            )),
            StatusCode::NOT_FOUND => Ok(StatusOutcome::NotFound),
            _ => {
                let record: AnalysisRecord = response.error_for_status()?.json().await?;
                Ok(StatusOutcome::Found(record))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_validated_and_trimmed() {
        let backend = HttpAnalysisBackend::new("https://api.complere.example/").unwrap();
        assert_eq!(backend.base_url(), "https://api.complere.example");

        let err = HttpAnalysisBackend::new("not a url").unwrap_err();
        assert!(matches!(err, AnalysisError::Config(_)));
    }
}
