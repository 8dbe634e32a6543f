//! Core types for the upload-and-analyze pipeline.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Seconds between status checks while a job is generating.
pub const POLL_INTERVAL_SECS: u64 = 20;

/// Status checks issued before giving up on a generating job.
pub const MAX_POLL_ATTEMPTS: u32 = 45;

/// Title the backend reports while a job is still generating.
pub const PLACEHOLDER_TITLE: &str = "Processing...";

/// Content type sent for files that do not declare one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// One file handed to the orchestrator: name, bytes, declared MIME type.
///
/// The body is refcounted; cloning the file or handing its bytes to a
/// request shares one buffer instead of copying it.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(FALLBACK_CONTENT_TYPE)
    }
}

/// Pre-signed upload destination returned by the backend, one per filename.
///
/// Consumed exactly once; the signed URL is time-boxed and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadTarget {
    pub filename: String,
    pub upload_url: String,
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Transfer lifecycle of one tracked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Pending,
    Uploading,
    Success,
    Error,
}

/// Client-side progress record for one file's transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileUploadState {
    pub id: String,
    pub title: String,
    pub phase: TransferPhase,
    pub progress: u8,
}

/// Kind of analysis requested, carried on the wire as `chat_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobType {
    Analysis,
    Bias,
    Counterpoint,
    LandscapeAnalysis,
    Summary,
    FinancialAnalysis,
    LeadershipAnalysis,
    ProgramAnalysis,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Analysis => "ANALYSIS",
            JobType::Bias => "BIAS",
            JobType::Counterpoint => "COUNTERPOINT",
            JobType::LandscapeAnalysis => "LANDSCAPE_ANALYSIS",
            JobType::Summary => "SUMMARY",
            JobType::FinancialAnalysis => "FINANCIAL_ANALYSIS",
            JobType::LeadershipAnalysis => "LEADERSHIP_ANALYSIS",
            JobType::ProgramAnalysis => "PROGRAM_ANALYSIS",
        }
    }

    /// Dashboard route where results of this job type are shown.
    ///
    /// Exhaustive on purpose: adding a job type without a route is a
    /// compile error, not a silent fallback.
    pub fn dashboard_path(&self) -> &'static str {
        match self {
            JobType::Analysis => "/dashboard/analysis",
            JobType::Bias => "/dashboard/bias",
            JobType::Counterpoint => "/dashboard/counterpoint",
            JobType::LandscapeAnalysis => "/dashboard/landscape",
            JobType::Summary => "/dashboard/summary",
            JobType::FinancialAnalysis => "/dashboard/financial",
            JobType::LeadershipAnalysis => "/dashboard/leadership",
            JobType::ProgramAnalysis => "/dashboard/program",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of one orchestration run, reported over the progress bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Idle,
    Sanitizing,
    NegotiatingUploadUrls,
    Transferring,
    SubmittingJob,
    Polling,
    Completed,
    Failed,
    TimedOut,
}

impl RunStage {
    /// Terminal stages end the run; everything else means work remains.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStage::Completed | RunStage::Failed | RunStage::TimedOut
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Generating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub text: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Analysis record as the backend reports it.
///
/// Status endpoints return anything from `{ "title": ... }` up to the full
/// record, and older backend routes use camelCase keys, so every field
/// beyond `id` is defaulted and the camelCase spellings are accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "responseText")]
    pub response_text: String,
    #[serde(default, alias = "generationStatus")]
    pub generation_status: Option<GenerationStatus>,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl AnalysisRecord {
    /// Whether the backend is still working on this record.
    ///
    /// The placeholder title is the sentinel for "still running"; a body
    /// that omits `generation_status` but carries a real title is terminal.
    pub fn is_still_generating(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
            || matches!(self.generation_status, Some(GenerationStatus::Generating))
    }
}

/// Caller-supplied knobs for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub message: Option<String>,
    pub job_type: JobType,
    pub parent_analysis_id: Option<String>,
}

impl AnalysisOptions {
    pub fn new(job_type: JobType) -> Self {
        Self {
            message: None,
            job_type,
            parent_analysis_id: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_parent(mut self, parent_analysis_id: impl Into<String>) -> Self {
        self.parent_analysis_id = Some(parent_analysis_id.into());
        self
    }
}
