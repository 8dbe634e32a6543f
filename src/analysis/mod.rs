//! Upload-analyze orchestration.
//!
//! One entry point, [`AnalysisOrchestrator::run_analysis`]: sanitize
//! filenames, negotiate pre-signed upload destinations, transfer all files
//! in parallel, submit the job, then poll until the backend finishes.
//! Stages run strictly in order and any stage failure aborts the rest.

// Module declarations
mod backend;
mod http;
mod poll;
mod sanitize;
mod transfer;
mod types;

// Re-export the public surface of the submodules
pub use backend::{
    error_message, AnalysisBackend, CreateAccepted, CreateAnalysisRequest, CreateOutcome,
    StatusOutcome, UploadUrlRequest, UploadUrlResponse,
};
pub use http::HttpAnalysisBackend;
pub use poll::{poll_until_complete, Backoff, PollConfig};
pub use sanitize::sanitize_filename;
pub use transfer::{transfer_all, FileProgressTracker, TransferItem};
pub use types::*;

use indexmap::IndexMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::ComplereConfig;
use crate::error::AnalysisError;
use crate::events::{AnalysisEventPayload, EventReceiver, ProgressBus};
use crate::token::TokenProvider;

/// Drives one analysis request end to end.
///
/// The backend and the session source are injected at construction. One
/// instance serves one caller: overlapping `run_analysis` calls are
/// rejected, not queued.
pub struct AnalysisOrchestrator {
    backend: Arc<dyn AnalysisBackend>,
    tokens: Arc<dyn TokenProvider>,
    bus: ProgressBus,
    poll: PollConfig,
    in_flight: Arc<AtomicBool>,
    tracker: Arc<FileProgressTracker>,
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("backend", &"<backend>")
            .field("tokens", &"<token provider>")
            .field("bus", &self.bus)
            .field("poll", &self.poll)
            .field("in_flight", &self.in_flight)
            .finish()
    }
}

impl AnalysisOrchestrator {
    pub fn new(backend: Arc<dyn AnalysisBackend>, tokens: Arc<dyn TokenProvider>) -> Self {
        let bus = ProgressBus::default();
        let tracker = Arc::new(FileProgressTracker::new(bus.clone()));
        Self {
            backend,
            tokens,
            bus,
            poll: PollConfig::default(),
            in_flight: Arc::new(AtomicBool::new(false)),
            tracker,
        }
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Builds an orchestrator over HTTP from the saved host configuration.
    pub fn from_config(config: &ComplereConfig) -> Result<Self, AnalysisError> {
        let server_url = config
            .server_url
            .as_deref()
            .ok_or_else(|| AnalysisError::Config("serverUrl is not set".to_string()))?;
        let backend = HttpAnalysisBackend::new(server_url)?;
        Ok(Self::new(Arc::new(backend), Arc::new(config.clone())))
    }

    /// Streams progress events for every run on this orchestrator.
    pub fn subscribe(&self) -> EventReceiver {
        self.bus.subscribe()
    }

    /// Per-file transfer states of the current run, in registration order.
    pub fn progress_snapshot(&self) -> Vec<FileUploadState> {
        self.tracker.snapshot()
    }

    /// Stops tracking one file client-side. The in-flight PUT, if any,
    /// keeps running and still counts toward the all-or-nothing barrier.
    pub fn cancel_upload(&self, file_id: &str) -> bool {
        self.tracker.remove(file_id)
    }

    /// Runs the whole pipeline for one set of files and/or a message.
    ///
    /// Storage writes and job creation are irreversible; nothing is rolled
    /// back on failure. See [`AnalysisError`] for the failure taxonomy.
    pub async fn run_analysis(
        &self,
        files: Vec<InputFile>,
        options: AnalysisOptions,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;

        let run_id = Uuid::new_v4().to_string();
        self.tracker.begin_run(&run_id);

        let result = self.drive(&run_id, files, options).await;

        let final_stage = match &result {
            Ok(_) => RunStage::Completed,
            Err(e) if e.may_still_complete() => RunStage::TimedOut,
            Err(_) => RunStage::Failed,
        };
        self.publish_stage(&run_id, final_stage);

        match &result {
            Ok(record) => info!("✓ Analysis {} completed", record.id),
            Err(e) if e.may_still_complete() => warn!("⚠ {}", e),
            Err(e) => error!("Analysis run {} failed: {}", run_id, e),
        }

        result
    }

    async fn drive(
        &self,
        run_id: &str,
        files: Vec<InputFile>,
        options: AnalysisOptions,
    ) -> Result<AnalysisRecord, AnalysisError> {
        let message = options
            .message
            .clone()
            .filter(|m| !m.trim().is_empty());
        if files.is_empty() && message.is_none() {
            return Err(AnalysisError::Validation(
                "Provide at least one document or a message".to_string(),
            ));
        }

        let token = self
            .tokens
            .session_token()
            .ok_or_else(|| AnalysisError::Auth("No active session".to_string()))?;

        info!("⚡ Starting {} run {}", options.job_type, run_id);

        self.publish_stage(run_id, RunStage::Sanitizing);
        let mut prepared = Vec::with_capacity(files.len());
        for file in files {
            let sanitized = sanitize_filename(&file.name);
            let file_id = self.tracker.register(&file.name);
            prepared.push(PreparedFile {
                file_id,
                sanitized,
                file,
            });
        }

        let document_paths = if prepared.is_empty() {
            None
        } else {
            self.publish_stage(run_id, RunStage::NegotiatingUploadUrls);
            let request = UploadUrlRequest {
                filenames: prepared.iter().map(|p| p.sanitized.clone()).collect(),
                chat_type: options.job_type,
                parent_analysis_id: options.parent_analysis_id.clone(),
            };
            let targets = self.backend.generate_upload_urls(&token, &request).await?;
            let items = correlate_targets(prepared, targets)?;

            self.publish_stage(run_id, RunStage::Transferring);
            let paths = transfer_all(self.backend.clone(), items, self.tracker.clone()).await?;
            Some(paths)
        };

        self.publish_stage(run_id, RunStage::SubmittingJob);
        let create = CreateAnalysisRequest {
            document_paths,
            message,
            chat_type: options.job_type,
            parent_analysis_id: options.parent_analysis_id,
        };

        match self.backend.create_analysis(&token, &create).await? {
            CreateOutcome::Completed(record) => Ok(record),
            CreateOutcome::Accepted { id, task_id } => {
                info!(job_id = %id, ?task_id, "job accepted, polling for completion");
                self.publish_stage(run_id, RunStage::Polling);
                poll_until_complete(
                    self.backend.as_ref(),
                    &token,
                    &id,
                    &self.poll,
                    &self.bus,
                    run_id,
                )
                .await
            }
        }
    }

    fn publish_stage(&self, run_id: &str, stage: RunStage) {
        debug!(run_id, ?stage, "stage change");
        self.bus
            .publish(run_id, AnalysisEventPayload::StageChanged { stage });
    }
}

struct PreparedFile {
    file_id: String,
    sanitized: String,
    file: InputFile,
}

/// Matches each prepared file to a negotiated target by sanitized filename.
///
/// The backend does not guarantee response order, and duplicate sanitized
/// names are legal, so targets queue up per name and each file consumes one.
/// A short list or a missing name aborts before any byte is transferred.
fn correlate_targets(
    prepared: Vec<PreparedFile>,
    targets: Vec<UploadTarget>,
) -> Result<Vec<TransferItem>, AnalysisError> {
    if targets.len() != prepared.len() {
        return Err(AnalysisError::UploadUrl(format!(
            "Expected {} upload destination(s), backend returned {}",
            prepared.len(),
            targets.len()
        )));
    }

    let mut by_name: IndexMap<String, Vec<UploadTarget>> = IndexMap::new();
    for target in targets {
        by_name
            .entry(target.filename.clone())
            .or_default()
            .push(target);
    }

    let mut items = Vec::with_capacity(prepared.len());
    for prepared_file in prepared {
        let target = match by_name.get_mut(&prepared_file.sanitized) {
            Some(bucket) if !bucket.is_empty() => bucket.remove(0),
            _ => {
                return Err(AnalysisError::UploadUrl(format!(
                    "No upload destination for '{}'",
                    prepared_file.sanitized
                )));
            }
        };
        items.push(TransferItem {
            file_id: prepared_file.file_id,
            file: prepared_file.file,
            target,
        });
    }

    Ok(items)
}

/// Releases the in-flight flag on every exit path, including panics.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, AnalysisError> {
        if flag
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(AnalysisError::InFlight);
        }
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared(file_id: &str, sanitized: &str) -> PreparedFile {
        PreparedFile {
            file_id: file_id.to_string(),
            sanitized: sanitized.to_string(),
            file: InputFile::new(sanitized, vec![0u8]),
        }
    }

    fn target(filename: &str, path: &str) -> UploadTarget {
        UploadTarget {
            filename: filename.to_string(),
            upload_url: format!("https://storage.example/{}", path),
            file_path: path.to_string(),
            token: None,
        }
    }

    #[test]
    fn test_correlation_ignores_response_order() {
        let items = correlate_targets(
            vec![prepared("f1", "a.pdf"), prepared("f2", "b.pdf")],
            vec![target("b.pdf", "docs/b"), target("a.pdf", "docs/a")],
        )
        .unwrap();

        assert_eq!(items[0].file_id, "f1");
        assert_eq!(items[0].target.file_path, "docs/a");
        assert_eq!(items[1].target.file_path, "docs/b");
    }

    #[test]
    fn test_correlation_rejects_short_list() {
        let err = correlate_targets(
            vec![prepared("f1", "a.pdf"), prepared("f2", "b.pdf")],
            vec![target("a.pdf", "docs/a")],
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::UploadUrl(_)));
    }

    #[test]
    fn test_correlation_rejects_missing_filename() {
        let err = correlate_targets(
            vec![prepared("f1", "a.pdf")],
            vec![target("other.pdf", "docs/other")],
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::UploadUrl(_)));
    }

    #[test]
    fn test_correlation_handles_duplicate_names_in_order() {
        let items = correlate_targets(
            vec![prepared("f1", "scan.pdf"), prepared("f2", "scan.pdf")],
            vec![target("scan.pdf", "docs/scan-1"), target("scan.pdf", "docs/scan-2")],
        )
        .unwrap();

        assert_eq!(items[0].target.file_path, "docs/scan-1");
        assert_eq!(items[1].target.file_path, "docs/scan-2");
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let flag = Arc::new(AtomicBool::new(false));

        let guard = InFlightGuard::acquire(&flag).unwrap();
        assert!(matches!(
            InFlightGuard::acquire(&flag),
            Err(AnalysisError::InFlight)
        ));

        drop(guard);
        assert!(InFlightGuard::acquire(&flag).is_ok());
    }
}
