//! Parallel file transfer with per-file progress tracking.
//!
//! All PUTs fan out at once and join on a wait-for-all barrier. The run
//! succeeds only if every transfer succeeds; storage objects of succeeded
//! siblings are abandoned when the barrier fails, never deleted.

use indexmap::IndexMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{info, warn};
use uuid::Uuid;

use super::backend::AnalysisBackend;
use super::types::{FileUploadState, InputFile, TransferPhase, UploadTarget};
use crate::error::{AnalysisError, TransferFailure};
use crate::events::{AnalysisEventPayload, ProgressBus};

/// One file ready to transfer: tracker entry plus its negotiated target.
#[derive(Debug, Clone)]
pub struct TransferItem {
    pub file_id: String,
    pub file: InputFile,
    pub target: UploadTarget,
}

/// Tracks every file's transfer state and publishes each transition.
///
/// Transitions for one file are published under the state lock, so
/// subscribers see them in order; across files there is no ordering.
/// A removed file keeps uploading on the wire, but its transitions stop
/// being tracked or published.
pub struct FileProgressTracker {
    states: Mutex<IndexMap<String, FileUploadState>>,
    bus: ProgressBus,
    run_id: Mutex<String>,
}

impl FileProgressTracker {
    pub fn new(bus: ProgressBus) -> Self {
        Self {
            states: Mutex::new(IndexMap::new()),
            bus,
            run_id: Mutex::new(String::new()),
        }
    }

    /// Clears tracked files and adopts the new run's id.
    pub fn begin_run(&self, run_id: &str) {
        if let Ok(mut states) = self.states.lock() {
            states.clear();
        }
        if let Ok(mut current) = self.run_id.lock() {
            *current = run_id.to_string();
        }
    }

    /// Starts tracking a file in `Pending`, returning its tracker id.
    pub fn register(&self, title: &str) -> String {
        let file_id = Uuid::new_v4().to_string();
        let state = FileUploadState {
            id: file_id.clone(),
            title: title.to_string(),
            phase: TransferPhase::Pending,
            progress: 0,
        };

        if let Ok(mut states) = self.states.lock() {
            states.insert(file_id.clone(), state.clone());
            self.publish_state(state);
        }
        file_id
    }

    pub fn mark_uploading(&self, file_id: &str) {
        self.transition(file_id, TransferPhase::Uploading, Some(10));
    }

    pub fn mark_success(&self, file_id: &str) {
        self.transition(file_id, TransferPhase::Success, Some(100));
    }

    pub fn mark_error(&self, file_id: &str) {
        self.transition(file_id, TransferPhase::Error, None);
    }

    /// Stops tracking a file. Returns false if it was never tracked or
    /// already removed. Does not abort an in-flight PUT.
    pub fn remove(&self, file_id: &str) -> bool {
        let Ok(mut states) = self.states.lock() else {
            return false;
        };
        if states.shift_remove(file_id).is_none() {
            return false;
        }

        let run_id = self.current_run_id();
        self.bus.publish(
            &run_id,
            AnalysisEventPayload::FileRemoved {
                file_id: file_id.to_string(),
            },
        );
        true
    }

    /// Current states in registration order.
    pub fn snapshot(&self) -> Vec<FileUploadState> {
        match self.states.lock() {
            Ok(states) => states.values().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    fn transition(&self, file_id: &str, phase: TransferPhase, progress: Option<u8>) {
        let Ok(mut states) = self.states.lock() else {
            return;
        };
        // Removed mid-flight: nothing left to report
        let Some(state) = states.get_mut(file_id) else {
            return;
        };

        state.phase = phase;
        if let Some(progress) = progress {
            state.progress = progress;
        }
        let snapshot = state.clone();
        self.publish_state(snapshot);
    }

    // Callers hold the states lock, which is what keeps one file's
    // events in order
    fn publish_state(&self, state: FileUploadState) {
        let run_id = self.current_run_id();
        self.bus
            .publish(&run_id, AnalysisEventPayload::FileChanged { state });
    }

    fn current_run_id(&self) -> String {
        match self.run_id.lock() {
            Ok(run_id) => run_id.clone(),
            Err(_) => String::new(),
        }
    }
}

struct FileOutcome {
    index: usize,
    result: Result<(), TransferFailure>,
    file_path: String,
}

/// Fans out every PUT concurrently and waits for all of them.
///
/// Returns the storage paths in input order when every transfer succeeds.
/// One failure fails the whole barrier; the error carries the per-file
/// failures plus the paths of siblings that made it to storage anyway.
pub async fn transfer_all(
    backend: Arc<dyn AnalysisBackend>,
    items: Vec<TransferItem>,
    tracker: Arc<FileProgressTracker>,
) -> Result<Vec<String>, AnalysisError> {
    let total = items.len();
    info!("📤 Transferring {} file(s) to storage", total);

    let mut join_set: JoinSet<FileOutcome> = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let backend = backend.clone();
        let tracker = tracker.clone();

        join_set.spawn(async move {
            tracker.mark_uploading(&item.file_id);
            let result = backend.put_file(&item.target, &item.file).await;
            match &result {
                Ok(()) => tracker.mark_success(&item.file_id),
                Err(failure) => {
                    warn!("⚠ Upload failed for {}: {}", failure.filename, failure.message);
                    tracker.mark_error(&item.file_id);
                }
            }
            FileOutcome {
                index,
                result,
                file_path: item.target.file_path,
            }
        });
    }

    // Wait-for-all barrier: every PUT finishes before we judge the batch
    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(join_err) => {
                warn!("⚠ Upload task did not complete: {}", join_err);
                outcomes.push(FileOutcome {
                    index: usize::MAX,
                    result: Err(TransferFailure {
                        filename: "upload task".to_string(),
                        message: join_err.to_string(),
                    }),
                    file_path: String::new(),
                });
            }
        }
    }
    outcomes.sort_by_key(|outcome| outcome.index);

    let mut failures = Vec::new();
    let mut uploaded_paths = Vec::new();
    for outcome in outcomes {
        match outcome.result {
            Ok(()) => uploaded_paths.push(outcome.file_path),
            Err(failure) => failures.push(failure),
        }
    }

    if failures.is_empty() {
        info!("✓ All {} file(s) uploaded", total);
        Ok(uploaded_paths)
    } else {
        Err(AnalysisError::Transfer {
            failures,
            abandoned_paths: uploaded_paths,
        })
    }
}
