use crate::analysis::{FileUploadState, RunStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sequence number for ordering events
pub type EventSequence = u64;

/// All progress events emitted during an analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub sequence: EventSequence,
    pub timestamp: DateTime<Utc>,
    pub run_id: String,
    pub payload: AnalysisEventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisEventPayload {
    /// The run moved to a new stage of the pipeline
    StageChanged { stage: RunStage },

    /// A tracked file entered a new transfer phase
    /// Subscribers replace their copy of the state wholesale
    FileChanged { state: FileUploadState },

    /// A tracked file was withdrawn from progress tracking
    FileRemoved { file_id: String },

    /// A status check is being issued; `attempt` is 1-based
    PollTick { attempt: u32, max_attempts: u32 },
}

impl AnalysisEvent {
    pub fn payload_type(&self) -> &str {
        match &self.payload {
            AnalysisEventPayload::StageChanged { .. } => "stage_changed",
            AnalysisEventPayload::FileChanged { .. } => "file_changed",
            AnalysisEventPayload::FileRemoved { .. } => "file_removed",
            AnalysisEventPayload::PollTick { .. } => "poll_tick",
        }
    }
}
