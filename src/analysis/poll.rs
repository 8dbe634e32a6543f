//! Bounded status polling for accepted jobs.

use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{AnalysisBackend, StatusOutcome};
use super::types::{AnalysisRecord, MAX_POLL_ATTEMPTS, POLL_INTERVAL_SECS};
use crate::error::AnalysisError;
use crate::events::{AnalysisEventPayload, ProgressBus};
use crate::token::SessionToken;

/// Delay schedule between status checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every attempt.
    Fixed { interval: Duration },
    /// Doubles from `initial` up to `max`.
    Exponential { initial: Duration, max: Duration },
}

impl Backoff {
    /// Delay before the given 1-based attempt.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::Fixed { interval } => *interval,
            Backoff::Exponential { initial, max } => {
                let doublings = attempt.saturating_sub(1).min(31);
                initial.saturating_mul(1u32 << doublings).min(*max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed {
            interval: Duration::from_secs(POLL_INTERVAL_SECS),
        }
    }
}

/// Poll budget and schedule for one run.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: MAX_POLL_ATTEMPTS,
            backoff: Backoff::default(),
        }
    }
}

/// Polls the status endpoints until the job leaves its generating state.
///
/// Each attempt waits out the backoff delay first, so `max_attempts` bounds
/// the number of status requests exactly. A 404 from the submissions
/// endpoint falls through to the analyze endpoint before the attempt is
/// judged. Transient errors consume the attempt and the loop keeps waiting;
/// an authentication failure aborts immediately.
pub async fn poll_until_complete(
    backend: &dyn AnalysisBackend,
    token: &SessionToken,
    job_id: &str,
    config: &PollConfig,
    bus: &ProgressBus,
    run_id: &str,
) -> Result<AnalysisRecord, AnalysisError> {
    for attempt in 1..=config.max_attempts {
        tokio::time::sleep(config.backoff.delay(attempt)).await;

        bus.publish(
            run_id,
            AnalysisEventPayload::PollTick {
                attempt,
                max_attempts: config.max_attempts,
            },
        );
        debug!(job_id, attempt, "checking analysis status");

        let outcome = match backend.fetch_submission(token, job_id).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_auth() => return Err(e),
            Err(e) => {
                warn!(job_id, attempt, "status check failed: {}", e);
                continue;
            }
        };

        let record = match outcome {
            StatusOutcome::Found(record) => Some(record),
            StatusOutcome::NotFound => {
                debug!(job_id, attempt, "submission not found, trying analyze endpoint");
                match backend.fetch_analysis(token, job_id).await {
                    Ok(StatusOutcome::Found(record)) => Some(record),
                    Ok(StatusOutcome::NotFound) => None,
                    Err(e) if e.is_auth() => return Err(e),
                    Err(e) => {
                        warn!(job_id, attempt, "fallback status check failed: {}", e);
                        None
                    }
                }
            }
        };

        if let Some(record) = record {
            if !record.is_still_generating() {
                info!(job_id, attempt, "analysis completed: {}", record.title);
                return Ok(record);
            }
        }
    }

    Err(AnalysisError::PollTimeout {
        attempts: config.max_attempts,
    })
}
