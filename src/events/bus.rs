use super::types::{AnalysisEvent, AnalysisEventPayload, EventSequence};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

pub type EventReceiver = broadcast::Receiver<AnalysisEvent>;
pub type EventSender = broadcast::Sender<AnalysisEvent>;

/// Event bus for distributing analysis progress events
#[derive(Clone, Debug)]
pub struct ProgressBus {
    sender: EventSender,
    sequence: Arc<AtomicU64>,
}

impl ProgressBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Publish an event (returns sequence number)
    ///
    /// A run must keep going whether or not anyone is listening, so a send
    /// with zero receivers is not an error here.
    pub fn publish(&self, run_id: &str, payload: AnalysisEventPayload) -> EventSequence {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);

        let event = AnalysisEvent {
            sequence,
            timestamp: Utc::now(),
            run_id: run_id.to_string(),
            payload,
        };

        let _ = self.sender.send(event);
        sequence
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Get current sequence number
    pub fn current_sequence(&self) -> EventSequence {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Get number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::RunStage;

    #[tokio::test]
    async fn test_bus_publish_subscribe() {
        let bus = ProgressBus::new(100);
        let mut rx = bus.subscribe();

        let payload = AnalysisEventPayload::StageChanged {
            stage: RunStage::Transferring,
        };

        let seq = bus.publish("run-1", payload.clone());
        assert_eq!(seq, 1);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.sequence, 1);
        assert_eq!(event.run_id, "run-1");
        assert_eq!(event.payload_type(), "stage_changed");
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = ProgressBus::new(100);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        let payload = AnalysisEventPayload::PollTick {
            attempt: 3,
            max_attempts: 45,
        };

        bus.publish("run-2", payload);

        let event1 = rx1.recv().await.unwrap();
        let event2 = rx2.recv().await.unwrap();

        assert_eq!(event1.sequence, event2.sequence);
        assert_eq!(event1.run_id, "run-2");
        assert_eq!(event2.run_id, "run-2");
    }

    #[test]
    fn test_publish_without_subscribers_still_sequences() {
        let bus = ProgressBus::new(100);

        let seq1 = bus.publish(
            "run-3",
            AnalysisEventPayload::StageChanged {
                stage: RunStage::Sanitizing,
            },
        );
        let seq2 = bus.publish(
            "run-3",
            AnalysisEventPayload::FileRemoved {
                file_id: "f-1".to_string(),
            },
        );

        assert_eq!(seq1, 1);
        assert_eq!(seq2, 2);
        assert_eq!(bus.current_sequence(), 3);
        assert_eq!(bus.receiver_count(), 0);
    }
}
