mod bus;
mod types;

pub use bus::{EventReceiver, EventSender, ProgressBus};
pub use types::{AnalysisEvent, AnalysisEventPayload, EventSequence};
