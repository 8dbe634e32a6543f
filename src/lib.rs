//! Client library for the Complēre analysis backend.
//!
//! Turns a set of local documents and/or a text message into a completed
//! analysis record: pre-signed upload negotiation, parallel direct-to-storage
//! transfer, job submission, and bounded status polling, with progress
//! observable as an event stream.

pub mod analysis;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod token;

pub use analysis::AnalysisOrchestrator;
pub use error::AnalysisError;
