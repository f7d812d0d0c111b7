//! Domain types for signal coordination.
//!
//! This module contains the core data structures:
//! - Signal: Typed signal identities and delivery envelopes
//! - History: Ordered record of what the host did for a workflow
//! - Payloads: Concrete payload shapes used by the chat workflow

pub mod history;
pub mod payloads;
pub mod signal;

// Re-export commonly used types
pub use history::{History, HistoryEvent, HistoryEventType};
pub use payloads::{ConditionRequest, FinalSummary, ProgressUpdate};
pub use signal::{Signal, SignalEnvelope};
