//! Core coordination host.
//!
//! This module contains:
//! - Context: The single-threaded host that delivers signals and runs activities
//! - Handlers: Per-invocation signal handler sets
//! - HistoryStore: Append-only persistence for workflow histories
//! - Error: Host-side coordination errors

pub mod context;
pub mod error;
pub mod handlers;
pub mod history_store;

// Re-export commonly used types
pub use context::{SignalSender, WorkflowContext};
pub use error::CoordinationError;
pub use handlers::{Dispatch, Handlers};
pub use history_store::HistoryStore;
