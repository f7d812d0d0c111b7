//! signalflow - Signal-coordination primitives for workflow orchestration
//!
//! A small library of patterns for waiting on asynchronous external input
//! inside a single-threaded, cooperatively scheduled workflow.
//!
//! # Architecture
//!
//! The workflow body owns a [`WorkflowContext`]. External actors hold a
//! [`SignalSender`] and deliver typed signals over a channel. The body only
//! observes deliveries at suspension points, where the context hands each
//! one to the handlers registered by the running pattern invocation:
//! - Handlers run one at a time with exclusive access to invocation state
//! - Predicate waits are re-checked after every batch of deliveries
//! - Everything the host does is recorded in an ordered history
//!
//! # Modules
//!
//! - `activity`: External operations (trait + closure adapter)
//! - `core`: The host (context, handler sets, history persistence)
//! - `domain`: Data structures (Signal, SignalEnvelope, History)
//! - `patterns`: The four coordination patterns
//! - `scenario`: Scripted signal deliveries for the demo
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Run the built-in rental-search scenario
//! signalflow demo
//!
//! # Inspect the recorded history
//! signalflow history <workflow-id>
//! ```

pub mod activity;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod patterns;
pub mod scenario;

// Re-export main types at crate root for convenience
pub use activity::{activity_fn, Activity, ActivityFn};
pub use crate::core::{CoordinationError, Handlers, HistoryStore, SignalSender, WorkflowContext};
pub use domain::{History, HistoryEvent, HistoryEventType, Signal, SignalEnvelope};
pub use patterns::{
    await_completion, progress_and_final, submission_loop, sync_call, AwaitCompletion,
    ProgressAndFinal, SubmissionLoop, SyncCall,
};
pub use scenario::Scenario;
