//! Errors raised by the coordination host itself.
//!
//! External-operation failures are not represented here: they travel as the
//! activity's own `anyhow::Error` and reach the caller unchanged.

use thiserror::Error;

/// Host-side coordination errors
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Handler already registered for signal '{signal}'")]
    DuplicateHandler { signal: String },

    #[error("Workflow '{workflow_id}' is no longer accepting signals")]
    WorkflowClosed { workflow_id: String },

    #[error("Completion signal '{signal}' resumed the workflow without a payload")]
    MissingFinal { signal: String },

    #[error("Invalid workflow id: {0}")]
    InvalidWorkflowId(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
