//! Payload shapes used by the rental-search chat workflow.
//!
//! None of the patterns depend on these; they are the concrete types the
//! chat surface sends and are used by the demo scenario and tests.

use serde::{Deserialize, Serialize};

/// A user request submitted to the chat loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionRequest {
    pub request: String,
}

impl ConditionRequest {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
        }
    }
}

/// Intermediate progress reported by a running search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub message: String,
}

impl ProgressUpdate {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Final result of a search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub summary: String,
}

impl FinalSummary {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}
