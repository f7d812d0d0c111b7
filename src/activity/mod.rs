//! External operations started by a workflow.
//!
//! An activity is an asynchronous unit of work whose result the workflow
//! awaits. The coordination patterns never retry or wrap activity errors:
//! whatever `execute` returns is what the caller sees.

pub mod function;

use anyhow::Result;
use async_trait::async_trait;

pub use function::{activity_fn, ActivityFn};

/// Trait for external operations
#[async_trait]
pub trait Activity: Send + Sync {
    /// Input accepted by the operation
    type Args: Send + 'static;

    /// Result produced by the operation
    type Output: Send + 'static;

    /// Human-readable activity name (recorded in the workflow history)
    fn name(&self) -> &str;

    /// Run the operation to completion
    async fn execute(&self, args: Self::Args) -> Result<Self::Output>;
}
