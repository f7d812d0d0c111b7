//! Await-completion pattern: start an activity, then wait for one signal.
//!
//! The completion handler is registered before the activity starts, so a
//! completion delivered while the activity is still running is not missed.
//! The completion payload is accepted and discarded; the invocation returns
//! the activity's own result. Completions arriving after the call returns
//! are duplicates and never reach a later call.

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::activity::Activity;
use crate::core::{Handlers, WorkflowContext};
use crate::domain::Signal;

/// Starts an activity and suspends until a completion signal arrives
pub struct AwaitCompletion<A, F> {
    activity: A,
    completion: Signal<F>,
}

/// Build an await-completion pattern
pub fn await_completion<A, F>(activity: A, completion: Signal<F>) -> AwaitCompletion<A, F>
where
    A: Activity,
    F: DeserializeOwned + 'static,
{
    AwaitCompletion {
        activity,
        completion,
    }
}

impl<A, F> AwaitCompletion<A, F>
where
    A: Activity,
    F: DeserializeOwned + 'static,
{
    /// Start the activity, wait for the completion signal, return the activity result.
    ///
    /// Never returns if the completion signal never arrives.
    #[instrument(
        skip_all,
        fields(
            workflow_id = %ctx.workflow_id(),
            activity = %self.activity.name(),
            completion = %self.completion
        )
    )]
    pub async fn call(&self, ctx: &mut WorkflowContext, args: A::Args) -> Result<A::Output> {
        let mut completed = false;
        let mut handlers = Handlers::new();
        handlers.register_once(&self.completion, |completed: &mut bool, _payload: F| {
            if !*completed {
                *completed = true;
            }
        })?;

        let result = ctx
            .execute_activity(&mut handlers, &mut completed, &self.activity, args)
            .await?;

        debug!(already_completed = completed, "Activity finished, waiting for completion");
        ctx.wait_until(&mut handlers, &mut completed, |completed| *completed)
            .await;
        ctx.retire(&handlers);

        Ok(result)
    }

    pub fn completion(&self) -> &Signal<F> {
        &self.completion
    }
}
