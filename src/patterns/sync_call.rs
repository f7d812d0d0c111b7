//! Synchronous-call pattern: run an activity and return its result.

use anyhow::Result;
use tracing::instrument;

use crate::activity::Activity;
use crate::core::{Handlers, WorkflowContext};

/// Invokes an activity with no signal involvement
pub struct SyncCall<A> {
    activity: A,
}

/// Build a synchronous call around an activity
pub fn sync_call<A: Activity>(activity: A) -> SyncCall<A> {
    SyncCall { activity }
}

impl<A: Activity> SyncCall<A> {
    /// Run the activity once and return exactly what it returns
    #[instrument(skip_all, fields(workflow_id = %ctx.workflow_id(), activity = %self.activity.name()))]
    pub async fn call(&self, ctx: &mut WorkflowContext, args: A::Args) -> Result<A::Output> {
        let mut handlers: Handlers<'_, ()> = Handlers::new();
        ctx.execute_activity(&mut handlers, &mut (), &self.activity, args)
            .await
    }

    pub fn activity(&self) -> &A {
        &self.activity
    }
}
