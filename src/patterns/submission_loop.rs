//! Iterative-submission-loop pattern.
//!
//! Accepts submission signals until a finish signal arrives. Each submission
//! is stored in a single pending slot and `on_submission` runs inside the
//! signal handler, at delivery time. The loop itself wakes when the slot is
//! filled or the finish flag is set, clears the slot and waits again.
//!
//! Because the slot holds one payload, two submissions applied in the same
//! activation leave only the later one for the loop to consume. Both still
//! reached `on_submission`, and nothing started by the first callback is
//! cancelled.

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use crate::core::{Handlers, WorkflowContext};
use crate::domain::Signal;

type Callback<S> = Box<dyn FnMut(&S)>;

/// Loop phase, derived from the invocation state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopPhase {
    /// Nothing pending, not finished
    Waiting,
    /// A submission is stored and not yet consumed
    SubmissionPending,
    /// The finish signal was received
    Done,
}

/// Per-invocation state of a submission loop
#[derive(Debug)]
pub(crate) struct LoopState<S> {
    pending: Option<S>,
    done: bool,
}

impl<S> Default for LoopState<S> {
    fn default() -> Self {
        Self {
            pending: None,
            done: false,
        }
    }
}

impl<S> LoopState<S> {
    pub(crate) fn phase(&self) -> LoopPhase {
        if self.done {
            LoopPhase::Done
        } else if self.pending.is_some() {
            LoopPhase::SubmissionPending
        } else {
            LoopPhase::Waiting
        }
    }

    fn is_ready(&self) -> bool {
        self.done || self.pending.is_some()
    }
}

/// Repeatedly accepts submissions until finished
pub struct SubmissionLoop<S, F> {
    submission: Signal<S>,
    finish: Signal<F>,
    on_submission: Option<Callback<S>>,
    on_consumed: Option<Callback<S>>,
}

/// Build a submission loop over a submission signal and a finish signal
pub fn submission_loop<S, F>(submission: Signal<S>, finish: Signal<F>) -> SubmissionLoop<S, F>
where
    S: DeserializeOwned + 'static,
    F: DeserializeOwned + 'static,
{
    SubmissionLoop {
        submission,
        finish,
        on_submission: None,
        on_consumed: None,
    }
}

impl<S, F> SubmissionLoop<S, F>
where
    S: DeserializeOwned + 'static,
    F: DeserializeOwned + 'static,
{
    /// Callback run inside the submission handler for every accepted delivery
    pub fn on_submission(mut self, callback: impl FnMut(&S) + 'static) -> Self {
        self.on_submission = Some(Box::new(callback));
        self
    }

    /// Callback run by the loop body with the submission it consumes on each wake
    pub fn on_consumed(mut self, callback: impl FnMut(&S) + 'static) -> Self {
        self.on_consumed = Some(Box::new(callback));
        self
    }

    /// Run the loop until the finish signal is observed.
    ///
    /// Returns the number of submissions the loop consumed, which can be
    /// lower than the number delivered when submissions overwrite each other.
    #[instrument(
        skip_all,
        fields(
            workflow_id = %ctx.workflow_id(),
            submission = %self.submission,
            finish = %self.finish
        )
    )]
    pub async fn run(&mut self, ctx: &mut WorkflowContext) -> Result<usize> {
        let mut state = LoopState::<S>::default();
        let on_submission = &mut self.on_submission;

        let mut handlers = Handlers::new();
        handlers.register_once(&self.finish, |state: &mut LoopState<S>, _payload: F| {
            state.done = true;
        })?;
        handlers.register(&self.submission, move |state: &mut LoopState<S>, payload: S| {
            if state.done {
                debug!("Submission after finish ignored");
                return;
            }
            if state.pending.is_some() {
                debug!("Unconsumed submission overwritten");
            }
            let payload = state.pending.insert(payload);
            if let Some(callback) = on_submission.as_mut() {
                callback(&*payload);
            }
        })?;

        let mut consumed = 0;
        loop {
            ctx.wait_until(&mut handlers, &mut state, LoopState::is_ready)
                .await;

            if state.phase() == LoopPhase::Done {
                break;
            }

            if let Some(submission) = state.pending.take() {
                consumed += 1;
                debug!(consumed, "Submission consumed");
                if let Some(callback) = self.on_consumed.as_mut() {
                    callback(&submission);
                }
            }
        }

        ctx.retire(&handlers);
        info!(consumed, "Submission loop finished");
        Ok(consumed)
    }

    pub fn submission(&self) -> &Signal<S> {
        &self.submission
    }

    pub fn finish(&self) -> &Signal<F> {
        &self.finish
    }
}
