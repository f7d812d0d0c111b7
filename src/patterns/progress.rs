//! Progress-and-final pattern.
//!
//! Starts an activity, forwards every progress signal to `on_progress` until
//! the first completion signal arrives, and returns that completion's
//! payload. Progress delivered after completion is dropped, and later
//! completions are ignored, including ones that arrive after the call has
//! returned and before the next call starts.

use anyhow::Result;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, trace};

use crate::activity::Activity;
use crate::core::{CoordinationError, Handlers, WorkflowContext};
use crate::domain::Signal;

type StartedCallback<T> = Box<dyn FnMut(T)>;
type ProgressCallback<P> = Box<dyn FnMut(P)>;

struct ProgressState<F> {
    done: bool,
    result: Option<F>,
    progress_seen: usize,
}

/// Starts an activity, reports progress, and returns a signal-carried final result
pub struct ProgressAndFinal<A: Activity, P, F> {
    activity: A,
    progress: Signal<P>,
    completion: Signal<F>,
    on_started: Option<StartedCallback<A::Output>>,
    on_progress: Option<ProgressCallback<P>>,
}

/// Build a progress-and-final pattern
pub fn progress_and_final<A, P, F>(
    activity: A,
    progress: Signal<P>,
    completion: Signal<F>,
) -> ProgressAndFinal<A, P, F>
where
    A: Activity,
    P: DeserializeOwned + 'static,
    F: DeserializeOwned + 'static,
{
    ProgressAndFinal {
        activity,
        progress,
        completion,
        on_started: None,
        on_progress: None,
    }
}

impl<A, P, F> ProgressAndFinal<A, P, F>
where
    A: Activity,
    P: DeserializeOwned + 'static,
    F: DeserializeOwned + 'static,
{
    /// Callback run with the activity result once the activity resolves
    pub fn on_started(mut self, callback: impl FnMut(A::Output) + 'static) -> Self {
        self.on_started = Some(Box::new(callback));
        self
    }

    /// Callback run for every progress delivery received before completion
    pub fn on_progress(mut self, callback: impl FnMut(P) + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    /// Run one invocation and return the completion payload.
    ///
    /// Never returns if the completion signal never arrives.
    #[instrument(
        skip_all,
        fields(
            workflow_id = %ctx.workflow_id(),
            activity = %self.activity.name(),
            progress = %self.progress,
            completion = %self.completion
        )
    )]
    pub async fn call(&mut self, ctx: &mut WorkflowContext, args: A::Args) -> Result<F> {
        let mut state = ProgressState {
            done: false,
            result: None,
            progress_seen: 0,
        };
        let on_progress = &mut self.on_progress;

        let mut handlers = Handlers::new();
        handlers.register(&self.progress, move |state: &mut ProgressState<F>, payload: P| {
            if state.done {
                trace!("Progress after completion dropped");
                return;
            }
            state.progress_seen += 1;
            if let Some(callback) = on_progress.as_mut() {
                callback(payload);
            }
        })?;
        handlers.register_once(&self.completion, |state: &mut ProgressState<F>, payload: F| {
            if state.done {
                debug!("Duplicate completion ignored");
                return;
            }
            state.result = Some(payload);
            state.done = true;
        })?;

        let started = ctx
            .execute_activity(&mut handlers, &mut state, &self.activity, args)
            .await?;
        debug!(
            progress_seen = state.progress_seen,
            completed = state.done,
            "Activity started"
        );

        if let Some(callback) = self.on_started.as_mut() {
            callback(started);
        }

        ctx.wait_until(&mut handlers, &mut state, |state| state.done)
            .await;
        ctx.retire(&handlers);

        debug!(progress_seen = state.progress_seen, "Completion received");
        state.result.take().ok_or_else(|| {
            CoordinationError::MissingFinal {
                signal: self.completion.name().to_string(),
            }
            .into()
        })
    }

    pub fn progress(&self) -> &Signal<P> {
        &self.progress
    }

    pub fn completion(&self) -> &Signal<F> {
        &self.completion
    }
}
