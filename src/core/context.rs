//! The in-process execution host for one workflow instance.
//!
//! Signals reach the workflow as [`SignalEnvelope`]s on an unbounded channel.
//! The workflow body only observes them at suspension points: while waiting
//! on a predicate ([`WorkflowContext::wait_until`]) or while an activity is
//! in flight ([`WorkflowContext::execute_activity`]).
//!
//! Each time the workflow wakes, the host runs an *activation*: every
//! delivery already queued is handed to the registered handlers, one at a
//! time and in arrival order, before the body sees any state. Deliveries for
//! signals nobody is listening to yet are kept in a backlog and offered
//! again at the next activation.
//!
//! One-shot signals (completions, finish requests) are retired when the
//! invocation that consumed one returns. Later deliveries of a retired name
//! are duplicates: they are discarded on arrival, and the next invocation
//! that registers the name drops any still queued before it applies its
//! first activation. That invocation only sees deliveries sent after it
//! started waiting.
//!
//! Neither the backlog nor the history is capped. A signal no invocation
//! ever registers stays buffered for the life of the context, so long-lived
//! workflows should register a handler for every name their senders use.

use std::collections::{HashSet, VecDeque};
use std::future::pending;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::activity::Activity;
use crate::domain::{History, HistoryEvent, HistoryEventType, Signal, SignalEnvelope};

use super::error::CoordinationError;
use super::handlers::{Dispatch, Handlers};

/// Sending half of a workflow's signal channel
#[derive(Debug, Clone)]
pub struct SignalSender {
    workflow_id: String,
    sender: mpsc::UnboundedSender<SignalEnvelope>,
}

impl SignalSender {
    /// Deliver a typed signal to the workflow
    pub fn send<P: Serialize>(&self, signal: &Signal<P>, payload: &P) -> Result<Uuid, CoordinationError> {
        let envelope = SignalEnvelope::encode(signal, payload)?;
        self.send_envelope(envelope)
    }

    /// Deliver a pre-encoded envelope
    pub fn send_envelope(&self, envelope: SignalEnvelope) -> Result<Uuid, CoordinationError> {
        let id = envelope.id;
        let name = envelope.name.clone();

        self.sender
            .send(envelope)
            .map_err(|_| CoordinationError::WorkflowClosed {
                workflow_id: self.workflow_id.clone(),
            })?;

        trace!(workflow_id = %self.workflow_id, signal = %name, %id, "Signal sent");
        Ok(id)
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Whether the workflow has gone away
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Host state for a single workflow instance
pub struct WorkflowContext {
    workflow_id: String,
    receiver: mpsc::UnboundedReceiver<SignalEnvelope>,
    backlog: VecDeque<SignalEnvelope>,
    retired: HashSet<String>,
    history: History,
    senders_dropped: bool,
}

impl WorkflowContext {
    /// Create a context and the sender external actors use to signal it
    pub fn new(workflow_id: impl Into<String>) -> (Self, SignalSender) {
        let workflow_id = workflow_id.into();
        let (sender, receiver) = mpsc::unbounded_channel();

        let context = Self {
            workflow_id: workflow_id.clone(),
            receiver,
            backlog: VecDeque::new(),
            retired: HashSet::new(),
            history: History::new(),
            senders_dropped: false,
        };

        (context, SignalSender { workflow_id, sender })
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn into_history(self) -> History {
        self.history
    }

    /// Deliveries received with no handler registered yet
    pub fn buffered(&self) -> usize {
        self.backlog.len()
    }

    /// Retire the one-shot signals of an invocation that has returned.
    ///
    /// Deliveries of those names are discarded until an invocation registers
    /// them again, and that invocation ignores whatever was queued before it.
    pub fn retire<S>(&mut self, handlers: &Handlers<'_, S>) {
        for name in handlers.one_shot() {
            if self.retired.insert(name.to_string()) {
                trace!(workflow_id = %self.workflow_id, signal = %name, "One-shot signal retired");
            }
        }
    }

    /// Suspend until `predicate` holds over the invocation state.
    ///
    /// The predicate is re-evaluated after every activation. If it is false
    /// and no sender is left, this never returns.
    pub async fn wait_until<S, F>(&mut self, handlers: &mut Handlers<'_, S>, state: &mut S, mut predicate: F)
    where
        F: FnMut(&S) -> bool,
    {
        self.activate(handlers, state);

        loop {
            if predicate(&*state) {
                let event = self.event(HistoryEventType::ConditionSatisfied, "Wait condition satisfied");
                self.history.push(event);
                return;
            }

            match self.next_delivery().await {
                Some(envelope) => {
                    self.deliver(handlers, state, envelope);
                    self.activate(handlers, state);
                }
                None => {
                    warn!(
                        workflow_id = %self.workflow_id,
                        "All signal senders dropped while waiting; condition can no longer change"
                    );
                    pending::<()>().await;
                }
            }
        }
    }

    /// Run an activity to completion, applying deliveries while it is in flight.
    ///
    /// Deliveries that are already queued are applied before the activity's
    /// result is taken. The activity's error, if any, is returned unchanged.
    pub async fn execute_activity<S, A>(
        &mut self,
        handlers: &mut Handlers<'_, S>,
        state: &mut S,
        activity: &A,
        args: A::Args,
    ) -> Result<A::Output>
    where
        A: Activity,
    {
        let name = activity.name().to_string();
        debug!(workflow_id = %self.workflow_id, activity = %name, "Starting activity");

        let event = self
            .event(
                HistoryEventType::ActivityScheduled,
                format!("Activity '{}' scheduled", name),
            )
            .with_name(&name);
        self.history.push(event);

        self.activate(handlers, state);

        // The operation is polled before the channel on every turn so a steady
        // stream of deliveries cannot starve it.
        let mut operation = activity.execute(args);
        let result = loop {
            tokio::select! {
                biased;

                result = &mut operation => break result,
                delivery = self.receiver.recv(), if !self.senders_dropped => match delivery {
                    Some(envelope) => {
                        self.deliver(handlers, state, envelope);
                        self.activate(handlers, state);
                    }
                    None => self.senders_dropped = true,
                },
            }
        };

        // Deliveries queued by the time the operation finished are applied
        // before its result is handed back.
        self.activate(handlers, state);

        let event = match &result {
            Ok(_) => self.event(
                HistoryEventType::ActivityCompleted,
                format!("Activity '{}' completed", name),
            ),
            Err(e) => {
                debug!(workflow_id = %self.workflow_id, activity = %name, error = %e, "Activity failed");
                self.event(
                    HistoryEventType::ActivityFailed,
                    format!("Activity '{}' failed", name),
                )
                .with_error(format!("{:#}", e))
            }
        };
        self.history.push(event.with_name(name));

        result
    }

    /// Apply every delivery available without suspending.
    ///
    /// Buffered deliveries that now have a handler go first, then whatever
    /// was queued on the channel when the activation began. Deliveries sent
    /// while the activation runs wait for the next one.
    fn activate<S>(&mut self, handlers: &mut Handlers<'_, S>, state: &mut S) -> usize {
        self.reclaim(handlers);

        let mut applied = 0;

        if self.backlog.iter().any(|e| handlers.handles(&e.name)) {
            let buffered = std::mem::take(&mut self.backlog);
            for envelope in buffered {
                if handlers.handles(&envelope.name) {
                    self.deliver(handlers, state, envelope);
                    applied += 1;
                } else {
                    self.backlog.push_back(envelope);
                }
            }
        }

        for _ in 0..self.receiver.len() {
            match self.receiver.try_recv() {
                Ok(envelope) => {
                    self.deliver(handlers, state, envelope);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.senders_dropped = true;
                    break;
                }
            }
        }

        if applied > 0 {
            trace!(workflow_id = %self.workflow_id, applied, "Activation applied deliveries");
        }
        applied
    }

    /// Take back retired names this handler set registers again.
    ///
    /// Everything of those names queued so far predates the new invocation
    /// and is discarded.
    fn reclaim<S>(&mut self, handlers: &Handlers<'_, S>) {
        let reclaimed: Vec<String> = self
            .retired
            .iter()
            .filter(|name| handlers.handles(name))
            .cloned()
            .collect();
        if reclaimed.is_empty() {
            return;
        }

        let mut queued = std::mem::take(&mut self.backlog);
        for _ in 0..self.receiver.len() {
            match self.receiver.try_recv() {
                Ok(envelope) => {
                    if !handlers.handles(&envelope.name) {
                        let event = self.buffered_event(&envelope);
                        self.history.push(event);
                    }
                    queued.push_back(envelope);
                }
                Err(_) => break,
            }
        }

        for envelope in queued {
            if reclaimed.contains(&envelope.name) {
                self.discard(envelope);
            } else {
                self.backlog.push_back(envelope);
            }
        }

        for name in &reclaimed {
            self.retired.remove(name);
        }
    }

    fn deliver<S>(&mut self, handlers: &mut Handlers<'_, S>, state: &mut S, envelope: SignalEnvelope) {
        match handlers.dispatch(state, &envelope) {
            Dispatch::Handled => {
                trace!(workflow_id = %self.workflow_id, signal = %envelope.name, "Signal delivered");
                let event = self
                    .event(
                        HistoryEventType::SignalDelivered,
                        format!("Signal '{}' delivered", envelope.name),
                    )
                    .with_name(&envelope.name)
                    .with_payload(envelope.payload);
                self.history.push(event);
            }
            Dispatch::Unhandled if self.retired.contains(&envelope.name) => self.discard(envelope),
            Dispatch::Unhandled => {
                debug!(
                    workflow_id = %self.workflow_id,
                    signal = %envelope.name,
                    "No handler registered, buffering signal"
                );
                let event = self.buffered_event(&envelope);
                self.history.push(event);
                self.backlog.push_back(envelope);
            }
            Dispatch::Rejected(e) => {
                warn!(
                    workflow_id = %self.workflow_id,
                    signal = %envelope.name,
                    error = %e,
                    "Dropping signal with undecodable payload"
                );
                let event = self
                    .event(
                        HistoryEventType::SignalRejected,
                        format!("Signal '{}' rejected", envelope.name),
                    )
                    .with_name(&envelope.name)
                    .with_payload(envelope.payload)
                    .with_error(e.to_string());
                self.history.push(event);
            }
        }
    }

    fn discard(&mut self, envelope: SignalEnvelope) {
        debug!(
            workflow_id = %self.workflow_id,
            signal = %envelope.name,
            "Discarding duplicate of a consumed one-shot signal"
        );
        let event = self
            .event(
                HistoryEventType::SignalDiscarded,
                format!("Signal '{}' discarded", envelope.name),
            )
            .with_name(&envelope.name)
            .with_payload(envelope.payload);
        self.history.push(event);
    }

    fn buffered_event(&self, envelope: &SignalEnvelope) -> HistoryEvent {
        self.event(
            HistoryEventType::SignalBuffered,
            format!("Signal '{}' buffered", envelope.name),
        )
        .with_name(&envelope.name)
        .with_payload(envelope.payload.clone())
    }

    async fn next_delivery(&mut self) -> Option<SignalEnvelope> {
        if self.senders_dropped {
            return None;
        }

        let next = self.receiver.recv().await;
        if next.is_none() {
            self.senders_dropped = true;
        }
        next
    }

    fn event(&self, event_type: HistoryEventType, summary: impl Into<String>) -> HistoryEvent {
        HistoryEvent::new(
            self.workflow_id.clone(),
            self.history.next_sequence(),
            event_type,
            summary,
        )
    }
}
