//! Per-invocation signal handler sets.
//!
//! A pattern invocation builds one [`Handlers`] value, registers each of its
//! signals exactly once, and hands it to the context at every suspension
//! point. Handlers get exclusive access to the invocation state while they
//! run; the context guarantees only one handler runs at a time.
//!
//! Signals registered with [`Handlers::register_once`] are one-shot: the
//! invocation consumes at most one of them. Once it returns, the context
//! treats further deliveries of those names as duplicates (see
//! [`WorkflowContext::retire`](super::WorkflowContext::retire)).

use serde::de::DeserializeOwned;

use crate::domain::{Signal, SignalEnvelope};

use super::error::CoordinationError;

type BoxedHandler<'a, S> =
    Box<dyn FnMut(&mut S, &SignalEnvelope) -> Result<(), serde_json::Error> + 'a>;

/// Result of offering one delivery to a handler set
#[derive(Debug)]
pub enum Dispatch {
    /// A handler ran for the delivery
    Handled,

    /// No handler is registered for the signal name
    Unhandled,

    /// A handler exists but the payload did not decode
    Rejected(serde_json::Error),
}

/// Handlers registered by one pattern invocation, keyed by signal name
pub struct Handlers<'a, S> {
    entries: Vec<(String, BoxedHandler<'a, S>)>,
    one_shot: Vec<String>,
}

impl<'a, S> Default for Handlers<'a, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, S> Handlers<'a, S> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            one_shot: Vec::new(),
        }
    }

    /// Register a handler for a signal.
    ///
    /// Each signal name may be registered once per handler set.
    pub fn register<P, F>(&mut self, signal: &Signal<P>, mut handler: F) -> Result<(), CoordinationError>
    where
        S: 'a,
        P: DeserializeOwned + 'static,
        F: FnMut(&mut S, P) + 'a,
    {
        if self.handles(signal.name()) {
            return Err(CoordinationError::DuplicateHandler {
                signal: signal.name().to_string(),
            });
        }

        let boxed: BoxedHandler<'a, S> = Box::new(move |state: &mut S, envelope: &SignalEnvelope| {
            let payload = envelope.decode::<P>()?;
            handler(state, payload);
            Ok(())
        });
        self.entries.push((signal.name().to_string(), boxed));

        Ok(())
    }

    /// Register a handler for a signal the invocation consumes at most once
    pub fn register_once<P, F>(&mut self, signal: &Signal<P>, handler: F) -> Result<(), CoordinationError>
    where
        S: 'a,
        P: DeserializeOwned + 'static,
        F: FnMut(&mut S, P) + 'a,
    {
        self.register(signal, handler)?;
        self.one_shot.push(signal.name().to_string());
        Ok(())
    }

    /// Names registered with [`Handlers::register_once`]
    pub fn one_shot(&self) -> impl Iterator<Item = &str> {
        self.one_shot.iter().map(String::as_str)
    }

    /// Whether a handler is registered for this signal name
    pub fn handles(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run the handler registered for the envelope's signal, if any
    pub fn dispatch(&mut self, state: &mut S, envelope: &SignalEnvelope) -> Dispatch {
        match self.entries.iter_mut().find(|(n, _)| *n == envelope.name) {
            Some((_, handler)) => match handler(state, envelope) {
                Ok(()) => Dispatch::Handled,
                Err(e) => Dispatch::Rejected(e),
            },
            None => Dispatch::Unhandled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProgressUpdate;

    const PROGRESS: Signal<ProgressUpdate> = Signal::new("progress");
    const FINISH: Signal<String> = Signal::new("finish");

    #[test]
    fn test_dispatch_to_registered_handler() {
        let mut handlers: Handlers<'_, Vec<String>> = Handlers::new();
        handlers
            .register(&PROGRESS, |seen: &mut Vec<String>, p: ProgressUpdate| {
                seen.push(p.message)
            })
            .unwrap();

        let mut seen = Vec::new();
        let envelope =
            SignalEnvelope::encode(&PROGRESS, &ProgressUpdate::new("found 3 listings")).unwrap();

        assert!(matches!(handlers.dispatch(&mut seen, &envelope), Dispatch::Handled));
        assert_eq!(seen, vec!["found 3 listings".to_string()]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut handlers: Handlers<'_, bool> = Handlers::new();
        handlers.register(&FINISH, |done: &mut bool, _: String| *done = true).unwrap();

        let err = handlers
            .register(&FINISH, |done: &mut bool, _: String| *done = true)
            .unwrap_err();
        assert!(matches!(err, CoordinationError::DuplicateHandler { .. }));
        assert_eq!(handlers.len(), 1);
    }

    #[test]
    fn test_unhandled_and_rejected() {
        let mut handlers: Handlers<'_, bool> = Handlers::new();
        handlers.register(&FINISH, |done: &mut bool, _: String| *done = true).unwrap();

        let mut done = false;
        let other = SignalEnvelope::new("progress", serde_json::json!({"message": "x"}));
        assert!(matches!(handlers.dispatch(&mut done, &other), Dispatch::Unhandled));

        let bad = SignalEnvelope::new("finish", serde_json::json!({"not": "a string"}));
        assert!(matches!(handlers.dispatch(&mut done, &bad), Dispatch::Rejected(_)));
        assert!(!done);
    }

    #[test]
    fn test_register_once_marks_one_shot() {
        let mut handlers: Handlers<'_, bool> = Handlers::new();
        handlers
            .register(&PROGRESS, |_: &mut bool, _: ProgressUpdate| {})
            .unwrap();
        handlers
            .register_once(&FINISH, |done: &mut bool, _: String| *done = true)
            .unwrap();

        assert_eq!(handlers.one_shot().collect::<Vec<_>>(), vec!["finish"]);
        assert!(handlers
            .register_once(&FINISH, |_: &mut bool, _: String| {})
            .is_err());
        assert_eq!(handlers.one_shot().count(), 1);
    }

    #[test]
    fn test_handlers_can_borrow_callbacks() {
        let mut calls = 0;
        {
            let mut handlers: Handlers<'_, ()> = Handlers::new();
            handlers
                .register(&FINISH, |_: &mut (), _: String| calls += 1)
                .unwrap();

            let envelope = SignalEnvelope::encode(&FINISH, &"bye".to_string()).unwrap();
            handlers.dispatch(&mut (), &envelope);
            handlers.dispatch(&mut (), &envelope);
        }
        assert_eq!(calls, 2);
    }
}
