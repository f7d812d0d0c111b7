//! Signal identities and the envelopes that carry them.
//!
//! A [`Signal`] names a signal and fixes its payload type at compile time.
//! A [`SignalEnvelope`] is one delivery of that signal as it travels over the
//! host channel, with the payload encoded as JSON.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a named, typed signal.
///
/// Identities are plain values: declare them as constants and pass them to
/// the pattern constructors.
///
/// ```
/// use signalflow::domain::{ProgressUpdate, Signal};
///
/// const PROGRESS: Signal<ProgressUpdate> = Signal::new("progress");
/// assert_eq!(PROGRESS.name(), "progress");
/// ```
pub struct Signal<P> {
    name: Cow<'static, str>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> Signal<P> {
    /// Create an identity with a static name
    pub const fn new(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _payload: PhantomData,
        }
    }

    /// Create an identity with a name known only at runtime
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Cow::Owned(name.into()),
            _payload: PhantomData,
        }
    }

    /// The signal name used on the wire
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<P> Clone for Signal<P> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            _payload: PhantomData,
        }
    }
}

impl<P> fmt::Debug for Signal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("name", &self.name)
            .field("payload", &std::any::type_name::<P>())
            .finish()
    }
}

impl<P> fmt::Display for Signal<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One delivery of a signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    /// Unique identifier for this delivery
    pub id: Uuid,

    /// Signal name
    pub name: String,

    /// Encoded payload
    pub payload: serde_json::Value,

    /// When the sender produced the delivery
    pub sent_at: DateTime<Utc>,
}

impl SignalEnvelope {
    /// Create an envelope from an already-encoded payload
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            payload,
            sent_at: Utc::now(),
        }
    }

    /// Encode a typed payload for the given signal
    pub fn encode<P: Serialize>(signal: &Signal<P>, payload: &P) -> Result<Self, serde_json::Error> {
        Ok(Self::new(signal.name(), serde_json::to_value(payload)?))
    }

    /// Decode the payload into the handler's payload type
    pub fn decode<P: DeserializeOwned>(&self) -> Result<P, serde_json::Error> {
        P::deserialize(&self.payload)
    }

    /// Whether this envelope carries the given signal
    pub fn is<P>(&self, signal: &Signal<P>) -> bool {
        self.name == signal.name()
    }
}
