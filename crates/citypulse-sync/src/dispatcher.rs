//! Inbound frame decoding and routing.
//!
//! The [`Dispatcher`] holds an explicit table from [`EventKind`] to
//! handler. Registration validates the type up front, so an unknown or
//! duplicated type is a registration error rather than a silent no-op at
//! runtime. Frames are handled synchronously in arrival order; each call
//! to [`Dispatcher::on_frame`] invokes at most one handler exactly once.

use std::collections::BTreeMap;

use citypulse_types::{Envelope, EventKind};
use serde::de::DeserializeOwned;

use crate::error::DispatchError;

type Handler = Box<dyn FnMut(serde_json::Value) -> Result<(), DispatchError> + Send>;

/// What happened to a single inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler for this kind ran.
    Dispatched(EventKind),
    /// The frame was valid but nothing is registered for its type.
    Ignored(String),
    /// The frame is not a valid envelope and was dropped.
    Malformed,
    /// The payload did not decode for its kind and was dropped.
    Rejected(EventKind),
}

/// Routes decoded envelopes to registered handlers.
#[derive(Default)]
pub struct Dispatcher {
    handlers: BTreeMap<EventKind, Handler>,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Dispatcher {
    /// An empty dispatch table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for `kind`.
    ///
    /// The payload is decoded into `T` before the handler runs; a payload
    /// that does not decode never reaches the handler.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateHandler`] if `kind` already has a
    /// handler.
    pub fn register<T, F>(&mut self, kind: EventKind, mut handler: F) -> Result<(), DispatchError>
    where
        T: DeserializeOwned + 'static,
        F: FnMut(T) + Send + 'static,
    {
        self.insert(
            kind,
            Box::new(move |data| {
                let payload = serde_json::from_value::<T>(data)
                    .map_err(|source| DispatchError::Payload { kind, source })?;
                handler(payload);
                Ok(())
            }),
        )
    }

    /// Register a handler by wire type name, receiving the raw payload.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownEventType`] if `event_type` is not a
    /// known kind, or [`DispatchError::DuplicateHandler`] if it already has
    /// a handler.
    pub fn register_handler<F>(&mut self, event_type: &str, mut handler: F) -> Result<(), DispatchError>
    where
        F: FnMut(serde_json::Value) + Send + 'static,
    {
        let kind = EventKind::from_wire(event_type)
            .ok_or_else(|| DispatchError::UnknownEventType(event_type.to_owned()))?;
        self.insert(
            kind,
            Box::new(move |data| {
                handler(data);
                Ok(())
            }),
        )
    }

    /// Whether `kind` has a handler.
    pub fn is_registered(&self, kind: EventKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Kinds that have a handler, in order.
    pub fn registered(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.handlers.keys().copied()
    }

    /// Decode one raw frame and route it.
    ///
    /// Never fails: malformed frames and undecodable payloads are logged
    /// and dropped without touching any state.
    pub fn on_frame(&mut self, raw: &str) -> DispatchOutcome {
        let envelope = match Envelope::from_frame(raw) {
            Ok(envelope) => envelope,
            Err(source) => {
                let err = DispatchError::MalformedEnvelope(source);
                tracing::warn!(error = %err, frame_len = raw.len(), "dropping malformed frame");
                return DispatchOutcome::Malformed;
            }
        };

        let Some((kind, handler)) = envelope
            .kind()
            .and_then(|kind| self.handlers.get_mut(&kind).map(|h| (kind, h)))
        else {
            tracing::debug!(event_type = %envelope.event_type, "no handler for event type");
            return DispatchOutcome::Ignored(envelope.event_type);
        };

        match handler(envelope.data) {
            Ok(()) => {
                tracing::trace!(event_type = kind.as_wire(), "dispatched");
                DispatchOutcome::Dispatched(kind)
            }
            Err(err) => {
                tracing::warn!(error = %err, event_type = kind.as_wire(), "dropping frame");
                DispatchOutcome::Rejected(kind)
            }
        }
    }

    fn insert(&mut self, kind: EventKind, handler: Handler) -> Result<(), DispatchError> {
        if self.handlers.contains_key(&kind) {
            return Err(DispatchError::DuplicateHandler(kind));
        }
        self.handlers.insert(kind, handler);
        tracing::debug!(event_type = kind.as_wire(), "handler registered");
        Ok(())
    }
}
