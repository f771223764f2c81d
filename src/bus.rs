//! Broadcast-based event bus.
//!
//! The bus decouples event producers from the engine: producers publish
//! [`Event`]s, the engine run loop subscribes and dispatches them. Errors
//! raised during dispatch travel on a separate channel so that observers can
//! watch failures without consuming the event stream.

use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

use crate::event::Event;
use crate::value::Value;

pub type EventResult<T> = Result<T, EventError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EventError {
    #[error("Event send failed: {message}")]
    SendFailed { message: String },

    #[error("Event receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Event receiver lagged: {count} skipped")]
    Lagged { count: u64 },
}

/// Error raised while dispatching an event, published on the error channel.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ErrorEvent {
    pub error_type: String,
    pub message: String,
    pub severity: ErrorSeverity,
    pub parameters: HashMap<String, Value>,
}

impl ErrorEvent {
    pub fn new(
        error_type: impl Into<String>,
        message: impl Into<String>,
        severity: ErrorSeverity,
    ) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            severity,
            parameters: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(name.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorSeverity {
    #[default]
    Warning,
    Error,
    Critical,
}

pub struct EventBus {
    event_sender: broadcast::Sender<Event>,
    error_sender: broadcast::Sender<ErrorEvent>,
    capacity: usize,
    // Held so publishing succeeds before any external subscriber exists.
    _internal_receiver: broadcast::Receiver<Event>,
    _internal_error_receiver: broadcast::Receiver<ErrorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (event_sender, event_receiver) = broadcast::channel(capacity);
        let (error_sender, error_receiver) = broadcast::channel(capacity);
        Self {
            event_sender,
            error_sender,
            capacity,
            _internal_receiver: event_receiver,
            _internal_error_receiver: error_receiver,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Subscribe to both regular and error events.
    pub fn subscribe(&self) -> (EventReceiver, ErrorReceiver) {
        let event_rx = self.event_sender.subscribe();
        let error_rx = self.error_sender.subscribe();
        (EventReceiver::new(event_rx), ErrorReceiver::new(error_rx))
    }

    pub async fn publish(&self, event: Event) -> EventResult<()> {
        debug!(kind = %event.kind, "publishing event");
        self.event_sender
            .send(event)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }

    pub async fn publish_error(&self, error: ErrorEvent) -> EventResult<()> {
        self.error_sender
            .send(error)
            .map_err(|e| EventError::SendFailed {
                message: e.to_string(),
            })?;
        Ok(())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(crate::config::default_event_buffer_size())
    }
}

pub struct EventReceiver {
    pub receiver: broadcast::Receiver<Event>,
}

impl EventReceiver {
    fn new(receiver: broadcast::Receiver<Event>) -> Self {
        Self { receiver }
    }

    /// Receive the next event. A lagged receiver is resubscribed before the
    /// error is returned, so the caller can simply call `recv` again.
    pub async fn recv(&mut self) -> EventResult<Event> {
        match self.receiver.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                self.receiver = self.receiver.resubscribe();
                Err(EventError::Lagged { count: n })
            }
            Err(e) => Err(EventError::ReceiveFailed {
                message: e.to_string(),
            }),
        }
    }
}

pub struct ErrorReceiver {
    pub receiver: broadcast::Receiver<ErrorEvent>,
}

impl ErrorReceiver {
    fn new(receiver: broadcast::Receiver<ErrorEvent>) -> Self {
        Self { receiver }
    }

    pub async fn recv(&mut self) -> EventResult<ErrorEvent> {
        self.receiver.recv().await.map_err(|e| EventError::ReceiveFailed {
            message: e.to_string(),
        })
    }
}
