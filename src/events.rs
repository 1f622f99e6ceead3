//! Consumer-facing gateway events and the callback registry.
//!
//! One consumer callback receives every [`GatewayEvent`]; two optional
//! debug hooks see the raw JSON of each frame in either direction.
//!
//! The consumer callback runs on the connection task's context and must not
//! block it indefinitely; hand long-running work off to its own task.
//!
//! # Example
//!
//! ```rust,no_run
//! use discord_link::{DiscordClient, EventHandlers, GatewayEvent};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handlers = EventHandlers::new()
//!     .on_event(|event| match event {
//!         GatewayEvent::Ready(session) => println!("ready as {}", session.user.username),
//!         GatewayEvent::MessageCreate(msg) => println!("message: {}", msg.content),
//!         _ => {}
//!     });
//!
//! let client = DiscordClient::builder()
//!     .token("bot-token")
//!     .event_handlers(handlers)
//!     .build()?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::models::{CloseCode, Message, MessageDelete};
use crate::session::Session;

/// Reason for a disconnect event.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    /// Human-readable description of why the connection closed.
    pub message: String,
    /// Gateway close code, if the remote supplied one.
    pub code: Option<u16>,
}

impl DisconnectReason {
    /// Create a new disconnect reason with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    /// Create a new disconnect reason with a message and close code.
    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(code) = self.code {
            write!(f, "{} (code: {})", self.message, code)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// Domain events surfaced to the registered consumer.
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// The transport connected; the handshake is still in flight.
    Connected,
    /// Identify acknowledged: a fresh session is established.
    Ready(Session),
    /// Resume acknowledged: the prior session continues.
    Resumed,
    /// A message was created.
    MessageCreate(Message),
    /// A message was edited.
    MessageUpdate(Message),
    /// A message was deleted.
    MessageDelete(MessageDelete),
    /// A dispatch whose event name this client does not recognize. The raw
    /// payload is forwarded untouched, never silently dropped.
    Unknown { name: String, data: JsonValue },
    /// An inbound frame could not be decoded (malformed or over the payload
    /// ceiling). The frame was dropped; the connection continues.
    DecodeError { reason: String },
    /// The connection dropped. Recoverable disconnects are followed by an
    /// automatic reconnect when enabled.
    Disconnected(DisconnectReason),
    /// The gateway closed with a fatal code. Terminal: the session is
    /// cleared and no reconnect will be attempted.
    Fatal(CloseCode),
}

impl GatewayEvent {
    /// Stable name of the event kind, for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::Connected => "connected",
            GatewayEvent::Ready(_) => "ready",
            GatewayEvent::Resumed => "resumed",
            GatewayEvent::MessageCreate(_) => "message_create",
            GatewayEvent::MessageUpdate(_) => "message_update",
            GatewayEvent::MessageDelete(_) => "message_delete",
            GatewayEvent::Unknown { .. } => "unknown",
            GatewayEvent::DecodeError { .. } => "decode_error",
            GatewayEvent::Disconnected(_) => "disconnected",
            GatewayEvent::Fatal(_) => "fatal",
        }
    }
}

/// Type alias for the consumer event callback.
pub type OnEventCallback = Arc<dyn Fn(GatewayEvent) + Send + Sync>;

/// Type alias for the raw-frame debug hooks.
pub type OnFrameCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Event callback registry.
///
/// All handlers are optional; the builder registers only what the consumer
/// needs. Handlers are `Send + Sync` so they can be invoked from the
/// connection task.
#[derive(Clone, Default)]
pub struct EventHandlers {
    /// The single registered consumer callback for domain events.
    pub(crate) on_event: Option<OnEventCallback>,

    /// Debug hook: raw JSON of every inbound frame before parsing.
    pub(crate) on_receive: Option<OnFrameCallback>,

    /// Debug hook: raw JSON of every outbound frame.
    pub(crate) on_send: Option<OnFrameCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_event", &self.on_event.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Create a new empty `EventHandlers` (no callbacks registered).
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the consumer callback for domain events.
    ///
    /// Only one consumer is supported; registering again replaces the
    /// previous callback.
    pub fn on_event(mut self, f: impl Fn(GatewayEvent) + Send + Sync + 'static) -> Self {
        self.on_event = Some(Arc::new(f));
        self
    }

    /// Register a debug hook for every raw inbound frame.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Register a debug hook for every raw outbound frame.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit(&self, event: GatewayEvent) {
        if let Some(cb) = &self.on_event {
            cb(event);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }
}
