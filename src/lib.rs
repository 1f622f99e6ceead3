//! # discord-link
//!
//! A resilient Discord gateway client. Maintains a persistent,
//! authenticated real-time session over a WebSocket, keeps it alive under
//! the heartbeat/acknowledgement contract, recovers from transient
//! disconnects by resuming the prior session, and exposes a serialized
//! side-channel for REST calls.
//!
//! - Identify/resume handshake with session and sequence tracking
//! - Heartbeat supervision in its own task, with forced reconnect on a
//!   missed acknowledgement
//! - Close-code classification: fatal codes terminate, everything else
//!   reconnects with exponential backoff
//! - Opcode dispatch to a single consumer callback; unknown events are
//!   forwarded, never dropped
//! - Strictly serialized REST pipeline with a bounded, fail-loud lock and
//!   a capped response buffer
//!
//! # Example
//!
//! ```rust,no_run
//! use discord_link::{DiscordClient, EventHandlers, GatewayEvent, Intents};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let handlers = EventHandlers::new().on_event(|event| {
//!     if let GatewayEvent::MessageCreate(msg) = event {
//!         println!("<{}> {}", msg.author.map(|a| a.username).unwrap_or_default(), msg.content);
//!     }
//! });
//!
//! let client = DiscordClient::builder()
//!     .token(std::env::var("DISCORD_TOKEN")?)
//!     .intents(Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT)
//!     .event_handlers(handlers)
//!     .build()?;
//!
//! let gateway = client.connect().await?;
//! gateway.join().await;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
mod connection;
pub mod error;
pub mod events;
mod heartbeat;
pub mod models;
mod session;
pub mod state;
pub mod timeouts;

pub use api::{ApiResponse, RestClient, StatusClass, DEFAULT_API_BASE_URL};
pub use client::{DiscordClient, DiscordClientBuilder, DEFAULT_GATEWAY_URL};
pub use connection::Gateway;
pub use error::{DiscordLinkError, Result};
pub use events::{DisconnectReason, EventHandlers, GatewayEvent};
pub use models::{
    CloseCode, ConnectionOptions, EventName, GatewayInfo, GatewayPayload, Hello, Identify,
    IdentifyProperties, Intents, Message, MessageDelete, Opcode, ReadyData, Resume, User,
};
pub use session::Session;
pub use state::{CloseReason, ConnectionState};
pub use timeouts::GatewayTimeouts;
