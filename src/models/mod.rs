//! Data models for the discord-link client library.
//!
//! Wire records for the gateway protocol (payload envelope, opcodes, close
//! codes, handshake bodies) and the payload-shaped value objects delivered
//! to consumers.

pub mod close_code;
pub mod connection_options;
pub mod event_name;
pub mod gateway_info;
pub mod hello;
pub mod identify;
pub mod intents;
pub mod message;
pub mod opcode;
pub mod payload;
pub mod ready;
pub mod user;

pub use close_code::CloseCode;
pub use connection_options::ConnectionOptions;
pub use event_name::EventName;
pub use gateway_info::GatewayInfo;
pub use hello::Hello;
pub use identify::{Identify, IdentifyProperties, Resume};
pub use intents::Intents;
pub use message::{Message, MessageDelete};
pub use opcode::Opcode;
pub use payload::GatewayPayload;
pub use ready::{InvalidSessionData, ReadyData};
pub use user::User;
