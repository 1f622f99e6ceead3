use serde::{Deserialize, Serialize};

use super::intents::Intents;

/// Static client metadata sent with the identify payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyProperties {
    pub os: String,
    pub browser: String,
    pub device: String,
}

impl Default for IdentifyProperties {
    fn default() -> Self {
        IdentifyProperties {
            os: std::env::consts::OS.to_string(),
            browser: "discord-link".to_string(),
            device: "discord-link".to_string(),
        }
    }
}

/// Handshake payload establishing a fresh session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identify {
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
}

/// Handshake payload re-attaching to a prior session using its id and the
/// last dispatched sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resume {
    pub token: String,
    pub session_id: String,
    pub seq: u64,
}
