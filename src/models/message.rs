use serde::{Deserialize, Serialize};

use super::user::User;

/// A channel message as delivered by `MESSAGE_CREATE` / `MESSAGE_UPDATE`
/// dispatches and by the REST message endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
}

/// Data payload of a `MESSAGE_DELETE` dispatch. Only identifiers are
/// delivered; the message body is gone by the time the event arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDelete {
    pub id: String,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<String>,
}
