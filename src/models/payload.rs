use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::identify::{Identify, Resume};
use super::opcode::Opcode;

/// A single gateway record, inbound or outbound.
///
/// Every frame on the wire is one of these: an integer opcode, an opaque
/// data payload, and (for dispatch-class records only) a sequence number
/// and an event name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPayload {
    /// Operation code.
    pub op: Opcode,

    /// Opaque event data. `Null` when the opcode carries no payload.
    #[serde(default)]
    pub d: JsonValue,

    /// Sequence number, present on dispatch-class records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,

    /// Event name, present on dispatch-class records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
}

impl GatewayPayload {
    /// Outbound heartbeat echoing the latest known sequence number
    /// (`null` before the first dispatch has been seen).
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        GatewayPayload {
            op: Opcode::Heartbeat,
            d: match last_sequence {
                Some(seq) => JsonValue::from(seq),
                None => JsonValue::Null,
            },
            s: None,
            t: None,
        }
    }

    /// Outbound identify payload starting a fresh session.
    pub fn identify(identify: &Identify) -> crate::error::Result<Self> {
        Ok(GatewayPayload {
            op: Opcode::Identify,
            d: serde_json::to_value(identify)?,
            s: None,
            t: None,
        })
    }

    /// Outbound resume payload re-attaching to a prior session.
    pub fn resume(resume: &Resume) -> crate::error::Result<Self> {
        Ok(GatewayPayload {
            op: Opcode::Resume,
            d: serde_json::to_value(resume)?,
            s: None,
            t: None,
        })
    }

    /// Serialize to the JSON text frame sent over the socket.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
