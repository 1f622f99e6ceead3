use serde::{Deserialize, Serialize};

/// Gateway operation codes.
///
/// The numeric values are fixed by the wire protocol; `Unknown` preserves
/// codes this client does not recognize so they can be logged instead of
/// failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// [Receive] An event was dispatched.
    Dispatch,
    /// [Send/Receive] Keepalive heartbeat; the server may also request one.
    Heartbeat,
    /// [Send] Starts a new session during the initial handshake.
    Identify,
    /// [Send] Update the client's presence.
    PresenceUpdate,
    /// [Send] Join/leave or move between voice channels.
    VoiceStateUpdate,
    /// [Send] Resume a previous session that was disconnected.
    Resume,
    /// [Receive] The client should reconnect and resume immediately.
    Reconnect,
    /// [Send] Request members of a large guild.
    RequestGuildMembers,
    /// [Receive] The session has been invalidated.
    InvalidSession,
    /// [Receive] Sent immediately after connecting, carries the heartbeat interval.
    Hello,
    /// [Receive] Acknowledges a heartbeat.
    HeartbeatAck,
    /// Any opcode this client does not recognize.
    Unknown(u8),
}

impl Opcode {
    /// Numeric wire value.
    pub fn as_u8(self) -> u8 {
        match self {
            Opcode::Dispatch => 0,
            Opcode::Heartbeat => 1,
            Opcode::Identify => 2,
            Opcode::PresenceUpdate => 3,
            Opcode::VoiceStateUpdate => 4,
            Opcode::Resume => 6,
            Opcode::Reconnect => 7,
            Opcode::RequestGuildMembers => 8,
            Opcode::InvalidSession => 9,
            Opcode::Hello => 10,
            Opcode::HeartbeatAck => 11,
            Opcode::Unknown(op) => op,
        }
    }
}

impl From<u8> for Opcode {
    fn from(op: u8) -> Self {
        match op {
            0 => Opcode::Dispatch,
            1 => Opcode::Heartbeat,
            2 => Opcode::Identify,
            3 => Opcode::PresenceUpdate,
            4 => Opcode::VoiceStateUpdate,
            6 => Opcode::Resume,
            7 => Opcode::Reconnect,
            8 => Opcode::RequestGuildMembers,
            9 => Opcode::InvalidSession,
            10 => Opcode::Hello,
            11 => Opcode::HeartbeatAck,
            other => Opcode::Unknown(other),
        }
    }
}

impl Serialize for Opcode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for Opcode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let op = u8::deserialize(deserializer)?;
        Ok(Opcode::from(op))
    }
}
