/// Close codes the gateway attaches to WebSocket close frames.
///
/// The classification into reconnectable and fatal codes drives the
/// automatic-reconnect decision in the connection task: a fatal code
/// terminates the session permanently, anything else (including a close
/// without a code) is retried with resume where possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// The peer closed without supplying a gateway close code.
    NoCode,
    /// 4000: something went wrong on the server side.
    UnknownError,
    /// 4001: the client sent an invalid opcode or payload for an opcode.
    UnknownOpcode,
    /// 4002: the client sent a payload the server could not decode.
    DecodeError,
    /// 4003: the client sent a payload before identifying.
    NotAuthenticated,
    /// 4004: the account token in the identify payload is incorrect.
    AuthenticationFailed,
    /// 4005: the client sent more than one identify payload.
    AlreadyAuthenticated,
    /// 4007: the sequence sent when resuming was invalid.
    InvalidSeq,
    /// 4008: the client is sending payloads too quickly.
    RateLimited,
    /// 4009: the session timed out.
    SessionTimedOut,
    /// 4010: the client sent an invalid shard when identifying.
    InvalidShard,
    /// 4011: the session would handle too many guilds; sharding is required.
    ShardingRequired,
    /// 4012: the client sent an invalid gateway version.
    InvalidApiVersion,
    /// 4013: the client sent an invalid intent bitmask.
    InvalidIntents,
    /// 4014: the client requested an intent it is not allowed to use.
    DisallowedIntents,
    /// Any other close code, preserved verbatim.
    Unknown(u16),
}

impl CloseCode {
    /// Classify a fatal close code: the connection must not be retried and
    /// the session is discarded.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            CloseCode::AuthenticationFailed
                | CloseCode::AlreadyAuthenticated
                | CloseCode::InvalidShard
                | CloseCode::ShardingRequired
                | CloseCode::InvalidApiVersion
                | CloseCode::InvalidIntents
                | CloseCode::DisallowedIntents
        )
    }

    /// Numeric wire value, when one exists.
    pub fn as_u16(self) -> Option<u16> {
        match self {
            CloseCode::NoCode => None,
            CloseCode::UnknownError => Some(4000),
            CloseCode::UnknownOpcode => Some(4001),
            CloseCode::DecodeError => Some(4002),
            CloseCode::NotAuthenticated => Some(4003),
            CloseCode::AuthenticationFailed => Some(4004),
            CloseCode::AlreadyAuthenticated => Some(4005),
            CloseCode::InvalidSeq => Some(4007),
            CloseCode::RateLimited => Some(4008),
            CloseCode::SessionTimedOut => Some(4009),
            CloseCode::InvalidShard => Some(4010),
            CloseCode::ShardingRequired => Some(4011),
            CloseCode::InvalidApiVersion => Some(4012),
            CloseCode::InvalidIntents => Some(4013),
            CloseCode::DisallowedIntents => Some(4014),
            CloseCode::Unknown(code) => Some(code),
        }
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            4000 => CloseCode::UnknownError,
            4001 => CloseCode::UnknownOpcode,
            4002 => CloseCode::DecodeError,
            4003 => CloseCode::NotAuthenticated,
            4004 => CloseCode::AuthenticationFailed,
            4005 => CloseCode::AlreadyAuthenticated,
            4007 => CloseCode::InvalidSeq,
            4008 => CloseCode::RateLimited,
            4009 => CloseCode::SessionTimedOut,
            4010 => CloseCode::InvalidShard,
            4011 => CloseCode::ShardingRequired,
            4012 => CloseCode::InvalidApiVersion,
            4013 => CloseCode::InvalidIntents,
            4014 => CloseCode::DisallowedIntents,
            other => CloseCode::Unknown(other),
        }
    }
}

impl From<Option<u16>> for CloseCode {
    fn from(code: Option<u16>) -> Self {
        match code {
            Some(code) => CloseCode::from(code),
            None => CloseCode::NoCode,
        }
    }
}

impl std::fmt::Display for CloseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.as_u16() {
            Some(code) => write!(f, "{:?} ({})", self, code),
            None => write!(f, "no close code"),
        }
    }
}
