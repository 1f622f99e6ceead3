/// Dispatch event names this client recognizes.
///
/// Unrecognized names are preserved in `Other` and forwarded to the
/// consumer unchanged; unknown events are never dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventName {
    Ready,
    Resumed,
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    Other(String),
}

impl EventName {
    /// Wire representation of the event name.
    pub fn as_str(&self) -> &str {
        match self {
            EventName::Ready => "READY",
            EventName::Resumed => "RESUMED",
            EventName::MessageCreate => "MESSAGE_CREATE",
            EventName::MessageUpdate => "MESSAGE_UPDATE",
            EventName::MessageDelete => "MESSAGE_DELETE",
            EventName::Other(name) => name,
        }
    }
}

impl From<&str> for EventName {
    fn from(name: &str) -> Self {
        match name {
            "READY" => EventName::Ready,
            "RESUMED" => EventName::Resumed,
            "MESSAGE_CREATE" => EventName::MessageCreate,
            "MESSAGE_UPDATE" => EventName::MessageUpdate,
            "MESSAGE_DELETE" => EventName::MessageDelete,
            other => EventName::Other(other.to_string()),
        }
    }
}
