use serde::{Deserialize, Serialize};

/// Data payload of the `hello` record: the first inbound record after
/// connecting, carrying the heartbeat interval to use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hello {
    /// Heartbeat interval in milliseconds.
    pub heartbeat_interval: u64,
}
