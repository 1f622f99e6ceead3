use serde::{Deserialize, Serialize};

/// Response of the gateway discovery endpoint: the WebSocket URL clients
/// should connect to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub url: String,
}
