use serde::{Deserialize, Serialize};

/// Connection-level options for the gateway client.
///
/// These control automatic reconnection, backoff timing, the invalid-session
/// resume backoff, and the inbound payload ceiling. Separate from
/// [`GatewayTimeouts`](crate::timeouts::GatewayTimeouts), which bound
/// individual operations.
///
/// # Example
///
/// ```rust
/// use discord_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_auto_reconnect(true)
///     .with_reconnect_delay_ms(2000)
///     .with_max_reconnect_attempts(Some(10));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Reconnect automatically after a recoverable disconnect.
    /// Default: true. Fatal close codes always suppress reconnection.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Initial delay in milliseconds between reconnection attempts.
    /// Default: 1000ms. Uses exponential backoff up to `max_reconnect_delay_ms`.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Maximum delay between reconnection attempts.
    /// Default: 30000ms.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Maximum number of reconnection attempts before giving up.
    /// Default: None (retry forever). Some(0) disables reconnection entirely.
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,

    /// Hard ceiling for a single reassembled inbound payload. Payloads over
    /// this limit are dropped with a surfaced decode-error event instead of
    /// being processed. Default: 8 MiB.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Base backoff in milliseconds before re-handshaking after an
    /// invalid-session record. The actual wait is jittered. Default: 1000ms.
    #[serde(default = "default_resume_backoff_ms")]
    pub resume_backoff_ms: u64,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30000
}

fn default_max_payload_bytes() -> usize {
    8 << 20
}

fn default_resume_backoff_ms() -> u64 {
    1000
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30000,
            max_reconnect_attempts: None,
            max_payload_bytes: 8 << 20,
            resume_backoff_ms: 1000,
        }
    }
}

impl ConnectionOptions {
    /// Create new connection options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect after recoverable disconnects.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the initial delay between reconnection attempts (in milliseconds).
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    /// Set the maximum delay between reconnection attempts (in milliseconds).
    pub fn with_max_reconnect_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_reconnect_delay_ms = max_delay_ms;
        self
    }

    /// Set the maximum number of reconnection attempts.
    /// Pass None for infinite retries, Some(0) to disable reconnection.
    pub fn with_max_reconnect_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Set the hard ceiling for a single inbound payload.
    pub fn with_max_payload_bytes(mut self, limit: usize) -> Self {
        self.max_payload_bytes = limit;
        self
    }

    /// Set the base backoff before re-handshaking after invalid-session.
    pub fn with_resume_backoff_ms(mut self, backoff_ms: u64) -> Self {
        self.resume_backoff_ms = backoff_ms;
        self
    }

    /// Delay before reconnection attempt number `attempt` (0-based),
    /// exponential with a cap.
    pub(crate) fn reconnect_delay_for(&self, attempt: u32) -> std::time::Duration {
        let delay = self
            .reconnect_delay_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.max_reconnect_delay_ms);
        std::time::Duration::from_millis(delay)
    }
}
