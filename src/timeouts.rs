//! Timeout configuration for gateway and REST operations.

use std::time::Duration;

/// Timeout configuration for all client operations.
///
/// # Examples
///
/// ```rust
/// use discord_link::GatewayTimeouts;
/// use std::time::Duration;
///
/// // Use defaults (recommended for most cases)
/// let timeouts = GatewayTimeouts::default();
///
/// // Custom timeouts for high-latency environments
/// let timeouts = GatewayTimeouts::builder()
///     .connect_timeout(Duration::from_secs(60))
///     .api_request_timeout(Duration::from_secs(30))
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct GatewayTimeouts {
    /// Timeout for establishing the WebSocket connection (TCP + TLS + upgrade).
    /// Default: 10 seconds.
    pub connect_timeout: Duration,

    /// Timeout for a single outbound gateway frame write.
    /// Default: 10 seconds.
    pub send_timeout: Duration,

    /// Timeout for one REST request including the streamed response body.
    /// Default: 15 seconds.
    pub api_request_timeout: Duration,

    /// Bounded wait for the REST pipeline lock. Expiry aborts the call with
    /// a loud error instead of deadlocking. Default: 10 seconds.
    pub lock_acquire_timeout: Duration,
}

impl Default for GatewayTimeouts {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(10),
            api_request_timeout: Duration::from_secs(15),
            lock_acquire_timeout: Duration::from_secs(10),
        }
    }
}

impl GatewayTimeouts {
    /// Create a new builder for custom timeout configuration.
    pub fn builder() -> GatewayTimeoutsBuilder {
        GatewayTimeoutsBuilder::new()
    }

    /// Timeouts optimized for fast local development and tests.
    pub fn fast() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            send_timeout: Duration::from_secs(2),
            api_request_timeout: Duration::from_secs(5),
            lock_acquire_timeout: Duration::from_secs(2),
        }
    }

    /// Timeouts optimized for high-latency or unreliable networks.
    pub fn relaxed() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(30),
            api_request_timeout: Duration::from_secs(60),
            lock_acquire_timeout: Duration::from_secs(30),
        }
    }

    /// Check if a duration represents "no timeout" (zero or absurdly large).
    pub fn is_no_timeout(duration: Duration) -> bool {
        duration.is_zero() || duration > Duration::from_secs(86400 * 365)
    }
}

/// Builder for creating custom [`GatewayTimeouts`] configurations.
#[derive(Debug, Clone)]
pub struct GatewayTimeoutsBuilder {
    timeouts: GatewayTimeouts,
}

impl GatewayTimeoutsBuilder {
    fn new() -> Self {
        Self {
            timeouts: GatewayTimeouts::default(),
        }
    }

    /// Set the WebSocket connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.connect_timeout = timeout;
        self
    }

    /// Set the outbound frame write timeout.
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.send_timeout = timeout;
        self
    }

    /// Set the REST request timeout.
    pub fn api_request_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.api_request_timeout = timeout;
        self
    }

    /// Set the bounded wait for the REST pipeline lock.
    pub fn lock_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.timeouts.lock_acquire_timeout = timeout;
        self
    }

    /// Build the timeout configuration.
    pub fn build(self) -> GatewayTimeouts {
        self.timeouts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts() {
        let timeouts = GatewayTimeouts::default();
        assert_eq!(timeouts.connect_timeout, Duration::from_secs(10));
        assert_eq!(timeouts.api_request_timeout, Duration::from_secs(15));
        assert_eq!(timeouts.lock_acquire_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_builder() {
        let timeouts = GatewayTimeouts::builder()
            .connect_timeout(Duration::from_secs(60))
            .lock_acquire_timeout(Duration::from_secs(1))
            .build();
        assert_eq!(timeouts.connect_timeout, Duration::from_secs(60));
        assert_eq!(timeouts.lock_acquire_timeout, Duration::from_secs(1));
        assert_eq!(timeouts.send_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_fast_preset() {
        let timeouts = GatewayTimeouts::fast();
        assert!(timeouts.connect_timeout <= Duration::from_secs(5));
    }

    #[test]
    fn test_is_no_timeout() {
        assert!(GatewayTimeouts::is_no_timeout(Duration::ZERO));
        assert!(!GatewayTimeouts::is_no_timeout(Duration::from_secs(1)));
    }
}
