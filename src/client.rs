//! Main Discord client with builder pattern.
//!
//! Provides the primary interface for connecting to the gateway and
//! issuing REST calls.

use crate::api::{RestClient, DEFAULT_API_BASE_URL, DEFAULT_MAX_RESPONSE_BYTES};
use crate::connection::{Gateway, GatewayConfig};
use crate::error::{DiscordLinkError, Result};
use crate::events::EventHandlers;
use crate::models::{ConnectionOptions, IdentifyProperties, Intents};
use crate::timeouts::GatewayTimeouts;

/// Default gateway WebSocket URL.
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// Main Discord client.
///
/// Use [`DiscordClientBuilder`] to construct instances with custom
/// configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use discord_link::{DiscordClient, Intents};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DiscordClient::builder()
///     .token("bot-token")
///     .intents(Intents::GUILD_MESSAGES | Intents::MESSAGE_CONTENT)
///     .build()?;
///
/// let gateway = client.connect().await?;
/// client.rest().create_message("123456", "hello from discord-link").await?;
/// gateway.logout().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct DiscordClient {
    token: String,
    intents: Intents,
    properties: IdentifyProperties,
    gateway_url: String,
    rest: RestClient,
    timeouts: GatewayTimeouts,
    options: ConnectionOptions,
    handlers: EventHandlers,
}

impl DiscordClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> DiscordClientBuilder {
        DiscordClientBuilder::new()
    }

    /// Open the gateway connection and return its handle.
    ///
    /// The connection runs in a background task; the handle observes state
    /// and issues control commands. If the initial attempt fails the task
    /// keeps retrying with backoff (when auto-reconnect is enabled).
    pub async fn connect(&self) -> Result<Gateway> {
        Gateway::connect(GatewayConfig {
            gateway_url: self.gateway_url.clone(),
            token: self.token.clone(),
            intents: self.intents,
            properties: self.properties.clone(),
            timeouts: self.timeouts.clone(),
            options: self.options.clone(),
            handlers: self.handlers.clone(),
        })
        .await
    }

    /// The serialized REST side-channel.
    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    /// The configured timeouts.
    pub fn timeouts(&self) -> &GatewayTimeouts {
        &self.timeouts
    }
}

/// Builder for configuring [`DiscordClient`] instances.
pub struct DiscordClientBuilder {
    token: Option<String>,
    intents: Intents,
    properties: IdentifyProperties,
    gateway_url: String,
    api_base_url: String,
    timeouts: GatewayTimeouts,
    options: ConnectionOptions,
    handlers: EventHandlers,
    max_response_bytes: usize,
}

impl DiscordClientBuilder {
    fn new() -> Self {
        Self {
            token: None,
            intents: Intents::GUILD_MESSAGES,
            properties: IdentifyProperties::default(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeouts: GatewayTimeouts::default(),
            options: ConnectionOptions::default(),
            handlers: EventHandlers::default(),
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }

    /// Set the bot token (required).
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the capability bitmask declared in the identify payload.
    pub fn intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    /// Override the client properties sent with identify.
    pub fn properties(mut self, properties: IdentifyProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Override the gateway WebSocket URL.
    pub fn gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    /// Override the REST API base URL.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set comprehensive timeout configuration for all operations.
    pub fn timeouts(mut self, timeouts: GatewayTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Set connection-level options (reconnect policy, payload ceiling).
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Register event handlers (consumer callback and debug hooks).
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.handlers = handlers;
        self
    }

    /// Set the hard ceiling for buffered REST response bodies.
    pub fn max_response_bytes(mut self, limit: usize) -> Self {
        self.max_response_bytes = limit;
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<DiscordClient> {
        let token = self
            .token
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| DiscordLinkError::Configuration("token is required".into()))?;

        let rest = RestClient::new(
            self.api_base_url,
            token.clone(),
            self.timeouts.clone(),
            self.max_response_bytes,
        )?;

        Ok(DiscordClient {
            token,
            intents: self.intents,
            properties: self.properties,
            gateway_url: self.gateway_url,
            rest,
            timeouts: self.timeouts,
            options: self.options,
            handlers: self.handlers,
        })
    }
}
