//! Serialized REST side-channel.
//!
//! All request/response calls against the HTTP API go through one
//! [`RestClient`]. Calls are strictly serialized: the shared response
//! buffer is guarded by an async mutex whose acquisition is bounded by
//! `timeouts.lock_acquire_timeout` and fails loudly instead of
//! deadlocking. Response bodies are streamed into the pipeline-owned
//! buffer, which grows up to a hard ceiling; on success, ownership of the
//! body transfers to the caller.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use log::{debug, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;

use crate::error::{DiscordLinkError, Result};
use crate::models::{GatewayInfo, Message, User};
use crate::timeouts::GatewayTimeouts;

/// Default REST API base.
pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";

/// Default hard ceiling for a buffered response body.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 8 << 20;

const MAX_TRANSPORT_RETRIES: u32 = 3;

/// Classification of an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
}

impl StatusClass {
    /// Classify a status code. Informational and redirect codes are grouped
    /// with client errors: the pipeline never follows redirects itself.
    pub fn of(status: u16) -> StatusClass {
        match status {
            200..=299 => StatusClass::Success,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::ClientError,
        }
    }
}

/// A raw API response. The body buffer is owned by the caller from here on.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Bytes,
}

impl ApiResponse {
    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Enforce the response-buffer ceiling before appending a chunk.
fn check_capacity(current: usize, incoming: usize, limit: usize) -> Result<()> {
    let size = current.saturating_add(incoming);
    if size > limit {
        return Err(DiscordLinkError::PayloadTooLarge { size, limit });
    }
    Ok(())
}

/// Pull a human-readable error message out of an API error body.
fn extract_error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<JsonValue>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "unknown error".to_string()
    } else {
        text.chars().take(200).collect()
    }
}

/// Client for the request/response side-channel API.
///
/// Cloneable; all clones share the same pipeline lock and buffer, so
/// serialization holds across the whole client.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
    /// The shared response buffer. Holding the lock *is* the single-flight
    /// discipline: no two calls interleave on the buffer or the connection.
    buffer: Arc<Mutex<Vec<u8>>>,
    timeouts: GatewayTimeouts,
    max_response_bytes: usize,
}

impl RestClient {
    pub(crate) fn new(
        base_url: String,
        token: String,
        timeouts: GatewayTimeouts,
        max_response_bytes: usize,
    ) -> Result<Self> {
        // Connection pooling keeps TCP handshake overhead off the serial
        // request path.
        let http = reqwest::Client::builder()
            .timeout(timeouts.api_request_timeout)
            .connect_timeout(timeouts.connect_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| DiscordLinkError::Configuration(e.to_string()))?;

        Ok(RestClient {
            base_url,
            token,
            http,
            buffer: Arc::new(Mutex::new(Vec::new())),
            timeouts,
            max_response_bytes,
        })
    }

    /// Issue one API request under the pipeline discipline.
    ///
    /// The request body is serialized before the lock is taken; the
    /// response is streamed into the shared buffer and handed to the
    /// caller on success. Client- and server-error statuses surface as
    /// [`DiscordLinkError::Api`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<ApiResponse> {
        let body_text = match body {
            Some(value) => Some(serde_json::to_string(&value)?),
            None => None,
        };

        // Bounded, fail-loud lock acquisition. A timeout here is a local
        // fault: abort and report, never retry silently.
        let mut guard = match tokio::time::timeout(
            self.timeouts.lock_acquire_timeout,
            self.buffer.lock(),
        )
        .await
        {
            Ok(guard) => guard,
            Err(_) => {
                warn!(
                    "api pipeline lock not acquired within {:?}; aborting {} {}",
                    self.timeouts.lock_acquire_timeout, method, path
                );
                return Err(DiscordLinkError::LockTimeout(
                    self.timeouts.lock_acquire_timeout,
                ));
            }
        };

        let url = format!("{}{}", self.base_url, path);
        let mut retries = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(AUTHORIZATION, format!("Bot {}", self.token));
            if let Some(ref text) = body_text {
                request = request
                    .header(CONTENT_TYPE, "application/json")
                    .body(text.clone());
            }

            debug!("api request {} {} (attempt {})", method, url, retries + 1);

            match request.send().await {
                Ok(mut response) => {
                    let status = response.status().as_u16();

                    // Stream the body into the pipeline-owned buffer,
                    // growable up to the hard ceiling.
                    let buf = &mut *guard;
                    buf.clear();
                    while let Some(chunk) = response.chunk().await? {
                        check_capacity(buf.len(), chunk.len(), self.max_response_bytes)?;
                        buf.extend_from_slice(&chunk);
                    }

                    // Ownership of the body transfers to the caller.
                    let body = Bytes::from(std::mem::take(buf));

                    return match StatusClass::of(status) {
                        StatusClass::Success => Ok(ApiResponse { status, body }),
                        StatusClass::ClientError | StatusClass::ServerError => {
                            let message = extract_error_message(&body);
                            warn!("api error {} on {} {}: {}", status, method, path, message);
                            Err(DiscordLinkError::Api { status, message })
                        }
                    };
                }
                Err(e) if retries < MAX_TRANSPORT_RETRIES && is_retriable(&e) => {
                    retries += 1;
                    warn!(
                        "retriable transport error on {} {} (attempt {}): {}",
                        method, path, retries, e
                    );
                    tokio::time::sleep(Duration::from_millis(100 * u64::from(retries))).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<T> {
        let response = self.request(method, path, body).await?;
        response.json()
    }

    /// GET a resource.
    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None).await
    }

    /// POST a JSON body.
    pub async fn post(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// PATCH a JSON body.
    pub async fn patch(&self, path: &str, body: JsonValue) -> Result<ApiResponse> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// DELETE a resource.
    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, None).await
    }

    // ── Typed endpoints ─────────────────────────────────────────────────

    /// Create a message in a channel.
    pub async fn create_message(&self, channel_id: &str, content: &str) -> Result<Message> {
        self.request_json(
            Method::POST,
            &format!("/channels/{}/messages", channel_id),
            Some(serde_json::json!({ "content": content })),
        )
        .await
    }

    /// Edit an existing message.
    pub async fn edit_message(
        &self,
        channel_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<Message> {
        self.request_json(
            Method::PATCH,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            Some(serde_json::json!({ "content": content })),
        )
        .await
    }

    /// Delete a message.
    pub async fn delete_message(&self, channel_id: &str, message_id: &str) -> Result<()> {
        self.request(
            Method::DELETE,
            &format!("/channels/{}/messages/{}", channel_id, message_id),
            None,
        )
        .await?;
        Ok(())
    }

    /// Show the typing indicator in a channel.
    pub async fn trigger_typing(&self, channel_id: &str) -> Result<()> {
        self.request(
            Method::POST,
            &format!("/channels/{}/typing", channel_id),
            None,
        )
        .await?;
        Ok(())
    }

    /// Fetch the authenticated user.
    pub async fn get_current_user(&self) -> Result<User> {
        self.request_json(Method::GET, "/users/@me", None).await
    }

    /// Discover the gateway WebSocket URL.
    pub async fn get_gateway(&self) -> Result<GatewayInfo> {
        self.request_json(Method::GET, "/gateway", None).await
    }
}

fn is_retriable(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}
