//! Gateway connection task and the public [`Gateway`] handle.
//!
//! A single background task owns the WebSocket stream and every piece of
//! connection state. All writers (consumer control calls and the heartbeat
//! supervisor) reach the socket through the task's command channel, so a
//! reconnect initiated from one context can never race a send from another.
//! Handles:
//!
//! - Hello/identify/resume handshake and session establishment
//! - Heartbeat contract: periodic send, ack tracking, forced reconnect on
//!   a missed acknowledgment
//! - Opcode dispatch to the session store, heartbeat state, and the event
//!   emitter (unknown events are forwarded, never dropped)
//! - Close-code classification: fatal codes terminate, everything else
//!   reconnects with exponential backoff and resume
//! - Payload ceiling enforcement with surfaced decode-error events

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use log::{debug, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{error::Error as WsError, protocol::Message},
    MaybeTlsStream,
};

use crate::error::{DiscordLinkError, Result};
use crate::events::{DisconnectReason, EventHandlers, GatewayEvent};
use crate::heartbeat::{HeartbeatHandle, Heartbeater};
use crate::models::{
    CloseCode, ConnectionOptions, EventName, GatewayPayload, Hello, Identify,
    IdentifyProperties, Intents, InvalidSessionData, Message as ChannelMessage, MessageDelete,
    Opcode, ReadyData, Resume,
};
use crate::session::{Session, SessionTracker};
use crate::state::{CloseReason, ConnectionState, StateCell, StateMachine};
use crate::timeouts::GatewayTimeouts;

pub(crate) type WebSocketStream =
    tokio_tungstenite::WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Capacity of the command channel into the connection task.
const CMD_CHANNEL_CAPACITY: usize = 64;

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent to the background connection task. Every outbound write
/// originates from one of these or from the task's own frame handling.
pub(crate) enum ConnCmd {
    /// A heartbeat timer tick, handed off from the supervisor task. Ticks
    /// from a superseded connection epoch are ignored.
    HeartbeatTick { epoch: u64 },
    /// Close the session and suppress reconnection.
    Logout { done_tx: oneshot::Sender<()> },
    /// Tear the client down entirely.
    Destroy { done_tx: oneshot::Sender<()> },
}

/// Everything the connection task needs to run, assembled by the client
/// builder.
#[derive(Clone)]
pub(crate) struct GatewayConfig {
    pub gateway_url: String,
    pub token: String,
    pub intents: Intents,
    pub properties: IdentifyProperties,
    pub timeouts: GatewayTimeouts,
    pub options: ConnectionOptions,
    pub handlers: EventHandlers,
}

// ── Gateway (public handle) ─────────────────────────────────────────────────

/// Handle to a running gateway connection.
///
/// Created via [`DiscordClient::connect`](crate::DiscordClient::connect).
/// The connection itself lives in a background task; this handle observes
/// its state and issues control commands.
pub struct Gateway {
    cmd_tx: mpsc::Sender<ConnCmd>,
    state: Arc<StateCell>,
    task: Option<JoinHandle<()>>,
}

impl Gateway {
    /// Spawn the connection task and wait for the initial connection
    /// attempt to finish.
    ///
    /// An initial failure is not fatal: the task keeps running and retries
    /// with backoff when auto-reconnect is enabled.
    pub(crate) async fn connect(config: GatewayConfig) -> Result<Self> {
        let (cmd_tx, cmd_rx) = mpsc::channel(CMD_CHANNEL_CAPACITY);
        let state = Arc::new(StateCell::default());

        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let task = tokio::spawn(connection_task(
            config,
            cmd_rx,
            cmd_tx.clone(),
            state.clone(),
            Some(ready_tx),
        ));

        match ready_rx.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                // The task is still alive and will retry with backoff.
                warn!("initial gateway connection failed: {}", e);
            }
            Err(_) => {
                warn!("connection task exited before signalling readiness");
            }
        }

        Ok(Gateway {
            cmd_tx,
            state,
            task: Some(task),
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Whether a session is currently established.
    pub fn is_connected(&self) -> bool {
        self.state.get() == ConnectionState::Connected
    }

    /// Close the session and suppress automatic reconnection. Resolves once
    /// the transport has been torn down. Safe to call after the connection
    /// has already stopped.
    pub async fn logout(&self) {
        self.control(|done_tx| ConnCmd::Logout { done_tx }).await;
    }

    /// Tear the connection down entirely. Like [`logout`](Self::logout) but
    /// recorded with a distinct close reason.
    pub async fn destroy(&self) {
        self.control(|done_tx| ConnCmd::Destroy { done_tx }).await;
    }

    /// Wait for the connection task to finish (after a fatal close code,
    /// exhausted reconnect attempts, or an explicit logout/destroy).
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    async fn control(&self, make: impl FnOnce(oneshot::Sender<()>) -> ConnCmd) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.cmd_tx.send(make(done_tx)).await.is_err() {
            debug!("control command after connection task exit; nothing to do");
            return;
        }
        let _ = done_rx.await;
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        // Best-effort shutdown signal.
        let (done_tx, _done_rx) = oneshot::channel();
        let _ = self.cmd_tx.try_send(ConnCmd::Destroy { done_tx });
    }
}

// ── Background connection task ──────────────────────────────────────────────

/// Follow-up the frame handler asks of the main loop.
enum PostAction {
    /// Keep reading.
    Continue,
    /// Tear the transport down and let the reconnect policy decide.
    Teardown(DisconnectReason),
}

/// State owned by the connection task, bundled so handlers can borrow it
/// alongside the stream.
struct Driver {
    config: GatewayConfig,
    machine: StateMachine,
    tracker: SessionTracker,
    heartbeater: Option<Heartbeater>,
    hb_handle: Option<HeartbeatHandle>,
    /// Incremented every time a hello arms a fresh supervisor; stale ticks
    /// carry an older epoch and are ignored.
    hb_epoch: u64,
    cmd_tx: mpsc::Sender<ConnCmd>,
    last_close_code: CloseCode,
    reconnect_attempts: u32,
    invalid_session_count: u32,
    shutdown: bool,
    pending_done: Option<oneshot::Sender<()>>,
}

impl Driver {
    /// Stop the heartbeat supervisor and await its quiescence. Required
    /// before any transport teardown so a tick cannot fire mid-teardown.
    async fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.hb_handle.take() {
            handle.stop().await;
        }
        self.heartbeater = None;
    }

    /// Drive the state machine through disconnect, tolerating whichever of
    /// the pre-disconnect states we are currently in.
    fn mark_disconnected(&mut self) {
        match self.machine.current() {
            ConnectionState::Connecting | ConnectionState::Connected => {
                let _ = self.machine.transition(ConnectionState::Disconnecting);
                let _ = self.machine.transition(ConnectionState::Disconnected);
            }
            ConnectionState::Disconnecting => {
                let _ = self.machine.transition(ConnectionState::Disconnected);
            }
            _ => {}
        }
    }

    /// Encode and send one outbound record with the configured send timeout.
    async fn send_payload(
        &self,
        stream: &mut WebSocketStream,
        payload: &GatewayPayload,
    ) -> Result<()> {
        let json = payload.to_json()?;
        self.config.handlers.emit_send(&json);
        let send = stream.send(Message::Text(json.into()));
        if GatewayTimeouts::is_no_timeout(self.config.timeouts.send_timeout) {
            send.await
                .map_err(|e| DiscordLinkError::WebSocket(format!("failed to send frame: {}", e)))
        } else {
            match tokio::time::timeout(self.config.timeouts.send_timeout, send).await {
                Ok(result) => result.map_err(|e| {
                    DiscordLinkError::WebSocket(format!("failed to send frame: {}", e))
                }),
                Err(_) => Err(DiscordLinkError::Timeout(format!(
                    "frame send timeout ({:?})",
                    self.config.timeouts.send_timeout
                ))),
            }
        }
    }

    /// Identify-or-resume decision, evaluated once per connect attempt: a
    /// retained session id means resume, anything else means identify.
    async fn send_handshake(&mut self, stream: &mut WebSocketStream) -> Result<()> {
        let payload = match self.tracker.session_id() {
            Some(session_id) => {
                let seq = self.tracker.last_sequence().unwrap_or(0);
                info!("resuming session {} from seq {}", session_id, seq);
                GatewayPayload::resume(&Resume {
                    token: self.config.token.clone(),
                    session_id: session_id.to_string(),
                    seq,
                })?
            }
            None => {
                info!("identifying with a fresh session");
                GatewayPayload::identify(&Identify {
                    token: self.config.token.clone(),
                    intents: self.config.intents,
                    properties: self.config.properties.clone(),
                })?
            }
        };
        self.send_payload(stream, &payload).await
    }

    /// Send a heartbeat frame carrying the current sequence number.
    async fn send_heartbeat(&mut self, stream: &mut WebSocketStream) -> Result<()> {
        let payload = GatewayPayload::heartbeat(self.tracker.last_sequence());
        self.send_payload(stream, &payload).await
    }

    /// Handle one heartbeat tick handed off from the supervisor.
    ///
    /// Returns `Teardown` when the previous heartbeat was never
    /// acknowledged: the protocol failure that forces a reconnect (with
    /// resume, since the session is retained).
    async fn handle_tick(
        &mut self,
        stream: &mut WebSocketStream,
        epoch: u64,
    ) -> Result<PostAction> {
        if epoch != self.hb_epoch {
            debug!("ignoring stale heartbeat tick (epoch {} < {})", epoch, self.hb_epoch);
            return Ok(PostAction::Continue);
        }
        let Some(heartbeater) = self.heartbeater.as_mut() else {
            return Ok(PostAction::Continue);
        };

        if heartbeater.missed_ack() {
            warn!(
                "no heartbeat ack within {:?} (last sent {:?} ago); forcing reconnect",
                heartbeater.interval,
                heartbeater.last_tick.map(|t| t.elapsed()),
            );
            self.machine.close_reason = CloseReason::AckTimeout;
            self.stop_heartbeat().await;
            return Ok(PostAction::Teardown(DisconnectReason::new(
                "heartbeat ack timeout",
            )));
        }

        self.send_heartbeat(stream).await?;
        if let Some(heartbeater) = self.heartbeater.as_mut() {
            heartbeater.mark_sent();
        }
        Ok(PostAction::Continue)
    }

    /// Route one decoded inbound record by opcode.
    async fn handle_payload(
        &mut self,
        stream: &mut WebSocketStream,
        payload: GatewayPayload,
    ) -> Result<PostAction> {
        match payload.op {
            Opcode::Dispatch => {
                if let Some(seq) = payload.s {
                    self.tracker.observe_sequence(seq);
                }
                self.handle_dispatch(payload);
                Ok(PostAction::Continue)
            }

            Opcode::Heartbeat => {
                // The remote may request an out-of-cycle heartbeat.
                debug!("out-of-cycle heartbeat requested by gateway");
                self.send_heartbeat(stream).await?;
                Ok(PostAction::Continue)
            }

            Opcode::Hello => {
                let hello: Hello = match serde_json::from_value(payload.d) {
                    Ok(hello) => hello,
                    Err(e) => {
                        self.config.handlers.emit(GatewayEvent::DecodeError {
                            reason: format!("malformed hello payload: {}", e),
                        });
                        return Ok(PostAction::Continue);
                    }
                };
                let interval = Duration::from_millis(hello.heartbeat_interval);
                info!("hello received, heartbeat interval {:?}", interval);

                // A fresh hello renegotiates the interval: replace any
                // running supervisor before arming the new one.
                self.stop_heartbeat().await;
                self.hb_epoch += 1;
                self.heartbeater = Some(Heartbeater::new(interval));
                self.hb_handle = Some(HeartbeatHandle::spawn(
                    interval,
                    self.hb_epoch,
                    self.cmd_tx.clone(),
                ));

                self.send_handshake(stream).await?;
                Ok(PostAction::Continue)
            }

            Opcode::HeartbeatAck => {
                if let Some(heartbeater) = self.heartbeater.as_mut() {
                    heartbeater.mark_acked();
                }
                Ok(PostAction::Continue)
            }

            Opcode::InvalidSession => {
                let resumable = serde_json::from_value::<InvalidSessionData>(payload.d)
                    .map(|d| d.resumable)
                    .unwrap_or(false);
                warn!("session invalidated by gateway (resumable: {})", resumable);
                if !resumable {
                    self.tracker.clear();
                }
                // Short jittered backoff before re-handshaking avoids the
                // immediate-reidentify penalty.
                self.invalid_session_count += 1;
                let backoff = jitter_backoff(
                    Duration::from_millis(self.config.options.resume_backoff_ms),
                    self.tracker.session_id().unwrap_or("fresh"),
                    self.invalid_session_count,
                );
                debug!("re-handshaking after {:?}", backoff);
                tokio::time::sleep(backoff).await;
                self.send_handshake(stream).await?;
                Ok(PostAction::Continue)
            }

            Opcode::Reconnect => {
                info!("reconnect requested by gateway");
                self.stop_heartbeat().await;
                Ok(PostAction::Teardown(DisconnectReason::new(
                    "reconnect requested by gateway",
                )))
            }

            Opcode::Identify
            | Opcode::PresenceUpdate
            | Opcode::VoiceStateUpdate
            | Opcode::Resume
            | Opcode::RequestGuildMembers
            | Opcode::Unknown(_) => {
                warn!("ignoring unexpected opcode {}", payload.op.as_u8());
                Ok(PostAction::Continue)
            }
        }
    }

    /// Handle a dispatch-class record: update the session store for
    /// recognized events, then forward everything to the consumer.
    fn handle_dispatch(&mut self, payload: GatewayPayload) {
        let name = payload.t.unwrap_or_default();
        let handlers = self.config.handlers.clone();

        match EventName::from(name.as_str()) {
            EventName::Ready => match serde_json::from_value::<ReadyData>(payload.d) {
                Ok(ready) => {
                    info!("session {} established for {}", ready.session_id, ready.user.username);
                    let session = Session {
                        session_id: ready.session_id,
                        user: ready.user,
                    };
                    self.tracker.establish(session.clone());
                    let _ = self.machine.transition(ConnectionState::Connected);
                    handlers.emit(GatewayEvent::Ready(session));
                }
                Err(e) => handlers.emit(GatewayEvent::DecodeError {
                    reason: format!("malformed READY payload: {}", e),
                }),
            },

            EventName::Resumed => {
                info!("session resumed");
                let _ = self.machine.transition(ConnectionState::Connected);
                handlers.emit(GatewayEvent::Resumed);
            }

            EventName::MessageCreate => {
                match serde_json::from_value::<ChannelMessage>(payload.d) {
                    Ok(message) => handlers.emit(GatewayEvent::MessageCreate(message)),
                    Err(e) => handlers.emit(GatewayEvent::DecodeError {
                        reason: format!("malformed MESSAGE_CREATE payload: {}", e),
                    }),
                }
            }

            EventName::MessageUpdate => {
                match serde_json::from_value::<ChannelMessage>(payload.d) {
                    Ok(message) => handlers.emit(GatewayEvent::MessageUpdate(message)),
                    Err(e) => handlers.emit(GatewayEvent::DecodeError {
                        reason: format!("malformed MESSAGE_UPDATE payload: {}", e),
                    }),
                }
            }

            EventName::MessageDelete => {
                match serde_json::from_value::<MessageDelete>(payload.d) {
                    Ok(delete) => handlers.emit(GatewayEvent::MessageDelete(delete)),
                    Err(e) => handlers.emit(GatewayEvent::DecodeError {
                        reason: format!("malformed MESSAGE_DELETE payload: {}", e),
                    }),
                }
            }

            // Unrecognized events are forwarded as-is, never dropped.
            EventName::Other(other) => {
                debug!("forwarding unrecognized event {}", other);
                handlers.emit(GatewayEvent::Unknown {
                    name: other,
                    data: payload.d,
                });
            }
        }
    }

    /// Handle one decoded text frame. Decode failures and ceiling
    /// violations surface as decode-error events; the connection continues.
    async fn handle_text(
        &mut self,
        stream: &mut WebSocketStream,
        text: &str,
    ) -> Result<PostAction> {
        if text.len() > self.config.options.max_payload_bytes {
            warn!(
                "dropping oversized payload ({} bytes > {} bytes)",
                text.len(),
                self.config.options.max_payload_bytes
            );
            self.config.handlers.emit(GatewayEvent::DecodeError {
                reason: format!(
                    "payload too large ({} bytes > {} bytes)",
                    text.len(),
                    self.config.options.max_payload_bytes
                ),
            });
            return Ok(PostAction::Continue);
        }

        self.config.handlers.emit_receive(text);
        match serde_json::from_str::<GatewayPayload>(text) {
            Ok(payload) => self.handle_payload(stream, payload).await,
            Err(e) => {
                warn!("dropping malformed payload: {}", e);
                self.config.handlers.emit(GatewayEvent::DecodeError {
                    reason: format!("malformed payload: {}", e),
                });
                Ok(PostAction::Continue)
            }
        }
    }
}

/// Establish the WebSocket connection with the configured connect timeout.
async fn establish_ws(config: &GatewayConfig) -> Result<WebSocketStream> {
    debug!("connecting to gateway at {}", config.gateway_url);

    let connect = connect_async(config.gateway_url.as_str());
    let connect_result = if GatewayTimeouts::is_no_timeout(config.timeouts.connect_timeout) {
        Ok(connect.await)
    } else {
        tokio::time::timeout(config.timeouts.connect_timeout, connect).await
    };

    match connect_result {
        Ok(Ok((stream, _response))) => Ok(stream),
        Ok(Err(WsError::Http(response))) => {
            let status = response.status();
            let message = match status.as_u16() {
                401 | 403 => format!("gateway rejected credentials (HTTP {})", status),
                code => format!("gateway HTTP error: {}", code),
            };
            if status.as_u16() == 401 || status.as_u16() == 403 {
                Err(DiscordLinkError::Authentication(message))
            } else {
                Err(DiscordLinkError::WebSocket(message))
            }
        }
        Ok(Err(e)) => Err(DiscordLinkError::WebSocket(format!("connection failed: {}", e))),
        Err(_) => Err(DiscordLinkError::Timeout(format!(
            "connection timeout ({:?})",
            config.timeouts.connect_timeout
        ))),
    }
}

/// Deterministic jitter for the invalid-session backoff: 1x–5x the base,
/// derived from the session key and attempt counter so retries spread out
/// without an RNG dependency.
fn jitter_backoff(base: Duration, key: &str, attempt: u32) -> Duration {
    let base_ms = (base.as_millis() as u64).max(1);
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    attempt.hash(&mut hasher);
    let extra = hasher.finish() % (4 * base_ms + 1);
    Duration::from_millis(base_ms + extra)
}

/// The main background task owning the WebSocket stream and all connection
/// state.
///
/// Lifecycle:
/// 1. Establish the transport (signalling the initial result to `connect`)
/// 2. Event loop: read frames + process commands; hello arms the heartbeat
///    supervisor and triggers identify/resume
/// 3. On disconnect: classify the close code; fatal codes terminate with a
///    cleared session, everything else reconnects with exponential backoff
///    and resumes where possible
async fn connection_task(
    config: GatewayConfig,
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
    cmd_tx: mpsc::Sender<ConnCmd>,
    state_cell: Arc<StateCell>,
    ready_tx: Option<oneshot::Sender<Result<()>>>,
) {
    let mut driver = Driver {
        machine: StateMachine::new(state_cell),
        tracker: SessionTracker::new(),
        heartbeater: None,
        hb_handle: None,
        hb_epoch: 0,
        cmd_tx,
        last_close_code: CloseCode::NoCode,
        reconnect_attempts: 0,
        invalid_session_count: 0,
        shutdown: false,
        pending_done: None,
        config,
    };
    let mut ws: Option<WebSocketStream> = None;

    // Initial connection attempt; failure is reported but not fatal.
    let _ = driver.machine.transition(ConnectionState::Connecting);
    match establish_ws(&driver.config).await {
        Ok(stream) => {
            ws = Some(stream);
            driver.config.handlers.emit(GatewayEvent::Connected);
            if let Some(tx) = ready_tx {
                let _ = tx.send(Ok(()));
            }
        }
        Err(e) => {
            driver.mark_disconnected();
            if let Some(tx) = ready_tx {
                let _ = tx.send(Err(e));
            }
        }
    }

    loop {
        if driver.shutdown {
            driver.stop_heartbeat().await;
            if let Some(mut stream) = ws.take() {
                let _ = stream.close(None).await;
            }
            driver.mark_disconnected();
            let reason = match driver.machine.close_reason {
                CloseReason::Logout => "logout requested",
                CloseReason::DestroyRequested => "client destroyed",
                _ => "connection task stopped",
            };
            driver
                .config
                .handlers
                .emit(GatewayEvent::Disconnected(DisconnectReason::new(reason)));
            if let Some(done) = driver.pending_done.take() {
                let _ = done.send(());
            }
            info!("gateway connection task stopped ({})", reason);
            return;
        }

        if let Some(ref mut stream) = ws {
            tokio::select! {
                biased;

                // Commands: control calls and heartbeat ticks.
                cmd = cmd_rx.recv() => match cmd {
                    Some(ConnCmd::HeartbeatTick { epoch }) => {
                        match driver.handle_tick(stream, epoch).await {
                            Ok(PostAction::Continue) => {}
                            Ok(PostAction::Teardown(reason)) => {
                                driver.stop_heartbeat().await;
                                let _ = stream.close(None).await;
                                ws = None;
                                driver.mark_disconnected();
                                driver.config.handlers.emit(GatewayEvent::Disconnected(reason));
                            }
                            Err(e) => {
                                warn!("heartbeat send failed: {}", e);
                                driver.stop_heartbeat().await;
                                ws = None;
                                driver.mark_disconnected();
                                driver.config.handlers.emit(GatewayEvent::Disconnected(
                                    DisconnectReason::new(format!("heartbeat send failed: {}", e)),
                                ));
                            }
                        }
                    }
                    Some(ConnCmd::Logout { done_tx }) => {
                        driver.machine.close_reason = CloseReason::Logout;
                        driver.tracker.clear();
                        driver.pending_done = Some(done_tx);
                        driver.shutdown = true;
                    }
                    Some(ConnCmd::Destroy { done_tx }) => {
                        driver.machine.close_reason = CloseReason::DestroyRequested;
                        driver.pending_done = Some(done_tx);
                        driver.shutdown = true;
                    }
                    None => {
                        // All handles dropped.
                        driver.machine.close_reason = CloseReason::DestroyRequested;
                        driver.shutdown = true;
                    }
                },

                // Inbound frames.
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        match driver.handle_text(stream, text.as_str()).await {
                            Ok(PostAction::Continue) => {}
                            Ok(PostAction::Teardown(reason)) => {
                                driver.stop_heartbeat().await;
                                let _ = stream.close(None).await;
                                ws = None;
                                driver.mark_disconnected();
                                driver.config.handlers.emit(GatewayEvent::Disconnected(reason));
                            }
                            Err(e) => {
                                warn!("frame handling failed: {}", e);
                                driver.stop_heartbeat().await;
                                ws = None;
                                driver.mark_disconnected();
                                driver.config.handlers.emit(GatewayEvent::Disconnected(
                                    DisconnectReason::new(format!("frame handling failed: {}", e)),
                                ));
                            }
                        }
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // The gateway speaks JSON text; a binary frame here is
                        // either an oversized blob or something we cannot decode.
                        if data.len() > driver.config.options.max_payload_bytes {
                            driver.config.handlers.emit(GatewayEvent::DecodeError {
                                reason: format!(
                                    "payload too large ({} bytes > {} bytes)",
                                    data.len(),
                                    driver.config.options.max_payload_bytes
                                ),
                            });
                        } else {
                            match std::str::from_utf8(&data) {
                                Ok(text) => {
                                    let text = text.to_string();
                                    match driver.handle_text(stream, &text).await {
                                        Ok(PostAction::Continue) => {}
                                        Ok(PostAction::Teardown(reason)) => {
                                            driver.stop_heartbeat().await;
                                            let _ = stream.close(None).await;
                                            ws = None;
                                            driver.mark_disconnected();
                                            driver.config.handlers.emit(GatewayEvent::Disconnected(reason));
                                        }
                                        Err(e) => {
                                            warn!("frame handling failed: {}", e);
                                            driver.stop_heartbeat().await;
                                            ws = None;
                                            driver.mark_disconnected();
                                            driver.config.handlers.emit(GatewayEvent::Disconnected(
                                                DisconnectReason::new(format!("frame handling failed: {}", e)),
                                            ));
                                        }
                                    }
                                }
                                Err(e) => {
                                    driver.config.handlers.emit(GatewayEvent::DecodeError {
                                        reason: format!("binary frame is not valid UTF-8: {}", e),
                                    });
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = stream.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                    Some(Ok(Message::Close(close_frame))) => {
                        let code = close_frame.as_ref().map(|f| u16::from(f.code));
                        driver.last_close_code = CloseCode::from(code);
                        let message = match close_frame {
                            Some(f) if !f.reason.is_empty() => f.reason.to_string(),
                            _ => "connection closed by gateway".to_string(),
                        };
                        info!("gateway closed: {} ({})", message, driver.last_close_code);

                        driver.stop_heartbeat().await;
                        let _ = stream.close(None).await;
                        ws = None;
                        driver.mark_disconnected();
                        driver.config.handlers.emit(GatewayEvent::Disconnected(
                            DisconnectReason {
                                message,
                                code,
                            },
                        ));
                    }
                    Some(Err(e)) => {
                        warn!("websocket error: {}", e);
                        driver.stop_heartbeat().await;
                        ws = None;
                        driver.mark_disconnected();
                        driver.config.handlers.emit(GatewayEvent::Disconnected(
                            DisconnectReason::new(format!("websocket error: {}", e)),
                        ));
                    }
                    None => {
                        driver.stop_heartbeat().await;
                        ws = None;
                        driver.mark_disconnected();
                        driver.config.handlers.emit(GatewayEvent::Disconnected(
                            DisconnectReason::new("websocket stream ended"),
                        ));
                    }
                },
            }
        } else {
            // ── Not connected: decide whether and when to reconnect ──────

            if driver.machine.close_reason.suppresses_reconnect() {
                driver.shutdown = true;
                continue;
            }

            if driver.last_close_code.is_fatal() {
                warn!(
                    "fatal close code {}; session cleared, not reconnecting",
                    driver.last_close_code
                );
                driver.tracker.clear();
                let _ = driver.machine.transition(ConnectionState::Error);
                driver
                    .config
                    .handlers
                    .emit(GatewayEvent::Fatal(driver.last_close_code));
                return;
            }

            if !driver.config.options.auto_reconnect {
                info!("auto-reconnect disabled; connection task stopping");
                return;
            }

            if let Some(max) = driver.config.options.max_reconnect_attempts {
                if driver.reconnect_attempts >= max {
                    warn!("max reconnection attempts ({}) reached", max);
                    let _ = driver.machine.transition(ConnectionState::Error);
                    return;
                }
            }

            let attempt = driver.reconnect_attempts;
            driver.reconnect_attempts += 1;
            let delay = driver.config.options.reconnect_delay_for(attempt);
            info!("reconnecting in {:?} (attempt {})", delay, attempt + 1);

            // Wait out the backoff, but react to control commands at once.
            let sleep = tokio::time::sleep(delay);
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    biased;
                    cmd = cmd_rx.recv() => match cmd {
                        Some(ConnCmd::HeartbeatTick { .. }) => {} // stale, ignore
                        Some(ConnCmd::Logout { done_tx }) => {
                            driver.machine.close_reason = CloseReason::Logout;
                            driver.tracker.clear();
                            driver.pending_done = Some(done_tx);
                            driver.shutdown = true;
                            break;
                        }
                        Some(ConnCmd::Destroy { done_tx }) => {
                            driver.machine.close_reason = CloseReason::DestroyRequested;
                            driver.pending_done = Some(done_tx);
                            driver.shutdown = true;
                            break;
                        }
                        None => {
                            driver.machine.close_reason = CloseReason::DestroyRequested;
                            driver.shutdown = true;
                            break;
                        }
                    },
                    _ = &mut sleep => break,
                }
            }
            if driver.shutdown {
                continue;
            }

            let _ = driver.machine.transition(ConnectionState::Connecting);
            match establish_ws(&driver.config).await {
                Ok(stream) => {
                    info!("reconnection successful");
                    driver.reconnect_attempts = 0;
                    driver.last_close_code = CloseCode::NoCode;
                    driver.machine.close_reason = CloseReason::None;
                    ws = Some(stream);
                    driver.config.handlers.emit(GatewayEvent::Connected);
                }
                Err(e) => {
                    warn!("reconnection attempt {} failed: {}", attempt + 1, e);
                    driver.mark_disconnected();
                }
            }
        }
    }
}
