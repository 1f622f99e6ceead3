//! Heartbeat supervision.
//!
//! The supervisor runs as its own task with a periodic timer armed from the
//! `hello` interval. It never touches the socket: each tick is handed to
//! the connection task through the same command channel every other writer
//! uses, and the connection task decides whether the tick means "send a
//! heartbeat" or "the previous heartbeat was never acknowledged, force a
//! reconnect". Teardown stops the supervisor and awaits its handle so no
//! tick can fire against a socket mid-teardown.

use std::time::Duration;

use log::{debug, trace};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::connection::ConnCmd;

/// Ack bookkeeping for the active heartbeat contract.
///
/// Owned by the connection task; the supervisor task only produces ticks.
#[derive(Debug)]
pub(crate) struct Heartbeater {
    /// Interval from the server hello, immutable until a fresh hello.
    pub interval: Duration,
    /// True from the moment a heartbeat is sent until its ack arrives.
    pub ack_pending: bool,
    /// When the most recent heartbeat was sent.
    pub last_tick: Option<Instant>,
}

impl Heartbeater {
    pub fn new(interval: Duration) -> Self {
        Heartbeater {
            interval,
            ack_pending: false,
            last_tick: None,
        }
    }

    /// Called when a tick fires and a heartbeat is about to be sent.
    pub fn mark_sent(&mut self) {
        self.ack_pending = true;
        self.last_tick = Some(Instant::now());
    }

    /// Called on the heartbeat-acknowledgment opcode. An ack that arrives
    /// late but before the next tick is still valid, so this clears
    /// unconditionally.
    pub fn mark_acked(&mut self) {
        self.ack_pending = false;
    }

    /// Whether the previous heartbeat went unacknowledged for a full
    /// interval, the failure signal that forces a reconnect.
    pub fn missed_ack(&self) -> bool {
        self.ack_pending
    }
}

/// Running supervisor task for one connection epoch.
pub(crate) struct HeartbeatHandle {
    stop_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Spawn a supervisor ticking at `interval`, delivering
    /// [`ConnCmd::HeartbeatTick`] into the connection task.
    ///
    /// `epoch` tags every tick with the connection epoch that armed this
    /// supervisor, so a tick still queued in the channel when the
    /// connection is re-established cannot drive the next epoch's
    /// heartbeat state.
    pub fn spawn(interval: Duration, epoch: u64, cmd_tx: mpsc::Sender<ConnCmd>) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            debug!("heartbeat supervisor armed (interval {:?}, epoch {})", interval, epoch);
            let mut ticker =
                tokio::time::interval_at(Instant::now() + interval, interval);
            loop {
                tokio::select! {
                    biased;

                    _ = &mut stop_rx => {
                        debug!("heartbeat supervisor stopped (epoch {})", epoch);
                        return;
                    }

                    _ = ticker.tick() => {
                        trace!("heartbeat tick (epoch {})", epoch);
                        if cmd_tx.send(ConnCmd::HeartbeatTick { epoch }).await.is_err() {
                            // Connection task is gone; nothing left to do.
                            return;
                        }
                    }
                }
            }
        });
        HeartbeatHandle { stop_tx, task }
    }

    /// Stop the supervisor and await quiescence. Must complete before any
    /// transport teardown begins.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(());
        let _ = self.task.await;
    }
}
