//! Connection state machine.
//!
//! The authoritative status of the gateway session. State is owned by the
//! connection task and mutated only through [`StateMachine::transition`];
//! the public handle observes it through an atomic [`StateCell`] mirror.

use std::sync::atomic::{AtomicU8, Ordering};

use log::{debug, warn};

use crate::error::{DiscordLinkError, Result};

/// Lifecycle states of the gateway connection.
///
/// `Disconnected` loops back to `Connecting` on automatic reconnect unless
/// the terminating close code is fatal, in which case the terminal state is
/// `Error` and no further automatic transition occurs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Init,
    Connecting,
    Connected,
    Disconnecting,
    Disconnected,
    Error,
}

impl ConnectionState {
    /// Whether `self -> to` is a legal transition.
    pub fn can_transition(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Init, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnecting)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
                | (Disconnected, Connecting)
                | (Disconnected, Error)
        )
    }

    fn as_u8(self) -> u8 {
        match self {
            ConnectionState::Init => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Disconnecting => 3,
            ConnectionState::Disconnected => 4,
            ConnectionState::Error => 5,
        }
    }

    fn from_u8(value: u8) -> ConnectionState {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            4 => ConnectionState::Disconnected,
            5 => ConnectionState::Error,
            _ => ConnectionState::Init,
        }
    }
}

/// Why the connection is closing (or closed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloseReason {
    /// No close has been requested.
    #[default]
    None,
    /// The previous heartbeat was never acknowledged.
    AckTimeout,
    /// The consumer requested a logout.
    Logout,
    /// The client handle is being destroyed.
    DestroyRequested,
}

impl CloseReason {
    /// Whether this reason suppresses automatic reconnection regardless of
    /// close-code classification.
    pub fn suppresses_reconnect(self) -> bool {
        matches!(self, CloseReason::Logout | CloseReason::DestroyRequested)
    }
}

/// Lock-free mirror of the task-owned state, readable from any context.
#[derive(Debug, Default)]
pub struct StateCell(AtomicU8);

impl StateCell {
    pub fn new(state: ConnectionState) -> Self {
        StateCell(AtomicU8::new(state.as_u8()))
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: ConnectionState) {
        self.0.store(state.as_u8(), Ordering::Release);
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Init
    }
}

/// Task-owned state machine with its observable mirror.
#[derive(Debug)]
pub(crate) struct StateMachine {
    state: ConnectionState,
    cell: std::sync::Arc<StateCell>,
    pub close_reason: CloseReason,
}

impl StateMachine {
    pub fn new(cell: std::sync::Arc<StateCell>) -> Self {
        cell.set(ConnectionState::Init);
        StateMachine {
            state: ConnectionState::Init,
            cell,
            close_reason: CloseReason::None,
        }
    }

    pub fn current(&self) -> ConnectionState {
        self.state
    }

    /// Perform a transition, refusing illegal ones loudly.
    pub fn transition(&mut self, to: ConnectionState) -> Result<()> {
        if !self.state.can_transition(to) {
            warn!("refusing illegal state transition {:?} -> {:?}", self.state, to);
            return Err(DiscordLinkError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        debug!("gateway state {:?} -> {:?}", self.state, to);
        self.state = to;
        self.cell.set(to);
        Ok(())
    }
}
