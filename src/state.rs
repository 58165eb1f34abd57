//! Connection state machine vocabulary.
//!
//! The lifecycle of the single board session is tracked as a
//! [`ConnectionPhase`]. The coarser [`LinkState`] exposed to callers and the
//! observable [`ControlFlags`] are both derived from it by pure functions,
//! so the presentation layer never owns state of its own.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::ble::adapter::AdapterState;

/// Fine-grained lifecycle phase of the board link.
///
/// Transitions are strictly forward, except that any failure, disconnect,
/// or adapter loss resets the phase to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionPhase {
    /// No scan or session in progress.
    #[default]
    Idle,
    /// Scanning for a board advertising the target service.
    Scanning,
    /// Connecting to the first discovered board.
    Connecting,
    /// Connected; discovering the target service.
    DiscoveringServices,
    /// Service found; locating the target characteristic.
    DiscoveringCharacteristics,
    /// Fully prepared; commands are accepted.
    Ready,
    /// Teardown requested; waiting for the platform to confirm.
    Disconnecting,
}

impl ConnectionPhase {
    /// Check if commands are accepted in this phase.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Check if the phase is part of the seek-and-prepare pipeline.
    pub fn is_seeking(&self) -> bool {
        matches!(
            self,
            Self::Scanning | Self::Connecting | Self::DiscoveringServices
                | Self::DiscoveringCharacteristics
        )
    }
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::DiscoveringServices => write!(f, "Discovering services"),
            Self::DiscoveringCharacteristics => write!(f, "Discovering characteristics"),
            Self::Ready => write!(f, "Ready"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Coarse coordinator state derived from [`ConnectionPhase`].
///
/// The two discovery phases collapse into `Resolving`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LinkState {
    /// No scan or session in progress.
    #[default]
    Idle,
    /// Scanning for the target board.
    Scanning,
    /// Connecting to a discovered board.
    Connecting,
    /// Resolving the target service and characteristic.
    Resolving,
    /// Commands are accepted.
    Ready,
    /// Teardown in progress.
    Disconnecting,
}

impl From<ConnectionPhase> for LinkState {
    fn from(phase: ConnectionPhase) -> Self {
        match phase {
            ConnectionPhase::Idle => Self::Idle,
            ConnectionPhase::Scanning => Self::Scanning,
            ConnectionPhase::Connecting => Self::Connecting,
            ConnectionPhase::DiscoveringServices
            | ConnectionPhase::DiscoveringCharacteristics => Self::Resolving,
            ConnectionPhase::Ready => Self::Ready,
            ConnectionPhase::Disconnecting => Self::Disconnecting,
        }
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Scanning => write!(f, "Scanning"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Resolving => write!(f, "Resolving"),
            Self::Ready => write!(f, "Ready"),
            Self::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Observable flags for the presentation layer.
///
/// Derived deterministically from the adapter state and link state; never
/// stored or mutated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ControlFlags {
    /// A new seek may be started.
    pub can_start_connect: bool,
    /// A seek-connect-resolve cycle is in progress.
    pub seeking_for_board: bool,
    /// The board accepts LED commands.
    pub can_control_led: bool,
}

impl ControlFlags {
    /// Derive the flags for the given adapter and link state.
    pub fn derive(adapter: AdapterState, state: LinkState) -> Self {
        Self {
            can_start_connect: adapter.is_powered_on() && state == LinkState::Idle,
            seeking_for_board: matches!(
                state,
                LinkState::Scanning | LinkState::Connecting | LinkState::Resolving
            ),
            can_control_led: state == LinkState::Ready,
        }
    }
}

/// Shared, observable cell holding the current [`ConnectionPhase`].
///
/// All lifecycle components write through this cell so that every phase
/// transition is logged and broadcast exactly once.
pub struct PhaseCell {
    phase: RwLock<ConnectionPhase>,
    event_tx: broadcast::Sender<ConnectionPhase>,
}

impl PhaseCell {
    /// Create a cell in the `Idle` phase.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(32);

        Self {
            phase: RwLock::new(ConnectionPhase::Idle),
            event_tx,
        }
    }

    /// Get the current phase.
    pub fn get(&self) -> ConnectionPhase {
        *self.phase.read()
    }

    /// Set the phase, logging and broadcasting the transition.
    pub fn set(&self, new_phase: ConnectionPhase) {
        let previous = {
            let mut phase = self.phase.write();
            let previous = *phase;
            *phase = new_phase;
            previous
        };

        if previous != new_phase {
            debug!("Connection phase changed: {} -> {}", previous, new_phase);
            let _ = self.event_tx.send(new_phase);
        }
    }

    /// Subscribe to phase transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionPhase> {
        self.event_tx.subscribe()
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}
