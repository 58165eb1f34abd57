//! Typed lifecycle events.
//!
//! The platform delegate-callback pattern of the underlying BLE stack is
//! flattened into one event enum, broadcast to subscribers so the
//! presentation layer is decoupled from transport threading.

use crate::ble::adapter::AdapterState;
use crate::ble::scanner::DiscoveredBoard;
use crate::state::ControlFlags;

/// Event emitted by the [`BoardManager`](crate::BoardManager) on every
/// notable lifecycle transition.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BoardEvent {
    /// The BLE adapter changed power/authorization state.
    AdapterChanged(AdapterState),
    /// A board advertising the target service was discovered.
    BoardDiscovered(DiscoveredBoard),
    /// The connection to the board was established.
    Connected {
        /// Identifier of the connected board.
        identifier: String,
    },
    /// Connecting to (or preparing) the board failed; the link is back to idle.
    ConnectFailed {
        /// Identifier of the board the attempt targeted.
        identifier: String,
        /// Human-readable failure description.
        reason: String,
    },
    /// The board disconnected; the link is back to idle.
    Disconnected {
        /// Identifier of the board that disconnected.
        identifier: String,
        /// Informational reason, when one is known. Never classified.
        reason: Option<String>,
    },
    /// The target service was found on the connected board.
    ServicesResolved {
        /// Identifier of the board being resolved.
        identifier: String,
    },
    /// The target characteristic was found; the board is ready.
    CharacteristicsResolved {
        /// Identifier of the ready board.
        identifier: String,
    },
    /// The derived observable flags changed.
    FlagsChanged(ControlFlags),
}
