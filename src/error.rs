//! Error types for the ledboard-ble crate.

use thiserror::Error;

use crate::ble::adapter::AdapterState;

/// The main error type for this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Bluetooth-related error from the underlying BLE library.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Bluetooth is not available or is disabled on this system.
    #[error("Bluetooth not available or disabled")]
    BluetoothUnavailable,

    /// Scanning was requested while the adapter is not powered on.
    #[error("Bluetooth adapter not ready: {state}")]
    AdapterNotReady {
        /// The adapter state that blocked the operation.
        state: AdapterState,
    },

    /// A new scan was requested while a board session is still active.
    #[error("Session already active for board {identifier}")]
    SessionActive {
        /// The identifier of the board the current session belongs to.
        identifier: String,
    },

    /// A command was issued before the board was fully prepared.
    #[error("Board not ready for commands")]
    NotReady,

    /// Failed to establish a connection to the board.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// Description of why the connection failed.
        reason: String,
    },

    /// Service or characteristic discovery did not complete within the
    /// configured resolve timeout.
    #[error("Service resolution timed out for board {identifier}")]
    ResolutionTimedOut {
        /// The identifier of the board being resolved.
        identifier: String,
    },

    /// The target service is not present on the connected board.
    #[error("Service not found: {uuid}")]
    ServiceNotFound {
        /// The UUID of the service that was not found.
        uuid: String,
    },

    /// The target characteristic is not present in the resolved service.
    #[error("Characteristic not found: {uuid}")]
    CharacteristicNotFound {
        /// The UUID of the characteristic that was not found.
        uuid: String,
    },

    /// A textual byte token in a custom payload could not be parsed.
    #[error("Malformed byte token {token:?} at position {position}")]
    MalformedByteToken {
        /// The token that failed to parse.
        token: String,
        /// Zero-based position of the token in the input.
        position: usize,
    },
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
