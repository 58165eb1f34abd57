// Allow holding locks across await points - we use parking_lot which is designed for this
#![allow(clippy::await_holding_lock)]
// Allow unusual byte groupings for UUIDs which have standard format
#![allow(clippy::unusual_byte_groupings)]

//! # ledboard-ble
//!
//! A cross-platform Rust library for driving FFE0/FFE1-style serial LED
//! control boards (HM-10 class modules) via Bluetooth Low Energy.
//!
//! The crate plays the BLE central role: it scans for the first peripheral
//! advertising the control service `FFE0`, auto-connects, resolves the
//! writable characteristic `FFE1`, and then accepts discrete
//! fire-and-forget commands. Exactly one board is targeted at a time; any
//! disconnect or failure resets the lifecycle so a new seek can start.
//!
//! ## Features
//!
//! - **Adapter gating**: scanning only starts while the radio is powered on
//! - **Single-target scanning**: first advertisement match wins
//! - **Automatic preparation**: connect and GATT resolution in one step
//! - **Command channel**: on/off codes, a preset sequence, arbitrary bytes
//! - **Typed events + log stream**: ready to render in any UI
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ledboard_ble::{BoardManager, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Create the manager and start seeking the board
//!     let manager = BoardManager::new().await?;
//!     manager.start_seeking().await?;
//!
//!     // Wait for the board to be discovered and prepared
//!     tokio::time::sleep(std::time::Duration::from_secs(5)).await;
//!
//!     if manager.can_control_led() {
//!         manager.led_on().await?;
//!         tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!         manager.led_off().await?;
//!     }
//!
//!     manager.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Platform Notes
//!
//! ### macOS
//! Requires Bluetooth permission. Add `NSBluetoothAlwaysUsageDescription`
//! to your Info.plist for bundled apps.
//!
//! ### Linux
//! Requires BlueZ. User may need to be in the `bluetooth` group.
//!
//! ### Windows
//! Requires Windows 10 or later with Bluetooth LE support.
//!
//! ## Feature Flags
//!
//! - `serde`: Enable serialization/deserialization for the public data types

// Public modules
pub mod ble;
pub mod board_manager;
pub mod error;
pub mod events;
pub mod log;
pub mod payload;
pub mod state;

// Re-exports for convenience
pub use board_manager::{BoardManager, Timeouts};
pub use error::{Error, Result};
pub use events::BoardEvent;
pub use log::{EventLog, LogEntry};
pub use payload::{
    format_payload, parse_byte_tokens, CommandRequest, LED_OFF_PAYLOAD, LED_ON_PAYLOAD,
    PRESET_SEQUENCE,
};
pub use state::{ConnectionPhase, ControlFlags, LinkState};

// Re-export commonly used types from submodules
pub use ble::adapter::{AdapterMonitor, AdapterState};
pub use ble::scanner::{DiscoveredBoard, UNNAMED_DEVICE};
pub use ble::uuids::{
    TargetDescriptor, LED_BOARD, LED_CONTROL_CHARACTERISTIC_UUID, LED_SERVICE_UUID,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_exports() {
        // Verify that key types are exported
        let _ = std::any::TypeId::of::<BoardManager>();
        let _ = std::any::TypeId::of::<Error>();
        let _ = std::any::TypeId::of::<CommandRequest>();
        let _ = std::any::TypeId::of::<BoardEvent>();
        let _ = std::any::TypeId::of::<AdapterState>();
        let _ = std::any::TypeId::of::<ConnectionPhase>();
        let _ = std::any::TypeId::of::<ControlFlags>();
        let _ = std::any::TypeId::of::<DiscoveredBoard>();
    }

    #[test]
    fn test_target_constants() {
        assert_eq!(LED_BOARD.service, LED_SERVICE_UUID);
        assert_eq!(LED_BOARD.characteristic, LED_CONTROL_CHARACTERISTIC_UUID);
        assert_eq!(LED_ON_PAYLOAD, [0x01]);
        assert_eq!(LED_OFF_PAYLOAD, [0x00]);
    }
}
