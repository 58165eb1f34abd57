//! BLE communication module.
//!
//! This module provides the Bluetooth Low Energy plumbing for discovering
//! and driving the LED control board: adapter monitoring, scanning,
//! connection lifecycle, GATT resolution, and the command channel.

pub mod adapter;
pub mod commands;
pub mod connection;
pub mod resolver;
pub mod scanner;
pub mod uuids;

pub use adapter::{AdapterMonitor, AdapterState};
pub use commands::{CommandChannel, GattWriter};
pub use connection::ConnectionManager;
pub use scanner::{BoardScanner, DiscoveredBoard};
pub use uuids::*;
