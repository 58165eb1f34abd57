//! BLE connection management.
//!
//! Owns the connect/disconnect lifecycle for the single target board.
//! Connecting is a single bounded attempt; there is no retry or backoff
//! beyond what the platform stack provides.

use btleplug::api::Peripheral as _;
use btleplug::platform::Peripheral;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::state::{ConnectionPhase, PhaseCell};

/// Manages the connection to one board.
pub struct ConnectionManager {
    /// The peripheral to manage.
    peripheral: Peripheral,
    /// Shared lifecycle phase.
    phase: Arc<PhaseCell>,
    /// Upper bound for one connect attempt.
    connect_timeout: Duration,
}

impl ConnectionManager {
    /// Create a new connection manager for a peripheral.
    pub fn new(peripheral: Peripheral, phase: Arc<PhaseCell>, connect_timeout: Duration) -> Self {
        Self {
            peripheral,
            phase,
            connect_timeout,
        }
    }

    /// Get the peripheral.
    pub fn peripheral(&self) -> &Peripheral {
        &self.peripheral
    }

    /// Check if connected at the BLE level.
    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    /// Attempt to connect to the board.
    ///
    /// Exactly one outcome follows: `Ok(())` leaves the phase at
    /// `Connecting` for the caller to advance into resolution; any failure
    /// resets the phase to `Idle` and returns
    /// [`Error::ConnectionFailed`].
    pub async fn connect(&self) -> Result<()> {
        self.phase.set(ConnectionPhase::Connecting);

        if self.is_connected().await {
            info!("Peripheral already connected at BLE level");
            return Ok(());
        }

        debug!(
            "Connecting to {} (timeout {:?})",
            self.peripheral.id(),
            self.connect_timeout
        );

        match timeout(self.connect_timeout, self.peripheral.connect()).await {
            Ok(Ok(())) => {
                info!("Connected to {}", self.peripheral.id());
                Ok(())
            }
            Ok(Err(e)) => {
                self.phase.set(ConnectionPhase::Idle);
                Err(Error::ConnectionFailed {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                self.phase.set(ConnectionPhase::Idle);
                Err(Error::ConnectionFailed {
                    reason: format!("no response within {:?}", self.connect_timeout),
                })
            }
        }
    }

    /// Disconnect from the board.
    ///
    /// The phase is reset to `Idle` even when the platform teardown fails.
    pub async fn disconnect(&self) -> Result<()> {
        self.phase.set(ConnectionPhase::Disconnecting);

        match self.peripheral.disconnect().await {
            Ok(()) => {
                info!("Disconnected from {}", self.peripheral.id());
                self.phase.set(ConnectionPhase::Idle);
                Ok(())
            }
            Err(e) => {
                error!("Failed to disconnect from {}: {}", self.peripheral.id(), e);
                self.phase.set(ConnectionPhase::Idle);
                Err(Error::Bluetooth(e))
            }
        }
    }
}
