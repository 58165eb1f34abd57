//! BLE scanning functionality.
//!
//! Runs the filtered scan for the single target board and reports the
//! first peripheral advertising the control service.

use btleplug::api::{Central, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Peripheral, PeripheralId};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::ble::adapter::AdapterMonitor;
use crate::ble::uuids::TargetDescriptor;
use crate::error::{Error, Result};

/// Placeholder name for boards that advertise without a local name.
pub const UNNAMED_DEVICE: &str = "Unnamed device";

/// A board discovered by the scanner.
///
/// Pure advertisement data; exists only between discovery and the connect
/// attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredBoard {
    /// The BLE peripheral identifier.
    pub identifier: String,
    /// Advertised local name, if any.
    pub local_name: Option<String>,
    /// Signal strength in dBm, if reported.
    pub rssi: Option<i16>,
}

impl DiscoveredBoard {
    /// The advertised name, or [`UNNAMED_DEVICE`] when absent.
    pub fn display_name(&self) -> &str {
        self.local_name.as_deref().unwrap_or(UNNAMED_DEVICE)
    }
}

/// A discovery match: the advertisement data plus the live peripheral handle.
pub(crate) struct Discovery {
    pub board: DiscoveredBoard,
    pub peripheral: Peripheral,
}

/// Scanner for the single target board.
///
/// Stops at the first peripheral advertising the target service; further
/// discoveries are ignored until a new scan cycle starts.
pub struct BoardScanner {
    /// The BLE adapter to use for scanning.
    adapter: Adapter,
    /// Gate: scanning may only start while the adapter is powered on.
    monitor: Arc<AdapterMonitor>,
    /// The service the board must advertise.
    target: TargetDescriptor,
    /// Whether scanning is currently active.
    is_scanning: RwLock<bool>,
    /// Latch: set once the first match of the current cycle was reported.
    matched: AtomicBool,
}

impl BoardScanner {
    /// Create a new scanner for the given adapter and target.
    pub fn new(adapter: Adapter, monitor: Arc<AdapterMonitor>, target: TargetDescriptor) -> Self {
        Self {
            adapter,
            monitor,
            target,
            is_scanning: RwLock::new(false),
            matched: AtomicBool::new(false),
        }
    }

    /// Start scanning for the target board.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AdapterNotReady`] when the adapter is not powered
    /// on, or the platform error when the scan cannot be started.
    pub async fn start(&self) -> Result<()> {
        let state = self.monitor.state();
        if !state.is_powered_on() {
            return Err(Error::AdapterNotReady { state });
        }

        if *self.is_scanning.read() {
            debug!("Already scanning, ignoring start request");
            return Ok(());
        }

        info!("Starting BLE scan for service {}", self.target.service);

        self.adapter
            .start_scan(ScanFilter {
                services: vec![self.target.service],
            })
            .await
            .map_err(Error::Bluetooth)?;

        self.matched.store(false, Ordering::SeqCst);
        *self.is_scanning.write() = true;

        Ok(())
    }

    /// Stop scanning. Idempotent; always succeeds.
    pub async fn stop(&self) -> Result<()> {
        if !*self.is_scanning.read() {
            debug!("Not scanning, ignoring stop request");
            return Ok(());
        }

        info!("Stopping BLE scan");

        // Clear the flag first so in-flight discoveries are dropped
        *self.is_scanning.write() = false;

        if let Err(e) = self.adapter.stop_scan().await {
            warn!("Platform scan cancellation failed: {}", e);
        }

        Ok(())
    }

    /// Check if currently scanning.
    pub fn is_scanning(&self) -> bool {
        *self.is_scanning.read()
    }

    /// Handle a discovery event for a peripheral.
    ///
    /// Returns the match when this is the first peripheral of the current
    /// scan cycle to advertise the target service; `None` otherwise.
    pub(crate) async fn process_discovery(&self, id: &PeripheralId) -> Option<Discovery> {
        if !*self.is_scanning.read() || self.matched.load(Ordering::SeqCst) {
            return None;
        }

        let peripheral = match self.adapter.peripheral(id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral {}: {}", id, e);
                return None;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return None,
        };

        // Double-check the advertisement even though the platform filter
        // should only deliver matches
        if !advertises_service(&properties, self.target.service) {
            trace!("Peripheral {} does not advertise the target service", id);
            return None;
        }

        // First match only; late events of the same cycle lose the race here
        if self.matched.swap(true, Ordering::SeqCst) {
            return None;
        }

        let board = DiscoveredBoard {
            identifier: id.to_string(),
            local_name: properties.local_name.clone(),
            rssi: properties.rssi,
        };

        debug!(
            "Matched board {} [{}] at {:?} dBm",
            board.display_name(),
            board.identifier,
            board.rssi
        );

        Some(Discovery { board, peripheral })
    }
}

/// Check whether an advertisement carries the given service UUID.
pub(crate) fn advertises_service(properties: &PeripheralProperties, service: Uuid) -> bool {
    properties.services.contains(&service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{LED_CONTROL_CHARACTERISTIC_UUID, LED_SERVICE_UUID};

    #[test]
    fn test_advertises_service() {
        let mut properties = PeripheralProperties::default();
        assert!(!advertises_service(&properties, LED_SERVICE_UUID));

        properties.services = vec![LED_CONTROL_CHARACTERISTIC_UUID, LED_SERVICE_UUID];
        assert!(advertises_service(&properties, LED_SERVICE_UUID));
    }

    #[test]
    fn test_display_name_defaults_when_unnamed() {
        let named = DiscoveredBoard {
            identifier: "aa:bb".to_string(),
            local_name: Some("BoardX".to_string()),
            rssi: Some(-40),
        };
        assert_eq!(named.display_name(), "BoardX");

        let unnamed = DiscoveredBoard {
            identifier: "cc:dd".to_string(),
            local_name: None,
            rssi: None,
        };
        assert_eq!(unnamed.display_name(), UNNAMED_DEVICE);
    }
}
