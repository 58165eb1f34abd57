//! BLE adapter state monitoring.
//!
//! Tracks the power/authorization state of the local Bluetooth radio and
//! gates whether scanning is allowed to start.

use btleplug::api::CentralState;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::info;

/// Power and authorization state of the local BLE adapter.
///
/// Mirrors the full platform state space. btleplug only reports
/// `Unknown`/`PoweredOn`/`PoweredOff`; the remaining variants are kept for
/// backends that surface them and gate scanning exactly like `PoweredOff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdapterState {
    /// State not yet reported by the platform.
    #[default]
    Unknown,
    /// The adapter is resetting.
    Resetting,
    /// The platform has no BLE support.
    Unsupported,
    /// The application is not authorized to use BLE.
    Unauthorized,
    /// The radio is off.
    PoweredOff,
    /// The radio is on; scanning may start.
    PoweredOn,
}

impl AdapterState {
    /// Check whether scanning is permitted in this state.
    pub fn is_powered_on(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

impl From<CentralState> for AdapterState {
    fn from(state: CentralState) -> Self {
        match state {
            CentralState::Unknown => Self::Unknown,
            CentralState::PoweredOn => Self::PoweredOn,
            CentralState::PoweredOff => Self::PoweredOff,
        }
    }
}

impl std::fmt::Display for AdapterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Resetting => write!(f, "resetting"),
            Self::Unsupported => write!(f, "unsupported"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::PoweredOff => write!(f, "powered off"),
            Self::PoweredOn => write!(f, "powered on"),
        }
    }
}

/// Tracks the adapter state reported by the platform.
///
/// The state is authoritative and reported as-is; there are no retries.
pub struct AdapterMonitor {
    /// Last reported adapter state.
    state: RwLock<AdapterState>,
    /// Channel for state change events.
    event_tx: broadcast::Sender<AdapterState>,
}

impl AdapterMonitor {
    /// Create a new monitor in the `Unknown` state.
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(16);

        Self {
            state: RwLock::new(AdapterState::Unknown),
            event_tx,
        }
    }

    /// Get the current adapter state.
    pub fn state(&self) -> AdapterState {
        *self.state.read()
    }

    /// Check whether scanning is currently permitted.
    pub fn is_powered_on(&self) -> bool {
        self.state().is_powered_on()
    }

    /// Record a new adapter state and return the previous one.
    ///
    /// Emits a state change event when the state actually changed.
    pub fn update(&self, new_state: AdapterState) -> AdapterState {
        let previous = {
            let mut state = self.state.write();
            let previous = *state;
            *state = new_state;
            previous
        };

        if previous != new_state {
            info!("Adapter state changed: {} -> {}", previous, new_state);
            let _ = self.event_tx.send(new_state);
        }

        previous
    }

    /// Subscribe to adapter state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<AdapterState> {
        self.event_tx.subscribe()
    }
}

impl Default for AdapterMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_state_gating() {
        assert!(AdapterState::PoweredOn.is_powered_on());
        assert!(!AdapterState::PoweredOff.is_powered_on());
        assert!(!AdapterState::Unknown.is_powered_on());
        assert!(!AdapterState::Unauthorized.is_powered_on());
        assert!(!AdapterState::Unsupported.is_powered_on());
        assert!(!AdapterState::Resetting.is_powered_on());
    }

    #[test]
    fn test_central_state_mapping() {
        assert_eq!(
            AdapterState::from(CentralState::PoweredOn),
            AdapterState::PoweredOn
        );
        assert_eq!(
            AdapterState::from(CentralState::PoweredOff),
            AdapterState::PoweredOff
        );
        assert_eq!(
            AdapterState::from(CentralState::Unknown),
            AdapterState::Unknown
        );
    }

    #[test]
    fn test_monitor_update_broadcasts_changes() {
        let monitor = AdapterMonitor::new();
        let mut rx = monitor.subscribe();

        assert_eq!(monitor.state(), AdapterState::Unknown);

        let previous = monitor.update(AdapterState::PoweredOn);
        assert_eq!(previous, AdapterState::Unknown);
        assert!(monitor.is_powered_on());
        assert_eq!(rx.try_recv().ok(), Some(AdapterState::PoweredOn));

        // Repeating the same state is not an event
        monitor.update(AdapterState::PoweredOn);
        assert!(rx.try_recv().is_err());

        monitor.update(AdapterState::PoweredOff);
        assert!(!monitor.is_powered_on());
        assert_eq!(rx.try_recv().ok(), Some(AdapterState::PoweredOff));
    }

    #[test]
    fn test_adapter_state_display() {
        assert_eq!(format!("{}", AdapterState::PoweredOn), "powered on");
        assert_eq!(format!("{}", AdapterState::PoweredOff), "powered off");
        assert_eq!(format!("{}", AdapterState::Unauthorized), "unauthorized");
    }
}
