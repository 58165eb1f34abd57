//! Board manager: the connection state machine.
//!
//! Sequences adapter monitoring, scanning, connection, resolution, and the
//! command channel into one lifecycle for a single LED control board, and
//! exposes the public contract consumed by a presentation layer.
//!
//! All platform callbacks arrive on one background pump task; the
//! presentation layer only reads derived flags and issues commands.

use btleplug::api::{Central, CentralEvent, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::ble::adapter::{AdapterMonitor, AdapterState};
use crate::ble::commands::CommandChannel;
use crate::ble::connection::ConnectionManager;
use crate::ble::resolver;
use crate::ble::scanner::{BoardScanner, Discovery, DiscoveredBoard};
use crate::ble::uuids::{TargetDescriptor, LED_BOARD};
use crate::error::{Error, Result};
use crate::events::BoardEvent;
use crate::log::{EventLog, LogEntry};
use crate::payload::{format_payload, CommandRequest};
use crate::state::{ConnectionPhase, ControlFlags, LinkState, PhaseCell};

/// Upper bounds for the connect and resolve stages.
///
/// The platform stack itself never times out these operations, so the
/// manager bounds them; expiry resets the lifecycle to idle.
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    /// Maximum duration of one connect attempt.
    pub connect: Duration,
    /// Maximum duration of service discovery.
    pub resolve: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            resolve: Duration::from_secs(10),
        }
    }
}

/// The single active board session.
///
/// Created on the first discovery match, destroyed on disconnect, failure,
/// adapter loss, or explicit stop.
struct BoardSession {
    /// Advertisement data of the board.
    board: DiscoveredBoard,
    /// The live peripheral handle.
    peripheral: Peripheral,
    /// Connect/disconnect lifecycle.
    connection: ConnectionManager,
    /// Write channel, armed once resolution finishes.
    commands: CommandChannel,
}

/// Shared state between the public handle and the event pump task.
struct Core {
    /// The BLE adapter.
    adapter: Adapter,
    /// The service/characteristic pair the board must expose.
    target: TargetDescriptor,
    /// Stage timeouts.
    timeouts: Timeouts,
    /// Adapter power state.
    monitor: Arc<AdapterMonitor>,
    /// Scanner for the target board.
    scanner: BoardScanner,
    /// Lifecycle phase, shared with the session components.
    phase: Arc<PhaseCell>,
    /// The single session slot.
    session: RwLock<Option<Arc<BoardSession>>>,
    /// Channel for lifecycle events.
    event_tx: broadcast::Sender<BoardEvent>,
    /// Human-readable log stream.
    log: EventLog,
    /// Last flags broadcast, to emit changes exactly once.
    last_flags: RwLock<ControlFlags>,
    /// Running flag for the pump task.
    is_running: AtomicBool,
}

/// Central manager for discovering and driving the LED control board.
pub struct BoardManager {
    core: Arc<Core>,
    /// Handle to the event pump task.
    pump_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl BoardManager {
    /// Create a manager on the first available adapter, with default
    /// timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        Self::with_timeouts(Timeouts::default()).await
    }

    /// Create a manager on the first available adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn with_timeouts(timeouts: Timeouts) -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::BluetoothUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        Ok(Self::with_adapter(adapter, timeouts))
    }

    /// Create a manager for a specific adapter.
    pub fn with_adapter(adapter: Adapter, timeouts: Timeouts) -> Self {
        let monitor = Arc::new(AdapterMonitor::new());
        let scanner = BoardScanner::new(adapter.clone(), monitor.clone(), LED_BOARD);
        let (event_tx, _) = broadcast::channel(64);

        let core = Arc::new(Core {
            adapter,
            target: LED_BOARD,
            timeouts,
            monitor,
            scanner,
            phase: Arc::new(PhaseCell::new()),
            session: RwLock::new(None),
            event_tx,
            log: EventLog::new(),
            last_flags: RwLock::new(ControlFlags::default()),
            is_running: AtomicBool::new(true),
        });

        let pump = tokio::spawn(Core::pump(core.clone()));

        Self {
            core,
            pump_handle: RwLock::new(Some(pump)),
        }
    }

    /// Start seeking the board.
    ///
    /// # Errors
    ///
    /// [`Error::SessionActive`] while a session exists (a new scan
    /// requires terminating the current session first), or
    /// [`Error::AdapterNotReady`] while the adapter is not powered on.
    pub async fn start_seeking(&self) -> Result<()> {
        let core = &self.core;

        if let Some(session) = core.session.read().as_ref() {
            return Err(Error::SessionActive {
                identifier: session.board.identifier.clone(),
            });
        }

        match core.scanner.start().await {
            Ok(()) => {
                core.phase.set(ConnectionPhase::Scanning);
                core.log.append(format!(
                    "Seeking board advertising service {}",
                    core.target.service
                ));
                core.emit_flags();
                Ok(())
            }
            Err(e) => {
                core.log.append(format!("Cannot start seeking: {}", e));
                Err(e)
            }
        }
    }

    /// Stop seeking. Idempotent; a no-op unless scanning.
    pub async fn stop_seeking(&self) -> Result<()> {
        let core = &self.core;

        core.scanner.stop().await?;

        if core.phase.get() == ConnectionPhase::Scanning {
            core.phase.set(ConnectionPhase::Idle);
            core.log.append("Stopped seeking");
            core.emit_flags();
        }

        Ok(())
    }

    /// Disconnect from the current board, if any.
    pub async fn disconnect_current(&self) -> Result<()> {
        let session = self.core.session.write().take();

        let Some(session) = session else {
            debug!("No active session to disconnect");
            return Ok(());
        };

        session.commands.disarm();
        self.core.log.append(format!(
            "Disconnecting from {}",
            session.board.display_name()
        ));

        let result = session.connection.disconnect().await;

        self.core.emit(BoardEvent::Disconnected {
            identifier: session.board.identifier.clone(),
            reason: Some("disconnect requested".to_string()),
        });
        self.core.emit_flags();

        result
    }

    /// Send one command to the board.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] unless a session exists and is fully prepared.
    pub async fn send_command(&self, request: CommandRequest) -> Result<()> {
        let session = self.core.session.read().as_ref().cloned();

        let Some(session) = session else {
            warn!(
                "Command {} rejected: no active session",
                format_payload(request.payload())
            );
            self.core.log.append(format!(
                "Command {} rejected: not connected",
                format_payload(request.payload())
            ));
            return Err(Error::NotReady);
        };

        match session.commands.send(&request).await {
            Ok(()) => {
                self.core.log.append(format!(
                    "Sent {} to {}",
                    format_payload(request.payload()),
                    session.board.display_name()
                ));
                Ok(())
            }
            Err(e) => {
                self.core.log.append(format!(
                    "Command {} to {} failed: {}",
                    format_payload(request.payload()),
                    session.board.display_name(),
                    e
                ));
                Err(e)
            }
        }
    }

    /// Switch the LED on.
    pub async fn led_on(&self) -> Result<()> {
        self.send_command(CommandRequest::led_on()).await
    }

    /// Switch the LED off.
    pub async fn led_off(&self) -> Result<()> {
        self.send_command(CommandRequest::led_off()).await
    }

    /// Send the board's fixed preset sequence.
    pub async fn send_preset(&self) -> Result<()> {
        self.send_command(CommandRequest::preset_sequence()).await
    }

    /// Current adapter state.
    pub fn adapter_state(&self) -> AdapterState {
        self.core.monitor.state()
    }

    /// Current fine-grained lifecycle phase.
    pub fn phase(&self) -> ConnectionPhase {
        self.core.phase.get()
    }

    /// Current coarse link state.
    pub fn link_state(&self) -> LinkState {
        self.core.phase.get().into()
    }

    /// Current observable flags, derived from adapter and link state.
    pub fn flags(&self) -> ControlFlags {
        self.core.flags()
    }

    /// Whether a new seek may be started.
    pub fn can_start_connect(&self) -> bool {
        self.flags().can_start_connect
    }

    /// Whether a seek-connect-resolve cycle is in progress.
    pub fn seeking_for_board(&self) -> bool {
        self.flags().seeking_for_board
    }

    /// Whether the board accepts LED commands.
    pub fn can_control_led(&self) -> bool {
        self.flags().can_control_led
    }

    /// The board of the current session, if any.
    pub fn connected_board(&self) -> Option<DiscoveredBoard> {
        self.core.session.read().as_ref().map(|s| s.board.clone())
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<BoardEvent> {
        self.core.event_tx.subscribe()
    }

    /// Subscribe to phase transitions.
    pub fn subscribe_phase(&self) -> broadcast::Receiver<ConnectionPhase> {
        self.core.phase.subscribe()
    }

    /// Subscribe to log entries as they are appended.
    pub fn subscribe_log(&self) -> broadcast::Receiver<LogEntry> {
        self.core.log.subscribe()
    }

    /// The human-readable event log.
    pub fn log(&self) -> &EventLog {
        &self.core.log
    }

    /// Clean shutdown: stop scanning, disconnect, end the pump task.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down board manager");

        self.core.is_running.store(false, Ordering::SeqCst);

        self.stop_seeking().await?;

        if let Err(e) = self.disconnect_current().await {
            warn!("Error disconnecting during shutdown: {}", e);
        }

        if let Some(handle) = self.pump_handle.write().take() {
            let _ = handle.await;
        }

        Ok(())
    }
}

impl Drop for BoardManager {
    fn drop(&mut self) {
        self.core.is_running.store(false, Ordering::SeqCst);
    }
}

impl Core {
    /// Pump the platform central event stream until shutdown.
    async fn pump(core: Arc<Core>) {
        let mut events = match core.adapter.events().await {
            Ok(events) => events,
            Err(e) => {
                error!("Failed to get adapter events: {}", e);
                return;
            }
        };

        // Seed the monitor; some platforms never deliver an initial
        // StateUpdate event
        if let Ok(state) = core.adapter.adapter_state().await {
            core.handle_adapter_state(state.into()).await;
        }

        while core.is_running.load(Ordering::SeqCst) {
            tokio::select! {
                Some(event) = events.next() => {
                    Core::handle_central_event(&core, event).await;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    // Re-check the running flag
                }
            }
        }

        debug!("Central event pump ended");
    }

    async fn handle_central_event(core: &Arc<Core>, event: CentralEvent) {
        match event {
            CentralEvent::StateUpdate(state) => {
                core.handle_adapter_state(state.into()).await;
            }
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                Core::handle_discovery(core, &id).await;
            }
            CentralEvent::DeviceDisconnected(id) => {
                core.handle_disconnected(&id).await;
            }
            CentralEvent::DeviceConnected(id) => {
                debug!("Device connected: {}", id);
            }
            CentralEvent::ManufacturerDataAdvertisement { .. } => {}
            CentralEvent::ServiceDataAdvertisement { .. } => {}
            CentralEvent::ServicesAdvertisement { .. } => {}
        }
    }

    /// React to an adapter power/authorization change.
    async fn handle_adapter_state(&self, new_state: AdapterState) {
        let previous = self.monitor.update(new_state);
        if previous == new_state {
            return;
        }

        self.log
            .append(format!("Bluetooth adapter is {}", new_state));
        self.emit(BoardEvent::AdapterChanged(new_state));

        if !new_state.is_powered_on() {
            self.force_reset().await;
        }

        self.emit_flags();
    }

    /// Forced reset: adapter became unavailable while active.
    async fn force_reset(&self) {
        if self.scanner.is_scanning() {
            let _ = self.scanner.stop().await;
        }

        if let Some(session) = self.session.write().take() {
            warn!(
                "Adapter lost while session with {} was active",
                session.board.identifier
            );
            session.commands.disarm();
            self.log.append(format!(
                "Connection to {} dropped: adapter unavailable",
                session.board.display_name()
            ));

            // Best-effort teardown, off the pump task
            let peripheral = session.peripheral.clone();
            tokio::spawn(async move {
                let _ = peripheral.disconnect().await;
            });

            self.emit(BoardEvent::Disconnected {
                identifier: session.board.identifier.clone(),
                reason: Some("adapter unavailable".to_string()),
            });
        }

        self.phase.set(ConnectionPhase::Idle);
    }

    /// React to a discovery event while seeking.
    async fn handle_discovery(core: &Arc<Core>, id: &PeripheralId) {
        if core.phase.get() != ConnectionPhase::Scanning {
            return;
        }

        let Some(discovery) = core.scanner.process_discovery(id).await else {
            return;
        };

        let core = core.clone();
        tokio::spawn(async move {
            core.establish(discovery).await;
        });
    }

    /// Connect to the discovered board and resolve its control
    /// characteristic. Runs as its own task so the pump stays responsive.
    async fn establish(&self, discovery: Discovery) {
        let Discovery { board, peripheral } = discovery;

        let session = {
            let mut slot = self.session.write();
            if slot.is_some() {
                warn!(
                    "Discovery of {} ignored: session already active",
                    board.identifier
                );
                return;
            }

            let session = Arc::new(BoardSession {
                board: board.clone(),
                peripheral: peripheral.clone(),
                connection: ConnectionManager::new(
                    peripheral.clone(),
                    self.phase.clone(),
                    self.timeouts.connect,
                ),
                commands: CommandChannel::new(peripheral.clone(), self.phase.clone()),
            });
            *slot = Some(session.clone());
            session
        };

        info!(
            "Discovered board {} [{}] at {:?} dBm",
            board.display_name(),
            board.identifier,
            board.rssi
        );
        self.log.append(format!(
            "Discovered {} [{}]",
            board.display_name(),
            board.identifier
        ));
        self.emit(BoardEvent::BoardDiscovered(board.clone()));

        // The scan cycle is over; connect to the first match
        let _ = self.scanner.stop().await;

        if let Err(e) = session.connection.connect().await {
            self.connect_failed(&board, e.to_string());
            return;
        }

        // The session may have been torn down while the attempt ran
        if !self.is_current(&session) {
            debug!("Session for {} ended during connect", board.identifier);
            let _ = peripheral.disconnect().await;
            return;
        }

        self.log
            .append(format!("Connected to {}", board.display_name()));
        self.emit(BoardEvent::Connected {
            identifier: board.identifier.clone(),
        });

        let service = match resolver::resolve_service(
            &peripheral,
            &self.target,
            &self.phase,
            self.timeouts.resolve,
        )
        .await
        {
            Ok(service) => service,
            Err(e) => {
                self.resolution_failed(&board, &peripheral, e).await;
                return;
            }
        };

        self.log.append(format!(
            "Service {} resolved on {}",
            self.target.service,
            board.display_name()
        ));
        self.emit(BoardEvent::ServicesResolved {
            identifier: board.identifier.clone(),
        });

        let characteristic =
            match resolver::resolve_characteristic(&service, &self.target, &self.phase) {
                Ok(characteristic) => characteristic,
                Err(e) => {
                    self.resolution_failed(&board, &peripheral, e).await;
                    return;
                }
            };

        // The session may have been torn down while resolution ran
        if !self.is_current(&session) {
            debug!("Session for {} ended during resolution", board.identifier);
            let _ = peripheral.disconnect().await;
            return;
        }

        session.commands.arm(characteristic);
        self.phase.set(ConnectionPhase::Ready);

        info!("Board {} is ready", board.identifier);
        self.log
            .append(format!("{} is ready for commands", board.display_name()));
        self.emit(BoardEvent::CharacteristicsResolved {
            identifier: board.identifier.clone(),
        });
        self.emit_flags();
    }

    /// React to an unsolicited disconnect from the platform.
    async fn handle_disconnected(&self, id: &PeripheralId) {
        let matches = self
            .session
            .read()
            .as_ref()
            .map(|session| session.peripheral.id() == *id)
            .unwrap_or(false);

        if !matches {
            debug!("Ignoring disconnect of unrelated peripheral {}", id);
            return;
        }

        let Some(session) = self.session.write().take() else {
            return;
        };

        session.commands.disarm();
        self.phase.set(ConnectionPhase::Idle);

        info!("Board {} disconnected", session.board.identifier);
        self.log.append(format!(
            "Disconnected from {}",
            session.board.display_name()
        ));
        self.emit(BoardEvent::Disconnected {
            identifier: session.board.identifier.clone(),
            reason: None,
        });
        self.emit_flags();
    }

    /// Connect (or prepare) failure: reset to idle and report.
    fn connect_failed(&self, board: &DiscoveredBoard, reason: String) {
        self.session.write().take();
        self.phase.set(ConnectionPhase::Idle);

        warn!("Connection to {} failed: {}", board.identifier, reason);
        self.log.append(format!(
            "Failed to connect to {}: {}",
            board.display_name(),
            reason
        ));
        self.emit(BoardEvent::ConnectFailed {
            identifier: board.identifier.clone(),
            reason,
        });
        self.emit_flags();
    }

    /// Resolution failure: drop the link, then report as a failed connect.
    async fn resolution_failed(&self, board: &DiscoveredBoard, peripheral: &Peripheral, err: Error) {
        warn!("Resolution on {} failed: {}", board.identifier, err);
        let _ = peripheral.disconnect().await;
        self.connect_failed(board, err.to_string());
    }

    /// Check that `session` is still the one in the slot.
    fn is_current(&self, session: &Arc<BoardSession>) -> bool {
        self.session
            .read()
            .as_ref()
            .map(|current| Arc::ptr_eq(current, session))
            .unwrap_or(false)
    }

    fn flags(&self) -> ControlFlags {
        ControlFlags::derive(self.monitor.state(), self.phase.get().into())
    }

    fn emit(&self, event: BoardEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Broadcast the derived flags when they changed.
    fn emit_flags(&self) {
        let flags = self.flags();
        let changed = {
            let mut last = self.last_flags.write();
            if *last == flags {
                false
            } else {
                *last = flags;
                true
            }
        };

        if changed {
            self.emit(BoardEvent::FlagsChanged(flags));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_timeouts() {
        let timeouts = Timeouts::default();
        assert_eq!(timeouts.connect, Duration::from_secs(10));
        assert_eq!(timeouts.resolve, Duration::from_secs(10));
    }

    /// Walk the happy path of the state machine: powered on, seek,
    /// discover, connect, resolve, ready, disconnect.
    #[test]
    fn test_seek_connect_resolve_ready_walk() {
        let monitor = AdapterMonitor::new();
        let phase = PhaseCell::new();

        let flags = |monitor: &AdapterMonitor, phase: &PhaseCell| {
            ControlFlags::derive(monitor.state(), phase.get().into())
        };

        // Adapter starts unknown: nothing is allowed
        assert_eq!(flags(&monitor, &phase), ControlFlags::default());

        monitor.update(AdapterState::PoweredOn);
        assert!(flags(&monitor, &phase).can_start_connect);
        assert!(!flags(&monitor, &phase).can_control_led);

        phase.set(ConnectionPhase::Scanning);
        assert!(flags(&monitor, &phase).seeking_for_board);
        assert!(!flags(&monitor, &phase).can_start_connect);

        phase.set(ConnectionPhase::Connecting);
        phase.set(ConnectionPhase::DiscoveringServices);
        phase.set(ConnectionPhase::DiscoveringCharacteristics);
        assert!(flags(&monitor, &phase).seeking_for_board);

        phase.set(ConnectionPhase::Ready);
        let ready = flags(&monitor, &phase);
        assert!(ready.can_control_led);
        assert!(!ready.seeking_for_board);
        assert!(!ready.can_start_connect);

        // Disconnect resets everything
        phase.set(ConnectionPhase::Disconnecting);
        assert!(!flags(&monitor, &phase).can_control_led);
        phase.set(ConnectionPhase::Idle);
        assert!(flags(&monitor, &phase).can_start_connect);
    }

    /// Power loss at any point forces the idle/unavailable flag set.
    #[test]
    fn test_power_loss_while_ready() {
        let monitor = AdapterMonitor::new();
        let phase = PhaseCell::new();

        monitor.update(AdapterState::PoweredOn);
        phase.set(ConnectionPhase::Ready);

        monitor.update(AdapterState::PoweredOff);
        // Forced reset drives the phase back to idle
        phase.set(ConnectionPhase::Idle);

        let flags = ControlFlags::derive(monitor.state(), phase.get().into());
        assert_eq!(flags, ControlFlags::default());
    }

    /// A powered-off adapter never grants the seek flag, matching the
    /// rejection `start_seeking` performs.
    #[test]
    fn test_unpowered_adapter_blocks_seeking() {
        let monitor = AdapterMonitor::new();
        monitor.update(AdapterState::PoweredOff);

        let flags = ControlFlags::derive(monitor.state(), LinkState::Idle);
        assert!(!flags.can_start_connect);

        let err = Error::AdapterNotReady {
            state: monitor.state(),
        };
        assert_eq!(
            err.to_string(),
            "Bluetooth adapter not ready: powered off"
        );
    }
}
