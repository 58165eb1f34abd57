//! Command channel for the resolved control characteristic.
//!
//! Accepts discrete command writes once (and only while) the link is fully
//! prepared. Delivery is fire-and-forget: one Write Without Response per
//! command, no read-back.

use async_trait::async_trait;
use btleplug::api::{Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::payload::{format_payload, CommandRequest};
use crate::state::PhaseCell;

/// The one platform capability the command channel needs: an
/// unacknowledged GATT write. Seam for tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GattWriter: Send + Sync {
    /// Write `payload` to `characteristic` without response.
    async fn write_without_response(
        &self,
        characteristic: &Characteristic,
        payload: &[u8],
    ) -> Result<()>;
}

#[async_trait]
impl GattWriter for Peripheral {
    async fn write_without_response(
        &self,
        characteristic: &Characteristic,
        payload: &[u8],
    ) -> Result<()> {
        self.write(characteristic, payload, WriteType::WithoutResponse)
            .await
            .map_err(Error::Bluetooth)
    }
}

/// Write channel bound to the board's control characteristic.
///
/// Created alongside the session, armed once resolution finishes, and
/// disarmed on any teardown. Writes are rejected with
/// [`Error::NotReady`] unless the phase is `Ready` and the channel is
/// armed; a rejection never reaches the platform.
pub struct CommandChannel<W: GattWriter = Peripheral> {
    /// Write capability (the peripheral, in production).
    writer: W,
    /// Shared lifecycle phase.
    phase: Arc<PhaseCell>,
    /// The resolved control characteristic, once resolution finished.
    characteristic: RwLock<Option<Characteristic>>,
}

impl<W: GattWriter> CommandChannel<W> {
    /// Create an unarmed channel.
    pub fn new(writer: W, phase: Arc<PhaseCell>) -> Self {
        Self {
            writer,
            phase,
            characteristic: RwLock::new(None),
        }
    }

    /// Arm the channel with the resolved characteristic.
    pub fn arm(&self, characteristic: Characteristic) {
        trace!("Command channel armed with {}", characteristic.uuid);
        *self.characteristic.write() = Some(characteristic);
    }

    /// Disarm the channel. Idempotent; called on every teardown path.
    pub fn disarm(&self) {
        *self.characteristic.write() = None;
    }

    /// Check if a characteristic is armed.
    pub fn is_armed(&self) -> bool {
        self.characteristic.read().is_some()
    }

    /// Send one command to the board.
    ///
    /// # Errors
    ///
    /// [`Error::NotReady`] when the link is not fully prepared (the
    /// rejection is synchronous and performs no platform write), or the
    /// platform error when the write itself fails.
    pub async fn send(&self, request: &CommandRequest) -> Result<()> {
        let phase = self.phase.get();
        if !phase.is_ready() {
            warn!(
                "Rejecting command {} while {}",
                format_payload(request.payload()),
                phase
            );
            return Err(Error::NotReady);
        }

        let characteristic = self
            .characteristic
            .read()
            .clone()
            .ok_or(Error::NotReady)?;

        self.writer
            .write_without_response(&characteristic, request.payload())
            .await?;

        trace!(
            "Wrote {} to {}",
            format_payload(request.payload()),
            characteristic.uuid
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{LED_CONTROL_CHARACTERISTIC_UUID, LED_SERVICE_UUID};
    use crate::state::ConnectionPhase;
    use btleplug::api::CharPropFlags;
    use std::collections::BTreeSet;

    fn control_characteristic() -> Characteristic {
        Characteristic {
            uuid: LED_CONTROL_CHARACTERISTIC_UUID,
            service_uuid: LED_SERVICE_UUID,
            properties: CharPropFlags::WRITE_WITHOUT_RESPONSE,
            descriptors: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn test_send_rejected_before_ready_without_write() {
        let mut writer = MockGattWriter::new();
        writer.expect_write_without_response().times(0);

        let phase = Arc::new(PhaseCell::new());
        let channel = CommandChannel::new(writer, phase.clone());
        channel.arm(control_characteristic());

        for blocked in [
            ConnectionPhase::Idle,
            ConnectionPhase::Scanning,
            ConnectionPhase::Connecting,
            ConnectionPhase::DiscoveringServices,
            ConnectionPhase::DiscoveringCharacteristics,
            ConnectionPhase::Disconnecting,
        ] {
            phase.set(blocked);
            let err = channel.send(&CommandRequest::led_on()).await.unwrap_err();
            assert!(matches!(err, Error::NotReady));
        }
    }

    #[tokio::test]
    async fn test_send_rejected_when_unarmed() {
        let mut writer = MockGattWriter::new();
        writer.expect_write_without_response().times(0);

        let phase = Arc::new(PhaseCell::new());
        phase.set(ConnectionPhase::Ready);

        let channel = CommandChannel::new(writer, phase);
        assert!(!channel.is_armed());

        let err = channel.send(&CommandRequest::led_off()).await.unwrap_err();
        assert!(matches!(err, Error::NotReady));
    }

    #[tokio::test]
    async fn test_send_writes_exact_payload_when_ready() {
        let mut writer = MockGattWriter::new();
        writer
            .expect_write_without_response()
            .withf(|characteristic, payload| {
                characteristic.uuid == LED_CONTROL_CHARACTERISTIC_UUID && payload == [0x01]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let phase = Arc::new(PhaseCell::new());
        phase.set(ConnectionPhase::Ready);

        let channel = CommandChannel::new(writer, phase);
        channel.arm(control_characteristic());
        assert!(channel.is_armed());

        channel.send(&CommandRequest::led_on()).await.unwrap();
    }

    #[tokio::test]
    async fn test_on_off_round_trip_uses_same_characteristic() {
        let mut writer = MockGattWriter::new();
        let mut expected = vec![vec![0x01u8], vec![0x00], vec![0x01], vec![0x00]];
        expected.reverse();

        writer
            .expect_write_without_response()
            .times(4)
            .returning(move |characteristic, payload| {
                assert_eq!(characteristic.uuid, LED_CONTROL_CHARACTERISTIC_UUID);
                assert_eq!(payload, expected.pop().unwrap().as_slice());
                Ok(())
            });

        let phase = Arc::new(PhaseCell::new());
        phase.set(ConnectionPhase::Ready);

        let channel = CommandChannel::new(writer, phase);
        channel.arm(control_characteristic());

        for request in [
            CommandRequest::led_on(),
            CommandRequest::led_off(),
            CommandRequest::led_on(),
            CommandRequest::led_off(),
        ] {
            channel.send(&request).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_disarm_blocks_further_sends() {
        let mut writer = MockGattWriter::new();
        writer
            .expect_write_without_response()
            .times(1)
            .returning(|_, _| Ok(()));

        let phase = Arc::new(PhaseCell::new());
        phase.set(ConnectionPhase::Ready);

        let channel = CommandChannel::new(writer, phase);
        channel.arm(control_characteristic());
        channel.send(&CommandRequest::led_on()).await.unwrap();

        channel.disarm();
        assert!(!channel.is_armed());
        let err = channel.send(&CommandRequest::led_on()).await.unwrap_err();
        assert!(matches!(err, Error::NotReady));
    }
}
