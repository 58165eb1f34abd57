//! GATT service and characteristic resolution.
//!
//! After a connection is established, locates the target control service
//! and its writable characteristic on the board. Discovery is bounded by a
//! timeout; a board that never exposes the target ids fails resolution
//! explicitly instead of stalling the session.

use btleplug::api::{Characteristic, Peripheral as _, Service};
use btleplug::platform::Peripheral;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use crate::ble::uuids::TargetDescriptor;
use crate::error::{Error, Result};
use crate::state::{ConnectionPhase, PhaseCell};

/// Discover services on the connected board and pick the target service.
///
/// # Errors
///
/// [`Error::ResolutionTimedOut`] when discovery does not complete within
/// `resolve_timeout`; [`Error::ServiceNotFound`] when the board exposes
/// services but none carries the target id.
pub async fn resolve_service(
    peripheral: &Peripheral,
    target: &TargetDescriptor,
    phase: &PhaseCell,
    resolve_timeout: Duration,
) -> Result<Service> {
    phase.set(ConnectionPhase::DiscoveringServices);

    debug!(
        "Discovering services on {} (timeout {:?})",
        peripheral.id(),
        resolve_timeout
    );

    match timeout(resolve_timeout, peripheral.discover_services()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::Bluetooth(e)),
        Err(_) => {
            return Err(Error::ResolutionTimedOut {
                identifier: peripheral.id().to_string(),
            })
        }
    }

    let services: Vec<Service> = peripheral.services().into_iter().collect();
    debug!("Discovered {} services", services.len());

    find_target_service(&services, target.service)
        .cloned()
        .ok_or_else(|| Error::ServiceNotFound {
            uuid: target.service.to_string(),
        })
}

/// Pick the target characteristic out of a resolved service.
///
/// # Errors
///
/// [`Error::CharacteristicNotFound`] when the service does not carry the
/// target characteristic id.
pub fn resolve_characteristic(
    service: &Service,
    target: &TargetDescriptor,
    phase: &PhaseCell,
) -> Result<Characteristic> {
    phase.set(ConnectionPhase::DiscoveringCharacteristics);

    find_target_characteristic(service, target.characteristic)
        .cloned()
        .ok_or_else(|| Error::CharacteristicNotFound {
            uuid: target.characteristic.to_string(),
        })
}

/// Scan a service list for the one carrying the given UUID.
pub(crate) fn find_target_service(services: &[Service], uuid: Uuid) -> Option<&Service> {
    services.iter().find(|service| service.uuid == uuid)
}

/// Scan a service's characteristics for the one carrying the given UUID.
pub(crate) fn find_target_characteristic(
    service: &Service,
    uuid: Uuid,
) -> Option<&Characteristic> {
    service
        .characteristics
        .iter()
        .find(|characteristic| characteristic.uuid == uuid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::uuids::{LED_CONTROL_CHARACTERISTIC_UUID, LED_SERVICE_UUID};
    use btleplug::api::CharPropFlags;
    use std::collections::BTreeSet;

    fn characteristic(uuid: Uuid, service_uuid: Uuid) -> Characteristic {
        Characteristic {
            uuid,
            service_uuid,
            properties: CharPropFlags::WRITE_WITHOUT_RESPONSE,
            descriptors: BTreeSet::new(),
        }
    }

    fn service(uuid: Uuid, characteristics: Vec<Characteristic>) -> Service {
        Service {
            uuid,
            primary: true,
            characteristics: characteristics.into_iter().collect(),
        }
    }

    #[test]
    fn test_finds_target_among_unrelated_services() {
        let battery = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);
        let device_info = Uuid::from_u128(0x0000_180a_0000_1000_8000_00805f9b34fb);

        let services = vec![
            service(battery, vec![]),
            service(
                LED_SERVICE_UUID,
                vec![
                    characteristic(battery, LED_SERVICE_UUID),
                    characteristic(LED_CONTROL_CHARACTERISTIC_UUID, LED_SERVICE_UUID),
                ],
            ),
            service(device_info, vec![]),
        ];

        let found = find_target_service(&services, LED_SERVICE_UUID)
            .expect("target service should be found");
        assert_eq!(found.uuid, LED_SERVICE_UUID);

        // Exactly one characteristic matches, no matter how many others exist
        let characteristic =
            find_target_characteristic(found, LED_CONTROL_CHARACTERISTIC_UUID)
                .expect("target characteristic should be found");
        assert_eq!(characteristic.uuid, LED_CONTROL_CHARACTERISTIC_UUID);
        assert_eq!(characteristic.service_uuid, LED_SERVICE_UUID);
    }

    #[test]
    fn test_absent_target_yields_none() {
        let other = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);
        let services = vec![service(other, vec![characteristic(other, other)])];

        assert!(find_target_service(&services, LED_SERVICE_UUID).is_none());

        let empty = service(LED_SERVICE_UUID, vec![]);
        assert!(find_target_characteristic(&empty, LED_CONTROL_CHARACTERISTIC_UUID).is_none());
    }
}
