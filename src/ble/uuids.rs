//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants used for LED board communication.

use uuid::Uuid;

// LED control service (HM-10 style UART-over-GATT module)
/// LED board control service UUID (16-bit `FFE0` expanded with the
/// Bluetooth base UUID).
pub const LED_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_ffe0_0000_1000_8000_00805f9b34fb);
/// LED board control characteristic UUID (16-bit `FFE1` expanded with the
/// Bluetooth base UUID). Write Without Response.
pub const LED_CONTROL_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000_ffe1_0000_1000_8000_00805f9b34fb);

/// The service/characteristic pair a board must expose to be controllable.
///
/// Fixed at build time; the crate targets exactly one board type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetDescriptor {
    /// UUID of the control service the board advertises.
    pub service: Uuid,
    /// UUID of the writable control characteristic within that service.
    pub characteristic: Uuid,
}

/// The LED control board targeted by this crate.
pub const LED_BOARD: TargetDescriptor = TargetDescriptor {
    service: LED_SERVICE_UUID,
    characteristic: LED_CONTROL_CHARACTERISTIC_UUID,
};

/// Check if a service UUID is the LED control service.
pub fn is_led_service(uuid: &Uuid) -> bool {
    *uuid == LED_SERVICE_UUID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        // Verify UUIDs are properly formatted
        let service = LED_SERVICE_UUID.to_string();
        assert!(service.contains("ffe0"));

        let characteristic = LED_CONTROL_CHARACTERISTIC_UUID.to_string();
        assert!(characteristic.contains("ffe1"));
    }

    #[test]
    fn test_is_led_service() {
        assert!(is_led_service(&LED_SERVICE_UUID));
        assert!(!is_led_service(&LED_CONTROL_CHARACTERISTIC_UUID));
    }

    #[test]
    fn test_led_board_descriptor() {
        assert_eq!(LED_BOARD.service, LED_SERVICE_UUID);
        assert_eq!(LED_BOARD.characteristic, LED_CONTROL_CHARACTERISTIC_UUID);
        assert_ne!(LED_BOARD.service, LED_BOARD.characteristic);
    }
}
