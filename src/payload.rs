//! Command payload construction and parsing.
//!
//! The board speaks a one-shot byte protocol over its control
//! characteristic: single-byte on/off codes, a fixed preset sequence, and
//! arbitrary caller-supplied byte strings. Custom payloads can be entered
//! as hex text; malformed tokens are reported individually rather than
//! silently substituted.

use bytes::Bytes;

use crate::error::{Error, Result};

/// Payload switching the LED on.
pub const LED_ON_PAYLOAD: [u8; 1] = [0x01];
/// Payload switching the LED off.
pub const LED_OFF_PAYLOAD: [u8; 1] = [0x00];
/// The board's fixed demo sequence.
pub const PRESET_SEQUENCE: [u8; 6] = [0x1A, 0x04, 0x7F, 0xF0, 0x64, 0x08];

/// A single fire-and-forget command for the board.
///
/// Transient: built per send, delivered as one Write Without Response, and
/// never persisted. No acknowledgment is awaited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    payload: Bytes,
}

impl CommandRequest {
    /// Command switching the LED on (`[0x01]`).
    pub fn led_on() -> Self {
        Self {
            payload: Bytes::from_static(&LED_ON_PAYLOAD),
        }
    }

    /// Command switching the LED off (`[0x00]`).
    pub fn led_off() -> Self {
        Self {
            payload: Bytes::from_static(&LED_OFF_PAYLOAD),
        }
    }

    /// The board's fixed preset sequence.
    pub fn preset_sequence() -> Self {
        Self {
            payload: Bytes::from_static(&PRESET_SEQUENCE),
        }
    }

    /// A command carrying an arbitrary payload, sent verbatim.
    pub fn custom(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// Parse a command from hex byte tokens (see [`parse_byte_tokens`]).
    pub fn from_text(text: &str) -> Result<Self> {
        Ok(Self::custom(parse_byte_tokens(text)?))
    }

    /// The payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the request, yielding its payload.
    pub fn into_bytes(self) -> Bytes {
        self.payload
    }
}

/// Parse a text field of hex byte tokens into a payload.
///
/// Tokens are separated by whitespace and/or commas. Each token is one or
/// two hex digits with an optional `0x`/`0X` prefix. The first malformed
/// token fails the whole payload with its position; nothing is silently
/// substituted. Empty input yields an empty payload.
pub fn parse_byte_tokens(text: &str) -> Result<Vec<u8>> {
    let tokens = text
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty());

    let mut bytes = Vec::new();
    for (position, token) in tokens.enumerate() {
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);

        if digits.is_empty()
            || digits.len() > 2
            || !digits.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::MalformedByteToken {
                token: token.to_string(),
                position,
            });
        }

        let value =
            u8::from_str_radix(digits, 16).map_err(|_| Error::MalformedByteToken {
                token: token.to_string(),
                position,
            })?;
        bytes.push(value);
    }

    Ok(bytes)
}

/// Render a payload as space-separated uppercase hex pairs, e.g. `1A 04 7F`.
pub fn format_payload(payload: &[u8]) -> String {
    payload
        .iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_canonical_builders() {
        assert_eq!(CommandRequest::led_on().payload(), &[0x01]);
        assert_eq!(CommandRequest::led_off().payload(), &[0x00]);
        assert_eq!(
            CommandRequest::preset_sequence().payload(),
            &[0x1A, 0x04, 0x7F, 0xF0, 0x64, 0x08]
        );
    }

    #[test]
    fn test_builders_are_idempotent() {
        // Repeated calls yield identical payloads, independent of order
        let first = CommandRequest::led_on();
        let _ = CommandRequest::led_off();
        let second = CommandRequest::led_on();
        assert_eq!(first, second);
        assert_eq!(CommandRequest::led_off(), CommandRequest::led_off());
    }

    #[test]
    fn test_custom_is_verbatim() {
        let request = CommandRequest::custom(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(request.payload(), &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(request.into_bytes().as_ref(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_parse_accepted_forms() {
        assert_eq!(
            parse_byte_tokens("0x1A 04, ff 0X00").unwrap(),
            vec![0x1A, 0x04, 0xFF, 0x00]
        );
        assert_eq!(parse_byte_tokens("1").unwrap(), vec![0x01]);
        assert_eq!(parse_byte_tokens("").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_byte_tokens("  , ,  ").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_parse_reports_token_and_position() {
        let err = parse_byte_tokens("01 zz 03").unwrap_err();
        match err {
            Error::MalformedByteToken { token, position } => {
                assert_eq!(token, "zz");
                assert_eq!(position, 1);
            }
            other => panic!("unexpected error: {other}"),
        }

        // Overlong token
        assert!(parse_byte_tokens("abc").is_err());
        // Bare prefix
        assert!(parse_byte_tokens("0x").is_err());
        // Sign characters are not hex digits
        assert!(parse_byte_tokens("+1").is_err());
    }

    #[test]
    fn test_from_text() {
        let request = CommandRequest::from_text("0x01").unwrap();
        assert_eq!(request, CommandRequest::led_on());
        assert!(CommandRequest::from_text("0x01 nope").is_err());
    }

    #[test]
    fn test_format_payload() {
        assert_eq!(format_payload(&[0x1A, 0x04, 0x7F]), "1A 04 7F");
        assert_eq!(format_payload(&[]), "");
        assert_eq!(format_payload(&[0x00]), "00");
    }

    proptest! {
        #[test]
        fn prop_rendered_payloads_parse_back(payload in proptest::collection::vec(any::<u8>(), 0..32)) {
            let text = format_payload(&payload);
            let parsed = parse_byte_tokens(&text).unwrap();
            prop_assert_eq!(parsed, payload);
        }
    }
}
