//! Wire format of the temperature beacon frame.
//!
//! Every beacon is a standard data frame on [`BEACON_ID`] with a fixed
//! three-byte payload: a status marker followed by the temperature as a
//! little-endian fixed-point value in tenths of a degree Celsius.
//!
//! ```text
//! byte 0   STATUS_OK (0xC3)
//! byte 1   (celsius * 10) & 0xFF
//! byte 2   (celsius * 10) >> 8
//! ```

use crate::frame::StandardId;

/// Identifier every beacon frame is sent on.
pub const BEACON_ID: StandardId = match StandardId::new(0x1AB) {
    Some(id) => id,
    None => unreachable!(),
};

/// Payload length of a beacon frame.
pub const BEACON_DLC: usize = 3;

/// Status marker carried in byte 0.
pub const STATUS_OK: u8 = 0xC3;

/// Fixed-point scale: one count is a tenth of a degree.
pub const TEMPERATURE_SCALE: f32 = 10.0;

/// Encodes a temperature reading into a beacon payload.
///
/// The reading is scaled to tenths of a degree and truncated toward zero, so
/// 25.53 °C goes on the wire as 25.5 °C. Readings outside the representable
/// range 0.0..=6553.5 saturate at the nearest end.
pub fn encode_temperature(celsius: f32) -> [u8; BEACON_DLC] {
    let counts = (celsius * TEMPERATURE_SCALE) as u16;
    let [low, high] = counts.to_le_bytes();
    [STATUS_OK, low, high]
}

/// Decodes a beacon payload back into degrees Celsius.
///
/// Returns `None` if the payload is shorter than [`BEACON_DLC`] or does not
/// carry the [`STATUS_OK`] marker.
pub fn decode_temperature(payload: &[u8]) -> Option<f32> {
    if payload.len() < BEACON_DLC || payload[0] != STATUS_OK {
        return None;
    }
    let counts = u16::from_le_bytes([payload[1], payload[2]]);
    Some(counts as f32 / TEMPERATURE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_one_decimal_fixed_point() {
        assert_eq!(encode_temperature(25.5), [0xC3, 0xFF, 0x00]);
        assert_eq!(encode_temperature(0.0), [0xC3, 0x00, 0x00]);
        // 102.4 * 10 = 1024 = 0x0400: the high byte carries data.
        assert_eq!(encode_temperature(102.4), [0xC3, 0x00, 0x04]);
    }

    #[test]
    fn truncates_toward_zero() {
        // 25.53 scales to 255.3 counts; the extra hundredths are dropped.
        assert_eq!(encode_temperature(25.53), [0xC3, 0xFF, 0x00]);
        assert_eq!(decode_temperature(&encode_temperature(25.53)), Some(25.5));
    }

    #[test]
    fn saturates_outside_the_representable_range() {
        assert_eq!(encode_temperature(-5.0), [0xC3, 0x00, 0x00]);
        assert_eq!(encode_temperature(7000.0), [0xC3, 0xFF, 0xFF]);
        assert_eq!(decode_temperature(&[0xC3, 0xFF, 0xFF]), Some(6553.5));
    }

    #[test]
    fn round_trips_exact_tenths() {
        for celsius in [0.0, 0.1, 25.5, 36.7, 6553.5] {
            let payload = encode_temperature(celsius);
            let decoded = decode_temperature(&payload).unwrap();
            assert!(
                (decoded - celsius).abs() < 0.05,
                "{celsius} decoded as {decoded}"
            );
        }
    }

    #[test]
    fn rejects_foreign_payloads() {
        assert_eq!(decode_temperature(&[0x00, 0xFF, 0x00]), None);
        assert_eq!(decode_temperature(&[0xC3, 0xFF]), None);
        assert_eq!(decode_temperature(&[]), None);
    }
}
