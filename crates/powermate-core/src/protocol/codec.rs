//! Binary codec for the PowerMate record format.
//!
//! Wire format (one record, native byte order, no padding):
//! ```text
//! [seconds:long][microseconds:long][kind:2][code:2][value:4]
//! ```
//! `long` is the host C `long`, so a record is 24 bytes on 64-bit Linux and
//! 16 bytes on 32-bit Linux.  This is exactly the kernel's
//! `struct input_event`, which is why no byte swapping is performed.
//!
//! Input records (read from the device) and output records (LED commands
//! written to the device) share this layout; they differ only in `kind` and
//! `code`.

use std::mem::size_of;

use thiserror::Error;

use crate::protocol::event::{Event, EventKind};

/// Width in bytes of each timestamp field (the host C `long`).
pub const TIME_FIELD_SIZE: usize = size_of::<isize>();

/// Total size of one record in bytes.
pub const RECORD_SIZE: usize = 2 * TIME_FIELD_SIZE + 2 + 2 + 4;

const KIND_OFFSET: usize = 2 * TIME_FIELD_SIZE;
const CODE_OFFSET: usize = KIND_OFFSET + 2;
const VALUE_OFFSET: usize = CODE_OFFSET + 2;

/// Errors that can occur while decoding a record.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The kind field is not one of the [`EventKind`] enumerators.
    #[error("invalid event kind: 0x{0:04X}")]
    InvalidKind(u16),
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes an [`Event`] into exactly one record.
///
/// Encoding is total: every field of [`Event`] is in range by construction.
///
/// # Examples
///
/// ```rust
/// use powermate_core::{decode, encode, Event, EventKind};
///
/// let evt = Event::new(10, 500, EventKind::Rotate, 0x07, -2);
/// let bytes = encode(&evt);
/// assert_eq!(decode(&bytes).unwrap(), evt);
/// ```
pub fn encode(event: &Event) -> [u8; RECORD_SIZE] {
    let mut buf = [0u8; RECORD_SIZE];

    // The u32 -> isize cast keeps the bit pattern on 32-bit hosts, so decode
    // recovers the value either way.
    write_time_field(&mut buf, 0, event.seconds);
    write_time_field(&mut buf, TIME_FIELD_SIZE, event.microseconds);
    buf[KIND_OFFSET..CODE_OFFSET].copy_from_slice(&event.kind.as_u16().to_ne_bytes());
    buf[CODE_OFFSET..VALUE_OFFSET].copy_from_slice(&event.code.to_ne_bytes());
    buf[VALUE_OFFSET..RECORD_SIZE].copy_from_slice(&event.value.to_ne_bytes());

    buf
}

/// Decodes one record into an [`Event`].
///
/// The array type guarantees the caller supplies exactly one record, so the
/// only possible failure is an unrecognised kind.
///
/// # Errors
///
/// Returns [`DecodeError::InvalidKind`] if the kind field does not match a
/// known [`EventKind`].
pub fn decode(bytes: &[u8; RECORD_SIZE]) -> Result<Event, DecodeError> {
    let raw_kind = u16::from_ne_bytes([bytes[KIND_OFFSET], bytes[KIND_OFFSET + 1]]);
    let kind = EventKind::try_from(raw_kind).map_err(|_| DecodeError::InvalidKind(raw_kind))?;

    Ok(Event {
        seconds: read_time_field(bytes, 0),
        microseconds: read_time_field(bytes, TIME_FIELD_SIZE),
        kind,
        code: u16::from_ne_bytes([bytes[CODE_OFFSET], bytes[CODE_OFFSET + 1]]),
        value: i32::from_ne_bytes([
            bytes[VALUE_OFFSET],
            bytes[VALUE_OFFSET + 1],
            bytes[VALUE_OFFSET + 2],
            bytes[VALUE_OFFSET + 3],
        ]),
    })
}

// ── Field helpers ─────────────────────────────────────────────────────────────

fn write_time_field(buf: &mut [u8; RECORD_SIZE], offset: usize, value: u32) {
    buf[offset..offset + TIME_FIELD_SIZE].copy_from_slice(&(value as isize).to_ne_bytes());
}

fn read_time_field(bytes: &[u8; RECORD_SIZE], offset: usize) -> u32 {
    let mut raw = [0u8; TIME_FIELD_SIZE];
    raw.copy_from_slice(&bytes[offset..offset + TIME_FIELD_SIZE]);
    // Kernel timestamps fit in 32 bits until 2106; the upper half is dropped.
    isize::from_ne_bytes(raw) as u32
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size_matches_host_input_event() {
        assert_eq!(RECORD_SIZE, 2 * size_of::<isize>() + 8);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(RECORD_SIZE, 24);
    }

    #[test]
    fn test_encode_places_kind_code_and_value_after_timestamps() {
        // Arrange
        let evt = Event::new(1, 2, EventKind::Misc, 0x01, 0x0012_34FF);

        // Act
        let bytes = encode(&evt);

        // Assert
        assert_eq!(&bytes[KIND_OFFSET..CODE_OFFSET], &0x04u16.to_ne_bytes());
        assert_eq!(&bytes[CODE_OFFSET..VALUE_OFFSET], &0x01u16.to_ne_bytes());
        assert_eq!(&bytes[VALUE_OFFSET..], &0x0012_34FFi32.to_ne_bytes());
    }

    #[test]
    fn test_decode_roundtrips_negative_rotation() {
        let evt = Event::new(23_438_140, 340_340, EventKind::Rotate, 0x07, -3);
        assert_eq!(decode(&encode(&evt)), Ok(evt));
    }

    #[test]
    fn test_decode_roundtrips_timestamp_above_i32_max() {
        // 3_055_030_404 does not fit an i32 but is a valid u32.
        let evt = Event::new(1_444_495, 3_055_030_404, EventKind::Push, 256, 1);
        assert_eq!(decode(&encode(&evt)), Ok(evt));
    }

    #[test]
    fn test_decode_rejects_unknown_kind() {
        // Arrange: start from a valid record and corrupt the kind field.
        let mut bytes = encode(&Event::new(0, 0, EventKind::Push, 0, 1));
        bytes[KIND_OFFSET..CODE_OFFSET].copy_from_slice(&0x03u16.to_ne_bytes());

        // Act
        let result = decode(&bytes);

        // Assert
        assert_eq!(result, Err(DecodeError::InvalidKind(0x03)));
    }

    #[test]
    fn test_decode_error_message_shows_hex_kind() {
        assert_eq!(
            DecodeError::InvalidKind(0x1F).to_string(),
            "invalid event kind: 0x001F"
        );
    }

    #[test]
    fn test_stop_event_encodes_ordinal_six() {
        let bytes = encode(&Event::stop());
        assert_eq!(&bytes[KIND_OFFSET..CODE_OFFSET], &6u16.to_ne_bytes());
        assert!(bytes[..KIND_OFFSET].iter().all(|b| *b == 0));
    }
}
