//! Integration tests for the powermate-core record codec.
//!
//! These tests exercise the public API end-to-end: event construction, LED
//! packing, encoding, and decoding of captured device bytes.

use powermate_core::{
    decode, encode, DecodeError, Event, EventKind, LedControlEvent, LED_CONTROL_CODE, RECORD_SIZE,
};

/// One button-down record captured from a PowerMate on x86_64 Linux.
#[cfg(all(target_pointer_width = "64", target_endian = "little"))]
const CAPTURED_PUSH: [u8; 24] = [
    0x8f, 0x0a, 0x16, 0x00, 0x00, 0x00, 0x00, 0x00, // seconds = 1_444_495
    0x84, 0x10, 0x18, 0xb6, 0x00, 0x00, 0x00, 0x00, // microseconds = 3_055_030_404
    0x01, 0x00, // kind = Push
    0x00, 0x01, // code = 256 (BTN_0)
    0x01, 0x00, 0x00, 0x00, // value = 1
];

fn roundtrip(evt: Event) -> Event {
    let bytes = encode(&evt);
    assert_eq!(bytes.len(), RECORD_SIZE);
    decode(&bytes).expect("decode must succeed")
}

#[cfg(all(target_pointer_width = "64", target_endian = "little"))]
#[test]
fn test_decode_captured_push_record() {
    let evt = decode(&CAPTURED_PUSH).expect("captured record must decode");

    assert_eq!(evt.seconds, 1_444_495);
    assert_eq!(evt.microseconds, 3_055_030_404);
    assert_eq!(evt.kind, EventKind::Push);
    assert_eq!(evt.code, 256);
    assert_eq!(evt.value, 1);
}

#[cfg(all(target_pointer_width = "64", target_endian = "little"))]
#[test]
fn test_encode_reproduces_captured_push_record() {
    let evt = Event::new(1_444_495, 3_055_030_404, EventKind::Push, 256, 1);
    assert_eq!(encode(&evt), CAPTURED_PUSH);
}

#[test]
fn test_roundtrip_every_event_kind() {
    let events = [
        Event::new(0, 0, EventKind::Null, 0, 0),
        Event::new(23_434_040, 340_340, EventKind::Push, 0x100, 1),
        Event::new(23_438_140, 340_340, EventKind::Rotate, 0x07, -2),
        LedControlEvent::pulse().to_event(),
        Event::stop(),
    ];

    for evt in events {
        assert_eq!(roundtrip(evt), evt);
    }
}

#[test]
fn test_roundtrip_extreme_field_values() {
    let evt = Event::new(u32::MAX, u32::MAX, EventKind::Rotate, u16::MAX, i32::MIN);
    assert_eq!(roundtrip(evt), evt);
}

#[test]
fn test_led_command_survives_the_wire() {
    // Arrange
    let led = LedControlEvent::new(200, 17, 1, false, true);

    // Act
    let decoded = roundtrip(led.into());

    // Assert
    assert_eq!(decoded.kind, EventKind::Misc);
    assert_eq!(decoded.code, LED_CONTROL_CODE);
    assert_eq!(decoded.value, led.value());
}

#[test]
fn test_decode_consecutive_records_from_one_buffer() {
    // Arrange: three records back to back, as a single device read would return.
    let events = [
        Event::new(5, 0, EventKind::Push, 0x100, 1),
        Event::new(5, 10, EventKind::Null, 0, 0),
        Event::new(5, 900_000, EventKind::Push, 0x100, 0),
    ];
    let stream: Vec<u8> = events.iter().flat_map(|e| encode(e)).collect();

    // Act
    let decoded: Vec<Event> = stream
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| {
            let record: &[u8; RECORD_SIZE] = chunk.try_into().expect("exact chunk");
            decode(record).expect("valid record")
        })
        .collect();

    // Assert
    assert_eq!(decoded, events);
}

#[test]
fn test_unknown_kind_is_reported_not_defaulted() {
    // EV_ABS (0x03) is a real evdev kind the PowerMate never produces.
    let mut bytes = encode(&Event::new(1, 1, EventKind::Push, 0, 1));
    let kind_offset = RECORD_SIZE - 8;
    bytes[kind_offset..kind_offset + 2].copy_from_slice(&0x03u16.to_ne_bytes());

    assert_eq!(decode(&bytes), Err(DecodeError::InvalidKind(0x03)));
}
