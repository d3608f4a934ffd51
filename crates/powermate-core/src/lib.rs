//! # powermate-core
//!
//! Shared library for the PowerMate driver containing the binary record codec
//! and the event types that travel across it.
//!
//! This crate has zero dependencies on OS APIs, async runtimes, or device
//! files, so it can be unit-tested and benchmarked on any platform.
//!
//! # Architecture overview (for beginners)
//!
//! The Griffin PowerMate is a USB rotary knob with a push button and a blue
//! LED in its base.  On Linux the kernel exposes it as an *evdev* character
//! device (e.g. `/dev/input/event7`).  Reading that file yields a stream of
//! fixed-size binary records; writing the same record layout back to the file
//! changes the LED.
//!
//! - **`protocol::codec`** – How one record is laid out in bytes, and the
//!   `encode`/`decode` pair that converts between bytes and [`Event`].
//!
//! - **`protocol::event`** – The generic [`Event`] value type and its closed
//!   [`EventKind`] enumeration.
//!
//! - **`protocol::led`** – [`LedControlEvent`], which packs five LED settings
//!   (brightness, pulse speed, pulse type, asleep/awake pulsing) into the
//!   single `value` word the hardware understands.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `powermate_core::Event` instead of `powermate_core::protocol::event::Event`.
pub use protocol::codec::{decode, encode, DecodeError, RECORD_SIZE};
pub use protocol::event::{Event, EventKind};
pub use protocol::led::{LedControlEvent, LED_CONTROL_CODE};
