//! Protocol module containing the event types and the binary record codec.

pub mod codec;
pub mod event;
pub mod led;

pub use codec::{decode, encode, DecodeError, RECORD_SIZE};
pub use event::{Event, EventKind};
pub use led::{LedControlEvent, LED_CONTROL_CODE};
