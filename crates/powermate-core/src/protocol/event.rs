//! Generic PowerMate event type.
//!
//! Every record read from or written to the device decodes into an [`Event`].
//! The numeric kind values follow the Linux input ABI (`EV_SYN`, `EV_KEY`,
//! `EV_REL`, `EV_MSC`) so that records can be exchanged with the kernel
//! without translation.

use serde::{Deserialize, Serialize};

// ── Event kinds ───────────────────────────────────────────────────────────────

/// The closed set of event kinds understood by the driver.
///
/// Any other numeric kind found on the wire is rejected by
/// [`crate::protocol::codec::decode`] rather than silently defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EventKind {
    /// Synchronisation marker (`EV_SYN`); carries no user action.
    Null = 0x00,
    /// Button state change (`EV_KEY`): value 1 = down, 0 = up.
    Push = 0x01,
    /// Knob rotation (`EV_REL`): value is a signed step delta.
    Rotate = 0x02,
    /// Miscellaneous (`EV_MSC`): used for LED control records.
    Misc = 0x04,
    /// Application-only sentinel that ends the run loop.  Never produced by
    /// the hardware.
    Stop = 0x06,
}

impl EventKind {
    /// Returns the 16-bit ordinal used on the wire.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for EventKind {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(EventKind::Null),
            0x01 => Ok(EventKind::Push),
            0x02 => Ok(EventKind::Rotate),
            0x04 => Ok(EventKind::Misc),
            0x06 => Ok(EventKind::Stop),
            _ => Err(()),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────────────

/// A single hardware (or application) event.
///
/// The timestamp fields are the elapsed-time components reported by the
/// kernel.  They are only meaningful relative to each other, which is all the
/// dispatcher needs to compute how long the button was held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Whole seconds component of the timestamp.
    pub seconds: u32,
    /// Sub-second remainder of the timestamp, in microseconds.
    pub microseconds: u32,
    /// What kind of occurrence this is.
    pub kind: EventKind,
    /// Sub-channel selector (e.g. the LED control code for `Misc` events).
    pub code: u16,
    /// Signed magnitude: 0/1 for push, step delta for rotate, packed control
    /// word for LED events.
    pub value: i32,
}

impl Event {
    /// Creates an event from its five wire fields.
    pub fn new(seconds: u32, microseconds: u32, kind: EventKind, code: u16, value: i32) -> Self {
        Self {
            seconds,
            microseconds,
            kind,
            code,
            value,
        }
    }

    /// Returns the sentinel event that tells the run loop to stop.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use powermate_core::{Event, EventKind};
    ///
    /// let stop = Event::stop();
    /// assert_eq!(stop.kind, EventKind::Stop);
    /// assert_eq!(stop.value, 0);
    /// ```
    pub fn stop() -> Self {
        Self::new(0, 0, EventKind::Stop, 0, 0)
    }

    /// Returns the event timestamp in milliseconds.
    ///
    /// Computed as `seconds * 1000 + microseconds * 0.001` from the event's own
    /// fields, never from the wall clock.
    pub fn timestamp_ms(&self) -> f64 {
        f64::from(self.seconds) * 1000.0 + f64::from(self.microseconds) * 0.001
    }

    /// Returns `true` for a button-down event.
    pub fn is_press(&self) -> bool {
        self.kind == EventKind::Push && self.value != 0
    }

    /// Returns `true` for a button-up event.
    pub fn is_release(&self) -> bool {
        self.kind == EventKind::Push && self.value == 0
    }
}
