//! LED control events.
//!
//! The PowerMate LED is driven by writing a single `EV_MSC` / `MSC_PULSELED`
//! record whose `value` packs five settings into one word:
//!
//! | bits  | field         | range   |
//! |-------|---------------|---------|
//! | 0–7   | brightness    | 0–255   |
//! | 8–15  | pulse speed   | 0–255   |
//! | 17–18 | pulse type    | 0–3     |
//! | 19    | pulse asleep  | 0/1     |
//! | 20    | pulse awake   | 0/1     |
//!
//! The packed word is always derived from the sub-fields; there is no way to
//! set it directly.

use serde::{Deserialize, Serialize};

use crate::protocol::event::{Event, EventKind};

/// Event code selecting the LED pulse control channel (`MSC_PULSELED`).
pub const LED_CONTROL_CODE: u16 = 0x01;

/// Brightest possible LED setting.
pub const MAX_BRIGHTNESS: u8 = 255;

/// Fastest possible pulse speed.
pub const MAX_PULSE_SPEED: u8 = 255;

const PULSE_TYPE_MASK: u8 = 0b11;

/// An outgoing LED command.
///
/// # Examples
///
/// ```rust
/// use powermate_core::{Event, EventKind, LedControlEvent};
///
/// let half = LedControlEvent::percent(50.0);
/// assert_eq!(half.brightness(), 128);
///
/// let evt: Event = half.into();
/// assert_eq!(evt.kind, EventKind::Misc);
/// assert_eq!(evt.value, 128);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "LedSettings")]
pub struct LedControlEvent {
    brightness: u8,
    pulse_speed: u8,
    pulse_type: u8,
    asleep: bool,
    awake: bool,
}

/// Unvalidated field set read by serde; converted through
/// [`LedControlEvent::new`] so the pulse type is masked.
#[derive(Deserialize)]
struct LedSettings {
    brightness: u8,
    pulse_speed: u8,
    pulse_type: u8,
    asleep: bool,
    awake: bool,
}

impl From<LedSettings> for LedControlEvent {
    fn from(s: LedSettings) -> Self {
        Self::new(s.brightness, s.pulse_speed, s.pulse_type, s.asleep, s.awake)
    }
}

impl LedControlEvent {
    /// Creates an LED command from its five settings.
    ///
    /// `pulse_type` is a two-bit field; higher bits are discarded.
    pub fn new(brightness: u8, pulse_speed: u8, pulse_type: u8, asleep: bool, awake: bool) -> Self {
        Self {
            brightness,
            pulse_speed,
            pulse_type: pulse_type & PULSE_TYPE_MASK,
            asleep,
            awake,
        }
    }

    /// Slow pulsing at maximum speed in both the asleep and awake states.
    pub fn pulse() -> Self {
        Self::new(0, MAX_PULSE_SPEED, 2, true, true)
    }

    /// Steady light at maximum brightness.
    pub fn max() -> Self {
        Self::new(MAX_BRIGHTNESS, 0, 0, false, false)
    }

    /// LED off.
    pub fn off() -> Self {
        Self::new(0, 0, 0, false, false)
    }

    /// Steady light at `percent` of maximum brightness.
    ///
    /// The percentage is clamped to `[0, 100]` and scaled with half-up
    /// rounding, so `percent(50.0)` is 128 and `percent(25.0)` is 64.  NaN is
    /// treated as 0.
    pub fn percent(percent: f64) -> Self {
        let scaled = (percent.clamp(0.0, 100.0) / 100.0 * f64::from(MAX_BRIGHTNESS)).round();
        // `as` saturates and maps NaN to 0.
        Self::new(scaled as u8, 0, 0, false, false)
    }

    pub fn brightness(&self) -> u8 {
        self.brightness
    }

    pub fn pulse_speed(&self) -> u8 {
        self.pulse_speed
    }

    pub fn pulse_type(&self) -> u8 {
        self.pulse_type
    }

    pub fn asleep(&self) -> bool {
        self.asleep
    }

    pub fn awake(&self) -> bool {
        self.awake
    }

    pub fn set_brightness(&mut self, brightness: u8) {
        self.brightness = brightness;
    }

    pub fn set_pulse_speed(&mut self, pulse_speed: u8) {
        self.pulse_speed = pulse_speed;
    }

    /// Sets the pulse waveform; only the low two bits are kept.
    pub fn set_pulse_type(&mut self, pulse_type: u8) {
        self.pulse_type = pulse_type & PULSE_TYPE_MASK;
    }

    pub fn set_asleep(&mut self, asleep: bool) {
        self.asleep = asleep;
    }

    pub fn set_awake(&mut self, awake: bool) {
        self.awake = awake;
    }

    /// The packed control word written to the device.
    pub fn value(&self) -> i32 {
        i32::from(self.brightness)
            | (i32::from(self.pulse_speed) << 8)
            | (i32::from(self.pulse_type) << 17)
            | (i32::from(self.asleep) << 19)
            | (i32::from(self.awake) << 20)
    }

    /// Converts the command into a timestamp-free `Misc` event.
    pub fn to_event(&self) -> Event {
        Event::new(0, 0, EventKind::Misc, LED_CONTROL_CODE, self.value())
    }
}

impl From<LedControlEvent> for Event {
    fn from(led: LedControlEvent) -> Self {
        led.to_event()
    }
}
