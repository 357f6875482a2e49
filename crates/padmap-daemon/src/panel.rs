//! Port model and change detection
//!
//! The expander exposes two 8-bit GPIO banks. Each [`Port`] records which of
//! its pins are wired to buttons, which key each pin emits, and the masked
//! value of the previous sampling pass. Change detection is a single-step
//! bitwise diff: no history, no debounce.
//!
//! Wiring is active-low (pull-up resistors; a pressed button pulls the line
//! low), so the logical "pressed" level of a pin is the inverse of its raw
//! bit.

use evdev::Key;

/// Number of 8-bit ports on the expander.
pub const PORT_COUNT: usize = 2;

/// Pins per port.
pub const PINS_PER_PORT: u8 = 8;

/// A global pin coordinate: port 0 covers pins 0-7, port 1 covers pins 8-15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinCoord {
    pub port: u8,
    pub pin: u8,
}

impl PinCoord {
    /// Split a global pin number (0-15) into (port, pin-within-port).
    pub fn from_global(pin: u8) -> Self {
        Self {
            port: pin / PINS_PER_PORT,
            pin: pin % PINS_PER_PORT,
        }
    }
}

impl std::fmt::Display for PinCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.port, self.pin)
    }
}

/// Result of one change-detection step over a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Raw value restricted to the enabled pins.
    pub masked: u8,
    /// Bits set exactly where the masked value differs from the previous pass.
    pub changed: u8,
}

/// One 8-bit GPIO bank: enabled-pin mask, pin-to-key table, and the masked
/// sample from the previous pass.
#[derive(Debug)]
pub struct Port {
    index: u8,
    enabled_mask: u8,
    last_sample: u8,
    pin_keys: [Option<Key>; 8],
}

impl Port {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            enabled_mask: 0,
            last_sample: 0,
            pin_keys: [None; 8],
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn enabled_mask(&self) -> u8 {
        self.enabled_mask
    }

    pub fn last_sample(&self) -> u8 {
        self.last_sample
    }

    /// Wire a pin to a key, enabling it. Pins never mapped stay disabled and
    /// are skipped by the dispatcher entirely.
    pub fn map_pin(&mut self, pin: u8, key: Key) {
        debug_assert!(pin < PINS_PER_PORT);
        self.enabled_mask |= 1 << pin;
        self.pin_keys[pin as usize] = Some(key);
    }

    /// Seed `last_sample` with the idle value (all enabled pins high, i.e.
    /// all buttons released). Called once after the pin table is built so
    /// the first pass does not report phantom releases.
    pub fn reset_idle(&mut self) {
        self.last_sample = self.enabled_mask;
    }

    pub fn is_enabled(&self, pin: u8) -> bool {
        self.enabled_mask & (1 << pin) != 0
    }

    pub fn key_for(&self, pin: u8) -> Option<Key> {
        self.pin_keys[pin as usize]
    }

    /// Change detection over a freshly read register value.
    ///
    /// Masks the raw byte to the enabled pins, diffs it bitwise against the
    /// previous pass, and unconditionally replaces `last_sample` with the
    /// new masked value. Bits outside `enabled_mask` can never appear in
    /// `changed` because the raw byte is masked first.
    pub fn detect(&mut self, raw: u8) -> Sample {
        let masked = raw & self.enabled_mask;
        let changed = masked ^ self.last_sample;
        self.last_sample = masked;
        Sample { masked, changed }
    }

    /// Logical level of a pin in a masked sample: active-low, so a pressed
    /// button reads as a zero bit.
    pub fn level(masked: u8, pin: u8) -> bool {
        masked & (1 << pin) == 0
    }
}
