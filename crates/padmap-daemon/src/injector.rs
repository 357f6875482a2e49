//! Key injection via uinput
//!
//! The daemon presents the panel to the host as a virtual keyboard. Only
//! the key codes the configuration can actually produce are registered,
//! so the device advertises an honest capability set.

use anyhow::Result;
use evdev::uinput::VirtualDeviceBuilder;
use evdev::{AttributeSet, InputEvent, Key};

/// Destination for key events. The production implementation is the uinput
/// [`VirtualDevice`]; tests substitute a recording sink.
pub trait KeySink {
    /// Forward one key event to the host input subsystem. Fire-and-forget
    /// from the engine's point of view; errors are the caller's concern.
    fn emit_key(&mut self, key: Key, pressed: bool) -> Result<()>;
}

/// A virtual keyboard device for injecting panel events
pub struct VirtualDevice {
    device: evdev::uinput::VirtualDevice,
}

impl VirtualDevice {
    /// Create a virtual keyboard advertising exactly the given key set.
    ///
    /// # Errors
    ///
    /// Fails if the device cannot be created, typically for lack of
    /// permission on /dev/uinput.
    pub fn new_keyboard(name: &str, keys: &[Key]) -> Result<Self> {
        let mut key_set = AttributeSet::<Key>::new();
        for key in keys {
            key_set.insert(*key);
        }

        let device = VirtualDeviceBuilder::new()?
            .name(name)
            .with_keys(&key_set)?
            .build()?;

        Ok(Self { device })
    }
}

impl KeySink for VirtualDevice {
    fn emit_key(&mut self, key: Key, pressed: bool) -> Result<()> {
        let value = if pressed { 1 } else { 0 };
        let event = InputEvent::new(evdev::EventType::KEY, key.code(), value);
        let syn = InputEvent::new(evdev::EventType::SYNCHRONIZATION, 0, 0);
        self.device.emit(&[event, syn])?;
        Ok(())
    }
}
