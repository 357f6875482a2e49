//! Event dispatching for one sampling pass
//!
//! The [`Dispatcher`] owns all mutable engine state: the two port models and
//! every combo detector. It is constructed once at startup from the
//! validated configuration and handed to the sampling worker; nothing else
//! writes to port samples or detector state.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use evdev::Key;
use padmap_config::Config;

use crate::combo::ComboDetector;
use crate::keys;
use crate::panel::{PinCoord, Port, PINS_PER_PORT, PORT_COUNT};

/// One key event produced by a sampling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
}

pub struct Dispatcher {
    ports: [Port; PORT_COUNT],
    combos: Vec<ComboDetector>,
}

impl Dispatcher {
    /// Build the engine from a validated configuration, resolving key names.
    ///
    /// An unknown key name is a startup error: the sampling loop must never
    /// run against a partially resolved mapping table.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut ports = [Port::new(0), Port::new(1)];

        for button in &config.buttons {
            let coord = PinCoord::from_global(button.pin);
            let key = keys::parse_key(&button.key).ok_or_else(|| {
                anyhow!("unknown key '{}' for button pin {}", button.key, button.pin)
            })?;
            ports[coord.port as usize].map_pin(coord.pin, key);
            tracing::debug!(pin = button.pin, key = ?key, "mapped button");
        }

        for port in &mut ports {
            port.reset_idle();
        }

        let combos = config
            .combos
            .iter()
            .map(|c| {
                let key = keys::parse_key(&c.key).ok_or_else(|| {
                    anyhow!("unknown key '{}' for combo '{}'", c.key, c.name)
                })?;
                let watched = [
                    PinCoord::from_global(c.pins.0),
                    PinCoord::from_global(c.pins.1),
                ];
                tracing::debug!(
                    combo = %c.name,
                    pins = ?watched,
                    hold_seconds = c.hold_seconds,
                    "registered combo"
                );
                Ok(ComboDetector::new(
                    c.name.clone(),
                    watched,
                    Duration::from_secs(c.hold_seconds),
                    key,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { ports, combos })
    }

    /// Enabled-pin masks per port, in register-programming order.
    pub fn enabled_masks(&self) -> [u8; PORT_COUNT] {
        [self.ports[0].enabled_mask(), self.ports[1].enabled_mask()]
    }

    /// Every key code this engine can emit: direct button keys plus combo
    /// synthetics. Used to size the virtual device's key set.
    pub fn emittable_keys(&self) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .ports
            .iter()
            .flat_map(|p| (0..PINS_PER_PORT).filter_map(|pin| p.key_for(pin)))
            .collect();
        keys.extend(self.combos.iter().map(|c| c.synth_key()));
        keys.sort_unstable_by_key(|k| k.code());
        keys.dedup();
        keys
    }

    /// True when every port reads as idle (all buttons released). The
    /// sampler uses this to decide whether an interrupt-driven pass needs a
    /// follow-up tick.
    pub fn all_idle(&self) -> bool {
        self.ports
            .iter()
            .all(|p| p.last_sample() == p.enabled_mask())
    }

    /// Run one sampling pass for a single port.
    ///
    /// Per enabled pin, in ascending pin order: a changed pin first yields
    /// its direct key event, then the pin's (coordinate, level, changed)
    /// update is fed to every combo detector, changed or not - unchanged
    /// updates are what advance long hold timers. A firing detector appends
    /// its synthetic key as a press immediately followed by a release.
    /// Disabled pins yield nothing.
    pub fn process_sample(&mut self, port_index: u8, raw: u8, now: Instant) -> Vec<KeyEvent> {
        let port = &mut self.ports[port_index as usize];
        let sample = port.detect(raw);

        let mut events = Vec::new();

        for pin in 0..PINS_PER_PORT {
            if !port.is_enabled(pin) {
                continue;
            }

            let level = Port::level(sample.masked, pin);
            let changed = sample.changed & (1 << pin) != 0;

            if changed {
                if let Some(key) = port.key_for(pin) {
                    tracing::trace!(port = port_index, pin, pressed = level, key = ?key, "pin changed");
                    events.push(KeyEvent {
                        key,
                        pressed: level,
                    });
                }
            }

            let coord = PinCoord {
                port: port_index,
                pin,
            };
            for combo in &mut self.combos {
                if let Some(synth) = combo.update(coord, level, changed, now) {
                    events.push(KeyEvent {
                        key: synth,
                        pressed: true,
                    });
                    events.push(KeyEvent {
                        key: synth,
                        pressed: false,
                    });
                }
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use padmap_config::{ButtonConfig, ComboConfig};

    /// Mirrors the classic panel: pins 0 and 1 on port A, pin 5 on port A,
    /// plus a zero-hold coin combo over pins 1 and 13 (port B pin 5).
    fn test_config() -> Config {
        Config {
            buttons: vec![
                ButtonConfig { pin: 0, key: "1".into() },
                ButtonConfig { pin: 1, key: "LeftCtrl".into() },
                ButtonConfig { pin: 5, key: "5".into() },
                ButtonConfig { pin: 13, key: "A".into() },
            ],
            combos: vec![ComboConfig {
                name: "coin".into(),
                pins: (1, 13),
                hold_seconds: 0,
                key: "C".into(),
            }],
            ..Config::default()
        }
    }

    #[test]
    fn build_rejects_unknown_key_names() {
        let mut config = test_config();
        config.buttons[0].key = "NotAKey".into();
        assert!(Dispatcher::from_config(&config).is_err());

        let mut config = test_config();
        config.combos[0].key = "AlsoNotAKey".into();
        assert!(Dispatcher::from_config(&config).is_err());
    }

    #[test]
    fn enabled_masks_follow_the_button_table() {
        let dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        assert_eq!(dispatcher.enabled_masks(), [0b0010_0011, 0b0010_0000]);
    }

    #[test]
    fn emittable_keys_cover_buttons_and_synthetics() {
        let dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let keys = dispatcher.emittable_keys();
        for key in [Key::KEY_1, Key::KEY_LEFTCTRL, Key::KEY_5, Key::KEY_A, Key::KEY_C] {
            assert!(keys.contains(&key), "missing {:?}", key);
        }
    }

    #[test]
    fn two_buttons_pressed_in_one_pass_emit_in_pin_order() {
        let mut dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let now = Instant::now();

        // Idle-high sample, then pins 0 and 1 pulled low together.
        let events = dispatcher.process_sample(0, 0b0010_0000, now);

        // Direct events first in pin order, then the combo fires from the
        // pin-1 update (its port-B partner is still idle, so it does not).
        assert_eq!(events[0], KeyEvent { key: Key::KEY_1, pressed: true });
        assert_eq!(events[1], KeyEvent { key: Key::KEY_LEFTCTRL, pressed: true });
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn releases_emit_release_events() {
        let mut dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let now = Instant::now();

        dispatcher.process_sample(0, 0b0010_0010, now); // press pin 0
        let events = dispatcher.process_sample(0, 0b0010_0011, now); // release

        assert_eq!(events, vec![KeyEvent { key: Key::KEY_1, pressed: false }]);
    }

    #[test]
    fn disabled_pins_never_produce_events() {
        let mut dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let now = Instant::now();

        // Pins 2, 3, 4, 6, 7 wiggle on port A; none are enabled.
        let events = dispatcher.process_sample(0, 0b1101_1100 | 0b0010_0011, now);
        assert!(events.is_empty());
    }

    #[test]
    fn coin_combo_across_ports_fires_once_as_a_tap() {
        let mut dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let now = Instant::now();

        // Press pin 1 (port A); combo armed at count 1, nothing fires.
        let events = dispatcher.process_sample(0, 0b0010_0001, now);
        assert_eq!(events, vec![KeyEvent { key: Key::KEY_LEFTCTRL, pressed: true }]);

        // Press pin 13 (port B pin 5): direct event, then the synthetic tap.
        let events = dispatcher.process_sample(1, 0b0000_0000, now);
        assert_eq!(
            events,
            vec![
                KeyEvent { key: Key::KEY_A, pressed: true },
                KeyEvent { key: Key::KEY_C, pressed: true },
                KeyEvent { key: Key::KEY_C, pressed: false },
            ]
        );

        // Releasing both produces only the direct releases, no synthetic.
        let events = dispatcher.process_sample(0, 0b0010_0011, now);
        assert_eq!(events, vec![KeyEvent { key: Key::KEY_LEFTCTRL, pressed: false }]);
        let events = dispatcher.process_sample(1, 0b0010_0000, now);
        assert_eq!(events, vec![KeyEvent { key: Key::KEY_A, pressed: false }]);
    }

    #[test]
    fn held_zero_hold_combo_does_not_refire_on_later_passes() {
        let mut dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let t0 = Instant::now();

        // Both combo pins pressed and then simply held.
        dispatcher.process_sample(0, 0b0010_0001, t0);
        let events = dispatcher.process_sample(1, 0b0000_0000, t0);
        let taps = events.iter().filter(|e| e.key == Key::KEY_C && e.pressed).count();
        assert_eq!(taps, 1);

        // Subsequent passes see the same held levels; the synthetic key
        // must not repeat, at any rate, until a release and re-press.
        for tick in 1..=3u64 {
            let now = t0 + Duration::from_millis(20 * tick);
            assert!(dispatcher.process_sample(0, 0b0010_0001, now).is_empty());
            assert!(dispatcher.process_sample(1, 0b0000_0000, now).is_empty());
        }
    }

    #[test]
    fn held_combo_fires_after_hold_threshold_on_a_later_pass() {
        let mut config = test_config();
        config.combos[0].hold_seconds = 3;
        let mut dispatcher = Dispatcher::from_config(&config).unwrap();

        let t0 = Instant::now();
        dispatcher.process_sample(0, 0b0010_0001, t0);
        assert_eq!(dispatcher.process_sample(1, 0b0000_0000, t0).len(), 1);

        // Unchanged samples keep feeding the detectors; before the
        // threshold they stay silent.
        let early = t0 + Duration::from_secs(1);
        assert!(dispatcher.process_sample(0, 0b0010_0001, early).is_empty());
        assert!(dispatcher.process_sample(1, 0b0000_0000, early).is_empty());

        // First pass at the threshold fires the tap.
        let late = t0 + Duration::from_secs(3);
        let events = dispatcher.process_sample(0, 0b0010_0001, late);
        assert_eq!(
            events,
            vec![
                KeyEvent { key: Key::KEY_C, pressed: true },
                KeyEvent { key: Key::KEY_C, pressed: false },
            ]
        );
    }

    #[test]
    fn idle_tracking_spans_both_ports() {
        let mut dispatcher = Dispatcher::from_config(&test_config()).unwrap();
        let now = Instant::now();
        assert!(dispatcher.all_idle());

        dispatcher.process_sample(1, 0b0000_0000, now);
        assert!(!dispatcher.all_idle());

        dispatcher.process_sample(1, 0b0010_0000, now);
        assert!(dispatcher.all_idle());
    }
}
