//! Timed multi-button gesture detection
//!
//! A [`ComboDetector`] watches two pin coordinates and fires a synthetic key
//! once both have been active together for at least the hold threshold. The
//! detector is fed every pin update of every sampling pass and ignores
//! coordinates it does not watch; the dispatcher never pre-filters.
//!
//! # State machine
//!
//! Two states: idle (not all watched pins active) and armed (all active,
//! timer running). Firing is an action, not a state - the detector forces
//! both slots inactive on fire, so one physical hold fires exactly once and
//! both buttons must be released and re-pressed to repeat. Slots only move
//! on changed updates; an unchanged held-level update after a fire cannot
//! re-arm the gesture, however long the buttons stay down.
//!
//! Elapsed time is only checked when an update for a watched coordinate
//! arrives; there is no independent timer. Under polling this means a hold
//! fires on the first pass at or after the threshold.

use std::time::{Duration, Instant};

use evdev::Key;

use crate::panel::PinCoord;

/// Number of watched pins per gesture; every gesture watches a pair and
/// arms only when both are active.
pub const WATCHED_PINS: usize = 2;

#[derive(Debug)]
pub struct ComboDetector {
    /// Name used in diagnostics ("coin", "quit", ...).
    name: String,
    watched: [PinCoord; WATCHED_PINS],
    hold: Duration,
    /// Current logical level of each watched pin, updated independently.
    states: [bool; WATCHED_PINS],
    /// When all watched pins last became active; `None` while any is not.
    armed_since: Option<Instant>,
    synth_key: Key,
}

impl ComboDetector {
    pub fn new(
        name: impl Into<String>,
        watched: [PinCoord; WATCHED_PINS],
        hold: Duration,
        synth_key: Key,
    ) -> Self {
        Self {
            name: name.into(),
            watched,
            hold,
            states: [false; WATCHED_PINS],
            armed_since: None,
            synth_key,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn synth_key(&self) -> Key {
        self.synth_key
    }

    fn active_count(&self) -> usize {
        self.states.iter().filter(|&&s| s).count()
    }

    /// Feed one pin update. Updates for coordinates this detector does not
    /// watch are no-ops.
    ///
    /// `changed` marks a real edge; only changed updates move a slot.
    /// Unchanged updates still advance the hold check, so a long hold fires
    /// on whatever pass crosses the threshold.
    ///
    /// Returns the synthetic key when the gesture fires. The caller emits it
    /// as a deterministic press-then-release tap; the incidental level of
    /// the update that happened to cross the threshold is deliberately not
    /// propagated.
    pub fn update(
        &mut self,
        coord: PinCoord,
        level: bool,
        changed: bool,
        now: Instant,
    ) -> Option<Key> {
        let slot = self.watched.iter().position(|w| *w == coord)?;

        if changed {
            let prev_active = self.active_count();
            self.states[slot] = level;
            let next_active = self.active_count();

            if prev_active < WATCHED_PINS && next_active == WATCHED_PINS {
                tracing::debug!(combo = %self.name, "combo armed");
                self.armed_since = Some(now);
            } else if prev_active == WATCHED_PINS && next_active < WATCHED_PINS {
                // Gesture aborted before firing; no event.
                tracing::debug!(combo = %self.name, "combo disarmed");
                self.armed_since = None;
            }
        }

        if let Some(since) = self.armed_since {
            if now.duration_since(since) >= self.hold {
                tracing::info!(combo = %self.name, key = ?self.synth_key, "combo fired");
                self.armed_since = None;
                self.states = [false; WATCHED_PINS];
                return Some(self.synth_key);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIN_A: PinCoord = PinCoord { port: 0, pin: 1 };
    const PIN_B: PinCoord = PinCoord { port: 1, pin: 5 };
    const OTHER: PinCoord = PinCoord { port: 0, pin: 3 };

    fn coin_combo(hold: Duration) -> ComboDetector {
        ComboDetector::new("coin", [PIN_A, PIN_B], hold, Key::KEY_C)
    }

    #[test]
    fn zero_hold_fires_on_second_press() {
        let now = Instant::now();
        let mut combo = coin_combo(Duration::ZERO);

        assert_eq!(combo.update(PIN_A, true, true, now), None);
        assert_eq!(combo.update(PIN_B, true, true, now), Some(Key::KEY_C));
    }

    #[test]
    fn zero_hold_fires_in_either_press_order() {
        let now = Instant::now();
        let mut combo = coin_combo(Duration::ZERO);

        assert_eq!(combo.update(PIN_B, true, true, now), None);
        assert_eq!(combo.update(PIN_A, true, true, now), Some(Key::KEY_C));
    }

    #[test]
    fn fires_exactly_once_per_hold() {
        let now = Instant::now();
        let mut combo = coin_combo(Duration::ZERO);

        combo.update(PIN_A, true, true, now);
        assert!(combo.update(PIN_B, true, true, now).is_some());

        // The electrical state still shows both pins held, but the detector
        // forced its slots inactive on fire: further held-level updates and
        // the eventual releases must stay silent.
        let later = now + Duration::from_millis(40);
        assert_eq!(combo.update(PIN_A, true, false, later), None);
        assert_eq!(combo.update(PIN_B, true, false, later), None);
        assert_eq!(combo.update(PIN_A, false, true, later), None);
        assert_eq!(combo.update(PIN_B, false, true, later), None);
    }

    #[test]
    fn held_levels_after_a_fire_never_rearm() {
        let t0 = Instant::now();
        let mut combo = coin_combo(Duration::ZERO);

        combo.update(PIN_A, true, true, t0);
        assert!(combo.update(PIN_B, true, true, t0).is_some());

        // Poll-mode passes keep reporting the held levels as unchanged.
        // However many arrive, nothing fires again.
        for tick in 1..50u64 {
            let now = t0 + Duration::from_millis(20 * tick);
            assert_eq!(combo.update(PIN_A, true, false, now), None);
            assert_eq!(combo.update(PIN_B, true, false, now), None);
        }
    }

    #[test]
    fn refires_after_full_release_and_repress() {
        let now = Instant::now();
        let mut combo = coin_combo(Duration::ZERO);

        combo.update(PIN_A, true, true, now);
        assert!(combo.update(PIN_B, true, true, now).is_some());

        combo.update(PIN_A, false, true, now);
        combo.update(PIN_B, false, true, now);

        combo.update(PIN_A, true, true, now);
        assert!(combo.update(PIN_B, true, true, now).is_some());
    }

    #[test]
    fn unrelated_coordinates_are_ignored() {
        let now = Instant::now();
        let mut combo = coin_combo(Duration::ZERO);

        combo.update(PIN_A, true, true, now);
        // An active unrelated pin must not contribute to the count.
        assert_eq!(combo.update(OTHER, true, true, now), None);
        assert_eq!(combo.active_count(), 1);
    }

    #[test]
    fn hold_threshold_delays_firing_until_a_late_update() {
        let hold = Duration::from_secs(3);
        let armed_at = Instant::now();
        let mut combo = coin_combo(hold);

        combo.update(PIN_A, true, true, armed_at);
        assert_eq!(combo.update(PIN_B, true, true, armed_at), None);

        // Unchanged updates before the threshold keep it armed but silent.
        let early = armed_at + Duration::from_secs(1);
        assert_eq!(combo.update(PIN_A, true, false, early), None);

        // The first update at/after the threshold fires, even though the
        // levels did not change. With no update arriving, nothing would
        // ever fire - there is no internal timer.
        let late = armed_at + hold;
        assert_eq!(combo.update(PIN_B, true, false, late), Some(Key::KEY_C));
    }

    #[test]
    fn release_before_threshold_aborts_without_firing() {
        let hold = Duration::from_secs(3);
        let armed_at = Instant::now();
        let mut combo = coin_combo(hold);

        combo.update(PIN_A, true, true, armed_at);
        combo.update(PIN_B, true, true, armed_at);

        // One pin drops out before the hold elapses: gesture aborted.
        let released_at = armed_at + Duration::from_secs(1);
        assert_eq!(combo.update(PIN_B, false, true, released_at), None);

        // Even long after the original threshold would have elapsed, an
        // update on the still-held pin must not fire.
        let much_later = armed_at + Duration::from_secs(10);
        assert_eq!(combo.update(PIN_A, true, false, much_later), None);
    }

    #[test]
    fn repress_restarts_the_timer_from_the_new_press() {
        let hold = Duration::from_secs(3);
        let t0 = Instant::now();
        let mut combo = coin_combo(hold);

        combo.update(PIN_A, true, true, t0);
        combo.update(PIN_B, true, true, t0);
        combo.update(PIN_B, false, true, t0 + Duration::from_secs(1));

        // Re-armed at t0+2: the clock starts over from there, not from t0.
        let rearmed_at = t0 + Duration::from_secs(2);
        assert_eq!(combo.update(PIN_B, true, true, rearmed_at), None);

        // t0+4 is past the original deadline but only 2s into the new hold.
        assert_eq!(
            combo.update(PIN_A, true, false, t0 + Duration::from_secs(4)),
            None
        );

        // 3s after re-arming it fires.
        assert_eq!(
            combo.update(PIN_A, true, false, rearmed_at + hold),
            Some(Key::KEY_C)
        );
    }

    #[test]
    fn redundant_level_updates_do_not_rearm() {
        let hold = Duration::from_secs(3);
        let t0 = Instant::now();
        let mut combo = coin_combo(hold);

        combo.update(PIN_A, true, true, t0);
        combo.update(PIN_B, true, true, t0);

        // Repeated held-level updates must not move armed_since forward.
        combo.update(PIN_A, true, false, t0 + Duration::from_secs(2));
        assert_eq!(
            combo.update(PIN_B, true, false, t0 + hold),
            Some(Key::KEY_C),
            "hold measured from the original arming time"
        );
    }
}
