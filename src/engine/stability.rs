//! Stability gate — hysteresis filter between the raw aggregated
//! distance and actuator updates.
//!
//! A measurement only passes the gate once it has held still for a
//! minimum duration AND differs from the last applied point by more
//! than a grace range. A crowd of moving subjects therefore produces
//! no actuator chatter at all; only someone who settles at a genuinely
//! new distance moves the hardware.

use tracing::debug;

// ── Config ──────────────────────────────────────────────────

/// Thresholds and timing for the stability gate.
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Minimum delta from the last applied value to justify a new
    /// update (cm). Readings inside this band are ignored entirely.
    pub grace_range_cm: f32,
    /// Per-tick delta at or above which the value counts as "moving"
    /// and the stability timer restarts (cm).
    pub movement_threshold_cm: f32,
    /// How long the value must hold still before it is applied (s).
    pub stable_duration_s: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            grace_range_cm: 5.0,
            movement_threshold_cm: 5.0,
            stable_duration_s: 1.5,
        }
    }
}

// ── Gate ────────────────────────────────────────────────────

/// Per-actuator hysteresis state. One instance per actuator; the gate
/// owns its state exclusively and is mutated only through `update`.
#[derive(Debug, Clone)]
pub struct StabilityGate {
    pub config: StabilityConfig,
    /// Previous tick's raw measurement.
    last_raw: Option<f32>,
    /// Monotonic timestamp when the value last started holding still.
    stable_since: Option<f64>,
    /// The measurement that last passed the gate.
    last_applied: Option<f32>,
}

impl StabilityGate {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            last_raw: None,
            stable_since: None,
            last_applied: None,
        }
    }

    /// Evaluate one raw measurement against the current monotonic time.
    ///
    /// Returns `Some(value)` exactly when the measurement should be
    /// applied; `None` means hold the previous applied value.
    pub fn update(&mut self, raw: f32, now_s: f64) -> Option<f32> {
        // Within grace range of the last applied point: nothing to do,
        // but restart the timer so a later drift must re-stabilize.
        if let Some(applied) = self.last_applied {
            if (raw - applied).abs() < self.config.grace_range_cm {
                self.stable_since = Some(now_s);
                self.last_raw = Some(raw);
                return None;
            }
        }

        let prev = match self.last_raw {
            Some(prev) => prev,
            None => {
                // First measurement: start the clock.
                self.last_raw = Some(raw);
                self.stable_since = Some(now_s);
                return None;
            }
        };

        let delta = (raw - prev).abs();
        self.last_raw = Some(raw);

        if delta >= self.config.movement_threshold_cm {
            // Still moving; restart the stability window.
            debug!(delta, "measurement moving, stability timer reset");
            self.stable_since = Some(now_s);
            return None;
        }

        let since = *self.stable_since.get_or_insert(now_s);
        if now_s - since >= self.config.stable_duration_s {
            debug!(
                value = raw,
                held_s = now_s - since,
                "measurement stable, passing gate"
            );
            self.last_applied = Some(raw);
            self.stable_since = Some(now_s);
            return Some(raw);
        }

        None
    }

    /// The measurement that last passed the gate, if any.
    pub fn last_applied(&self) -> Option<f32> {
        self.last_applied
    }

    /// Drop all gate state (e.g. after the subject leaves).
    pub fn reset(&mut self) {
        self.last_raw = None;
        self.stable_since = None;
        self.last_applied = None;
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> StabilityGate {
        StabilityGate::new(StabilityConfig::default())
    }

    #[test]
    fn test_first_measurement_only_starts_timer() {
        let mut g = gate();
        assert_eq!(g.update(100.0, 0.0), None);
        assert_eq!(g.last_applied(), None);
    }

    #[test]
    fn test_oscillation_within_grace_never_applies() {
        let mut g = gate();
        // All readings within a 5cm band over less than 1.5s.
        let readings = [100.0, 103.0, 98.0, 101.0, 99.0];
        let mut applied = 0;
        for (i, r) in readings.iter().enumerate() {
            if g.update(*r, i as f64 * 0.25).is_some() {
                applied += 1;
            }
        }
        assert_eq!(applied, 0, "jitter inside the window must not apply");
    }

    #[test]
    fn test_steady_value_applies_once() {
        let mut g = gate();
        assert_eq!(g.update(150.0, 0.0), None); // first measurement
        assert_eq!(g.update(150.0, 0.5), None);
        assert_eq!(g.update(150.0, 1.0), None);
        // 1.6s elapsed, stable the whole time.
        assert_eq!(g.update(150.0, 1.6), Some(150.0));
        // Further ticks at the applied value are within grace: no-op.
        assert_eq!(g.update(150.0, 2.0), None);
        assert_eq!(g.update(151.0, 3.8), None);
    }

    #[test]
    fn test_new_stable_point_applies_after_prior() {
        let mut g = gate();
        // Settle at 100cm first.
        g.update(100.0, 0.0);
        assert_eq!(g.update(100.0, 1.6), Some(100.0));

        // Jump to 150cm and hold: delta from applied is 50cm >= grace.
        assert_eq!(g.update(150.0, 2.0), None); // 50cm step counts as movement
        assert_eq!(g.update(150.0, 2.5), None);
        assert_eq!(g.update(150.0, 3.6), Some(150.0));
        assert_eq!(g.last_applied(), Some(150.0));
    }

    #[test]
    fn test_movement_restarts_stability_timer() {
        let mut g = gate();
        g.update(100.0, 0.0);
        g.update(100.0, 1.0);
        // Large jump at t=1.2 restarts the window...
        assert_eq!(g.update(180.0, 1.2), None);
        // ...so holding at 180 for only 1.0s is not enough...
        assert_eq!(g.update(180.0, 2.2), None);
        // ...but 1.5s from the jump is.
        assert_eq!(g.update(180.0, 2.8), Some(180.0));
    }

    #[test]
    fn test_grace_branch_resets_timer() {
        let mut g = gate();
        g.update(100.0, 0.0);
        g.update(100.0, 1.6); // applied at 100
        // Hover at 103 (within grace) until t=5: timer keeps resetting.
        for i in 0..10 {
            assert_eq!(g.update(103.0, 1.7 + i as f64 * 0.35), None);
        }
        // Now step out of grace; must re-stabilize from scratch.
        assert_eq!(g.update(110.0, 5.3), None);
        assert_eq!(g.update(110.0, 6.0), None);
        assert_eq!(g.update(110.0, 6.9), Some(110.0));
    }

    #[test]
    fn test_reset_clears_applied_point() {
        let mut g = gate();
        g.update(100.0, 0.0);
        g.update(100.0, 1.6);
        assert_eq!(g.last_applied(), Some(100.0));
        g.reset();
        assert_eq!(g.last_applied(), None);
        assert_eq!(g.update(100.0, 2.0), None); // back to first-measurement path
    }
}
