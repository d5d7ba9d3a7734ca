//! The control engine — owns every piece of per-actuator and gesture
//! state and exposes a single `tick` operation.
//!
//! Per tick: subject readings are aggregated to one distance, gated for
//! stability, mapped through the response curves, arbitrated against
//! the gesture path, and finally smoothed into actuator commands.
//! Presence pause/resume runs independently off the subject count.
//! Single-threaded by construction; all timing uses the monotonic
//! timestamp carried in the input, never a sleep.

use std::collections::VecDeque;

use tracing::{debug, info};

use super::actuator::{ActuatorConfig, ActuatorKind, ActuatorSmoother, Availability};
use super::aggregate::{AggregationConfig, SubjectReading, WeightedAggregator};
use super::arbiter::{ControlMode, ControlModeArbiter, MediaCommand, RoutedTarget, Routing};
use super::curve::ResponseCurve;
use super::environment::{EnvironmentConfig, EnvironmentMonitor};
use super::gesture::{GestureClassifier, GestureConfig, GestureKind, GestureSignal};
use super::presence::{PresenceConfig, PresenceEvent, PresenceTracker};
use super::stability::{StabilityConfig, StabilityGate};

/// Ticks of subject-count history kept for the smoothed telemetry count.
const COUNT_WINDOW: usize = 3;

// ── Config ──────────────────────────────────────────────────

/// Aggregated configuration. Each component receives only its own
/// piece at construction; there is no shared settings object.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub aggregation: AggregationConfig,
    pub brightness_curve: ResponseCurve,
    pub volume_curve: ResponseCurve,
    pub stability: StabilityConfig,
    pub brightness: ActuatorConfig,
    pub volume: ActuatorConfig,
    pub gesture: GestureConfig,
    pub presence: PresenceConfig,
    pub environment: EnvironmentConfig,
    /// Brightness percent used while no subject is present.
    pub energy_save_brightness: f32,
    /// Volume scalar used while no subject is present.
    pub absent_volume: f32,
    pub mode: ControlMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregation: AggregationConfig::default(),
            brightness_curve: ResponseCurve::brightness(),
            volume_curve: ResponseCurve::volume(),
            stability: StabilityConfig::default(),
            brightness: ActuatorConfig::brightness(),
            volume: ActuatorConfig::volume(),
            gesture: GestureConfig::default(),
            presence: PresenceConfig::default(),
            environment: EnvironmentConfig::default(),
            energy_save_brightness: 30.0,
            absent_volume: 0.3,
            mode: ControlMode::Hybrid,
        }
    }
}

// ── Tick I/O ────────────────────────────────────────────────

/// Everything the engine consumes on one tick. Borrowed where the data
/// is produced fresh by the detectors each frame.
#[derive(Debug)]
pub struct TickInput<'a> {
    pub subjects: &'a [SubjectReading],
    pub gesture: Option<GestureSignal>,
    /// Ambient light level (0–255), decimated by the engine.
    pub ambient_light: Option<f32>,
    /// Background noise RMS (0–1), decimated by the engine.
    pub background_noise: Option<f32>,
    /// Monotonic timestamp in seconds.
    pub now_s: f64,
}

/// Commands emitted by one tick. Actuator fields are present only when
/// a write actually happened; poll the snapshot for continuous state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickOutput {
    /// New brightness in percent, if it changed this tick.
    pub brightness: Option<u8>,
    /// New volume scalar, if it changed this tick.
    pub volume: Option<f32>,
    pub media: Option<MediaCommand>,
}

/// Side-effect-free view of the engine for telemetry.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub brightness: f32,
    pub volume: f32,
    pub paused: bool,
    pub mode: ControlMode,
    pub gesture_active: bool,
    pub last_gesture: Option<GestureKind>,
    /// Moving-average subject count over the last few ticks.
    pub subject_count: usize,
}

// ── Engine ──────────────────────────────────────────────────

pub struct ControlEngine {
    aggregator: WeightedAggregator,
    brightness_curve: ResponseCurve,
    volume_curve: ResponseCurve,
    brightness_gate: StabilityGate,
    volume_gate: StabilityGate,
    brightness: ActuatorSmoother,
    volume: ActuatorSmoother,
    presence: PresenceTracker,
    classifier: GestureClassifier,
    arbiter: ControlModeArbiter,
    environment: EnvironmentMonitor,
    energy_save_brightness: f32,
    absent_volume: f32,
    count_window: VecDeque<usize>,
    ticks: u64,
}

impl ControlEngine {
    pub fn new(
        config: EngineConfig,
        brightness_availability: Availability,
        volume_availability: Availability,
    ) -> Self {
        info!(
            mode = config.mode.as_str(),
            brightness = brightness_availability.as_str(),
            volume = volume_availability.as_str(),
            "control engine initialized"
        );
        Self {
            aggregator: WeightedAggregator::new(config.aggregation),
            brightness_curve: config.brightness_curve,
            volume_curve: config.volume_curve,
            brightness_gate: StabilityGate::new(config.stability.clone()),
            volume_gate: StabilityGate::new(config.stability),
            brightness: ActuatorSmoother::new(
                ActuatorKind::Brightness,
                config.brightness,
                brightness_availability,
                50.0,
            ),
            volume: ActuatorSmoother::new(
                ActuatorKind::Volume,
                config.volume,
                volume_availability,
                0.5,
            ),
            presence: PresenceTracker::new(config.presence),
            classifier: GestureClassifier::new(config.gesture),
            arbiter: ControlModeArbiter::new(config.mode),
            environment: EnvironmentMonitor::new(config.environment),
            energy_save_brightness: config.energy_save_brightness,
            absent_volume: config.absent_volume,
            count_window: VecDeque::with_capacity(COUNT_WINDOW),
            ticks: 0,
        }
    }

    /// Run one control tick. The only mutating entry point.
    pub fn tick(&mut self, input: TickInput<'_>) -> TickOutput {
        let TickInput {
            subjects,
            gesture,
            ambient_light,
            background_noise,
            now_s,
        } = input;

        self.ticks += 1;
        if self.count_window.len() == COUNT_WINDOW {
            self.count_window.pop_front();
        }
        self.count_window.push_back(subjects.len());

        self.environment.observe(ambient_light, background_noise);
        let presence_event = self.presence.update(subjects.len(), now_s);

        // Distance path: aggregate, gate per actuator, map to targets.
        let distance = self.aggregator.weighted_distance(subjects);
        let sentinel = self.aggregator.config.max_detection_cm;

        let distance_brightness = self.brightness_gate.update(distance, now_s).map(|d| {
            if d >= sentinel {
                // Subject absent: energy-save branch instead of the
                // far-distance curve value.
                self.energy_save_brightness
            } else {
                self.brightness_curve.map(d) * self.environment.ambient_factor()
            }
        });
        let mut distance_volume = self.volume_gate.update(distance, now_s).map(|d| {
            if d >= sentinel {
                self.absent_volume
            } else {
                self.volume_curve.map(d) + self.environment.noise_boost()
            }
        });
        if self.presence.is_paused() {
            // The pause latch owns the volume while nobody is watching.
            distance_volume = None;
        }

        // Gesture path.
        let gesture_event = self.classifier.update(gesture.as_ref(), now_s);

        let mut routing =
            self.arbiter
                .arbitrate(gesture_event.as_ref(), distance_brightness, distance_volume);

        // Presence transitions outrank gesture transport this tick.
        match presence_event {
            Some(PresenceEvent::Paused) => routing.media = Some(MediaCommand::Pause),
            Some(PresenceEvent::Resumed) => routing.media = Some(MediaCommand::Resume),
            None => {}
        }
        if self.presence.is_paused() {
            let floor = self.volume.config.min;
            routing.volume = Some(RoutedTarget {
                value: floor,
                smooth: false,
            });
        }

        let output = self.apply_routing(routing);
        if output != TickOutput::default() {
            debug!(tick = self.ticks, ?output, "tick produced commands");
        }
        output
    }

    fn apply_routing(&mut self, routing: Routing) -> TickOutput {
        let brightness = routing
            .brightness
            .and_then(|t| self.brightness.apply(t.value, t.smooth))
            .map(|v| v.round() as u8);
        let volume = routing
            .volume
            .and_then(|t| self.volume.apply(t.value, t.smooth));
        TickOutput {
            brightness,
            volume,
            media: routing.media,
        }
    }

    /// Emit the final neutral/paused command set before the host stops
    /// ticking, leaving the hardware in a safe state.
    pub fn shutdown(&mut self) -> TickOutput {
        info!("engine shutdown, emitting neutral command set");
        let energy_save = self.energy_save_brightness;
        let floor = self.volume.config.min;
        let brightness = self
            .brightness
            .apply(energy_save, false)
            .map(|v| v.round() as u8);
        let volume = self.volume.apply(floor, false);
        TickOutput {
            brightness,
            volume,
            media: Some(MediaCommand::Pause),
        }
    }

    // ── Host/IPC surface ──────────────────────────────────

    pub fn mode(&self) -> ControlMode {
        self.arbiter.mode
    }

    pub fn set_mode(&mut self, mode: ControlMode) {
        info!(mode = mode.as_str(), "control mode changed");
        self.arbiter.mode = mode;
    }

    /// Direct user override: instant, no smoothing gate.
    pub fn force_brightness(&mut self, percent: f32) -> Option<u8> {
        self.brightness
            .apply(percent, false)
            .map(|v| v.round() as u8)
    }

    /// Direct user override: instant, no smoothing gate.
    pub fn force_volume(&mut self, level: f32) -> Option<f32> {
        self.volume.apply(level, false)
    }

    /// Pure read accessor for telemetry; no side effects.
    pub fn snapshot(&self) -> StatusSnapshot {
        let subject_count = if self.count_window.is_empty() {
            0
        } else {
            let sum: usize = self.count_window.iter().sum();
            (sum as f32 / self.count_window.len() as f32).round() as usize
        };
        StatusSnapshot {
            brightness: self.brightness.current(),
            volume: self.volume.current(),
            paused: self.presence.is_paused(),
            mode: self.arbiter.mode,
            gesture_active: self.classifier.is_active(),
            last_gesture: self.classifier.last_kind(),
            subject_count,
        }
    }

    /// Generate IPC status s-expression.
    pub fn status_sexp(&self) -> String {
        let snap = self.snapshot();
        let last_gesture = snap
            .last_gesture
            .map(|g| format!(":{}", g.as_str()))
            .unwrap_or_else(|| "nil".to_string());
        let ambient = self
            .environment
            .ambient()
            .map(|a| format!("{a:.0}"))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:brightness {:.0} :brightness-target {:.0} :brightness-mean {:.1} :volume {:.2} :volume-target {:.2} :volume-mean {:.2} :paused {} :mode :{} :gesture-active {} :last-gesture {} :subject-count {} :ambient {} :brightness-backend :{} :volume-backend :{})",
            snap.brightness,
            self.brightness.target(),
            self.brightness.history_mean(),
            snap.volume,
            self.volume.target(),
            self.volume.history_mean(),
            if snap.paused { "t" } else { "nil" },
            snap.mode.as_str(),
            if snap.gesture_active { "t" } else { "nil" },
            last_gesture,
            snap.subject_count,
            ambient,
            self.brightness.availability.as_str(),
            self.volume.availability.as_str(),
        )
    }

    /// Generate IPC config s-expression.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:mode :{} :grace-range-cm {:.1} :movement-threshold-cm {:.1} :stable-duration-s {:.1} :hold-frames {} :cooldown-s {:.1} :absence-timeout-s {:.1} :energy-save-brightness {:.0} :brightness (:min {:.0} :max {:.0} :step {:.1} :alpha {:.2}) :volume (:min {:.2} :max {:.2} :step {:.2} :alpha {:.2}))",
            self.arbiter.mode.as_str(),
            self.brightness_gate.config.grace_range_cm,
            self.brightness_gate.config.movement_threshold_cm,
            self.brightness_gate.config.stable_duration_s,
            self.classifier.config.hold_frames,
            self.classifier.config.cooldown_s,
            self.presence.config.absence_timeout_s,
            self.energy_save_brightness,
            self.brightness.config.min,
            self.brightness.config.max,
            self.brightness.config.min_step,
            self.brightness.config.smoothing_alpha,
            self.volume.config.min,
            self.volume.config.max,
            self.volume.config.min_step,
            self.volume.config.smoothing_alpha,
        )
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gesture::Handedness;

    const TICK_S: f64 = 1.0 / 30.0;

    fn engine() -> ControlEngine {
        ControlEngine::new(
            EngineConfig::default(),
            Availability::Simulated,
            Availability::Simulated,
        )
    }

    fn subject(distance_cm: f32) -> SubjectReading {
        SubjectReading {
            distance_cm,
            position: (0.5, 0.5),
            confidence: 0.9,
        }
    }

    fn tick_at(e: &mut ControlEngine, subjects: &[SubjectReading], now_s: f64) -> TickOutput {
        e.tick(TickInput {
            subjects,
            gesture: None,
            ambient_light: None,
            background_noise: None,
            now_s,
        })
    }

    fn gesture_signal(count: u8, x: f32) -> GestureSignal {
        let mut fingers = [false; 5];
        for f in fingers.iter_mut().take(count as usize) {
            *f = true;
        }
        GestureSignal {
            finger_count: count,
            fingers,
            position: (x, 0.5),
            hand: Handedness::Right,
        }
    }

    /// Run ticks until the distance gate passes and the first actuator
    /// write happens.
    fn settle(e: &mut ControlEngine, distance_cm: f32, from_s: f64, ticks: usize) -> Vec<TickOutput> {
        let subjects = [subject(distance_cm)];
        (0..ticks)
            .map(|i| tick_at(e, &subjects, from_s + i as f64 * TICK_S))
            .collect()
    }

    #[test]
    fn test_stable_subject_drives_brightness() {
        let mut e = engine();
        // 212.5cm maps to 65% brightness. Hold for 2 seconds.
        let outs = settle(&mut e, 212.5, 0.0, 60);
        let first_write = outs.iter().find_map(|o| o.brightness);
        // Smoothed first step from 50 toward 65: 0.3*65 + 0.7*50 = 54.5
        assert_eq!(first_write, Some(55), "gate should pass once stable and smooth toward 65");
        assert!(e.snapshot().brightness > 50.0);
    }

    #[test]
    fn test_moving_subject_never_updates() {
        let mut e = engine();
        // Walk 10cm per tick: never stable.
        let mut writes = 0;
        for i in 0..45 {
            let subjects = [subject(100.0 + i as f32 * 10.0)];
            let out = tick_at(&mut e, &subjects, i as f64 * TICK_S);
            if out.brightness.is_some() || out.volume.is_some() {
                writes += 1;
            }
        }
        assert_eq!(writes, 0, "a moving subject must produce no actuator chatter");
    }

    #[test]
    fn test_absence_pauses_and_forces_volume_floor() {
        let mut e = engine();
        tick_at(&mut e, &[subject(100.0)], 0.0);
        let mut pause_ticks = Vec::new();
        for i in 1..150 {
            let now = i as f64 * TICK_S;
            let out = tick_at(&mut e, &[], now);
            if out.media == Some(MediaCommand::Pause) {
                pause_ticks.push(now);
                // Volume is forced down instantly on the pause tick.
                assert_eq!(out.volume, Some(0.15));
            }
        }
        assert_eq!(pause_ticks.len(), 1, "exactly one pause per absence");
        assert!(pause_ticks[0] > 3.0);
        assert!(e.snapshot().paused);
    }

    #[test]
    fn test_resume_on_reappearance() {
        let mut e = engine();
        tick_at(&mut e, &[subject(100.0)], 0.0);
        for i in 1..140 {
            tick_at(&mut e, &[], i as f64 * TICK_S);
        }
        assert!(e.snapshot().paused);
        let out = tick_at(&mut e, &[subject(100.0)], 5.0);
        assert_eq!(out.media, Some(MediaCommand::Resume));
        assert!(!e.snapshot().paused);
    }

    #[test]
    fn test_empty_room_settles_to_energy_save() {
        let mut e = engine();
        // Sentinel distance (400cm) holds stable; once gated it maps to
        // the energy-save brightness, not the far-distance curve value.
        let mut first_write = None;
        for i in 0..90 {
            let out = tick_at(&mut e, &[], i as f64 * TICK_S);
            if first_write.is_none() {
                first_write = out.brightness;
            }
        }
        // Smoothed from 50 toward 30: 0.3*30 + 0.7*50 = 44
        assert_eq!(first_write, Some(44));
    }

    #[test]
    fn test_hybrid_gesture_overrides_brightness() {
        let mut e = engine();
        let out = e.tick(TickInput {
            subjects: &[subject(100.0)],
            gesture: Some(gesture_signal(2, 0.9)),
            ambient_light: None,
            background_noise: None,
            now_s: 0.0,
        });
        // 0.9 → 90%; smoothed from 50: 0.3*90 + 0.7*50 = 62
        assert_eq!(out.brightness, Some(62));
    }

    #[test]
    fn test_gesture_mode_applies_instantly() {
        let mut e = engine();
        e.set_mode(ControlMode::Gesture);
        let out = e.tick(TickInput {
            subjects: &[],
            gesture: Some(gesture_signal(1, 0.8)),
            ambient_light: None,
            background_noise: None,
            now_s: 0.0,
        });
        assert_eq!(out.volume, Some(0.8), "gesture mode bypasses smoothing");
    }

    #[test]
    fn test_distance_mode_ignores_hand() {
        let mut e = engine();
        e.set_mode(ControlMode::Distance);
        let mut wrote_volume = false;
        for i in 0..10 {
            let out = e.tick(TickInput {
                subjects: &[subject(100.0)],
                gesture: Some(gesture_signal(1, 0.9)),
                ambient_light: None,
                background_noise: None,
                now_s: i as f64 * TICK_S,
            });
            wrote_volume |= out.volume.is_some();
        }
        assert!(!wrote_volume, "distance mode must ignore continuous gestures");
    }

    #[test]
    fn test_discrete_gesture_reaches_transport() {
        let mut e = engine();
        let mut media = None;
        for i in 0..3 {
            let out = e.tick(TickInput {
                subjects: &[subject(100.0)],
                gesture: Some(gesture_signal(4, 0.5)),
                ambient_light: None,
                background_noise: None,
                now_s: i as f64 * TICK_S,
            });
            media = media.or(out.media);
        }
        assert_eq!(media, Some(MediaCommand::Next));
    }

    #[test]
    fn test_dark_room_scales_brightness_down() {
        let mut e = engine();
        // Ambient sample lands on tick 0 (decimation offset).
        let subjects = [subject(212.5)];
        let mut first_write = None;
        for i in 0..60 {
            let out = e.tick(TickInput {
                subjects: &subjects,
                gesture: None,
                ambient_light: Some(20.0),
                background_noise: None,
                now_s: i as f64 * TICK_S,
            });
            if first_write.is_none() {
                first_write = out.brightness;
            }
        }
        // Target 65 * 0.7 = 45.5; smoothed from 50: 0.3*45.5 + 0.7*50 ≈ 48.65
        assert_eq!(first_write, Some(49));
    }

    #[test]
    fn test_status_sexp_tracks_target_and_history() {
        let mut e = engine();
        // Settle at 212.5cm: one smoothed write toward the 65% target.
        settle(&mut e, 212.5, 0.0, 60);
        let sexp = e.status_sexp();
        assert!(sexp.contains(":brightness 54"), "current is the blended value");
        assert!(sexp.contains(":brightness-target 65"), "target is the curve output");
        assert!(sexp.contains(":brightness-mean 54.5"), "history mean covers the one write");
    }

    #[test]
    fn test_force_overrides_are_instant() {
        let mut e = engine();
        assert_eq!(e.force_brightness(80.0), Some(80));
        assert_eq!(e.force_volume(0.9), Some(0.9));
        assert_eq!(e.snapshot().brightness, 80.0);
    }

    #[test]
    fn test_shutdown_emits_neutral_set() {
        let mut e = engine();
        let out = e.shutdown();
        assert_eq!(out.media, Some(MediaCommand::Pause));
        assert_eq!(out.brightness, Some(30));
        assert_eq!(out.volume, Some(0.15));
    }

    #[test]
    fn test_status_sexp_shape() {
        let mut e = engine();
        tick_at(&mut e, &[subject(100.0)], 0.0);
        let sexp = e.status_sexp();
        assert!(sexp.contains(":brightness 50"));
        assert!(sexp.contains(":paused nil"));
        assert!(sexp.contains(":mode :hybrid"));
        assert!(sexp.contains(":subject-count 1"));
        assert!(sexp.contains(":ambient nil"));
        // Nothing applied yet: target and history mean sit at the
        // initial values.
        assert!(sexp.contains(":brightness-target 50"));
        assert!(sexp.contains(":brightness-mean 50.0"));
        assert!(sexp.contains(":volume-target 0.50"));
        assert!(sexp.contains(":volume-mean 0.50"));
        assert!(sexp.contains(":brightness-backend :simulated"));

        let config = e.config_sexp();
        assert!(config.contains(":grace-range-cm 5.0"));
        assert!(config.contains(":absence-timeout-s 3.0"));
    }
}
