//! Gesture classification — maps a per-tick finger-count signal into
//! gesture events with hold debouncing and per-kind cooldowns.
//!
//! Finger-count mapping (either hand):
//! - 0 (fist): toggle gesture control on/off, cooldown exempt
//! - 1: continuous volume adjust from hand position
//! - 2: continuous brightness adjust from hand position
//! - 3/4/5: play-pause / next / previous, debounced and cooldown gated
//!
//! Cooldowns are per-kind: a repeat of the same discrete gesture inside
//! its cooldown window is suppressed, while a *different* discrete kind
//! preempts the active cooldown and fires immediately.

use tracing::{debug, info, warn};

// ── Kinds ───────────────────────────────────────────────────

/// Recognized gesture kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GestureKind {
    /// Fist: flip gesture control on/off.
    Toggle,
    /// One finger: live volume tracking.
    VolumeAdjust,
    /// Two fingers: live brightness tracking.
    BrightnessAdjust,
    /// Three fingers.
    PlayPause,
    /// Four fingers.
    NextTrack,
    /// Five fingers (open palm).
    PrevTrack,
}

impl GestureKind {
    /// String representation for IPC and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Toggle => "toggle",
            Self::VolumeAdjust => "volume-adjust",
            Self::BrightnessAdjust => "brightness-adjust",
            Self::PlayPause => "play-pause",
            Self::NextTrack => "next-track",
            Self::PrevTrack => "prev-track",
        }
    }

    /// Discrete gestures fire once and carry a cooldown; continuous
    /// ones track the hand live every tick.
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::PlayPause | Self::NextTrack | Self::PrevTrack)
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self, Self::VolumeAdjust | Self::BrightnessAdjust)
    }
}

/// Which hand produced the signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

// ── Signal and event ────────────────────────────────────────

/// Raw per-tick hand signal from the external tracker.
#[derive(Debug, Clone)]
pub struct GestureSignal {
    /// Number of extended fingers (0–5).
    pub finger_count: u8,
    /// Per-finger extended flags: thumb, index, middle, ring, little.
    pub fingers: [bool; 5],
    /// Hand position in the frame, normalized to [0, 1].
    pub position: (f32, f32),
    pub hand: Handedness,
}

/// At most one of these is produced per tick.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureEvent {
    pub kind: GestureKind,
    /// Control value for continuous gestures, normalized to [0, 1].
    pub value: Option<f32>,
    pub hand: Handedness,
}

// ── Config ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct GestureConfig {
    /// Consecutive ticks a discrete finger count must hold before it
    /// fires (debounce against transient misclassification).
    pub hold_frames: u32,
    /// Cooldown after a discrete gesture fires (seconds).
    pub cooldown_s: f64,
    /// Multiplier blending per-tick hand movement into the positional
    /// value of continuous gestures.
    pub movement_gain: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            hold_frames: 2,
            cooldown_s: 2.0,
            movement_gain: 2.0,
        }
    }
}

// ── Classifier ──────────────────────────────────────────────

/// Finite-state gesture classifier. All state lives here and is only
/// mutated through `update`.
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    pub config: GestureConfig,
    /// Whether discrete media gestures are enabled. Flipped by `Toggle`.
    active: bool,
    /// Kind whose cooldown is currently running, if any.
    cooldown_kind: Option<GestureKind>,
    /// Monotonic timestamp at which the cooldown expires.
    cooldown_until: f64,
    /// Finger count of the gesture that started the cooldown; while the
    /// user keeps holding it, it must not re-fire.
    registered_count: Option<u8>,
    /// Debounce tracking for discrete counts.
    last_count: Option<u8>,
    stable_frames: u32,
    /// Previous hand position for movement-delta blending.
    last_position: Option<(f32, f32)>,
    /// Most recent emitted kind (telemetry).
    last_kind: Option<GestureKind>,
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            active: true,
            cooldown_kind: None,
            cooldown_until: 0.0,
            registered_count: None,
            last_count: None,
            stable_frames: 0,
            last_position: None,
            last_kind: None,
        }
    }

    /// Whether discrete gestures are currently enabled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Most recent emitted gesture kind.
    pub fn last_kind(&self) -> Option<GestureKind> {
        self.last_kind
    }

    /// Process one tick's hand signal (or its absence).
    ///
    /// The cooldown timer runs on the monotonic clock and keeps
    /// expiring even when no hand is visible, so a stale cooldown never
    /// blocks a hand that appears later.
    pub fn update(&mut self, signal: Option<&GestureSignal>, now_s: f64) -> Option<GestureEvent> {
        // Expire the cooldown first, hand or no hand.
        if self.cooldown_kind.is_some() && now_s >= self.cooldown_until {
            debug!(
                kind = self.cooldown_kind.map(|k| k.as_str()).unwrap_or(""),
                "gesture cooldown expired"
            );
            self.cooldown_kind = None;
            self.registered_count = None;
        }

        let signal = match signal {
            Some(s) => s,
            None => {
                // Hand gone: clear continuous tracking and debounce,
                // leave the cooldown timer alone.
                self.last_position = None;
                self.last_count = None;
                self.stable_frames = 0;
                return None;
            }
        };

        // A finger vector that contradicts the reported count means the
        // tracker glitched; drop the sample rather than act on it.
        let vector_count = signal.fingers.iter().filter(|f| **f).count() as u8;
        if vector_count != signal.finger_count {
            warn!(
                finger_count = signal.finger_count,
                vector_count, "contradictory gesture signal discarded"
            );
            return None;
        }

        match signal.finger_count {
            0 => self.classify_fist(signal, now_s),
            1 | 2 => self.classify_continuous(signal),
            3..=5 => self.classify_discrete(signal, now_s),
            other => {
                warn!(finger_count = other, "finger count out of range");
                None
            }
        }
    }

    /// Fist: toggles `active`, exempt from cooldown gating so it can
    /// always re-enable control. Starts its own cooldown purely so a
    /// held fist does not toggle every tick.
    fn classify_fist(&mut self, signal: &GestureSignal, now_s: f64) -> Option<GestureEvent> {
        self.last_count = None;
        self.stable_frames = 0;

        // Still the same held fist that already toggled.
        if self.registered_count == Some(0) {
            return None;
        }

        self.active = !self.active;
        info!(
            enabled = self.active,
            "fist gesture toggled gesture control"
        );

        self.cooldown_kind = Some(GestureKind::Toggle);
        self.cooldown_until = now_s + self.config.cooldown_s;
        self.registered_count = Some(0);
        self.last_kind = Some(GestureKind::Toggle);

        Some(GestureEvent {
            kind: GestureKind::Toggle,
            value: None,
            hand: signal.hand,
        })
    }

    /// One or two fingers: live positional control, emitted every tick
    /// with no cooldown or hold requirement.
    fn classify_continuous(&mut self, signal: &GestureSignal) -> Option<GestureEvent> {
        self.last_count = None;
        self.stable_frames = 0;

        let (x, _y) = signal.position;
        let delta_x = match self.last_position {
            Some((px, _)) => x - px,
            None => 0.0,
        };
        self.last_position = Some(signal.position);

        let value = (x + delta_x * self.config.movement_gain).clamp(0.0, 1.0);
        let kind = if signal.finger_count == 1 {
            GestureKind::VolumeAdjust
        } else {
            GestureKind::BrightnessAdjust
        };
        self.last_kind = Some(kind);

        Some(GestureEvent {
            kind,
            value: Some(value),
            hand: signal.hand,
        })
    }

    /// Three to five fingers: debounced, cooldown-gated media commands.
    fn classify_discrete(&mut self, signal: &GestureSignal, now_s: f64) -> Option<GestureEvent> {
        // Debounce: the same count must hold for `hold_frames` ticks.
        if self.last_count == Some(signal.finger_count) {
            self.stable_frames += 1;
        } else {
            self.last_count = Some(signal.finger_count);
            self.stable_frames = 1;
        }
        if self.stable_frames < self.config.hold_frames {
            return None;
        }

        if !self.active {
            debug!("discrete gesture ignored, control disabled");
            return None;
        }

        let kind = match signal.finger_count {
            3 => GestureKind::PlayPause,
            4 => GestureKind::NextTrack,
            _ => GestureKind::PrevTrack,
        };

        // The gesture that started the running cooldown is still being
        // held; do not re-register it.
        if self.registered_count == Some(signal.finger_count) {
            return None;
        }

        if let Some(cooling) = self.cooldown_kind {
            if cooling == kind {
                debug!(kind = kind.as_str(), "suppressed by active cooldown");
                return None;
            }
            // A different kind preempts: the old cooldown is cancelled
            // and replaced below.
            debug!(
                old = cooling.as_str(),
                new = kind.as_str(),
                "gesture preempts active cooldown"
            );
        }

        self.cooldown_kind = Some(kind);
        self.cooldown_until = now_s + self.config.cooldown_s;
        self.registered_count = Some(signal.finger_count);
        self.last_kind = Some(kind);
        info!(kind = kind.as_str(), "discrete gesture fired");

        Some(GestureEvent {
            kind,
            value: None,
            hand: signal.hand,
        })
    }
}

// ── Test helpers ────────────────────────────────────────────

#[cfg(test)]
fn signal(count: u8) -> GestureSignal {
    let mut fingers = [false; 5];
    for f in fingers.iter_mut().take(count as usize) {
        *f = true;
    }
    GestureSignal {
        finger_count: count,
        fingers,
        position: (0.5, 0.5),
        hand: Handedness::Right,
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(GestureConfig::default())
    }

    /// Drive a discrete gesture through its hold-frames debounce.
    fn fire(c: &mut GestureClassifier, count: u8, now_s: f64) -> Option<GestureEvent> {
        let s = signal(count);
        let mut last = None;
        for i in 0..c.config.hold_frames {
            last = c.update(Some(&s), now_s + i as f64 * 0.03);
        }
        last
    }

    #[test]
    fn test_discrete_requires_hold_frames() {
        let mut c = classifier();
        let s = signal(4);
        assert_eq!(c.update(Some(&s), 0.0), None, "first frame only arms debounce");
        let evt = c.update(Some(&s), 0.03).expect("second consistent frame fires");
        assert_eq!(evt.kind, GestureKind::NextTrack);
    }

    #[test]
    fn test_flicker_resets_debounce() {
        let mut c = classifier();
        assert_eq!(c.update(Some(&signal(4)), 0.0), None);
        assert_eq!(c.update(Some(&signal(5)), 0.03), None); // count changed, restart
        assert_eq!(c.update(Some(&signal(4)), 0.06), None);
    }

    #[test]
    fn test_same_kind_suppressed_during_cooldown() {
        let mut c = classifier();
        assert!(fire(&mut c, 4, 0.0).is_some());
        // Drop the hand, then repeat Next inside the 2s window.
        c.update(None, 0.5);
        assert_eq!(fire(&mut c, 4, 1.0), None, "repeat inside cooldown must not fire");
        // After expiry it fires again.
        c.update(None, 2.5);
        let evt = fire(&mut c, 4, 3.2).expect("fires after cooldown expiry");
        assert_eq!(evt.kind, GestureKind::NextTrack);
    }

    #[test]
    fn test_different_kind_preempts_cooldown() {
        let mut c = classifier();
        assert!(fire(&mut c, 4, 0.0).is_some()); // Next, cooldown running
        let evt = fire(&mut c, 5, 0.5).expect("different kind preempts cooldown");
        assert_eq!(evt.kind, GestureKind::PrevTrack);
        // The preempting gesture now owns the cooldown: Next is free
        // again (its cooldown was cancelled)...
        let evt = fire(&mut c, 4, 1.0).expect("cancelled cooldown does not linger");
        assert_eq!(evt.kind, GestureKind::NextTrack);
        // ...while a Prev repeat is blocked by nothing (Next preempted
        // it), demonstrating only the latest kind is ever locked out.
        let evt = fire(&mut c, 5, 1.5).expect("prev preempts again");
        assert_eq!(evt.kind, GestureKind::PrevTrack);
    }

    #[test]
    fn test_held_gesture_fires_once() {
        let mut c = classifier();
        let s = signal(3);
        let mut fired = 0;
        for i in 0..30 {
            if c.update(Some(&s), i as f64 * 0.03).is_some() {
                fired += 1;
            }
        }
        assert_eq!(fired, 1, "a held discrete gesture registers once");
    }

    #[test]
    fn test_fist_toggles_and_bypasses_cooldown() {
        let mut c = classifier();
        assert!(c.is_active());
        assert!(fire(&mut c, 4, 0.0).is_some()); // start a Next cooldown
        // Fist fires immediately despite the running cooldown.
        let evt = c.update(Some(&signal(0)), 0.2).expect("fist is cooldown exempt");
        assert_eq!(evt.kind, GestureKind::Toggle);
        assert!(!c.is_active());
    }

    #[test]
    fn test_held_fist_toggles_once() {
        let mut c = classifier();
        let s = signal(0);
        let mut toggles = 0;
        for i in 0..20 {
            if c.update(Some(&s), i as f64 * 0.03).is_some() {
                toggles += 1;
            }
        }
        assert_eq!(toggles, 1);
        assert!(!c.is_active());
        // Release, wait out the cooldown, fist again re-enables.
        c.update(None, 1.0);
        let evt = c.update(Some(&s), 2.7).expect("second fist re-enables");
        assert_eq!(evt.kind, GestureKind::Toggle);
        assert!(c.is_active());
    }

    #[test]
    fn test_discrete_disabled_when_inactive() {
        let mut c = classifier();
        c.update(Some(&signal(0)), 0.0); // toggle off
        c.update(None, 0.1);
        assert_eq!(fire(&mut c, 3, 3.0), None, "discrete gestures need active control");
        // Continuous gestures keep working regardless.
        let evt = c.update(Some(&signal(1)), 3.5).expect("continuous is not gated");
        assert_eq!(evt.kind, GestureKind::VolumeAdjust);
    }

    #[test]
    fn test_continuous_emits_every_tick() {
        let mut c = classifier();
        let mut s = signal(2);
        s.position = (0.3, 0.5);
        let evt = c.update(Some(&s), 0.0).expect("continuous fires immediately");
        assert_eq!(evt.kind, GestureKind::BrightnessAdjust);
        assert_eq!(evt.value, Some(0.3));
        // Next tick, same position: still emitted, no movement blend.
        let evt = c.update(Some(&s), 0.03).expect("emitted every tick");
        assert_eq!(evt.value, Some(0.3));
    }

    #[test]
    fn test_continuous_blends_movement_delta() {
        let mut c = classifier();
        let mut s = signal(1);
        s.position = (0.5, 0.5);
        c.update(Some(&s), 0.0);
        s.position = (0.6, 0.5);
        let evt = c.update(Some(&s), 0.03).unwrap();
        // 0.6 + 0.1 * gain 2.0 = 0.8
        assert!((evt.value.unwrap() - 0.8).abs() < 1e-4);
    }

    #[test]
    fn test_continuous_value_clamped() {
        let mut c = classifier();
        let mut s = signal(1);
        s.position = (0.5, 0.5);
        c.update(Some(&s), 0.0);
        s.position = (0.95, 0.5);
        let evt = c.update(Some(&s), 0.03).unwrap();
        assert_eq!(evt.value, Some(1.0));
    }

    #[test]
    fn test_hand_absence_preserves_cooldown() {
        let mut c = classifier();
        assert!(fire(&mut c, 3, 0.0).is_some());
        // Hand disappears; cooldown keeps running...
        c.update(None, 0.5);
        c.update(None, 1.0);
        // ...and still blocks a same-kind repeat at t=1.5...
        assert_eq!(fire(&mut c, 3, 1.5), None);
        // ...but has expired naturally by t=2.5.
        c.update(None, 2.2);
        assert!(fire(&mut c, 3, 2.5).is_some());
    }

    #[test]
    fn test_contradictory_vector_discarded() {
        let mut c = classifier();
        let mut s = signal(0);
        s.fingers[2] = true; // claims a fist but one finger is up
        assert_eq!(c.update(Some(&s), 0.0), None);
        assert!(c.is_active(), "discarded sample must not toggle anything");
    }

    #[test]
    fn test_kind_predicates() {
        assert!(GestureKind::NextTrack.is_discrete());
        assert!(GestureKind::PlayPause.is_discrete());
        assert!(!GestureKind::Toggle.is_discrete());
        assert!(GestureKind::VolumeAdjust.is_continuous());
        assert!(!GestureKind::PrevTrack.is_continuous());
    }
}
