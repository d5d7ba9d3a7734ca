//! Actuator smoothing — exponential blend toward a gate-approved
//! target plus minimum-step suppression of micro-writes.
//!
//! Whether the actuator is real hardware or a simulation is decided
//! once at startup and carried as an explicit capability, never probed
//! at call time.

use std::collections::VecDeque;

use tracing::debug;

/// Applied values retained for telemetry.
const HISTORY_LEN: usize = 10;

// ── Kinds and capability ────────────────────────────────────

/// Which actuator a smoother drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorKind {
    Brightness,
    Volume,
}

impl ActuatorKind {
    /// String representation for IPC and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Volume => "volume",
        }
    }
}

/// Whether writes reach real hardware. Decided at startup by the host;
/// the smoother behaves identically either way and the flag exists for
/// telemetry and the collaborator that performs the actual write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    Simulated,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Simulated => "simulated",
        }
    }
}

// ── Config ──────────────────────────────────────────────────

/// Per-actuator domain and smoothing parameters.
#[derive(Debug, Clone)]
pub struct ActuatorConfig {
    /// Lower bound of the actuator domain.
    pub min: f32,
    /// Upper bound of the actuator domain.
    pub max: f32,
    /// Smallest change worth writing; smaller deltas are suppressed.
    pub min_step: f32,
    /// Exponential smoothing factor α in `α·target + (1-α)·current`.
    pub smoothing_alpha: f32,
}

impl ActuatorConfig {
    /// Display brightness in percent.
    pub fn brightness() -> Self {
        Self {
            min: 20.0,
            max: 100.0,
            min_step: 2.0,
            smoothing_alpha: 0.3,
        }
    }

    /// Audio volume as a 0–1 scalar.
    pub fn volume() -> Self {
        Self {
            min: 0.15,
            max: 1.0,
            min_step: 0.02,
            smoothing_alpha: 0.3,
        }
    }
}

// ── Smoother ────────────────────────────────────────────────

/// Owns one actuator's current/target values and applied-value history.
#[derive(Debug, Clone)]
pub struct ActuatorSmoother {
    pub kind: ActuatorKind,
    pub config: ActuatorConfig,
    pub availability: Availability,
    current: f32,
    target: f32,
    history: VecDeque<f32>,
}

impl ActuatorSmoother {
    pub fn new(
        kind: ActuatorKind,
        config: ActuatorConfig,
        availability: Availability,
        initial: f32,
    ) -> Self {
        let initial = initial.clamp(config.min, config.max);
        Self {
            kind,
            config,
            availability,
            current: initial,
            target: initial,
            history: VecDeque::with_capacity(HISTORY_LEN),
        }
    }

    /// Drive the actuator toward `value`.
    ///
    /// With `smooth`, the value is blended exponentially toward the
    /// target; without it the value lands in one step (user overrides,
    /// forced mute). Returns `Some(applied)` when the change exceeds
    /// the minimum step and a write should be issued, `None` when the
    /// update was suppressed.
    pub fn apply(&mut self, value: f32, smooth: bool) -> Option<f32> {
        let value = value.clamp(self.config.min, self.config.max);
        self.target = value;

        let next = if smooth {
            self.config.smoothing_alpha * value
                + (1.0 - self.config.smoothing_alpha) * self.current
        } else {
            value
        };

        if (next - self.current).abs() < self.config.min_step {
            return None;
        }

        self.current = next;
        if self.history.len() == HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(next);

        debug!(
            actuator = self.kind.as_str(),
            value = next,
            availability = self.availability.as_str(),
            "actuator updated"
        );
        Some(next)
    }

    /// Current applied value. Callers that need continuous state poll
    /// this rather than relying on change events.
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Most recent target, whether or not it has been fully reached.
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Mean of the retained applied values (telemetry).
    pub fn history_mean(&self) -> f32 {
        if self.history.is_empty() {
            self.current
        } else {
            self.history.iter().sum::<f32>() / self.history.len() as f32
        }
    }
}

// ── Tests ───────────────────────────────────────────────────
