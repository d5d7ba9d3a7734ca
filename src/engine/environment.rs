//! Environment monitoring — optional ambient-light and background-noise
//! inputs, decimated to every Nth tick as a cost-reduction policy.
//!
//! Ambient light scales the distance-derived brightness target;
//! background noise above an RMS threshold adds a volume boost so
//! speech stays intelligible over room noise.

use tracing::debug;

// ── Config ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Ambient level (0–255) below which the room counts as dark.
    pub dark_threshold: f32,
    /// Ambient level (0–255) above which the room counts as bright.
    pub bright_threshold: f32,
    /// RMS noise level above which volume compensation kicks in.
    pub noise_threshold: f32,
    /// Only sample the environmental inputs every Nth tick.
    pub decimate_every: u32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            dark_threshold: 50.0,
            bright_threshold: 200.0,
            noise_threshold: 0.01,
            decimate_every: 5,
        }
    }
}

// ── Monitor ─────────────────────────────────────────────────

/// Holds the most recent decimated samples and derives adjustment
/// factors from them.
#[derive(Debug, Clone)]
pub struct EnvironmentMonitor {
    pub config: EnvironmentConfig,
    tick: u64,
    ambient: Option<f32>,
    noise: f32,
}

impl EnvironmentMonitor {
    pub fn new(config: EnvironmentConfig) -> Self {
        Self {
            config,
            tick: 0,
            ambient: None,
            noise: 0.0,
        }
    }

    /// Accept this tick's environmental inputs, sampling only on
    /// decimated ticks. Inputs on skipped ticks are dropped.
    pub fn observe(&mut self, ambient_light: Option<f32>, background_noise: Option<f32>) {
        let sample = self.tick % self.config.decimate_every.max(1) as u64 == 0;
        self.tick += 1;
        if !sample {
            return;
        }
        if let Some(ambient) = ambient_light {
            self.ambient = Some(ambient);
            debug!(ambient, "sampled ambient light");
        }
        if let Some(noise) = background_noise {
            self.noise = noise;
        }
    }

    /// Multiplier for the brightness target: dim rooms get 0.7, bright
    /// rooms 1.3, everything else (or no sample yet) is neutral.
    pub fn ambient_factor(&self) -> f32 {
        match self.ambient {
            Some(a) if a < self.config.dark_threshold => 0.7,
            Some(a) if a > self.config.bright_threshold => 1.3,
            _ => 1.0,
        }
    }

    /// Additive volume compensation for background noise, 0.0 when the
    /// room is quiet. Callers clamp the boosted value to the domain.
    pub fn noise_boost(&self) -> f32 {
        if self.noise > self.config.noise_threshold {
            self.noise * 0.4
        } else {
            0.0
        }
    }

    /// Last sampled ambient level, for telemetry.
    pub fn ambient(&self) -> Option<f32> {
        self.ambient
    }
}

// ── Tests ───────────────────────────────────────────────────
