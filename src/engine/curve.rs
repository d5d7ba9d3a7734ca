//! Distance-to-value response curves — pure mapping from an aggregated
//! subject distance to a target actuator value.
//!
//! Brightness uses a linear ramp; volume uses a power curve with an
//! exponent below 1 for a steep near-field response (small retreats
//! from the display raise the volume quickly, then flatten out).

// ── Curve shape ─────────────────────────────────────────────

/// Shape of the normalized-distance-to-value mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurveShape {
    /// Straight interpolation between low and high.
    Linear,
    /// `low + (high - low) * normalized^exponent`. Exponents below 1.0
    /// rise steeply near the low end.
    Power { exponent: f32 },
}

// ── Response curve ──────────────────────────────────────────

/// Per-actuator curve: distance range, output range, and shape.
#[derive(Debug, Clone)]
pub struct ResponseCurve {
    /// Distance mapped to `low` (cm).
    pub min_distance_cm: f32,
    /// Distance mapped to `high` (cm).
    pub max_distance_cm: f32,
    /// Output at minimum distance.
    pub low: f32,
    /// Output at maximum distance.
    pub high: f32,
    pub shape: CurveShape,
}

impl ResponseCurve {
    /// Brightness: 25–400cm onto 30–100%, linear. Farther is brighter.
    pub fn brightness() -> Self {
        Self {
            min_distance_cm: 25.0,
            max_distance_cm: 400.0,
            low: 30.0,
            high: 100.0,
            shape: CurveShape::Linear,
        }
    }

    /// Volume: 25–400cm onto 0.20–1.0 with a steep power curve.
    pub fn volume() -> Self {
        Self {
            min_distance_cm: 25.0,
            max_distance_cm: 400.0,
            low: 0.20,
            high: 1.0,
            shape: CurveShape::Power { exponent: 0.4 },
        }
    }

    /// Map a distance to a target value, clamped to `[low, high]`.
    pub fn map(&self, distance_cm: f32) -> f32 {
        let span = self.max_distance_cm - self.min_distance_cm;
        let normalized = if span > 0.0 {
            ((distance_cm - self.min_distance_cm) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let shaped = match self.shape {
            CurveShape::Linear => normalized,
            CurveShape::Power { exponent } => normalized.powf(exponent),
        };

        (self.low + (self.high - self.low) * shaped).clamp(
            self.low.min(self.high),
            self.low.max(self.high),
        )
    }
}

// ── Tests ───────────────────────────────────────────────────
