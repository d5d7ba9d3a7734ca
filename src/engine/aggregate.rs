//! Multi-subject weighted aggregation — reduces a set of per-subject
//! distance/position readings to one scalar control distance.
//!
//! Closer subjects and subjects near the frame center dominate the
//! aggregate, so a passer-by at the edge of the frame does not yank the
//! actuators away from the person actually watching the display.

use tracing::debug;

/// Normalized distance from frame center to a corner.
const CORNER_DISTANCE: f32 = 0.707;

// ── Subject reading ─────────────────────────────────────────

/// One detected subject for a single tick, as produced by the external
/// detector. Ephemeral; the engine never stores these.
#[derive(Debug, Clone)]
pub struct SubjectReading {
    /// Estimated distance from the display in centimeters.
    pub distance_cm: f32,
    /// Position in the frame, normalized to [0, 1] on both axes.
    pub position: (f32, f32),
    /// Detector confidence (0.0–1.0).
    pub confidence: f32,
}

// ── Config ──────────────────────────────────────────────────

/// Weights and thresholds for subject aggregation.
#[derive(Debug, Clone)]
pub struct AggregationConfig {
    /// Weight multiplier for subjects closer than `near_threshold_cm`.
    pub weight_near: f32,
    /// Weight multiplier for subjects at or beyond `near_threshold_cm`.
    pub weight_far: f32,
    /// Distance below which a subject counts as "near" (cm).
    pub near_threshold_cm: f32,
    /// Weight multiplier for subjects in the central frame region.
    pub weight_center: f32,
    /// Weight multiplier for subjects outside the central region.
    pub weight_edge: f32,
    /// Fraction of the frame considered central (0.6 = central 60%).
    pub center_ratio: f32,
    /// Sentinel distance reported when no subjects are present (cm).
    pub max_detection_cm: f32,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            weight_near: 2.0,
            weight_far: 1.0,
            near_threshold_cm: 100.0,
            weight_center: 1.5,
            weight_edge: 1.0,
            center_ratio: 0.6,
            max_detection_cm: 400.0,
        }
    }
}

// ── Aggregator ──────────────────────────────────────────────

/// Stateless weighted-mean reducer over subject readings.
#[derive(Debug, Clone)]
pub struct WeightedAggregator {
    pub config: AggregationConfig,
}

impl WeightedAggregator {
    pub fn new(config: AggregationConfig) -> Self {
        Self { config }
    }

    /// Weight from distance: near subjects dominate.
    pub fn distance_weight(&self, distance_cm: f32) -> f32 {
        if distance_cm < self.config.near_threshold_cm {
            self.config.weight_near
        } else {
            self.config.weight_far
        }
    }

    /// Weight from frame position: central subjects dominate.
    ///
    /// Distance from center is normalized by the corner distance so a
    /// subject in the exact corner scores 1.0.
    pub fn spatial_weight(&self, position: (f32, f32)) -> f32 {
        let dx = position.0 - 0.5;
        let dy = position.1 - 0.5;
        let normalized = (dx * dx + dy * dy).sqrt() / CORNER_DISTANCE;
        if normalized < (1.0 - self.config.center_ratio) {
            self.config.weight_center
        } else {
            self.config.weight_edge
        }
    }

    /// Combined weight for one subject (multiplicative).
    pub fn subject_weight(&self, subject: &SubjectReading) -> f32 {
        self.distance_weight(subject.distance_cm) * self.spatial_weight(subject.position)
    }

    /// Weighted mean distance over all subjects.
    ///
    /// Empty input yields `max_detection_cm`, the "subject absent"
    /// sentinel for downstream curves. Zero total weight falls back to
    /// the unweighted mean.
    pub fn weighted_distance(&self, subjects: &[SubjectReading]) -> f32 {
        if subjects.is_empty() {
            return self.config.max_detection_cm;
        }

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;
        for subject in subjects {
            let weight = self.subject_weight(subject);
            weighted_sum += subject.distance_cm * weight;
            total_weight += weight;
        }

        let aggregated = if total_weight > 0.0 {
            weighted_sum / total_weight
        } else {
            subjects.iter().map(|s| s.distance_cm).sum::<f32>() / subjects.len() as f32
        };

        debug!(
            subjects = subjects.len(),
            distance_cm = aggregated,
            "aggregated subject distance"
        );
        aggregated
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn subject(distance_cm: f32, position: (f32, f32)) -> SubjectReading {
        SubjectReading {
            distance_cm,
            position,
            confidence: 0.9,
        }
    }

    #[test]
    fn test_empty_input_yields_sentinel() {
        let agg = WeightedAggregator::new(AggregationConfig::default());
        assert_eq!(agg.weighted_distance(&[]), 400.0);
    }

    #[test]
    fn test_single_subject_is_its_own_distance() {
        let agg = WeightedAggregator::new(AggregationConfig::default());
        let d = agg.weighted_distance(&[subject(120.0, (0.5, 0.5))]);
        assert!((d - 120.0).abs() < 1e-4);
    }

    #[test]
    fn test_distance_weight_thresholds() {
        let agg = WeightedAggregator::new(AggregationConfig::default());
        assert_eq!(agg.distance_weight(60.0), 2.0);
        assert_eq!(agg.distance_weight(100.0), 1.0);
        assert_eq!(agg.distance_weight(250.0), 1.0);
    }

    #[test]
    fn test_spatial_weight_center_vs_corner() {
        let agg = WeightedAggregator::new(AggregationConfig::default());
        // Dead center: normalized distance 0 < 0.4, so center weight.
        assert_eq!(agg.spatial_weight((0.5, 0.5)), 1.5);
        // Corner: normalized distance 1.0, edge weight.
        assert_eq!(agg.spatial_weight((1.0, 1.0)), 1.0);
        // Slightly off-center stays in the central region.
        assert_eq!(agg.spatial_weight((0.55, 0.55)), 1.5);
    }

    #[test]
    fn test_near_center_subject_dominates() {
        let agg = WeightedAggregator::new(AggregationConfig::default());
        // One subject at 60cm dead center (weight 2.0 * 1.5 = 3.0),
        // one at 120cm in a corner (weight 1.0 * 1.0 = 1.0).
        let subjects = [subject(60.0, (0.5, 0.5)), subject(120.0, (0.95, 0.95))];
        let weighted = agg.weighted_distance(&subjects);
        let unweighted: f32 = (60.0 + 120.0) / 2.0;
        assert!(
            (weighted - 60.0).abs() < (unweighted - 60.0).abs(),
            "weighted mean {weighted} should sit closer to 60 than the plain mean {unweighted}"
        );
        // (60*3 + 120*1) / 4 = 75
        assert!((weighted - 75.0).abs() < 1e-3);
    }

    #[test]
    fn test_zero_weight_falls_back_to_plain_mean() {
        let mut config = AggregationConfig::default();
        config.weight_near = 0.0;
        config.weight_far = 0.0;
        let agg = WeightedAggregator::new(config);
        let subjects = [subject(80.0, (0.5, 0.5)), subject(160.0, (0.9, 0.9))];
        assert!((agg.weighted_distance(&subjects) - 120.0).abs() < 1e-4);
    }
}
