//! Deterministic scripted input source.
//!
//! Stands in for the camera and hand-tracking detectors so the binary
//! runs end to end with no hardware: a looping scenario walks through
//! an empty room, a subject approaching and settling, gesture sweeps,
//! a discrete gesture, a second subject, and departure. Jitter is a
//! small sine wobble so the stability gate sees realistic noise while
//! every run stays reproducible.

use crate::engine::aggregate::SubjectReading;
use crate::engine::gesture::{GestureSignal, Handedness};

/// Scenario length in seconds; the script loops.
const CYCLE_S: f64 = 40.0;

/// Measurement jitter amplitude in centimeters.
const JITTER_CM: f32 = 1.5;

/// One tick's worth of simulated detector output.
#[derive(Debug, Clone, Default)]
pub struct SimFrame {
    pub subjects: Vec<SubjectReading>,
    pub gesture: Option<GestureSignal>,
    pub ambient_light: Option<f32>,
    pub background_noise: Option<f32>,
}

/// Scripted scenario generator. Call `frame` with the tick's monotonic
/// time offset from start.
#[derive(Debug, Default)]
pub struct Simulation;

impl Simulation {
    pub fn new() -> Self {
        Self
    }

    pub fn frame(&self, elapsed_s: f64) -> SimFrame {
        let t = elapsed_s % CYCLE_S;
        let jitter = (elapsed_s * 7.3).sin() as f32 * JITTER_CM;

        let mut frame = SimFrame {
            // Slow daylight swing between dim and bright.
            ambient_light: Some(120.0 + 90.0 * (elapsed_s * 0.05).sin() as f32),
            background_noise: Some(0.005),
            ..SimFrame::default()
        };

        match t {
            // Empty room.
            t if t < 3.0 => {}
            // Subject walks in from the far wall.
            t if t < 6.0 => {
                let progress = ((t - 3.0) / 3.0) as f32;
                frame.subjects.push(subject(350.0 - 230.0 * progress + jitter));
            }
            // Settled viewing distance.
            t if t < 12.0 => {
                frame.subjects.push(subject(120.0 + jitter));
            }
            // Two-finger brightness sweep, left to right.
            t if t < 14.0 => {
                frame.subjects.push(subject(120.0 + jitter));
                let x = 0.3 + 0.5 * ((t - 12.0) / 2.0) as f32;
                frame.gesture = Some(hand(2, x));
            }
            // Back to plain viewing.
            t if t < 20.0 => {
                frame.subjects.push(subject(120.0 + jitter));
            }
            // A brief four-finger hold: next track.
            t if t < 20.2 => {
                frame.subjects.push(subject(120.0 + jitter));
                frame.gesture = Some(hand(4, 0.5));
            }
            // A second subject joins further back.
            t if t < 28.0 => {
                frame.subjects.push(subject(120.0 + jitter));
                frame.subjects.push(SubjectReading {
                    distance_cm: 210.0 - jitter,
                    position: (0.25, 0.5),
                    confidence: 0.8,
                });
            }
            // Everyone leaves; absence timeout should pause playback.
            _ => {}
        }

        frame
    }
}

fn subject(distance_cm: f32) -> SubjectReading {
    SubjectReading {
        distance_cm,
        position: (0.5, 0.5),
        confidence: 0.9,
    }
}

fn hand(finger_count: u8, x: f32) -> GestureSignal {
    let mut fingers = [false; 5];
    for f in fingers.iter_mut().take(finger_count as usize) {
        *f = true;
    }
    GestureSignal {
        finger_count,
        fingers,
        position: (x, 0.5),
        hand: Handedness::Right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_phases() {
        let sim = Simulation::new();
        assert!(sim.frame(1.0).subjects.is_empty(), "room starts empty");
        assert_eq!(sim.frame(8.0).subjects.len(), 1);
        assert!(sim.frame(13.0).gesture.is_some(), "gesture sweep phase");
        assert_eq!(sim.frame(25.0).subjects.len(), 2);
        assert!(sim.frame(35.0).subjects.is_empty(), "departure phase");
    }

    #[test]
    fn test_scenario_loops() {
        let sim = Simulation::new();
        let a = sim.frame(8.0);
        let b = sim.frame(8.0 + CYCLE_S);
        assert_eq!(a.subjects.len(), b.subjects.len());
    }

    #[test]
    fn test_settled_distance_stays_within_gate_grace() {
        let sim = Simulation::new();
        for i in 0..60 {
            let t = 7.0 + i as f64 / 30.0;
            let d = sim.frame(t).subjects[0].distance_cm;
            assert!((d - 120.0).abs() <= JITTER_CM, "jitter must stay inside the grace range");
        }
    }
}
