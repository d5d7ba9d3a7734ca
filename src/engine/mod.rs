//! Control engine — turns noisy per-tick observations into stable
//! actuator commands.
//!
//! Provides:
//! - `aggregate`: multi-subject weighted distance aggregation
//! - `curve`: distance-to-output response curves
//! - `stability`: hysteresis gate suppressing measurement jitter
//! - `actuator`: exponential smoothing and min-step write suppression
//! - `gesture`: finger-count gesture classification FSM
//! - `presence`: absence-timeout pause/resume latch
//! - `environment`: decimated ambient light / noise adjustments
//! - `arbiter`: mode-based routing of gesture vs distance control
//! - `control`: the `ControlEngine` tick loop gluing it all together

pub mod actuator;
pub mod aggregate;
pub mod arbiter;
pub mod control;
pub mod curve;
pub mod environment;
pub mod gesture;
pub mod presence;
pub mod stability;

pub use actuator::Availability;
pub use arbiter::{ControlMode, MediaCommand};
pub use control::{ControlEngine, EngineConfig, TickInput, TickOutput};
