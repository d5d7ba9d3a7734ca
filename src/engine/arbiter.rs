//! Control-mode arbitration — decides, per tick and per actuator,
//! whether the gesture path or the distance path drives the output.
//!
//! Discrete media gestures and presence pause/resume are routed
//! unconditionally; mode selection only affects the continuous
//! brightness/volume sources.

use super::gesture::{GestureEvent, GestureKind};

// ── Control mode ────────────────────────────────────────────

/// Which source may drive the continuous actuators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlMode {
    /// Distance tracking only; continuous gestures are ignored.
    Distance,
    /// Continuous gestures only; distance targets are ignored.
    Gesture,
    /// Gestures override while a hand is tracked, distance otherwise.
    #[default]
    Hybrid,
}

impl ControlMode {
    /// String representation for IPC and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Gesture => "gesture",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parse a mode from its string representation.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "distance" => Some(Self::Distance),
            "gesture" => Some(Self::Gesture),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

// ── Media commands ──────────────────────────────────────────

/// Transport commands handed to the media collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommand {
    Pause,
    Resume,
    PlayPauseToggle,
    Next,
    Previous,
}

impl MediaCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::PlayPauseToggle => "play-pause-toggle",
            Self::Next => "next",
            Self::Previous => "previous",
        }
    }
}

// ── Routing ─────────────────────────────────────────────────

/// One actuator's routed target for this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutedTarget {
    pub value: f32,
    /// Whether the smoother should blend or land in one step.
    pub smooth: bool,
}

/// Everything the arbiter decided for one tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Routing {
    /// Brightness target in percent, if any source claimed it.
    pub brightness: Option<RoutedTarget>,
    /// Volume target as a 0–1 scalar, if any source claimed it.
    pub volume: Option<RoutedTarget>,
    /// Discrete transport command, independent of mode.
    pub media: Option<MediaCommand>,
}

/// Merges the gesture and distance paths according to the active mode.
#[derive(Debug, Clone)]
pub struct ControlModeArbiter {
    pub mode: ControlMode,
}

impl ControlModeArbiter {
    pub fn new(mode: ControlMode) -> Self {
        Self { mode }
    }

    /// Route this tick's candidate targets.
    ///
    /// `distance_brightness` / `distance_volume` are the gate-approved
    /// curve outputs (brightness in percent, volume 0–1), present only
    /// on ticks where the gate passed a new value.
    pub fn arbitrate(
        &self,
        gesture: Option<&GestureEvent>,
        distance_brightness: Option<f32>,
        distance_volume: Option<f32>,
    ) -> Routing {
        let mut routing = Routing::default();

        // Discrete gestures map straight to transport commands.
        if let Some(evt) = gesture {
            routing.media = match evt.kind {
                GestureKind::PlayPause => Some(MediaCommand::PlayPauseToggle),
                GestureKind::NextTrack => Some(MediaCommand::Next),
                GestureKind::PrevTrack => Some(MediaCommand::Previous),
                _ => None,
            };
        }

        // Continuous gesture claim, if any.
        let continuous = gesture.and_then(|evt| match (evt.kind, evt.value) {
            (GestureKind::BrightnessAdjust, Some(v)) => Some((GestureKind::BrightnessAdjust, v)),
            (GestureKind::VolumeAdjust, Some(v)) => Some((GestureKind::VolumeAdjust, v)),
            _ => None,
        });

        match self.mode {
            ControlMode::Distance => {
                routing.brightness = distance_brightness.map(|value| RoutedTarget {
                    value,
                    smooth: true,
                });
                routing.volume = distance_volume.map(|value| RoutedTarget {
                    value,
                    smooth: true,
                });
            }
            ControlMode::Gesture => match continuous {
                Some((GestureKind::BrightnessAdjust, v)) => {
                    routing.brightness = Some(RoutedTarget {
                        value: v * 100.0,
                        smooth: false,
                    });
                }
                Some((GestureKind::VolumeAdjust, v)) => {
                    routing.volume = Some(RoutedTarget {
                        value: v,
                        smooth: false,
                    });
                }
                _ => {}
            },
            ControlMode::Hybrid => {
                // Gesture claims its actuator, everything else falls
                // back to the distance path.
                let mut brightness = distance_brightness.map(|value| RoutedTarget {
                    value,
                    smooth: true,
                });
                let mut volume = distance_volume.map(|value| RoutedTarget {
                    value,
                    smooth: true,
                });
                match continuous {
                    Some((GestureKind::BrightnessAdjust, v)) => {
                        brightness = Some(RoutedTarget {
                            value: v * 100.0,
                            smooth: true,
                        });
                    }
                    Some((GestureKind::VolumeAdjust, v)) => {
                        volume = Some(RoutedTarget {
                            value: v,
                            smooth: true,
                        });
                    }
                    _ => {}
                }
                routing.brightness = brightness;
                routing.volume = volume;
            }
        }

        routing
    }
}

// ── Tests ───────────────────────────────────────────────────
