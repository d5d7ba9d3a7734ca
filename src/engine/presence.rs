//! Presence tracking — a two-state latch with a single absence timer.
//!
//! Media pauses after the audience has been gone for a configured
//! timeout and resumes the instant anyone reappears. Deliberately no
//! intermediate states: one timer, one latch.

use tracing::info;

// ── Config ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PresenceConfig {
    /// Seconds without any subject before media is paused.
    pub absence_timeout_s: f64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            absence_timeout_s: 3.0,
        }
    }
}

// ── Events ──────────────────────────────────────────────────

/// Latch transitions, emitted at most once per transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Absence timeout elapsed; media should pause.
    Paused,
    /// A subject reappeared while paused; media should resume.
    Resumed,
}

// ── Tracker ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct PresenceTracker {
    pub config: PresenceConfig,
    last_seen_s: Option<f64>,
    paused: bool,
}

impl PresenceTracker {
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            config,
            last_seen_s: None,
            paused: false,
        }
    }

    /// Feed the tick's subject count; returns a transition if one fired.
    pub fn update(&mut self, subject_count: usize, now_s: f64) -> Option<PresenceEvent> {
        if subject_count > 0 {
            self.last_seen_s = Some(now_s);
            if self.paused {
                self.paused = false;
                info!("subject returned, resuming media");
                return Some(PresenceEvent::Resumed);
            }
            return None;
        }

        // Nobody visible. An engine that has never seen anyone starts
        // its absence clock from the first empty tick.
        let last_seen = *self.last_seen_s.get_or_insert(now_s);
        if !self.paused && now_s - last_seen > self.config.absence_timeout_s {
            self.paused = true;
            info!(
                absent_s = now_s - last_seen,
                "no subject detected, pausing media"
            );
            return Some(PresenceEvent::Paused);
        }
        None
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

// ── Tests ───────────────────────────────────────────────────
