//! Per-voice ADSR amplitude envelope
//!
//! A four-state machine driven by elapsed wall-clock time. Stage
//! boundaries fall through within a single update so zero-length stages
//! behave as instantaneous transitions: the `elapsed < duration` guard
//! fails for a zero duration before the interpolation would divide by it.

use super::dsp::lerp;

/// Envelope timing and levels, all in seconds except `sustain_level`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdsrConfig {
    pub attack_time: f64,
    pub decay_time: f64,
    /// Level held while the key stays down, in [0, 1]
    pub sustain_level: f64,
    /// Smoothing window for re-entering Sustain (mono legato retrigger);
    /// `None` snaps to the sustain level immediately
    pub sustain_reset_time: Option<f64>,
    pub release_time: f64,
}

impl Default for AdsrConfig {
    fn default() -> Self {
        Self {
            attack_time: 0.01,
            decay_time: 0.01,
            sustain_level: 0.6,
            sustain_reset_time: Some(0.05),
            release_time: 0.4,
        }
    }
}

impl AdsrConfig {
    pub fn new(attack_time: f64, decay_time: f64, sustain_level: f64, release_time: f64) -> Self {
        Self {
            attack_time,
            decay_time,
            sustain_level,
            release_time,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Envelope instance owned by one voice
#[derive(Debug, Clone)]
pub struct EnvGenerator {
    state: EnvState,
    // seconds since the last state transition
    elapsed: f64,
    // current level in [0, 1]
    current_level: f64,
    // level captured at the last state transition
    prev_state_level: f64,
}

impl Default for EnvGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvGenerator {
    /// A fresh envelope starts in Attack at level 0
    pub fn new() -> Self {
        Self {
            state: EnvState::Attack,
            elapsed: 0.0,
            current_level: 0.0,
            prev_state_level: 0.0,
        }
    }

    pub fn state(&self) -> EnvState {
        self.state
    }

    pub fn current_level(&self) -> f64 {
        self.current_level
    }

    /// Start the release stage from the current level. Idempotent.
    pub fn note_off(&mut self) {
        if self.state != EnvState::Release {
            self.prev_state_level = self.current_level;
            self.elapsed = 0.0;
            self.state = EnvState::Release;
        }
    }

    /// Force a stage change, keeping the current level as the new
    /// starting point (mono retrigger: Sustain under legato, else Attack)
    pub fn reset(&mut self, state: EnvState) {
        self.prev_state_level = self.current_level;
        self.elapsed = 0.0;
        self.state = state;
    }

    /// Advance the envelope by `dt` seconds
    pub fn update(&mut self, adsr: &AdsrConfig, dt: f64) {
        if self.state == EnvState::Attack {
            if self.elapsed < adsr.attack_time {
                self.current_level = lerp(self.prev_state_level, 1.0, self.elapsed / adsr.attack_time);
                self.elapsed += dt;
                return;
            }
            self.prev_state_level = self.current_level;
            self.elapsed -= adsr.attack_time;
            self.state = EnvState::Decay;
            // falls through to Decay within this update
        }

        if self.state == EnvState::Decay {
            if self.elapsed < adsr.decay_time {
                self.current_level = lerp(
                    self.prev_state_level,
                    adsr.sustain_level,
                    self.elapsed / adsr.decay_time,
                );
                self.elapsed += dt;
                return;
            }
            self.prev_state_level = self.current_level;
            self.elapsed -= adsr.decay_time;
            self.state = EnvState::Sustain;
        }

        if self.state == EnvState::Sustain {
            self.current_level = match adsr.sustain_reset_time {
                Some(reset_time) if self.elapsed < reset_time => {
                    lerp(self.prev_state_level, adsr.sustain_level, self.elapsed / reset_time)
                }
                _ => adsr.sustain_level,
            };
            self.elapsed += dt;
            return;
        }

        // Release
        self.current_level = if self.elapsed < adsr.release_time {
            lerp(self.prev_state_level, 0.0, self.elapsed / adsr.release_time)
        } else {
            0.0
        };
        self.elapsed += dt;
    }

    /// True once the release stage has run its full length
    pub fn is_released(&self, adsr: &AdsrConfig) -> bool {
        self.state == EnvState::Release && adsr.release_time <= self.elapsed
    }
}
