//! A single sounding note
//!
//! Each voice carries one phase accumulator per unison copy. Fresh voices
//! scatter their initial phases at random so stacked unison copies do not
//! start in phase and spike the mix.

use std::f64::consts::TAU;

use super::envelope::{EnvGenerator, EnvState};
use super::random::Lcg;

/// Upper bound on unison copies per voice
pub const MAX_UNISON: usize = 16;

#[derive(Debug, Clone)]
pub struct Voice {
    pub(crate) note: u8,
    // normalized velocity in [0, 1]
    pub(crate) velocity: f32,
    pub(crate) envelope: EnvGenerator,
    pub(crate) phases: [f64; MAX_UNISON],
}

impl Voice {
    pub fn new(note: u8, velocity: u8, rng: &mut Lcg) -> Self {
        let mut phases = [0.0; MAX_UNISON];
        for phase in &mut phases {
            *phase = rng.next_f64() * TAU;
        }
        Self {
            note,
            velocity: velocity as f32 / 127.0,
            envelope: EnvGenerator::new(),
            phases,
        }
    }

    /// Mono retrigger: the new note inherits the running phases so the
    /// waveform continues without a click. Legato keeps the envelope in
    /// Sustain, otherwise it restarts from the current level in Attack.
    pub fn retrigger(previous: &Voice, note: u8, velocity: u8, legato: bool) -> Self {
        let mut voice = previous.clone();
        voice.note = note;
        voice.velocity = velocity as f32 / 127.0;
        voice.envelope.reset(if legato {
            EnvState::Sustain
        } else {
            EnvState::Attack
        });
        voice
    }

    pub fn note(&self) -> u8 {
        self.note
    }

    pub fn envelope(&self) -> &EnvGenerator {
        &self.envelope
    }
}
