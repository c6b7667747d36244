//! Sample-clock sequencer
//!
//! Walks the decoded MIDI data one output sample at a time. Whenever the
//! playhead crosses into a new tick, the events inside the crossed tick
//! window are dispatched to the synthesizer; note-offs go first so a
//! retrigger of the same note ends cleanly before its new voice starts.

use crate::midi::MidiData;

use super::engine::{StereoFrame, Synthesizer};
use super::wavetable::SAMPLE_RATE;

pub struct Sequencer {
    midi: MidiData,
    playhead_samples: i64,
}

impl Sequencer {
    pub fn new(midi: MidiData) -> Self {
        Self {
            midi,
            playhead_samples: 0,
        }
    }

    pub fn midi(&self) -> &MidiData {
        &self.midi
    }

    pub fn playhead_samples(&self) -> i64 {
        self.playhead_samples
    }

    pub fn playhead_seconds(&self) -> f64 {
        self.playhead_samples as f64 / SAMPLE_RATE as f64
    }

    /// True once the playhead is past the last event
    pub fn finished(&self) -> bool {
        self.playhead_samples >= self.midi.length_samples(SAMPLE_RATE)
    }

    /// Dispatch events under the playhead, then render one frame
    pub fn process_sample(&mut self, synth: &mut Synthesizer) -> StereoFrame {
        let current_time = self.playhead_samples as f64 / SAMPLE_RATE as f64;
        let next_time = (self.playhead_samples + 1) as f64 / SAMPLE_RATE as f64;

        let current_tick = self.midi.seconds_to_ticks(current_time);
        let next_tick = self.midi.seconds_to_ticks(next_time);

        if current_tick != next_tick {
            for track in self.midi.tracks() {
                if track.is_percussion() {
                    continue;
                }

                for (_, note_off) in track.note_offs_in(current_tick..next_tick) {
                    synth.note_off(note_off.note);
                }
                for (_, note_on) in track.note_ons_in(current_tick..next_tick) {
                    synth.note_on(note_on.note, note_on.velocity);
                }
            }
        }

        self.playhead_samples += 1;
        synth.render_sample()
    }
}
