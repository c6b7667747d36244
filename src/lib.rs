//! smfsynth - Standard MIDI File synthesizer
//!
//! Render SMF (.mid) files to stereo PCM with a polyphonic subtractive
//! synthesizer: band-limited wavetable oscillators, per-voice ADSR
//! envelopes, unison detune/spread and monophonic glide. Playback can run
//! offline (straight to WAV) or stream through a lock-free ring buffer to
//! a pull-based audio callback.

/// Initialize logging for the library
pub fn init_logging() {
    env_logger::init();
}

// SMF decoding and the tick/seconds time base
pub mod midi {
    //! Standard MIDI File decoding - tracks, events and the tempo map
    pub mod data;
    pub mod decoder;
    pub mod error;
    pub mod event;
    pub mod reader;
    pub mod track;

    // Re-export commonly used items
    pub use data::MidiData;
    pub use decoder::{decode, load_midi_file};
    pub use error::{LoadError, LoadErrorKind};
    pub use event::{Event, MetaEvent, MidiEvent, TimedEvent};
    pub use track::TrackData;
}

// Synthesis engine modules
pub mod synth {
    //! Subtractive synthesis engine - oscillators, envelopes, voices,
    //! the polyphonic mixer and the streaming layer
    pub mod dsp;
    pub mod engine;
    pub mod envelope;
    pub mod random;
    pub mod sequencer;
    pub mod stream;
    pub mod voice;
    pub mod wavetable;

    // Re-export commonly used items
    pub use engine::{StereoFrame, Synthesizer};
    pub use envelope::{AdsrConfig, EnvGenerator, EnvState};
    pub use sequencer::Sequencer;
    pub use stream::{AudioRenderer, PatchCommand, RenderHandle, StreamBuffer};
    pub use voice::{Voice, MAX_UNISON};
    pub use wavetable::{WaveForm, WavetableBank, SAMPLE_RATE};
}

// Application modules
pub mod wav_writer;

// Re-export main types
pub use midi::{load_midi_file, LoadError, LoadErrorKind, MidiData};
pub use synth::{AdsrConfig, Sequencer, StereoFrame, Synthesizer, SAMPLE_RATE};
pub use wav_writer::WavOutput;
