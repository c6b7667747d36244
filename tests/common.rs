//! Shared helpers: build tiny SMF byte streams and render audio

#![allow(dead_code)]

use smfsynth::synth::{Sequencer, StereoFrame, Synthesizer, SAMPLE_RATE};
use smfsynth::MidiData;

/// Incrementally builds one MTrk body; finish with [`SmfBuilder::build`]
pub struct SmfBuilder {
    resolution: u16,
    tracks: Vec<Vec<u8>>,
}

impl SmfBuilder {
    pub fn new(resolution: u16) -> Self {
        Self {
            resolution,
            tracks: Vec::new(),
        }
    }

    pub fn track(&mut self) -> TrackBuilder<'_> {
        self.tracks.push(Vec::new());
        TrackBuilder {
            body: self.tracks.last_mut().unwrap(),
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let mut bytes = b"MThd".to_vec();
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&(self.tracks.len() as u16).to_be_bytes());
        bytes.extend_from_slice(&self.resolution.to_be_bytes());
        for body in &self.tracks {
            bytes.extend_from_slice(b"MTrk");
            bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
            bytes.extend_from_slice(body);
        }
        bytes
    }
}

pub struct TrackBuilder<'a> {
    body: &'a mut Vec<u8>,
}

impl TrackBuilder<'_> {
    fn delta(&mut self, mut ticks: u32) -> &mut Self {
        let mut encoded = vec![(ticks & 0x7F) as u8];
        ticks >>= 7;
        while ticks > 0 {
            encoded.push(0x80 | (ticks & 0x7F) as u8);
            ticks >>= 7;
        }
        encoded.reverse();
        self.body.extend_from_slice(&encoded);
        self
    }

    pub fn note_on(&mut self, delta: u32, channel: u8, note: u8, velocity: u8) -> &mut Self {
        self.delta(delta);
        self.body
            .extend_from_slice(&[0x90 | (channel & 0x0F), note, velocity]);
        self
    }

    pub fn note_off(&mut self, delta: u32, channel: u8, note: u8) -> &mut Self {
        self.delta(delta);
        self.body.extend_from_slice(&[0x80 | (channel & 0x0F), note, 0]);
        self
    }

    pub fn program_change(&mut self, delta: u32, channel: u8, program: u8) -> &mut Self {
        self.delta(delta);
        self.body.extend_from_slice(&[0xC0 | (channel & 0x0F), program]);
        self
    }

    /// Raw bytes after a delta, for running-status experiments
    pub fn raw(&mut self, delta: u32, bytes: &[u8]) -> &mut Self {
        self.delta(delta);
        self.body.extend_from_slice(bytes);
        self
    }

    pub fn tempo(&mut self, delta: u32, bpm: f64) -> &mut Self {
        self.delta(delta);
        let micros_per_quarter = (60.0e6 / bpm).round() as u32;
        self.body.extend_from_slice(&[0xFF, 0x51, 0x03]);
        self.body.extend_from_slice(&micros_per_quarter.to_be_bytes()[1..4]);
        self
    }

    pub fn end_of_track(&mut self, delta: u32) -> &mut Self {
        self.delta(delta);
        self.body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        self
    }
}

/// Drive a sequencer through `samples` frames
pub fn render_frames(midi: MidiData, synth: &mut Synthesizer, samples: usize) -> Vec<StereoFrame> {
    let mut sequencer = Sequencer::new(midi);
    (0..samples).map(|_| sequencer.process_sample(synth)).collect()
}

/// RMS of the mid (L+R) signal over a frame window
pub fn rms(frames: &[StereoFrame]) -> f64 {
    if frames.is_empty() {
        return 0.0;
    }
    let sum: f64 = frames
        .iter()
        .map(|f| {
            let mid = (f.left + f.right) as f64 * 0.5;
            mid * mid
        })
        .sum();
    (sum / frames.len() as f64).sqrt()
}

/// Peak absolute sample value across both channels
pub fn peak(frames: &[StereoFrame]) -> f64 {
    frames
        .iter()
        .map(|f| f.left.abs().max(f.right.abs()) as f64)
        .fold(0.0, f64::max)
}

pub fn sample_count(seconds: f64) -> usize {
    (seconds * SAMPLE_RATE as f64) as usize
}
