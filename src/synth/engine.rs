//! Voice management and per-sample mixing
//!
//! The synthesizer owns the live voices and renders one stereo frame per
//! call. Parameter setters clamp silently; out-of-range input never fails.

use std::f64::consts::{FRAC_PI_4, TAU};
use std::ops::{Add, AddAssign, Mul};

use log::trace;

use super::dsp::{note_to_hz, semitone_offset, semitones_to_ratio};
use super::envelope::{AdsrConfig, EnvState};
use super::random::Lcg;
use super::voice::{Voice, MAX_UNISON};
use super::wavetable::{global_bank, WaveForm, WavetableBank, SAMPLE_RATE};

/// One stereo sample, nominal range [-1, 1] per channel
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StereoFrame {
    pub left: f32,
    pub right: f32,
}

impl StereoFrame {
    pub const ZERO: StereoFrame = StereoFrame {
        left: 0.0,
        right: 0.0,
    };

    pub fn new(left: f32, right: f32) -> Self {
        Self { left, right }
    }
}

impl Add for StereoFrame {
    type Output = StereoFrame;

    fn add(self, rhs: StereoFrame) -> StereoFrame {
        StereoFrame::new(self.left + rhs.left, self.right + rhs.right)
    }
}

impl AddAssign for StereoFrame {
    fn add_assign(&mut self, rhs: StereoFrame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl Mul<f32> for StereoFrame {
    type Output = StereoFrame;

    fn mul(self, rhs: f32) -> StereoFrame {
        StereoFrame::new(self.left * rhs, self.right * rhs)
    }
}

pub struct Synthesizer {
    // voices in note-on order; scanned linearly, polyphony stays small
    voices: Vec<Voice>,

    adsr: AdsrConfig,
    amplitude: f64,
    pitch_shift: f64,
    waveform: WaveForm,

    unison_count: usize,
    detune: f64,
    spread: f64,

    mono: bool,
    legato: bool,
    glide: bool,
    glide_time: f64,

    // per-copy detune ratios and equal-power pan gains, refreshed only
    // when a unison parameter changes
    detune_pitch: [f64; MAX_UNISON],
    unison_pan: [(f32, f32); MAX_UNISON],

    // mono-glide state
    current_freq: f64,
    glide_scale: f64,

    rng: Lcg,
    bank: &'static WavetableBank,
}

impl Default for Synthesizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Synthesizer {
    pub fn new() -> Self {
        let center_pan = (FRAC_PI_4.cos() as f32, FRAC_PI_4.sin() as f32);
        Self {
            voices: Vec::new(),
            adsr: AdsrConfig::default(),
            amplitude: 0.1,
            pitch_shift: 0.0,
            waveform: WaveForm::Saw,
            unison_count: 1,
            detune: 0.0,
            spread: 1.0,
            mono: false,
            legato: false,
            glide: false,
            glide_time: 0.0,
            detune_pitch: [1.0; MAX_UNISON],
            unison_pan: [center_pan; MAX_UNISON],
            current_freq: 440.0,
            glide_scale: 1.0,
            rng: Lcg::default(),
            bank: global_bank(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Start a voice. In mono mode the existing voice is retriggered
    /// instead, inheriting its phase accumulators.
    pub fn note_on(&mut self, note: u8, velocity: u8) {
        let note = note.min(127);
        let velocity = velocity.min(127);

        if !self.mono || self.voices.is_empty() {
            self.voices.push(Voice::new(note, velocity, &mut self.rng));
        } else {
            // the retriggered note may differ, so rebuild the single voice
            let previous = self.voices[0].clone();
            self.voices.clear();
            self.voices
                .push(Voice::retrigger(&previous, note, velocity, self.legato));
        }

        if self.mono && self.glide {
            let target_freq = note_to_hz(note);
            if self.glide_time <= 0.0 {
                // no glide window: jump straight to the target
                self.current_freq = target_freq;
                self.glide_scale = 1.0;
            } else {
                let glide_samples = SAMPLE_RATE as f64 * self.glide_time;
                self.glide_scale = (target_freq / self.current_freq).powf(1.0 / glide_samples);
            }
        }

        trace!("noteOn {} vel {} -> {} voices", note, velocity, self.voices.len());
    }

    /// Release the oldest still-held voice playing `note`
    pub fn note_off(&mut self, note: u8) {
        for voice in &mut self.voices {
            if voice.note == note && voice.envelope.state() != EnvState::Release {
                voice.envelope.note_off();
                break;
            }
        }
    }

    /// Drop all voices immediately (patch reload)
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Instantaneous oscillator frequency; follows the glide in mono mode
    pub fn current_frequency(&self) -> f64 {
        self.current_freq
    }

    /// Render one stereo frame and advance every voice by one sample
    pub fn render_sample(&mut self) -> StereoFrame {
        let dt = 1.0 / SAMPLE_RATE as f64;

        for voice in &mut self.voices {
            voice.envelope.update(&self.adsr, dt);
        }
        let adsr = self.adsr;
        self.voices.retain(|v| !v.envelope.is_released(&adsr));

        let pitch = semitones_to_ratio(self.pitch_shift);
        let mut sample = StereoFrame::ZERO;

        for voice in &mut self.voices {
            let target_freq = note_to_hz(voice.note);

            if self.mono && self.glide {
                let prev_freq = self.current_freq;
                let next_freq = self.current_freq * self.glide_scale;
                // never overshoot the target
                if (target_freq - next_freq).abs() < (target_freq - prev_freq).abs() {
                    self.current_freq = next_freq;
                } else {
                    self.current_freq = target_freq;
                }
            } else {
                self.current_freq = target_freq;
            }

            let env_level = voice.envelope.current_level() * voice.velocity as f64;
            let frequency = self.current_freq * pitch;

            for d in 0..self.unison_count {
                let detune_frequency = frequency * self.detune_pitch[d];
                let phase = &mut voice.phases[d];

                let osc = self.bank.get(self.waveform, *phase, detune_frequency);
                *phase += dt * detune_frequency * TAU;
                // modular, not clamped; the increment can exceed one cycle
                // at extreme pitch shift so a single subtraction is not enough
                while TAU < *phase {
                    *phase -= TAU;
                }

                let w = (osc * env_level) as f32;
                sample.left += w * self.unison_pan[d].0;
                sample.right += w * self.unison_pan[d].1;
            }
        }

        sample * ((self.amplitude / (self.unison_count as f64).sqrt()) as f32)
    }

    pub fn adsr(&self) -> AdsrConfig {
        self.adsr
    }

    pub fn set_adsr(&mut self, adsr: AdsrConfig) {
        self.adsr = AdsrConfig {
            attack_time: adsr.attack_time.max(0.0),
            decay_time: adsr.decay_time.max(0.0),
            sustain_level: adsr.sustain_level.clamp(0.0, 1.0),
            sustain_reset_time: adsr.sustain_reset_time.map(|t| t.max(0.0)),
            release_time: adsr.release_time.max(0.0),
        };
    }

    pub fn set_amplitude(&mut self, amplitude: f64) {
        self.amplitude = amplitude.clamp(0.0, 1.0);
    }

    pub fn waveform(&self) -> WaveForm {
        self.waveform
    }

    pub fn set_waveform(&mut self, waveform: WaveForm) {
        self.waveform = waveform;
    }

    /// Oscillator selector by patch index (0 = saw .. 3 = noise)
    pub fn set_osc_index(&mut self, index: usize) {
        self.waveform = WaveForm::from_index(index);
    }

    pub fn set_pitch_shift(&mut self, semitones: f64) {
        self.pitch_shift = semitones.clamp(-24.0, 24.0);
    }

    pub fn set_unison_count(&mut self, count: usize) {
        self.unison_count = count.clamp(1, MAX_UNISON);
        self.update_unison_param();
    }

    pub fn set_detune(&mut self, detune: f64) {
        self.detune = detune.clamp(0.0, 1.0);
        self.update_unison_param();
    }

    /// Stereo width of the unison copies. With a single copy the pan
    /// stays centered regardless of the spread setting.
    pub fn set_spread(&mut self, spread: f64) {
        self.spread = spread.clamp(0.0, 1.0);
        self.update_unison_param();
    }

    pub fn set_mono(&mut self, mono: bool) {
        self.mono = mono;
    }

    pub fn set_legato(&mut self, legato: bool) {
        self.legato = legato;
    }

    pub fn set_glide(&mut self, glide: bool) {
        self.glide = glide;
    }

    pub fn set_glide_time(&mut self, seconds: f64) {
        self.glide_time = seconds.max(0.0);
    }

    fn update_unison_param(&mut self) {
        if self.unison_count == 1 {
            self.detune_pitch = [1.0; MAX_UNISON];
            let center = (FRAC_PI_4.cos() as f32, FRAC_PI_4.sin() as f32);
            self.unison_pan = [center; MAX_UNISON];
            return;
        }

        for d in 0..self.unison_count {
            // copy position in [-1, 1]
            let detune_pos = -1.0 + 2.0 * d as f64 / (self.unison_count - 1) as f64;

            // shift each copy by at most one semitone times the detune amount
            self.detune_pitch[d] = 1.0 + semitone_offset() * self.detune * detune_pos;

            // pi/4 is center; equal-power pan
            let unison_angle = FRAC_PI_4 * (1.0 + detune_pos * self.spread);
            self.unison_pan[d] = (unison_angle.cos() as f32, unison_angle.sin() as f32);
        }
    }

    #[cfg(test)]
    fn voices(&self) -> &[Voice] {
        &self.voices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(synth: &mut Synthesizer, samples: usize) -> Vec<StereoFrame> {
        (0..samples).map(|_| synth.render_sample()).collect()
    }

    #[test]
    fn test_poly_voices_stack_per_note() {
        let mut synth = Synthesizer::new();
        synth.note_on(60, 100);
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        assert_eq!(synth.active_voices(), 3);

        // one note_off retires exactly one of the stacked voices
        synth.note_off(60);
        let released = synth
            .voices()
            .iter()
            .filter(|v| v.envelope().state() == EnvState::Release)
            .count();
        assert_eq!(released, 1);
    }

    #[test]
    fn test_note_off_skips_already_released() {
        let mut synth = Synthesizer::new();
        synth.note_on(60, 100);
        synth.note_on(60, 100);
        synth.note_off(60);
        synth.note_off(60);
        let released = synth
            .voices()
            .iter()
            .filter(|v| v.envelope().state() == EnvState::Release)
            .count();
        assert_eq!(released, 2);
    }

    #[test]
    fn test_voices_retire_after_release() {
        let mut synth = Synthesizer::new();
        synth.set_adsr(AdsrConfig::new(0.01, 0.01, 0.5, 0.05));
        synth.note_on(60, 100);
        synth.note_on(67, 100);
        render(&mut synth, 2000);
        synth.note_off(60);
        synth.note_off(67);
        // attack+decay+release comfortably inside half a second
        render(&mut synth, SAMPLE_RATE as usize / 2);
        assert_eq!(synth.active_voices(), 0);
    }

    #[test]
    fn test_mono_keeps_single_voice() {
        let mut synth = Synthesizer::new();
        synth.set_mono(true);
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        synth.note_on(67, 100);
        assert_eq!(synth.active_voices(), 1);
        assert_eq!(synth.voices()[0].note(), 67);
    }

    #[test]
    fn test_mono_retrigger_inherits_phase() {
        let mut synth = Synthesizer::new();
        synth.set_mono(true);
        synth.note_on(60, 100);
        render(&mut synth, 100);
        let phases_before = synth.voices()[0].phases;
        synth.note_on(72, 100);
        assert_eq!(synth.voices()[0].phases, phases_before);
    }

    #[test]
    fn test_phases_stay_wrapped() {
        let mut synth = Synthesizer::new();
        synth.set_unison_count(8);
        synth.set_detune(0.5);
        synth.note_on(100, 127); // high note stresses the wrap
        render(&mut synth, 40_000);
        for voice in synth.voices() {
            for &phase in &voice.phases[..8] {
                assert!(
                    (0.0..TAU).contains(&phase),
                    "phase {} escaped [0, 2pi)",
                    phase
                );
            }
        }
    }

    #[test]
    fn test_glide_time_zero_jumps_instantly() {
        let mut synth = Synthesizer::new();
        synth.set_mono(true);
        synth.set_glide(true);
        synth.set_glide_time(0.0);
        synth.note_on(60, 100);
        synth.render_sample();
        assert!((synth.current_frequency() - note_to_hz(60)).abs() < 1e-9);
        synth.note_on(72, 100);
        synth.render_sample();
        assert!((synth.current_frequency() - note_to_hz(72)).abs() < 1e-9);
    }

    #[test]
    fn test_glide_converges_without_overshoot() {
        let mut synth = Synthesizer::new();
        synth.set_mono(true);
        synth.set_glide(true);
        synth.set_glide_time(0.05);
        synth.note_on(60, 100);
        synth.render_sample();
        synth.note_on(72, 100);

        let target = note_to_hz(72);
        let mut prev_gap = (target - synth.current_frequency()).abs();
        for _ in 0..(SAMPLE_RATE as usize / 10) {
            synth.render_sample();
            let gap = (target - synth.current_frequency()).abs();
            assert!(gap <= prev_gap + 1e-9);
            prev_gap = gap;
        }
        assert!(prev_gap < 1e-6);
    }

    #[test]
    fn test_setters_clamp() {
        let mut synth = Synthesizer::new();
        synth.set_amplitude(7.0);
        synth.set_unison_count(99);
        synth.set_detune(-3.0);
        synth.set_pitch_shift(100.0);
        synth.set_osc_index(42);
        synth.note_on(60, 100);
        let frame = synth.render_sample();
        assert!(frame.left.is_finite() && frame.right.is_finite());
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut synth = Synthesizer::new();
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        synth.clear();
        assert_eq!(synth.active_voices(), 0);
        assert_eq!(synth.render_sample(), StereoFrame::ZERO);
    }
}
