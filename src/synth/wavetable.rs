//! Band-limited wavetable oscillators
//!
//! Saw and square waves are pre-rendered from their Fourier series at 80
//! log-spaced fundamentals between 20 Hz and Nyquist, each truncated at the
//! highest harmonic that stays below Nyquist for that fundamental. Lookup
//! interpolates between the two tables bracketing the requested frequency,
//! and between neighbouring samples within each table, so playback stays
//! alias-free across the whole note range.

use std::f64::consts::{PI, TAU};
use std::sync::OnceLock;

use super::dsp::{inv_lerp, lerp};
use super::random::Lcg;

/// Output sample rate in Hz
pub const SAMPLE_RATE: u32 = 44_100;

/// Lowest fundamental a table is rendered for
const MIN_FREQ: f64 = 20.0;

/// Tables per band-limited waveform
const TABLE_COUNT: usize = 80;

/// Samples per single-cycle table
const TABLE_RESOLUTION: usize = 2048;

/// Entries in the frequency -> table index map
const FREQ_INDEX_SIZE: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveForm {
    Saw,
    Sine,
    Square,
    Noise,
}

impl WaveForm {
    pub const ALL: [WaveForm; 4] = [
        WaveForm::Saw,
        WaveForm::Sine,
        WaveForm::Square,
        WaveForm::Noise,
    ];

    /// Patch index as exposed by the oscillator selector
    pub fn from_index(index: usize) -> WaveForm {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn index(self) -> usize {
        match self {
            WaveForm::Saw => 0,
            WaveForm::Sine => 1,
            WaveForm::Square => 2,
            WaveForm::Noise => 3,
        }
    }
}

/// Saw from its Fourier series, truncated at harmonic `n`
fn wave_saw(t: f64, n: u32) -> f64 {
    let mut sum = 0.0;
    for k in 1..=n {
        let a = if k % 2 == 0 { 1.0 } else { -1.0 } / k as f64;
        sum += a * (k as f64 * t).sin();
    }
    -2.0 * sum / PI
}

/// Square from its odd-harmonic series, `n` terms
fn wave_square(t: f64, n: u32) -> f64 {
    let mut sum = 0.0;
    for k in 1..=n {
        let a = 2.0 * k as f64 - 1.0;
        sum += (a * t).sin() / a;
    }
    4.0 * sum / PI
}

/// One single-cycle table sampled uniformly over [0, 2pi)
#[derive(Debug, Clone)]
struct Wavetable {
    samples: Vec<f32>,
    phase_to_index: f64,
}

impl Wavetable {
    fn render(
        resolution: usize,
        frequency: f64,
        wave: WaveForm,
        max_freq: f64,
        rng: &mut Lcg,
    ) -> Self {
        let saw_harmonics = (max_freq / frequency) as u32;
        let square_harmonics = ((max_freq + frequency) / (frequency * 2.0)) as u32;

        let samples = (0..resolution)
            .map(|i| {
                let angle = TAU * i as f64 / resolution as f64;
                let value = match wave {
                    WaveForm::Saw => wave_saw(angle, saw_harmonics),
                    WaveForm::Sine => angle.sin(),
                    WaveForm::Square => wave_square(angle, square_harmonics),
                    WaveForm::Noise => rng.next_bipolar(),
                };
                value as f32
            })
            .collect();

        Self {
            samples,
            phase_to_index: resolution as f64 / TAU,
        }
    }

    /// Linear interpolation at `phase` in [0, 2pi]
    fn get(&self, phase: f64) -> f64 {
        let mut index_float = phase * self.phase_to_index;
        let mut prev_index = index_float as usize;
        if prev_index >= self.samples.len() {
            prev_index -= self.samples.len();
            index_float -= self.samples.len() as f64;
        }
        let mut next_index = prev_index + 1;
        if next_index == self.samples.len() {
            next_index = 0;
        }
        let frac = index_float - prev_index as f64;
        lerp(
            self.samples[prev_index] as f64,
            self.samples[next_index] as f64,
            frac,
        )
    }
}

/// All tables for one waveform plus the frequency -> table map
#[derive(Debug, Clone)]
pub struct BandLimitedTables {
    tables: Vec<Wavetable>,
    table_freqs: Vec<f32>,
    // freq bucket -> index of the first table above that frequency
    indices: Vec<u32>,
    freq_to_index: f64,
}

impl BandLimitedTables {
    fn build(
        table_count: usize,
        resolution: usize,
        wave: WaveForm,
        sample_rate: u32,
        rng: &mut Lcg,
    ) -> Self {
        let max_freq = sample_rate as f64 / 2.0;
        let min_freq_log = MIN_FREQ.log2();
        let max_freq_log = max_freq.log2();

        let mut tables = Vec::with_capacity(table_count);
        let mut table_freqs = Vec::with_capacity(table_count);
        for i in 0..table_count {
            let rate = i as f64 / table_count as f64;
            let freq = 2.0f64.powf(lerp(min_freq_log, max_freq_log, rate));
            tables.push(Wavetable::render(resolution, freq, wave, max_freq, rng));
            table_freqs.push(freq as f32);
        }

        let freq_to_index = FREQ_INDEX_SIZE as f64 / max_freq;
        let indices = (0..FREQ_INDEX_SIZE)
            .map(|i| {
                let freq = (i as f64 / freq_to_index) as f32;
                table_freqs.partition_point(|&table_freq| table_freq <= freq) as u32
            })
            .collect();

        Self {
            tables,
            table_freqs,
            indices,
            freq_to_index,
        }
    }

    /// Antialiased lookup at `phase` for a fundamental of `freq` Hz
    pub fn get(&self, phase: f64, freq: f64) -> f64 {
        let bucket = ((freq * self.freq_to_index) as usize).min(self.indices.len() - 1);
        let next_index = self.indices[bucket] as usize;
        if next_index == 0 {
            return self.tables[0].get(phase);
        }
        if next_index == self.table_freqs.len() {
            return self.tables[next_index - 1].get(phase);
        }

        let prev_index = next_index - 1;
        let rate = inv_lerp(
            self.table_freqs[prev_index] as f64,
            self.table_freqs[next_index] as f64,
            freq,
        );
        lerp(
            self.tables[prev_index].get(phase),
            self.tables[next_index].get(phase),
            rate,
        )
    }
}

/// The four per-waveform table banks, shared read-only by every voice
#[derive(Debug, Clone)]
pub struct WavetableBank {
    banks: [BandLimitedTables; 4],
}

impl WavetableBank {
    pub fn build(sample_rate: u32) -> Self {
        let mut rng = Lcg::default();
        let banks = [
            BandLimitedTables::build(TABLE_COUNT, TABLE_RESOLUTION, WaveForm::Saw, sample_rate, &mut rng),
            BandLimitedTables::build(1, TABLE_RESOLUTION, WaveForm::Sine, sample_rate, &mut rng),
            BandLimitedTables::build(TABLE_COUNT, TABLE_RESOLUTION, WaveForm::Square, sample_rate, &mut rng),
            // noise is non-periodic at audio rates: one table spanning a full second
            BandLimitedTables::build(1, sample_rate as usize, WaveForm::Noise, sample_rate, &mut rng),
        ];
        Self { banks }
    }

    pub fn get(&self, wave: WaveForm, phase: f64, freq: f64) -> f64 {
        self.banks[wave.index()].get(phase, freq)
    }
}

/// Process-wide bank at [`SAMPLE_RATE`], built on first use
pub fn global_bank() -> &'static WavetableBank {
    static BANK: OnceLock<WavetableBank> = OnceLock::new();
    BANK.get_or_init(|| WavetableBank::build(SAMPLE_RATE))
}
