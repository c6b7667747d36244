use std::io::BufWriter;
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Result};
use hound::{WavSpec, WavWriter};

use crate::synth::StereoFrame;

/// Stereo WAV file writer with silence detection
///
/// The render loop keeps going past the last note to let releases ring
/// out; the silence detector tells it when the tail has actually died.
pub struct WavOutput {
    writer: Option<WavWriter<BufWriter<File>>>,
    spec: WavSpec,
    silence_samples: usize,
    silence_threshold_samples: usize,
    silence_threshold_amplitude: f32,
}

impl WavOutput {
    /// Create a new WAV output file
    ///
    /// # Arguments
    /// * `path` - Output WAV filename
    /// * `sample_rate` - Sample rate in Hz
    /// * `silence_duration_us` - Silence threshold in microseconds
    pub fn new(path: impl AsRef<Path>, sample_rate: u32, silence_duration_us: u32) -> Result<Self> {
        let path = path.as_ref();
        let spec = WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)
            .map_err(|e| anyhow!("Failed to create WAV file '{}': {}", path.display(), e))?;

        let silence_threshold_samples =
            ((silence_duration_us as u64 * sample_rate as u64) / 1_000_000) as usize;

        Ok(Self {
            writer: Some(writer),
            spec,
            silence_samples: 0,
            silence_threshold_samples,
            silence_threshold_amplitude: 1.0 / 32768.0,
        })
    }

    /// Write stereo frames to the WAV file
    ///
    /// Every frame is written; the return value reports whether the most
    /// recent frames form an unbroken run of silence longer than the
    /// configured threshold.
    pub fn write_frames(&mut self, frames: &[StereoFrame]) -> Result<bool> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("WAV writer is closed"))?;

        for frame in frames {
            writer
                .write_sample(to_pcm(frame.left))
                .map_err(|e| anyhow!("Failed to write WAV frame: {}", e))?;
            writer
                .write_sample(to_pcm(frame.right))
                .map_err(|e| anyhow!("Failed to write WAV frame: {}", e))?;

            let peak = frame.left.abs().max(frame.right.abs());
            if peak <= self.silence_threshold_amplitude {
                self.silence_samples += 1;
            } else {
                self.silence_samples = 0;
            }
        }

        Ok(self.silence_samples >= self.silence_threshold_samples)
    }

    /// Finalize and close the WAV file
    pub fn finalize(mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| anyhow!("Failed to finalize WAV file: {}", e))?;
        }
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn silence_threshold_samples(&self) -> usize {
        self.silence_threshold_samples
    }

    pub fn reset_silence_detection(&mut self) {
        self.silence_samples = 0;
    }
}

impl Drop for WavOutput {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.finalize(); // Ignore errors in destructor
        }
    }
}

/// Convert a float sample to 16-bit PCM, clamping out-of-range input
fn to_pcm(sample: f32) -> i16 {
    if sample.is_finite() {
        (sample.clamp(-1.0, 1.0) * 32767.0) as i16
    } else {
        0
    }
}
