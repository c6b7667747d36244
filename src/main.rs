use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use smfsynth::midi::MidiData;
use smfsynth::synth::{AdsrConfig, Sequencer, Synthesizer, WaveForm, SAMPLE_RATE};
use smfsynth::{load_midi_file, WavOutput};

fn parse_duration(s: &str) -> std::result::Result<Duration, std::num::ParseIntError> {
    let ms: u64 = s.parse()?;
    Ok(Duration::from_millis(ms))
}

fn parse_waveform(s: &str) -> std::result::Result<WaveForm, String> {
    match s.to_ascii_lowercase().as_str() {
        "saw" => Ok(WaveForm::Saw),
        "sine" | "sin" => Ok(WaveForm::Sine),
        "square" => Ok(WaveForm::Square),
        "noise" => Ok(WaveForm::Noise),
        other => Err(format!(
            "unknown waveform '{}' (expected saw, sine, square or noise)",
            other
        )),
    }
}

/// "attack,decay,sustain,release" in seconds (sustain is a level)
fn parse_adsr(s: &str) -> std::result::Result<AdsrConfig, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err("expected four comma-separated values: a,d,s,r".to_string());
    }
    let mut values = [0.0f64; 4];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .trim()
            .parse()
            .map_err(|e| format!("bad ADSR value '{}': {}", part, e))?;
    }
    Ok(AdsrConfig::new(values[0], values[1], values[2], values[3]))
}

/// Render Standard MIDI Files through a subtractive synthesizer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show tracks, tempo events and timing of a MIDI file
    Info {
        /// Path to the .mid file
        midi_file: PathBuf,
    },
    /// Render a MIDI file to a stereo WAV file
    Render {
        /// Path to the .mid file
        midi_file: PathBuf,

        /// Output WAV path
        #[arg(short, long, default_value = "out.wav")]
        output: PathBuf,

        /// Master amplitude [0, 1]
        #[arg(long, default_value_t = 0.2)]
        amplitude: f64,

        /// Oscillator waveform: saw, sine, square or noise
        #[arg(long, default_value = "saw", value_parser = parse_waveform)]
        waveform: WaveForm,

        /// Envelope as "attack,decay,sustain,release"
        #[arg(long, default_value = "0.01,0.01,0.6,0.4", value_parser = parse_adsr)]
        adsr: AdsrConfig,

        /// Unison copies per voice [1, 16]
        #[arg(long, default_value_t = 1)]
        unison: usize,

        /// Unison detune amount [0, 1]
        #[arg(long, default_value_t = 0.0)]
        detune: f64,

        /// Unison stereo spread [0, 1]
        #[arg(long, default_value_t = 1.0)]
        spread: f64,

        /// Pitch shift in semitones [-24, 24]
        #[arg(long, default_value_t = 0.0)]
        pitch_shift: f64,

        /// Monophonic mode
        #[arg(long)]
        mono: bool,

        /// Mono: overlapping notes keep the envelope in sustain
        #[arg(long)]
        legato: bool,

        /// Mono: glide between successive notes
        #[arg(long)]
        glide: bool,

        /// Glide time in seconds
        #[arg(long, default_value_t = 0.1)]
        glide_time: f64,

        /// Longest release tail kept after the last event, in milliseconds
        #[arg(long, default_value = "2000", value_parser = parse_duration)]
        tail: Duration,
    },
}

fn main() -> Result<()> {
    smfsynth::init_logging();

    let args = Args::parse();

    match args.command {
        Commands::Info { midi_file } => {
            let midi = load_midi_file(&midi_file)?;
            print_info(&midi);
        }
        Commands::Render {
            midi_file,
            output,
            amplitude,
            waveform,
            adsr,
            unison,
            detune,
            spread,
            pitch_shift,
            mono,
            legato,
            glide,
            glide_time,
            tail,
        } => {
            let midi = load_midi_file(&midi_file)?;
            if midi.length_samples(SAMPLE_RATE) == 0 {
                bail!("'{}' contains no playable events", midi_file.display());
            }

            let mut synth = Synthesizer::new();
            synth.set_amplitude(amplitude);
            synth.set_waveform(waveform);
            synth.set_adsr(adsr);
            synth.set_unison_count(unison);
            synth.set_detune(detune);
            synth.set_spread(spread);
            synth.set_pitch_shift(pitch_shift);
            synth.set_mono(mono);
            synth.set_legato(legato);
            synth.set_glide(glide);
            synth.set_glide_time(glide_time);

            render_to_wav(midi, synth, &output, tail)?;
            println!("wrote {}", output.display());
        }
    }

    Ok(())
}

fn print_info(midi: &MidiData) {
    println!("resolution: {} ticks per quarter", midi.resolution());
    println!("length:     {:.3} s ({} ticks)", midi.length_of_time(), midi.end_tick());
    println!("tempo:      {:.2} bpm initially", midi.initial_bpm());
    for (tick, bpm) in midi.bpm_events() {
        println!("  tick {:>8}  ->  {:.2} bpm  (t = {:.3} s)", tick, bpm, midi.ticks_to_seconds(*tick));
    }
    println!("tracks:     {}", midi.tracks().len());
    for (index, track) in midi.tracks().iter().enumerate() {
        let kind = if track.is_percussion() { " (percussion, skipped)" } else { "" };
        println!(
            "  #{:<3} channel {:<2} program {:<3} events {:>6}{}",
            index,
            track.channel(),
            track.program(),
            track.events().len(),
            kind
        );
    }
}

fn render_to_wav(midi: MidiData, mut synth: Synthesizer, output: &PathBuf, tail: Duration) -> Result<()> {
    const CHUNK: usize = 4096;
    // silence window that ends the tail early once releases have decayed
    const SILENCE_CUTOFF_US: u32 = 200_000;

    let score_samples = midi.length_samples(SAMPLE_RATE);
    let tail_samples = (tail.as_secs_f64() * SAMPLE_RATE as f64) as i64;
    let total_samples = score_samples + tail_samples;

    let mut sequencer = Sequencer::new(midi);
    let mut wav = WavOutput::new(output, SAMPLE_RATE, SILENCE_CUTOFF_US)
        .with_context(|| format!("cannot create '{}'", output.display()))?;

    info!(
        "rendering {} samples ({:.3} s) plus up to {:.3} s of tail",
        score_samples,
        score_samples as f64 / SAMPLE_RATE as f64,
        tail.as_secs_f64()
    );

    let mut frames = Vec::with_capacity(CHUNK);
    let mut rendered: i64 = 0;
    'render: while rendered < total_samples {
        frames.clear();
        while frames.len() < CHUNK && rendered < total_samples {
            frames.push(sequencer.process_sample(&mut synth));
            rendered += 1;
        }

        let silent = wav.write_frames(&frames)?;
        // in the tail, stop as soon as every voice has died down
        if silent && sequencer.finished() && synth.active_voices() == 0 {
            break 'render;
        }
    }

    wav.finalize()
}
