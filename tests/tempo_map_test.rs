//! Tick/seconds conversions across tempo changes

mod common;
use common::SmfBuilder;

use smfsynth::midi::decode;
use smfsynth::synth::SAMPLE_RATE;

const RESOLUTION: u16 = 480;

/// Two tracks, 120 bpm initially, 60 bpm from the fifth quarter note
fn tempo_change_midi() -> smfsynth::MidiData {
    let mut smf = SmfBuilder::new(RESOLUTION);
    smf.track()
        .tempo(0, 120.0)
        .tempo(RESOLUTION as u32 * 4, 60.0)
        .end_of_track(0);
    smf.track()
        .note_on(0, 0, 60, 100)
        .note_off(RESOLUTION as u32 * 8, 0, 60)
        .end_of_track(0);
    decode(&smf.build()).unwrap()
}

#[test]
fn test_tempo_change_boundary_times() {
    let midi = tempo_change_midi();
    let res = RESOLUTION as i64;

    // four quarters at 120 bpm take 2 s, four more at 60 bpm take 4 s
    assert!((midi.ticks_to_seconds(res * 4) - 2.0).abs() < 1e-9);
    assert!((midi.ticks_to_seconds(res * 8) - 6.0).abs() < 1e-9);
}

#[test]
fn test_fractional_round_trip_is_below_one_sample() {
    let midi = tempo_change_midi();
    let length = midi.length_of_time();
    let tolerance = 1.0 / SAMPLE_RATE as f64;

    for i in 0..=2000 {
        let s = length * i as f64 / 2000.0;
        let err = (midi.ticks_to_seconds_f(midi.seconds_to_ticks_f(s)) - s).abs();
        assert!(err < tolerance, "round trip error {} at t={}", err, s);
    }
}

#[test]
fn test_rounded_round_trip_is_below_half_a_tick() {
    let midi = tempo_change_midi();
    let length = midi.length_of_time();
    // rounding costs at most half a tick at the slowest crossing tempo
    let tolerance = 60.0 / (RESOLUTION as f64 * 120.0) + 1e-9;

    for i in 0..=2000 {
        let s = length * i as f64 / 2000.0;
        let err = (midi.ticks_to_seconds(midi.seconds_to_ticks(s)) - s).abs();
        assert!(err <= tolerance, "round trip error {} at t={}", err, s);
    }
}

#[test]
fn test_seconds_to_ticks_is_monotone() {
    let midi = tempo_change_midi();
    let length = midi.length_of_time();

    let mut prev_rounded = i64::MIN;
    let mut prev_fractional = f64::MIN;
    for i in 0..=5000 {
        let s = (length + 1.0) * i as f64 / 5000.0;
        let rounded = midi.seconds_to_ticks(s);
        let fractional = midi.seconds_to_ticks_f(s);
        assert!(prev_rounded <= rounded, "rounded ticks went backwards at {}", s);
        assert!(
            prev_fractional <= fractional,
            "fractional ticks went backwards at {}",
            s
        );
        prev_rounded = rounded;
        prev_fractional = fractional;
    }
}

#[test]
fn test_playhead_ticks_never_decrease_across_samples() {
    let midi = tempo_change_midi();
    let total = midi.length_samples(SAMPLE_RATE);

    let mut prev = i64::MIN;
    for sample in 0..total {
        let tick = midi.seconds_to_ticks(sample as f64 / SAMPLE_RATE as f64);
        assert!(prev <= tick);
        prev = tick;
    }
}

#[test]
fn test_default_tempo_applies_before_first_event() {
    // tempo event only at the fifth quarter; 120 bpm implied before it
    let mut smf = SmfBuilder::new(RESOLUTION);
    smf.track()
        .tempo(RESOLUTION as u32 * 4, 240.0)
        .end_of_track(RESOLUTION as u32 * 4);
    let midi = decode(&smf.build()).unwrap();

    let res = RESOLUTION as i64;
    assert!((midi.ticks_to_seconds(res * 4) - 2.0).abs() < 1e-9);
    // after the event one quarter lasts 0.25 s
    assert!((midi.ticks_to_seconds(res * 8) - 3.0).abs() < 1e-9);
}
