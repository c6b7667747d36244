//! Decoded MIDI data and the tick/seconds time base
//!
//! Tempo is piecewise constant: each SetTempo meta event starts a new
//! segment, and 120 bpm applies before the first one. Tick/second
//! conversions walk the segments and accumulate.

use std::collections::BTreeMap;

use super::event::{Event, MetaEvent};
use super::track::TrackData;

/// BPM assumed before the first tempo event
const DEFAULT_BPM: f64 = 120.0;

#[derive(Debug, Clone, Default)]
pub struct MidiData {
    resolution: u16,
    tracks: Vec<TrackData>,
    // tick -> bpm
    bpm_events: BTreeMap<i64, f64>,
    end_tick: i64,
}

impl MidiData {
    pub fn new(tracks: Vec<TrackData>, resolution: u16) -> Self {
        let mut bpm_events = BTreeMap::new();
        let mut end_tick = 0;

        for track in &tracks {
            for timed in track.events() {
                if let Event::Meta(MetaEvent::Tempo { bpm }) = timed.event {
                    bpm_events.insert(timed.tick, bpm);
                }
                end_tick = end_tick.max(timed.tick);
            }
        }

        Self {
            resolution,
            tracks,
            bpm_events,
            end_tick,
        }
    }

    pub fn tracks(&self) -> &[TrackData] {
        &self.tracks
    }

    /// Ticks per quarter note
    pub fn resolution(&self) -> u16 {
        self.resolution
    }

    /// Tick of the last event across all tracks
    pub fn end_tick(&self) -> i64 {
        self.end_tick
    }

    /// Tempo map as tick -> bpm
    pub fn bpm_events(&self) -> &BTreeMap<i64, f64> {
        &self.bpm_events
    }

    /// First tempo of the piece, 120 bpm when no tempo event exists
    pub fn initial_bpm(&self) -> f64 {
        self.bpm_events
            .values()
            .next()
            .copied()
            .unwrap_or(DEFAULT_BPM)
    }

    /// Wall-clock position of a tick, accumulated across tempo segments
    pub fn ticks_to_seconds(&self, current_tick: i64) -> f64 {
        self.ticks_to_seconds_f(current_tick as f64)
    }

    /// Fractional-tick variant of [`ticks_to_seconds`](Self::ticks_to_seconds)
    pub fn ticks_to_seconds_f(&self, current_tick: f64) -> f64 {
        let resolution = self.resolution as f64;
        let mut sum_of_time = 0.0;
        let mut last_bpm_set_tick = 0f64;
        let mut last_tick_to_sec = 60.0 / (resolution * DEFAULT_BPM);

        for (&tick, &bpm) in &self.bpm_events {
            let tick = tick as f64;
            if current_tick <= tick {
                return sum_of_time + last_tick_to_sec * (current_tick - last_bpm_set_tick);
            }
            sum_of_time += last_tick_to_sec * (tick - last_bpm_set_tick);
            last_bpm_set_tick = tick;
            last_tick_to_sec = 60.0 / (resolution * bpm);
        }

        sum_of_time + last_tick_to_sec * (current_tick - last_bpm_set_tick)
    }

    /// Tick at a wall-clock position, rounded to the nearest integer tick
    pub fn seconds_to_ticks(&self, seconds: f64) -> i64 {
        let (last_bpm_set_tick, segment_start, sec_to_ticks) = self.segment_at(seconds);
        last_bpm_set_tick + ((seconds - segment_start) * sec_to_ticks).round() as i64
    }

    /// Tick at a wall-clock position, fractional
    pub fn seconds_to_ticks_f(&self, seconds: f64) -> f64 {
        let (last_bpm_set_tick, segment_start, sec_to_ticks) = self.segment_at(seconds);
        last_bpm_set_tick as f64 + (seconds - segment_start) * sec_to_ticks
    }

    /// Locate the tempo segment containing `seconds`; returns the segment's
    /// starting tick, starting time and ticks-per-second rate
    fn segment_at(&self, seconds: f64) -> (i64, f64, f64) {
        let resolution = self.resolution as f64;
        let mut sum_of_time = 0.0;
        let mut last_bpm_set_tick = 0i64;
        let mut last_bpm = DEFAULT_BPM;

        for (&tick, &bpm) in &self.bpm_events {
            let next_sum_of_time =
                sum_of_time + (60.0 / (resolution * last_bpm)) * (tick - last_bpm_set_tick) as f64;
            if sum_of_time <= seconds && seconds < next_sum_of_time {
                break;
            }
            sum_of_time = next_sum_of_time;
            last_bpm_set_tick = tick;
            last_bpm = bpm;
        }

        (last_bpm_set_tick, sum_of_time, resolution * last_bpm / 60.0)
    }

    /// Wall-clock length up to the last event
    pub fn length_of_time(&self) -> f64 {
        self.ticks_to_seconds(self.end_tick)
    }

    pub fn length_samples(&self, sample_rate: u32) -> i64 {
        (self.length_of_time() * sample_rate as f64) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::event::TimedEvent;

    fn tempo_track(events: &[(i64, f64)], end_tick: i64) -> TrackData {
        let mut timed: Vec<TimedEvent> = events
            .iter()
            .map(|&(tick, bpm)| TimedEvent {
                tick,
                event: Event::Meta(MetaEvent::Tempo { bpm }),
            })
            .collect();
        timed.push(TimedEvent {
            tick: end_tick,
            event: Event::Meta(MetaEvent::EndOfTrack),
        });
        TrackData::new(timed)
    }

    #[test]
    fn test_default_tempo_is_120() {
        let midi = MidiData::new(vec![tempo_track(&[], 480)], 480);
        assert_eq!(midi.initial_bpm(), 120.0);
        // one quarter note at 120 bpm = 0.5 s
        assert!((midi.ticks_to_seconds(480) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_tempo_change_accumulates() {
        // 4 quarters at 120 bpm, then 4 quarters at 60 bpm
        let midi = MidiData::new(vec![tempo_track(&[(0, 120.0), (480 * 4, 60.0)], 480 * 8)], 480);
        assert!((midi.ticks_to_seconds(480 * 4) - 2.0).abs() < 1e-12);
        assert!((midi.ticks_to_seconds(480 * 8) - 6.0).abs() < 1e-12);
        assert!((midi.length_of_time() - 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_seconds_to_ticks_inverse() {
        let midi = MidiData::new(vec![tempo_track(&[(0, 120.0), (480 * 4, 60.0)], 480 * 8)], 480);
        assert_eq!(midi.seconds_to_ticks(0.0), 0);
        assert_eq!(midi.seconds_to_ticks(2.0), 480 * 4);
        assert_eq!(midi.seconds_to_ticks(6.0), 480 * 8);
        // fractional variant is exact mid-segment
        let tick = midi.seconds_to_ticks_f(3.0);
        assert!((tick - (480.0 * 5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_seconds_to_ticks_monotone() {
        let midi = MidiData::new(
            vec![tempo_track(&[(0, 150.0), (960, 90.0), (1920, 200.0)], 3840)],
            480,
        );
        let mut prev = i64::MIN;
        for i in 0..=1000 {
            let t = midi.length_of_time() * i as f64 / 1000.0;
            let tick = midi.seconds_to_ticks(t);
            assert!(prev <= tick, "tick went backwards at t={}", t);
            prev = tick;
        }
    }

    #[test]
    fn test_length_samples() {
        let midi = MidiData::new(vec![tempo_track(&[], 480 * 4)], 480);
        // 4 quarters at 120 bpm = 2 s
        assert_eq!(midi.length_samples(44_100), 88_200);
    }
}
