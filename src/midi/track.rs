//! A decoded track with per-kind tick indices
//!
//! Each event kind is indexed by an ordered multimap so the sequencer can
//! range-query a tick window in logarithmic time.

use std::collections::BTreeMap;
use std::ops::Range;

use super::event::{
    ControlChange, Event, MidiEvent, NoteOff, NoteOn, PitchBend, PolyKeyPressure, ProgramChange,
    TimedEvent,
};

/// MIDI channel reserved for percussion
const PERCUSSION_CHANNEL: u8 = 9;

type TickIndex<T> = BTreeMap<i64, Vec<T>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackData {
    events: Vec<TimedEvent>,

    note_ons: TickIndex<NoteOn>,
    note_offs: TickIndex<NoteOff>,
    poly_key_pressures: TickIndex<PolyKeyPressure>,
    control_changes: TickIndex<ControlChange>,
    program_changes: TickIndex<ProgramChange>,
    pitch_bends: TickIndex<PitchBend>,

    channel: u8,
    program: u8,
}

impl TrackData {
    pub fn new(events: Vec<TimedEvent>) -> Self {
        let mut track = Self {
            events,
            ..Self::default()
        };
        track.build_indices();
        track
    }

    fn build_indices(&mut self) {
        for timed in &self.events {
            let tick = timed.tick;
            match &timed.event {
                Event::Midi(MidiEvent::NoteOn(e)) => {
                    self.note_ons.entry(tick).or_default().push(*e);
                }
                Event::Midi(MidiEvent::NoteOff(e)) => {
                    self.note_offs.entry(tick).or_default().push(*e);
                }
                Event::Midi(MidiEvent::PolyKeyPressure(e)) => {
                    self.poly_key_pressures.entry(tick).or_default().push(*e);
                }
                Event::Midi(MidiEvent::ControlChange(e)) => {
                    self.control_changes.entry(tick).or_default().push(*e);
                }
                Event::Midi(MidiEvent::ProgramChange(e)) => {
                    self.program_changes.entry(tick).or_default().push(*e);
                    self.channel = e.channel;
                    self.program = e.program;
                }
                Event::Midi(MidiEvent::PitchBend(e)) => {
                    self.pitch_bends.entry(tick).or_default().push(*e);
                }
                Event::Midi(MidiEvent::ChannelPressure(_)) | Event::Meta(_) | Event::SysEx => {}
            }
        }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Channel last claimed by a program change on this track
    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn program(&self) -> u8 {
        self.program
    }

    /// Channel 10 (0-based 9) carries drums; the synthesizer skips it
    pub fn is_percussion(&self) -> bool {
        self.channel == PERCUSSION_CHANNEL
    }

    pub fn note_ons_in(&self, ticks: Range<i64>) -> impl Iterator<Item = (i64, &NoteOn)> {
        range_query(&self.note_ons, ticks)
    }

    pub fn note_offs_in(&self, ticks: Range<i64>) -> impl Iterator<Item = (i64, &NoteOff)> {
        range_query(&self.note_offs, ticks)
    }

    pub fn poly_key_pressures_in(
        &self,
        ticks: Range<i64>,
    ) -> impl Iterator<Item = (i64, &PolyKeyPressure)> {
        range_query(&self.poly_key_pressures, ticks)
    }

    pub fn control_changes_in(
        &self,
        ticks: Range<i64>,
    ) -> impl Iterator<Item = (i64, &ControlChange)> {
        range_query(&self.control_changes, ticks)
    }

    pub fn program_changes_in(
        &self,
        ticks: Range<i64>,
    ) -> impl Iterator<Item = (i64, &ProgramChange)> {
        range_query(&self.program_changes, ticks)
    }

    pub fn pitch_bends_in(&self, ticks: Range<i64>) -> impl Iterator<Item = (i64, &PitchBend)> {
        range_query(&self.pitch_bends, ticks)
    }

    /// Tick of the last event (normally EndOfTrack)
    pub fn end_tick(&self) -> i64 {
        self.events.last().map(|e| e.tick).unwrap_or(0)
    }
}

fn range_query<T>(index: &TickIndex<T>, ticks: Range<i64>) -> impl Iterator<Item = (i64, &T)> {
    index
        .range(ticks)
        .flat_map(|(&tick, events)| events.iter().map(move |e| (tick, e)))
}
