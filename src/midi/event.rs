//! Event types produced by the SMF decoder

/// Note-on: `velocity` is always non-zero (velocity 0 decodes as note-off)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOn {
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOff {
    pub channel: u8,
    pub note: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolyKeyPressure {
    pub channel: u8,
    pub note: u8,
    pub pressure: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramChange {
    pub channel: u8,
    pub program: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelPressure {
    pub channel: u8,
    pub pressure: u8,
}

/// Pitch bend: `value` is the raw 14-bit amount, 0x2000 = center
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PitchBend {
    pub channel: u8,
    pub value: u16,
}

/// Channel voice messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn(NoteOn),
    NoteOff(NoteOff),
    PolyKeyPressure(PolyKeyPressure),
    ControlChange(ControlChange),
    ProgramChange(ProgramChange),
    ChannelPressure(ChannelPressure),
    PitchBend(PitchBend),
}

/// Meta events the synthesizer cares about; everything else decodes to
/// `Other` and is kept only so track structure stays intact
#[derive(Debug, Clone, PartialEq)]
pub enum MetaEvent {
    TrackName(String),
    Tempo { bpm: f64 },
    TimeSignature { numerator: u32, denominator: u32 },
    EndOfTrack,
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Midi(MidiEvent),
    Meta(MetaEvent),
    /// System-exclusive payloads are skipped during decode
    SysEx,
}

/// An event with its absolute position on the tick timeline
#[derive(Debug, Clone, PartialEq)]
pub struct TimedEvent {
    pub tick: i64,
    pub event: Event,
}
