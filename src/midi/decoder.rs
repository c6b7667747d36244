//! SMF (.mid) decoder
//!
//! Reads a format 0 or 1 Standard MIDI File: an `MThd` header chunk
//! followed by one `MTrk` chunk per track, each a length-prefixed blob of
//! `(delta-time, event)` pairs. Running status is honored by rewinding the
//! cursor one byte when a data byte appears where a status byte belongs.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, trace};

use super::data::MidiData;
use super::error::{LoadError, LoadErrorKind};
use super::event::{
    ChannelPressure, ControlChange, Event, MetaEvent, MidiEvent, NoteOff, NoteOn, PitchBend,
    PolyKeyPressure, ProgramChange, TimedEvent,
};
use super::reader::ByteReader;
use super::track::TrackData;

/// Decode an SMF byte stream
pub fn decode(bytes: &[u8]) -> Result<MidiData, LoadError> {
    let mut reader = ByteReader::new(bytes);

    let header_pos = reader.position();
    let marker = reader.read_bytes(4)?;
    if marker != b"MThd" {
        return Err(LoadError::new(LoadErrorKind::BadHeader, header_pos));
    }

    let length_pos = reader.position();
    let header_length = reader.read_u32()?;
    if header_length != 6 {
        return Err(LoadError::new(LoadErrorKind::BadHeader, length_pos));
    }

    let format_pos = reader.position();
    let format = reader.read_u16()?;
    if format != 0 && format != 1 {
        return Err(LoadError::new(LoadErrorKind::BadFormat, format_pos));
    }

    let track_count = reader.read_u16()?;
    let resolution = reader.read_u16()?;
    debug!(
        "SMF: format {}, {} tracks, {} ticks per quarter",
        format, track_count, resolution
    );

    let mut tracks = Vec::with_capacity(track_count as usize);
    for index in 0..track_count {
        let events = decode_track(&mut reader)?;
        trace!("SMF: track {} holds {} events", index, events.len());
        tracks.push(TrackData::new(events));
    }

    Ok(MidiData::new(tracks, resolution))
}

/// Read an SMF from disk; I/O and decode failures both surface here
pub fn load_midi_file(path: impl AsRef<Path>) -> Result<MidiData> {
    let path = path.as_ref();
    let bytes = fs::read(path)
        .with_context(|| format!("failed to read MIDI file '{}'", path.display()))?;
    let midi = decode(&bytes)
        .with_context(|| format!("failed to decode MIDI file '{}'", path.display()))?;
    Ok(midi)
}

fn decode_track(reader: &mut ByteReader) -> Result<Vec<TimedEvent>, LoadError> {
    let marker_pos = reader.position();
    let marker = reader.read_bytes(4)?;
    if marker != b"MTrk" {
        return Err(LoadError::new(LoadErrorKind::BadTrackMarker, marker_pos));
    }

    let track_length = reader.read_u32()? as usize;
    let track_end = reader.position() + track_length;

    let mut events = Vec::new();
    let mut current_tick: i64 = 0;
    let mut running_status: u8 = 0;

    loop {
        let delta = reader.read_vlq()?;
        current_tick += delta as i64;

        let status_pos = reader.position();
        let mut status = reader.read_u8()?;
        if status < 0x80 {
            // running status: the byte just read is data, re-read it
            status = running_status;
            reader.rewind(1);
            if status < 0x80 {
                return Err(LoadError::new(LoadErrorKind::UnknownOpcode, status_pos));
            }
        }
        running_status = status;

        let channel = status & 0x0F;
        let event = match status & 0xF0 {
            0x80 => {
                let note = reader.read_u8()?;
                reader.read_u8()?; // release velocity, unused
                Event::Midi(MidiEvent::NoteOff(NoteOff { channel, note }))
            }
            0x90 => {
                let note = reader.read_u8()?;
                let velocity = reader.read_u8()?;
                // velocity 0 means note-off
                if velocity == 0 {
                    Event::Midi(MidiEvent::NoteOff(NoteOff { channel, note }))
                } else {
                    Event::Midi(MidiEvent::NoteOn(NoteOn {
                        channel,
                        note,
                        velocity,
                    }))
                }
            }
            0xA0 => {
                let note = reader.read_u8()?;
                let pressure = reader.read_u8()?;
                Event::Midi(MidiEvent::PolyKeyPressure(PolyKeyPressure {
                    channel,
                    note,
                    pressure,
                }))
            }
            0xB0 => {
                let controller = reader.read_u8()?;
                let value = reader.read_u8()?;
                Event::Midi(MidiEvent::ControlChange(ControlChange {
                    channel,
                    controller,
                    value,
                }))
            }
            0xC0 => {
                let program = reader.read_u8()?;
                Event::Midi(MidiEvent::ProgramChange(ProgramChange { channel, program }))
            }
            0xD0 => {
                let pressure = reader.read_u8()?;
                Event::Midi(MidiEvent::ChannelPressure(ChannelPressure {
                    channel,
                    pressure,
                }))
            }
            0xE0 => {
                // 14-bit value, LSB first
                let lsb = reader.read_u8()?;
                let msb = reader.read_u8()?;
                let value = (((msb & 0x7F) as u16) << 7) | (lsb & 0x7F) as u16;
                Event::Midi(MidiEvent::PitchBend(PitchBend { channel, value }))
            }
            0xF0 => match status {
                0xF0 => {
                    // skip the payload up to the terminating 0xF7
                    while reader.read_u8()? != 0xF7 {}
                    Event::SysEx
                }
                0xFF => {
                    let meta = decode_meta_event(reader)?;
                    let end_of_track = meta == MetaEvent::EndOfTrack;
                    events.push(TimedEvent {
                        tick: current_tick,
                        event: Event::Meta(meta),
                    });
                    if end_of_track {
                        // remaining bytes up to the declared length are skipped
                        reader.set_position(track_end);
                        return Ok(events);
                    }
                    continue;
                }
                // a bare 0xF7 (or any other system status) is rejected
                _ => return Err(LoadError::new(LoadErrorKind::UnknownOpcode, status_pos)),
            },
            _ => return Err(LoadError::new(LoadErrorKind::UnknownOpcode, status_pos)),
        };

        events.push(TimedEvent {
            tick: current_tick,
            event,
        });
    }
}

fn decode_meta_event(reader: &mut ByteReader) -> Result<MetaEvent, LoadError> {
    let meta_type = reader.read_u8()?;
    match meta_type {
        // end of track
        0x2F => {
            reader.read_u8()?; // length, always 0
            Ok(MetaEvent::EndOfTrack)
        }
        // set tempo: 3-byte microseconds per quarter note
        0x51 => {
            reader.read_u8()?; // length, always 3
            let micros_per_quarter = reader.read_u24()?;
            let bpm = 60.0e6 / micros_per_quarter as f64;
            debug!("SMF: tempo {:.2} bpm", bpm);
            Ok(MetaEvent::Tempo { bpm })
        }
        // time signature: numerator, log2(denominator), clocks, 32nds
        0x58 => {
            reader.read_u8()?; // length, always 4
            let numerator = reader.read_u8()? as u32;
            let denominator_log2 = reader.read_u8()?;
            reader.skip(2)?;
            Ok(MetaEvent::TimeSignature {
                numerator,
                denominator: 1u32 << denominator_log2,
            })
        }
        // sequence/track name
        0x03 => {
            let length = reader.read_u8()? as usize;
            let text = reader.read_bytes(length)?;
            let name = String::from_utf8_lossy(text).into_owned();
            debug!("SMF: track name '{}'", name);
            Ok(MetaEvent::TrackName(name))
        }
        // every other meta event is length-prefixed; parse and ignore
        _ => {
            let length = reader.read_u8()? as usize;
            let payload = reader.read_bytes(length)?;
            trace!(
                "SMF: ignoring meta event 0x{:02X} ({} bytes): {:?}",
                meta_type,
                length,
                &payload[..length.min(16)]
            );
            Ok(MetaEvent::Other)
        }
    }
}
