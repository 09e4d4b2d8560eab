//! MIDI file writer
//!
//! Interpreted rows are split into one track per group, each note becoming
//! a note_on at its start and a note_off at its end.

use super::delta;
use crate::error::{Error, Result};
use crate::mml::event::{EventRow, EventTable};
use crate::options::GroupBy;
use midly::num::{u15, u24, u28, u4, u7};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::fs;
use std::path::Path;

/// Velocity of every written note event
pub const NOTE_VELOCITY: u8 = 64;

/// Note event type of a written track.
///
/// The declaration order is the tie-break at equal ticks: a note ending on
/// a tick is closed before a note starting on it is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NoteEvent {
    NoteOff,
    NoteOn,
}

/// One note event of an output track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackOutEvent {
    pub delta: u32,
    pub kind: NoteEvent,
    pub pitch: u8,
}

/// One output track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiTrackOut {
    pub name: String,
    pub events: Vec<TrackOutEvent>,
}

/// Build one track per distinct group value, in ascending group order
pub fn build_tracks(table: &EventTable, by: GroupBy) -> Vec<MidiTrackOut> {
    let groups = table.groups(by);
    log::info!("found {} unique group(s)", groups.len());

    groups
        .into_iter()
        .map(|(value, rows)| MidiTrackOut {
            name: format!("{}_{}", by.name(), value),
            events: track_events(&rows),
        })
        .collect()
}

fn track_events(rows: &[EventRow]) -> Vec<TrackOutEvent> {
    let mut timeline: Vec<(u32, NoteEvent, u8)> = Vec::with_capacity(rows.len() * 2);
    for row in rows {
        let Some(pitch) = u8::try_from(row.pitch).ok().filter(|&p| p <= 127) else {
            log::warn!("could not append note {} at tick {}: out of range", row.pitch, row.time);
            continue;
        };
        timeline.push((row.time, NoteEvent::NoteOn, pitch));
        timeline.push((row.end(), NoteEvent::NoteOff, pitch));
    }
    timeline.sort_by_key(|&(tick, kind, _)| (tick, kind));

    let ticks: Vec<u32> = timeline.iter().map(|&(tick, _, _)| tick).collect();
    delta::to_deltas(&ticks)
        .into_iter()
        .zip(timeline)
        .map(|(delta, (_, kind, pitch))| TrackOutEvent { delta, kind, pitch })
        .collect()
}

/// Standard MIDI File encoder
pub struct MidiWriter {
    ppq: u16,
    tempo: Option<u32>,
}

impl MidiWriter {
    pub fn new(ppq: u16) -> Self {
        Self { ppq, tempo: None }
    }

    /// Put a set_tempo (microseconds per quarter) at the start of the first track
    pub fn with_tempo(mut self, micros_per_quarter: Option<u32>) -> Self {
        self.tempo = micros_per_quarter;
        self
    }

    /// Encode the tracks as a multi-track file.
    ///
    /// A tempo slower than the 24-bit field allows is written as the slowest
    /// one it can hold.
    pub fn encode(&self, tracks: &[MidiTrackOut]) -> Result<Vec<u8>> {
        let ppq = u15::try_from(self.ppq)
            .filter(|ppq| ppq.as_int() > 0)
            .ok_or(Error::InvalidPpq(self.ppq))?;
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(ppq)));
        let tempo = self.tempo.map(|micros| {
            u24::try_from(micros.max(1)).unwrap_or_else(|| {
                log::warn!(
                    "tempo of {} us per quarter clamped to {}",
                    micros,
                    u24::max_value()
                );
                u24::max_value()
            })
        });

        for (index, track) in tracks.iter().enumerate() {
            let mut events = Vec::with_capacity(track.events.len() + 3);
            events.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(track.name.as_bytes())),
            });
            if let (0, Some(tempo)) = (index, tempo) {
                events.push(TrackEvent {
                    delta: u28::new(0),
                    kind: TrackEventKind::Meta(MetaMessage::Tempo(tempo)),
                });
            }
            for event in &track.events {
                let key = u7::new(event.pitch);
                let vel = u7::new(NOTE_VELOCITY);
                let message = match event.kind {
                    NoteEvent::NoteOn => MidiMessage::NoteOn { key, vel },
                    NoteEvent::NoteOff => MidiMessage::NoteOff { key, vel },
                };
                let delta = u28::try_from(event.delta).ok_or_else(|| Error::DeltaTooLong {
                    track: track.name.clone(),
                    delta: event.delta,
                })?;
                events.push(TrackEvent {
                    delta,
                    kind: TrackEventKind::Midi {
                        channel: u4::new(0),
                        message,
                    },
                });
            }
            events.push(TrackEvent {
                delta: u28::new(0),
                kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
            });
            smf.tracks.push(events);
        }

        let mut buf = Vec::new();
        smf.write_std(&mut buf)?;
        Ok(buf)
    }

    /// Encode and write in one go, so a failed encode leaves no file behind
    pub fn save(&self, tracks: &[MidiTrackOut], path: &Path) -> Result<()> {
        let data = self.encode(tracks)?;
        fs::write(path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::reader::MidiReader;

    fn row(time: u32, instrument: u32, pitch: i32, ticks: u32) -> EventRow {
        EventRow {
            time,
            channel: 0,
            instrument,
            pitch,
            ticks,
        }
    }

    #[test]
    fn test_note_off_sorts_before_note_on() {
        let mut table = EventTable::new();
        table.push(row(0, 0, 60, 48));
        table.push(row(48, 0, 62, 48));

        let tracks = build_tracks(&table, GroupBy::Instrument);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "instrument_0");
        assert_eq!(
            tracks[0].events,
            vec![
                TrackOutEvent { delta: 0, kind: NoteEvent::NoteOn, pitch: 60 },
                TrackOutEvent { delta: 48, kind: NoteEvent::NoteOff, pitch: 60 },
                TrackOutEvent { delta: 0, kind: NoteEvent::NoteOn, pitch: 62 },
                TrackOutEvent { delta: 48, kind: NoteEvent::NoteOff, pitch: 62 },
            ]
        );
    }

    #[test]
    fn test_one_track_per_group() {
        let mut table = EventTable::new();
        table.push(row(0, 7, 60, 48));
        table.push(row(0, 2, 64, 96));
        let tracks = build_tracks(&table, GroupBy::Instrument);
        let names: Vec<&str> = tracks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["instrument_2", "instrument_7"]);

        let tracks = build_tracks(&table, GroupBy::Channel);
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "channel_0");
        assert_eq!(tracks[0].events.len(), 4);
    }

    #[test]
    fn test_out_of_range_notes_are_skipped() {
        let mut table = EventTable::new();
        table.push(row(0, 0, -3, 48));
        table.push(row(0, 0, 130, 48));
        table.push(row(0, 0, 60, 48));
        let tracks = build_tracks(&table, GroupBy::Instrument);
        assert_eq!(tracks[0].events.len(), 2);
    }

    #[test]
    fn test_encoded_file_reads_back() {
        let mut table = EventTable::new();
        table.push(row(0, 0, 60, 48));
        table.push(row(48, 0, 64, 24));
        let tracks = build_tracks(&table, GroupBy::Instrument);
        let data = MidiWriter::new(48)
            .with_tempo(Some(400_000))
            .encode(&tracks)
            .unwrap();

        let midi = MidiReader::new(48).read(&data).unwrap();
        assert_eq!(midi.source_ppq, 48);
        assert_eq!(midi.names(), vec!["instrument_0"]);
        assert_eq!(midi.tempo.slowest(), 400_000);
        let ticks: Vec<u32> = midi.channels[0]
            .note_events()
            .iter()
            .map(|e| e.tick)
            .collect();
        assert_eq!(ticks, vec![0, 48, 48, 72]);
    }

    #[test]
    fn test_slow_tempo_is_clamped() {
        let mut table = EventTable::new();
        table.push(row(0, 0, 60, 48));
        let tracks = build_tracks(&table, GroupBy::Instrument);
        let data = MidiWriter::new(48)
            .with_tempo(Some(24_576_000))
            .encode(&tracks)
            .unwrap();
        let midi = MidiReader::new(48).read(&data).unwrap();
        assert_eq!(midi.tempo.slowest(), 0xFF_FFFF);
    }

    #[test]
    fn test_ppq_out_of_header_range() {
        let mut table = EventTable::new();
        table.push(row(0, 0, 60, 48));
        let tracks = build_tracks(&table, GroupBy::Instrument);
        assert!(matches!(
            MidiWriter::new(40_000).encode(&tracks),
            Err(Error::InvalidPpq(40_000))
        ));
        assert!(matches!(
            MidiWriter::new(0).encode(&tracks),
            Err(Error::InvalidPpq(0))
        ));
    }

    #[test]
    fn test_gap_too_long_for_delta() {
        let mut table = EventTable::new();
        table.push(row(0, 0, 60, 48));
        table.push(row(300_000_000, 0, 62, 48));
        let tracks = build_tracks(&table, GroupBy::Instrument);
        let err = MidiWriter::new(48).encode(&tracks).unwrap_err();
        assert!(matches!(
            err,
            Error::DeltaTooLong { ref track, delta } if track == "instrument_0" && delta == 299_999_952
        ));
    }
}
