//! Standard MIDI File reader
//!
//! Turns every track into a table of modeled events with absolute tick
//! stamps rescaled to the target PPQ. Tracks without any note_on are
//! control/meta tracks and are left out of the channel list.

use crate::error::{Diagnostic, Error, Result};
use midly::{EventIter, MetaMessage, MidiMessage, Timing, TrackEvent, TrackEventKind};
use serde::Serialize;

/// Tempo used when a file carries no set_tempo event (120 BPM)
pub const DEFAULT_TEMPO: u32 = 500_000;

/// Name given to tracks without a track_name meta event
pub const UNNAMED_TRACK: &str = "NA";

/// Modeled message kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    NoteOn { pitch: u8, velocity: u8 },
    NoteOff { pitch: u8, velocity: u8 },
    ControlChange { control: u8, value: u8 },
    ProgramChange { program: u8 },
    PitchWheel { pitch: i16 },
    SetTempo { micros_per_quarter: u32 },
}

/// One modeled message of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RawEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    /// MIDI channel; meta events have none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// Source ticks since the previous modeled event of the track
    pub tick_delta: u32,
    /// Absolute tick, rescaled to the target PPQ
    pub tick: u32,
}

impl RawEvent {
    /// Key number of a note event
    pub fn note_pitch(&self) -> Option<u8> {
        match self.kind {
            EventKind::NoteOn { pitch, .. } | EventKind::NoteOff { pitch, .. } => Some(pitch),
            _ => None,
        }
    }

    pub fn is_note_on(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { .. })
    }

    pub fn is_note_off(&self) -> bool {
        matches!(self.kind, EventKind::NoteOff { .. })
    }
}

/// Event table of one track that plays notes
#[derive(Debug, Clone, Serialize)]
pub struct Channel {
    /// Index of the source track
    pub track: usize,
    pub name: String,
    pub events: Vec<RawEvent>,
    /// Tick of the last message of the track, meta events included
    pub end_tick: u32,
}

impl Channel {
    /// The note_on/note_off events, in track order
    pub fn note_events(&self) -> Vec<RawEvent> {
        self.events
            .iter()
            .filter(|e| e.note_pitch().is_some())
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TempoChange {
    pub tick: u32,
    pub micros_per_quarter: u32,
}

/// Tempo changes sorted by tick; never empty
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TempoMap {
    changes: Vec<TempoChange>,
}

impl TempoMap {
    pub fn new(mut changes: Vec<TempoChange>) -> Self {
        if changes.is_empty() {
            changes.push(TempoChange {
                tick: 0,
                micros_per_quarter: DEFAULT_TEMPO,
            });
        }
        changes.sort_by_key(|c| c.tick);
        Self { changes }
    }

    pub fn changes(&self) -> &[TempoChange] {
        &self.changes
    }

    /// Longest quarter note in microseconds
    pub fn slowest(&self) -> u32 {
        self.changes
            .iter()
            .map(|c| c.micros_per_quarter)
            .max()
            .unwrap_or(DEFAULT_TEMPO)
    }

    /// Shortest quarter note in microseconds
    pub fn fastest(&self) -> u32 {
        self.changes
            .iter()
            .map(|c| c.micros_per_quarter)
            .min()
            .unwrap_or(DEFAULT_TEMPO)
    }
}

impl Default for TempoMap {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Beats per minute of a quarter-note duration in microseconds
pub fn micros_to_bpm(micros_per_quarter: u32) -> f64 {
    60e6 / micros_per_quarter.max(1) as f64
}

/// Human readable messages of one track
#[derive(Debug, Clone, Serialize)]
pub struct TrackDump {
    pub track: usize,
    pub name: String,
    pub lines: Vec<String>,
}

/// Result of reading a MIDI file
#[derive(Debug, Clone)]
pub struct IngestedMidi {
    /// Tracks that play notes
    pub channels: Vec<Channel>,
    pub tempo: TempoMap,
    /// PPQ declared in the file header
    pub source_ppq: u16,
    /// PPQ all ticks were rescaled to
    pub target_ppq: u16,
    /// Per-track message dumps, filled when requested
    pub dumps: Vec<TrackDump>,
    pub diagnostics: Vec<Diagnostic>,
}

impl IngestedMidi {
    pub fn names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Everything gathered from one track
struct TrackRead {
    channel: Option<Channel>,
    tempos: Vec<TempoChange>,
    dump: TrackDump,
}

/// MIDI file reader
pub struct MidiReader {
    target_ppq: u16,
    dump: bool,
}

impl MidiReader {
    pub fn new(target_ppq: u16) -> Self {
        Self {
            target_ppq,
            dump: false,
        }
    }

    /// Also keep a text rendering of every message
    pub fn with_dump(mut self, dump: bool) -> Self {
        self.dump = dump;
        self
    }

    /// Parse a complete MIDI file.
    ///
    /// Only an unreadable file header is fatal. Tracks that fail to decode
    /// are skipped and reported in `diagnostics`.
    pub fn read(&self, data: &[u8]) -> Result<IngestedMidi> {
        let (header, tracks) = midly::parse(data)?;
        let source_ppq = match header.timing {
            Timing::Metrical(ppq) if ppq.as_int() > 0 => ppq.as_int(),
            _ => return Err(Error::UnsupportedTiming),
        };

        let mut channels = Vec::new();
        let mut tempos = Vec::new();
        let mut dumps = Vec::new();
        let mut diagnostics = Vec::new();

        for (index, track) in tracks.enumerate() {
            let read = track
                .map_err(|e| Error::MalformedTrack {
                    track: index,
                    message: e.to_string(),
                })
                .and_then(|events| self.read_track(index, events, source_ppq));

            match read {
                Ok(read) => {
                    tempos.extend(read.tempos);
                    if self.dump {
                        dumps.push(read.dump);
                    }
                    match read.channel {
                        Some(channel) => {
                            log::info!(
                                "track {} '{}': {} events",
                                index,
                                channel.name,
                                channel.events.len()
                            );
                            channels.push(channel);
                        }
                        None => log::debug!("track {} has no notes, skipped", index),
                    }
                }
                Err(e) => {
                    log::warn!("{}", e);
                    diagnostics.push(Diagnostic::SkippedTrack {
                        track: index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(IngestedMidi {
            channels,
            tempo: TempoMap::new(tempos),
            source_ppq,
            target_ppq: self.target_ppq,
            dumps,
            diagnostics,
        })
    }

    fn read_track(&self, index: usize, events: EventIter<'_>, source_ppq: u16) -> Result<TrackRead> {
        let mut name: Option<String> = None;
        let mut table = Vec::new();
        let mut tempos = Vec::new();
        let mut lines = Vec::new();
        let mut source_tick = 0u64;
        let mut last_kept = 0u64;
        let mut has_note_on = false;

        for event in events {
            let event = event.map_err(|e| Error::MalformedTrack {
                track: index,
                message: e.to_string(),
            })?;
            source_tick += event.delta.as_int() as u64;

            if self.dump {
                lines.push(describe(&event));
            }

            if let TrackEventKind::Meta(MetaMessage::TrackName(raw)) = event.kind {
                let text = String::from_utf8_lossy(raw);
                let cleaned = text.trim_end_matches('\0').trim();
                if !cleaned.is_empty() {
                    name = Some(cleaned.to_string());
                }
                continue;
            }

            let Some((kind, channel)) = classify(&event.kind) else {
                continue;
            };
            let tick = rescale(source_tick, source_ppq, self.target_ppq);

            if let EventKind::SetTempo { micros_per_quarter } = kind {
                tempos.push(TempoChange {
                    tick,
                    micros_per_quarter,
                });
            }
            has_note_on |= matches!(kind, EventKind::NoteOn { .. });

            table.push(RawEvent {
                kind,
                channel,
                tick_delta: (source_tick - last_kept) as u32,
                tick,
            });
            last_kept = source_tick;
        }

        let name = name.unwrap_or_else(|| UNNAMED_TRACK.to_string());
        let channel = has_note_on.then(|| Channel {
            track: index,
            name: name.clone(),
            events: table,
            end_tick: rescale(source_tick, source_ppq, self.target_ppq),
        });

        Ok(TrackRead {
            channel,
            tempos,
            dump: TrackDump {
                track: index,
                name,
                lines,
            },
        })
    }
}

/// Map a track message onto a modeled kind; unmodeled messages give `None`
fn classify(kind: &TrackEventKind<'_>) -> Option<(EventKind, Option<u8>)> {
    match *kind {
        TrackEventKind::Midi { channel, message } => {
            let modeled = match message {
                MidiMessage::NoteOn { key, vel } if vel.as_int() == 0 => EventKind::NoteOff {
                    pitch: key.as_int(),
                    velocity: 0,
                },
                MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
                    pitch: key.as_int(),
                    velocity: vel.as_int(),
                },
                MidiMessage::Controller { controller, value } => EventKind::ControlChange {
                    control: controller.as_int(),
                    value: value.as_int(),
                },
                MidiMessage::ProgramChange { program } => EventKind::ProgramChange {
                    program: program.as_int(),
                },
                MidiMessage::PitchBend { bend } => EventKind::PitchWheel {
                    pitch: bend.as_int(),
                },
                _ => return None,
            };
            Some((modeled, Some(channel.as_int())))
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => Some((
            EventKind::SetTempo {
                micros_per_quarter: tempo.as_int(),
            },
            None,
        )),
        _ => None,
    }
}

/// Rescale an absolute tick from the file's PPQ to the target PPQ
pub fn rescale(tick: u64, source_ppq: u16, target_ppq: u16) -> u32 {
    (tick as f64 * target_ppq as f64 / source_ppq as f64).round() as u32
}

/// One line per message, close to the usual `type key=value time=delta` form
fn describe(event: &TrackEvent<'_>) -> String {
    let time = event.delta.as_int();
    match event.kind {
        TrackEventKind::Midi { channel, message } => {
            let channel = channel.as_int();
            match message {
                MidiMessage::NoteOn { key, vel } => format!(
                    "note_on channel={} note={} velocity={} time={}",
                    channel,
                    key.as_int(),
                    vel.as_int(),
                    time
                ),
                MidiMessage::NoteOff { key, vel } => format!(
                    "note_off channel={} note={} velocity={} time={}",
                    channel,
                    key.as_int(),
                    vel.as_int(),
                    time
                ),
                MidiMessage::Controller { controller, value } => format!(
                    "control_change channel={} control={} value={} time={}",
                    channel,
                    controller.as_int(),
                    value.as_int(),
                    time
                ),
                MidiMessage::ProgramChange { program } => format!(
                    "program_change channel={} program={} time={}",
                    channel,
                    program.as_int(),
                    time
                ),
                MidiMessage::PitchBend { bend } => format!(
                    "pitchwheel channel={} pitch={} time={}",
                    channel,
                    bend.as_int(),
                    time
                ),
                other => format!("{:?} channel={} time={}", other, channel, time),
            }
        }
        TrackEventKind::Meta(MetaMessage::Tempo(tempo)) => {
            format!("set_tempo tempo={} time={}", tempo.as_int(), time)
        }
        TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
            format!("track_name name='{}' time={}", String::from_utf8_lossy(raw), time)
        }
        ref other => format!("{:?} time={}", other, time),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use midly::num::{u15, u24, u28, u4, u7};
    use midly::{Format, Header, Smf};

    fn note(delta: u32, on: bool, key: u8) -> TrackEvent<'static> {
        let message = if on {
            MidiMessage::NoteOn {
                key: u7::new(key),
                vel: u7::new(100),
            }
        } else {
            MidiMessage::NoteOff {
                key: u7::new(key),
                vel: u7::new(0),
            }
        };
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Midi {
                channel: u4::new(0),
                message,
            },
        }
    }

    fn meta(delta: u32, message: MetaMessage<'static>) -> TrackEvent<'static> {
        TrackEvent {
            delta: u28::new(delta),
            kind: TrackEventKind::Meta(message),
        }
    }

    fn encode(ppq: u16, tracks: Vec<Vec<TrackEvent<'static>>>) -> Vec<u8> {
        let mut smf = Smf::new(Header::new(Format::Parallel, Timing::Metrical(u15::new(ppq))));
        smf.tracks = tracks;
        let mut buf = Vec::new();
        smf.write_std(&mut buf).unwrap();
        buf
    }

    #[test]
    fn test_meta_track_is_skipped() {
        let data = encode(
            96,
            vec![
                vec![
                    meta(0, MetaMessage::Tempo(u24::new(400_000))),
                    meta(0, MetaMessage::EndOfTrack),
                ],
                vec![
                    meta(0, MetaMessage::TrackName(b"Lead")),
                    note(0, true, 60),
                    note(96, false, 60),
                    meta(0, MetaMessage::EndOfTrack),
                ],
            ],
        );
        let midi = MidiReader::new(48).read(&data).unwrap();
        assert_eq!(midi.source_ppq, 96);
        assert_eq!(midi.channels.len(), 1);
        assert_eq!(midi.names(), vec!["Lead"]);
        assert_eq!(midi.tempo.slowest(), 400_000);
        assert!(midi.diagnostics.is_empty());
    }

    #[test]
    fn test_ticks_are_rescaled() {
        let data = encode(
            480,
            vec![vec![
                note(0, true, 60),
                note(480, false, 60),
                note(240, true, 62),
                note(240, false, 62),
                meta(480, MetaMessage::EndOfTrack),
            ]],
        );
        let midi = MidiReader::new(48).read(&data).unwrap();
        let channel = &midi.channels[0];
        let ticks: Vec<u32> = channel.events.iter().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![0, 48, 72, 96]);
        assert_eq!(channel.events[2].tick_delta, 240);
        assert_eq!(channel.end_tick, 144);
        assert_eq!(channel.name, UNNAMED_TRACK);
    }

    #[test]
    fn test_zero_velocity_note_on_is_note_off() {
        let data = encode(
            48,
            vec![vec![
                note(0, true, 64),
                TrackEvent {
                    delta: u28::new(48),
                    kind: TrackEventKind::Midi {
                        channel: u4::new(3),
                        message: MidiMessage::NoteOn {
                            key: u7::new(64),
                            vel: u7::new(0),
                        },
                    },
                },
            ]],
        );
        let midi = MidiReader::new(48).read(&data).unwrap();
        let events = &midi.channels[0].events;
        assert!(events[1].is_note_off());
        assert_eq!(events[1].channel, Some(3));
    }

    #[test]
    fn test_default_tempo() {
        let data = encode(48, vec![vec![note(0, true, 60), note(48, false, 60)]]);
        let midi = MidiReader::new(48).read(&data).unwrap();
        assert_eq!(midi.tempo.changes().len(), 1);
        assert_eq!(midi.tempo.slowest(), DEFAULT_TEMPO);
        assert_eq!(micros_to_bpm(DEFAULT_TEMPO), 120.0);
    }

    #[test]
    fn test_dump_lines() {
        let data = encode(48, vec![vec![note(0, true, 60), note(48, false, 60)]]);
        let midi = MidiReader::new(48).with_dump(true).read(&data).unwrap();
        assert_eq!(midi.dumps.len(), 1);
        assert_eq!(
            midi.dumps[0].lines[0],
            "note_on channel=0 note=60 velocity=100 time=0"
        );
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = MidiReader::new(48).read(b"not a midi file").unwrap_err();
        assert!(matches!(err, Error::MidiParse(_)));
    }
}
