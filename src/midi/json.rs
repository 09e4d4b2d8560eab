//! JSON serialization types for ingested MIDI data

use super::reader::{micros_to_bpm, Channel, IngestedMidi, RawEvent, TrackDump};
use crate::error::Diagnostic;
use serde::Serialize;

/// Top-level JSON structure for an ingested MIDI file
#[derive(Debug, Clone, Serialize)]
pub struct MidiJson {
    /// PPQ of the file header
    pub source_ppq: u16,
    /// PPQ all `tick` values are expressed in
    pub ppq: u16,
    pub tempo: Vec<TempoJson>,
    pub channels: Vec<ChannelJson>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dumps: Vec<TrackDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// JSON representation of a tempo change
#[derive(Debug, Clone, Serialize)]
pub struct TempoJson {
    pub tick: u32,
    pub micros_per_quarter: u32,
    pub bpm: f64,
}

/// JSON representation of a note-playing track
#[derive(Debug, Clone, Serialize)]
pub struct ChannelJson {
    pub track: usize,
    pub name: String,
    pub end_tick: u32,
    pub note_min: Option<u8>,
    pub note_max: Option<u8>,
    pub events: Vec<RawEvent>,
}

impl From<&IngestedMidi> for MidiJson {
    fn from(midi: &IngestedMidi) -> Self {
        Self {
            source_ppq: midi.source_ppq,
            ppq: midi.target_ppq,
            tempo: midi
                .tempo
                .changes()
                .iter()
                .map(|c| TempoJson {
                    tick: c.tick,
                    micros_per_quarter: c.micros_per_quarter,
                    bpm: micros_to_bpm(c.micros_per_quarter),
                })
                .collect(),
            channels: midi.channels.iter().map(ChannelJson::from).collect(),
            dumps: midi.dumps.clone(),
            diagnostics: midi.diagnostics.clone(),
        }
    }
}

impl From<&Channel> for ChannelJson {
    fn from(channel: &Channel) -> Self {
        let pitches = || channel.events.iter().filter_map(RawEvent::note_pitch);
        Self {
            track: channel.track,
            name: channel.name.clone(),
            end_tick: channel.end_tick,
            note_min: pitches().min(),
            note_max: pitches().max(),
            events: channel.events.clone(),
        }
    }
}
