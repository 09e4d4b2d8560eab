use serde::Serialize;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MIDI parse error: {0}")]
    MidiParse(#[from] midly::Error),

    #[error("Malformed track {track}: {message}")]
    MalformedTrack { track: usize, message: String },

    #[error("SMPTE timecode files are not supported")]
    UnsupportedTiming,

    #[error("Unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("Undefined macro '({label})' at position {position}")]
    UndefinedMacro { label: String, position: usize },

    #[error("Unterminated {construct} at position {position}")]
    Unterminated {
        construct: &'static str,
        position: usize,
    },

    #[error("Unbalanced '{ch}' at position {position}")]
    Unbalanced { ch: char, position: usize },

    #[error("Macro expansion exceeded {0} steps (self-referencing label?)")]
    ExpansionLimit(usize),

    #[error("Expanded channel text would exceed {0} bytes")]
    ExpansionTooLong(usize),

    #[error("PPQ {0} is out of range (1..=32767)")]
    InvalidPpq(u16),

    #[error("Gap of {delta} ticks in track '{track}' does not fit in a MIDI file")]
    DeltaTooLong { track: String, delta: u32 },

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Recoverable conditions met while converting.
///
/// These never abort a conversion; they are logged as they happen and
/// collected so callers can report them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// A track could not be read and was left out
    SkippedTrack { track: usize, reason: String },
    /// A note_on without note_off, closed at the end of its track
    FlushedOrphan { pitch: u8, start: u32, end: u32 },
    /// A note_off with no sounding note of that pitch
    DroppedNoteOff { pitch: u8, tick: u32 },
    /// Voice splitting hit its depth cap; `dropped` note pairs were lost
    DepthExceeded { depth: usize, dropped: usize },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::SkippedTrack { track, reason } => {
                write!(f, "skipped track {}: {}", track, reason)
            }
            Diagnostic::FlushedOrphan { pitch, start, end } => {
                write!(f, "flushed note {} from tick {} to {}", pitch, start, end)
            }
            Diagnostic::DroppedNoteOff { pitch, tick } => {
                write!(f, "dropped note_off {} at tick {} (no sounding note)", pitch, tick)
            }
            Diagnostic::DepthExceeded { depth, dropped } => {
                write!(
                    f,
                    "more than {} voices needed, {} note(s) dropped; most likely the file is malformed",
                    depth, dropped
                )
            }
        }
    }
}
