pub mod delta;
pub mod json;
pub mod reader;
pub mod writer;

pub use json::MidiJson;
pub use reader::{Channel, EventKind, IngestedMidi, MidiReader, RawEvent, TempoMap};
pub use writer::{build_tracks, MidiTrackOut, MidiWriter, NoteEvent};
