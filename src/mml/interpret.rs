//! Channel command interpreter
//!
//! Walks the commands of one channel keeping octave, instrument and time,
//! and records one row per sounding note.

use super::command::Command;
use super::event::{EventRow, EventTable};
use crate::duration::{DurationGrid, TIE};
use crate::note;

/// Octave a channel starts in
pub const DEFAULT_OCTAVE: i32 = 4;

/// State of a channel during interpretation
#[derive(Debug, Clone)]
pub struct ChannelState {
    pub octave: i32,
    pub instrument: u32,
    /// Current time in ticks
    pub time: u32,
    /// Length set by `l`, if any
    pub default_length: Option<String>,
}

impl ChannelState {
    /// Fresh state; the instrument defaults to the channel number
    pub fn new(channel: u32) -> Self {
        Self {
            octave: DEFAULT_OCTAVE,
            instrument: channel,
            time: 0,
            default_length: None,
        }
    }

    /// Length token to decode for a note written with `length`
    fn resolve_length<'a>(&'a self, length: &'a str) -> std::borrow::Cow<'a, str> {
        match self.default_length.as_deref() {
            Some(default) if length.is_empty() => default.into(),
            Some(default) if length.starts_with(TIE) => format!("{}{}", default, length).into(),
            _ => length.into(),
        }
    }
}

pub struct Interpreter {
    grid: DurationGrid,
}

impl Interpreter {
    pub fn new(ppq: u32) -> Self {
        Self {
            grid: DurationGrid::new(ppq),
        }
    }

    /// Interpret the commands of channel `channel`
    pub fn run(&self, channel: u32, commands: &[Command]) -> EventTable {
        let mut table = EventTable::new();
        let mut state = ChannelState::new(channel);

        for command in commands {
            match command {
                Command::Note {
                    letter,
                    accidental,
                    length,
                } => {
                    let ticks = self.grid.decode(&state.resolve_length(length));
                    let Some(end) = state.time.checked_add(ticks) else {
                        log_overflow(channel);
                        break;
                    };
                    match note::pitch_to_key(*letter, *accidental, state.octave) {
                        None => log::warn!(
                            "channel {}: note {} in octave {} has no key number, skipped",
                            channel,
                            letter,
                            state.octave
                        ),
                        Some(_) if ticks == 0 => log::debug!(
                            "channel {}: zero-length note {} at tick {} dropped",
                            channel,
                            letter,
                            state.time
                        ),
                        Some(pitch) => table.push(EventRow {
                            time: state.time,
                            channel,
                            instrument: state.instrument,
                            pitch,
                            ticks,
                        }),
                    }
                    state.time = end;
                }
                Command::Rest { length } => {
                    let ticks = self.grid.decode(&state.resolve_length(length));
                    let Some(end) = state.time.checked_add(ticks) else {
                        log_overflow(channel);
                        break;
                    };
                    state.time = end;
                }
                Command::OctaveSet(octave) => state.octave = *octave,
                Command::OctaveShift(shift) => {
                    state.octave = state.octave.saturating_add(*shift);
                }
                Command::Instrument(instrument) => state.instrument = *instrument,
                Command::Tempo(tempo) => table.set_tempo_if_unset(*tempo),
                Command::DefaultLength(length) => {
                    state.default_length = Some(length.clone());
                }
                Command::Volume(_) | Command::Other(_) => {}
            }
        }

        log::debug!(
            "channel {}: {} note(s), {} tick(s)",
            channel,
            table.len(),
            state.time
        );
        table
    }
}

fn log_overflow(channel: u32) {
    log::warn!(
        "channel {}: time runs past tick {}, rest of channel dropped",
        channel,
        u32::MAX
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mml::command::parse_commands;

    fn run(text: &str) -> EventTable {
        Interpreter::new(48).run(2, &parse_commands(text))
    }

    fn summary(table: &EventTable) -> Vec<(u32, i32, u32, u32)> {
        table
            .rows()
            .iter()
            .map(|r| (r.time, r.pitch, r.ticks, r.instrument))
            .collect()
    }

    #[test]
    fn test_notes_and_rests() {
        let table = run("c4r8d+8e2");
        assert_eq!(
            summary(&table),
            vec![(0, 48, 48, 2), (72, 51, 24, 2), (96, 52, 96, 2)]
        );
    }

    #[test]
    fn test_octave_and_instrument() {
        let table = run("o5@7c4>c4<<c4");
        assert_eq!(
            summary(&table),
            vec![(0, 60, 48, 7), (48, 72, 48, 7), (96, 48, 48, 7)]
        );
        assert!(table.rows().iter().all(|r| r.channel == 2));
    }

    #[test]
    fn test_ties_and_empty_length() {
        let table = run("c4^16d");
        assert_eq!(summary(&table), vec![(0, 48, 60, 2), (60, 50, 192, 2)]);
    }

    #[test]
    fn test_default_length() {
        let table = run("l8cd^16e4");
        assert_eq!(
            summary(&table),
            vec![(0, 48, 24, 2), (24, 50, 36, 2), (60, 52, 48, 2)]
        );
    }

    #[test]
    fn test_zero_length_note_produces_no_row() {
        let table = run("c=0d4");
        assert_eq!(summary(&table), vec![(0, 50, 48, 2)]);
    }

    #[test]
    fn test_time_overflow_ends_channel() {
        let table = run("c=4294967295d4");
        assert_eq!(summary(&table), vec![(0, 48, u32::MAX, 2)]);
        assert_eq!(table.rows()[0].end(), u32::MAX);

        let table = run("r=4294967290c4d4");
        assert!(table.is_empty());
    }

    #[test]
    fn test_unrepresentable_pitch_keeps_time() {
        let table = run("o200000000c4o4d4");
        assert_eq!(summary(&table), vec![(48, 50, 48, 2)]);

        let table = run("o2147483647>>>c4<d4");
        assert!(table.is_empty());
    }

    #[test]
    fn test_first_tempo_is_kept() {
        let table = run("t49c4t60d4");
        assert_eq!(table.tempo(), Some(49));
        assert_eq!(run("c4").tempo(), None);
    }

    #[test]
    fn test_other_commands_are_ignored() {
        let table = run("$ED$7F$E0v200y10q7Fc4");
        assert_eq!(summary(&table), vec![(0, 48, 48, 2)]);
    }
}
