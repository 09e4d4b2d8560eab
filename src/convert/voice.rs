//! Polyphonic track to monophonic voices
//!
//! A voice is taken by walking the track and greedily keeping each note
//! that starts after the previous kept note ended. Whatever was not kept is
//! split again, until nothing is left.

use crate::error::Diagnostic;
use crate::midi::RawEvent;
use crate::options::RoundTo;
use std::collections::{HashMap, VecDeque};

/// Most voices one track may split into
pub const MAX_DEPTH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Rest,
    Key(u8),
}

/// A rest or a single key held for `ticks`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonoNote {
    pub tone: Tone,
    pub ticks: u32,
}

impl MonoNote {
    pub fn rest(ticks: u32) -> Self {
        Self {
            tone: Tone::Rest,
            ticks,
        }
    }

    pub fn key(pitch: u8, ticks: u32) -> Self {
        Self {
            tone: Tone::Key(pitch),
            ticks,
        }
    }
}

/// A named monophonic line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Voice {
    /// Name of the source track
    pub name: String,
    pub notes: Vec<MonoNote>,
}

impl Voice {
    pub fn new(name: impl Into<String>, notes: Vec<MonoNote>) -> Self {
        Self {
            name: name.into(),
            notes,
        }
    }

    pub fn total_ticks(&self) -> u32 {
        self.notes.iter().map(|n| n.ticks).sum()
    }

    /// Keys of the sounding notes, in order
    pub fn keys(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.iter().filter_map(|n| match n.tone {
            Tone::Key(key) => Some(key),
            Tone::Rest => None,
        })
    }
}

/// A note boundary of a track, after pairing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Edge {
    on: bool,
    pitch: u8,
    tick: u32,
}

/// Voices of one track, plus what went wrong on the way
#[derive(Debug, Clone, Default)]
pub struct Decomposition {
    pub voices: Vec<Vec<MonoNote>>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Split the note events of a track into monophonic voices.
///
/// Every note_on is matched first-in first-out with a note_off of the same
/// pitch. A note_on left open is closed at `end_tick`; a note_off with
/// nothing to close is dropped.
pub fn decompose(events: &[RawEvent], end_tick: u32) -> Decomposition {
    let mut decomposition = Decomposition::default();
    let edges = pair_notes(events, end_tick, &mut decomposition.diagnostics);

    let mut pending = VecDeque::from([(edges, 0usize)]);
    while let Some((edges, depth)) = pending.pop_front() {
        if depth >= MAX_DEPTH {
            let dropped = edges.iter().filter(|e| e.on).count();
            log::warn!(
                "voice splitting stopped after {} voices, {} note(s) dropped",
                MAX_DEPTH,
                dropped
            );
            decomposition.diagnostics.push(Diagnostic::DepthExceeded {
                depth: MAX_DEPTH,
                dropped,
            });
            continue;
        }

        let (voice, leftover) = extract_voice(&edges);
        if !voice.is_empty() {
            decomposition.voices.push(voice);
        }
        if !leftover.is_empty() {
            pending.push_back((leftover, depth + 1));
        }
    }

    decomposition
}

fn pair_notes(events: &[RawEvent], end_tick: u32, diagnostics: &mut Vec<Diagnostic>) -> Vec<Edge> {
    let mut edges = Vec::with_capacity(events.len());
    let mut open: HashMap<u8, VecDeque<usize>> = HashMap::new();

    for event in events {
        let Some(pitch) = event.note_pitch() else {
            continue;
        };
        if event.is_note_on() {
            open.entry(pitch).or_default().push_back(edges.len());
            edges.push(Edge {
                on: true,
                pitch,
                tick: event.tick,
            });
        } else if open.get_mut(&pitch).and_then(VecDeque::pop_front).is_some() {
            edges.push(Edge {
                on: false,
                pitch,
                tick: event.tick,
            });
        } else {
            log::warn!("note_off {} at tick {} closes nothing, dropped", pitch, event.tick);
            diagnostics.push(Diagnostic::DroppedNoteOff {
                pitch,
                tick: event.tick,
            });
        }
    }

    let mut orphans: Vec<usize> = open.into_values().flatten().collect();
    orphans.sort_unstable();
    for index in orphans {
        let Edge { pitch, tick, .. } = edges[index];
        let end = end_tick.max(tick);
        log::warn!(
            "note {} at tick {} never ends, closed at tick {}",
            pitch,
            tick,
            end
        );
        diagnostics.push(Diagnostic::FlushedOrphan {
            pitch,
            start: tick,
            end,
        });
        edges.push(Edge {
            on: false,
            pitch,
            tick: end,
        });
    }

    edges
}

/// Take one voice off the front of `edges`; returns it and the edges left
fn extract_voice(edges: &[Edge]) -> (Vec<MonoNote>, Vec<Edge>) {
    let mut used = vec![false; edges.len()];
    let mut notes = Vec::new();
    let mut cursor = 0;
    let mut previous_end = 0u32;

    while let Some(on) = (cursor..edges.len()).find(|&i| edges[i].on && !used[i]) {
        let pitch = edges[on].pitch;
        let Some(off) =
            (on + 1..edges.len()).find(|&i| !edges[i].on && edges[i].pitch == pitch && !used[i])
        else {
            break;
        };

        let start = edges[on].tick;
        let end = edges[off].tick;
        if start > previous_end {
            notes.push(MonoNote::rest(start - previous_end));
        }
        notes.push(MonoNote::key(pitch, end.saturating_sub(start)));

        used[on] = true;
        used[off] = true;
        previous_end = end.max(previous_end);
        cursor = off;
    }

    let leftover = edges
        .iter()
        .enumerate()
        .filter(|(i, _)| !used[*i])
        .map(|(_, edge)| *edge)
        .collect();
    (notes, leftover)
}

/// Pad every voice with a rest up to the longest one, rounded up to a
/// multiple of the rounding unit. Returns the common length.
pub fn equalize(voices: &mut [Voice], ppq: u32, round_to: RoundTo) -> u32 {
    let unit = round_to.unit(ppq).max(1);
    let longest = voices.iter().map(Voice::total_ticks).max().unwrap_or(0);
    let target = longest.div_ceil(unit) * unit;

    for voice in voices.iter_mut() {
        let total = voice.total_ticks();
        if total < target {
            voice.notes.push(MonoNote::rest(target - total));
        }
    }
    target
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::EventKind;

    fn on(pitch: u8, tick: u32) -> RawEvent {
        RawEvent {
            kind: EventKind::NoteOn { pitch, velocity: 100 },
            channel: Some(0),
            tick_delta: 0,
            tick,
        }
    }

    fn off(pitch: u8, tick: u32) -> RawEvent {
        RawEvent {
            kind: EventKind::NoteOff { pitch, velocity: 0 },
            ..on(pitch, tick)
        }
    }

    fn sounding(voices: &[Vec<MonoNote>]) -> usize {
        voices.iter().flatten().filter(|n| n.tone != Tone::Rest).count()
    }

    #[test]
    fn test_chord_splits_into_voices() {
        let events = [on(60, 0), on(64, 0), on(67, 0), off(60, 96), off(64, 96), off(67, 96)];
        let result = decompose(&events, 96);
        assert_eq!(
            result.voices,
            vec![
                vec![MonoNote::key(60, 96)],
                vec![MonoNote::key(64, 96)],
                vec![MonoNote::key(67, 96)],
            ]
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_rests_fill_gaps() {
        let events = [on(60, 24), off(60, 48), on(62, 96), off(62, 120)];
        let result = decompose(&events, 120);
        assert_eq!(
            result.voices,
            vec![vec![
                MonoNote::rest(24),
                MonoNote::key(60, 24),
                MonoNote::rest(48),
                MonoNote::key(62, 24),
            ]]
        );
    }

    #[test]
    fn test_overlap_goes_to_second_voice() {
        let events = [on(60, 0), on(62, 24), off(60, 48), off(62, 72)];
        let result = decompose(&events, 72);
        assert_eq!(
            result.voices,
            vec![
                vec![MonoNote::key(60, 48)],
                vec![MonoNote::rest(24), MonoNote::key(62, 48)],
            ]
        );
    }

    #[test]
    fn test_orphan_note_on_is_flushed() {
        let events = [on(60, 500)];
        let result = decompose(&events, 800);
        assert_eq!(
            result.voices,
            vec![vec![MonoNote::rest(500), MonoNote::key(60, 300)]]
        );
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::FlushedOrphan {
                pitch: 60,
                start: 500,
                end: 800
            }]
        );
    }

    #[test]
    fn test_stray_note_off_is_dropped() {
        let events = [off(61, 10), on(60, 0), off(60, 48)];
        let result = decompose(&events, 48);
        assert_eq!(result.voices, vec![vec![MonoNote::key(60, 48)]]);
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::DroppedNoteOff { pitch: 61, tick: 10 }]
        );
    }

    #[test]
    fn test_every_note_lands_in_one_voice() {
        // (start, end, pitch), with same-pitch overlaps on 60 and 64
        let notes: [(u32, u32, u8); 12] = [
            (0, 40, 60),
            (10, 30, 64),
            (10, 50, 60),
            (20, 25, 67),
            (26, 70, 67),
            (35, 45, 64),
            (45, 90, 62),
            (52, 58, 60),
            (60, 100, 64),
            (60, 100, 60),
            (80, 120, 71),
            (95, 96, 62),
        ];
        let mut events: Vec<RawEvent> = notes
            .iter()
            .flat_map(|&(start, end, pitch)| [on(pitch, start), off(pitch, end)])
            .collect();
        events.sort_by_key(|e| e.tick);

        let result = decompose(&events, 120);
        assert!(result.diagnostics.is_empty());

        let mut rebuilt = Vec::new();
        for voice in &result.voices {
            let mut time = 0;
            for note in voice {
                if let Tone::Key(pitch) = note.tone {
                    rebuilt.push((time, time + note.ticks, pitch));
                }
                time += note.ticks;
            }
            assert!(time <= 120);
        }
        rebuilt.sort_unstable();
        let mut expected = notes.to_vec();
        expected.sort_unstable();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn test_depth_cap() {
        let count = MAX_DEPTH as u32 + 5;
        let mut events: Vec<RawEvent> = (0..count).map(|i| on(60, i)).collect();
        events.extend((0..count).map(|i| off(60, 1000 + i)));

        let result = decompose(&events, 2000);
        assert_eq!(result.voices.len(), MAX_DEPTH);
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::DepthExceeded {
                depth: MAX_DEPTH,
                dropped: 5
            }]
        );
    }

    #[test]
    fn test_equalize_to_beat() {
        let mut voices = vec![
            Voice::new("a", vec![MonoNote::key(60, 100)]),
            Voice::new("b", vec![MonoNote::key(64, 30)]),
        ];
        let target = equalize(&mut voices, 48, RoundTo::Beat);
        assert_eq!(target, 144);
        assert!(voices.iter().all(|v| v.total_ticks() == 144));
        assert_eq!(voices[1].notes[1], MonoNote::rest(114));
    }

    #[test]
    fn test_equalize_to_tick_and_bar() {
        let mut voices = vec![
            Voice::new("a", vec![MonoNote::key(60, 100)]),
            Voice::new("b", vec![MonoNote::key(64, 30)]),
        ];
        assert_eq!(equalize(&mut voices, 48, RoundTo::Tick), 100);
        assert_eq!(voices[0].notes.len(), 1);
        assert_eq!(equalize(&mut voices, 48, RoundTo::Bar), 192);
    }
}
