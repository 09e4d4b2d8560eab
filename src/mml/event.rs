//! Interpreted note rows

use crate::options::GroupBy;
use serde::Serialize;
use std::collections::BTreeMap;

/// One sounding note of an interpreted channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EventRow {
    /// Start tick, counted from the start of the channel
    pub time: u32,
    /// Channel the note was written in (`#0`..`#7`)
    pub channel: u32,
    /// Instrument active when the note was written
    pub instrument: u32,
    /// Key number; may fall outside the MIDI range for extreme octaves
    pub pitch: i32,
    pub ticks: u32,
}

impl EventRow {
    /// Value of the grouping column
    pub fn group(&self, by: GroupBy) -> u32 {
        match by {
            GroupBy::Instrument => self.instrument,
            GroupBy::Channel => self.channel,
        }
    }

    pub fn end(&self) -> u32 {
        self.time.saturating_add(self.ticks)
    }
}

/// Rows of all channels of one MML text
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventTable {
    rows: Vec<EventRow>,
    /// First `t` directive met, in MML tempo units
    tempo: Option<u32>,
}

impl EventTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, row: EventRow) {
        self.rows.push(row);
    }

    /// Append another table; the earliest tempo wins
    pub fn append(&mut self, other: EventTable) {
        self.rows.extend(other.rows);
        if self.tempo.is_none() {
            self.tempo = other.tempo;
        }
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn tempo(&self) -> Option<u32> {
        self.tempo
    }

    pub fn set_tempo_if_unset(&mut self, tempo: u32) {
        if self.tempo.is_none() {
            self.tempo = Some(tempo);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows split by the grouping column, in ascending group order
    pub fn groups(&self, by: GroupBy) -> BTreeMap<u32, Vec<EventRow>> {
        let mut groups: BTreeMap<u32, Vec<EventRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.group(by)).or_default().push(*row);
        }
        groups
    }
}
