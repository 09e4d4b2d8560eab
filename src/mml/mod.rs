//! MML reader
//!
//! Text goes through these stages:
//! 1. comments, quoted strings, whitespace and `/` are removed
//! 2. the text is cut into channels at the `#0`..`#7` markers; a `t<n>`
//!    line ahead of them sets the tempo
//! 3. labeled loops are expanded, sharing one [`MacroTable`]
//! 4. repeat brackets are expanded
//! 5. commands are tokenized and interpreted into an [`EventTable`]

pub mod command;
pub mod event;
pub mod expand;
pub mod interpret;

pub use command::Command;
pub use event::{EventRow, EventTable};
pub use expand::MacroTable;
pub use interpret::Interpreter;

use crate::error::{Error, Result};

/// Number of channels addressable with `#n`
pub const CHANNEL_COUNT: usize = 8;

/// Starts a comment running to the end of the line
pub const COMMENT: char = ';';

/// Intro end marker; has no timing effect
pub const INTRO_MARKER: char = '/';

/// MML tempo units per beat per minute
pub const TEMPO_FACTOR: f64 = 0.4096;

/// Microseconds per quarter note of an MML tempo value
pub fn micros_from_tempo(tempo: u32) -> Option<u32> {
    if tempo == 0 {
        return None;
    }
    Some((60_000_000.0 * TEMPO_FACTOR / tempo as f64).round() as u32)
}

/// MML tempo value of a microseconds-per-quarter tempo, truncated
pub fn tempo_from_micros(micros_per_quarter: u32) -> u32 {
    (TEMPO_FACTOR * 60_000_000.0 / micros_per_quarter.max(1) as f64) as u32
}

/// One channel after expansion
#[derive(Debug, Clone)]
pub struct ParsedChannel {
    /// Number of the `#n` marker
    pub index: usize,
    /// Flat command text
    pub text: String,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedMml {
    pub channels: Vec<ParsedChannel>,
    pub macros: MacroTable,
    /// Tempo of a `t<n>` line ahead of the first channel
    pub tempo: Option<u32>,
}

/// Drop `;` comments, quoted strings, whitespace and intro markers
pub fn clean(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let line = line.split(COMMENT).next().unwrap_or("");
        let mut quoted = false;
        for c in line.chars() {
            match c {
                '"' => quoted = !quoted,
                _ if quoted => {}
                c if c.is_whitespace() || c == INTRO_MARKER => {}
                c => out.push(c),
            }
        }
    }
    out
}

/// Cut cleaned text into `(index, text)` channels, in text order.
///
/// A channel runs from its marker to the next one. Missing markers are
/// skipped and anything before the first marker is discarded.
pub fn split_channels(text: &str) -> Vec<(usize, &str)> {
    let mut markers: Vec<(usize, usize)> = (0..CHANNEL_COUNT)
        .filter_map(|index| text.find(&format!("#{}", index)).map(|pos| (pos, index)))
        .collect();
    markers.sort_unstable();

    markers
        .iter()
        .enumerate()
        .map(|(i, &(pos, index))| {
            let end = markers.get(i + 1).map_or(text.len(), |&(next, _)| next);
            (index, &text[pos + 2..end])
        })
        .collect()
}

/// Tempo of a line holding only `t<n>`, before any channel marker
pub fn header_tempo(text: &str) -> Option<u32> {
    for line in text.lines() {
        let line = line.split(COMMENT).next().unwrap_or("").trim();
        if (0..CHANNEL_COUNT).any(|index| line.contains(&format!("#{}", index))) {
            break;
        }
        if let Some(Ok(tempo)) = line.strip_prefix('t').map(str::parse::<u32>) {
            return Some(tempo);
        }
    }
    None
}

/// Parse MML text into expanded, tokenized channels
pub fn parse_mml(text: &str) -> Result<ParsedMml> {
    let mut parsed = ParsedMml {
        tempo: header_tempo(text),
        ..ParsedMml::default()
    };
    let text = clean(text);

    for (index, body) in split_channels(&text) {
        let expanded = expand::expand_labeled_loops(body, &mut parsed.macros)
            .and_then(|t| expand::expand_loops(&t))
            .map_err(|e| in_channel(index, e))?;
        let commands = command::parse_commands(&expanded);
        log::debug!("channel #{}: {} command(s)", index, commands.len());
        parsed.channels.push(ParsedChannel {
            index,
            text: expanded,
            commands,
        });
    }

    if parsed.channels.is_empty() {
        log::warn!("no channel markers (#0..#7) found");
    }

    Ok(parsed)
}

/// Parse and interpret MML text with lengths measured in `ppq` ticks per quarter
pub fn read_mml(text: &str, ppq: u32) -> Result<EventTable> {
    let parsed = parse_mml(text)?;
    let interpreter = Interpreter::new(ppq);

    let mut table = EventTable::new();
    if let Some(tempo) = parsed.tempo {
        table.set_tempo_if_unset(tempo);
    }
    for channel in &parsed.channels {
        table.append(interpreter.run(channel.index as u32, &channel.commands));
    }
    log::info!(
        "read {} note(s) from {} channel(s)",
        table.len(),
        parsed.channels.len()
    );
    Ok(table)
}

fn in_channel(index: usize, error: Error) -> Error {
    log::error!("channel #{}: {}", index, error);
    error
}
