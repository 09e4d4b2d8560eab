//! MIDI <-> MML conversion
//!
//! MIDI to MML reads every note-playing track, splits each one into
//! monophonic voices, pads the voices to a common length and renders them
//! as channel blocks. MML to MIDI interprets every channel and writes one
//! track per instrument (or channel).

pub mod emit;
pub mod voice;

pub use voice::{MonoNote, Tone, Voice};

use crate::duration::DurationGrid;
use crate::error::{Diagnostic, Error, Result};
use crate::midi::reader::TrackDump;
use crate::midi::{build_tracks, MidiReader, MidiWriter};
use crate::mml;
use crate::options::ConvertOptions;
use std::fs;
use std::path::Path;

/// Conversion direction, picked from the input file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    MidiToMml,
    MmlToMidi,
}

impl Direction {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("mid") | Some("midi") => Ok(Direction::MidiToMml),
            Some("mml") | Some("txt") => Ok(Direction::MmlToMidi),
            _ => Err(Error::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Rendered MML plus everything noticed on the way
#[derive(Debug, Clone)]
pub struct MmlOutput {
    pub text: String,
    /// Number of voices written, commented-out ones included
    pub voices: usize,
    pub diagnostics: Vec<Diagnostic>,
    /// Track dumps, when readable output was requested
    pub dumps: Vec<TrackDump>,
}

/// Converter between MIDI files and MML text
pub struct Converter {
    options: ConvertOptions,
}

impl Converter {
    pub fn new(options: ConvertOptions) -> Self {
        Self { options }
    }

    /// Convert a Standard MIDI File into MML text
    pub fn midi_to_mml(&self, data: &[u8]) -> Result<MmlOutput> {
        let ppq = self.options.ppq;
        let midi = MidiReader::new(ppq)
            .with_dump(self.options.readable_midi)
            .read(data)?;
        let mut diagnostics = midi.diagnostics.clone();

        let mut voices = Vec::new();
        for channel in &midi.channels {
            let split = voice::decompose(&channel.note_events(), channel.end_tick);
            log::info!(
                "track {} ({}): {} voice(s)",
                channel.track,
                channel.name,
                split.voices.len()
            );
            diagnostics.extend(split.diagnostics);
            voices.extend(
                split
                    .voices
                    .into_iter()
                    .map(|notes| Voice::new(channel.name.clone(), notes)),
            );
        }
        if voices.len() > mml::CHANNEL_COUNT {
            log::warn!(
                "{} voices, only the first {} are playable; the rest are commented out",
                voices.len(),
                mml::CHANNEL_COUNT
            );
        }

        let length = voice::equalize(&mut voices, ppq as u32, self.options.round_to);
        log::debug!("voices padded to {} tick(s)", length);

        let grid = DurationGrid::new(ppq as u32);
        let mut text = emit::render_header(&self.options.info, &midi.tempo);
        for (index, voice) in voices.iter().enumerate() {
            text.push_str(&emit::render_voice(voice, index, &grid));
        }

        Ok(MmlOutput {
            text,
            voices: voices.len(),
            diagnostics,
            dumps: midi.dumps,
        })
    }

    /// Convert MML text into a Standard MIDI File
    pub fn mml_to_midi(&self, text: &str) -> Result<Vec<u8>> {
        let ppq = self.options.ppq;
        let table = mml::read_mml(text, ppq as u32)?;
        let tracks = build_tracks(&table, self.options.group_by);
        MidiWriter::new(ppq)
            .with_tempo(table.tempo().and_then(mml::micros_from_tempo))
            .encode(&tracks)
    }

    /// Convert `input` into `output`, the direction following the input
    /// extension. Nothing is written unless the conversion succeeds.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<Vec<Diagnostic>> {
        match Direction::from_path(input)? {
            Direction::MidiToMml => {
                let data = read_file(input)?;
                let converted = self.midi_to_mml(&data)?;
                fs::write(output, &converted.text)?;
                log::info!("wrote {} voice(s) to {}", converted.voices, output.display());
                write_dumps(&converted.dumps, output)?;
                Ok(converted.diagnostics)
            }
            Direction::MmlToMidi => {
                let text = String::from_utf8_lossy(&read_file(input)?).into_owned();
                let data = self.mml_to_midi(&text)?;
                fs::write(output, data)?;
                log::info!("wrote {}", output.display());
                Ok(Vec::new())
            }
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open '{}': {}", path.display(), e),
        ))
    })
}

/// Write `track_<i>.txt` next to `output`
fn write_dumps(dumps: &[TrackDump], output: &Path) -> Result<()> {
    let dir = output.parent().unwrap_or_else(|| Path::new(""));
    for dump in dumps {
        let path = dir.join(format!("track_{}.txt", dump.track));
        let mut text = format!("; {}\n", dump.name);
        for line in &dump.lines {
            text.push_str(line);
            text.push('\n');
        }
        fs::write(&path, text)?;
    }
    Ok(())
}
