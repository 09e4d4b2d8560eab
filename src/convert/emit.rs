//! MML text rendering

use super::voice::{Tone, Voice};
use crate::duration::{DurationGrid, TIE};
use crate::midi::reader::{micros_to_bpm, TempoMap};
use crate::mml::{self, CHANNEL_COUNT, COMMENT};
use crate::note;
use crate::options::SongInfo;

const RULE: &str = ";************************";

/// Octave written for a voice without any sounding note
const SILENT_OCTAVE: i32 = 4;

/// Render the file header: format marker, song info and tempo
pub fn render_header(info: &SongInfo, tempo: &TempoMap) -> String {
    let mut text = String::new();
    text.push_str("#amk 2\n");
    text.push_str(RULE);
    text.push_str("\n\n; SPC Generator Info\n#SPC\n{\n");
    text.push_str(&format!("    #author  \"{}\"\n", quoted(&info.author)));
    text.push_str(&format!("    #title   \"{}\"\n", quoted(&info.title)));
    text.push_str(&format!("    #game    \"{}\"\n", quoted(&info.game)));
    text.push_str(&format!("    #comment \"{}\"\n", quoted(&info.comment)));
    text.push_str("}\n");
    text.push_str(RULE);
    text.push_str("\n\n");

    text.push_str("; Tempo\n");
    let (slowest, fastest) = (tempo.slowest(), tempo.fastest());
    if slowest == fastest {
        text.push_str(&format!("; BPM = {}\n", format_bpm(micros_to_bpm(slowest))));
    } else {
        text.push_str(&format!("; BPM_min = {}\n", format_bpm(micros_to_bpm(slowest))));
        text.push_str(&format!("; BPM_max = {}\n", format_bpm(micros_to_bpm(fastest))));
    }
    text.push_str(&format!("t{}\n\n", mml::tempo_from_micros(slowest)));
    text.push_str(RULE);
    text.push('\n');
    text
}

/// Render one voice as a channel block.
///
/// Voices past the last playable channel are written commented out.
pub fn render_voice(voice: &Voice, index: usize, grid: &DurationGrid) -> String {
    let octave_of = |key: u8| note::key_to_pitch(key).0;
    let mut octave = voice.keys().next().map_or(SILENT_OCTAVE, octave_of);
    let highest = voice.keys().map(octave_of).max().unwrap_or(octave);
    let lowest = voice.keys().map(octave_of).min().unwrap_or(octave);

    let prefix = if index < CHANNEL_COUNT {
        String::new()
    } else {
        format!("{} ", COMMENT)
    };

    let mut text = String::from("\n");
    text.push_str(&format!("{}; {}\n", prefix, voice.name));
    text.push_str(&format!("{}#{}\n", prefix, index));
    text.push_str(&format!(
        "{}o{}   ; +{} / -{}\n",
        prefix,
        octave,
        highest - octave,
        octave - lowest
    ));
    text.push_str(&prefix);

    for mono in &voice.notes {
        let letter = match mono.tone {
            Tone::Rest => "r",
            Tone::Key(key) => {
                let (key_octave, name) = note::key_to_pitch(key);
                let shift = key_octave - octave;
                let op = if shift > 0 { ">" } else { "<" };
                text.push_str(&op.repeat(shift.unsigned_abs() as usize));
                octave = key_octave;
                name
            }
        };
        // a tie continues the same pitch, so each tie repeats the letter
        let length = grid.encode(mono.ticks).replace(TIE, letter);
        text.push_str(letter);
        text.push_str(&length);
    }
    text.push('\n');
    text
}

fn quoted(value: &str) -> String {
    value.replace(['"', '\n', '\r'], "'")
}

/// Whole numbers keep one decimal, like `120.0`
fn format_bpm(bpm: f64) -> String {
    if bpm.fract() == 0.0 {
        format!("{:.1}", bpm)
    } else {
        format!("{}", bpm)
    }
}
