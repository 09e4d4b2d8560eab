//! MIDI to JSON converter

use clap::Parser;
use log::LevelFilter;
use midimml::midi::{MidiJson, MidiReader};
use midimml::options::{DEFAULT_PPQ, MAX_PPQ};
use std::env;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mid2json")]
#[command(version = "0.1.0")]
#[command(about = "Dump the event tables of a MIDI file as JSON", long_about = None)]
struct Args {
    /// Input MIDI file
    input: PathBuf,

    /// Output JSON file (writes to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output compact JSON (default is pretty-printed)
    #[arg(short, long)]
    compact: bool,

    /// PPQ to rescale ticks to
    #[arg(short, long, default_value_t = DEFAULT_PPQ, value_parser = clap::value_parser!(u16).range(1..=MAX_PPQ as i64))]
    ppq: u16,

    /// Include a text rendering of every track message
    #[arg(short, long)]
    dump: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Warn);
    }
    log_builder.init();

    let data = fs::read(&args.input)?;
    let midi = MidiReader::new(args.ppq).with_dump(args.dump).read(&data)?;
    let midi_json = MidiJson::from(&midi);

    let json_string = if args.compact {
        serde_json::to_string(&midi_json)?
    } else {
        serde_json::to_string_pretty(&midi_json)?
    };

    match args.output {
        Some(path) => {
            let mut file = File::create(path)?;
            file.write_all(json_string.as_bytes())?;
            file.write_all(b"\n")?;
        }
        None => {
            println!("{}", json_string);
        }
    }

    Ok(())
}
