use clap::Parser;
use log::LevelFilter;
use midimml::options::{GroupBy, RoundTo, MAX_PPQ};
use midimml::{ConvertOptions, Converter};
use std::env;
use std::path::PathBuf;

/// Logging is controlled with RUST_LOG; see docs for the env_logger crate.
#[derive(Parser, Debug)]
#[command(name = "midimml")]
#[command(version = "0.1.0")]
#[command(about = "Convert MIDI files to MML and back", long_about = None)]
struct Args {
    /// Input file: .mid/.midi is converted to MML, .mml/.txt to MIDI
    #[arg(short, long)]
    input: PathBuf,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// JSON file with conversion options; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticks per quarter note of the MML side and of written MIDI files
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..=MAX_PPQ as i64))]
    ppq: Option<u16>,

    /// Grid the voice lengths are padded to
    #[arg(long, value_enum)]
    round_to: Option<RoundTo>,

    /// Column that splits notes into MIDI tracks
    #[arg(short, long, value_enum)]
    group_by: Option<GroupBy>,

    /// Write every MIDI track as text to track_<i>.txt next to the output
    #[arg(long)]
    readable_midi: bool,

    #[arg(long)]
    author: Option<String>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    game: Option<String>,

    #[arg(long)]
    comment: Option<String>,
}

impl Args {
    fn options(&self) -> Result<ConvertOptions, midimml::Error> {
        let mut options = match &self.config {
            Some(path) => ConvertOptions::from_json_file(path)?,
            None => ConvertOptions::default(),
        };

        if let Some(ppq) = self.ppq {
            options.ppq = ppq;
        }
        if let Some(round_to) = self.round_to {
            options.round_to = round_to;
        }
        if let Some(group_by) = self.group_by {
            options.group_by = group_by;
        }
        options.readable_midi |= self.readable_midi;

        let info = &mut options.info;
        for (field, value) in [
            (&mut info.author, &self.author),
            (&mut info.title, &self.title),
            (&mut info.game, &self.game),
            (&mut info.comment, &self.comment),
        ] {
            if let Some(value) = value {
                *field = value.clone();
            }
        }

        Ok(options)
    }
}

fn main() -> Result<(), midimml::Error> {
    let args = Args::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Info);
    }
    log_builder.init();

    let converter = Converter::new(args.options()?);
    let diagnostics = converter.convert_file(&args.input, &args.output)?;
    if !diagnostics.is_empty() {
        log::warn!("finished with {} diagnostic(s):", diagnostics.len());
        for diagnostic in &diagnostics {
            log::warn!("  {}", diagnostic);
        }
    }

    Ok(())
}
