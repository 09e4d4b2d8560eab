//! Conversion settings

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Default ticks per quarter note for generated files
pub const DEFAULT_PPQ: u16 = 48;

/// Largest PPQ a MIDI header can carry
pub const MAX_PPQ: u16 = 0x7FFF;

/// Grid that all voices are padded to before rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RoundTo {
    Tick,
    #[default]
    Beat,
    Bar,
}

impl RoundTo {
    /// Grid unit in ticks
    pub fn unit(self, ppq: u32) -> u32 {
        match self {
            RoundTo::Tick => 1,
            RoundTo::Beat => ppq,
            RoundTo::Bar => 4 * ppq,
        }
    }
}

/// Key used to split interpreted MML into MIDI tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Instrument,
    Channel,
}

impl GroupBy {
    pub fn name(self) -> &'static str {
        match self {
            GroupBy::Instrument => "instrument",
            GroupBy::Channel => "channel",
        }
    }
}

/// Song information written into the MML header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SongInfo {
    pub author: String,
    pub title: String,
    pub game: String,
    pub comment: String,
}

/// Options shared by both conversion directions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    /// Ticks per quarter note of the MML side and of written MIDI files
    pub ppq: u16,
    pub round_to: RoundTo,
    pub group_by: GroupBy,
    /// Dump every ingested track as text next to the output
    pub readable_midi: bool,
    pub info: SongInfo,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            ppq: DEFAULT_PPQ,
            round_to: RoundTo::default(),
            group_by: GroupBy::default(),
            readable_midi: false,
            info: SongInfo::default(),
        }
    }
}

impl ConvertOptions {
    /// Load options from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let mut options: Self = serde_json::from_str(text)?;
        if options.ppq == 0 {
            log::warn!("ppq 0 in config, using {}", DEFAULT_PPQ);
            options.ppq = DEFAULT_PPQ;
        }
        if options.ppq > MAX_PPQ {
            return Err(Error::InvalidPpq(options.ppq));
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let options = ConvertOptions::from_json(r#"{"round_to": "bar", "info": {"title": "Stage 1"}}"#).unwrap();
        assert_eq!(options.ppq, DEFAULT_PPQ);
        assert_eq!(options.round_to, RoundTo::Bar);
        assert_eq!(options.group_by, GroupBy::Instrument);
        assert_eq!(options.info.title, "Stage 1");
        assert!(options.info.author.is_empty());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ConvertOptions::from_json(r#"{"group_by": "track"}"#).unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_ppq_limits() {
        assert_eq!(ConvertOptions::from_json(r#"{"ppq": 0}"#).unwrap().ppq, DEFAULT_PPQ);
        assert_eq!(ConvertOptions::from_json(r#"{"ppq": 32767}"#).unwrap().ppq, MAX_PPQ);
        let err = ConvertOptions::from_json(r#"{"ppq": 40000}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidPpq(40000)));
    }

    #[test]
    fn test_grid_units() {
        assert_eq!(RoundTo::Tick.unit(48), 1);
        assert_eq!(RoundTo::Beat.unit(48), 48);
        assert_eq!(RoundTo::Bar.unit(48), 192);
    }
}
