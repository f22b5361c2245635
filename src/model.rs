use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_PRIMARY_HEX: &str = "#1db954";
pub const DEFAULT_HOVER_HEX: &str = "#25e06a";
pub const DEFAULT_ACCENT_HEX: &str = "#48fa6c";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    One,
    All,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            Self::Off => Self::One,
            Self::One => Self::All,
            Self::All => Self::Off,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Some(Self::Off),
            "one" | "single" => Some(Self::One),
            "all" | "loop" => Some(Self::All),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Off => "OFF",
            Self::One => "ONE",
            Self::All => "ALL",
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration_secs: Option<u64>,
}

impl TrackInfo {
    pub const UNKNOWN_TITLE: &'static str = "Unknown Title";
    pub const UNKNOWN_ARTIST: &'static str = "Unknown Artist";
    pub const UNKNOWN_ALBUM: &'static str = "Unknown Album";

    pub fn unknown() -> Self {
        Self {
            title: Self::UNKNOWN_TITLE.to_string(),
            artist: Self::UNKNOWN_ARTIST.to_string(),
            album: Self::UNKNOWN_ALBUM.to_string(),
            duration_secs: None,
        }
    }
}

impl Default for TrackInfo {
    fn default() -> Self {
        Self::unknown()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_primary_color")]
    pub primary_color: String,
    #[serde(default = "default_hover_color")]
    pub hover_color: String,
    #[serde(default = "default_accent_color")]
    pub accent_color: String,
    #[serde(default = "default_auto_color")]
    pub auto_color_from_album: bool,
    #[serde(default = "default_volume")]
    pub volume: u8,
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub repeat_mode: RepeatMode,
    #[serde(default)]
    pub last_folder: Option<PathBuf>,
}

fn default_primary_color() -> String {
    DEFAULT_PRIMARY_HEX.to_string()
}

fn default_hover_color() -> String {
    DEFAULT_HOVER_HEX.to_string()
}

fn default_accent_color() -> String {
    DEFAULT_ACCENT_HEX.to_string()
}

fn default_auto_color() -> bool {
    true
}

fn default_volume() -> u8 {
    70
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            primary_color: default_primary_color(),
            hover_color: default_hover_color(),
            accent_color: default_accent_color(),
            auto_color_from_album: default_auto_color(),
            volume: default_volume(),
            shuffle: false,
            repeat_mode: RepeatMode::Off,
            last_folder: None,
        }
    }
}
