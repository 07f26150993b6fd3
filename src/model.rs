use crate::artwork::ArtworkHandle;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::PathBuf;
use std::time::Duration;

pub const UNKNOWN_TITLE: &str = "Unknown Title";
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Dark,
    Amoled,
    RosePine,
    Dracula,
}

impl Theme {
    pub const ALL: [Theme; 4] = [Self::Dark, Self::Amoled, Self::RosePine, Self::Dracula];

    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Amoled,
            Self::Amoled => Self::RosePine,
            Self::RosePine => Self::Dracula,
            Self::Dracula => Self::Dark,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Amoled => "amoled",
            Self::RosePine => "rose-pine",
            Self::Dracula => "dracula",
        }
    }

    pub fn from_key(value: &str) -> Self {
        Self::parse(value).unwrap_or_default()
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|theme| theme.key().eq_ignore_ascii_case(value.trim()))
    }
}

impl Serialize for Theme {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.key())
    }
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from_key(&value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub picture: Option<Picture>,
    pub duration: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub image: Option<ArtworkHandle>,
    pub source: PathBuf,
    pub duration: Option<Duration>,
}

impl Track {
    pub fn new(
        source: PathBuf,
        title: Option<String>,
        artist: Option<String>,
        album: Option<String>,
    ) -> Self {
        let title = title
            .and_then(clean_text)
            .or_else(|| {
                source
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| clean_text(stem.to_string()))
            })
            .unwrap_or_else(|| String::from(UNKNOWN_TITLE));

        Self {
            id: TrackId(0),
            title,
            artist: artist
                .and_then(clean_text)
                .unwrap_or_else(|| String::from(UNKNOWN_ARTIST)),
            album: album
                .and_then(clean_text)
                .unwrap_or_else(|| String::from(UNKNOWN_ALBUM)),
            image: None,
            source,
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Option<Duration>) -> Self {
        self.duration = duration.filter(|value| !value.is_zero());
        self
    }
}

fn clean_text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub theme: Theme,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let track = Track::new(
            PathBuf::from("music/Song Name.mp3"),
            None,
            Some(String::from("  ")),
            None,
        );
        assert_eq!(track.title, "Song Name");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.album, UNKNOWN_ALBUM);
    }

    #[test]
    fn title_falls_back_to_unknown_without_stem() {
        let track = Track::new(PathBuf::new(), None, None, None);
        assert_eq!(track.title, UNKNOWN_TITLE);
    }

    #[test]
    fn zero_duration_is_treated_as_unknown() {
        let track = Track::new(PathBuf::from("a.mp3"), None, None, None)
            .with_duration(Some(Duration::ZERO));
        assert_eq!(track.duration, None);
    }

    #[test]
    fn theme_keys_round_trip_and_unknown_is_dark() {
        for theme in Theme::ALL {
            assert_eq!(Theme::from_key(theme.key()), theme);
        }
        assert_eq!(Theme::from_key("solarized"), Theme::Dark);
        assert_eq!(Theme::parse("solarized"), None);

        let settings: Settings =
            serde_json::from_str(r#"{"theme":"rose-pine"}"#).expect("parse");
        assert_eq!(settings.theme, Theme::RosePine);
        let json = serde_json::to_string(&Settings {
            theme: Theme::Dracula,
        })
        .expect("json");
        assert_eq!(json, r#"{"theme":"dracula"}"#);
    }

    #[test]
    fn theme_cycle_visits_every_theme() {
        let mut theme = Theme::Dark;
        for expected in [Theme::Amoled, Theme::RosePine, Theme::Dracula, Theme::Dark] {
            theme = theme.next();
            assert_eq!(theme, expected);
        }
    }
}
