//! The catalog's data model.
//!
//! [`Track`] is the canonical metadata record. Its rating is never stored
//! independently of its [`ScoreCard`]: [`Track::rating`] always applies the
//! aggregator formula to the current sub-scores, so it cannot go stale.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::rating;

/// Placeholder for tags missing from the source file.
pub const UNKNOWN: &str = "Unknown";

/// Highest value a single sub-score may take.
pub const MAX_SUB_SCORE: u8 = 10;

/// Five listener sub-scores plus the two applicability flags.
///
/// When `has_vocals`/`has_lyrics` is false the matching sub-score is kept
/// (so re-enabling the flag restores it) but excluded from aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreCard {
    pub melody: u8,
    pub rhythm: u8,
    pub vocals: u8,
    pub lyrics: u8,
    pub arrange: u8,
    pub has_vocals: bool,
    pub has_lyrics: bool,
}

/// Neutral state of a freshly ingested track: all zeros, both flags set.
impl Default for ScoreCard {
    fn default() -> Self {
        Self {
            melody: 0,
            rhythm: 0,
            vocals: 0,
            lyrics: 0,
            arrange: 0,
            has_vocals: true,
            has_lyrics: true,
        }
    }
}

impl ScoreCard {
    /// Card for an instrumental: vocals and lyrics excluded.
    #[must_use]
    pub fn instrumental(melody: u8, rhythm: u8, arrange: u8) -> Self {
        Self {
            melody,
            rhythm,
            arrange,
            has_vocals: false,
            has_lyrics: false,
            ..Self::default()
        }
    }

    /// Card with all five sub-scores applicable.
    #[must_use]
    pub fn full(melody: u8, rhythm: u8, vocals: u8, lyrics: u8, arrange: u8) -> Self {
        Self {
            melody,
            rhythm,
            vocals,
            lyrics,
            arrange,
            has_vocals: true,
            has_lyrics: true,
        }
    }

    /// Rejects any sub-score above [`MAX_SUB_SCORE`].
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("melody", self.melody),
            ("rhythm", self.rhythm),
            ("vocals", self.vocals),
            ("lyrics", self.lyrics),
            ("arrange", self.arrange),
        ];
        match fields.iter().find(|(_, value)| *value > MAX_SUB_SCORE) {
            Some(&(field, value)) => Err(Error::InvalidScore {
                field,
                value: i64::from(value),
            }),
            None => Ok(()),
        }
    }

    /// Scalar rating, see [`rating::track_rating`].
    #[must_use]
    pub fn rating(&self) -> f64 {
        rating::track_rating(self)
    }
}

/// How a track is stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(into = "TrackRow")]
pub struct Track {
    /// Assigned by the store, 0 until persisted.
    pub id: i64,
    /// Absolute filesystem location. The only uniqueness key.
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    /// Seconds, never negative.
    pub duration: f64,
    pub card: ScoreCard,
    /// Set once the listener has saved a rating; default-state tracks stay false.
    pub rated: bool,
}

impl Track {
    /// A record for `path` with placeholder tags and the neutral score card.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            id: 0,
            title: file_stem(&path),
            path,
            artist: UNKNOWN.to_string(),
            album: UNKNOWN.to_string(),
            genre: UNKNOWN.to_string(),
            duration: 0.0,
            card: ScoreCard::default(),
            rated: false,
        }
    }

    #[must_use]
    pub fn with_tags(mut self, title: &str, artist: &str, album: &str, genre: &str) -> Self {
        self.title = title.to_string();
        self.artist = artist.to_string();
        self.album = album.to_string();
        self.genre = genre.to_string();
        self
    }

    #[must_use]
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = seconds;
        self
    }

    /// Derived rating of the current score card.
    #[must_use]
    pub fn rating(&self) -> f64 {
        self.card.rating()
    }

    /// Fill blank tags with placeholders and clamp the duration.
    ///
    /// Fails if the path itself is blank, since nothing can key the record.
    pub fn normalized(mut self) -> Result<Self> {
        if self.path.trim().is_empty() {
            return Err(Error::ingest("", "record has an empty path"));
        }
        if self.title.trim().is_empty() {
            self.title = file_stem(&self.path);
        }
        for field in [&mut self.artist, &mut self.album, &mut self.genre] {
            if field.trim().is_empty() {
                *field = UNKNOWN.to_string();
            }
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            self.duration = 0.0;
        }
        Ok(self)
    }
}

fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(UNKNOWN)
        .to_string()
}

/// Flat record in the field order the presentation layer consumes:
/// id, path, title, artist, album, genre, duration, rating, the five
/// sub-scores, then the two flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackRow {
    pub id: i64,
    pub path: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub genre: String,
    pub duration: f64,
    pub rating: f64,
    pub rate_melody: u8,
    pub rate_rhythm: u8,
    pub rate_vocals: u8,
    pub rate_lyrics: u8,
    pub rate_arrange: u8,
    pub has_vocals: bool,
    pub has_lyrics: bool,
}

impl From<Track> for TrackRow {
    fn from(track: Track) -> Self {
        let rating = track.rating();
        Self {
            id: track.id,
            path: track.path,
            title: track.title,
            artist: track.artist,
            album: track.album,
            genre: track.genre,
            duration: track.duration,
            rating,
            rate_melody: track.card.melody,
            rate_rhythm: track.card.rhythm,
            rate_vocals: track.card.vocals,
            rate_lyrics: track.card.lyrics,
            rate_arrange: track.card.arrange,
            has_vocals: track.card.has_vocals,
            has_lyrics: track.card.has_lyrics,
        }
    }
}

/// An artist or (album, artist) group as shown by the library browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    /// The album's artist, empty for artist groups.
    pub secondary: String,
    pub count: usize,
    /// First-seen member, used to derive artwork.
    pub cover_path: String,
}

/// One line of a "top N" ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub name: String,
    pub secondary: String,
    pub rating: f64,
    pub cover_path: String,
    pub kind: EntityKind,
}

macro_rules! string_enum {
    (@first $first:literal $(, $rest:literal)*) => { $first };
    ($ty:ident { $($variant:ident => [$($name:literal),+]),+ $(,)? }) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($($name)|+ => Ok(Self::$variant),)+
                    other => Err(format!(
                        "unknown {} `{other}`, expected one of: {}",
                        stringify!($ty),
                        [$(string_enum!(@first $($name),+)),+].join(", ")
                    )),
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let name = match self {
                    $(Self::$variant => string_enum!(@first $($name),+),)+
                };
                f.write_str(name)
            }
        }
    };
}

/// Column for [`crate::query::list_sorted`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Artist,
    Title,
    Album,
    Genre,
    Duration,
    Rating,
}

string_enum!(SortKey {
    Artist => ["artist"],
    Title => ["title"],
    Album => ["album"],
    Genre => ["genre"],
    Duration => ["duration"],
    Rating => ["rating"],
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

string_enum!(SortDirection {
    Ascending => ["asc", "ascending"],
    Descending => ["desc", "descending"],
});

impl SortDirection {
    #[must_use]
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Field accepted by [`crate::query::filter_equals`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    Artist,
    Album,
}

string_enum!(FilterField {
    Artist => ["artist"],
    Album => ["album"],
});

/// Grouping for the library browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Artist,
    Album,
}

string_enum!(GroupKind {
    Artist => ["artist", "artists"],
    Album => ["album", "albums"],
});

/// What a ranking ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Track,
    Artist,
    Album,
}

string_enum!(EntityKind {
    Track => ["track", "tracks"],
    Artist => ["artist", "artists"],
    Album => ["album", "albums"],
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankMode {
    #[default]
    Best,
    Worst,
}

string_enum!(RankMode {
    Best => ["best"],
    Worst => ["worst"],
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_track_is_neutral() {
        let track = Track::new("/music/Artist/Album/01 Intro.mp3");
        assert_eq!(track.title, "01 Intro");
        assert_eq!(track.artist, UNKNOWN);
        assert_eq!(track.card, ScoreCard::default());
        assert!(!track.rated);
        assert_eq!(track.rating(), 0.0);
    }

    #[test]
    fn test_normalized_fills_placeholders() -> Result<()> {
        let track = Track::new("/music/x/song.flac")
            .with_tags("", " ", "Album", "")
            .with_duration(-3.0)
            .normalized()?;
        assert_eq!(track.title, "song");
        assert_eq!(track.artist, UNKNOWN);
        assert_eq!(track.album, "Album");
        assert_eq!(track.genre, UNKNOWN);
        assert_eq!(track.duration, 0.0);
        Ok(())
    }

    #[test]
    fn test_normalized_rejects_blank_path() {
        let result = Track::new("   ").normalized();
        assert!(matches!(result, Err(Error::Ingest { .. })));
    }

    #[test]
    fn test_normalized_keeps_path_verbatim() -> Result<()> {
        let track = Track::new(" /music/a.mp3 ").normalized()?;
        assert_eq!(track.path, " /music/a.mp3 ");
        Ok(())
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let card = ScoreCard::full(5, 11, 5, 5, 5);
        match card.validate() {
            Err(Error::InvalidScore { field, value }) => {
                assert_eq!(field, "rhythm");
                assert_eq!(value, 11);
            }
            other => panic!("expected InvalidScore, got {other:?}"),
        }
        assert!(ScoreCard::full(10, 10, 10, 10, 10).validate().is_ok());
    }

    #[test]
    fn test_row_field_order_in_json() {
        let track = Track::new("/a.mp3").with_tags("T", "A", "B", "G");
        let json = serde_json::to_string(&track).expect("serializable");
        let keys = [
            "\"id\"", "\"path\"", "\"title\"", "\"artist\"", "\"album\"", "\"genre\"",
            "\"duration\"", "\"rating\"", "\"rate_melody\"", "\"rate_rhythm\"",
            "\"rate_vocals\"", "\"rate_lyrics\"", "\"rate_arrange\"", "\"has_vocals\"",
            "\"has_lyrics\"",
        ];
        let positions: Vec<usize> = keys
            .iter()
            .map(|key| json.find(key).expect("key present"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]), "{json}");
    }

    #[test]
    fn test_string_enums_parse_and_display() {
        assert_eq!("Rating".parse::<SortKey>(), Ok(SortKey::Rating));
        assert_eq!("desc".parse::<SortDirection>(), Ok(SortDirection::Descending));
        assert_eq!("albums".parse::<EntityKind>(), Ok(EntityKind::Album));
        assert_eq!(EntityKind::Album.to_string(), "album");
        assert_eq!(SortDirection::Descending.to_string(), "desc");
        assert!("loudness".parse::<SortKey>().is_err());
    }
}
