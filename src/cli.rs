//! # Command-Line Interface
//!
//! Clap definitions for the `cadence` binary.
//!
//! ## Commands
//!
//! - `scan`: Ingest a music folder into the catalog
//! - `list`, `search`, `filter`, `groups`, `top`: Read-only views of the catalog
//! - `rate`: Save a score card for one track
//! - `delete`, `clear`: Remove one or all tracks
//! - `play`: Play the catalog (or a search result) through the audio device
//!
//! ## Examples
//!
//! ```bash
//! cadence scan ~/Music
//! cadence list --sort rating --desc
//! cadence top albums --limit 5
//! cadence rate ~/Music/a.flac --melody 8 --rhythm 6 --arrange 10 --no-vocals --no-lyrics
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::track::{EntityKind, FilterField, GroupKind, SortKey};

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Parser, Debug)]
#[command(name = "cadence")]
#[command(about = "Cadence: a local music library with per-track score cards")]
#[command(version)]
pub struct Args {
    /// Catalog file to use instead of the default location
    #[arg(long, global = true, env = "CADENCE_DB", value_hint = clap::ValueHint::FilePath)]
    pub db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan a folder tree and add or refresh every audio file found
    ///
    /// Re-scanning refreshes tags and keeps existing ratings. Unreadable files
    /// are reported and skipped.
    Scan {
        #[arg(value_hint = clap::ValueHint::DirPath)]
        path: PathBuf,
    },

    /// List every track
    List {
        /// artist, title, album, genre, duration or rating
        #[arg(long, default_value_t = SortKey::Artist)]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,
    },

    /// Case-insensitive search over title, artist and album
    Search {
        /// Empty matches everything
        #[arg(default_value = "")]
        query: String,
    },

    /// Tracks whose artist or album is exactly VALUE
    Filter {
        /// artist or album
        field: FilterField,
        value: String,
    },

    /// One line per artist or per album
    Groups {
        /// artist or album
        kind: GroupKind,
    },

    /// Best (or worst) rated tracks, artists or albums
    Top {
        /// tracks, artists or albums
        entity: EntityKind,

        #[arg(long)]
        worst: bool,

        /// Defaults to `top_limit` from settings
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Save a score card for one track
    ///
    /// Every sub-score is 0 to 10. Vocals and lyrics can be excluded from the
    /// rating for instrumentals.
    Rate {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: String,

        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=10))]
        melody: u8,

        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=10))]
        rhythm: u8,

        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=10))]
        arrange: u8,

        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=10))]
        vocals: u8,

        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(0..=10))]
        lyrics: u8,

        /// Leave vocals out of the rating
        #[arg(long)]
        no_vocals: bool,

        /// Leave lyrics out of the rating
        #[arg(long)]
        no_lyrics: bool,
    },

    /// Remove one track from the catalog
    Delete {
        #[arg(value_hint = clap::ValueHint::FilePath)]
        path: String,
    },

    /// Remove every track from the catalog
    Clear {
        /// Required; clearing cannot be undone
        #[arg(long)]
        yes: bool,
    },

    /// Play the catalog, or the tracks matching QUERY
    ///
    /// Type a key and press Enter: n = next, p = previous, s = shuffle,
    /// r = repeat, q = quit. Enter alone pauses or resumes.
    Play {
        #[arg(long)]
        shuffle: bool,

        #[arg(long)]
        repeat: bool,

        /// Playlist index to start at
        #[arg(long, default_value_t = 0)]
        start: usize,

        query: Option<String>,
    },

    /// Generate shell completions
    ///
    /// Usage: cadence completion bash > ~/.local/share/bash-completion/completions/cadence
    Completion { shell: Shell },

    /// List catalog paths for completion (hidden command)
    #[command(hide = true)]
    CompleteTracks,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_top_and_list() {
        let args = Args::parse_from(["cadence", "top", "albums", "--worst", "--limit", "3"]);
        match args.command {
            Command::Top { entity, worst, limit } => {
                assert_eq!(entity, EntityKind::Album);
                assert!(worst);
                assert_eq!(limit, Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }

        let args = Args::parse_from(["cadence", "--json", "list", "--sort", "rating"]);
        assert!(args.json);
        assert!(matches!(
            args.command,
            Command::List { sort: SortKey::Rating, desc: false }
        ));
    }

    #[test]
    fn test_rate_rejects_out_of_range() {
        let result = Args::try_parse_from(["cadence", "rate", "/a.mp3", "--melody", "11"]);
        assert!(result.is_err());
    }
}
