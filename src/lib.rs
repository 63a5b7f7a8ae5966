//! # Cadence
//!
//! Local media-library engine: a durable catalog of audio tracks with
//! listener score cards, read-only query projections over it, rating
//! aggregation and a playback navigator that drives an audio transport.
//!
//! ## Components
//!
//! - [`db`]: SQLite-backed [`db::Catalog`] keyed by file path
//! - [`query`]: Sorting, search, filters, grouping and top-N rankings
//! - [`rating`]: Per-track rating formula and group means
//! - [`navigator`]: Playlist state machine with shuffle, repeat and position smoothing
//! - [`transport`]: The audio engine seam; `rodio` output behind the `rodio-output` feature
//! - [`ingest`] and [`tags`]: Cancellable folder scans with `lofty` tag reading
//! - [`config`]: Data directory and `settings.json`
//!
//! ## Quick Start
//!
//! ```rust
//! use cadence::db::Catalog;
//! use cadence::query::QueryEngine;
//! use cadence::rating::GroupRatingPolicy;
//! use cadence::track::{EntityKind, RankMode, ScoreCard, Track};
//!
//! let catalog = Catalog::open_in_memory()?;
//! catalog.upsert(Track::new("/music/intro.flac").with_tags("Intro", "Band", "Debut", "Rock"))?;
//! catalog.update_rating("/music/intro.flac", &ScoreCard::instrumental(8, 6, 10))?;
//!
//! let engine = QueryEngine::new(&catalog, GroupRatingPolicy::RatedOnly);
//! let best = engine.top_ranked(EntityKind::Track, RankMode::Best, 10)?;
//! assert_eq!(best[0].rating, 8.0);
//! # Ok::<(), cadence::error::Error>(())
//! ```
//!
//! ## Playback
//!
//! ```rust
//! use cadence::navigator::Navigator;
//! use cadence::track::Track;
//! use cadence::transport::RecordingTransport;
//!
//! let mut navigator = Navigator::with_seed(RecordingTransport::new(), 42);
//! navigator.load(vec![Track::new("/a.mp3"), Track::new("/b.mp3")], 0)?;
//! assert_eq!(navigator.next()?, Some(1));
//! assert_eq!(navigator.next()?, None); // repeat is off
//! # Ok::<(), cadence::error::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Library operations return [`error::Result`]. No error is fatal to the
//! process; each one names the path and operation that failed.

pub mod cli;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod navigator;
pub mod query;
pub mod rating;
pub mod tags;
pub mod track;
pub mod transport;
