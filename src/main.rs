//! # Cadence
//!
//! Command-line front end for the cadence library engine: scan folders into
//! the catalog, browse and rank it, save score cards and play tracks.
//!
//! ## Usage
//!
//! ```bash
//! cadence scan ~/Music
//! cadence search "night"
//! cadence groups album
//! cadence top artists --worst
//! RUST_LOG=cadence=debug cadence play --shuffle
//! ```

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser};
use log::{debug, info};
use path_absolutize::Absolutize;
use serde::Serialize;
use std::path::Path;

use cadence::cli::{self, Command};
use cadence::completion;
use cadence::config::RuntimeConfig;
use cadence::db::Catalog;
use cadence::ingest::{self, CancelToken};
use cadence::query::QueryEngine;
use cadence::tags::LoftyTagReader;
use cadence::track::{GroupSummary, RankMode, RankedEntry, ScoreCard, SortDirection, Track};

/// Main entry point.
///
/// Logging is controlled with `RUST_LOG`:
/// - `RUST_LOG=debug cadence list` - Enable debug logging
/// - `RUST_LOG=cadence::navigator=trace cadence play` - Module-specific logging
fn main() -> Result<()> {
    env_logger::init();

    let cli::Args { db, json, command } = cli::Args::parse();

    if let Command::Completion { shell } = command {
        let mut cmd = cli::Args::command();
        completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        return Ok(());
    }

    let config = RuntimeConfig::resolve(db)?;
    debug!("Using catalog at {}", config.db_path.display());

    if let Command::CompleteTracks = command {
        return completion::print_track_completions(&config.db_path);
    }

    let catalog = Catalog::open(&config.db_path)
        .with_context(|| format!("Failed to open catalog at {}", config.db_path.display()))?;
    let engine = QueryEngine::new(&catalog, config.settings.group_policy);

    match command {
        Command::Scan { path } => {
            info!("Scanning {}", path.display());
            let report = ingest::scan_directory(
                &catalog,
                &path,
                &LoftyTagReader,
                &CancelToken::new(),
                &config.settings.extensions,
            )?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "Scanned {}: {} added, {} refreshed, {} skipped",
                    path.display(),
                    report.inserted,
                    report.updated,
                    report.failed.len()
                );
                for (file, reason) in &report.failed {
                    eprintln!("  skipped {}: {reason}", file.display());
                }
            }
        }
        Command::List { sort, desc } => {
            let direction = if desc {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            };
            print_tracks(&engine.list_sorted(sort, direction)?, json)?;
        }
        Command::Search { query } => {
            print_tracks(&engine.search(&query)?, json)?;
        }
        Command::Filter { field, value } => {
            print_tracks(&engine.filter_equals(field, &value)?, json)?;
        }
        Command::Groups { kind } => {
            print_groups(&engine.group_by(kind)?, json)?;
        }
        Command::Top {
            entity,
            worst,
            limit,
        } => {
            let mode = if worst { RankMode::Worst } else { RankMode::Best };
            let limit = limit.unwrap_or(config.settings.top_limit);
            print_ranking(&engine.top_ranked(entity, mode, limit)?, json)?;
        }
        Command::Rate {
            path,
            melody,
            rhythm,
            arrange,
            vocals,
            lyrics,
            no_vocals,
            no_lyrics,
        } => {
            let card = ScoreCard {
                melody,
                rhythm,
                vocals,
                lyrics,
                arrange,
                has_vocals: !no_vocals,
                has_lyrics: !no_lyrics,
            };
            let track = catalog.update_rating(&catalog_path(&path)?, &card)?;
            if json {
                print_json(&track)?;
            } else {
                println!("{} - {}: {:.2}", track.artist, track.title, track.rating());
            }
        }
        Command::Delete { path } => {
            let path = catalog_path(&path)?;
            if catalog.delete(&path)? {
                println!("Removed {path}");
            } else {
                println!("{path} was not in the catalog");
            }
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("Refusing to clear the catalog without --yes");
            }
            let count = catalog.len()?;
            catalog.clear()?;
            println!("Removed {count} tracks");
        }
        Command::Play {
            shuffle,
            repeat,
            start,
            query,
        } => {
            let playlist = match query {
                Some(query) => engine.search(&query)?,
                None => engine.list_sorted(Default::default(), SortDirection::Ascending)?,
            };
            if playlist.is_empty() {
                bail!("Nothing to play");
            }
            player::run(playlist, start, shuffle, repeat, &config)?;
        }
        Command::Completion { .. } | Command::CompleteTracks => {}
    }

    Ok(())
}

/// Resolve a user-supplied path the way `scan` stores it.
fn catalog_path(path: &str) -> Result<String> {
    Ok(Path::new(path).absolutize()?.to_string_lossy().into_owned())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn print_tracks(tracks: &[Track], json: bool) -> Result<()> {
    if json {
        return print_json(tracks);
    }
    for track in tracks {
        println!(
            "{:>5.2}  {:>6}  {} - {} [{}]",
            track.rating(),
            format_duration(track.duration),
            track.artist,
            track.title,
            track.album
        );
    }
    Ok(())
}

fn print_groups(groups: &[GroupSummary], json: bool) -> Result<()> {
    if json {
        return print_json(groups);
    }
    for group in groups {
        if group.secondary.is_empty() {
            println!("{} ({} tracks)", group.name, group.count);
        } else {
            println!("{} - {} ({} tracks)", group.secondary, group.name, group.count);
        }
    }
    Ok(())
}

fn print_ranking(entries: &[RankedEntry], json: bool) -> Result<()> {
    if json {
        return print_json(entries);
    }
    for (rank, entry) in entries.iter().enumerate() {
        if entry.secondary.is_empty() {
            println!("{:>3}. {:>5.2}  {}", rank + 1, entry.rating, entry.name);
        } else {
            println!(
                "{:>3}. {:>5.2}  {} - {}",
                rank + 1,
                entry.rating,
                entry.secondary,
                entry.name
            );
        }
    }
    Ok(())
}

#[cfg(feature = "rodio-output")]
mod player {
    use anyhow::Result;
    use log::{error, warn};
    use std::io::BufRead;
    use std::sync::mpsc::{self, RecvTimeoutError};
    use std::thread;
    use std::time::Duration;

    use cadence::config::RuntimeConfig;
    use cadence::navigator::Navigator;
    use cadence::track::Track;
    use cadence::transport::{RodioTransport, Transport};

    const POLL_INTERVAL: Duration = Duration::from_secs(1);

    fn announce<T: Transport>(navigator: &Navigator<T>) {
        if let (Some(index), Some(track)) = (navigator.current(), navigator.current_track()) {
            println!(
                "[{}/{}] {} - {}",
                index + 1,
                navigator.session().playlist.len(),
                track.artist,
                track.title
            );
        }
    }

    /// Transport failures are shown and playback waits on the failing track.
    fn report<T>(result: cadence::error::Result<T>) {
        match result {
            Ok(_) => {}
            Err(err) if err.is_recoverable() => {
                warn!("{err}");
                eprintln!("! {err}");
            }
            Err(err) => {
                error!("{err}");
                eprintln!("error: {err}");
            }
        }
    }

    pub fn run(
        playlist: Vec<Track>,
        start: usize,
        shuffle: bool,
        repeat: bool,
        config: &RuntimeConfig,
    ) -> Result<()> {
        let transport = RodioTransport::open_default()?;
        let mut navigator =
            Navigator::new(transport).with_settings(config.settings.navigator_settings());
        if shuffle {
            navigator.toggle_shuffle();
        }
        if repeat {
            navigator.toggle_repeat();
        }

        match navigator.load(playlist, start) {
            Err(err) if err.is_recoverable() => report::<()>(Err(err)),
            other => other?,
        }
        announce(&navigator);

        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line.trim().to_lowercase()).is_err() {
                    break;
                }
            }
        });

        loop {
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(command) => match command.as_str() {
                    "n" => {
                        report(navigator.next());
                        announce(&navigator);
                    }
                    "p" => {
                        report(navigator.previous());
                        announce(&navigator);
                    }
                    "" => report(navigator.toggle_pause()),
                    "s" => println!("shuffle {}", on_off(navigator.toggle_shuffle())),
                    "r" => println!("repeat {}", on_off(navigator.toggle_repeat())),
                    "q" => break,
                    other => eprintln!("unknown key `{other}` (n, p, Enter, s, r, q)"),
                },
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            match navigator.poll() {
                Ok(status) if status.advanced => announce(&navigator),
                Ok(_) => {}
                Err(err) => report::<()>(Err(err)),
            }
            if navigator.current().is_none() {
                println!("Playlist finished");
                break;
            }
        }

        navigator.transport_mut().stop();
        Ok(())
    }

    fn on_off(state: bool) -> &'static str {
        if state {
            "on"
        } else {
            "off"
        }
    }
}

#[cfg(not(feature = "rodio-output"))]
mod player {
    use anyhow::{bail, Result};
    use cadence::config::RuntimeConfig;
    use cadence::track::Track;

    pub fn run(
        _playlist: Vec<Track>,
        _start: usize,
        _shuffle: bool,
        _repeat: bool,
        _config: &RuntimeConfig,
    ) -> Result<()> {
        bail!("cadence was built without audio output; rebuild with `--features rodio-output`")
    }
}
