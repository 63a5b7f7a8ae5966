//! # Configuration
//!
//! Where cadence keeps its files, and the user-tunable settings.
//!
//! The catalog and settings live in the platform data directory:
//! - Linux: `~/.local/share/cadence/`
//! - macOS: `~/Library/Application Support/cadence/`
//! - Windows: `%APPDATA%\cadence\`
//!
//! `settings.json` is optional; every missing field takes its default.

use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::DEFAULT_EXTENSIONS;
use crate::navigator::NavigatorSettings;
use crate::query::DEFAULT_TOP_LIMIT;
use crate::rating::GroupRatingPolicy;

const APP_DIR: &str = "cadence";
const DB_FILE: &str = "library.db";
const SETTINGS_FILE: &str = "settings.json";

/// Returns the cadence data directory, creating it if needed.
///
/// # Errors
///
/// Fails if the platform has no data directory or it cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine system data directory. Use --db to pick a catalog file.")
    })?;

    let app_dir = data_dir.join(APP_DIR);
    fs::create_dir_all(&app_dir).with_context(|| {
        format!(
            "Failed to create cadence data directory at {}. Please check file permissions.",
            app_dir.display()
        )
    })?;
    Ok(app_dir)
}

/// Default catalog location, `<data dir>/library.db`.
///
/// ```no_run
/// use cadence::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Catalog location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(DB_FILE))
}

pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(SETTINGS_FILE))
}

/// User settings persisted as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Catalog file to use instead of the default location.
    pub db_path: Option<PathBuf>,
    /// Whether unrated tracks count toward artist/album means.
    pub group_policy: GroupRatingPolicy,
    pub top_limit: usize,
    pub seek_grace_secs: f64,
    pub end_of_track_margin_secs: f64,
    /// File extensions picked up by `scan`, compared case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let navigator = NavigatorSettings::default();
        Self {
            db_path: None,
            group_policy: GroupRatingPolicy::default(),
            top_limit: DEFAULT_TOP_LIMIT,
            seek_grace_secs: navigator.seek_grace.as_secs_f64(),
            end_of_track_margin_secs: navigator.end_of_track_margin,
            extensions: DEFAULT_EXTENSIONS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Settings {
    /// Read settings from `path`, or defaults if the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        let settings: Self = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text)
            .with_context(|| format!("Failed to write settings to {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("seek_grace_secs", self.seek_grace_secs),
            ("end_of_track_margin_secs", self.end_of_track_margin_secs),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{name} must be a non-negative number of seconds, got {value}");
            }
        }
        if self.top_limit == 0 {
            bail!("top_limit must be at least 1");
        }
        Ok(())
    }

    #[must_use]
    pub fn navigator_settings(&self) -> NavigatorSettings {
        let defaults = NavigatorSettings::default();
        NavigatorSettings {
            seek_grace: Duration::try_from_secs_f64(self.seek_grace_secs)
                .unwrap_or(defaults.seek_grace),
            end_of_track_margin: self.end_of_track_margin_secs,
        }
    }
}

/// Everything a command needs to know before touching the catalog.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub db_path: PathBuf,
    pub settings: Settings,
}

impl RuntimeConfig {
    /// Resolve the catalog path: explicit flag, then settings, then the default location.
    pub fn resolve(db_flag: Option<PathBuf>) -> Result<Self> {
        let settings = match get_settings_path() {
            Ok(path) => Settings::load(&path)?,
            Err(err) => {
                debug!("Settings unavailable ({err}), using defaults");
                Settings::default()
            }
        };
        Self::with_settings(db_flag, settings)
    }

    pub fn with_settings(db_flag: Option<PathBuf>, settings: Settings) -> Result<Self> {
        let db_path = match db_flag.or_else(|| settings.db_path.clone()) {
            Some(path) => path,
            None => get_db_path()?,
        };
        Ok(Self { db_path, settings })
    }
}
