//! Tag extraction.
//!
//! Ingestion asks a [`TagReader`] to turn a file into a [`Track`] with tags and
//! duration filled in. Missing tags are left blank; the catalog substitutes
//! placeholders when the record is stored.

use lofty::file::{AudioFile, TaggedFileExt};
use lofty::prelude::Accessor;
use lofty::read_from_path;
use lofty::tag::Tag;
use std::path::Path;

use crate::error::{Error, Result};
use crate::track::Track;

/// Reads metadata for one media file.
///
/// Implementations must be shareable across the ingestion worker threads.
pub trait TagReader: Send + Sync {
    fn read(&self, path: &Path) -> Result<Track>;
}

/// [`TagReader`] backed by `lofty`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyTagReader;

/// First non-blank value of `extract` over the primary tag, then every other tag.
fn first_non_empty<F>(primary: Option<&Tag>, tags: &[Tag], extract: F) -> String
where
    F: Fn(&Tag) -> Option<String>,
{
    primary
        .into_iter()
        .chain(tags)
        .filter_map(&extract)
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

impl TagReader for LoftyTagReader {
    fn read(&self, path: &Path) -> Result<Track> {
        let tagged = read_from_path(path).map_err(|e| Error::ingest(path, e.to_string()))?;
        let primary = tagged.primary_tag();
        let tags = tagged.tags();

        let title = first_non_empty(primary, tags, |tag| tag.title().map(|v| v.into_owned()));
        let artist = first_non_empty(primary, tags, |tag| tag.artist().map(|v| v.into_owned()));
        let album = first_non_empty(primary, tags, |tag| tag.album().map(|v| v.into_owned()));
        let genre = first_non_empty(primary, tags, |tag| tag.genre().map(|v| v.into_owned()));
        let duration = tagged.properties().duration().as_secs_f64();

        Ok(Track::new(path.to_string_lossy())
            .with_tags(&title, &artist, &album, &genre)
            .with_duration(duration))
    }
}
