//! Query engine.
//!
//! Read-only projections over a catalog snapshot: sorted listings, substring
//! search, equality filters, artist/album grouping and top-N rankings.
//!
//! The free functions operate on a slice of [`Track`] and are pure;
//! [`QueryEngine`] takes one consistent snapshot from the [`Catalog`] per call
//! and hands it to them.
//!
//! String comparisons are case-sensitive codepoint order. Every ordering ends
//! in a deterministic tie-break so results are reproducible.

use log::debug;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::db::Catalog;
use crate::error::Result;
use crate::rating::{self, GroupRatingPolicy};
use crate::track::{
    EntityKind, FilterField, GroupKind, GroupSummary, RankMode, RankedEntry, SortDirection,
    SortKey, Track,
};

/// Number of entries a ranking returns unless told otherwise.
pub const DEFAULT_TOP_LIMIT: usize = 10;

fn compare_by_key(a: &Track, b: &Track, key: SortKey) -> Ordering {
    match key {
        SortKey::Artist => a.artist.cmp(&b.artist),
        SortKey::Title => a.title.cmp(&b.title),
        SortKey::Album => a.album.cmp(&b.album),
        SortKey::Genre => a.genre.cmp(&b.genre),
        SortKey::Duration => a.duration.total_cmp(&b.duration),
        SortKey::Rating => a.rating().total_cmp(&b.rating()),
    }
}

/// Whole catalog ordered by `key`; ties broken by path ascending whatever the direction.
#[must_use]
pub fn list_sorted(tracks: &[Track], key: SortKey, direction: SortDirection) -> Vec<Track> {
    let mut sorted = tracks.to_vec();
    sorted.sort_by(|a, b| {
        let primary = compare_by_key(a, b, key);
        let primary = match direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        primary.then_with(|| a.path.cmp(&b.path))
    });
    sorted
}

/// Tracks whose title, artist or album contains `query`, ignoring case.
///
/// The query is matched as given, whitespace included. Only an empty query
/// matches everything.
#[must_use]
pub fn search(tracks: &[Track], query: &str) -> Vec<Track> {
    if query.is_empty() {
        return tracks.to_vec();
    }
    let needle = query.to_lowercase();

    tracks
        .iter()
        .filter(|track| {
            [&track.title, &track.artist, &track.album]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect()
}

/// Exact, case-sensitive match on artist or album, ordered by title then path.
#[must_use]
pub fn filter_equals(tracks: &[Track], field: FilterField, value: &str) -> Vec<Track> {
    let matching: Vec<Track> = tracks
        .iter()
        .filter(|track| match field {
            FilterField::Artist => track.artist == value,
            FilterField::Album => track.album == value,
        })
        .cloned()
        .collect();
    list_sorted(&matching, SortKey::Title, SortDirection::Ascending)
}

/// Members of each group, keyed by (name, secondary), in first-seen order.
fn group_members(tracks: &[Track], kind: GroupKind) -> Vec<((String, String), Vec<&Track>)> {
    let mut index: HashMap<(&str, &str), usize> = HashMap::new();
    let mut groups: Vec<((String, String), Vec<&Track>)> = Vec::new();

    for track in tracks {
        let key = match kind {
            GroupKind::Artist => (track.artist.as_str(), ""),
            GroupKind::Album => (track.album.as_str(), track.artist.as_str()),
        };
        match index.get(&key) {
            Some(&slot) => groups[slot].1.push(track),
            None => {
                index.insert(key, groups.len());
                groups.push(((key.0.to_string(), key.1.to_string()), vec![track]));
            }
        }
    }

    groups
}

/// One summary per artist, or per (album, artist) pair, ordered by name then secondary.
///
/// `cover_path` is the first member seen in `tracks`.
#[must_use]
pub fn group_by(tracks: &[Track], kind: GroupKind) -> Vec<GroupSummary> {
    let mut summaries: Vec<GroupSummary> = group_members(tracks, kind)
        .into_iter()
        .map(|((name, secondary), members)| GroupSummary {
            name,
            secondary,
            count: members.len(),
            cover_path: members
                .first()
                .map(|track| track.path.clone())
                .unwrap_or_default(),
        })
        .collect();

    summaries.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.secondary.cmp(&b.secondary)));
    summaries
}

/// Top `limit` tracks, artists or albums by rating.
///
/// Tracks rank on their own rating and only when explicitly rated. Artists and
/// albums rank on the mean of the member tracks `policy` admits; groups with no
/// admitted member are left out. `Best` sorts descending, `Worst` ascending;
/// ties go to name, then secondary, then cover path.
#[must_use]
pub fn top_ranked(
    tracks: &[Track],
    entity: EntityKind,
    mode: RankMode,
    limit: usize,
    policy: GroupRatingPolicy,
) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = match entity {
        EntityKind::Track => tracks
            .iter()
            .filter(|track| track.rated)
            .map(|track| RankedEntry {
                name: track.title.clone(),
                secondary: track.artist.clone(),
                rating: track.rating(),
                cover_path: track.path.clone(),
                kind: EntityKind::Track,
            })
            .collect(),
        EntityKind::Artist | EntityKind::Album => {
            let kind = if entity == EntityKind::Artist {
                GroupKind::Artist
            } else {
                GroupKind::Album
            };
            group_members(tracks, kind)
                .into_iter()
                .filter_map(|((name, secondary), members)| {
                    let mean = rating::group_mean(members.iter().copied(), policy)?;
                    let cover_path = members
                        .iter()
                        .find(|track| policy.admits(track))
                        .map(|track| track.path.clone())
                        .unwrap_or_default();
                    Some(RankedEntry {
                        name,
                        secondary,
                        rating: mean,
                        cover_path,
                        kind: entity,
                    })
                })
                .collect()
        }
    };

    entries.sort_by(|a, b| {
        let by_rating = match mode {
            RankMode::Best => b.rating.total_cmp(&a.rating),
            RankMode::Worst => a.rating.total_cmp(&b.rating),
        };
        by_rating
            .then_with(|| a.name.cmp(&b.name))
            .then_with(|| a.secondary.cmp(&b.secondary))
            .then_with(|| a.cover_path.cmp(&b.cover_path))
    });
    entries.truncate(limit);
    entries
}

/// Column-header behaviour of the library view: asking for the column that is
/// already active flips the direction, a different column starts ascending.
#[must_use]
pub fn sort_toggle(
    current: (SortKey, SortDirection),
    requested: SortKey,
) -> (SortKey, SortDirection) {
    let (key, direction) = current;
    if key == requested {
        (key, direction.flipped())
    } else {
        (requested, SortDirection::Ascending)
    }
}

/// Snapshot-per-call facade over a [`Catalog`].
pub struct QueryEngine<'a> {
    catalog: &'a Catalog,
    policy: GroupRatingPolicy,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub fn new(catalog: &'a Catalog, policy: GroupRatingPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn list_sorted(&self, key: SortKey, direction: SortDirection) -> Result<Vec<Track>> {
        let snapshot = self.catalog.snapshot()?;
        debug!("list_sorted by {key} {direction} over {} tracks", snapshot.len());
        Ok(list_sorted(&snapshot, key, direction))
    }

    pub fn search(&self, query: &str) -> Result<Vec<Track>> {
        let snapshot = self.catalog.snapshot()?;
        let found = search(&snapshot, query);
        debug!("search `{query}`: {} of {} tracks", found.len(), snapshot.len());
        Ok(found)
    }

    pub fn filter_equals(&self, field: FilterField, value: &str) -> Result<Vec<Track>> {
        Ok(filter_equals(&self.catalog.snapshot()?, field, value))
    }

    pub fn group_by(&self, kind: GroupKind) -> Result<Vec<GroupSummary>> {
        Ok(group_by(&self.catalog.snapshot()?, kind))
    }

    pub fn top_ranked(
        &self,
        entity: EntityKind,
        mode: RankMode,
        limit: usize,
    ) -> Result<Vec<RankedEntry>> {
        let snapshot = self.catalog.snapshot()?;
        Ok(top_ranked(&snapshot, entity, mode, limit, self.policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::ScoreCard;

    fn track(path: &str, title: &str, artist: &str, album: &str, duration: f64) -> Track {
        Track::new(path)
            .with_tags(title, artist, album, "Genre")
            .with_duration(duration)
    }

    fn rated(mut track: Track, score: u8) -> Track {
        track.card = ScoreCard::instrumental(score, score, score);
        track.rated = true;
        track
    }

    fn library() -> Vec<Track> {
        vec![
            rated(track("/m/3.mp3", "Gamma", "beta", "Night", 200.0), 9),
            rated(track("/m/1.mp3", "alpha", "Alpha", "Day", 120.0), 4),
            track("/m/2.mp3", "Beta", "Alpha", "Day", 120.0),
            rated(track("/m/4.mp3", "Delta", "Alpha", "Night", 90.0), 6),
        ]
    }

    fn paths(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.path.as_str()).collect()
    }

    #[test]
    fn test_list_sorted_is_case_sensitive_with_path_tiebreak() {
        let sorted = list_sorted(&library(), SortKey::Artist, SortDirection::Ascending);
        // "Alpha" < "beta" in codepoint order; the three Alpha rows fall back to path.
        assert_eq!(paths(&sorted), ["/m/1.mp3", "/m/2.mp3", "/m/4.mp3", "/m/3.mp3"]);
    }

    #[test]
    fn test_list_sorted_descending_keeps_path_ascending_on_ties() {
        let sorted = list_sorted(&library(), SortKey::Duration, SortDirection::Descending);
        assert_eq!(paths(&sorted), ["/m/3.mp3", "/m/1.mp3", "/m/2.mp3", "/m/4.mp3"]);
    }

    #[test]
    fn test_list_sorted_by_rating() {
        let sorted = list_sorted(&library(), SortKey::Rating, SortDirection::Descending);
        assert_eq!(paths(&sorted), ["/m/3.mp3", "/m/4.mp3", "/m/1.mp3", "/m/2.mp3"]);
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let lib = library();
        assert_eq!(paths(&search(&lib, "ALPHA")), ["/m/1.mp3", "/m/2.mp3", "/m/4.mp3"]);
        assert_eq!(paths(&search(&lib, "nigh")), ["/m/3.mp3", "/m/4.mp3"]);
        assert!(search(&lib, "Genre").is_empty());
    }

    #[test]
    fn test_empty_search_is_full_scan() {
        let lib = library();
        assert_eq!(search(&lib, ""), lib);
        assert!(search(&lib, " ").is_empty());
    }

    #[test]
    fn test_search_keeps_whitespace_in_query() {
        let lib = vec![
            track("/m/a.mp3", "Nightfall", "X", "A", 1.0),
            track("/m/b.mp3", "Late Night", "X", "A", 1.0),
        ];
        assert_eq!(paths(&search(&lib, " night")), ["/m/b.mp3"]);
        assert_eq!(paths(&search(&lib, " ")), ["/m/b.mp3"]);
    }

    #[test]
    fn test_filter_equals_is_exact() {
        let lib = library();
        let alpha = filter_equals(&lib, FilterField::Artist, "Alpha");
        assert_eq!(paths(&alpha), ["/m/2.mp3", "/m/4.mp3", "/m/1.mp3"]);
        assert!(filter_equals(&lib, FilterField::Artist, "alpha").is_empty());
        assert_eq!(filter_equals(&lib, FilterField::Album, "Night").len(), 2);
    }

    #[test]
    fn test_group_by_album_separates_artists() {
        let groups = group_by(&library(), GroupKind::Album);
        let keys: Vec<(&str, &str, usize)> = groups
            .iter()
            .map(|g| (g.name.as_str(), g.secondary.as_str(), g.count))
            .collect();
        assert_eq!(
            keys,
            [("Day", "Alpha", 2), ("Night", "Alpha", 1), ("Night", "beta", 1)]
        );
        assert_eq!(groups[0].cover_path, "/m/1.mp3");
    }

    #[test]
    fn test_group_by_artist_has_empty_secondary() {
        let groups = group_by(&library(), GroupKind::Artist);
        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| g.secondary.is_empty()));
        assert_eq!(groups[0].count, 3);
    }

    #[test]
    fn test_top_tracks_excludes_unrated_and_orders() {
        let best = top_ranked(
            &library(),
            EntityKind::Track,
            RankMode::Best,
            10,
            GroupRatingPolicy::RatedOnly,
        );
        let ratings: Vec<f64> = best.iter().map(|e| e.rating).collect();
        assert_eq!(ratings, [9.0, 6.0, 4.0]);
        assert!(best.iter().all(|e| e.cover_path != "/m/2.mp3"));

        let worst = top_ranked(
            &library(),
            EntityKind::Track,
            RankMode::Worst,
            1,
            GroupRatingPolicy::RatedOnly,
        );
        assert_eq!(worst.len(), 1);
        assert_eq!(worst[0].name, "alpha");
    }

    #[test]
    fn test_top_artists_policy() {
        let lib = library();
        let rated_only = top_ranked(
            &lib,
            EntityKind::Artist,
            RankMode::Best,
            10,
            GroupRatingPolicy::RatedOnly,
        );
        assert_eq!(rated_only[0].name, "beta");
        assert_eq!(rated_only[1].name, "Alpha");
        assert_eq!(rated_only[1].rating, 5.0);

        let including = top_ranked(
            &lib,
            EntityKind::Artist,
            RankMode::Best,
            10,
            GroupRatingPolicy::IncludeUnrated,
        );
        assert!((including[1].rating - 10.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_top_albums_skip_groups_without_rated_members() {
        let mut lib = library();
        lib.push(track("/m/5.mp3", "Echo", "Gamma", "Unheard", 100.0));
        let albums = top_ranked(
            &lib,
            EntityKind::Album,
            RankMode::Worst,
            10,
            GroupRatingPolicy::RatedOnly,
        );
        assert!(albums.iter().all(|e| e.name != "Unheard"));
        assert_eq!(albums[0].name, "Day");
        assert_eq!(albums[0].kind, EntityKind::Album);
    }

    #[test]
    fn test_top_ties_broken_by_name() {
        let lib = vec![
            rated(track("/m/b.mp3", "Bravo", "X", "A", 1.0), 7),
            rated(track("/m/a.mp3", "Alpha", "X", "A", 1.0), 7),
        ];
        let best = top_ranked(
            &lib,
            EntityKind::Track,
            RankMode::Best,
            10,
            GroupRatingPolicy::RatedOnly,
        );
        assert_eq!(best[0].name, "Alpha");
        assert_eq!(best[1].name, "Bravo");
    }

    #[test]
    fn test_sort_toggle() {
        let state = (SortKey::Artist, SortDirection::Ascending);
        assert_eq!(
            sort_toggle(state, SortKey::Artist),
            (SortKey::Artist, SortDirection::Descending)
        );
        assert_eq!(
            sort_toggle((SortKey::Artist, SortDirection::Descending), SortKey::Title),
            (SortKey::Title, SortDirection::Ascending)
        );
    }
}
