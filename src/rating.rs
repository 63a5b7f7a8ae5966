//! Rating aggregation.
//!
//! Turns a [`ScoreCard`] into one scalar per track and averages track ratings
//! into artist/album ratings.

use serde::{Deserialize, Serialize};

use crate::track::{ScoreCard, Track};

/// Whether tracks still in the neutral default state count toward group means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRatingPolicy {
    /// Only tracks the listener has explicitly rated.
    #[default]
    RatedOnly,
    /// Every member track, default-state tracks contributing their 0.0.
    IncludeUnrated,
}

impl GroupRatingPolicy {
    #[must_use]
    pub fn admits(self, track: &Track) -> bool {
        match self {
            Self::RatedOnly => track.rated,
            Self::IncludeUnrated => true,
        }
    }
}

/// Mean of the applicable sub-scores.
///
/// ```text
/// sum     = melody + rhythm + arrange   (+ vocals if has_vocals) (+ lyrics if has_lyrics)
/// divisor = 3                           (+ 1)                    (+ 1)
/// rating  = sum / divisor
/// ```
///
/// The divisor never drops below 3, and with every sub-score in 0..=10 the
/// result stays within [0, 10].
///
/// # Examples
///
/// ```
/// use cadence::rating::track_rating;
/// use cadence::track::ScoreCard;
///
/// let instrumental = ScoreCard::instrumental(8, 6, 10);
/// assert_eq!(track_rating(&instrumental), 8.0);
/// ```
#[must_use]
pub fn track_rating(card: &ScoreCard) -> f64 {
    let mut sum = u32::from(card.melody) + u32::from(card.rhythm) + u32::from(card.arrange);
    let mut divisor = 3u32;

    if card.has_vocals {
        sum += u32::from(card.vocals);
        divisor += 1;
    }
    if card.has_lyrics {
        sum += u32::from(card.lyrics);
        divisor += 1;
    }

    f64::from(sum) / f64::from(divisor)
}

/// Arithmetic mean of the ratings of the tracks `policy` admits.
///
/// Returns `None` when no member qualifies, so callers never divide by zero
/// or rank a group on a meaningless default.
pub fn group_mean<'a, I>(members: I, policy: GroupRatingPolicy) -> Option<f64>
where
    I: IntoIterator<Item = &'a Track>,
{
    let (sum, count) = members
        .into_iter()
        .filter(|track| policy.admits(track))
        .fold((0.0, 0u32), |(sum, count), track| {
            (sum + track.rating(), count + 1)
        });

    (count > 0).then(|| sum / f64::from(count))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rated(path: &str, card: ScoreCard) -> Track {
        let mut track = Track::new(path);
        track.card = card;
        track.rated = true;
        track
    }

    #[test]
    fn test_instrumental_uses_three_terms() {
        let card = ScoreCard::instrumental(8, 6, 10);
        assert_eq!(track_rating(&card), 8.0);
    }

    #[test]
    fn test_flags_extend_divisor() {
        // (4 + 6 + 8 + 10) / 4
        let mut card = ScoreCard::full(4, 6, 10, 0, 8);
        card.has_lyrics = false;
        assert_eq!(track_rating(&card), 7.0);

        // (4 + 6 + 8 + 10 + 2) / 5
        let card = ScoreCard::full(4, 6, 10, 2, 8);
        assert_eq!(track_rating(&card), 6.0);
    }

    #[test]
    fn test_excluded_scores_are_ignored() {
        let mut card = ScoreCard::instrumental(5, 5, 5);
        card.vocals = 10;
        card.lyrics = 10;
        assert_eq!(track_rating(&card), 5.0);
    }

    #[test]
    fn test_rating_bounds_over_grid() {
        for value in [0u8, 3, 7, 10] {
            for flags in [(false, false), (true, false), (false, true), (true, true)] {
                let card = ScoreCard {
                    melody: value,
                    rhythm: 10 - value,
                    vocals: value,
                    lyrics: 10,
                    arrange: 0,
                    has_vocals: flags.0,
                    has_lyrics: flags.1,
                };
                let rating = track_rating(&card);
                assert!((0.0..=10.0).contains(&rating), "{card:?} -> {rating}");
            }
        }
    }

    #[test]
    fn test_group_mean_rated_only_skips_defaults() {
        let tracks = vec![
            rated("/a.mp3", ScoreCard::instrumental(8, 8, 8)),
            rated("/b.mp3", ScoreCard::instrumental(6, 6, 6)),
            Track::new("/c.mp3"),
        ];
        assert_eq!(group_mean(&tracks, GroupRatingPolicy::RatedOnly), Some(7.0));
        let including = group_mean(&tracks, GroupRatingPolicy::IncludeUnrated)
            .expect("three members");
        assert!((including - 14.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_group_mean_none_without_members() {
        let tracks = vec![Track::new("/a.mp3")];
        assert_eq!(group_mean(&tracks, GroupRatingPolicy::RatedOnly), None);
        assert_eq!(group_mean(Vec::<&Track>::new(), GroupRatingPolicy::IncludeUnrated), None);
    }
}
