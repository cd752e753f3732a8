//! Ranking and selection of aggregated summaries.

use serde::{Deserialize, Serialize};

use crate::aggregate::{AlbumSummary, ArtistSummary, TrackSummary};

/// What a list is ranked by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Hours,
    /// Recency-weighted hours; summaries without weighting rank by hours.
    AdjustedHours,
    Plays,
}

/// A summary that can be ranked.
pub trait Ranked {
    fn hours(&self) -> f64;

    fn plays(&self) -> u64;

    fn adjusted_hours(&self) -> f64 {
        self.hours()
    }

    fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Hours => self.hours(),
            Metric::AdjustedHours => self.adjusted_hours(),
            Metric::Plays => self.plays() as f64,
        }
    }
}

/// Sort descending by `metric`, then keep the first `top_n`.
/// The sort is stable: equal values keep their input order.
pub fn rank<T: Ranked>(mut items: Vec<T>, metric: Metric, top_n: Option<usize>) -> Vec<T> {
    items.sort_by(|a, b| {
        b.metric(metric)
            .partial_cmp(&a.metric(metric))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if let Some(n) = top_n {
        items.truncate(n);
    }
    items
}

/// Minimums a summary must reach to appear in the year lists.
///
/// These belong to the views, not to the aggregation itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdPolicy {
    pub album_min_hours: f64,
    pub song_min_hours: f64,
    pub song_min_plays: u64,
    pub artist_min_hours: f64,
    pub artist_min_plays: u64,
    /// Length cap of each year list.
    pub list_limit: usize,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self {
            album_min_hours: 0.25,
            song_min_hours: 0.1,
            song_min_plays: 3,
            artist_min_hours: 0.5,
            artist_min_plays: 10,
            list_limit: 25,
        }
    }
}

impl ThresholdPolicy {
    pub fn keep_album(&self, a: &AlbumSummary) -> bool {
        a.hours >= self.album_min_hours
    }

    pub fn keep_song(&self, t: &TrackSummary) -> bool {
        t.hours >= self.song_min_hours || t.plays >= self.song_min_plays
    }

    pub fn keep_artist(&self, a: &ArtistSummary) -> bool {
        a.total_hours >= self.artist_min_hours || a.plays >= self.artist_min_plays
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Item {
        id: &'static str,
        hours: f64,
        plays: u64,
    }

    impl Ranked for Item {
        fn hours(&self) -> f64 {
            self.hours
        }

        fn plays(&self) -> u64 {
            self.plays
        }
    }

    fn item(id: &'static str, hours: f64, plays: u64) -> Item {
        Item { id, hours, plays }
    }

    fn ids(items: &[Item]) -> Vec<&'static str> {
        items.iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_rank_by_hours_and_plays() {
        let items = || vec![item("a", 1.0, 9), item("b", 3.0, 1), item("c", 2.0, 5)];
        assert_eq!(ids(&rank(items(), Metric::Hours, None)), vec!["b", "c", "a"]);
        assert_eq!(ids(&rank(items(), Metric::Plays, None)), vec!["a", "c", "b"]);
        // No weighting on Item: adjusted falls back to hours
        assert_eq!(ids(&rank(items(), Metric::AdjustedHours, None)), vec!["b", "c", "a"]);
    }

    #[test]
    fn test_rank_is_stable() {
        let items = vec![
            item("first", 1.0, 5),
            item("big", 9.0, 1),
            item("second", 1.0, 5),
            item("third", 1.0, 5),
        ];
        assert_eq!(
            ids(&rank(items, Metric::Plays, None)),
            vec!["first", "second", "third", "big"]
        );
    }

    #[test]
    fn test_rank_truncates() {
        let items = vec![item("a", 1.0, 1), item("b", 2.0, 2), item("c", 3.0, 3)];
        assert_eq!(ids(&rank(items, Metric::Hours, Some(2))), vec!["c", "b"]);
        assert!(rank(Vec::<Item>::new(), Metric::Hours, Some(5)).is_empty());
    }

    #[test]
    fn test_default_thresholds() {
        let p = ThresholdPolicy::default();
        let song = |hours, plays| TrackSummary {
            name: "s".into(),
            track_uri: "u".into(),
            artist: None,
            album: None,
            duration_ms: 0,
            plays,
            hours,
        };
        assert!(p.keep_song(&song(0.1, 0)));
        assert!(p.keep_song(&song(0.0, 3)));
        assert!(!p.keep_song(&song(0.09, 2)));

        let album = |hours| AlbumSummary {
            album: "a".into(),
            artist: None,
            track_uri: "u".into(),
            duration_ms: 0,
            plays: 100,
            hours,
        };
        assert!(p.keep_album(&album(0.25)));
        assert!(!p.keep_album(&album(0.24)));

        let artist = |total_hours, plays| ArtistSummary {
            artist: "x".into(),
            plays,
            total_hours,
            years: Default::default(),
            adjusted_years: Default::default(),
            adjusted_hours: total_hours,
        };
        assert!(p.keep_artist(&artist(0.5, 0)));
        assert!(p.keep_artist(&artist(0.0, 10)));
        assert!(!p.keep_artist(&artist(0.49, 9)));
    }

    #[test]
    fn test_thresholds_from_toml() {
        let p: ThresholdPolicy = toml::from_str("album_min_hours = 1.0\nlist_limit = 10").unwrap();
        assert_eq!(p.album_min_hours, 1.0);
        assert_eq!(p.list_limit, 10);
        assert_eq!(p.song_min_plays, 3);
    }
}
