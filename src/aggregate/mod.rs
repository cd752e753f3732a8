//! The aggregation engine: pure folds over a slice of listening events.
//!
//! Every function here reads its input and returns freshly owned output.
//! Empty input always yields an empty result, never an error.

pub mod albums;
pub mod artists;
pub mod timeline;
pub mod tracks;

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::MS_PER_HOUR;
use crate::records::ListeningEvent;

pub use albums::{AlbumSummary, aggregate_albums};
pub use artists::{ArtistSummary, RECENCY_DECAY, aggregate_by_artist, recency_weight};
pub use timeline::{
    AlbumCumulative, AlbumSeries, DayBucket, HeatmapCell, WeekBucket, album_cumulative, daily_buckets,
    first_play, week_start, weekly_buckets, year_heatmap,
};
pub use tracks::{SongDetail, TOP_TRACKS, TrackScope, TrackSummary, aggregate_tracks, song_detail, top_tracks};

/// Milliseconds → hours, plain division.
pub fn hours(ms: u64) -> f64 {
    ms as f64 / MS_PER_HOUR
}

/// Keyed accumulator that keeps entries in first-seen order.
///
/// Downstream ranking uses a stable sort, so first-seen order is what
/// decides ties.
pub(crate) struct Buckets<T> {
    index: HashMap<String, usize>,
    entries: Vec<T>,
}

impl<T> Buckets<T> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    pub(crate) fn entry(&mut self, key: &str, make: impl FnOnce() -> T) -> &mut T {
        let idx = match self.index.get(key) {
            Some(&idx) => idx,
            None => {
                self.entries.push(make());
                let idx = self.entries.len() - 1;
                self.index.insert(key.to_string(), idx);
                idx
            }
        };
        &mut self.entries[idx]
    }

    pub(crate) fn into_vec(self) -> Vec<T> {
        self.entries
    }
}

/// Whole-collection summary for the `stats` view.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryStats {
    pub plays: usize,
    pub total_hours: f64,
    pub first_play: Option<DateTime<Utc>>,
    pub last_play: Option<DateTime<Utc>>,
    pub artists: usize,
    pub albums: usize,
    pub tracks: usize,
    /// Hours per UTC year, only years with plays.
    pub hours_by_year: BTreeMap<i32, f64>,
}

pub fn library_stats(events: &[ListeningEvent]) -> LibraryStats {
    let mut artists = HashSet::new();
    let mut albums = HashSet::new();
    let mut tracks = HashSet::new();
    let mut year_ms: BTreeMap<i32, u64> = BTreeMap::new();
    let mut total_ms = 0u64;

    for e in events {
        artists.insert(e.artist_key());
        albums.insert((e.artist_key(), e.album_key()));
        tracks.insert(e.track_uri.as_str());
        *year_ms.entry(e.year()).or_insert(0) += e.duration_ms;
        total_ms += e.duration_ms;
    }

    LibraryStats {
        plays: events.len(),
        total_hours: hours(total_ms),
        first_play: events.iter().map(|e| e.timestamp).min(),
        last_play: events.iter().map(|e| e.timestamp).max(),
        artists: artists.len(),
        albums: albums.len(),
        tracks: tracks.len(),
        hours_by_year: year_ms.into_iter().map(|(y, ms)| (y, hours(ms))).collect(),
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::play;
    use super::*;

    #[test]
    fn test_buckets_keep_first_seen_order() {
        let mut b: Buckets<(String, u32)> = Buckets::new();
        for key in ["b", "a", "b", "c", "a", "b"] {
            b.entry(key, || (key.to_string(), 0)).1 += 1;
        }
        let v = b.into_vec();
        assert_eq!(
            v,
            vec![("b".to_string(), 3), ("a".to_string(), 2), ("c".to_string(), 1)]
        );
    }

    #[test]
    fn test_library_stats() {
        let events = vec![
            play("A", "X", "one", (2023, 1, 1), 1_800_000),
            play("A", "Y", "two", (2024, 1, 1), 1_800_000),
            play("B", "X", "three", (2024, 2, 1), 3_600_000),
        ];
        let stats = library_stats(&events);
        assert_eq!(stats.plays, 3);
        assert_eq!(stats.artists, 2);
        // Same album title under two artists counts twice
        assert_eq!(stats.albums, 3);
        assert_eq!(stats.tracks, 3);
        assert!((stats.total_hours - 2.0).abs() < 1e-12);
        assert_eq!(stats.hours_by_year.len(), 2);
        assert!((stats.hours_by_year[&2024] - 1.5).abs() < 1e-12);
        assert_eq!(stats.first_play, Some(events[0].timestamp));
        assert_eq!(stats.last_play, Some(events[2].timestamp));
    }

    #[test]
    fn test_library_stats_empty() {
        assert_eq!(library_stats(&[]), LibraryStats::default());
    }
}
