use serde::Serialize;

use super::{Buckets, hours};
use crate::rank::{Metric, Ranked, rank};
use crate::records::ListeningEvent;

/// Length of the per-artist top-tracks list.
pub const TOP_TRACKS: usize = 10;

/// Which plays a track aggregation looks at. Unset fields match everything;
/// artist and album compare exactly against the grouping keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackScope {
    pub artist: Option<String>,
    pub album: Option<String>,
    pub track_uri: Option<String>,
    pub year: Option<i32>,
}

impl TrackScope {
    pub fn artist(name: &str) -> Self {
        Self {
            artist: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn album(name: &str) -> Self {
        Self {
            album: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn in_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn matches(&self, e: &ListeningEvent) -> bool {
        self.artist.as_deref().is_none_or(|a| e.artist_key() == a)
            && self.album.as_deref().is_none_or(|a| e.album_key() == a)
            && self.track_uri.as_deref().is_none_or(|u| e.track_uri == u)
            && self.year.is_none_or(|y| e.year() == y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackSummary {
    pub name: String,
    /// URI of the first play seen under this name.
    pub track_uri: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub duration_ms: u64,
    pub plays: u64,
    pub hours: f64,
}

impl Ranked for TrackSummary {
    fn hours(&self) -> f64 {
        self.hours
    }

    fn plays(&self) -> u64 {
        self.plays
    }
}

/// Group the plays in `scope` by track name, in first-seen order.
///
/// This is the single track fold behind the top-tracks list, the album
/// detail, the year's top songs and the week detail; callers rank the
/// result the way their view needs.
pub fn aggregate_tracks(events: &[ListeningEvent], scope: &TrackScope) -> Vec<TrackSummary> {
    let mut buckets = Buckets::new();

    for e in events.iter().filter(|e| scope.matches(e)) {
        let entry = buckets.entry(e.track_key(), || TrackSummary {
            name: e.track_key().to_string(),
            track_uri: e.track_uri.clone(),
            artist: e.artist_name.clone(),
            album: e.album_name.clone(),
            duration_ms: 0,
            plays: 0,
            hours: 0.0,
        });
        entry.duration_ms += e.duration_ms;
        entry.plays += 1;
    }

    buckets
        .into_vec()
        .into_iter()
        .map(|mut t| {
            t.hours = hours(t.duration_ms);
            t
        })
        .collect()
}

/// An artist's most played tracks (by play count), at most [`TOP_TRACKS`].
pub fn top_tracks(events: &[ListeningEvent], artist: &str, year: Option<i32>) -> Vec<TrackSummary> {
    let scope = TrackScope::artist(artist).in_year(year);
    rank(aggregate_tracks(events, &scope), Metric::Plays, Some(TOP_TRACKS))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongDetail {
    pub track_uri: String,
    pub name: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// `None` means all time.
    pub year: Option<i32>,
    pub plays: u64,
    pub duration_ms: u64,
    pub hours: f64,
    /// Percentage of all listening time in the same period.
    pub share_of_period: f64,
}

/// Totals for one track URI, in one UTC year or over all time.
pub fn song_detail(events: &[ListeningEvent], track_uri: &str, year: Option<i32>) -> SongDetail {
    let in_period = |e: &&ListeningEvent| year.is_none_or(|y| e.year() == y);

    let period_ms: u64 = events.iter().filter(in_period).map(|e| e.duration_ms).sum();
    let plays: Vec<&ListeningEvent> = events
        .iter()
        .filter(in_period)
        .filter(|e| e.track_uri == track_uri)
        .collect();
    let duration_ms: u64 = plays.iter().map(|e| e.duration_ms).sum();
    let first = plays.first();

    let share_of_period = if period_ms > 0 {
        duration_ms as f64 / period_ms as f64 * 100.0
    } else {
        0.0
    };

    SongDetail {
        track_uri: track_uri.to_string(),
        name: first.map_or(crate::UNKNOWN_TRACK, |e| e.track_key()).to_string(),
        artist: first.and_then(|e| e.artist_name.clone()),
        album: first.and_then(|e| e.album_name.clone()),
        year,
        plays: plays.len() as u64,
        duration_ms,
        hours: hours(duration_ms),
        share_of_period,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::play;
    use super::*;

    #[test]
    fn test_top_tracks_by_play_count() {
        let mut events = Vec::new();
        for _ in 0..3 {
            events.push(play("A", "X", "Often", (2024, 1, 1), 1000));
        }
        events.push(play("A", "X", "Once", (2024, 1, 1), 10_000_000));
        events.push(play("B", "X", "Other Artist", (2024, 1, 1), 1000));

        let out = top_tracks(&events, "A", None);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "Often");
        assert_eq!(out[0].plays, 3);
        assert_eq!(out[1].name, "Once");
    }

    #[test]
    fn test_top_tracks_truncates_to_ten() {
        let events: Vec<ListeningEvent> = (0..15)
            .map(|i| play("A", "X", &format!("Track {i}"), (2024, 1, 1), 1000))
            .collect();
        let out = top_tracks(&events, "A", None);
        assert_eq!(out.len(), TOP_TRACKS);
        // All tied at one play: input order survives
        assert_eq!(out[0].name, "Track 0");
        assert_eq!(out[9].name, "Track 9");
    }

    #[test]
    fn test_tied_tracks_keep_input_order() {
        let mut events = Vec::new();
        for _ in 0..5 {
            events.push(play("A", "X", "Earlier", (2024, 1, 1), 1000));
        }
        for _ in 0..5 {
            events.push(play("A", "X", "Later", (2024, 1, 1), 1000));
        }
        events.push(play("A", "X", "Later", (2023, 1, 1), 1000));

        let out = top_tracks(&events, "A", Some(2024));
        assert_eq!(out[0].name, "Earlier");
        assert_eq!(out[1].name, "Later");
        assert_eq!(out[1].plays, 5);
    }

    #[test]
    fn test_top_tracks_artist_must_match_exactly() {
        let events = vec![play("Low", "X", "t", (2024, 1, 1), 1000)];
        assert!(top_tracks(&events, "low", None).is_empty());
        assert!(top_tracks(&[], "Low", None).is_empty());
    }

    #[test]
    fn test_aggregate_tracks_album_scope() {
        let events = vec![
            play("A", "Album", "one", (2024, 1, 1), 2000),
            play("A", "Album", "two", (2024, 1, 1), 1000),
            play("A", "Album", "one", (2023, 1, 1), 1000),
            play("A", "Other", "three", (2024, 1, 1), 1000),
        ];
        let out = aggregate_tracks(&events, &TrackScope::album("Album").in_year(Some(2024)));
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "one");
        assert_eq!(out[0].duration_ms, 2000);
        assert_eq!(out[0].plays, 1);
    }

    #[test]
    fn test_song_detail_share_of_year() {
        let events = vec![
            play("A", "X", "Song", (2024, 1, 1), 1_000_000),
            play("A", "X", "Song", (2024, 2, 1), 1_000_000),
            play("B", "Y", "Else", (2024, 3, 1), 2_000_000),
            play("A", "X", "Song", (2023, 3, 1), 5_000_000),
        ];
        let d = song_detail(&events, "spotify:track:song", Some(2024));
        assert_eq!(d.name, "Song");
        assert_eq!(d.plays, 2);
        assert_eq!(d.duration_ms, 2_000_000);
        assert!((d.share_of_period - 50.0).abs() < 1e-9);

        let all = song_detail(&events, "spotify:track:song", None);
        assert_eq!(all.plays, 3);
        assert!((all.share_of_period - 7.0 / 9.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_song_detail_unknown_track() {
        let d = song_detail(&[], "spotify:track:none", Some(2024));
        assert_eq!(d.plays, 0);
        assert_eq!(d.share_of_period, 0.0);
        assert_eq!(d.name, crate::UNKNOWN_TRACK);
    }
}
