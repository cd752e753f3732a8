use serde::Serialize;

use super::{Buckets, hours};
use crate::rank::{Metric, Ranked, rank};
use crate::records::ListeningEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumSummary {
    pub album: String,
    /// Artist of the first play seen for this album.
    pub artist: Option<String>,
    /// Track URI of the first play seen, for linking out.
    pub track_uri: String,
    pub duration_ms: u64,
    pub plays: u64,
    pub hours: f64,
}

impl Ranked for AlbumSummary {
    fn hours(&self) -> f64 {
        self.hours
    }

    fn plays(&self) -> u64 {
        self.plays
    }
}

/// Group plays by album, optionally scoped to one artist and/or one UTC
/// year. Sorted by hours, descending; ties keep first-seen order.
pub fn aggregate_albums(events: &[ListeningEvent], artist: Option<&str>, year: Option<i32>) -> Vec<AlbumSummary> {
    let mut buckets = Buckets::new();

    for e in events {
        if artist.is_some_and(|a| e.artist_key() != a) {
            continue;
        }
        if year.is_some_and(|y| e.year() != y) {
            continue;
        }

        let entry = buckets.entry(e.album_key(), || AlbumSummary {
            album: e.album_key().to_string(),
            artist: e.artist_name.clone(),
            track_uri: e.track_uri.clone(),
            duration_ms: 0,
            plays: 0,
            hours: 0.0,
        });
        entry.duration_ms += e.duration_ms;
        entry.plays += 1;
    }

    let albums = buckets
        .into_vec()
        .into_iter()
        .map(|mut a| {
            a.hours = hours(a.duration_ms);
            a
        })
        .collect();

    rank(albums, Metric::Hours, None)
}
