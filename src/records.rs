//! Canonical listening events and normalization of raw export records.
//!
//! Raw input is whatever the streaming service exported: a JSON array of
//! play records, or an object wrapping that array under `records`.
//! Normalization is best-effort: malformed elements are dropped, never
//! reported as errors.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{MS_PER_HOUR, UNKNOWN_ALBUM, UNKNOWN_ARTIST, UNKNOWN_TRACK};

/// One recorded play of a track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListeningEvent {
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
    pub track_uri: String,
    pub track_name: Option<String>,
    pub album_name: Option<String>,
    pub artist_name: Option<String>,
}

impl ListeningEvent {
    /// A play with no duration and no metadata.
    pub fn new(timestamp: DateTime<Utc>, track_uri: impl Into<String>) -> Self {
        Self {
            timestamp,
            duration_ms: 0,
            track_uri: track_uri.into(),
            track_name: None,
            album_name: None,
            artist_name: None,
        }
    }

    pub fn with_duration_ms(mut self, ms: u64) -> Self {
        self.duration_ms = ms;
        self
    }

    pub fn with_track(mut self, name: impl Into<String>) -> Self {
        self.track_name = non_empty(Some(name.into()));
        self
    }

    pub fn with_album(mut self, name: impl Into<String>) -> Self {
        self.album_name = non_empty(Some(name.into()));
        self
    }

    pub fn with_artist(mut self, name: impl Into<String>) -> Self {
        self.artist_name = non_empty(Some(name.into()));
        self
    }

    /// Calendar year of the play, in UTC.
    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }

    /// Calendar day of the play, in UTC.
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    pub fn hours(&self) -> f64 {
        self.duration_ms as f64 / MS_PER_HOUR
    }

    /// Artist grouping key; never empty.
    pub fn artist_key(&self) -> &str {
        self.artist_name.as_deref().unwrap_or(UNKNOWN_ARTIST)
    }

    /// Album grouping key; never empty.
    pub fn album_key(&self) -> &str {
        self.album_name.as_deref().unwrap_or(UNKNOWN_ALBUM)
    }

    /// Track grouping key; never empty.
    pub fn track_key(&self) -> &str {
        self.track_name.as_deref().unwrap_or(UNKNOWN_TRACK)
    }
}

/// A play record as it appears in the export.
///
/// Field names follow the Spotify extended streaming history; the aliases
/// accept records that were already reshaped by another tool. Only the URI
/// and timestamp can reject a record; the other fields degrade to absent.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default, alias = "track_uri")]
    spotify_track_uri: Option<String>,
    #[serde(default, alias = "timestamp")]
    ts: Option<RawTimestamp>,
    #[serde(default, alias = "duration_ms", deserialize_with = "lenient_ms")]
    ms_played: Option<u64>,
    #[serde(default, alias = "track_name", deserialize_with = "lenient_text")]
    master_metadata_track_name: Option<String>,
    #[serde(default, alias = "album_name", deserialize_with = "lenient_text")]
    master_metadata_album_album_name: Option<String>,
    #[serde(default, alias = "artist_name", deserialize_with = "lenient_text")]
    master_metadata_album_artist_name: Option<String>,
}

/// Any JSON number (integer or float) as milliseconds, negatives clamped
/// to 0. Numeric strings are accepted too; anything else is absent.
fn lenient_ms<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    let ms = match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i.max(0) as u64))
            .or_else(|| n.as_f64().map(clamp_ms)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(clamp_ms),
        _ => None,
    };
    Ok(ms)
}

fn clamp_ms(ms: f64) -> u64 {
    if ms.is_finite() && ms > 0.0 { ms as u64 } else { 0 }
}

/// Strings pass through; any other JSON value is absent.
fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// A timestamp is either text or an already-materialized instant
/// (epoch milliseconds).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(i64),
    Text(String),
}

impl RawTimestamp {
    fn resolve(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            Self::Text(s) => parse_timestamp(s),
        }
    }
}

/// Naive layouts tried after RFC 3339; all are read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parse an export timestamp into a UTC instant.
/// Handles: "2024-01-01T12:00:00Z", "2024-01-01T12:00:00+02:00",
/// "2024-01-01T12:00:00", "2024-01-01 12:00:00", "2024-01-01".
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// Result of normalizing one source.
#[derive(Debug, Default)]
pub struct Normalized {
    pub events: Vec<ListeningEvent>,
    /// Elements that were present but unusable.
    pub dropped: usize,
}

/// Normalize raw export JSON into listening events.
pub fn normalize(value: Value) -> Vec<ListeningEvent> {
    normalize_counted(value).events
}

/// Same as [`normalize`], also counting dropped elements.
pub fn normalize_counted(value: Value) -> Normalized {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("records") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    let total = items.len();
    let events: Vec<ListeningEvent> = items.into_iter().filter_map(event_from_value).collect();
    let dropped = total - events.len();
    if dropped > 0 {
        log::debug!("Dropped {} of {} records (no track URI or bad timestamp)", dropped, total);
    }
    Normalized { events, dropped }
}

/// Parse JSON text and normalize it. Fails only if the text is not JSON.
pub fn normalize_str(text: &str) -> serde_json::Result<Normalized> {
    let value: Value = serde_json::from_str(text)?;
    Ok(normalize_counted(value))
}

fn event_from_value(item: Value) -> Option<ListeningEvent> {
    let raw: RawRecord = serde_json::from_value(item).ok()?;
    let track_uri = non_empty(raw.spotify_track_uri)?;
    let timestamp = raw.ts.as_ref()?.resolve()?;

    Some(ListeningEvent {
        timestamp,
        duration_ms: raw.ms_played.unwrap_or(0),
        track_uri,
        track_name: non_empty(raw.master_metadata_track_name),
        album_name: non_empty(raw.master_metadata_album_album_name),
        artist_name: non_empty(raw.master_metadata_album_artist_name),
    })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

/// Web player link for a track URI (`spotify:track:<id>` → open.spotify.com).
pub fn track_link(uri: &str) -> Option<String> {
    let id = uri.rsplit(':').next().filter(|id| !id.is_empty())?;
    Some(format!("https://open.spotify.com/track/{id}"))
}
