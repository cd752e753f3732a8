//! Time-series buckets: Sunday-aligned weeks, UTC days, per-album
//! cumulative weekly hours and the yearly day grid.
//!
//! Weeks start at local midnight on Sunday, so the week functions take the
//! time zone the caller renders in. Days are UTC calendar days.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use super::{Buckets, hours};
use crate::records::ListeningEvent;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekBucket {
    /// The Sunday that opens the week, in the caller's time zone.
    pub week_start: NaiveDate,
    /// Local midnight of `week_start` as an instant.
    pub starts_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub hours: f64,
    /// Plays in the week, oldest first.
    pub events: Vec<ListeningEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayBucket {
    pub day: NaiveDate,
    pub duration_ms: u64,
    pub hours: f64,
    /// Plays on the day, oldest first.
    pub events: Vec<ListeningEvent>,
}

/// Sunday of the local week containing `ts`.
pub fn week_start<Tz: TimeZone>(ts: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    let date = ts.with_timezone(tz).date_naive();
    let back = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(back)).unwrap_or(date)
}

/// Local midnight of `date`. Falls back to UTC midnight when the zone skips
/// midnight that day.
fn local_midnight<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Events sorted by timestamp; equal timestamps keep input order.
fn chronological(events: &[ListeningEvent]) -> Vec<&ListeningEvent> {
    let mut sorted: Vec<&ListeningEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.timestamp);
    sorted
}

/// Group plays into Sunday-aligned local weeks, oldest week first.
pub fn weekly_buckets<Tz: TimeZone>(events: &[ListeningEvent], tz: &Tz) -> Vec<WeekBucket> {
    let mut weeks: BTreeMap<NaiveDate, WeekBucket> = BTreeMap::new();

    for e in chronological(events) {
        let start = week_start(&e.timestamp, tz);
        let bucket = weeks.entry(start).or_insert_with(|| WeekBucket {
            week_start: start,
            starts_at: local_midnight(start, tz),
            duration_ms: 0,
            hours: 0.0,
            events: Vec::new(),
        });
        bucket.duration_ms += e.duration_ms;
        bucket.events.push(e.clone());
    }

    weeks
        .into_values()
        .map(|mut w| {
            w.hours = hours(w.duration_ms);
            w
        })
        .collect()
}

/// Group plays by UTC calendar day, oldest day first.
pub fn daily_buckets(events: &[ListeningEvent]) -> Vec<DayBucket> {
    let mut days: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();

    for e in chronological(events) {
        let bucket = days.entry(e.day()).or_insert_with(|| DayBucket {
            day: e.day(),
            duration_ms: 0,
            hours: 0.0,
            events: Vec::new(),
        });
        bucket.duration_ms += e.duration_ms;
        bucket.events.push(e.clone());
    }

    days.into_values()
        .map(|mut d| {
            d.hours = hours(d.duration_ms);
            d
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumSeries {
    pub album: String,
    /// Running total of hours, one value per week of the axis.
    pub cumulative_hours: Vec<f64>,
}

/// Cumulative listening per album over a shared weekly axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AlbumCumulative {
    pub weeks: Vec<NaiveDate>,
    /// Albums in first-seen order.
    pub albums: Vec<AlbumSeries>,
}

pub fn album_cumulative<Tz: TimeZone>(events: &[ListeningEvent], tz: &Tz) -> AlbumCumulative {
    let mut per_week: BTreeMap<NaiveDate, HashMap<&str, u64>> = BTreeMap::new();
    let mut order: Buckets<String> = Buckets::new();

    for e in events {
        order.entry(e.album_key(), || e.album_key().to_string());
        *per_week
            .entry(week_start(&e.timestamp, tz))
            .or_default()
            .entry(e.album_key())
            .or_insert(0) += e.duration_ms;
    }

    let albums = order
        .into_vec()
        .into_iter()
        .map(|album| {
            let mut running = 0u64;
            let cumulative_hours = per_week
                .values()
                .map(|week| {
                    running += week.get(album.as_str()).copied().unwrap_or(0);
                    hours(running)
                })
                .collect();
            AlbumSeries { album, cumulative_hours }
        })
        .collect();

    AlbumCumulative {
        weeks: per_week.keys().copied().collect(),
        albums,
    }
}

/// One day of the yearly heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub date: NaiveDate,
    /// 0 = Sunday.
    pub weekday: u32,
    /// Sunday-based week of the year; the week holding Jan 1 is 0.
    pub week: u32,
    pub hours: f64,
}

/// Every UTC day of `year`, with the hours played that day. Plays from
/// other years are ignored.
pub fn year_heatmap(events: &[ListeningEvent], year: i32) -> Vec<HeatmapCell> {
    let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };

    let mut day_ms: HashMap<NaiveDate, u64> = HashMap::new();
    for e in events.iter().filter(|e| e.year() == year) {
        *day_ms.entry(e.day()).or_insert(0) += e.duration_ms;
    }

    let offset = jan1.weekday().num_days_from_sunday();
    jan1.iter_days()
        .take_while(|d| d.year() == year)
        .map(|date| HeatmapCell {
            date,
            weekday: date.weekday().num_days_from_sunday(),
            week: (date.ordinal0() + offset) / 7,
            hours: hours(day_ms.get(&date).copied().unwrap_or(0)),
        })
        .collect()
}

/// Earliest play; the first in input order wins a tie.
pub fn first_play(events: &[ListeningEvent]) -> Option<&ListeningEvent> {
    events.iter().min_by_key(|e| e.timestamp)
}
