//! Query scopes and the single recompute entry point.
//!
//! A presentation layer never holds aggregation state: it builds a
//! [`QueryScope`] describing what is on screen and calls [`recompute`]
//! again whenever the user narrows or widens it.

use chrono::{NaiveDate, TimeZone};
use serde::Serialize;

use crate::aggregate::{
    self, AlbumCumulative, AlbumSummary, ArtistSummary, HeatmapCell, SongDetail, TrackScope, TrackSummary,
    WeekBucket,
};
use crate::filter::{self, YearWindow};
use crate::rank::{Metric, ThresholdPolicy, rank};
use crate::records::ListeningEvent;

/// What the view is focused on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Focus {
    /// Artists ranked over the window.
    Overview,
    /// Top artists, albums and songs of one year.
    Year { year: i32 },
    /// Albums and top tracks of one artist, optionally in one year.
    Artist { name: String, year: Option<i32> },
    /// Weekly history of the artist matching `query`.
    ArtistTimeline { query: String },
    /// Tracks of one album in one year.
    Album { name: String, year: i32 },
    /// One track, in one year or all time.
    Song { track_uri: String, year: Option<i32> },
    /// What an artist played during one week.
    Week { artist: String, week_start: NaiveDate },
}

/// Immutable description of one recomputation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryScope {
    pub window: YearWindow,
    pub query: Option<String>,
    pub metric: Metric,
    pub top_n: Option<usize>,
    pub thresholds: ThresholdPolicy,
    pub focus: Focus,
}

impl QueryScope {
    /// Overview of `window`, ranked by hours, no query, no limit.
    pub fn new(window: YearWindow) -> Self {
        Self {
            window,
            query: None,
            metric: Metric::Hours,
            top_n: None,
            thresholds: ThresholdPolicy::default(),
            focus: Focus::Overview,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.trim().is_empty());
        self
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_top_n(mut self, top_n: Option<usize>) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdPolicy) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Same scope, different focus: how a click narrows the view.
    pub fn focus(&self, focus: Focus) -> Self {
        Self {
            focus,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearDeepDive {
    pub year: i32,
    pub metric: Metric,
    pub artists: Vec<ArtistSummary>,
    pub albums: Vec<AlbumSummary>,
    pub songs: Vec<TrackSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistDetail {
    pub artist: String,
    pub year: Option<i32>,
    pub albums: Vec<AlbumSummary>,
    pub top_tracks: Vec<TrackSummary>,
    /// Daily grid of the artist's plays; empty without a year.
    pub heatmap: Vec<HeatmapCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistTimeline {
    pub query: String,
    /// Artist name as it appears in the data; `None` when nothing matched.
    pub artist: Option<String>,
    pub weeks: Vec<WeekBucket>,
    pub cumulative: AlbumCumulative,
    pub first_play: Option<ListeningEvent>,
    pub albums: Vec<AlbumSummary>,
    pub top_tracks: Vec<TrackSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlbumDetail {
    pub album: String,
    pub year: i32,
    /// Tracks ranked by hours.
    pub tracks: Vec<TrackSummary>,
    pub heatmap: Vec<HeatmapCell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekDetail {
    pub artist: String,
    pub week_start: NaiveDate,
    pub hours: f64,
    /// Tracks ranked by plays.
    pub tracks: Vec<TrackSummary>,
}

/// Everything a view needs for one scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum AggregationResult {
    Overview { window: YearWindow, artists: Vec<ArtistSummary> },
    Year(YearDeepDive),
    Artist(ArtistDetail),
    ArtistTimeline(ArtistTimeline),
    Album(AlbumDetail),
    Song(SongDetail),
    Week(WeekDetail),
}

/// Recompute the aggregation for `scope` from scratch.
///
/// Pure: reads `events`, returns owned data. `tz` decides where weeks
/// start; everything else is UTC.
pub fn recompute<Tz: TimeZone>(events: &[ListeningEvent], scope: &QueryScope, tz: &Tz) -> AggregationResult {
    log::debug!("Recomputing {:?} over {} events", scope.focus, events.len());

    match &scope.focus {
        Focus::Overview => {
            let filtered = filter::filter(events, scope.window, scope.query.as_deref());
            let artists = aggregate::aggregate_by_artist(&filtered, scope.window);
            AggregationResult::Overview {
                window: scope.window,
                artists: rank(artists, scope.metric, scope.top_n),
            }
        }
        Focus::Year { year } => AggregationResult::Year(year_deep_dive(events, *year, scope)),
        Focus::Artist { name, year } => AggregationResult::Artist(artist_detail(events, name, *year)),
        Focus::ArtistTimeline { query } => AggregationResult::ArtistTimeline(artist_timeline(events, query, tz)),
        Focus::Album { name, year } => {
            let album_scope = TrackScope::album(name).in_year(Some(*year));
            let album_events: Vec<ListeningEvent> =
                events.iter().filter(|e| album_scope.matches(e)).cloned().collect();
            AggregationResult::Album(AlbumDetail {
                album: name.clone(),
                year: *year,
                tracks: rank(aggregate::aggregate_tracks(&album_events, &TrackScope::default()), Metric::Hours, None),
                heatmap: aggregate::year_heatmap(&album_events, *year),
            })
        }
        Focus::Song { track_uri, year } => AggregationResult::Song(aggregate::song_detail(events, track_uri, *year)),
        Focus::Week { artist, week_start } => AggregationResult::Week(week_detail(events, artist, *week_start, tz)),
    }
}

fn year_deep_dive(events: &[ListeningEvent], year: i32, scope: &QueryScope) -> YearDeepDive {
    let policy = &scope.thresholds;
    let limit = Some(policy.list_limit);
    // A single year has no recency weighting to rank by
    let metric = match scope.metric {
        Metric::Plays => Metric::Plays,
        Metric::Hours | Metric::AdjustedHours => Metric::Hours,
    };

    let year_events = filter::in_year(events, year);

    let artists = keep(
        aggregate::aggregate_by_artist(&year_events, YearWindow::single(year)),
        |a| policy.keep_artist(a),
    );
    let albums = keep(aggregate::aggregate_albums(&year_events, None, Some(year)), |a| {
        policy.keep_album(a)
    });
    let songs = keep(
        aggregate::aggregate_tracks(&year_events, &TrackScope::default()),
        |t| policy.keep_song(t),
    );

    YearDeepDive {
        year,
        metric,
        artists: rank(artists, metric, limit),
        albums: rank(albums, metric, limit),
        songs: rank(songs, metric, limit),
    }
}

fn keep<T>(mut items: Vec<T>, pred: impl Fn(&T) -> bool) -> Vec<T> {
    items.retain(|i| pred(i));
    items
}

fn artist_detail(events: &[ListeningEvent], name: &str, year: Option<i32>) -> ArtistDetail {
    let heatmap = match year {
        Some(y) => {
            let scope = TrackScope::artist(name);
            let artist_events: Vec<ListeningEvent> = events.iter().filter(|e| scope.matches(e)).cloned().collect();
            aggregate::year_heatmap(&artist_events, y)
        }
        None => Vec::new(),
    };

    ArtistDetail {
        artist: name.to_string(),
        year,
        albums: aggregate::aggregate_albums(events, Some(name), year),
        top_tracks: aggregate::top_tracks(events, name, year),
        heatmap,
    }
}

fn artist_timeline<Tz: TimeZone>(events: &[ListeningEvent], query: &str, tz: &Tz) -> ArtistTimeline {
    let matched = filter::resolve_artist(events, query);
    let artist = matched.first().map(|e| e.artist_key().to_string());

    let (albums, top_tracks) = match artist.as_deref() {
        Some(name) => (
            aggregate::aggregate_albums(events, Some(name), None),
            aggregate::top_tracks(events, name, None),
        ),
        None => (Vec::new(), Vec::new()),
    };

    ArtistTimeline {
        query: query.to_string(),
        artist,
        weeks: aggregate::weekly_buckets(&matched, tz),
        cumulative: aggregate::album_cumulative(&matched, tz),
        first_play: aggregate::first_play(&matched).cloned(),
        albums,
        top_tracks,
    }
}

fn week_detail<Tz: TimeZone>(
    events: &[ListeningEvent],
    artist: &str,
    week_start: NaiveDate,
    tz: &Tz,
) -> WeekDetail {
    let matched = filter::resolve_artist(events, artist);
    let week = aggregate::weekly_buckets(&matched, tz)
        .into_iter()
        .find(|w| w.week_start == week_start);

    let (hours, tracks) = match week {
        Some(w) => (
            w.hours,
            rank(aggregate::aggregate_tracks(&w.events, &TrackScope::default()), Metric::Plays, None),
        ),
        None => (0.0, Vec::new()),
    };

    WeekDetail {
        artist: artist.to_string(),
        week_start,
        hours,
        tracks,
    }
}
