use serde::Serialize;

use crate::records::ListeningEvent;

/// Widest year window accepted from user input.
pub const MAX_WINDOW_YEARS: usize = 200;

/// Inclusive range of calendar years (UTC).
///
/// An inverted window (`end < start`) is empty: it contains no years and
/// matches no events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearWindow {
    pub start: i32,
    pub end: i32,
}

impl YearWindow {
    pub fn new(start: i32, end: i32) -> Self {
        Self { start, end }
    }

    /// Window covering a single year.
    pub fn single(year: i32) -> Self {
        Self { start: year, end: year }
    }

    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }

    /// Number of years covered; 0 for an inverted window.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (i64::from(self.end) - i64::from(self.start) + 1) as usize
        }
    }

    /// Wider than [`MAX_WINDOW_YEARS`]. Every artist carries one entry per
    /// window year, so such a window is refused before aggregating.
    pub fn is_too_wide(&self) -> bool {
        self.len() > MAX_WINDOW_YEARS
    }

    /// Every year of the window, ascending.
    pub fn years(&self) -> impl Iterator<Item = i32> + use<> {
        self.start..=self.end
    }

    /// Parse "2019" or "2019-2024".
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Some((start, end)) = s.split_once('-') {
            let start = start.trim().parse().ok()?;
            let end = end.trim().parse().ok()?;
            return Some(Self::new(start, end));
        }
        s.parse().ok().map(Self::single)
    }
}

/// Narrow `events` to the year window and an optional artist query.
///
/// The query is a trimmed, case-insensitive substring match on the artist
/// name. An empty query matches everything; a play with no artist never
/// matches a non-empty query. Relative order is preserved.
pub fn filter(events: &[ListeningEvent], window: YearWindow, query: Option<&str>) -> Vec<ListeningEvent> {
    let q = query.map(|q| q.trim().to_lowercase()).unwrap_or_default();

    events
        .iter()
        .filter(|e| window.contains(e.year()))
        .filter(|e| q.is_empty() || matches_artist(e, &q))
        .cloned()
        .collect()
}

/// Events of a single UTC year.
pub fn in_year(events: &[ListeningEvent], year: i32) -> Vec<ListeningEvent> {
    filter(events, YearWindow::single(year), None)
}

/// Select the plays of one artist for a deep dive.
///
/// Exact (case-insensitive) artist name first; when nothing matches
/// exactly, fall back to a substring match.
pub fn resolve_artist(events: &[ListeningEvent], name: &str) -> Vec<ListeningEvent> {
    let q = name.trim().to_lowercase();
    if q.is_empty() {
        return Vec::new();
    }

    let exact: Vec<ListeningEvent> = events
        .iter()
        .filter(|e| e.artist_name.as_deref().is_some_and(|a| a.to_lowercase() == q))
        .cloned()
        .collect();
    if !exact.is_empty() {
        return exact;
    }

    log::debug!("No exact artist match for \"{}\", trying substring", name);
    events.iter().filter(|e| matches_artist(e, &q)).cloned().collect()
}

/// `needle` must already be lowercase.
fn matches_artist(event: &ListeningEvent, needle: &str) -> bool {
    event
        .artist_name
        .as_deref()
        .is_some_and(|a| a.to_lowercase().contains(needle))
}
