//! Per-artist yearly totals and the recency-weighted "adjusted hours" score.
//!
//! Each artist gets a dense year axis covering the whole window, raw hours
//! per year, and hours per year multiplied by a recency weight:
//!
//! `w(y) = exp(-0.725 · ln(max(1, end − y)))` for `end − y ≥ 0`, else `1`.
//!
//! The weight is exactly 1 for the last two years of the window (diff 0 and
//! diff 1 both give `ln 1 = 0`); decay starts at diff 2 (≈ 0.6057) and keeps
//! falling super-linearly. Years after `end` are never down-weighted.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::{Buckets, hours};
use crate::filter::YearWindow;
use crate::rank::Ranked;
use crate::records::ListeningEvent;

/// Decay exponent of the recency weight.
pub const RECENCY_DECAY: f64 = 0.725;

/// Recency weight of `year` relative to the window's last year.
pub fn recency_weight(year: i32, end_year: i32) -> f64 {
    let diff = end_year - year;
    if diff >= 0 {
        (-RECENCY_DECAY * f64::from(diff.max(1)).ln()).exp()
    } else {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistSummary {
    pub artist: String,
    /// Every play of the artist in the input, whatever its year.
    pub plays: u64,
    /// Sum of the window's yearly hours.
    pub total_hours: f64,
    /// Raw hours per year; every window year is present.
    pub years: BTreeMap<i32, f64>,
    /// Recency-weighted hours per year; same keys as `years`.
    pub adjusted_years: BTreeMap<i32, f64>,
    pub adjusted_hours: f64,
}

impl Ranked for ArtistSummary {
    fn hours(&self) -> f64 {
        self.total_hours
    }

    fn plays(&self) -> u64 {
        self.plays
    }

    fn adjusted_hours(&self) -> f64 {
        self.adjusted_hours
    }
}

struct ArtistAcc {
    artist: String,
    plays: u64,
    year_ms: HashMap<i32, u64>,
}

/// Group plays by artist and compute yearly and recency-weighted hours over
/// `window`. Artists come back in first-seen order.
pub fn aggregate_by_artist(events: &[ListeningEvent], window: YearWindow) -> Vec<ArtistSummary> {
    let mut buckets = Buckets::new();

    for e in events {
        let acc = buckets.entry(e.artist_key(), || ArtistAcc {
            artist: e.artist_key().to_string(),
            plays: 0,
            year_ms: HashMap::new(),
        });
        acc.plays += 1;
        *acc.year_ms.entry(e.year()).or_insert(0) += e.duration_ms;
    }

    buckets
        .into_vec()
        .into_iter()
        .map(|acc| summarize(acc, window))
        .collect()
}

fn summarize(acc: ArtistAcc, window: YearWindow) -> ArtistSummary {
    let mut years = BTreeMap::new();
    let mut adjusted_years = BTreeMap::new();
    let mut total_ms = 0u64;
    let mut adjusted_hours = 0.0;

    for y in window.years() {
        let ms = acc.year_ms.get(&y).copied().unwrap_or(0);
        total_ms += ms;
        let raw = hours(ms);
        let weighted = raw * recency_weight(y, window.end);
        years.insert(y, raw);
        adjusted_years.insert(y, weighted);
        adjusted_hours += weighted;
    }

    ArtistSummary {
        artist: acc.artist,
        plays: acc.plays,
        total_hours: hours(total_ms),
        years,
        adjusted_years,
        adjusted_hours,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::play;
    use super::*;
    use crate::UNKNOWN_ARTIST;
    use crate::filter::filter;
    use chrono::{TimeZone, Utc};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_weight_is_one_for_last_two_years() {
        assert_eq!(recency_weight(2025, 2025), 1.0);
        assert_eq!(recency_weight(2024, 2025), 1.0);
    }

    #[test]
    fn test_weight_decays_from_diff_two() {
        let w2 = recency_weight(2023, 2025);
        assert!((w2 - (-0.725 * 2f64.ln()).exp()).abs() < EPS);
        assert!((w2 - 0.6057).abs() < 1e-4);
        let w5 = recency_weight(2020, 2025);
        assert!(w5 < w2);
        assert!((w5 - 5f64.powf(-0.725)).abs() < EPS);
    }

    #[test]
    fn test_future_year_gets_full_weight() {
        assert_eq!(recency_weight(2027, 2025), 1.0);
    }

    #[test]
    fn test_two_year_scenario() {
        let events = vec![
            play("A", "X", "t", (2024, 1, 1), 600_000),
            play("A", "X", "t", (2025, 1, 1), 1_200_000),
        ];
        let out = aggregate_by_artist(&events, YearWindow::new(2024, 2025));
        assert_eq!(out.len(), 1);
        let a = &out[0];
        assert_eq!(a.artist, "A");
        assert_eq!(a.plays, 2);
        assert!((a.total_hours - 0.5).abs() < EPS);
        assert!((a.years[&2024] - 1.0 / 6.0).abs() < EPS);
        assert!((a.years[&2025] - 1.0 / 3.0).abs() < EPS);
        assert_eq!(a.adjusted_years[&2024], a.years[&2024]);
        assert_eq!(a.adjusted_years[&2025], a.years[&2025]);
        assert!((a.adjusted_hours - 0.5).abs() < EPS);
    }

    #[test]
    fn test_year_axis_is_dense() {
        let events = vec![
            play("A", "X", "t", (2019, 3, 1), 1000),
            play("B", "X", "t", (2022, 3, 1), 1000),
        ];
        let window = YearWindow::new(2018, 2023);
        let out = aggregate_by_artist(&filter(&events, window, None), window);
        for summary in &out {
            let keys: Vec<i32> = summary.years.keys().copied().collect();
            assert_eq!(keys, (2018..=2023).collect::<Vec<_>>());
            let adj_keys: Vec<i32> = summary.adjusted_years.keys().copied().collect();
            assert_eq!(adj_keys, keys);
        }
        assert_eq!(out[0].years[&2020], 0.0);
    }

    #[test]
    fn test_hours_are_conserved_per_year() {
        let events = vec![
            play("A", "X", "t1", (2021, 1, 5), 123_456),
            play("B", "Y", "t2", (2021, 2, 5), 654_321),
            play("C", "Z", "t3", (2021, 3, 5), 1_000_000),
            play("A", "X", "t1", (2022, 1, 5), 42),
        ];
        let window = YearWindow::new(2020, 2022);
        let out = aggregate_by_artist(&events, window);
        let sum_2021: f64 = out.iter().map(|a| a.years[&2021]).sum();
        let expected = (123_456 + 654_321 + 1_000_000) as f64 / 3_600_000.0;
        assert!((sum_2021 - expected).abs() < EPS);
    }

    #[test]
    fn test_adjusted_hours_weights_older_years() {
        let events = vec![
            play("A", "X", "t", (2020, 6, 1), 3_600_000),
            play("A", "X", "t", (2022, 6, 1), 3_600_000),
        ];
        let out = aggregate_by_artist(&events, YearWindow::new(2020, 2022));
        let a = &out[0];
        assert!((a.total_hours - 2.0).abs() < EPS);
        let expected = 1.0 + recency_weight(2020, 2022);
        assert!((a.adjusted_hours - expected).abs() < EPS);
        assert!(a.adjusted_hours < a.total_hours);
    }

    #[test]
    fn test_missing_artist_groups_under_sentinel() {
        let anon = ListeningEvent::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(), "spotify:track:z")
            .with_duration_ms(1000);
        let events = vec![anon.clone(), anon];
        let out = aggregate_by_artist(&events, YearWindow::single(2024));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].artist, UNKNOWN_ARTIST);
        assert_eq!(out[0].plays, 2);
    }

    #[test]
    fn test_first_seen_order() {
        let events = vec![
            play("B", "X", "t", (2024, 1, 1), 1),
            play("A", "X", "t", (2024, 1, 2), 1),
            play("B", "X", "t", (2024, 1, 3), 1),
        ];
        let names: Vec<String> = aggregate_by_artist(&events, YearWindow::single(2024))
            .into_iter()
            .map(|a| a.artist)
            .collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_empty_input_and_inverted_window() {
        assert!(aggregate_by_artist(&[], YearWindow::new(2020, 2024)).is_empty());

        let events = vec![play("A", "X", "t", (2024, 1, 1), 1000)];
        let out = aggregate_by_artist(&events, YearWindow::new(2025, 2020));
        assert_eq!(out.len(), 1);
        assert!(out[0].years.is_empty());
        assert_eq!(out[0].total_hours, 0.0);
        assert_eq!(out[0].adjusted_hours, 0.0);
    }
}
