use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use earmark::aggregate::{AlbumSummary, ArtistSummary, HeatmapCell, TrackSummary};
use earmark::config::AppConfig;
use earmark::filter::{MAX_WINDOW_YEARS, YearWindow};
use earmark::rank::Metric;
use earmark::records::{self, ListeningEvent};
use earmark::scope::{self, AggregationResult, Focus, QueryScope};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "earmark", version, about = "Streaming-history listening analytics")]
struct Cli {
    /// Path to the config file (defaults to ~/.config/earmark/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum MetricName {
    Hours,
    #[value(alias = "adjusted")]
    AdjustedHours,
    Plays,
}

impl From<MetricName> for Metric {
    fn from(m: MetricName) -> Self {
        match m {
            MetricName::Hours => Metric::Hours,
            MetricName::AdjustedHours => Metric::AdjustedHours,
            MetricName::Plays => Metric::Plays,
        }
    }
}

fn metric_label(metric: Metric) -> &'static str {
    match metric {
        Metric::Hours => "hours",
        Metric::AdjustedHours => "adjusted hours",
        Metric::Plays => "plays",
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rank artists over a range of years
    Overview {
        /// Export files or directories (defaults to config data_paths)
        paths: Vec<PathBuf>,

        /// Year or year range (e.g., "2022" or "2020-2024")
        #[arg(long, conflicts_with_all = ["start", "end"])]
        years: Option<String>,

        /// First year of the window
        #[arg(long)]
        start: Option<i32>,

        /// Last year of the window
        #[arg(long)]
        end: Option<i32>,

        /// Only artists whose name contains this (case-insensitive)
        #[arg(short, long)]
        query: Option<String>,

        /// Which value to rank by
        #[arg(short, long, value_enum, default_value = "adjusted-hours")]
        metric: MetricName,

        /// Number of results (defaults to config top_n)
        #[arg(short = 'n', long)]
        top: Option<usize>,
    },

    /// Top artists, albums and songs of one year
    Year {
        year: i32,

        paths: Vec<PathBuf>,

        /// Rank by hours or plays
        #[arg(short, long, value_enum, default_value = "hours")]
        metric: MetricName,
    },

    /// Albums and top tracks of one artist
    Artist {
        /// Artist name (exact, case-sensitive)
        name: String,

        paths: Vec<PathBuf>,

        /// Restrict to one year
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// Weekly listening history of an artist
    Timeline {
        /// Artist name or part of it
        query: String,

        paths: Vec<PathBuf>,
    },

    /// Tracks of one album in one year
    Album {
        name: String,

        year: i32,

        paths: Vec<PathBuf>,
    },

    /// Play count and listening time of one track
    Song {
        /// Track URI (spotify:track:...)
        uri: String,

        paths: Vec<PathBuf>,

        /// Restrict to one year
        #[arg(short, long)]
        year: Option<i32>,
    },

    /// What an artist was played during one week
    Week {
        artist: String,

        /// Sunday the week starts on (YYYY-MM-DD)
        week_start: NaiveDate,

        paths: Vec<PathBuf>,
    },

    /// Strip private columns from raw exports and split them into chunks
    Clean {
        /// Directory holding the raw export files
        dir: PathBuf,

        /// Output file name; chunks are written as <stem>_N.json
        #[arg(short, long, default_value = "cleaned.json")]
        output: String,

        /// Maximum chunk size in megabytes (defaults to config)
        #[arg(long)]
        max_mb: Option<u64>,
    },

    /// Show collection statistics
    Stats {
        paths: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());
    let current_year = chrono::Local::now().year();

    let base = |window: YearWindow| -> Result<QueryScope> {
        if window.is_too_wide() {
            anyhow::bail!(
                "Year range {}-{} spans more than {} years",
                window.start,
                window.end,
                MAX_WINDOW_YEARS
            );
        }
        Ok(QueryScope::new(window)
            .with_thresholds(config.thresholds.clone())
            .with_top_n(Some(config.top_n)))
    };

    let (events, scope) = match cli.command {
        Commands::Clean { dir, output, max_mb } => {
            let mut opts = config.clean.clone();
            if let Some(mb) = max_mb {
                opts.max_chunk_mb = mb;
            }
            let result = earmark::clean::clean_exports(&dir, &output, &opts)
                .with_context(|| format!("Cleaning {} failed", dir.display()))?;
            println!(
                "Clean complete: {} files read, {} skipped, {} records kept, {} dropped",
                result.files_read, result.files_skipped, result.records_kept, result.records_dropped
            );
            for out in &result.outputs {
                println!("  {}", out.display());
            }
            return Ok(());
        }

        Commands::Stats { paths } => {
            let events = load_events(paths, &config)?;
            let stats = earmark::aggregate::library_stats(&events);
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("Listening Statistics");
            println!("====================");
            println!("Plays:            {}", stats.plays);
            println!("Total listening:  {:.1} hours", stats.total_hours);
            println!("Artists:          {}", stats.artists);
            println!("Albums:           {}", stats.albums);
            println!("Tracks:           {}", stats.tracks);
            if let (Some(first), Some(last)) = (stats.first_play, stats.last_play) {
                println!("Span:             {} to {}", first.date_naive(), last.date_naive());
            }
            println!();

            if !stats.hours_by_year.is_empty() {
                println!("Hours by year:");
                for (year, hours) in &stats.hours_by_year {
                    println!("  {:<6} {:>8.1}", year, hours);
                }
            }
            return Ok(());
        }

        Commands::Overview { paths, years, start, end, query, metric, top } => {
            let default = config.default_window(current_year);
            let window = match years {
                Some(y) => YearWindow::parse(&y)
                    .with_context(|| format!("Invalid year range \"{}\" (expected 2022 or 2020-2024)", y))?,
                None => YearWindow::new(start.unwrap_or(default.start), end.unwrap_or(default.end)),
            };
            let scope = base(window)?
                .with_query(query)
                .with_metric(metric.into())
                .with_top_n(Some(top.unwrap_or(config.top_n)));
            (load_events(paths, &config)?, scope)
        }

        Commands::Year { year, paths, metric } => {
            let scope = base(YearWindow::single(year))?
                .with_metric(metric.into())
                .focus(Focus::Year { year });
            (load_events(paths, &config)?, scope)
        }

        Commands::Artist { name, paths, year } => {
            let scope = base(config.default_window(current_year))?.focus(Focus::Artist { name, year });
            (load_events(paths, &config)?, scope)
        }

        Commands::Timeline { query, paths } => {
            let scope = base(config.default_window(current_year))?.focus(Focus::ArtistTimeline { query });
            (load_events(paths, &config)?, scope)
        }

        Commands::Album { name, year, paths } => {
            let scope = base(YearWindow::single(year))?.focus(Focus::Album { name, year });
            (load_events(paths, &config)?, scope)
        }

        Commands::Song { uri, paths, year } => {
            let scope = base(config.default_window(current_year))?.focus(Focus::Song { track_uri: uri, year });
            (load_events(paths, &config)?, scope)
        }

        Commands::Week { artist, week_start, paths } => {
            let scope = base(config.default_window(current_year))?.focus(Focus::Week { artist, week_start });
            (load_events(paths, &config)?, scope)
        }
    };

    let result = scope::recompute(&events, &scope, &chrono::Local);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result, &scope);
    Ok(())
}

/// Load events from `paths`, or from the config's `data_paths` when none
/// are given, showing loader status on a spinner.
fn load_events(paths: Vec<PathBuf>, config: &AppConfig) -> Result<Vec<ListeningEvent>> {
    // Resolve data paths: CLI args > config data_paths
    let paths = if !paths.is_empty() {
        paths
    } else if !config.data_paths.is_empty() {
        config.data_paths.clone()
    } else {
        anyhow::bail!("No data to load. Pass export files as arguments or set data_paths in config.");
    };

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let mut last_status = String::new();
    let result = earmark::loader::load_sources(&paths, config.resolve_workers(), &mut |msg: &str| {
        pb.set_message(msg.to_string());
        last_status = msg.to_string();
    });
    pb.finish_with_message(last_status.clone());

    if result.files_loaded == 0 {
        anyhow::bail!("{} ({} files failed)", last_status, result.files_failed);
    }
    log::info!(
        "{} events from {} files ({} failed, {} records dropped)",
        result.events.len(),
        result.files_loaded,
        result.files_failed,
        result.dropped
    );

    Ok(result.events)
}

fn print_result(result: &AggregationResult, scope: &QueryScope) {
    match result {
        AggregationResult::Overview { window, artists } => {
            if artists.is_empty() {
                println!("No listening found for {}-{}.", window.start, window.end);
                return;
            }
            println!(
                "Top {} artists {}-{} (sorted by {}):",
                artists.len(),
                window.start,
                window.end,
                metric_label(scope.metric)
            );
            println!();
            print_artist_table(artists, *window);
        }

        AggregationResult::Year(y) => {
            println!("{} (sorted by {})", y.year, metric_label(y.metric));
            println!();
            if y.artists.is_empty() && y.albums.is_empty() && y.songs.is_empty() {
                println!("No listening found for {}.", y.year);
                return;
            }
            println!("Artists:");
            print_artist_table(&y.artists, YearWindow::single(y.year));
            println!();
            println!("Albums:");
            print_album_table(&y.albums);
            println!();
            println!("Songs:");
            print_track_table(&y.songs);
        }

        AggregationResult::Artist(d) => {
            match d.year {
                Some(y) => println!("{} in {}", d.artist, y),
                None => println!("{} (all time)", d.artist),
            }
            println!();
            if d.albums.is_empty() {
                println!("No plays found for \"{}\".", d.artist);
                return;
            }
            println!("Albums:");
            print_album_table(&d.albums);
            println!();
            println!("Top tracks:");
            print_track_table(&d.top_tracks);
            if !d.heatmap.is_empty() {
                println!();
                print_heatmap_summary(&d.heatmap);
            }
        }

        AggregationResult::ArtistTimeline(t) => {
            let Some(artist) = &t.artist else {
                println!("No artist matching \"{}\".", t.query);
                return;
            };
            println!("{}", artist);
            if let Some(first) = &t.first_play {
                println!(
                    "First played {} ({})",
                    first.timestamp.date_naive(),
                    first.track_name.as_deref().unwrap_or(earmark::UNKNOWN_TRACK)
                );
            }
            println!();

            println!("{:<12} {:>7} {:>6}", "Week", "Hours", "Plays");
            println!("{}", "-".repeat(27));
            for w in &t.weeks {
                println!("{:<12} {:>7.2} {:>6}", w.week_start, w.hours, w.events.len());
            }
            println!();

            println!("Albums:");
            print_album_table(&t.albums);
            println!();
            println!("Top tracks:");
            print_track_table(&t.top_tracks);
        }

        AggregationResult::Album(a) => {
            println!("{} in {}", a.album, a.year);
            println!();
            if a.tracks.is_empty() {
                println!("No plays found.");
                return;
            }
            print_track_table(&a.tracks);
            println!();
            print_heatmap_summary(&a.heatmap);
        }

        AggregationResult::Song(s) => {
            if s.plays == 0 {
                println!("No plays of {}.", s.track_uri);
                return;
            }
            println!("{}", s.name);
            println!("Artist:   {}", s.artist.as_deref().unwrap_or(earmark::UNKNOWN_ARTIST));
            println!("Album:    {}", s.album.as_deref().unwrap_or(earmark::UNKNOWN_ALBUM));
            match s.year {
                Some(y) => println!("Period:   {}", y),
                None => println!("Period:   all time"),
            }
            println!("Plays:    {}", s.plays);
            println!("Listened: {:.2} hours ({:.2}% of the period)", s.hours, s.share_of_period);
            if let Some(link) = records::track_link(&s.track_uri) {
                println!("Link:     {}", link);
            }
        }

        AggregationResult::Week(w) => {
            println!("{}, week of {} ({:.2} hours)", w.artist, w.week_start, w.hours);
            println!();
            if w.tracks.is_empty() {
                println!("No plays that week.");
                return;
            }
            print_track_table(&w.tracks);
        }
    }
}

/// Pad or cut `s` to `width` characters.
fn fit(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let cut: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    } else {
        s.to_string()
    }
}

/// Print artists with one hours column per year of the window.
fn print_artist_table(artists: &[ArtistSummary], window: YearWindow) {
    let years: Vec<i32> = window.years().collect();

    print!("{:<30} {:>6} {:>8} {:>8}", "Artist", "Plays", "Hours", "Adj");
    for y in &years {
        print!(" {:>7}", y);
    }
    println!();
    println!("{}", "-".repeat(55 + 8 * years.len()));

    for a in artists {
        print!(
            "{:<30} {:>6} {:>8.2} {:>8.2}",
            fit(&a.artist, 30),
            a.plays,
            a.total_hours,
            a.adjusted_hours
        );
        for y in &years {
            print!(" {:>7.2}", a.years.get(y).copied().unwrap_or(0.0));
        }
        println!();
    }
}

fn print_album_table(albums: &[AlbumSummary]) {
    println!("{:<35} {:<25} {:>6} {:>8}", "Album", "Artist", "Plays", "Hours");
    println!("{}", "-".repeat(77));

    for a in albums {
        println!(
            "{:<35} {:<25} {:>6} {:>8.2}",
            fit(&a.album, 35),
            fit(a.artist.as_deref().unwrap_or(earmark::UNKNOWN_ARTIST), 25),
            a.plays,
            a.hours
        );
    }
}

fn print_track_table(tracks: &[TrackSummary]) {
    println!("{:<35} {:<25} {:>6} {:>8}", "Track", "Artist", "Plays", "Hours");
    println!("{}", "-".repeat(77));

    for t in tracks {
        println!(
            "{:<35} {:<25} {:>6} {:>8.2}",
            fit(&t.name, 35),
            fit(t.artist.as_deref().unwrap_or(earmark::UNKNOWN_ARTIST), 25),
            t.plays,
            t.hours
        );
    }
}

/// One-line digest of a year heatmap: active days and the busiest one.
fn print_heatmap_summary(cells: &[HeatmapCell]) {
    let active = cells.iter().filter(|c| c.hours > 0.0).count();
    let busiest = cells
        .iter()
        .filter(|c| c.hours > 0.0)
        .max_by(|a, b| a.hours.partial_cmp(&b.hours).unwrap_or(std::cmp::Ordering::Equal));

    match busiest {
        Some(day) => println!(
            "Played on {} of {} days; busiest {} ({:.2} hours)",
            active,
            cells.len(),
            day.date,
            day.hours
        ),
        None => println!("No plays that year."),
    }
}
