pub mod aggregate;
pub mod clean;
pub mod config;
pub mod filter;
pub mod loader;
pub mod rank;
pub mod records;
pub mod scope;

/// Application name for XDG paths
pub const APP_NAME: &str = "earmark";

pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Grouping keys for plays without the corresponding name.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";
pub const UNKNOWN_ALBUM: &str = "Unknown Album";
pub const UNKNOWN_TRACK: &str = "Unknown Track";
