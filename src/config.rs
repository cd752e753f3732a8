use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::clean::CleanOptions;
use crate::filter::YearWindow;
use crate::rank::ThresholdPolicy;

/// Application configuration loaded from TOML config file.
/// Every field has a default, so the file is optional.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Export files or directories to load when none are given on the CLI.
    pub data_paths: Vec<PathBuf>,
    /// Number of parallel workers. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Years before the current one included in the default window.
    pub years_back: i32,
    /// Length of the overview and top-track lists.
    pub top_n: usize,
    pub thresholds: ThresholdPolicy,
    pub clean: CleanOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_paths: Vec::new(),
            workers: 0,
            years_back: 2,
            top_n: 20,
            thresholds: ThresholdPolicy::default(),
            clean: CleanOptions::default(),
        }
    }
}

impl AppConfig {
    /// Load config from `path`, or from `~/.config/earmark/config.toml`.
    /// Returns default config if the file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load(path: Option<&Path>) -> Self {
        let config_path = path.map(Path::to_path_buf).or_else(Self::config_path);
        match config_path {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => match Self::parse(&contents) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", path.display());
                        config
                    }
                    Err(e) => {
                        log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                        Self::default()
                    }
                },
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            Some(path) => {
                log::debug!("No config file at {}, using defaults", path.display());
                Self::default()
            }
            None => {
                log::debug!("No config directory, using defaults");
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// `[current_year - years_back, current_year]`.
    pub fn default_window(&self, current_year: i32) -> YearWindow {
        YearWindow::new(current_year - self.years_back.max(0), current_year)
    }

    /// Get the config file path.
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
