//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Engine configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Analysis program to spawn (binary or script runner)
    pub analysis_program: String,
    /// Extra arguments placed before the source path (e.g. a script path)
    pub analysis_args: Vec<String>,
    /// Root of the content-addressed cache
    pub cache_dir: PathBuf,
    /// Job store file
    pub store_path: PathBuf,
    /// Work directory for temporary files (subtitle sidecars, partial renders)
    pub work_dir: PathBuf,
    /// Minimum percent movement before a progress event propagates
    pub progress_min_delta: u8,
    /// Minimum interval between same-looking progress events
    pub progress_min_interval: Duration,
    /// Whether to request AI enrichment from the analysis process
    pub enrichment: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analysis_program: "python3".to_string(),
            analysis_args: vec!["analyze.py".to_string()],
            cache_dir: PathBuf::from("cache"),
            store_path: PathBuf::from("jobs.json"),
            work_dir: PathBuf::from("/tmp/clipsmith"),
            progress_min_delta: crate::coalesce::DEFAULT_MIN_DELTA,
            progress_min_interval: crate::coalesce::DEFAULT_MIN_INTERVAL,
            enrichment: false,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            analysis_program: std::env::var("CLIPSMITH_ANALYSIS_PROGRAM")
                .unwrap_or(defaults.analysis_program),
            analysis_args: std::env::var("CLIPSMITH_ANALYSIS_ARGS")
                .map(|s| s.split_whitespace().map(String::from).collect())
                .unwrap_or(defaults.analysis_args),
            cache_dir: std::env::var("CLIPSMITH_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            store_path: std::env::var("CLIPSMITH_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            work_dir: std::env::var("CLIPSMITH_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            progress_min_delta: std::env::var("CLIPSMITH_PROGRESS_MIN_DELTA")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.progress_min_delta),
            progress_min_interval: Duration::from_millis(
                std::env::var("CLIPSMITH_PROGRESS_MIN_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.progress_min_interval.as_millis() as u64),
            ),
            enrichment: std::env::var("CLIPSMITH_ENRICHMENT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(defaults.enrichment),
        }
    }
}
