use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Context, Result};

pub mod validator;

pub use validator::validate_config;

pub const INSIDER_ENDPOINT: &str = "https://finviz.com/insidertrading.ashx";
pub const CHART_ENDPOINT: &str = "https://finviz.com/chart.ashx";
pub const QUOTE_ENDPOINT: &str = "https://finviz.com/quote.ashx";

/// Default number of enrichment requests kept in flight at once.
pub const DEFAULT_FANOUT_CONCURRENCY: usize = 10;

/// CSS selectors used to pull tables out of the fetched pages.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub table_rows: String,
    pub total_rows: String,
    pub detail_snapshot_cells: String,
    pub detail_ratings_rows: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            table_rows: ".body-table tr".to_string(),
            total_rows: ".count-text".to_string(),
            detail_snapshot_cells: "table.snapshot-table2 td".to_string(),
            detail_ratings_rows: "table.js-table-ratings tr".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub insider_endpoint: String,
    pub chart_endpoint: String,
    pub quote_endpoint: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub fanout_concurrency: usize,
    pub fanout_deadline_secs: Option<u64>,
    pub charts_dir: String,
    pub selectors: SelectorConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ScraperConfig {
    pub fn builtin() -> Self {
        Self {
            insider_endpoint: INSIDER_ENDPOINT.to_string(),
            chart_endpoint: CHART_ENDPOINT.to_string(),
            quote_endpoint: QUOTE_ENDPOINT.to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string(),
            request_timeout_secs: 10,
            fanout_concurrency: DEFAULT_FANOUT_CONCURRENCY,
            fanout_deadline_secs: None,
            charts_dir: "charts".to_string(),
            selectors: SelectorConfig::default(),
        }
    }

    /// Read a JSON config. Relative paths are tried as given, then next to the executable,
    /// then under the working directory. Missing keys fall back to the builtin values.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut misses = Vec::new();

        for candidate in candidate_paths(path) {
            let content = match std::fs::read_to_string(&candidate) {
                Ok(content) => content,
                Err(err) => {
                    misses.push(format!("{}: {err}", candidate.display()));
                    continue;
                }
            };
            let config: ScraperConfig = serde_json::from_str(&content)
                .with_context(|| format!("Invalid scraper config {}", candidate.display()))?;
            validate_config(&config)?;
            log::debug!("loaded scraper config from {}", candidate.display());
            return Ok(config);
        }

        Err(AppError::message(format!(
            "scraper config `{}` not found ({})",
            path.display(),
            misses.join("; ")
        )))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fanout_deadline(&self) -> Option<Duration> {
        self.fanout_deadline_secs.map(Duration::from_secs)
    }
}

fn candidate_paths(path: &Path) -> Vec<PathBuf> {
    let mut candidates = vec![path.to_path_buf()];
    if path.is_relative() {
        if let Some(dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join(path));
        }
        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(path));
        }
    }
    candidates.dedup();
    candidates
}
