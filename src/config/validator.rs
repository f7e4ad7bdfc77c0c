use scraper::Selector;

use crate::error::{AppError, Result};

use super::ScraperConfig;

/// Validate a scraper config and surface every problem in one error.
pub fn validate_config(config: &ScraperConfig) -> Result<()> {
    let mut issues = Vec::new();

    validate_endpoints(config, &mut issues);
    validate_fanout(config, &mut issues);
    validate_selectors(config, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "scraper config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_endpoints(config: &ScraperConfig, issues: &mut Vec<String>) {
    for (name, value) in [
        ("insider_endpoint", &config.insider_endpoint),
        ("chart_endpoint", &config.chart_endpoint),
        ("quote_endpoint", &config.quote_endpoint),
    ] {
        if value.trim().is_empty() {
            issues.push(format!("{name} must not be empty"));
        } else if reqwest::Url::parse(value).is_err() {
            issues.push(format!("{name} `{value}` is not a valid URL"));
        }
    }
}

fn validate_fanout(config: &ScraperConfig, issues: &mut Vec<String>) {
    if config.fanout_concurrency == 0 {
        issues.push("fanout_concurrency must be at least 1".to_string());
    }
    if config.fanout_deadline_secs == Some(0) {
        issues.push("fanout_deadline_secs must be positive when set".to_string());
    }
    if config.charts_dir.trim().is_empty() {
        issues.push("charts_dir must not be empty".to_string());
    }
}

fn validate_selectors(config: &ScraperConfig, issues: &mut Vec<String>) {
    let selectors = &config.selectors;
    for (name, value) in [
        ("selectors.table_rows", &selectors.table_rows),
        ("selectors.total_rows", &selectors.total_rows),
        ("selectors.detail_snapshot_cells", &selectors.detail_snapshot_cells),
        ("selectors.detail_ratings_rows", &selectors.detail_ratings_rows),
    ] {
        if Selector::parse(value).is_err() {
            issues.push(format!("{name} `{value}` is not a valid CSS selector"));
        }
    }
}
