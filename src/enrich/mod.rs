pub mod merge;
pub mod workers;

pub use merge::{merge_results, EnrichmentReport};
pub use workers::{download_chart, download_details, CHART_COLUMN};
