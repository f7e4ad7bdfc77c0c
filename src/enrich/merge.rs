use crate::error::AppError;
use crate::fanout::{FanoutFailure, FanoutOutcome, FanoutResult};
use crate::records::{Dataset, DatasetChange};

/// What an enrichment pass did to the dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub requested: usize,
    pub succeeded: usize,
    pub merged_rows: usize,
    pub failures: Vec<FanoutFailure>,
    /// Tickers whose results matched no row.
    pub skipped: Vec<String>,
}

impl EnrichmentReport {
    pub fn failed_tickers(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.ticker.as_str()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    /// Non-fatal problems as errors, for callers that want to surface them.
    pub fn issues(&self) -> Vec<AppError> {
        self.failures
            .iter()
            .cloned()
            .map(AppError::from)
            .chain(
                self.skipped
                    .iter()
                    .map(|ticker| AppError::MergeSkipped {
                        ticker: ticker.clone(),
                    }),
            )
            .collect()
    }
}

/// Fold fanout results into the dataset, in result order.
///
/// Successful payloads extend matching rows (last write wins) and may append columns.
/// Payloads for unknown tickers are dropped and reported as skipped; failures are recorded.
pub fn merge_results(dataset: &mut Dataset, results: Vec<FanoutResult>) -> EnrichmentReport {
    let mut report = EnrichmentReport {
        requested: results.len(),
        ..EnrichmentReport::default()
    };

    for result in results {
        match result.outcome {
            FanoutOutcome::Succeeded(payload) => {
                report.succeeded += 1;
                let matched = dataset.apply(DatasetChange::MergeFields {
                    ticker: &payload.ticker,
                    fields: &payload.fields,
                });
                if matched == 0 {
                    log::warn!("{}", AppError::MergeSkipped {
                        ticker: payload.ticker.clone(),
                    });
                    report.skipped.push(payload.ticker);
                    continue;
                }
                report.merged_rows += matched;
                dataset.apply(DatasetChange::AppendRatings(&payload.ratings));
            }
            FanoutOutcome::Failed(failure) => {
                log::warn!(
                    "{} enrichment for {} failed: {}",
                    result.descriptor.kind,
                    failure.ticker,
                    failure.cause
                );
                report.failures.push(failure);
            }
        }
    }

    report
}
