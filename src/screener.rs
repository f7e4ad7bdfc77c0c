//! The fetch-and-normalise pipeline: one blocking primary fetch that produces a [`Dataset`],
//! and on-demand concurrent enrichment passes that extend it.

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::{validate_config, ScraperConfig};
use crate::enrich::{download_chart, download_details, merge_results, EnrichmentReport};
use crate::error::{Context, Result};
use crate::fanout::{CancelToken, ConcurrentFanout, FanoutResult, RequestDescriptor, WorkerKind};
use crate::fetch::{chart_url, quote_url, HttpTransport, Transport};
use crate::query::{ChartOptions, FilterUpdate, InsiderQuery};
use crate::records::{Dataset, DatasetChange};
use crate::scrape::{effective_row_count, DetailParser, TableParser};
use crate::telemetry::PhaseTimer;

pub struct InsiderScreener<T = HttpTransport> {
    config: ScraperConfig,
    transport: T,
    table_parser: TableParser,
    detail_parser: DetailParser,
}

impl InsiderScreener<HttpTransport> {
    pub fn new(config: ScraperConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> InsiderScreener<T> {
    pub fn with_transport(config: ScraperConfig, transport: T) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self {
            table_parser: TableParser::new(&config.selectors)?,
            detail_parser: DetailParser::new(&config.selectors)?,
            config,
            transport,
        })
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Fetch, parse and validate the insider table for `query`.
    ///
    /// Any error aborts the whole call; no partial dataset is returned.
    pub async fn search(&self, query: &InsiderQuery) -> Result<Dataset> {
        let timer = PhaseTimer::start("primary_fetch");
        let page = match self
            .transport
            .get_page(&self.config.insider_endpoint, &query.params())
            .await
        {
            Ok(page) => {
                timer.finish(&[("bytes", page.body.len())]);
                page
            }
            Err(err) => {
                timer.fail(&err);
                return Err(err);
            }
        };

        let timer = PhaseTimer::start("parse");
        let parsed = {
            let document = page.document();
            self.table_parser.parse(&document)
        };
        timer.finish(&[
            ("total_rows", parsed.total_rows),
            ("parsed_rows", parsed.rows.len()),
            ("columns", parsed.headers.len()),
        ]);

        let timer = PhaseTimer::start("validate");
        let effective = match effective_row_count(query.row_cap(), parsed.total_rows, page.query())
        {
            Ok(effective) => effective,
            Err(err) => {
                timer.fail(&err);
                return Err(err);
            }
        };

        let mut rows = parsed.rows;
        if rows.len() < effective {
            log::warn!(
                "page lists {} rows but {} were expected; keeping what was parsed",
                rows.len(),
                effective
            );
        }
        rows.truncate(effective);
        timer.finish(&[("effective_rows", rows.len())]);

        let mut dataset = Dataset::default();
        dataset.apply(DatasetChange::Populate {
            headers: parsed.headers,
            rows,
        });
        Ok(dataset)
    }

    /// Download a chart per ticker and record each saved path in the `Chart` column.
    pub async fn fetch_charts(
        &self,
        dataset: &mut Dataset,
        options: ChartOptions,
        cancel: Option<CancelToken>,
    ) -> Result<EnrichmentReport> {
        let charts_dir = PathBuf::from(&self.config.charts_dir);
        tokio::fs::create_dir_all(&charts_dir)
            .await
            .with_context(|| format!("Failed to create charts directory {}", charts_dir.display()))?;

        let descriptors = self.descriptors(dataset, WorkerKind::Chart, |ticker| {
            chart_url(&self.config.chart_endpoint, &options, ticker)
        })?;

        let timer = PhaseTimer::start("fanout");
        let results = self
            .fanout(cancel)
            .run(descriptors, |descriptor| {
                download_chart(&self.transport, &charts_dir, descriptor)
            })
            .await;
        timer.finish(&[("results", results.len())]);

        Ok(self.merge(dataset, results))
    }

    /// Fetch every ticker's quote page and merge its fields and analyst ratings.
    pub async fn fetch_details(
        &self,
        dataset: &mut Dataset,
        cancel: Option<CancelToken>,
    ) -> Result<EnrichmentReport> {
        let descriptors = self.descriptors(dataset, WorkerKind::Detail, |ticker| {
            quote_url(&self.config.quote_endpoint, ticker)
        })?;

        let timer = PhaseTimer::start("fanout");
        let results = self
            .fanout(cancel)
            .run(descriptors, |descriptor| {
                download_details(&self.transport, &self.detail_parser, descriptor)
            })
            .await;
        timer.finish(&[("results", results.len())]);

        Ok(self.merge(dataset, results))
    }

    fn fanout(&self, cancel: Option<CancelToken>) -> ConcurrentFanout {
        ConcurrentFanout::new(self.config.fanout_concurrency)
            .with_deadline(self.config.fanout_deadline())
            .with_cancel(cancel)
    }

    /// One descriptor per distinct ticker, in row order.
    fn descriptors<F>(
        &self,
        dataset: &Dataset,
        kind: WorkerKind,
        url_for: F,
    ) -> Result<Vec<RequestDescriptor>>
    where
        F: Fn(&str) -> Result<String>,
    {
        let mut seen = HashSet::new();
        dataset
            .tickers()
            .into_iter()
            .filter(|ticker| seen.insert(ticker.clone()))
            .map(|ticker| -> Result<RequestDescriptor> {
                Ok(RequestDescriptor {
                    url: url_for(&ticker)?,
                    ticker,
                    kind,
                })
            })
            .collect()
    }

    fn merge(&self, dataset: &mut Dataset, results: Vec<FanoutResult>) -> EnrichmentReport {
        let timer = PhaseTimer::start("merge");
        let report = merge_results(dataset, results);
        timer.finish(&[
            ("succeeded", report.succeeded),
            ("failed", report.failures.len()),
            ("skipped", report.skipped.len()),
            ("columns", dataset.headers().len()),
        ]);
        report
    }
}

/// A query snapshot and the dataset it produced. Adding filters builds a new snapshot and
/// re-runs the primary fetch; the dataset is replaced only when that fetch succeeds.
pub struct InsiderSession<T = HttpTransport> {
    screener: InsiderScreener<T>,
    query: InsiderQuery,
    dataset: Dataset,
}

impl<T: Transport> InsiderSession<T> {
    pub async fn open(screener: InsiderScreener<T>, query: InsiderQuery) -> Result<Self> {
        let dataset = screener.search(&query).await?;
        Ok(Self {
            screener,
            query,
            dataset,
        })
    }

    pub async fn add(&mut self, update: FilterUpdate) -> Result<&Dataset> {
        let query = self.query.refine(update);
        let dataset = self.screener.search(&query).await?;
        self.query = query;
        self.dataset = dataset;
        Ok(&self.dataset)
    }

    pub fn query(&self) -> &InsiderQuery {
        &self.query
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn into_dataset(self) -> Dataset {
        self.dataset
    }

    pub async fn fetch_charts(
        &mut self,
        options: ChartOptions,
        cancel: Option<CancelToken>,
    ) -> Result<EnrichmentReport> {
        self.screener
            .fetch_charts(&mut self.dataset, options, cancel)
            .await
    }

    pub async fn fetch_details(&mut self, cancel: Option<CancelToken>) -> Result<EnrichmentReport> {
        self.screener.fetch_details(&mut self.dataset, cancel).await
    }
}
