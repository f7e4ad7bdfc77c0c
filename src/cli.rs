use clap::{Args, Parser, Subcommand};

use insider_screener::query::{lenient, ChartOptions, FilterUpdate, InsiderQuery, TransactionType};

#[derive(Parser)]
#[command(name = "insider-screener")]
#[command(about = "Fetch insider trading tables and enrich them with charts and ticker details")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// JSON config file; builtin defaults are used when omitted
    #[arg(short, long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the insider table, optionally enrich it, and export the result
    Fetch(FetchArgs),
}

#[derive(Args)]
pub struct FetchArgs {
    /// Transaction type: buy or sell (anything else means both)
    #[arg(short, long, default_value = "")]
    pub transaction: String,

    /// Sort key, prefix with '-' for descending (e.g. -value)
    #[arg(short, long)]
    pub order: Option<String>,

    /// Maximum number of rows to keep
    #[arg(short, long)]
    pub rows: Option<usize>,

    /// Download a chart image per ticker
    #[arg(long)]
    pub charts: bool,

    /// Chart period: d, w or m
    #[arg(long, default_value = "d")]
    pub chart_period: String,

    /// Chart size: l or s
    #[arg(long, default_value = "l")]
    pub chart_size: String,

    /// Chart type: c (candles) or l (line)
    #[arg(long, default_value = "c")]
    pub chart_type: String,

    /// Hide the technical-analysis overlay on charts
    #[arg(long)]
    pub no_ta: bool,

    /// Fetch every ticker's detail page and merge its fields
    #[arg(long)]
    pub details: bool,

    /// Write the table to CSV; a timestamped name is used when no file is given
    #[arg(long)]
    pub csv: Option<Option<String>>,

    /// Write the table to this SQLite database
    #[arg(long)]
    pub sqlite: Option<String>,

    /// Print the table to stdout
    #[arg(short, long)]
    pub print: bool,

    /// Override the configured enrichment concurrency
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Override the configured enrichment deadline in seconds
    #[arg(long)]
    pub deadline_secs: Option<u64>,

    /// Extra sort key applied as a second fetch after the first succeeds
    #[arg(long)]
    pub then_order: Option<String>,
}

impl FetchArgs {
    pub fn query(&self) -> InsiderQuery {
        let mut query = InsiderQuery::new().transaction(TransactionType::from_token(&self.transaction));
        if let Some(order) = &self.order {
            query = query.order(order.as_str());
        }
        if let Some(rows) = self.rows {
            query = query.rows(rows);
        }
        query
    }

    pub fn follow_up(&self) -> Option<FilterUpdate> {
        self.then_order.as_ref().map(|order| FilterUpdate {
            order: Some(order.clone()),
            ..FilterUpdate::default()
        })
    }

    pub fn chart_options(&self) -> ChartOptions {
        ChartOptions {
            period: lenient(&self.chart_period),
            size: lenient(&self.chart_size),
            kind: lenient(&self.chart_type),
            technical_analysis: !self.no_ta,
        }
    }
}
