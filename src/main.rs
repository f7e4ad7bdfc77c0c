mod cli;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands, FetchArgs};
use insider_screener::config::ScraperConfig;
use insider_screener::enrich::EnrichmentReport;
use insider_screener::fanout::cancel_pair;
use insider_screener::records::{default_export_stem, save_to_csv, save_to_sqlite};
use insider_screener::screener::{InsiderScreener, InsiderSession};
use insider_screener::telemetry::PhaseTimer;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => ScraperConfig::load(path).context("Failed to load configuration")?,
        None => ScraperConfig::builtin(),
    };

    match cli.command {
        Commands::Fetch(ref args) => {
            if let Some(concurrency) = args.concurrency {
                config.fanout_concurrency = concurrency;
            }
            if let Some(deadline) = args.deadline_secs {
                config.fanout_deadline_secs = Some(deadline);
            }
            run_fetch(config, args).await?;
        }
    }

    Ok(())
}

async fn run_fetch(config: ScraperConfig, args: &FetchArgs) -> Result<()> {
    let screener = InsiderScreener::new(config).context("Failed to build screener")?;
    let mut session = InsiderSession::open(screener, args.query())
        .await
        .context("Primary fetch failed")?;
    log::info!(
        "fetched {} rows for query `{}`",
        session.dataset().len(),
        session.query()
    );

    if let Some(update) = args.follow_up() {
        session.add(update).await.context("Refined fetch failed")?;
        log::info!(
            "refetched {} rows for query `{}`",
            session.dataset().len(),
            session.query()
        );
    }

    if args.charts || args.details {
        let (handle, token) = cancel_pair();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("interrupt received; abandoning outstanding enrichment requests");
                handle.cancel();
                exit_on_interrupt().await;
            }
        });

        if args.charts {
            let report = session
                .fetch_charts(args.chart_options(), Some(token.clone()))
                .await?;
            log_report("chart", &report);
        }
        if args.details {
            let report = session.fetch_details(Some(token)).await?;
            log_report("detail", &report);
        }
        interrupt.abort();
        // The signal handler stays installed once registered, so keep Ctrl-C fatal from here on.
        tokio::spawn(exit_on_interrupt());
    }

    let dataset = session.into_dataset();
    let timer = PhaseTimer::start("export");
    let mut written = 0;
    if let Some(name) = &args.csv {
        let name = name.clone().unwrap_or_else(default_export_stem);
        for path in save_to_csv(&dataset, &name)? {
            log::info!("wrote {}", path.display());
            written += 1;
        }
    }
    if let Some(path) = &args.sqlite {
        save_to_sqlite(&dataset, path)?;
        log::info!("wrote {}", path);
        written += 1;
    }
    timer.finish(&[("files", written), ("rows", dataset.len())]);

    if args.print || (args.csv.is_none() && args.sqlite.is_none()) {
        print!("{dataset}");
    }

    Ok(())
}

/// Exit with the conventional SIGINT status on the next Ctrl-C.
async fn exit_on_interrupt() {
    if tokio::signal::ctrl_c().await.is_ok() {
        log::warn!("interrupted");
        std::process::exit(130);
    }
}

fn log_report(kind: &str, report: &EnrichmentReport) {
    if report.is_complete() {
        log::info!("{kind} enrichment complete for {} tickers", report.succeeded);
        return;
    }
    log::warn!(
        "{kind} enrichment: {} of {} succeeded",
        report.succeeded,
        report.requested
    );
    for issue in report.issues() {
        log::warn!("{issue}");
    }
}
