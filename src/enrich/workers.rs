use std::path::Path;

use crate::fanout::{EnrichmentPayload, FailureCause, RequestDescriptor};
use crate::fetch::Transport;
use crate::scrape::DetailParser;

/// Column added by chart enrichment; holds the saved image path.
pub const CHART_COLUMN: &str = "Chart";

/// Download one chart image to `<charts_dir>/<ticker>.png`. The image is written to a
/// `.part` file first so an abandoned download never leaves a truncated `.png` behind.
pub async fn download_chart<T>(
    transport: &T,
    charts_dir: &Path,
    descriptor: RequestDescriptor,
) -> Result<EnrichmentPayload, FailureCause>
where
    T: Transport + ?Sized,
{
    let bytes = transport
        .get_bytes(&descriptor.url)
        .await
        .map_err(FailureCause::from_error)?;

    let stem = chart_file_stem(&descriptor.ticker);
    let path = charts_dir.join(format!("{stem}.png"));
    let partial = charts_dir.join(format!("{stem}.png.part"));
    tokio::fs::write(&partial, &bytes)
        .await
        .map_err(|err| FailureCause::Io(format!("{}: {}", partial.display(), err)))?;
    tokio::fs::rename(&partial, &path)
        .await
        .map_err(|err| FailureCause::Io(format!("{}: {}", path.display(), err)))?;

    Ok(EnrichmentPayload {
        ticker: descriptor.ticker,
        fields: vec![(CHART_COLUMN.to_string(), path.display().to_string())],
        ratings: Vec::new(),
    })
}

/// Fetch and parse one quote page.
pub async fn download_details<T>(
    transport: &T,
    parser: &DetailParser,
    descriptor: RequestDescriptor,
) -> Result<EnrichmentPayload, FailureCause>
where
    T: Transport + ?Sized,
{
    let page = transport
        .get_page(&descriptor.url, &[])
        .await
        .map_err(FailureCause::from_error)?;

    let details = {
        let document = page.document();
        parser.parse(&descriptor.ticker, &document)
    };

    Ok(EnrichmentPayload {
        ticker: descriptor.ticker,
        fields: details.fields,
        ratings: details.ratings,
    })
}

/// Tickers such as `BRK.B` are fine as file names; anything outside `[A-Za-z0-9._-]` is not.
fn chart_file_stem(ticker: &str) -> String {
    ticker
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectorConfig;
    use crate::fanout::WorkerKind;
    use crate::fetch::stub::StubTransport;

    fn descriptor(ticker: &str, url: &str, kind: WorkerKind) -> RequestDescriptor {
        RequestDescriptor {
            ticker: ticker.to_string(),
            url: url.to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn chart_is_written_under_ticker_name() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = "https://example.test/chart.ashx?t=AAPL";
        let transport = StubTransport::new().bytes(url, b"\x89PNG");

        let payload = download_chart(&transport, dir.path(), descriptor("AAPL", url, WorkerKind::Chart))
            .await
            .expect("chart downloads");

        let saved = dir.path().join("AAPL.png");
        assert_eq!(std::fs::read(&saved).expect("chart saved"), b"\x89PNG");
        assert!(!dir.path().join("AAPL.png.part").exists());
        assert_eq!(payload.fields[0].0, CHART_COLUMN);
        assert_eq!(payload.fields[0].1, saved.display().to_string());
    }

    #[tokio::test]
    async fn chart_status_error_maps_to_status_cause() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = "https://example.test/chart.ashx?t=GONE";
        let transport = StubTransport::new().status(url, 503);

        let cause = download_chart(&transport, dir.path(), descriptor("GONE", url, WorkerKind::Chart))
            .await
            .expect_err("should fail");
        assert_eq!(cause, FailureCause::Status(503));
    }

    #[tokio::test]
    async fn details_are_parsed_from_quote_page() {
        let url = "https://example.test/quote.ashx?t=MSFT";
        let transport = StubTransport::new().page(
            url,
            r#"<table class="snapshot-table2"><tr><td>Sales</td><td>245B</td></tr></table>"#,
        );
        let parser = DetailParser::new(&SelectorConfig::default()).expect("selectors compile");

        let payload = download_details(&transport, &parser, descriptor("MSFT", url, WorkerKind::Detail))
            .await
            .expect("details parse");
        assert_eq!(payload.ticker, "MSFT");
        assert_eq!(payload.fields, vec![("Sales".to_string(), "245B".to_string())]);
        assert!(payload.ratings.is_empty());
    }

    #[tokio::test]
    async fn abandoned_chart_download_leaves_no_png() {
        let dir = tempfile::tempdir().expect("temp dir");
        let url = "https://example.test/chart.ashx?t=SLOW";
        let transport = StubTransport::new()
            .bytes(url, b"\x89PNG")
            .delay(url, std::time::Duration::from_secs(30));

        let download = download_chart(&transport, dir.path(), descriptor("SLOW", url, WorkerKind::Chart));
        let abandoned = tokio::time::timeout(std::time::Duration::from_millis(20), download).await;

        assert!(abandoned.is_err());
        assert!(!dir.path().join("SLOW.png").exists());
    }

    #[test]
    fn chart_file_stem_replaces_path_characters() {
        assert_eq!(chart_file_stem("BRK.B"), "BRK.B");
        assert_eq!(chart_file_stem("../X"), ".._X");
    }
}
