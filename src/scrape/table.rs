use scraper::{ElementRef, Html, Selector};

use crate::config::SelectorConfig;
use crate::records::Row;

use super::compile_selector;
use crate::error::Result;

/// Header labels, rows and the server-reported total pulled from the insider page.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    pub total_rows: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

pub struct TableParser {
    rows: Selector,
    total: Selector,
    cells: Selector,
}

impl TableParser {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            rows: compile_selector(&selectors.table_rows)?,
            total: compile_selector(&selectors.total_rows)?,
            cells: compile_selector("td, th")?,
        })
    }

    pub fn parse(&self, document: &Html) -> ParsedTable {
        let total_rows = self.total_rows(document);

        let mut table_rows = document.select(&self.rows);
        let headers = match table_rows.next() {
            Some(first) => unique_headers(self.cell_texts(first)),
            None => Vec::new(),
        };

        let rows = table_rows
            .map(|row| self.cell_texts(row))
            .filter(|cells| !cells.is_empty())
            .map(|cells| zip_row(&headers, cells))
            .collect();

        ParsedTable {
            total_rows,
            headers,
            rows,
        }
    }

    /// Total from the designated count element; zero when it is missing or has no number.
    pub fn total_rows(&self, document: &Html) -> usize {
        document
            .select(&self.total)
            .next()
            .map(|element| element.text().collect::<String>())
            .and_then(|text| parse_total(&text))
            .unwrap_or(0)
    }

    fn cell_texts(&self, row: ElementRef<'_>) -> Vec<String> {
        row.select(&self.cells).map(cell_text).collect()
    }
}

pub(crate) fn cell_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Last integer in `text`, ignoring thousands separators ("#1 / 1,234 Total" gives 1234).
pub fn parse_total(text: &str) -> Option<usize> {
    let cleaned = text.replace(',', "");
    cleaned
        .split(|c: char| !c.is_ascii_digit())
        .filter(|part| !part.is_empty())
        .last()
        .and_then(|digits| digits.parse().ok())
}

fn unique_headers(labels: Vec<String>) -> Vec<String> {
    let mut headers: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        if !headers.contains(&label) {
            headers.push(label);
            continue;
        }
        let mut suffix = 2;
        while headers.contains(&format!("{label}_{suffix}")) {
            suffix += 1;
        }
        headers.push(format!("{label}_{suffix}"));
    }
    headers
}

/// Pair cells with headers by position: short rows are padded, long rows truncated.
fn zip_row(headers: &[String], cells: Vec<String>) -> Row {
    let mut cells = cells.into_iter();
    Row::from_pairs(
        headers
            .iter()
            .map(|header| (header.clone(), cells.next().unwrap_or_default()))
            .collect::<Vec<_>>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div class="count-text">#1 / 1,204 Total</div>
          <table class="body-table">
            <tr><td>Ticker</td><td>Owner</td><td>Date</td><td>Value ($)</td></tr>
            <tr><td><a href="quote.ashx?t=AAPL">AAPL</a></td><td>Cook Timothy</td><td>Oct 01</td><td>1,000</td></tr>
            <tr><td>MSFT</td><td>Nadella Satya</td></tr>
            <tr><td>NVDA</td><td>Huang</td><td>Oct 03</td><td>5</td><td>extra</td></tr>
            <tr></tr>
          </table>
        </body></html>
    "#;

    fn parser() -> TableParser {
        TableParser::new(&SelectorConfig::default()).expect("selectors compile")
    }

    #[test]
    fn parses_headers_rows_and_total() {
        let table = parser().parse(&Html::parse_document(PAGE));

        assert_eq!(table.total_rows, 1204);
        assert_eq!(table.headers, vec!["Ticker", "Owner", "Date", "Value ($)"]);
        assert_eq!(table.rows.len(), 3);
        assert_eq!(table.rows[0].get("Ticker"), Some("AAPL"));
        assert_eq!(table.rows[0].get("Value ($)"), Some("1,000"));
    }

    #[test]
    fn short_rows_are_padded_and_long_rows_truncated() {
        let table = parser().parse(&Html::parse_document(PAGE));

        let short = &table.rows[1];
        assert_eq!(short.get("Date"), Some(""));
        assert_eq!(short.get("Value ($)"), Some(""));

        let long = &table.rows[2];
        assert_eq!(long.len(), 4);
        assert_eq!(long.get("Value ($)"), Some("5"));
        for row in &table.rows {
            assert_eq!(row.len(), table.headers.len());
        }
    }

    #[test]
    fn missing_total_counts_as_zero() {
        let html = Html::parse_document("<table class='body-table'><tr><td>Ticker</td></tr></table>");
        assert_eq!(parser().total_rows(&html), 0);

        let html = Html::parse_document("<div class='count-text'>no rows</div>");
        assert_eq!(parser().total_rows(&html), 0);
    }

    #[test]
    fn duplicate_header_labels_are_suffixed() {
        let html = Html::parse_document(
            "<table class='body-table'><tr><td>Ticker</td><td>Date</td><td>Date</td></tr></table>",
        );
        let table = parser().parse(&html);
        assert_eq!(table.headers, vec!["Ticker", "Date", "Date_2"]);
    }

    #[test]
    fn parse_total_takes_last_number() {
        assert_eq!(parse_total("#1 / 8,456 Total"), Some(8456));
        assert_eq!(parse_total("42"), Some(42));
        assert_eq!(parse_total("Total"), None);
    }
}
