use std::collections::HashMap;
use std::fmt;

use crate::records::export::table_string;

/// Column every row is keyed on when merging enrichment results.
pub const TICKER_COLUMN: &str = "Ticker";

/// One table row: column name to cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }

    pub fn ticker(&self) -> Option<&str> {
        self.get(TICKER_COLUMN)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cell values in `headers` order; absent keys render as empty strings.
    pub fn values<'a>(&'a self, headers: &'a [String]) -> impl Iterator<Item = &'a str> + 'a {
        headers
            .iter()
            .map(move |header| self.get(header).unwrap_or(""))
    }

    pub(crate) fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            cells: pairs.into_iter().collect(),
        }
    }

    fn set(&mut self, column: &str, value: &str) {
        self.cells.insert(column.to_string(), value.to_string());
    }

    fn ensure(&mut self, column: &str) {
        if !self.cells.contains_key(column) {
            self.cells.insert(column.to_string(), String::new());
        }
    }
}

/// Analyst rating attached to a ticker by the detail-page enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalystRating {
    pub ticker: String,
    pub date: String,
    pub category: String,
    pub analyst: String,
    pub rating: String,
    pub price_from: String,
    pub price_to: String,
}

impl AnalystRating {
    pub const HEADERS: [&'static str; 7] = [
        "ticker",
        "date",
        "category",
        "analyst",
        "rating",
        "price_from",
        "price_to",
    ];

    pub fn fields(&self) -> [&str; 7] {
        [
            &self.ticker,
            &self.date,
            &self.category,
            &self.analyst,
            &self.rating,
            &self.price_from,
            &self.price_to,
        ]
    }
}

/// Every way the dataset can change. Only the pipeline and the merger build these.
#[derive(Debug)]
pub(crate) enum DatasetChange<'a> {
    /// Initial population from a parsed table.
    Populate {
        headers: Vec<String>,
        rows: Vec<Row>,
    },
    /// Merge fields into every row whose ticker matches. Returns matched row count.
    MergeFields {
        ticker: &'a str,
        fields: &'a [(String, String)],
    },
    /// Append ratings that are not already present.
    AppendRatings(&'a [AnalystRating]),
}

/// In-memory insider table. Every row holds a value for every header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Row>,
    analysis: Vec<AnalystRating>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn get(&self, position: usize) -> Option<&Row> {
        self.rows.get(position)
    }

    pub fn analysis(&self) -> &[AnalystRating] {
        &self.analysis
    }

    /// Tickers in row order, skipping rows without one.
    pub fn tickers(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.ticker())
            .filter(|ticker| !ticker.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.rows.iter().any(|row| row.ticker() == Some(ticker))
    }

    pub(crate) fn apply(&mut self, change: DatasetChange<'_>) -> usize {
        match change {
            DatasetChange::Populate { headers, rows } => {
                self.headers = headers;
                self.rows = rows;
                self.analysis.clear();
                self.backfill();
                self.rows.len()
            }
            DatasetChange::MergeFields { ticker, fields } => {
                if !self.has_ticker(ticker) {
                    return 0;
                }
                let mut added = false;
                for (column, _) in fields {
                    if !self.headers.iter().any(|header| header == column) {
                        self.headers.push(column.clone());
                        added = true;
                    }
                }
                if added {
                    self.backfill();
                }

                let mut matched = 0;
                for row in self.rows.iter_mut().filter(|row| row.ticker() == Some(ticker)) {
                    for (column, value) in fields {
                        row.set(column, value);
                    }
                    matched += 1;
                }
                matched
            }
            DatasetChange::AppendRatings(ratings) => {
                let before = self.analysis.len();
                for rating in ratings {
                    if !self.analysis.contains(rating) {
                        self.analysis.push(rating.clone());
                    }
                }
                self.analysis.len() - before
            }
        }
    }

    fn backfill(&mut self) {
        for row in &mut self.rows {
            for header in &self.headers {
                row.ensure(header);
            }
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&table_string(self))
    }
}

#[cfg(test)]
pub(crate) fn sample_dataset() -> Dataset {
    let headers: Vec<String> = ["Ticker", "Date", "Insider"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows = [
        ("AAPL", "Oct 01", "Cook Timothy"),
        ("MSFT", "Oct 02", "Nadella Satya"),
        ("NVDA", "Oct 03", "Huang Jen-Hsun"),
    ]
    .iter()
    .map(|(ticker, date, insider)| {
        Row::from_pairs([
            ("Ticker".to_string(), ticker.to_string()),
            ("Date".to_string(), date.to_string()),
            ("Insider".to_string(), insider.to_string()),
        ])
    })
    .collect();

    let mut dataset = Dataset::default();
    dataset.apply(DatasetChange::Populate { headers, rows });
    dataset
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn populate_backfills_missing_keys() {
        let mut dataset = Dataset::default();
        dataset.apply(DatasetChange::Populate {
            headers: vec!["Ticker".to_string(), "Date".to_string()],
            rows: vec![Row::from_pairs([("Ticker".to_string(), "AMD".to_string())])],
        });

        let row = dataset.get(0).expect("row present");
        assert_eq!(row.get("Date"), Some(""));
        assert_eq!(row.len(), dataset.headers().len());
    }

    #[test]
    fn merge_extends_headers_once_and_backfills() {
        let mut dataset = sample_dataset();
        let new_fields = fields(&[("Sales", "383B"), ("P/E", "29.1")]);

        let matched = dataset.apply(DatasetChange::MergeFields {
            ticker: "MSFT",
            fields: &new_fields,
        });
        assert_eq!(matched, 1);
        assert_eq!(
            dataset.headers(),
            &["Ticker", "Date", "Insider", "Sales", "P/E"]
        );
        assert_eq!(dataset.get(0).and_then(|row| row.get("Sales")), Some(""));
        assert_eq!(dataset.get(1).and_then(|row| row.get("P/E")), Some("29.1"));

        dataset.apply(DatasetChange::MergeFields {
            ticker: "MSFT",
            fields: &new_fields,
        });
        assert_eq!(dataset.headers().len(), 5);
    }

    #[test]
    fn merge_for_unknown_ticker_changes_nothing() {
        let mut dataset = sample_dataset();
        let before = dataset.clone();
        let matched = dataset.apply(DatasetChange::MergeFields {
            ticker: "ZZZ",
            fields: &fields(&[("Sales", "1B")]),
        });
        assert_eq!(matched, 0);
        assert_eq!(dataset, before);
    }

    #[test]
    fn ratings_are_not_duplicated() {
        let mut dataset = sample_dataset();
        let rating = AnalystRating {
            ticker: "AAPL".to_string(),
            date: "Oct-01-24".to_string(),
            category: "Upgrade".to_string(),
            analyst: "Acme Research".to_string(),
            rating: "Hold → Buy".to_string(),
            price_from: "200".to_string(),
            price_to: "240".to_string(),
        };
        let ratings = [rating.clone(), rating];

        assert_eq!(dataset.apply(DatasetChange::AppendRatings(&ratings)), 1);
        assert_eq!(dataset.apply(DatasetChange::AppendRatings(&ratings)), 0);
        assert_eq!(dataset.analysis().len(), 1);
    }

    #[test]
    fn tickers_follow_row_order() {
        assert_eq!(sample_dataset().tickers(), vec!["AAPL", "MSFT", "NVDA"]);
    }
}
