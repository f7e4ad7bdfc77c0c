use scraper::{Html, Selector};

use crate::config::SelectorConfig;
use crate::error::Result;
use crate::records::AnalystRating;

use super::compile_selector;
use super::table::cell_text;

/// Fields and ratings scraped from one quote page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerDetails {
    pub fields: Vec<(String, String)>,
    pub ratings: Vec<AnalystRating>,
}

pub struct DetailParser {
    snapshot_cells: Selector,
    ratings_rows: Selector,
    cells: Selector,
}

impl DetailParser {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        Ok(Self {
            snapshot_cells: compile_selector(&selectors.detail_snapshot_cells)?,
            ratings_rows: compile_selector(&selectors.detail_ratings_rows)?,
            cells: compile_selector("td")?,
        })
    }

    pub fn parse(&self, ticker: &str, document: &Html) -> TickerDetails {
        TickerDetails {
            fields: self.snapshot_fields(document),
            ratings: self.ratings(ticker, document),
        }
    }

    /// Snapshot cells alternate label, value. Repeated labels keep their first value.
    fn snapshot_fields(&self, document: &Html) -> Vec<(String, String)> {
        let cells: Vec<String> = document.select(&self.snapshot_cells).map(cell_text).collect();

        let mut fields: Vec<(String, String)> = Vec::with_capacity(cells.len() / 2);
        for pair in cells.chunks(2) {
            let label = pair[0].trim();
            if label.is_empty() || fields.iter().any(|(existing, _)| existing == label) {
                continue;
            }
            let value = pair.get(1).cloned().unwrap_or_default();
            fields.push((label.to_string(), value));
        }
        fields
    }

    fn ratings(&self, ticker: &str, document: &Html) -> Vec<AnalystRating> {
        document
            .select(&self.ratings_rows)
            .filter_map(|row| {
                let cells: Vec<String> = row.select(&self.cells).map(cell_text).collect();
                if cells.len() < 4 || cells[0].eq_ignore_ascii_case("date") {
                    return None;
                }
                let (price_from, price_to) = split_price(cells.get(4).map(String::as_str));
                Some(AnalystRating {
                    ticker: ticker.to_string(),
                    date: cells[0].clone(),
                    category: cells[1].clone(),
                    analyst: cells[2].clone(),
                    rating: cells[3].clone(),
                    price_from,
                    price_to,
                })
            })
            .collect()
    }
}

/// "$120 → $150" becomes ("120", "150"); a single price is the target.
fn split_price(raw: Option<&str>) -> (String, String) {
    let clean = |s: &str| s.trim().trim_start_matches('$').trim().to_string();
    match raw {
        None => (String::new(), String::new()),
        Some(raw) => match raw.split_once('→').or_else(|| raw.split_once("->")) {
            Some((from, to)) => (clean(from), clean(to)),
            None => (String::new(), clean(raw)),
        },
    }
}
