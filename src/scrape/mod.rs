use scraper::Selector;

use crate::error::{AppError, Result};

pub mod detail;
pub mod rows;
pub mod table;

pub use detail::{DetailParser, TickerDetails};
pub use rows::effective_row_count;
pub use table::{parse_total, ParsedTable, TableParser};

pub(crate) fn compile_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|err| AppError::message(format!("Invalid CSS selector `{selector}`: {err:?}")))
}
