pub mod config;
pub mod enrich;
pub mod error;
pub mod fanout;
pub mod fetch;
pub mod query;
pub mod records;
pub mod scrape;
pub mod screener;
pub mod telemetry;

pub use error::{AppError, Result};
pub use records::Dataset;
pub use screener::{InsiderScreener, InsiderSession};
