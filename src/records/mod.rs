pub mod dataset;
pub mod export;

pub use dataset::{AnalystRating, Dataset, Row, TICKER_COLUMN};
pub(crate) use dataset::DatasetChange;
pub use export::{default_export_stem, save_to_csv, save_to_sqlite, table_string, to_csv_string};
