use thiserror::Error;

pub use anyhow::Context;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("request to {url} failed: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} returned status {status}")]
    UnexpectedStatus { url: String, status: u16 },
    #[error("no results found for query `{query}`")]
    NoResults { query: String },
    #[error("unrecognised {kind} filter `{token}`")]
    InvalidFilter { kind: &'static str, token: String },
    #[error("enrichment request {url} failed: {cause}")]
    EnrichmentFailed { url: String, cause: String },
    #[error("no row with ticker `{ticker}`; enrichment result dropped")]
    MergeSkipped { ticker: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn message<T: Into<String>>(msg: T) -> Self {
        AppError::Message(msg.into())
    }

    /// True for errors that abort the primary fetch before any dataset exists.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            AppError::EnrichmentFailed { .. }
                | AppError::MergeSkipped { .. }
                | AppError::InvalidFilter { .. }
        )
    }
}
