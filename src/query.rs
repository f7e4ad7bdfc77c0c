//! Typed filter selections and the canonical query strings built from them.

use std::fmt;
use std::str::FromStr;

use crate::error::AppError;

/// Insider transaction filter. `Unset` lets the server return both kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransactionType {
    #[default]
    Unset,
    Buy,
    Sell,
}

impl TransactionType {
    /// Server code for the `tc` parameter; `None` means the parameter is omitted.
    pub fn code(self) -> Option<&'static str> {
        match self {
            TransactionType::Unset => None,
            TransactionType::Buy => Some("1"),
            TransactionType::Sell => Some("2"),
        }
    }

    /// Total mapping from user input. Unknown tokens degrade to `Unset` with a warning.
    pub fn from_token(token: &str) -> Self {
        lenient(token)
    }
}

impl FromStr for TransactionType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(TransactionType::Unset),
            "buy" => Ok(TransactionType::Buy),
            "sell" => Ok(TransactionType::Sell),
            _ => Err(AppError::InvalidFilter {
                kind: "transaction type",
                token: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartPeriod {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartSize {
    #[default]
    Large,
    Small,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartKind {
    #[default]
    Candles,
    Line,
}

impl FromStr for ChartPeriod {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "d" => Ok(ChartPeriod::Daily),
            "w" => Ok(ChartPeriod::Weekly),
            "m" => Ok(ChartPeriod::Monthly),
            _ => Err(AppError::InvalidFilter {
                kind: "chart period",
                token: s.to_string(),
            }),
        }
    }
}

impl FromStr for ChartSize {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "l" => Ok(ChartSize::Large),
            "s" => Ok(ChartSize::Small),
            _ => Err(AppError::InvalidFilter {
                kind: "chart size",
                token: s.to_string(),
            }),
        }
    }
}

impl FromStr for ChartKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "c" => Ok(ChartKind::Candles),
            "l" => Ok(ChartKind::Line),
            _ => Err(AppError::InvalidFilter {
                kind: "chart type",
                token: s.to_string(),
            }),
        }
    }
}

/// Parse a filter token, falling back to the default variant when it is not recognised.
pub fn lenient<T>(token: &str) -> T
where
    T: FromStr<Err = AppError> + Default,
{
    match token.parse() {
        Ok(value) => value,
        Err(err) => {
            log::warn!("{err}; using the default instead");
            T::default()
        }
    }
}

/// Chart rendering options shared by every chart request in one enrichment pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartOptions {
    pub period: ChartPeriod,
    pub size: ChartSize,
    pub kind: ChartKind,
    pub technical_analysis: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            period: ChartPeriod::Daily,
            size: ChartSize::Large,
            kind: ChartKind::Candles,
            technical_analysis: true,
        }
    }
}

impl ChartOptions {
    /// Query pairs in server order, without the ticker.
    pub fn query_pairs(&self) -> [(&'static str, &'static str); 4] {
        let kind = match self.kind {
            ChartKind::Candles => "c",
            ChartKind::Line => "l",
        };
        let period = match self.period {
            ChartPeriod::Daily => "d",
            ChartPeriod::Weekly => "w",
            ChartPeriod::Monthly => "m",
        };
        let size = match self.size {
            ChartSize::Large => "l",
            ChartSize::Small => "s",
        };
        let ta = if self.technical_analysis { "1" } else { "0" };
        [("ty", kind), ("ta", ta), ("p", period), ("s", size)]
    }
}

/// Immutable filter snapshot for one primary fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InsiderQuery {
    transaction: TransactionType,
    order: Option<String>,
    rows: Option<usize>,
}

/// Filters layered on top of an existing query. Unset fields keep the previous value.
#[derive(Debug, Clone, Default)]
pub struct FilterUpdate {
    pub transaction: Option<TransactionType>,
    pub order: Option<String>,
    pub rows: Option<usize>,
}

impl InsiderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction(mut self, transaction: TransactionType) -> Self {
        self.transaction = transaction;
        self
    }

    /// Sort key, optionally prefixed with `-` for descending order. Blank keys clear the order.
    pub fn order(mut self, order: impl Into<String>) -> Self {
        let order = order.into();
        let trimmed = order.trim();
        self.order = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    /// Row cap; zero means no cap.
    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = (rows > 0).then_some(rows);
        self
    }

    pub fn transaction_type(&self) -> TransactionType {
        self.transaction
    }

    pub fn sort_order(&self) -> Option<&str> {
        self.order.as_deref()
    }

    pub fn row_cap(&self) -> Option<usize> {
        self.rows
    }

    /// Build the snapshot for the next fetch without touching this one.
    pub fn refine(&self, update: FilterUpdate) -> Self {
        let mut next = self.clone();
        if let Some(transaction) = update.transaction {
            next = next.transaction(transaction);
        }
        if let Some(order) = update.order.filter(|order| !order.trim().is_empty()) {
            next = next.order(order);
        }
        if let Some(rows) = update.rows.filter(|rows| *rows > 0) {
            next = next.rows(rows);
        }
        next
    }

    /// Parameters sent to the server, in canonical order.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(2);
        if let Some(code) = self.transaction.code() {
            params.push(("tc".to_string(), code.to_string()));
        }
        if let Some(order) = &self.order {
            params.push(("o".to_string(), order.clone()));
        }
        params
    }

    /// Canonical, percent-encoded query string (without the leading `?`).
    pub fn query_string(&self) -> String {
        let mut url = match reqwest::Url::parse("http://query.local/") {
            Ok(url) => url,
            Err(_) => return String::new(),
        };
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in self.params() {
                pairs.append_pair(&key, &value);
            }
        }
        url.query().unwrap_or_default().to_string()
    }
}

impl fmt::Display for InsiderQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_transaction_omits_parameter() {
        let query = InsiderQuery::new();
        assert_eq!(query.query_string(), "");

        let sorted = InsiderQuery::new().order("-price");
        assert_eq!(sorted.query_string(), "o=-price");
    }

    #[test]
    fn transaction_codes_are_fixed() {
        let buy = InsiderQuery::new().transaction(TransactionType::Buy);
        assert_eq!(buy.query_string(), "tc=1");

        let sell = InsiderQuery::new()
            .transaction(TransactionType::Sell)
            .order("date");
        assert_eq!(sell.query_string(), "tc=2&o=date");
    }

    #[test]
    fn unknown_tokens_fall_back_to_defaults() {
        assert_eq!(TransactionType::from_token("BUY"), TransactionType::Buy);
        assert_eq!(TransactionType::from_token("hold"), TransactionType::Unset);
        assert_eq!(lenient::<ChartPeriod>("y"), ChartPeriod::Daily);
        assert_eq!(lenient::<ChartSize>("s"), ChartSize::Small);
    }

    #[test]
    fn strict_parse_reports_invalid_filter() {
        let err = "hold".parse::<TransactionType>().expect_err("should reject");
        assert!(matches!(err, AppError::InvalidFilter { kind: "transaction type", .. }));
    }

    #[test]
    fn refine_produces_new_snapshot() {
        let base = InsiderQuery::new().transaction(TransactionType::Buy).rows(20);
        let next = base.refine(FilterUpdate {
            order: Some("-value".to_string()),
            rows: Some(0),
            ..FilterUpdate::default()
        });

        assert_eq!(base.sort_order(), None);
        assert_eq!(next.sort_order(), Some("-value"));
        assert_eq!(next.row_cap(), Some(20));
        assert_eq!(next.transaction_type(), TransactionType::Buy);
    }

    #[test]
    fn chart_options_encode_in_server_order() {
        let options = ChartOptions {
            period: ChartPeriod::Weekly,
            size: ChartSize::Small,
            kind: ChartKind::Line,
            technical_analysis: false,
        };
        assert_eq!(
            options.query_pairs(),
            [("ty", "l"), ("ta", "0"), ("p", "w"), ("s", "s")]
        );
    }
}
