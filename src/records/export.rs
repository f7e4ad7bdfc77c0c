use std::path::{Path, PathBuf};

use rusqlite::Connection;
use unicode_width::UnicodeWidthStr;

use crate::error::{Context, Result};
use crate::records::{AnalystRating, Dataset};

/// Table name used by the SQLite export.
pub const SQLITE_TABLE: &str = "insider_trades";

/// Timestamped stem for exports saved without an explicit name.
pub fn default_export_stem() -> String {
    format!("insider_{}", chrono::Local::now().format("%Y_%m_%d_%H_%M"))
}

/// Drop a trailing `.csv` so `trades` and `trades.csv` name the same export.
pub fn csv_stem(name: &str) -> &str {
    name.strip_suffix(".csv").unwrap_or(name)
}

/// Write the dataset to `<stem>.csv`, plus `<stem>-analysts.csv` when ratings exist.
/// Returns every file written.
pub fn save_to_csv(dataset: &Dataset, name: &str) -> Result<Vec<PathBuf>> {
    let stem = csv_stem(name);
    let main_path = PathBuf::from(format!("{stem}.csv"));
    let file = std::fs::File::create(&main_path)
        .with_context(|| format!("Failed to create CSV file {}", main_path.display()))?;
    write_csv(dataset, file)?;

    let mut written = vec![main_path];
    if !dataset.analysis().is_empty() {
        let analysts_path = PathBuf::from(format!("{stem}-analysts.csv"));
        write_ratings_csv(dataset.analysis(), &analysts_path)?;
        written.push(analysts_path);
    }
    Ok(written)
}

pub fn to_csv_string(dataset: &Dataset) -> Result<String> {
    let mut buffer = Vec::new();
    write_csv(dataset, &mut buffer)?;
    Ok(String::from_utf8(buffer).context("CSV output was not valid UTF-8")?)
}

fn write_csv<W: std::io::Write>(dataset: &Dataset, sink: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(sink);
    writer.write_record(dataset.headers())?;
    for row in dataset.rows() {
        writer.write_record(row.values(dataset.headers()))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_ratings_csv(ratings: &[AnalystRating], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).context("Failed to create CSV writer")?;
    writer.write_record(AnalystRating::HEADERS)?;
    for rating in ratings {
        writer.write_record(rating.fields())?;
    }
    writer.flush()?;
    Ok(())
}

/// Replace the export table in the SQLite database at `path` with the dataset contents.
pub fn save_to_sqlite<P: AsRef<Path>>(dataset: &Dataset, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut conn = Connection::open(path)
        .with_context(|| format!("Failed to open SQLite database {}", path.display()))?;

    let columns: Vec<String> = dataset.headers().iter().map(|h| quote_ident(h)).collect();
    let tx = conn.transaction()?;
    tx.execute(&format!("DROP TABLE IF EXISTS {}", quote_ident(SQLITE_TABLE)), [])?;
    tx.execute(
        &format!(
            "CREATE TABLE {} ({})",
            quote_ident(SQLITE_TABLE),
            columns
                .iter()
                .map(|column| format!("{column} TEXT"))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        [],
    )?;

    {
        let placeholders = vec!["?"; columns.len()].join(", ");
        let mut insert = tx.prepare(&format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(SQLITE_TABLE),
            columns.join(", "),
            placeholders
        ))?;
        for row in dataset.rows() {
            insert.execute(rusqlite::params_from_iter(row.values(dataset.headers())))?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render the dataset as an aligned text table.
pub fn table_string(dataset: &Dataset) -> String {
    let headers = dataset.headers();
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(h.as_str())).collect();
    for row in dataset.rows() {
        for (width, value) in widths.iter_mut().zip(row.values(headers)) {
            *width = (*width).max(UnicodeWidthStr::width(value));
        }
    }

    let mut out = String::new();
    push_line(&mut out, headers.iter().map(String::as_str), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, rule.iter().map(String::as_str), &widths);
    for row in dataset.rows() {
        push_line(&mut out, row.values(headers), &widths);
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let mut line = String::new();
    for (idx, (cell, width)) in cells.zip(widths).enumerate() {
        if idx > 0 {
            line.push_str(" | ");
        }
        line.push_str(cell);
        let pad = width.saturating_sub(UnicodeWidthStr::width(cell));
        line.extend(std::iter::repeat(' ').take(pad));
    }
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::dataset::{sample_dataset, DatasetChange};

    #[test]
    fn default_stem_is_timestamped() {
        let stem = default_export_stem();
        assert!(stem.starts_with("insider_"));
        assert_eq!(stem.len(), "insider_2024_01_01_00_00".len());
    }

    #[test]
    fn csv_string_follows_header_order() {
        let csv = to_csv_string(&sample_dataset()).expect("csv renders");
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Ticker,Date,Insider"));
        assert_eq!(lines.next(), Some("AAPL,Oct 01,Cook Timothy"));
        assert_eq!(csv.lines().count(), 4);
    }

    #[test]
    fn csv_file_and_analysts_companion() {
        let dir = tempfile::tempdir().expect("temp dir");
        let name = dir.path().join("trades.csv");
        let mut dataset = sample_dataset();
        let ratings = [AnalystRating {
            ticker: "AAPL".to_string(),
            date: "Oct-01-24".to_string(),
            category: "Reiterated".to_string(),
            analyst: "Acme".to_string(),
            rating: "Buy".to_string(),
            price_from: "200".to_string(),
            price_to: "250".to_string(),
        }];
        dataset.apply(DatasetChange::AppendRatings(&ratings));

        let written = save_to_csv(&dataset, name.to_str().expect("utf8 path")).expect("saves");
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("trades.csv"));
        assert!(written[1].ends_with("trades-analysts.csv"));

        let analysts = std::fs::read_to_string(&written[1]).expect("read analysts");
        assert!(analysts.starts_with("ticker,date,category,analyst,rating,price_from,price_to"));
    }

    #[test]
    fn sqlite_export_replaces_table() {
        let dir = tempfile::tempdir().expect("temp dir");
        let db = dir.path().join("insider.sqlite");
        let dataset = sample_dataset();

        save_to_sqlite(&dataset, &db).expect("first export");
        save_to_sqlite(&dataset, &db).expect("second export");

        let conn = Connection::open(&db).expect("open db");
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM insider_trades", [], |row| row.get(0))
            .expect("count rows");
        assert_eq!(count, 3);
        let insider: String = conn
            .query_row(
                "SELECT \"Insider\" FROM insider_trades WHERE \"Ticker\" = 'MSFT'",
                [],
                |row| row.get(0),
            )
            .expect("query insider");
        assert_eq!(insider, "Nadella Satya");
    }

    #[test]
    fn table_string_pads_columns() {
        let table = table_string(&sample_dataset());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "Ticker | Date   | Insider");
        assert!(lines[1].starts_with("------ | ------ | -------"));
        assert_eq!(lines[2], "AAPL   | Oct 01 | Cook Timothy");
    }

    #[test]
    fn csv_stem_strips_extension_once() {
        assert_eq!(csv_stem("trades.csv"), "trades");
        assert_eq!(csv_stem("trades"), "trades");
    }
}
