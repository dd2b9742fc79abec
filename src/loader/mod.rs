//! Readers for the flat files the stages exchange: date-keyed CSV tables,
//! sentiment record CSVs and price bar files.

use crate::frame::DailyTable;
use crate::models::{PriceBar, SentimentRecord};
use crate::sources::cleaner::{parse_date, parse_value};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

fn ensure_exists(path: &Path) -> Result<()> {
    if !path.is_file() {
        bail!("File not found: {:?}", path);
    }
    Ok(())
}

/// Load a CSV whose first column holds dates (header `date`, `Date` or
/// blank, as written by dataframe exports). Rows are sorted by date; a
/// repeated date keeps its last row. Unreadable cells are empty.
pub fn load_table(path: &Path) -> Result<DailyTable> {
    ensure_exists(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let headers = reader.headers()?.clone();
    let first = headers.get(0).unwrap_or("").trim();
    if !(first.is_empty() || first.eq_ignore_ascii_case("date")) {
        warn!("{:?}: first column {:?} is treated as the date", path, first);
    }
    let names: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut rows: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();
    for (i, result) in reader.records().enumerate() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("Row {} in {:?}: {}", i + 1, path, e);
                continue;
            }
        };
        let Some(date) = record.get(0).and_then(parse_date) else {
            warn!("Row {} in {:?}: unreadable date {:?}", i + 1, path, record.get(0));
            continue;
        };
        let values = (0..names.len())
            .map(|c| record.get(c + 1).and_then(parse_value))
            .collect();
        rows.insert(date, values);
    }

    let mut table = DailyTable::new(rows.keys().copied().collect())?;
    for (c, name) in names.iter().enumerate() {
        table
            .add_column(name, rows.values().map(|v| v[c]).collect())
            .with_context(|| format!("{:?}", path))?;
    }
    debug!("{:?}: {} rows × {} columns", path, table.len(), names.len());
    Ok(table)
}

/// Scored articles or posts. Malformed rows are skipped with a warning.
pub fn load_records(path: &Path) -> Result<Vec<SentimentRecord>> {
    ensure_exists(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open {:?}", path))?;

    let mut records = Vec::new();
    for (i, result) in reader.deserialize::<SentimentRecord>().enumerate() {
        match result {
            Ok(r) if r.score.is_finite() => records.push(r),
            Ok(_) => warn!("Row {} in {:?}: non-finite score", i + 1, path),
            Err(e) => warn!("Row {} in {:?}: {}", i + 1, path, e),
        }
    }
    info!("{:?}: {} records loaded", path, records.len());
    Ok(records)
}

/// Price bars from JSON lines or a single JSON array of records.
pub fn load_prices(path: &Path) -> Result<Vec<PriceBar>> {
    ensure_exists(path)?;
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;

    let mut bars: Vec<PriceBar> = if text.trim_start().starts_with('[') {
        serde_json::from_str(&text).with_context(|| format!("{:?} is not a bar array", path))?
    } else {
        let mut out = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(bar) => out.push(bar),
                Err(e) => warn!("Line {} in {:?}: {}", i + 1, path, e),
            }
        }
        out
    };

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    info!("{:?}: {} bars loaded", path, bars.len());
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{write_records_csv, write_table_csv};
    use std::fs;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    #[test]
    fn test_load_table_with_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fred.csv");
        fs::write(
            &path,
            ",consumer_sentiment,corp_profits\n2020-02-01,101.0,\n2020-01-01,99.8,2100.5\nbad,1,2\n2020-02-01,100.9,\n",
        )
        .unwrap();
        let t = load_table(&path).unwrap();
        assert_eq!(t.dates(), &[d(1, 1), d(2, 1)]);
        assert_eq!(t.column("consumer_sentiment").unwrap(), &[Some(99.8), Some(100.9)]);
        assert_eq!(t.column("corp_profits").unwrap(), &[Some(2100.5), None]);
    }

    #[test]
    fn test_table_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let mut t = DailyTable::new(vec![d(1, 1), d(1, 2), d(1, 3)]).unwrap();
        t.add_column("a", vec![Some(0.5), None, Some(-1.0)]).unwrap();
        write_table_csv(&path, &t).unwrap();
        assert_eq!(load_table(&path).unwrap(), t);
    }

    #[test]
    fn test_records_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.csv");
        let recs = vec![
            SentimentRecord::placeholder(d(1, 1)),
            SentimentRecord {
                title: Some("Apple, Inc. rallies".into()),
                score: 0.4,
                sentiment: crate::models::SentimentLabel::Positive,
                language: Some("English".into()),
                ..SentimentRecord::placeholder(d(1, 2))
            },
        ];
        write_records_csv(&path, &recs).unwrap();
        assert_eq!(load_records(&path).unwrap(), recs);

        let err = load_records(&dir.path().join("nope.csv")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_load_prices_both_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let array = dir.path().join("aapl.json");
        fs::write(
            &array,
            r#"[{"Open":1.0,"High":2.0,"Low":0.5,"Close":1.5,"Volume":10,"Date":"2020-01-03T00:00:00.000"},
                {"Open":1.0,"High":2.0,"Low":0.5,"Close":1.2,"Volume":10,"Date":"2020-01-02T00:00:00.000"}]"#,
        )
        .unwrap();
        let bars = load_prices(&array).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, d(1, 2));

        let lines = dir.path().join("prices.jsonl");
        fs::write(
            &lines,
            "{\"date\":\"2020-01-02\",\"open\":1,\"high\":2,\"low\":0.5,\"close\":1.5,\"volume\":3}\n\nnot json\n",
        )
        .unwrap();
        assert_eq!(load_prices(&lines).unwrap().len(), 1);
    }
}
