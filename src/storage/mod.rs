//! Flat-file outputs. Every stage writes a whole new file; nothing is updated
//! in place, and a rerun overwrites its previous output.

use crate::frame::DailyTable;
use crate::models::{PriceBar, SentimentRecord};
use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

// ── File names ────────────────────────────────────────────────────────────────

pub const INDICATORS_RAW: &str = "indicators_raw.csv";
pub const INDICATORS_DAILY: &str = "indicators_daily.csv";
pub const PRICES: &str = "prices.jsonl";
pub const NEWS_SENTIMENT: &str = "news_sentiment.csv";
pub const NEWS_DAILY: &str = "news_daily.csv";
pub const REDDIT_POSTS: &str = "reddit_posts.csv";
pub const REDDIT_DAILY: &str = "reddit_daily.csv";
pub const MODEL_DATASET: &str = "model_dataset.csv";

pub struct FlatFileStore {
    dir: PathBuf,
}

impl FlatFileStore {
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    pub fn write_table(&self, file_name: &str, table: &DailyTable) -> Result<PathBuf> {
        let path = self.path(file_name);
        write_table_csv(&path, table)?;
        info!("Wrote {} rows × {} columns to {:?}", table.len(), table.columns().len(), path);
        Ok(path)
    }

    pub fn write_records(&self, file_name: &str, records: &[SentimentRecord]) -> Result<PathBuf> {
        let path = self.path(file_name);
        write_records_csv(&path, records)?;
        info!("Wrote {} records to {:?}", records.len(), path);
        Ok(path)
    }

    pub fn write_prices(&self, file_name: &str, bars: &[PriceBar]) -> Result<PathBuf> {
        let path = self.path(file_name);
        write_prices_jsonl(&path, bars)?;
        info!("Wrote {} bars to {:?}", bars.len(), path);
        Ok(path)
    }
}

// ── Writers ───────────────────────────────────────────────────────────────────

/// `date` first, then one column per series; absent values are empty cells.
pub fn write_table_csv(path: &Path, table: &DailyTable) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;

    let mut header = vec!["date".to_string()];
    header.extend(table.column_names().map(str::to_string));
    wtr.write_record(&header)?;

    for (row, date) in table.dates().iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(date.to_string());
        for col in table.columns() {
            record.push(col.values[row].map(|v| v.to_string()).unwrap_or_default());
        }
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_records_csv(path: &Path, records: &[SentimentRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {:?}", path))?;
    for r in records {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

/// One JSON object per line.
pub fn write_prices_jsonl(path: &Path, bars: &[PriceBar]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut out = BufWriter::new(file);
    for bar in bars {
        serde_json::to_writer(&mut out, bar)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_table_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FlatFileStore::open(&dir.path().join("out")).unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2020, 1, day).unwrap();
        let mut t = DailyTable::new(vec![d(1), d(2)]).unwrap();
        t.add_column("cpi", vec![Some(1.5), None]).unwrap();
        t.add_column("news_score", vec![Some(-0.25), Some(0.0)]).unwrap();

        let path = store.write_table(INDICATORS_DAILY, &t).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(
            text,
            "date,cpi,news_score\n2020-01-01,1.5,-0.25\n2020-01-02,,0\n"
        );
    }

    #[test]
    fn test_prices_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PRICES);
        let bar = PriceBar {
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            open: 74.0,
            high: 75.0,
            low: 73.5,
            close: 74.5,
            volume: 1e6,
        };
        write_prices_jsonl(&path, &[bar.clone(), bar]).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.starts_with(r#"{"date":"2020-01-02","open":74.0"#));
    }
}
