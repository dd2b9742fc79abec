//! Stage orchestrator: every CLI subcommand is one method here.
//!
//! ## Data flow
//!
//! ```text
//! fetch-indicators → indicators_raw.csv → impute → indicators_daily.csv ─┐
//! fetch-prices     → prices.jsonl ───────────────────────────────────────┤
//! fetch-news       → news_sentiment.csv → daily → news_daily.csv ────────┼→ merge → model_dataset.csv
//! fetch-reddit     → reddit_posts.csv   → daily → reddit_daily.csv ──────┘
//! ```
//!
//! Stages only communicate through files in `storage.data_dir`, so any stage
//! can be rerun on its own. Outputs are rewritten whole on every run.

pub mod assemble;
pub mod news;
pub mod report;

use crate::align::DateRange;
use crate::config::AppConfig;
use crate::frame::DailyTable;
use crate::loader::{load_prices, load_records, load_table};
use crate::models::Observation;
use crate::sentiment::calibrate::Calibration;
use crate::sentiment::{ScorerKind, build_scorer, daily_mean};
use crate::sources::http_client::HttpClient;
use crate::sources::{
    ArticleFetcher, FredClient, GdeltClient, PriceSource, RedditClient, SeriesSource, YahooClient,
};
use crate::storage::{self, FlatFileStore};
use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use self::assemble::{ColumnPolicy, MergeOptions, build_dataset, impute_table, observations_table};
use self::news::{NewsCollector, collect_posts};

pub struct Pipeline {
    config: AppConfig,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    fn range(&self) -> Result<DateRange> {
        Ok(self.config.range.date_range()?)
    }

    fn store(&self) -> Result<FlatFileStore> {
        FlatFileStore::open(&self.config.storage.data_dir)
    }

    fn http(&self) -> Result<Arc<HttpClient>> {
        Ok(Arc::new(HttpClient::new(&self.config.http)?))
    }

    /// Default location of a stage file inside the data directory.
    pub fn data_path(&self, file_name: &str) -> PathBuf {
        self.config.storage.path(file_name)
    }

    // ── Fetch stages ──────────────────────────────────────────────────────────

    /// Every configured FRED series on its native dates.
    pub async fn fetch_indicators(&self) -> Result<StageStats> {
        let range = self.range()?;
        let fred = FredClient::new(&self.config.fred, self.http()?)?;

        let mut series: Vec<(String, Vec<Observation>)> = Vec::new();
        let mut errors = 0usize;
        for spec in &self.config.fred.series {
            match fred.fetch_series(&spec.series_id, range).await {
                Ok(obs) if obs.is_empty() => {
                    warn!("{} ({}): no observations", spec.name, spec.series_id);
                    errors += 1;
                }
                Ok(obs) => {
                    info!(
                        "✓ {} ({}): {} → {}",
                        spec.name,
                        spec.series_id,
                        obs[0].date,
                        obs[obs.len() - 1].date
                    );
                    series.push((spec.name.clone(), obs));
                }
                Err(e) => {
                    warn!("✗ {} ({}): {:#}", spec.name, spec.series_id, e);
                    errors += 1;
                }
            }
        }
        if series.is_empty() {
            bail!("No FRED series could be fetched");
        }

        let table = observations_table(&series)?;
        let output = self.store()?.write_table(storage::INDICATORS_RAW, &table)?;
        Ok(StageStats::new(output, table.len(), errors))
    }

    pub async fn fetch_prices(&self) -> Result<StageStats> {
        let range = self.range()?;
        let yahoo = YahooClient::new(&self.config.yahoo, self.http()?);
        let bars = yahoo
            .fetch_bars(&self.config.yahoo.symbol, range)
            .await
            .with_context(|| format!("Price fetch failed for {}", self.config.yahoo.symbol))?;
        if bars.is_empty() {
            bail!("No bars returned for {}", self.config.yahoo.symbol);
        }
        let output = self.store()?.write_prices(storage::PRICES, &bars)?;
        Ok(StageStats::new(output, bars.len(), 0))
    }

    pub async fn fetch_news(&self, scorer: Option<ScorerKind>) -> Result<StageStats> {
        let range = self.range()?;
        let http = self.http()?;
        let kind = scorer.unwrap_or(self.config.sentiment.strategy);
        info!("Scoring articles with the {:?} strategy", kind);

        let collector = NewsCollector::new(
            Arc::new(GdeltClient::new(&self.config.news, Arc::clone(&http))),
            Arc::new(ArticleFetcher::new(&self.config.news, Arc::clone(&http))),
            build_scorer(kind, &self.config.sentiment, http),
            self.config.news.clone(),
        );
        let (records, stats) = collector.collect(range).await;
        info!(
            "{} scored, {} placeholders ({} timeouts), {} errors",
            stats.scored, stats.placeholders, stats.timeouts, stats.errors
        );
        let output = self.store()?.write_records(storage::NEWS_SENTIMENT, &records)?;
        Ok(StageStats::new(output, records.len(), stats.errors))
    }

    pub async fn fetch_reddit(&self, scorer: Option<ScorerKind>) -> Result<StageStats> {
        let range = self.range()?;
        let http = self.http()?;
        let kind = scorer.unwrap_or(self.config.sentiment.strategy);
        let client = RedditClient::new(&self.config.reddit, Arc::clone(&http))?;

        let (records, stats) = collect_posts(
            Arc::new(client),
            build_scorer(kind, &self.config.sentiment, http),
            &self.config.reddit,
            range,
        )
        .await;
        let output = self.store()?.write_records(storage::REDDIT_POSTS, &records)?;
        Ok(StageStats::new(output, records.len(), stats.errors))
    }

    // ── Transform stages ──────────────────────────────────────────────────────

    /// Raw indicators (plus the equity close, when a price file is given)
    /// onto the daily calendar.
    pub fn impute(&self, input: &Path, prices: Option<&Path>, output: &str) -> Result<StageStats> {
        let range = self.range()?;
        let mut raw = load_table(input)?;

        let price_column = self.config.indicators.price_column.clone();
        if let Some(path) = prices {
            let bars = load_prices(path)?;
            let closes: Vec<Observation> =
                bars.iter().map(|b| Observation::new(b.date, b.close)).collect();
            let close_table = observations_table(&[(price_column.clone(), closes)])?;
            raw = union_join(&raw, &close_table)?;
        }

        let fred = &self.config.fred;
        let default_class = self.config.indicators.default_class;
        let policy = |name: &str| match fred.spec_for(name) {
            Some(spec) => ColumnPolicy {
                class: spec.class,
                scale: spec.scale,
            },
            None if name == price_column => ColumnPolicy {
                class: crate::models::IndicatorClass::Price,
                scale: false,
            },
            None => ColumnPolicy {
                class: default_class,
                scale: false,
            },
        };

        let table = impute_table(&raw, range, policy, self.config.indicators.missing_flags)?;
        let output = self.store()?.write_table(output, &table)?;
        Ok(StageStats::new(output, table.len(), 0))
    }

    /// Per-day mean score of a record file over the configured range.
    pub fn daily(&self, input: &Path, column: &str, output: &str) -> Result<StageStats> {
        let range = self.range()?;
        let records = load_records(input)?;
        let table = daily_mean(&records, range, column)?;
        let output = self.store()?.write_table(output, &table)?;
        Ok(StageStats::new(output, table.len(), 0))
    }

    /// Fit `target` onto `reference`'s scale and write calibrated records.
    pub fn calibrate(&self, reference: &Path, target: &Path, output: &Path) -> Result<Calibration> {
        let reference = load_records(reference)?;
        let target_records = load_records(target)?;
        let cal = Calibration::fit(&reference, &target_records)?;
        info!(
            "slope {:.4}, intercept {:.4} over {} pairs",
            cal.slope, cal.intercept, cal.pairs
        );
        storage::write_records_csv(output, &cal.apply_all(&target_records))?;
        Ok(cal)
    }

    /// Price features joined with every daily input table.
    pub fn merge(&self, prices: &Path, inputs: &[PathBuf], opts: MergeOptions) -> Result<StageStats> {
        let range = self.range()?;
        let bars = load_prices(prices)?;
        let tables = inputs
            .iter()
            .map(|p| {
                let label = p
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string());
                Ok((label, load_table(p)?))
            })
            .collect::<Result<Vec<_>>>()?;

        let dataset = build_dataset(&bars, range, &tables, opts)?;
        if dataset.is_empty() {
            warn!("Merged dataset has no rows; check --how and --dropna against the inputs");
        }
        let output = self.store()?.write_table(storage::MODEL_DATASET, &dataset)?;
        Ok(StageStats::new(output, dataset.len(), 0))
    }
}

/// Outer join on date of two tables with disjoint columns.
fn union_join(a: &DailyTable, b: &DailyTable) -> Result<DailyTable> {
    let mut dates: Vec<_> = a.dates().iter().chain(b.dates()).copied().collect();
    dates.sort();
    dates.dedup();
    let base = DailyTable::new(dates)?;
    let joined = base
        .join(a, crate::frame::JoinKind::Left)?
        .join(b, crate::frame::JoinKind::Left)?;
    Ok(joined)
}

#[derive(Debug)]
pub struct StageStats {
    pub output: PathBuf,
    pub rows_written: usize,
    pub errors: usize,
}

impl StageStats {
    fn new(output: PathBuf, rows_written: usize, errors: usize) -> Self {
        Self {
            output,
            rows_written,
            errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceBar, SentimentLabel, SentimentRecord};
    use crate::storage::{write_prices_jsonl, write_records_csv, write_table_csv};
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, 1, day).unwrap()
    }

    fn pipeline(dir: &Path) -> Pipeline {
        let mut config = AppConfig::default();
        config.range.start = d(1);
        config.range.end = d(10);
        config.storage.data_dir = dir.to_path_buf();
        Pipeline::new(config)
    }

    #[test]
    fn test_impute_daily_and_merge_stages() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());

        let mut raw = DailyTable::new(vec![d(1), d(6)]).unwrap();
        raw.add_column("consumer_sentiment", vec![Some(60.0), Some(80.0)]).unwrap();
        raw.add_column("corp_profits", vec![Some(2000.0), None]).unwrap();
        let raw_path = p.data_path(storage::INDICATORS_RAW);
        write_table_csv(&raw_path, &raw).unwrap();

        let bars: Vec<PriceBar> = (2..=9)
            .map(|day| PriceBar {
                date: d(day),
                open: 100.0,
                high: 101.0,
                low: 99.0,
                close: 100.0 + (day % 3) as f64,
                volume: 1e6,
            })
            .collect();
        let prices = p.data_path(storage::PRICES);
        write_prices_jsonl(&prices, &bars).unwrap();

        let stats = p.impute(&raw_path, Some(&prices), storage::INDICATORS_DAILY).unwrap();
        assert_eq!(stats.rows_written, 10);
        let daily = load_table(&stats.output).unwrap();
        for col in ["consumer_sentiment", "corp_profits", "aapl_close", "aapl_close_was_missing"] {
            assert!(daily.has_column(col), "missing {col}");
        }
        assert!(daily.missing_counts().iter().all(|(_, n)| *n == 0));

        let news = p.data_path(storage::NEWS_SENTIMENT);
        write_records_csv(
            &news,
            &[SentimentRecord {
                title: Some("Apple rallies".into()),
                score: 0.6,
                sentiment: SentimentLabel::Positive,
                ..SentimentRecord::placeholder(d(3))
            }],
        )
        .unwrap();
        let nd = p.daily(&news, "news_score", storage::NEWS_DAILY).unwrap();

        let merged = p
            .merge(
                &prices,
                &[stats.output, nd.output],
                MergeOptions {
                    how: crate::frame::JoinKind::Inner,
                    fill: false,
                    drop_incomplete: false,
                    prefix: false,
                },
            )
            .unwrap();
        assert_eq!(merged.rows_written, 8);
        let dataset = load_table(&merged.output).unwrap();
        assert_eq!(dataset.column("news_score").unwrap()[1], Some(0.6));
        assert!(dataset.has_column("consumer_sentiment_was_missing"));
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(dir.path());
        let err = p
            .daily(&dir.path().join("absent.csv"), "x", "out.csv")
            .unwrap_err();
        assert!(format!("{err:#}").contains("File not found"));
    }
}
