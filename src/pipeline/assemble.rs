//! Table assembly: raw indicator tables, the imputed daily indicator table,
//! and the merged model dataset.

use crate::align::impute::impute;
use crate::align::scale::min_max_scale;
use crate::align::{AlignError, DateRange, reindex_daily};
use crate::features::{FEATURE_COLUMNS, TARGET_COLUMN, price_features};
use crate::frame::{DailyTable, FrameError, JoinKind};
use crate::models::{IndicatorClass, Observation, PriceBar};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Wide table over the union of observation dates; each series is empty on
/// dates it was not observed.
pub fn observations_table(series: &[(String, Vec<Observation>)]) -> Result<DailyTable, FrameError> {
    let dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|(_, obs)| obs.iter().map(|o| o.date))
        .collect();
    let dates: Vec<NaiveDate> = dates.into_iter().collect();
    let mut table = DailyTable::new(dates.clone())?;

    for (name, obs) in series {
        let mut values = vec![None; dates.len()];
        for o in obs.iter().filter(|o| o.value.is_finite()) {
            if let Ok(i) = dates.binary_search(&o.date) {
                values[i] = Some(o.value);
            }
        }
        table.add_column(name, values)?;
    }
    Ok(table)
}

/// How one column of the raw table is carried onto the daily calendar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnPolicy {
    pub class: IndicatorClass,
    pub scale: bool,
}

/// Reindex every column of `raw` onto `range`, impute it by its class,
/// optionally rescale to [-1, 1] with bounds taken from the observed values,
/// and add a `<name>_was_missing` flag.
/// Columns with nothing inside the range are dropped with a warning.
pub fn impute_table<F>(
    raw: &DailyTable,
    range: DateRange,
    policy: F,
    missing_flags: bool,
) -> Result<DailyTable>
where
    F: Fn(&str) -> ColumnPolicy,
{
    let mut out = DailyTable::from_range(range);
    for name in raw.column_names() {
        let p = policy(name);
        let daily = reindex_daily(name, &raw.observations(name)?, range);
        let imputed = match impute(&daily, p.class) {
            Ok(s) => s,
            Err(AlignError::NoObservations(n)) => {
                warn!("{}: no observations in {}..{}, dropped", n, range.start(), range.end());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            "{} [{}]: {} observed, {} filled{}",
            name,
            p.class,
            daily.observed_count(),
            imputed.filled_count(),
            if p.scale { ", scaled" } else { "" }
        );

        let values: Vec<Option<f64>> = imputed.values.iter().copied().map(Some).collect();
        let values = if p.scale { min_max_scale(&daily.values, &values) } else { values };
        out.add_column(name, values)?;
        if missing_flags {
            let flags = imputed
                .was_missing
                .iter()
                .map(|m| Some(if *m { 1.0 } else { 0.0 }))
                .collect();
            out.add_column(&imputed.flag_column_name(), flags)?;
        }
    }
    Ok(out)
}

/// Rename every column to `<prefix>_<name>`.
pub fn prefix_columns(table: &mut DailyTable, prefix: &str) -> Result<(), FrameError> {
    let names: Vec<String> = table.column_names().map(str::to_string).collect();
    for name in names {
        table.rename_column(&name, &format!("{prefix}_{name}"))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    pub how: JoinKind,
    /// Forward then backward fill feature and input columns (never the label).
    pub fill: bool,
    /// Drop rows where any feature column is still empty.
    pub drop_incomplete: bool,
    /// Rename each input's columns to `<input label>_<column>` before joining.
    pub prefix: bool,
}

/// Price features restricted to `range`, joined with each daily table.
pub fn build_dataset(
    bars: &[PriceBar],
    range: DateRange,
    tables: &[(String, DailyTable)],
    opts: MergeOptions,
) -> Result<DailyTable> {
    let in_range: Vec<PriceBar> = bars.iter().filter(|b| range.contains(b.date)).cloned().collect();
    let mut merged = price_features(&in_range).context("price features")?;
    info!("{} trading days with features", merged.len());

    for (label, table) in tables {
        let mut table = table.clone();
        if opts.prefix {
            prefix_columns(&mut table, label)?;
        }
        merged = merged
            .join(&table, opts.how)
            .with_context(|| format!("joining {}", label))?;
        debug!("after {}: {} rows", label, merged.len());
    }

    if opts.fill {
        let target = merged.require(TARGET_COLUMN)?.to_vec();
        merged.fill_forward_backward();
        merged.set_column(TARGET_COLUMN, target)?;
    }
    if opts.drop_incomplete {
        let before = merged.len();
        merged = merged.drop_incomplete(&FEATURE_COLUMNS)?;
        info!("{} rows with incomplete features dropped", before - merged.len());
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2020, m, day).unwrap()
    }

    #[test]
    fn test_observations_table_unions_dates() {
        let t = observations_table(&[
            ("monthly".into(), vec![Observation::new(d(1, 1), 1.0), Observation::new(d(2, 1), 2.0)]),
            ("quarterly".into(), vec![Observation::new(d(1, 1), 10.0), Observation::new(d(4, 1), 11.0)]),
        ])
        .unwrap();
        assert_eq!(t.dates(), &[d(1, 1), d(2, 1), d(4, 1)]);
        assert_eq!(t.column("monthly").unwrap(), &[Some(1.0), Some(2.0), None]);
        assert_eq!(t.column("quarterly").unwrap(), &[Some(10.0), None, Some(11.0)]);
    }

    #[test]
    fn test_impute_table_flags_and_scaling() {
        let raw = observations_table(&[
            ("sent".into(), vec![Observation::new(d(1, 2), 50.0), Observation::new(d(1, 6), 90.0)]),
            ("close".into(), vec![Observation::new(d(1, 2), 10.0), Observation::new(d(1, 4), 14.0)]),
            ("empty".into(), vec![Observation::new(d(3, 1), 1.0)]),
        ])
        .unwrap();
        let range = DateRange::new(d(1, 1), d(1, 7)).unwrap();
        let table = impute_table(
            &raw,
            range,
            |name| ColumnPolicy {
                class: if name == "close" { IndicatorClass::Price } else { IndicatorClass::Indicator },
                scale: name == "sent",
            },
            true,
        )
        .unwrap();

        assert_eq!(table.len(), 7);
        assert!(!table.has_column("empty"));
        let close = table.column("close").unwrap();
        assert_eq!(close[0], Some(10.0));
        assert_eq!(close[2], Some(12.0));
        assert_eq!(close[6], Some(14.0));
        let flags = table.column("close_was_missing").unwrap();
        assert_eq!(flags[1], Some(0.0));
        assert_eq!(flags[2], Some(1.0));

        let sent = table.column("sent").unwrap();
        assert!(sent.iter().all(|v| v.is_some_and(|v| (-1.0..=1.0).contains(&v))));
        assert_eq!(table.missing_counts().iter().map(|(_, n)| n).sum::<usize>(), 0);
    }

    #[test]
    fn test_scaling_bounds_come_from_observations() {
        let raw = observations_table(&[(
            "consumer_sentiment".into(),
            vec![
                Observation::new(d(1, 1), 50.0),
                Observation::new(d(2, 1), 100.0),
                Observation::new(d(3, 1), 50.0),
                Observation::new(d(4, 1), 75.0),
            ],
        )])
        .unwrap();
        let range = DateRange::new(d(1, 1), d(4, 1)).unwrap();
        let table = impute_table(
            &raw,
            range,
            |_| ColumnPolicy { class: IndicatorClass::Indicator, scale: true },
            false,
        )
        .unwrap();

        let values = table.column("consumer_sentiment").unwrap();
        let peak = values[range.index_of(d(2, 1)).unwrap()].unwrap();
        let max = values.iter().flatten().copied().fold(f64::MIN, f64::max);
        let min = values.iter().flatten().copied().fold(f64::MAX, f64::min);
        // Smoothing flattens the peak, so it no longer reaches the observed max
        assert!(peak < 1.0, "peak scaled to {peak}");
        assert!(max < 1.0);
        assert!(min > -1.0);
    }

    #[test]
    fn test_build_dataset_joins_and_keeps_label() {
        let bars: Vec<PriceBar> = (1..=10)
            .map(|day| PriceBar {
                date: d(1, day),
                open: 100.0,
                high: 102.0,
                low: 99.0,
                close: 100.0 + day as f64,
                volume: 1e6,
            })
            .collect();
        let range = DateRange::new(d(1, 1), d(1, 8)).unwrap();
        let mut news = DailyTable::from_range(DateRange::new(d(1, 3), d(1, 12)).unwrap());
        news.add_column("news_score", vec![Some(0.5); 10]).unwrap();

        let inner = build_dataset(
            &bars,
            range,
            &[("news".into(), news.clone())],
            MergeOptions { how: JoinKind::Inner, fill: false, drop_incomplete: false, prefix: false },
        )
        .unwrap();
        assert_eq!(inner.dates().first(), Some(&d(1, 3)));
        assert_eq!(inner.len(), 6);

        let left = build_dataset(
            &bars,
            range,
            &[("news".into(), news.clone())],
            MergeOptions { how: JoinKind::Left, fill: true, drop_incomplete: false, prefix: false },
        )
        .unwrap();
        assert_eq!(left.len(), 8);
        assert_eq!(left.column("news_score").unwrap()[0], Some(0.5));
        for name in FEATURE_COLUMNS {
            assert!(left.has_column(name));
        }
        // The last in-range day has no next close inside the range
        assert_eq!(left.column(TARGET_COLUMN).unwrap()[7], None);
        assert_eq!(left.column(TARGET_COLUMN).unwrap()[0], Some(1.0));

        // sentiment_weight needs a 21-day window, longer than the range
        let complete = build_dataset(
            &bars,
            range,
            &[("news".into(), news)],
            MergeOptions { how: JoinKind::Left, fill: false, drop_incomplete: true, prefix: true },
        )
        .unwrap();
        assert!(complete.has_column("news_news_score"));
        assert!(complete.is_empty());
    }

    #[test]
    fn test_prefix_columns() {
        let mut t = DailyTable::from_range(DateRange::new(d(1, 1), d(1, 2)).unwrap());
        t.add_column("score", vec![None, None]).unwrap();
        prefix_columns(&mut t, "reddit").unwrap();
        assert!(t.has_column("reddit_score"));
    }
}
