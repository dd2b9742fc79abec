//! Read-only reports over a daily table.

use crate::align::missing_dates;
use crate::frame::{DailyTable, FrameError, pearson};
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: usize,
    pub first: Option<NaiveDate>,
    pub last: Option<NaiveDate>,
    /// (column, empty cells), in column order.
    pub missing: Vec<(String, usize)>,
    pub calendar_gaps: Vec<NaiveDate>,
}

pub fn summarize(table: &DailyTable) -> TableSummary {
    TableSummary {
        rows: table.len(),
        first: table.dates().first().copied(),
        last: table.dates().last().copied(),
        missing: table.missing_counts(),
        calendar_gaps: missing_dates(table.dates()),
    }
}

/// Correlation of every other column with `target`, strongest first.
/// Columns with too little overlap or no variance are left out.
pub fn correlations(table: &DailyTable, target: &str) -> Result<Vec<(String, f64)>, FrameError> {
    let y = table.require(target)?;
    let mut out: Vec<(String, f64)> = table
        .columns()
        .iter()
        .filter(|c| c.name != target)
        .filter_map(|c| Some((c.name.clone(), pearson(&c.values, y)?)))
        .collect();
    out.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()).then_with(|| a.0.cmp(&b.0)));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 3, day).unwrap()
    }

    #[test]
    fn test_summary_reports_gaps() {
        let mut t = DailyTable::new(vec![d(1), d(2), d(5)]).unwrap();
        t.add_column("x", vec![Some(1.0), None, None]).unwrap();
        let s = summarize(&t);
        assert_eq!(s.rows, 3);
        assert_eq!(s.first, Some(d(1)));
        assert_eq!(s.calendar_gaps, vec![d(3), d(4)]);
        assert_eq!(s.missing, vec![("x".to_string(), 2)]);
    }

    #[test]
    fn test_correlations_sorted_by_strength() {
        let mut t = DailyTable::new(vec![d(1), d(2), d(3), d(4)]).unwrap();
        t.add_column("target", vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0)]).unwrap();
        t.add_column("inverse", vec![Some(1.0), Some(0.0), Some(1.0), Some(0.0)]).unwrap();
        t.add_column("weak", vec![Some(1.0), Some(2.0), Some(2.0), Some(1.5)]).unwrap();
        t.add_column("flat", vec![Some(3.0); 4]).unwrap();
        let c = correlations(&t, "target").unwrap();
        assert_eq!(c.len(), 2);
        assert_eq!(c[0].0, "inverse");
        assert!((c[0].1 + 1.0).abs() < 1e-12);
        assert!(correlations(&t, "nope").is_err());
    }
}
