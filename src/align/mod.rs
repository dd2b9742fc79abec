//! Calendar alignment for irregular series.
//!
//! Monthly, quarterly and event-dated series are re-expressed on a dense
//! daily calendar here; [`impute`] fills the empty slots and [`scale`]
//! rescales bounded indicators.

pub mod impute;
pub mod scale;

use crate::models::Observation;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum AlignError {
    #[error("date range is inverted: {start} > {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },

    #[error("series {0:?} has no observations inside the range")]
    NoObservations(String),
}

// ── Date range ────────────────────────────────────────────────────────────────

/// Inclusive calendar-day range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AlignError> {
        if start > end {
            return Err(AlignError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of days, both ends included.
    pub fn len(&self) -> usize {
        (self.end - self.start).num_days() as usize + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.contains(date)
            .then(|| (date - self.start).num_days() as usize)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.start.iter_days().take(self.len())
    }

    /// Split into consecutive sub-ranges of at most `size` days.
    pub fn chunks(&self, size: usize) -> Vec<DateRange> {
        let size = size.max(1) as i64;
        let mut out = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            let last = (cursor + Duration::days(size - 1)).min(self.end);
            out.push(DateRange { start: cursor, end: last });
            cursor = last + Duration::days(1);
        }
        out
    }
}

// ── Daily series ──────────────────────────────────────────────────────────────

/// A named series with one slot per day of its range.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries {
    pub name: String,
    pub range: DateRange,
    pub values: Vec<Option<f64>>,
}

impl DailySeries {
    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Place observations on every day of `range`.
///
/// Days without an observation stay empty for the imputation stage. Points
/// outside the range and non-finite values are dropped; a repeated date
/// keeps its last value.
pub fn reindex_daily(name: &str, observations: &[Observation], range: DateRange) -> DailySeries {
    let mut values = vec![None; range.len()];
    for obs in observations {
        if !obs.value.is_finite() {
            continue;
        }
        if let Some(i) = range.index_of(obs.date) {
            values[i] = Some(obs.value);
        }
    }
    DailySeries {
        name: name.to_string(),
        range,
        values,
    }
}

/// Calendar days missing between the earliest and latest of `dates`.
pub fn missing_dates(dates: &[NaiveDate]) -> Vec<NaiveDate> {
    let present: BTreeSet<NaiveDate> = dates.iter().copied().collect();
    let (Some(first), Some(last)) = (present.first(), present.last()) else {
        return vec![];
    };
    first
        .iter_days()
        .take_while(|d| d <= last)
        .filter(|d| !present.contains(d))
        .collect()
}
