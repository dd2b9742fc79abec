//! Date-keyed tables of optional floats, and the joins between them.

use crate::align::DateRange;
use crate::align::impute::{backward_fill, forward_fill};
use crate::models::Observation;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FrameError {
    #[error("column {0:?} already exists")]
    DuplicateColumn(String),

    #[error("column {0:?} not found")]
    MissingColumn(String),

    #[error("column {name:?} has {got} values but the table has {expected} rows")]
    LengthMismatch {
        name: String,
        got: usize,
        expected: usize,
    },

    #[error("dates must be strictly increasing (row {row}: {date})")]
    UnsortedDates { row: usize, date: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Keep only dates present in both tables.
    #[default]
    Inner,
    /// Keep every left date; right columns are empty where absent.
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Rows keyed by strictly increasing calendar dates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailyTable {
    dates: Vec<NaiveDate>,
    columns: Vec<Column>,
}

impl DailyTable {
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, FrameError> {
        for (row, pair) in dates.windows(2).enumerate() {
            if pair[1] <= pair[0] {
                return Err(FrameError::UnsortedDates {
                    row: row + 1,
                    date: pair[1],
                });
            }
        }
        Ok(Self {
            dates,
            columns: Vec::new(),
        })
    }

    /// One row per day of `range`, no columns.
    pub fn from_range(range: DateRange) -> Self {
        Self {
            dates: range.days().collect(),
            columns: Vec::new(),
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    pub fn require(&self, name: &str) -> Result<&[Option<f64>], FrameError> {
        self.column(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_string()))
    }

    pub fn add_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), FrameError> {
        if self.has_column(name) {
            return Err(FrameError::DuplicateColumn(name.to_string()));
        }
        self.check_len(name, values.len())?;
        self.columns.push(Column {
            name: name.to_string(),
            values,
        });
        Ok(())
    }

    /// Replace a column's values, appending it if absent.
    pub fn set_column(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<(), FrameError> {
        self.check_len(name, values.len())?;
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(col) => col.values = values,
            None => self.columns.push(Column {
                name: name.to_string(),
                values,
            }),
        }
        Ok(())
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), FrameError> {
        if from != to && self.has_column(to) {
            return Err(FrameError::DuplicateColumn(to.to_string()));
        }
        let col = self
            .columns
            .iter_mut()
            .find(|c| c.name == from)
            .ok_or_else(|| FrameError::MissingColumn(from.to_string()))?;
        col.name = to.to_string();
        Ok(())
    }

    /// Present values of a column as observations.
    pub fn observations(&self, name: &str) -> Result<Vec<Observation>, FrameError> {
        Ok(self
            .dates
            .iter()
            .zip(self.require(name)?)
            .filter_map(|(d, v)| v.map(|v| Observation::new(*d, v)))
            .collect())
    }

    /// Join on date. Column names must not collide.
    pub fn join(&self, other: &DailyTable, how: JoinKind) -> Result<DailyTable, FrameError> {
        if let Some(dup) = other.column_names().find(|n| self.has_column(n)) {
            return Err(FrameError::DuplicateColumn(dup.to_string()));
        }

        let right_rows: HashMap<NaiveDate, usize> = other
            .dates
            .iter()
            .enumerate()
            .map(|(i, d)| (*d, i))
            .collect();

        let rows: Vec<(usize, Option<usize>)> = self
            .dates
            .iter()
            .enumerate()
            .filter_map(|(i, d)| {
                let r = right_rows.get(d).copied();
                match how {
                    JoinKind::Inner => r.map(|r| (i, Some(r))),
                    JoinKind::Left => Some((i, r)),
                }
            })
            .collect();

        let dates = rows.iter().map(|(l, _)| self.dates[*l]).collect();
        let mut columns = Vec::with_capacity(self.columns.len() + other.columns.len());
        for col in &self.columns {
            columns.push(Column {
                name: col.name.clone(),
                values: rows.iter().map(|(l, _)| col.values[*l]).collect(),
            });
        }
        for col in &other.columns {
            columns.push(Column {
                name: col.name.clone(),
                values: rows
                    .iter()
                    .map(|(_, r)| r.and_then(|r| col.values[r]))
                    .collect(),
            });
        }
        Ok(DailyTable { dates, columns })
    }

    /// Forward fill every column, then back fill what is still empty.
    pub fn fill_forward_backward(&mut self) {
        for col in &mut self.columns {
            col.values = backward_fill(&forward_fill(&col.values));
        }
    }

    /// Rows where every named column is present.
    pub fn drop_incomplete(&self, names: &[&str]) -> Result<DailyTable, FrameError> {
        let idx: Vec<usize> = names
            .iter()
            .map(|n| {
                self.columns
                    .iter()
                    .position(|c| c.name == *n)
                    .ok_or_else(|| FrameError::MissingColumn(n.to_string()))
            })
            .collect::<Result<_, _>>()?;
        let keep: Vec<usize> = (0..self.len())
            .filter(|&row| idx.iter().all(|&c| self.columns[c].values[row].is_some()))
            .collect();
        Ok(DailyTable {
            dates: keep.iter().map(|&r| self.dates[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    values: keep.iter().map(|&r| c.values[r]).collect(),
                })
                .collect(),
        })
    }

    pub fn missing_counts(&self) -> Vec<(String, usize)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.values.iter().filter(|v| v.is_none()).count()))
            .collect()
    }

    fn check_len(&self, name: &str, got: usize) -> Result<(), FrameError> {
        if got != self.dates.len() {
            return Err(FrameError::LengthMismatch {
                name: name.to_string(),
                got,
                expected: self.dates.len(),
            });
        }
        Ok(())
    }
}

/// Pearson correlation over rows where both sides are present.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some(sxy / (sxx.sqrt() * syy.sqrt()))
}
