//! Gap filling for daily series, one policy per [`IndicatorClass`].
//!
//! | class       | interior gaps                 | edges                 | post-step        |
//! |-------------|-------------------------------|-----------------------|------------------|
//! | `Price`     | time-weighted linear          | nearest known value   | —                |
//! | `Indicator` | linear                        | nearest known value   | centred 7-day MA |
//! | `Quarterly` | quadratic (polyfit fallback)  | forward, then back    | —                |

use super::{AlignError, DailySeries, DateRange};
use crate::models::IndicatorClass;
use tracing::debug;

/// Width of the centred moving average applied to indicator-class series.
pub const SMOOTHING_WINDOW: usize = 7;

/// A fully populated series plus a flag per day that was synthesised.
#[derive(Debug, Clone, PartialEq)]
pub struct ImputedSeries {
    pub name: String,
    pub range: DateRange,
    pub values: Vec<f64>,
    pub was_missing: Vec<bool>,
}

impl ImputedSeries {
    pub fn flag_column_name(&self) -> String {
        format!("{}_was_missing", self.name)
    }

    pub fn filled_count(&self) -> usize {
        self.was_missing.iter().filter(|m| **m).count()
    }
}

/// Fill every empty slot of `series` using the policy for `class`.
pub fn impute(series: &DailySeries, class: IndicatorClass) -> Result<ImputedSeries, AlignError> {
    if series.observed_count() == 0 {
        return Err(AlignError::NoObservations(series.name.clone()));
    }

    let was_missing: Vec<bool> = series.values.iter().map(Option::is_none).collect();

    let filled = match class {
        // Slots are one day apart, so positional and time-weighted
        // interpolation coincide.
        IndicatorClass::Price => fill_nearest(&interpolate_linear(&series.values)),
        IndicatorClass::Indicator => {
            let linear = fill_nearest(&interpolate_linear(&series.values));
            centered_mean(&linear, SMOOTHING_WINDOW)
        }
        IndicatorClass::Quarterly => {
            let quad = interpolate_quadratic(&series.values);
            backward_fill(&forward_fill(&quad))
        }
    };

    let values: Vec<f64> = filled.into_iter().flatten().collect();
    debug_assert_eq!(values.len(), series.values.len());

    let out = ImputedSeries {
        name: series.name.clone(),
        range: series.range,
        values,
        was_missing,
    };
    debug!(
        "{} ({}): {} of {} days filled",
        out.name,
        class,
        out.filled_count(),
        out.values.len()
    );
    Ok(out)
}

fn knots(values: &[Option<f64>]) -> Vec<(usize, f64)> {
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect()
}

/// Linear interpolation of interior gaps; leading and trailing gaps stay empty.
pub fn interpolate_linear(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    for pair in knots(values).windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        let span = (x1 - x0) as f64;
        for (x, slot) in out.iter_mut().enumerate().take(x1).skip(x0 + 1) {
            let t = (x - x0) as f64 / span;
            *slot = Some(y0 + (y1 - y0) * t);
        }
    }
    out
}

/// Quadratic interpolation of interior gaps.
///
/// Each gap is evaluated on the parabola through its two bracketing knots
/// and the next knot (the previous one for the final segment). With fewer
/// than three knots this falls back to a least-squares polynomial of degree
/// `knots - 1`.
pub fn interpolate_quadratic(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let pts = knots(values);
    if pts.len() < 3 {
        return interpolate_polyfit(values, pts.len().saturating_sub(1).min(2));
    }

    let mut out = values.to_vec();
    for k in 0..pts.len() - 1 {
        let (x0, _) = pts[k];
        let (x1, _) = pts[k + 1];
        if x1 - x0 < 2 {
            continue;
        }
        let triple = if k + 2 < pts.len() {
            [pts[k], pts[k + 1], pts[k + 2]]
        } else {
            [pts[k - 1], pts[k], pts[k + 1]]
        };
        for (x, slot) in out.iter_mut().enumerate().take(x1).skip(x0 + 1) {
            *slot = Some(lagrange3(&triple, x as f64));
        }
    }
    out
}

fn lagrange3(pts: &[(usize, f64); 3], x: f64) -> f64 {
    let [(a, ya), (b, yb), (c, yc)] = *pts;
    let (a, b, c) = (a as f64, b as f64, c as f64);
    ya * (x - b) * (x - c) / ((a - b) * (a - c))
        + yb * (x - a) * (x - c) / ((b - a) * (b - c))
        + yc * (x - a) * (x - b) / ((c - a) * (c - b))
}

/// Interior gaps from a single least-squares polynomial over all knots.
pub fn interpolate_polyfit(values: &[Option<f64>], degree: usize) -> Vec<Option<f64>> {
    let pts = knots(values);
    let (Some(&(first, _)), Some(&(last, _))) = (pts.first(), pts.last()) else {
        return values.to_vec();
    };
    let xs: Vec<f64> = pts.iter().map(|(x, _)| *x as f64).collect();
    let ys: Vec<f64> = pts.iter().map(|(_, y)| *y).collect();
    let Some(coeffs) = polyfit(&xs, &ys, degree) else {
        return interpolate_linear(values);
    };

    let mut out = values.to_vec();
    for (x, slot) in out.iter_mut().enumerate().take(last).skip(first + 1) {
        if slot.is_none() {
            *slot = Some(polyval(&coeffs, x as f64));
        }
    }
    out
}

/// Least-squares polynomial coefficients, lowest order first. `None` when the
/// normal equations are singular.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Option<Vec<f64>> {
    let m = degree + 1;
    if xs.len() < m || xs.len() != ys.len() {
        return None;
    }
    // Centre x to keep the normal equations well conditioned.
    let shift = xs.iter().sum::<f64>() / xs.len() as f64;

    let mut a = vec![vec![0.0; m + 1]; m];
    for (x, y) in xs.iter().zip(ys) {
        let x = x - shift;
        let powers: Vec<f64> = (0..2 * m).map(|p| x.powi(p as i32)).collect();
        for r in 0..m {
            for c in 0..m {
                a[r][c] += powers[r + c];
            }
            a[r][m] += powers[r] * y;
        }
    }

    // Gauss-Jordan with partial pivoting.
    for col in 0..m {
        let pivot = (col..m).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        let p = a[col][col];
        for v in a[col].iter_mut() {
            *v /= p;
        }
        for r in 0..m {
            if r != col {
                let f = a[r][col];
                if f != 0.0 {
                    for c in col..=m {
                        a[r][c] -= f * a[col][c];
                    }
                }
            }
        }
    }
    let centred: Vec<f64> = a.iter().map(|row| row[m]).collect();
    Some(uncentre(&centred, shift))
}

/// Expand p(x - s) into coefficients of x.
fn uncentre(coeffs: &[f64], shift: f64) -> Vec<f64> {
    let mut out = vec![0.0; coeffs.len()];
    for (k, c) in coeffs.iter().enumerate() {
        // (x - s)^k = Σ C(k, j) x^j (-s)^(k-j)
        let mut binom = 1.0;
        for j in 0..=k {
            out[j] += c * binom * (-shift).powi((k - j) as i32);
            binom = binom * (k - j) as f64 / (j + 1) as f64;
        }
    }
    out
}

pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// Leading gaps take the first known value, trailing gaps the last one.
pub fn fill_nearest(values: &[Option<f64>]) -> Vec<Option<f64>> {
    backward_fill(&forward_fill(values))
}

pub fn forward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

pub fn backward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut next = None;
    let mut out: Vec<Option<f64>> = values
        .iter()
        .rev()
        .map(|v| {
            if v.is_some() {
                next = *v;
            }
            next
        })
        .collect();
    out.reverse();
    out
}

/// Centred rolling mean with partial windows at the edges.
pub fn centered_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    let half = window / 2;
    let n = values.len();
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + window - half).min(n);
            let (sum, count) = values[lo..hi]
                .iter()
                .flatten()
                .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::reindex_daily;
    use crate::models::Observation;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(values: Vec<Option<f64>>) -> DailySeries {
        let start = d(2020, 1, 1);
        let end = start + chrono::Duration::days(values.len() as i64 - 1);
        DailySeries {
            name: "x".into(),
            range: DateRange::new(start, end).unwrap(),
            values,
        }
    }

    #[test]
    fn test_monthly_linear_midpoint() {
        let range = DateRange::new(d(2020, 1, 1), d(2020, 4, 1)).unwrap();
        let obs = vec![
            Observation::new(d(2020, 1, 1), 50.0),
            Observation::new(d(2020, 4, 1), 80.0),
        ];
        let s = reindex_daily("consumer_sentiment", &obs, range);
        let out = impute(&s, IndicatorClass::Price).unwrap();
        let feb15 = out.values[range.index_of(d(2020, 2, 15)).unwrap()];
        let expected = 50.0 + (80.0 - 50.0) * (45.0 / 91.0);
        assert!((feb15 - expected).abs() < 1e-9, "{feb15} vs {expected}");
    }

    #[test]
    fn test_price_edges_take_nearest() {
        let s = series(vec![None, None, Some(10.0), None, Some(20.0), None]);
        let out = impute(&s, IndicatorClass::Price).unwrap();
        assert_eq!(out.values, vec![10.0, 10.0, 10.0, 15.0, 20.0, 20.0]);
        assert_eq!(
            out.was_missing,
            vec![true, true, false, true, false, true]
        );
        assert_eq!(out.flag_column_name(), "x_was_missing");
    }

    #[test]
    fn test_indicator_is_smoothed() {
        let s = series(vec![Some(0.0), None, None, None, None, None, Some(6.0)]);
        let out = impute(&s, IndicatorClass::Indicator).unwrap();
        // linear: 0..6; centred mean of 7 with partial edges
        assert!((out.values[3] - 3.0).abs() < 1e-12);
        assert!((out.values[0] - 1.5).abs() < 1e-12); // mean(0,1,2,3)
        assert!((out.values[6] - 4.5).abs() < 1e-12); // mean(3,4,5,6)
    }

    #[test]
    fn test_quadratic_recovers_parabola() {
        // y = x^2 sampled at 0, 3, 6, 9
        let mut v = vec![None; 10];
        for x in [0usize, 3, 6, 9] {
            v[x] = Some((x * x) as f64);
        }
        let out = interpolate_quadratic(&v);
        for (x, y) in out.iter().enumerate() {
            assert!((y.unwrap() - (x * x) as f64).abs() < 1e-9);
        }
    }

    #[test]
    fn test_quadratic_falls_back_with_two_knots() {
        let v = vec![Some(1.0), None, None, Some(4.0)];
        let out = interpolate_quadratic(&v);
        assert!((out[1].unwrap() - 2.0).abs() < 1e-9);
        assert!((out[2].unwrap() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_quarterly_fills_edges() {
        let s = series(vec![None, Some(1.0), None, Some(3.0), None, Some(5.0), None, None]);
        let out = impute(&s, IndicatorClass::Quarterly).unwrap();
        assert_eq!(out.values[0], 1.0);
        assert!((out.values[2] - 2.0).abs() < 1e-9);
        assert_eq!(out.values[7], 5.0);
    }

    #[test]
    fn test_polyfit_degree_two() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 - x + 0.5 * x * x).collect();
        let c = polyfit(&xs, &ys, 2).unwrap();
        assert!((c[0] - 2.0).abs() < 1e-9);
        assert!((c[1] + 1.0).abs() < 1e-9);
        assert!((c[2] - 0.5).abs() < 1e-9);
        assert!((polyval(&c, 10.0) - 42.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_series_is_an_error() {
        let s = series(vec![None, None]);
        assert_eq!(
            impute(&s, IndicatorClass::Price),
            Err(AlignError::NoObservations("x".into()))
        );
    }

    fn sparse() -> impl Strategy<Value = Vec<Option<f64>>> {
        prop::collection::vec(prop::option::weighted(0.3, -1_000.0f64..1_000.0), 1..120)
            .prop_filter("needs an observation", |v| v.iter().any(Option::is_some))
    }

    proptest! {
        #[test]
        fn prop_no_gaps_survive(values in sparse()) {
            let s = series(values);
            for class in [IndicatorClass::Price, IndicatorClass::Indicator, IndicatorClass::Quarterly] {
                let out = impute(&s, class).unwrap();
                prop_assert_eq!(out.values.len(), s.values.len());
                prop_assert!(out.values.iter().all(|v| v.is_finite()));
            }
        }

        #[test]
        fn prop_price_stays_within_observed(values in sparse()) {
            let observed: Vec<f64> = values.iter().flatten().copied().collect();
            let lo = observed.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = observed.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let out = impute(&series(values), IndicatorClass::Price).unwrap();
            for v in out.values {
                prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
            }
        }
    }
}
