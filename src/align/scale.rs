//! Min-max rescaling of bounded indicators onto [-1, 1].

/// Target bounds shared by every scaled column and every sentiment score.
pub const LOWER: f64 = -1.0;
pub const UPPER: f64 = 1.0;

/// Fitted min-max transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinMaxScaler {
    min: f64,
    max: f64,
}

impl MinMaxScaler {
    /// Fit on every present, finite value. `None` when there is nothing to fit.
    pub fn fit(values: &[Option<f64>]) -> Option<Self> {
        let mut it = values.iter().flatten().copied().filter(|v| v.is_finite());
        let first = it.next()?;
        let (min, max) = it.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v)));
        Some(Self { min, max })
    }

    /// Map a raw value into [-1, 1]. Out-of-sample values are clamped;
    /// a constant fit maps everything to the midpoint.
    pub fn transform(&self, v: f64) -> f64 {
        let span = self.max - self.min;
        if span == 0.0 {
            return 0.0;
        }
        let scaled = LOWER + (v - self.min) * (UPPER - LOWER) / span;
        scaled.clamp(LOWER, UPPER)
    }
}

/// Fit on `observed` and apply to `values`. Fitting on the raw observations
/// keeps interpolated or smoothed values inside the observed extremes.
pub fn min_max_scale(observed: &[Option<f64>], values: &[Option<f64>]) -> Vec<Option<f64>> {
    match MinMaxScaler::fit(observed) {
        Some(scaler) => values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()).map(|x| scaler.transform(x)))
            .collect(),
        None => values.to_vec(),
    }
}

pub fn clamp_unit(v: f64) -> f64 {
    v.clamp(LOWER, UPPER)
}
