//! Technical features derived from price bars alone, plus the next-day
//! direction label.
//!
//! Rolling statistics stay empty until their window is full, so the first
//! rows of a feature table are sparse; callers decide whether to fill or drop.

use crate::frame::{DailyTable, FrameError};
use crate::models::PriceBar;

pub const RSI_WINDOW: usize = 7;
pub const VOLATILITY_WINDOW: usize = 5;
pub const WEIGHT_WINDOW: usize = 21;

/// Stand-in for RS when a window has gains but no losses.
pub const RS_SENTINEL: f64 = 1e9;

/// Feature columns in the order they are written.
pub const FEATURE_COLUMNS: [&str; 11] = [
    "daily_return",
    "price_range",
    "sma_3",
    "sma_5",
    "ema_3",
    "volume_change",
    "momentum_3",
    "rsi_7",
    "volatility_5",
    "sentiment_weight",
    "percent_diff",
];

pub const TARGET_COLUMN: &str = "target";

/// Bars sorted by date, one row per trading day.
pub fn price_features(bars: &[PriceBar]) -> Result<DailyTable, FrameError> {
    let mut bars = bars.to_vec();
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);

    let mut table = DailyTable::new(bars.iter().map(|b| b.date).collect())?;
    let col = |f: fn(&PriceBar) -> f64| -> Vec<Option<f64>> {
        bars.iter().map(|b| Some(f(b)).filter(|v| v.is_finite())).collect()
    };
    let close = col(|b| b.close);
    let volume = col(|b| b.volume);
    let returns = pct_change(&close);

    table.add_column("open", col(|b| b.open))?;
    table.add_column("high", col(|b| b.high))?;
    table.add_column("low", col(|b| b.low))?;
    table.add_column("close", close.clone())?;
    table.add_column("volume", volume.clone())?;

    table.add_column("daily_return", returns.clone())?;
    table.add_column("price_range", col(|b| b.high - b.low))?;
    table.add_column("sma_3", rolling_mean(&close, 3))?;
    table.add_column("sma_5", rolling_mean(&close, 5))?;
    table.add_column("ema_3", ema(&close, 3))?;
    table.add_column("volume_change", pct_change(&volume))?;
    table.add_column("momentum_3", momentum(&close, 3))?;
    table.add_column("rsi_7", rsi(&close, RSI_WINDOW))?;
    table.add_column("volatility_5", rolling_std(&returns, VOLATILITY_WINDOW))?;
    table.add_column(
        "sentiment_weight",
        rolling_std(&returns, WEIGHT_WINDOW)
            .into_iter()
            .map(|s| s.filter(|s| *s > 0.0).map(|s| 1.0 / s))
            .collect(),
    )?;
    table.add_column(
        "percent_diff",
        bars.iter().map(PriceBar::percent_diff).collect(),
    )?;
    table.add_column(TARGET_COLUMN, direction_label(&close))?;
    Ok(table)
}

/// Fractional change from the previous row.
pub fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in 1..values.len() {
        if let (Some(prev), Some(cur)) = (values[i - 1], values[i]) {
            if prev != 0.0 {
                out[i] = Some(cur / prev - 1.0);
            }
        }
    }
    out
}

fn full_window(values: &[Option<f64>], end: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || end + 1 < window {
        return None;
    }
    values[end + 1 - window..=end].iter().copied().collect()
}

pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| full_window(values, i, window).map(|w| w.iter().sum::<f64>() / window as f64))
        .collect()
}

/// Rolling sample standard deviation (n - 1 denominator).
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let w = full_window(values, i, window)?;
            if w.len() < 2 {
                return None;
            }
            let mean = w.iter().sum::<f64>() / w.len() as f64;
            let var = w.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (w.len() - 1) as f64;
            Some(var.sqrt())
        })
        .collect()
}

/// Exponential moving average with `alpha = 2 / (span + 1)`, seeded with the
/// first present value and carried across gaps.
pub fn ema(values: &[Option<f64>], span: usize) -> Vec<Option<f64>> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut state: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            if let Some(x) = v {
                state = Some(match state {
                    Some(prev) => alpha * x + (1.0 - alpha) * prev,
                    None => *x,
                });
            }
            state
        })
        .collect()
}

/// Price minus the price `lag` rows earlier.
pub fn momentum(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| {
            let prev = values.get(i.checked_sub(lag)?).copied().flatten()?;
            Some(values[i]? - prev)
        })
        .collect()
}

/// Relative strength index over simple rolling means of gains and losses.
///
/// The first value lands on row `window` (it needs `window` changes). A window
/// with gains and no losses uses [`RS_SENTINEL`]; a flat window is 50.
pub fn rsi(close: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let n = close.len();
    let mut changes = vec![None; n];
    for i in 1..n {
        if let (Some(prev), Some(cur)) = (close[i - 1], close[i]) {
            changes[i] = Some(cur - prev);
        }
    }
    let gains: Vec<Option<f64>> = changes.iter().map(|c| c.map(|c| c.max(0.0))).collect();
    let losses: Vec<Option<f64>> = changes.iter().map(|c| c.map(|c| (-c).max(0.0))).collect();
    let avg_gain = rolling_mean(&gains, window);
    let avg_loss = rolling_mean(&losses, window);

    avg_gain
        .into_iter()
        .zip(avg_loss)
        .map(|(g, l)| Some(rsi_value(g?, l?)))
        .collect()
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    let rs = if avg_loss == 0.0 {
        RS_SENTINEL
    } else {
        avg_gain / avg_loss
    };
    100.0 - 100.0 / (1.0 + rs)
}

/// 1.0 when the next close is higher, else 0.0; empty on the last row.
pub fn direction_label(close: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..close.len())
        .map(|i| {
            let next = close.get(i + 1).copied().flatten()?;
            let cur = close[i]?;
            Some(if next > cur { 1.0 } else { 0.0 })
        })
        .collect()
}
