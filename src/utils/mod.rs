use std::time::{Duration, Instant};
use tracing::info;

/// Logs when a pipeline stage starts and how long it took when dropped.
pub struct Timer {
    stage: String,
    start: Instant,
}

impl Timer {
    pub fn start(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        info!("▶ {}", stage);
        Self {
            stage,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("✔ {} ({:.2?})", self.stage, self.elapsed());
    }
}

/// Thousands separators for row and record counts.
pub fn fmt_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Fixed-precision value for reports; "—" when absent.
pub fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    match v {
        Some(v) => format!("{:.*}", precision, v),
        None => "—".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fmt_count() {
        assert_eq!(fmt_count(1_234_567), "1,234,567");
        assert_eq!(fmt_count(0), "0");
        assert_eq!(fmt_count(999), "999");
        assert_eq!(fmt_count(1_000), "1,000");
    }

    #[test]
    fn test_fmt_opt() {
        assert_eq!(fmt_opt(Some(0.12345), 3), "0.123");
        assert_eq!(fmt_opt(None, 2), "—");
    }
}
