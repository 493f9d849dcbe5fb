//! Rolling z-score normalization of FII/DII net flows.
//!
//! For every date the trailing window (up to `window` observations, ending at
//! and including that date) provides a mean and a sample standard deviation.
//! The z-score of the day's value against that window drives the
//! classification. Fewer than `min_periods` observations, or a zero standard
//! deviation, yield a z-score of exactly 0.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{FlowRecord, FlowSignal};
use crate::math::round_dp;

/// |z| at or above this is a strong signal.
pub const STRONG_Z: f64 = 1.0;
/// |z| at or above this is a directional signal.
pub const WEAK_Z: f64 = 0.5;

pub const DEFAULT_WINDOW: usize = 60;
pub const DEFAULT_MIN_PERIODS: usize = 10;

/// Classify a total-flow z-score. Strong thresholds are tested first, so
/// exactly 1.0 is StrongBullish and exactly -1.0 is StrongBearish.
pub fn label_from_z(z: f64) -> FlowSignal {
    if z >= STRONG_Z {
        FlowSignal::StrongBullish
    } else if z >= WEAK_Z {
        FlowSignal::Bullish
    } else if z <= -STRONG_Z {
        FlowSignal::StrongBearish
    } else if z <= -WEAK_Z {
        FlowSignal::Bearish
    } else {
        FlowSignal::Neutral
    }
}

/// Normalized flow values for one date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowScore {
    pub date: NaiveDate,
    pub fii_net: f64,
    pub dii_net: f64,
    pub total_net: f64,
    pub fii_z: f64,
    pub dii_z: f64,
    /// Rounded to 3 decimal places. `signal` is classified from the
    /// unrounded z, so 0.9997 stores as 1.0 yet labels Bullish.
    pub total_z: f64,
    pub signal: FlowSignal,
}

/// Rolling flow normalizer.
#[derive(Debug, Clone)]
pub struct FlowNormalizer {
    window: usize,
    min_periods: usize,
}

impl Default for FlowNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_MIN_PERIODS)
    }
}

impl FlowNormalizer {
    pub fn new(window: usize, min_periods: usize) -> Self {
        assert!(window >= 2, "flow window must be >= 2");
        assert!(
            (2..=window).contains(&min_periods),
            "min_periods must be in 2..=window"
        );
        Self {
            window,
            min_periods,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn min_periods(&self) -> usize {
        self.min_periods
    }

    /// Score every record. Input order does not matter: records are sorted by
    /// date first, and the output is date ascending.
    pub fn score(&self, records: &[FlowRecord]) -> Vec<FlowScore> {
        let mut sorted: Vec<&FlowRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.date);

        let fii: Vec<f64> = sorted.iter().map(|r| finite_or_zero(r.fii_net)).collect();
        let dii: Vec<f64> = sorted.iter().map(|r| finite_or_zero(r.dii_net)).collect();
        let total: Vec<f64> = fii.iter().zip(&dii).map(|(f, d)| f + d).collect();

        let fii_z = self.rolling_z(&fii);
        let dii_z = self.rolling_z(&dii);
        let total_z = self.rolling_z(&total);

        sorted
            .iter()
            .enumerate()
            .map(|(i, rec)| {
                let score = FlowScore {
                    date: rec.date,
                    fii_net: fii[i],
                    dii_net: dii[i],
                    total_net: total[i],
                    fii_z: round_dp(fii_z[i], 3),
                    dii_z: round_dp(dii_z[i], 3),
                    total_z: round_dp(total_z[i], 3),
                    signal: label_from_z(total_z[i]),
                };
                debug!(date = %score.date, total_z = score.total_z, signal = %score.signal, "flow scored");
                score
            })
            .collect()
    }

    /// z-score of each value against its trailing window.
    fn rolling_z(&self, values: &[f64]) -> Vec<f64> {
        (0..values.len())
            .map(|i| {
                let start = (i + 1).saturating_sub(self.window);
                let window = &values[start..=i];
                if window.len() < self.min_periods {
                    return 0.0;
                }
                let (mean, std) = mean_and_sample_std(window);
                if std == 0.0 || !std.is_finite() {
                    return 0.0;
                }
                let z = (values[i] - mean) / std;
                if z.is_finite() {
                    z
                } else {
                    0.0
                }
            })
            .collect()
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Mean and sample (n − 1) standard deviation. Requires at least 2 values.
fn mean_and_sample_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}
