//! PriceBar: the fundamental market data unit.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Decision;

/// Sampling interval of a price series.
///
/// `Daily` is the "no sub-interval" series: one bar per trading date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1d")]
    Daily,
    #[serde(rename = "1h")]
    Hourly,
    #[serde(rename = "30m")]
    Min30,
    #[serde(rename = "5m")]
    Min5,
    #[serde(rename = "2m")]
    Min2,
}

impl Interval {
    pub const ALL: [Interval; 5] = [Self::Daily, Self::Hourly, Self::Min30, Self::Min5, Self::Min2];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Hourly => "1h",
            Self::Min30 => "30m",
            Self::Min5 => "5m",
            Self::Min2 => "2m",
        }
    }

    pub fn is_intraday(&self) -> bool {
        !matches!(self, Self::Daily)
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1d" | "" => Ok(Self::Daily),
            "1h" => Ok(Self::Hourly),
            "30m" => Ok(Self::Min30),
            "5m" => Ok(Self::Min5),
            "2m" => Ok(Self::Min2),
            other => Err(format!("unknown interval '{other}'")),
        }
    }
}

/// OHLC bar for one index on one date (and, for intraday series, one slot).
///
/// `points` is close minus the previous close of the same series. The
/// Bullish/Bearish/Neutral label is never stored: [`PriceBar::decision`]
/// derives it from `points` every time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub index: String,
    pub interval: Interval,
    pub date: NaiveDate,
    /// Slot start time; `None` for daily bars.
    #[serde(default)]
    pub time: Option<NaiveTime>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub points: f64,
}

impl PriceBar {
    /// Bullish when points > 0, Bearish when < 0, Neutral otherwise.
    pub fn decision(&self) -> Decision {
        Decision::from_sign(self.points)
    }

    pub fn is_daily(&self) -> bool {
        self.interval == Interval::Daily
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }

    /// Intraday move of this bar (close − open).
    pub fn body(&self) -> f64 {
        self.close - self.open
    }
}

/// Fill in `points` for a series ordered by (date, time): each bar gets
/// close minus the previous bar's close, the first bar keeps its own value.
pub fn fill_points(bars: &mut [PriceBar]) {
    for i in 1..bars.len() {
        bars[i].points = crate::math::round_dp(bars[i].close - bars[i - 1].close, 2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> PriceBar {
        PriceBar {
            index: "NIFTY".into(),
            interval: Interval::Daily,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            time: None,
            open: 21_700.0,
            high: 21_800.0,
            low: 21_650.0,
            close: 21_750.0,
            points: 50.0,
        }
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar().is_sane());
    }

    #[test]
    fn bar_detects_void() {
        let mut bar = sample_bar();
        bar.close = f64::NAN;
        assert!(bar.is_void());
        assert!(!bar.is_sane());
    }

    #[test]
    fn decision_follows_points_sign() {
        let mut bar = sample_bar();
        assert_eq!(bar.decision(), Decision::Bullish);
        bar.points = -12.5;
        assert_eq!(bar.decision(), Decision::Bearish);
        bar.points = 0.0;
        assert_eq!(bar.decision(), Decision::Neutral);
    }

    #[test]
    fn interval_parses_and_displays() {
        for iv in [
            Interval::Daily,
            Interval::Hourly,
            Interval::Min30,
            Interval::Min5,
            Interval::Min2,
        ] {
            assert_eq!(iv.as_str().parse::<Interval>().unwrap(), iv);
        }
        assert!("15m".parse::<Interval>().is_err());
        assert!(!Interval::Daily.is_intraday());
        assert!(Interval::Min30.is_intraday());
    }

    #[test]
    fn fill_points_uses_previous_close() {
        let mut a = sample_bar();
        a.points = 0.0;
        let mut b = sample_bar();
        b.close = 21_800.0;
        let mut c = sample_bar();
        c.close = 21_710.25;
        let mut bars = vec![a, b, c];
        fill_points(&mut bars);
        assert_eq!(bars[0].points, 0.0);
        assert_eq!(bars[1].points, 50.0);
        assert_eq!(bars[2].points, -89.75);
    }

    #[test]
    fn bar_serialization_uses_interval_codes() {
        let json = serde_json::to_string(&sample_bar()).unwrap();
        assert!(json.contains("\"interval\":\"1d\""));
        let back: PriceBar = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample_bar());
    }
}
