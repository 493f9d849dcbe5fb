//! Series cleaning and streak segmentation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calendar::TradingCalendar;
use crate::domain::PriceBar;
use crate::math::direction;

/// Direction of a streak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Trend {
    Bullish,
    Bearish,
    /// Unchanged closes. Only ever a `from_trend`.
    Neutral,
}

impl Trend {
    pub fn from_direction(dir: i8) -> Self {
        match dir {
            d if d > 0 => Self::Bullish,
            d if d < 0 => Self::Bearish,
            _ => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "Bullish",
            Self::Bearish => "Bearish",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trading sessions only, first bar per date, ascending.
pub fn clean_series<'a>(bars: &'a [PriceBar], calendar: &TradingCalendar) -> Vec<&'a PriceBar> {
    let mut kept: Vec<&PriceBar> = bars
        .iter()
        .filter(|b| calendar.is_trading_day(b.date) && b.close.is_finite())
        .collect();
    // Stable: within a date the earliest slot stays first.
    kept.sort_by(|a, b| a.date.cmp(&b.date).then(a.time.cmp(&b.time)));
    kept.dedup_by_key(|b| b.date);
    kept
}

/// A maximal run of equal close-to-close direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Streak {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// -1, 0 or +1.
    pub direction: i8,
    pub bars: u32,
    pub total_change: f64,
}

impl Streak {
    pub fn trend(&self) -> Trend {
        Trend::from_direction(self.direction)
    }
}

/// Cut a cleaned series into streaks. The first bar has no previous close
/// and belongs to no streak.
pub fn segment_streaks(series: &[&PriceBar]) -> Vec<Streak> {
    let mut streaks: Vec<Streak> = Vec::new();
    for pair in series.windows(2) {
        let change = pair[1].close - pair[0].close;
        let dir = direction(change);
        let date = pair[1].date;
        match streaks.last_mut() {
            Some(current) if current.direction == dir => {
                current.end_date = date;
                current.bars += 1;
                current.total_change += change;
            }
            _ => streaks.push(Streak {
                start_date: date,
                end_date: date,
                direction: dir,
                bars: 1,
                total_change: change,
            }),
        }
    }
    streaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;

    fn series(start: NaiveDate, closes: &[f64]) -> Vec<PriceBar> {
        let cal = TradingCalendar::default();
        let mut date = start;
        closes
            .iter()
            .map(|&close| {
                while !cal.is_trading_day(date) {
                    date = date.succ_opt().unwrap();
                }
                let bar = PriceBar {
                    index: "NIFTY".into(),
                    interval: Interval::Daily,
                    date,
                    time: None,
                    open: close,
                    high: close,
                    low: close,
                    close,
                    points: 0.0,
                };
                date = date.succ_opt().unwrap();
                bar
            })
            .collect()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn streaks_from_closes() {
        let bars = series(monday(), &[100.0, 102.0, 105.0, 103.0, 101.0, 104.0]);
        let cal = TradingCalendar::default();
        let clean = clean_series(&bars, &cal);
        let streaks = segment_streaks(&clean);
        let shape: Vec<(i8, u32)> = streaks.iter().map(|s| (s.direction, s.bars)).collect();
        assert_eq!(shape, vec![(1, 2), (-1, 2), (1, 1)]);
        assert_eq!(streaks[0].total_change, 5.0);
        assert_eq!(streaks[1].start_date, bars[3].date);
    }

    #[test]
    fn flat_closes_form_their_own_streak() {
        let bars = series(monday(), &[100.0, 100.0, 100.0, 101.0]);
        let clean = clean_series(&bars, &TradingCalendar::default());
        let streaks = segment_streaks(&clean);
        assert_eq!(streaks.len(), 2);
        assert_eq!(streaks[0].trend(), Trend::Neutral);
        assert_eq!(streaks[0].bars, 2);
        assert_eq!(streaks[1].trend(), Trend::Bullish);
    }

    #[test]
    fn cleaning_drops_holidays_weekends_and_duplicates() {
        let mut bars = series(monday(), &[100.0, 101.0, 102.0]);
        let mut dup = bars[1].clone();
        dup.close = 999.0;
        bars.push(dup);
        let mut weekend = bars[0].clone();
        weekend.date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        bars.push(weekend);

        let cal = TradingCalendar::new([bars[2].date]);
        let clean = clean_series(&bars, &cal);
        let closes: Vec<f64> = clean.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![100.0, 101.0]);
    }

    #[test]
    fn short_series_has_no_streaks() {
        let bars = series(monday(), &[100.0]);
        let clean = clean_series(&bars, &TradingCalendar::default());
        assert!(segment_streaks(&clean).is_empty());
        assert!(segment_streaks(&[]).is_empty());
    }
}
