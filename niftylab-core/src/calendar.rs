//! Trading-session calendar: weekdays minus exchange holidays.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Exchange calendar. Holidays are supplied by configuration; there is no
/// built-in holiday table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradingCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    /// Monday–Friday and not a listed holiday.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays.contains(&date)
    }

    pub fn holiday_count(&self) -> usize {
        self.holidays.len()
    }

    /// Trading sessions among the `days` calendar days ending at `end`
    /// (inclusive), most recent first.
    pub fn recent_sessions(&self, end: NaiveDate, days: u32) -> Vec<NaiveDate> {
        (0..days)
            .filter_map(|i| end.checked_sub_days(chrono::Days::new(u64::from(i))))
            .filter(|d| self.is_trading_day(*d))
            .collect()
    }
}
