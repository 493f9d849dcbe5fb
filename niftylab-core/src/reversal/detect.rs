//! Reversal events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use super::streak::{clean_series, segment_streaks, Trend};
use crate::calendar::TradingCalendar;
use crate::domain::{Interval, PriceBar};
use crate::math::round_dp;

/// Option side suggested by a reversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MomentumBias {
    BuyCe,
    BuyPe,
    Neutral,
}

impl MomentumBias {
    pub fn for_trend(trend: Trend) -> Self {
        match trend {
            Trend::Bullish => Self::BuyCe,
            Trend::Bearish => Self::BuyPe,
            Trend::Neutral => Self::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuyCe => "BUY_CE",
            Self::BuyPe => "BUY_PE",
            Self::Neutral => "NEUTRAL",
        }
    }
}

impl fmt::Display for MomentumBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agreement between the stored momentum bias and the new trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeConfidence {
    StrongBullish,
    StrongBearish,
    WeakConflict,
    Neutral,
}

impl TradeConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBullish => "Strong Bullish",
            Self::StrongBearish => "Strong Bearish",
            Self::WeakConflict => "Weak / Conflict",
            Self::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for TradeConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a reversal. At most one event per key is ever stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReversalKey {
    pub index: String,
    pub interval: Interval,
    pub reversal_date: NaiveDate,
    pub from_trend: Trend,
    pub to_trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReversalEvent {
    pub index: String,
    pub interval: Interval,
    pub reversal_date: NaiveDate,
    pub from_trend: Trend,
    /// Never `Neutral`.
    pub to_trend: Trend,
    pub prev_streak_len: u32,
    pub new_streak_len: u32,
    pub prev_change: f64,
    pub new_change: f64,
    pub momentum_bias: MomentumBias,
    pub remarks: String,
}

impl ReversalEvent {
    pub fn key(&self) -> ReversalKey {
        ReversalKey {
            index: self.index.clone(),
            interval: self.interval,
            reversal_date: self.reversal_date,
            from_trend: self.from_trend,
            to_trend: self.to_trend,
        }
    }

    /// Side implied by the new trend alone.
    pub fn option_signal(&self) -> MomentumBias {
        MomentumBias::for_trend(self.to_trend)
    }

    pub fn trade_confidence(&self) -> TradeConfidence {
        match (self.momentum_bias, self.to_trend) {
            (MomentumBias::BuyCe, Trend::Bullish) => TradeConfidence::StrongBullish,
            (MomentumBias::BuyPe, Trend::Bearish) => TradeConfidence::StrongBearish,
            (MomentumBias::BuyCe, Trend::Bearish) | (MomentumBias::BuyPe, Trend::Bullish) => {
                TradeConfidence::WeakConflict
            }
            _ => TradeConfidence::Neutral,
        }
    }
}

/// Candidate reversal events for one (index, interval) series, oldest first.
///
/// Detection is pure; filtering against already stored keys happens on
/// insert.
pub fn detect_reversals(
    index: &str,
    interval: Interval,
    bars: &[PriceBar],
    calendar: &TradingCalendar,
) -> Vec<ReversalEvent> {
    let series = clean_series(bars, calendar);
    let streaks = segment_streaks(&series);

    let mut events = Vec::new();
    for pair in streaks.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);
        if prev.direction == curr.direction || curr.direction == 0 {
            continue;
        }
        if !calendar.is_trading_day(curr.start_date) {
            continue;
        }
        let to_trend = curr.trend();
        let bias = MomentumBias::for_trend(to_trend);
        events.push(ReversalEvent {
            index: index.to_string(),
            interval,
            reversal_date: curr.start_date,
            from_trend: prev.trend(),
            to_trend,
            prev_streak_len: prev.bars,
            new_streak_len: curr.bars,
            prev_change: round_dp(prev.total_change, 2),
            new_change: round_dp(curr.total_change, 2),
            momentum_bias: bias,
            remarks: format!("Trend reversal detected — Option Bias: {bias}"),
        });
    }
    debug!(
        index,
        interval = %interval,
        bars = series.len(),
        streaks = streaks.len(),
        events = events.len(),
        "reversals detected"
    );
    events
}

/// Aggregate view over a set of events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReversalSummary {
    pub total: usize,
    pub bullish: usize,
    pub bearish: usize,
    /// Mean new-streak length, 2dp; 0 for no events.
    pub avg_new_streak: f64,
    pub total_new_change: f64,
}

pub fn summarize(events: &[ReversalEvent]) -> ReversalSummary {
    if events.is_empty() {
        return ReversalSummary::default();
    }
    let total = events.len();
    let streak_sum: u32 = events.iter().map(|e| e.new_streak_len).sum();
    ReversalSummary {
        total,
        bullish: events.iter().filter(|e| e.to_trend == Trend::Bullish).count(),
        bearish: events.iter().filter(|e| e.to_trend == Trend::Bearish).count(),
        avg_new_streak: round_dp(f64::from(streak_sum) / total as f64, 2),
        total_new_change: round_dp(events.iter().map(|e| e.new_change).sum(), 2),
    }
}
