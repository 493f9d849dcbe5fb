//! Floor-trader pivots and their agreement with the latest reversal.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::streak::Trend;
use crate::domain::{Interval, PriceBar};
use crate::math::round_dp;

/// Where the close sits relative to the pivot ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PivotSentiment {
    StrongBullish,
    Bullish,
    ModerateBullish,
    Neutral,
    ReversalChance,
    Bearish,
    StrongBearish,
}

impl PivotSentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBullish => "Strong Bullish",
            Self::Bullish => "Bullish",
            Self::ModerateBullish => "Moderate Bullish",
            Self::Neutral => "Neutral",
            Self::ReversalChance => "Reversal Chance",
            Self::Bearish => "Bearish",
            Self::StrongBearish => "Strong Bearish",
        }
    }

    pub fn hint(&self) -> &'static str {
        match self {
            Self::StrongBullish => "Above R3: strong breakout.",
            Self::Bullish => "Between R2 and R3: strong upward momentum.",
            Self::ModerateBullish => "Above R1: positive bias.",
            Self::Neutral => "Near pivot: sideways consolidation.",
            Self::ReversalChance => "Testing S1-S2: possible rebound.",
            Self::Bearish => "Between S2 and S3: bearish continuation.",
            Self::StrongBearish => "Below S3: heavy selling pressure.",
        }
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::StrongBullish | Self::Bullish | Self::ModerateBullish)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::Bearish | Self::StrongBearish)
    }
}

impl fmt::Display for PivotSentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotLevels {
    pub p: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub sentiment: PivotSentiment,
}

impl PivotLevels {
    pub fn hint(&self) -> &'static str {
        self.sentiment.hint()
    }
}

/// Classic pivots from one high/low/close, levels rounded to 2dp.
pub fn pivot_levels(high: f64, low: f64, close: f64) -> PivotLevels {
    let p = (high + low + close) / 3.0;
    let r1 = 2.0 * p - low;
    let s1 = 2.0 * p - high;
    let r2 = p + (high - low);
    let s2 = p - (high - low);
    let r3 = high + 2.0 * (p - low);
    let s3 = low - 2.0 * (high - p);

    // The band (S1, R1] around the pivot counts as neutral.
    let sentiment = if close > r3 {
        PivotSentiment::StrongBullish
    } else if close > r2 {
        PivotSentiment::Bullish
    } else if close > r1 {
        PivotSentiment::ModerateBullish
    } else if close > s1 {
        PivotSentiment::Neutral
    } else if close > s2 {
        PivotSentiment::ReversalChance
    } else if close > s3 {
        PivotSentiment::Bearish
    } else {
        PivotSentiment::StrongBearish
    };

    PivotLevels {
        p: round_dp(p, 2),
        r1: round_dp(r1, 2),
        r2: round_dp(r2, 2),
        r3: round_dp(r3, 2),
        s1: round_dp(s1, 2),
        s2: round_dp(s2, 2),
        s3: round_dp(s3, 2),
        sentiment,
    }
}

/// Max high, min low and mean close over a group of bars.
fn aggregate(bars: &[&PriceBar]) -> Option<PivotLevels> {
    if bars.is_empty() {
        return None;
    }
    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    let close = bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64;
    Some(pivot_levels(high, low, close))
}

/// Most recent `n` bars of one interval, newest first.
fn latest(bars: &[PriceBar], interval: Interval, n: usize) -> Vec<&PriceBar> {
    let mut picked: Vec<&PriceBar> = bars.iter().filter(|b| b.interval == interval).collect();
    picked.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
    picked.truncate(n);
    picked
}

/// Pivots of the most recent daily bar.
pub fn daily_pivot(bars: &[PriceBar]) -> Option<PivotLevels> {
    latest(bars, Interval::Daily, 1)
        .first()
        .map(|b| pivot_levels(b.high, b.low, b.close))
}

/// Pivots over the last five daily bars.
pub fn weekly_pivot(bars: &[PriceBar]) -> Option<PivotLevels> {
    aggregate(&latest(bars, Interval::Daily, 5))
}

/// Pivots over the last eight hourly bars.
pub fn hourly_pivot(bars: &[PriceBar]) -> Option<PivotLevels> {
    aggregate(&latest(bars, Interval::Hourly, 8))
}

/// Agreement between the latest reversal trend and the daily pivot sentiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confluence {
    BullishConfluence,
    BearishConfluence,
    Conflict,
    Neutral,
    NoData,
}

impl Confluence {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BullishConfluence => "Bullish Confluence",
            Self::BearishConfluence => "Bearish Confluence",
            Self::Conflict => "Conflict",
            Self::Neutral => "Neutral",
            Self::NoData => "No Data",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::BullishConfluence => "Momentum and pivot align bullishly.",
            Self::BearishConfluence => "Momentum and pivot confirm bearishness.",
            Self::Conflict => "Momentum vs pivot conflict.",
            Self::Neutral => "No strong directional bias.",
            Self::NoData => "Insufficient data for confluence.",
        }
    }

    pub fn plan(&self) -> &'static str {
        match self {
            Self::BullishConfluence => "Suggested: BUY_CE or go LONG.",
            Self::BearishConfluence => "Suggested: BUY_PE or SHORT futures.",
            Self::Conflict => "Avoid entry.",
            Self::Neutral => "Wait for breakout.",
            Self::NoData => "No trade: waiting for clear market bias.",
        }
    }
}

impl fmt::Display for Confluence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn confluence(trend: Option<Trend>, sentiment: Option<PivotSentiment>) -> Confluence {
    let (Some(trend), Some(sentiment)) = (trend, sentiment) else {
        return Confluence::NoData;
    };
    match trend {
        Trend::Bullish if sentiment.is_bullish() => Confluence::BullishConfluence,
        Trend::Bearish if sentiment.is_bearish() => Confluence::BearishConfluence,
        Trend::Bullish if sentiment.is_bearish() => Confluence::Conflict,
        Trend::Bearish if sentiment.is_bullish() => Confluence::Conflict,
        _ => Confluence::Neutral,
    }
}
