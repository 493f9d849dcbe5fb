//! Price-level trap detection.
//!
//! A bullish trap is a sharp down day on a net-buying flow day; a bearish
//! trap is a sharp up day on a net-selling flow day. Each daily bar is
//! compared with the bar before it in sort order, not the previous calendar
//! day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::domain::{Decision, FlowRecord, NewsItem, PriceBar};
use crate::math::round_dp;

/// Confidence attached to every detected price trap.
pub const TRAP_CONFIDENCE: f64 = 0.8;
pub const WAIT_AND_HEDGE: &str = "Wait / Hedge";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapType {
    #[default]
    None,
    BullishTrap,
    BearishTrap,
}

impl TrapType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::BullishTrap => "bullish_trap",
            Self::BearishTrap => "bearish_trap",
        }
    }
}

impl fmt::Display for TrapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for price-level traps and the attached headlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrapRules {
    /// Close below (1 − drop_pct) × previous close.
    pub drop_pct: f64,
    /// Close above (1 + rise_pct) × previous close.
    pub rise_pct: f64,
    pub support_factor: f64,
    pub resistance_factor: f64,
    pub news_impact_min: f64,
    pub news_limit: usize,
}

impl Default for TrapRules {
    fn default() -> Self {
        Self {
            drop_pct: 0.02,
            rise_pct: 0.02,
            support_factor: 0.995,
            resistance_factor: 1.005,
            news_impact_min: 0.5,
            news_limit: 5,
        }
    }
}

/// Inclusive date filter for the dates that get a result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: Some(date),
            end: Some(date),
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Trap assessment of one date. Stored one per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrapResult {
    pub date: NaiveDate,
    pub trap_detected: bool,
    pub trap_type: TrapType,
    pub confidence: f64,
    /// `None` when there is no flow record for the date.
    pub fii_dii_signal: Option<Decision>,
    pub future_decision: String,
    pub stop_loss_support: Option<f64>,
    pub stop_loss_resistance: Option<f64>,
    pub related_news: String,
}

impl TrapResult {
    fn clear(date: NaiveDate) -> Self {
        Self {
            date,
            trap_detected: false,
            trap_type: TrapType::None,
            confidence: 0.0,
            fii_dii_signal: None,
            future_decision: String::new(),
            stop_loss_support: None,
            stop_loss_resistance: None,
            related_news: String::new(),
        }
    }
}

/// Headlines with impact ≥ `min_impact` published on or before `date`,
/// newest first, at most `limit`, joined with ", ".
pub fn related_news(news: &[NewsItem], date: NaiveDate, min_impact: f64, limit: usize) -> String {
    let mut relevant: Vec<&NewsItem> = news
        .iter()
        .filter(|n| n.published_at.date() <= date && n.impact_score >= min_impact)
        .collect();
    relevant.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    relevant
        .into_iter()
        .take(limit)
        .filter(|n| !n.title.trim().is_empty())
        .map(|n| n.title.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Evaluate every daily bar whose date falls in `range`.
pub fn detect_price_traps(
    bars: &[PriceBar],
    flows: &[FlowRecord],
    news: &[NewsItem],
    range: DateRange,
    rules: &TrapRules,
) -> Vec<TrapResult> {
    let mut daily: Vec<&PriceBar> = bars.iter().filter(|b| b.is_daily()).collect();
    daily.sort_by_key(|b| b.date);
    daily.dedup_by_key(|b| b.date);

    let mut flow_by_date: HashMap<NaiveDate, &FlowRecord> = HashMap::new();
    for rec in flows {
        flow_by_date.entry(rec.date).or_insert(rec);
    }

    let mut out = Vec::new();
    for (i, bar) in daily.iter().enumerate() {
        if !range.contains(bar.date) {
            continue;
        }
        let mut result = TrapResult::clear(bar.date);
        let flow = flow_by_date.get(&bar.date);
        result.fii_dii_signal = flow.map(|f| f.impact());

        let prev = if i > 0 { Some(daily[i - 1]) } else { None };
        if let (Some(prev), Some(signal)) = (prev, result.fii_dii_signal) {
            let close = bar.close;
            let prev_close = prev.close;
            if close < prev_close * (1.0 - rules.drop_pct) && signal == Decision::Bullish {
                result.trap_detected = true;
                result.trap_type = TrapType::BullishTrap;
                result.confidence = TRAP_CONFIDENCE;
                result.future_decision = WAIT_AND_HEDGE.to_string();
                result.stop_loss_support = Some(round_dp(bar.low * rules.support_factor, 2));
            } else if close > prev_close * (1.0 + rules.rise_pct) && signal == Decision::Bearish {
                result.trap_detected = true;
                result.trap_type = TrapType::BearishTrap;
                result.confidence = TRAP_CONFIDENCE;
                result.future_decision = WAIT_AND_HEDGE.to_string();
                result.stop_loss_resistance = Some(round_dp(bar.high * rules.resistance_factor, 2));
            }
        }

        result.related_news =
            related_news(news, bar.date, rules.news_impact_min, rules.news_limit);
        debug!(date = %result.date, trap = %result.trap_type, "price trap evaluated");
        out.push(result);
    }
    out
}
