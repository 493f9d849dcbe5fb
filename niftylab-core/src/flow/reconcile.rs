//! Flow classification vs realized price movement.
//!
//! Two independent reconciliations live here. [`reconcile_flows`] uses the
//! rolling z-score classification and is the one reports show.
//! [`quick_reconcile`] scales total net flow by 1/1000 and compares its sign
//! with the bar's decision; it runs on every flow write and feeds list views.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::normalizer::{FlowNormalizer, FlowScore};
use super::trade_idea::{generate_trade_idea, RiskProfile, TradeIdea};
use crate::domain::{Decision, FlowRecord, FlowSignal, PriceBar};
use crate::math::round_dp;

/// A Neutral day matches when |close − open| stays under this share of open.
pub const NEUTRAL_BAND_PCT: f64 = 0.05;

/// Full reconciliation of one flow date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAnalysis {
    pub score: FlowScore,
    /// `None` when neither price change could be computed.
    pub matched: Option<bool>,
    pub intraday_change: Option<f64>,
    pub prev_close_change: Option<f64>,
    pub suggestion: TradeIdea,
}

impl FlowAnalysis {
    pub fn date(&self) -> NaiveDate {
        self.score.date
    }

    pub fn signal(&self) -> FlowSignal {
        self.score.signal
    }
}

/// Reconcile every flow record against the same-date daily bar.
///
/// The "previous close" is the close of the bar on the previous *flow* date
/// in sort order, so gaps in either series shrink what can be compared
/// instead of reaching across them.
pub fn reconcile_flows(
    flows: &[FlowRecord],
    bars: &[PriceBar],
    normalizer: &FlowNormalizer,
    risk: RiskProfile,
) -> Vec<FlowAnalysis> {
    let mut by_date: HashMap<NaiveDate, &PriceBar> = HashMap::new();
    for bar in bars.iter().filter(|b| b.is_daily()) {
        by_date.entry(bar.date).or_insert(bar);
    }

    let scores = normalizer.score(flows);
    let mut out = Vec::with_capacity(scores.len());
    let mut prev_date: Option<NaiveDate> = None;

    for score in scores {
        let bar = by_date.get(&score.date).copied();
        let prev_close = prev_date
            .and_then(|d| by_date.get(&d))
            .map(|b| b.close)
            .filter(|c| c.is_finite());

        let intraday_change = bar
            .map(|b| b.close - b.open)
            .filter(|c| c.is_finite());
        let prev_close_change = match (bar, prev_close) {
            (Some(b), Some(pc)) => Some(b.close - pc).filter(|c| c.is_finite()),
            _ => None,
        };

        let matched = match_signal(score.signal, intraday_change, prev_close_change, bar);
        let suggestion = generate_trade_idea(
            score.signal,
            bar.map(|b| b.close),
            Some(score.total_z),
            risk,
        );

        prev_date = Some(score.date);
        out.push(FlowAnalysis {
            score,
            matched,
            intraday_change,
            prev_close_change,
            suggestion,
        });
    }
    out
}

fn match_signal(
    signal: FlowSignal,
    intraday_change: Option<f64>,
    prev_close_change: Option<f64>,
    bar: Option<&PriceBar>,
) -> Option<bool> {
    if let Some(change) = intraday_change {
        let open = bar.map_or(0.0, |b| b.open);
        let base = if open == 0.0 { 1.0 } else { open };
        let matched = (signal.is_bullish() && change > 0.0)
            || (signal.is_bearish() && change < 0.0)
            || (signal == FlowSignal::Neutral && change.abs() < NEUTRAL_BAND_PCT * base);
        return Some(matched);
    }
    prev_close_change
        .map(|change| (signal.is_bullish() && change > 0.0) || (signal.is_bearish() && change < 0.0))
}

/// Cheap per-record reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickReconciliation {
    pub date: NaiveDate,
    /// total_net / 1000, 2dp. Not a statistical z-score.
    pub total_z: f64,
    pub matched: Option<bool>,
    pub suggestion_text: String,
}

pub const ALIGNED_TEXT: &str = "FII+DII aligned with market → Trend confirmed.";
pub const DIVERGENCE_TEXT: &str = "Divergence detected → Trade cautiously.";
pub const NO_MARKET_TEXT: &str = "No market record available.";

/// Reconcile one flow record against the same-date daily bar, if any.
pub fn quick_reconcile(record: &FlowRecord, bar: Option<&PriceBar>) -> QuickReconciliation {
    let total_net = record.total_net();
    let total_z = round_dp(total_net / 1000.0, 2);

    let (matched, text) = match bar {
        Some(bar) => {
            let decision = bar.decision();
            let aligned = (total_net > 0.0 && decision == Decision::Bullish)
                || (total_net < 0.0 && decision == Decision::Bearish);
            (
                Some(aligned),
                if aligned { ALIGNED_TEXT } else { DIVERGENCE_TEXT },
            )
        }
        None => (None, NO_MARKET_TEXT),
    };

    QuickReconciliation {
        date: record.date,
        total_z,
        matched,
        suggestion_text: text.to_string(),
    }
}
