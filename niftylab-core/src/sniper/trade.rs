//! Per-strike trade plans around ATM.

use serde::{Deserialize, Serialize};

use super::action::{assign_action, SniperAction};
use super::band::SniperLevel;
use crate::domain::{Decision, OptionChain, Side};
use crate::math::round_dp;

const STOPLOSS_FACTOR: f64 = 0.7;
const TARGET1_FACTOR: f64 = 1.5;
const TARGET2_FACTOR: f64 = 2.0;
const BASE_CONFIDENCE: i32 = 60;

/// One planned option leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniperTrade {
    pub side: Side,
    pub strike: i64,
    pub entry: f64,
    pub stoploss: f64,
    pub target1: f64,
    pub target2: f64,
    pub risk_reward: f64,
    /// 0–100.
    pub confidence: u8,
    pub action: SniperAction,
    pub note: String,
}

impl SniperTrade {
    pub fn risk_reward_label(&self) -> String {
        format!("{} R/R", self.risk_reward)
    }
}

/// How the leg relates to the bias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeNoteKind {
    Favoured,
    Neutral,
    Risky,
}

impl TradeNoteKind {
    pub fn classify(bias: Decision, side: Side) -> Self {
        match (bias, side) {
            (Decision::Bullish, Side::Ce) | (Decision::Bearish, Side::Pe) => Self::Favoured,
            (Decision::Neutral, _) => Self::Neutral,
            _ => Self::Risky,
        }
    }

    fn adjustment(&self) -> i32 {
        match self {
            Self::Favoured => 15,
            Self::Neutral => 0,
            Self::Risky => -15,
        }
    }

    fn word(&self) -> &'static str {
        match self {
            Self::Favoured => "Favoured",
            Self::Neutral => "Neutral",
            Self::Risky => "Risky",
        }
    }
}

/// Bigger daily moves earn more confidence.
fn base_confidence(points: f64) -> i32 {
    let moved = points.abs();
    if moved > 200.0 {
        BASE_CONFIDENCE + 20
    } else if moved > 100.0 {
        BASE_CONFIDENCE + 10
    } else {
        BASE_CONFIDENCE
    }
}

/// Trades on ATM, ATM + wing and ATM − wing, both sides, wherever the chain
/// has a positive LTP.
pub fn build_trades(
    level: &SniperLevel,
    points: f64,
    chain: &OptionChain,
    wing_offset: i64,
) -> Vec<SniperTrade> {
    let base = base_confidence(points);
    let strikes = [level.atm, level.atm + wing_offset, level.atm - wing_offset];

    let mut trades = Vec::new();
    for strike in strikes {
        let Some(row) = chain.row_at(strike) else {
            continue;
        };
        for side in Side::BOTH {
            let entry = row.ltp(side);
            if !(entry.is_finite() && entry > 0.0) {
                continue;
            }
            let stoploss = round_dp(entry * STOPLOSS_FACTOR, 2);
            let target1 = round_dp(entry * TARGET1_FACTOR, 2);
            let target2 = round_dp(entry * TARGET2_FACTOR, 2);
            let risk = entry - stoploss;
            let risk_reward = if risk > 0.0 {
                round_dp((target1 - entry) / risk, 2)
            } else {
                1.0
            };

            let kind = TradeNoteKind::classify(level.bias, side);
            let confidence = (base + kind.adjustment()).clamp(0, 100) as u8;
            trades.push(SniperTrade {
                side,
                strike,
                entry,
                stoploss,
                target1,
                target2,
                risk_reward,
                confidence,
                action: assign_action(side, level, level.close_price),
                note: format!("{} {side}@{strike} | Bias={}", kind.word(), level.bias),
            });
        }
    }
    trades
}
