//! Flow classification + underlying price → textual option strategy.
//!
//! General, defined-risk structures only; strike selection is a heuristic
//! around the at-the-money strike.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::normalizer::STRONG_Z;
use crate::domain::FlowSignal;
use crate::math::nearest_strike;

/// Strike grid used for the ATM estimate.
pub const IDEA_STRIKE_STEP: i64 = 50;
/// Distance between the long and short legs of a vertical spread.
pub const SPREAD_WIDTH: i64 = 200;
/// Offset of the "slightly OTM" single leg.
pub const OTM_OFFSET: i64 = 50;

/// Risk appetite; only changes the suggested expiry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    #[default]
    Medium,
    Aggressive,
}

impl RiskProfile {
    fn expiry(&self) -> &'static str {
        match self {
            Self::Aggressive => "nearest weekly",
            Self::Conservative | Self::Medium => "near monthly",
        }
    }
}

/// How much to trust the idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    /// Derived from the conviction z-score, clamped to 40..=95.
    Percent(u8),
    /// No conviction score was available.
    Medium,
}

impl Confidence {
    pub fn from_z(conviction_z: Option<f64>) -> Self {
        match conviction_z {
            Some(z) => {
                let raw = (z.abs() / STRONG_Z * 100.0).trunc();
                let pct = if raw.is_finite() { raw.clamp(40.0, 95.0) } else { 95.0 };
                Self::Percent(pct as u8)
            }
            None => Self::Medium,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p}%"),
            Self::Medium => f.write_str("medium"),
        }
    }
}

/// A suggested option structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIdea {
    pub strategy: String,
    pub notes: String,
    pub atm: Option<i64>,
    pub confidence: Confidence,
}

/// Build a trade idea for a flow signal.
///
/// Without an underlying price there is nothing to anchor strikes to, so the
/// idea says so and carries no ATM.
pub fn generate_trade_idea(
    signal: FlowSignal,
    underlying_price: Option<f64>,
    conviction_z: Option<f64>,
    risk: RiskProfile,
) -> TradeIdea {
    let confidence = Confidence::from_z(conviction_z);
    let price = match underlying_price {
        Some(p) if p.is_finite() && p > 0.0 => p,
        _ => {
            return TradeIdea {
                strategy: "No market price available".into(),
                notes: String::new(),
                atm: None,
                confidence,
            }
        }
    };

    let atm = nearest_strike(price, IDEA_STRIKE_STEP);
    let expiry = risk.expiry();

    let (strategy, notes) = match signal {
        FlowSignal::StrongBullish => (
            "Buy Call or Bull Call Spread",
            format!(
                "Buy 1 ATM Call (strike {atm}), sell 1 OTM Call (strike {}) to form a bull-call spread. \
                 Expiry: {expiry}. Lower cost than naked call; good risk-defined plan.",
                atm + SPREAD_WIDTH
            ),
        ),
        FlowSignal::Bullish => (
            "Bull Call Spread / Buy Call slightly OTM",
            format!(
                "Consider buying 1 slightly OTM Call (strike {}) or a bull-call spread (buy {atm}C, sell {}C). \
                 Expiry: {expiry}.",
                atm + OTM_OFFSET,
                atm + SPREAD_WIDTH
            ),
        ),
        FlowSignal::StrongBearish => (
            "Buy Put or Bear Put Spread",
            format!(
                "Buy 1 ATM Put (strike {atm}), sell 1 lower Put (strike {}) to form a bear-put spread. \
                 Expiry: {expiry}.",
                atm - SPREAD_WIDTH
            ),
        ),
        FlowSignal::Bearish => (
            "Bear Put Spread / Buy Put slightly OTM",
            format!(
                "Consider buying 1 slightly OTM Put (strike {}) or a bear-put spread (buy {atm}P, sell {}P). \
                 Expiry: {expiry}.",
                atm - OTM_OFFSET,
                atm - SPREAD_WIDTH
            ),
        ),
        FlowSignal::Neutral => (
            "Range / Neutral strategies",
            "Flows neutral: consider iron condor or calendar spreads, or stay flat until a clearer flow emerges. \
             Prefer defined-risk spreads over naked positions."
                .to_string(),
        ),
    };

    TradeIdea {
        strategy: strategy.to_string(),
        notes,
        atm: Some(atm),
        confidence,
    }
}
