//! Actionable label for a trade leg, from bias and where the close sits
//! relative to the bands.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::band::SniperLevel;
use crate::domain::{Decision, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SniperAction {
    /// Bullish CE, close at or above the upper double band.
    StrongBreakout,
    /// Bullish CE, close at or above the upper band.
    Breakout,
    /// Bullish CE, close at or above ATM.
    AboveAtm,
    StrongBreakdown,
    Breakdown,
    BelowAtm,
    /// Leg on the side against the bias.
    Avoid(Side),
    /// Favoured side, close still on the wrong side of ATM.
    Wait,
    NeutralBreakout,
    NeutralBreakdown,
    RangeBound,
}

impl SniperAction {
    pub fn label(&self) -> String {
        match self {
            Self::StrongBreakout => "Strong CE Breakout".into(),
            Self::Breakout => "CE Buy (Breakout)".into(),
            Self::AboveAtm => "CE Buy (Above ATM)".into(),
            Self::StrongBreakdown => "Strong PE Breakdown".into(),
            Self::Breakdown => "PE Buy (Breakdown)".into(),
            Self::BelowAtm => "PE Buy (Below ATM)".into(),
            Self::Avoid(Side::Pe) => "Avoid PE in Bullish".into(),
            Self::Avoid(Side::Ce) => "Avoid CE in Bearish".into(),
            Self::Wait => "Wait / Neutral".into(),
            Self::NeutralBreakout => "Neutral Bias Breakout".into(),
            Self::NeutralBreakdown => "Neutral Bias Breakdown".into(),
            Self::RangeBound => "Range Bound".into(),
        }
    }

    /// A buy call on the favoured side.
    pub fn is_entry(&self) -> bool {
        matches!(
            self,
            Self::StrongBreakout
                | Self::Breakout
                | Self::AboveAtm
                | Self::StrongBreakdown
                | Self::Breakdown
                | Self::BelowAtm
        )
    }
}

impl fmt::Display for SniperAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

pub fn assign_action(side: Side, level: &SniperLevel, close: f64) -> SniperAction {
    match level.bias {
        Decision::Bullish => match side {
            Side::Ce if close >= level.upper_double => SniperAction::StrongBreakout,
            Side::Ce if close >= level.upper => SniperAction::Breakout,
            Side::Ce if close >= level.atm as f64 => SniperAction::AboveAtm,
            Side::Ce => SniperAction::Wait,
            Side::Pe => SniperAction::Avoid(Side::Pe),
        },
        Decision::Bearish => match side {
            Side::Pe if close <= level.lower_double => SniperAction::StrongBreakdown,
            Side::Pe if close <= level.lower => SniperAction::Breakdown,
            Side::Pe if close <= level.atm as f64 => SniperAction::BelowAtm,
            Side::Pe => SniperAction::Wait,
            Side::Ce => SniperAction::Avoid(Side::Ce),
        },
        Decision::Neutral => {
            if close >= level.upper {
                SniperAction::NeutralBreakout
            } else if close <= level.lower {
                SniperAction::NeutralBreakdown
            } else {
                SniperAction::RangeBound
            }
        }
    }
}
