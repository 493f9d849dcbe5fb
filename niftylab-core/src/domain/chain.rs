//! Options-chain snapshot types.
//!
//! Field names follow the exchange payload (`strikePrice`, `lastPrice`,
//! `openInterest`, `totalTradedVolume`, `impliedVolatility`) so a raw chain
//! deserializes without a mapping layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Option side: call (CE) or put (PE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    #[serde(rename = "CE")]
    Ce,
    #[serde(rename = "PE")]
    Pe,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Ce, Side::Pe];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ce => "CE",
            Self::Pe => "PE",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leg quote at a strike.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionQuote {
    #[serde(default)]
    pub last_price: f64,
    #[serde(default)]
    pub open_interest: u64,
    #[serde(default)]
    pub total_traded_volume: u64,
    #[serde(default)]
    pub implied_volatility: f64,
}

/// All quotes at a single strike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainRow {
    #[serde(rename = "strikePrice")]
    pub strike_price: f64,
    #[serde(rename = "CE", default, skip_serializing_if = "Option::is_none")]
    pub ce: Option<OptionQuote>,
    #[serde(rename = "PE", default, skip_serializing_if = "Option::is_none")]
    pub pe: Option<OptionQuote>,
}

impl ChainRow {
    pub fn strike(&self) -> i64 {
        self.strike_price.round() as i64
    }

    pub fn quote(&self, side: Side) -> Option<&OptionQuote> {
        match side {
            Side::Ce => self.ce.as_ref(),
            Side::Pe => self.pe.as_ref(),
        }
    }

    /// Last traded price of one side; 0 when the leg is absent.
    pub fn ltp(&self, side: Side) -> f64 {
        self.quote(side).map_or(0.0, |q| q.last_price)
    }
}

/// A full options-chain snapshot for one underlying.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    #[serde(default)]
    pub underlying_value: Option<f64>,
    #[serde(default)]
    pub expiries: Vec<String>,
    pub rows: Vec<ChainRow>,
}

impl OptionChain {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_at(&self, strike: i64) -> Option<&ChainRow> {
        self.rows.iter().find(|r| r.strike() == strike)
    }

    /// LTP at a strike/side; 0 when the strike or leg is missing.
    pub fn ltp(&self, strike: i64, side: Side) -> f64 {
        self.row_at(strike).map_or(0.0, |r| r.ltp(side))
    }

    /// Sorted, de-duplicated strikes present in the chain.
    pub fn strikes(&self) -> Vec<i64> {
        let mut strikes: Vec<i64> = self.rows.iter().map(ChainRow::strike).collect();
        strikes.sort_unstable();
        strikes.dedup();
        strikes
    }
}
