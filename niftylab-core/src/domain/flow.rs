//! Institutional (FII/DII) cash-market flow records.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Decision;

/// One trading day of FII/DII buy, sell and net values (₹ crore).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub date: NaiveDate,
    #[serde(default)]
    pub fii_buy: f64,
    #[serde(default)]
    pub fii_sell: f64,
    pub fii_net: f64,
    #[serde(default)]
    pub dii_buy: f64,
    #[serde(default)]
    pub dii_sell: f64,
    pub dii_net: f64,
}

impl FlowRecord {
    /// Convenience constructor when only the net figures are known.
    pub fn from_net(date: NaiveDate, fii_net: f64, dii_net: f64) -> Self {
        Self {
            date,
            fii_buy: 0.0,
            fii_sell: 0.0,
            fii_net,
            dii_buy: 0.0,
            dii_sell: 0.0,
            dii_net,
        }
    }

    pub fn total_net(&self) -> f64 {
        self.fii_net + self.dii_net
    }

    /// Market impact implied by the combined net flow.
    pub fn impact(&self) -> Decision {
        Decision::from_sign(self.total_net())
    }
}

/// Five-level flow strength classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowSignal {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

impl FlowSignal {
    /// StrongBullish or Bullish.
    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::StrongBullish | Self::Bullish)
    }

    /// StrongBearish or Bearish.
    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::StrongBearish | Self::Bearish)
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, Self::StrongBullish | Self::StrongBearish)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StrongBullish => "StrongBullish",
            Self::Bullish => "Bullish",
            Self::Neutral => "Neutral",
            Self::Bearish => "Bearish",
            Self::StrongBearish => "StrongBearish",
        }
    }
}

impl fmt::Display for FlowSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_net_and_impact() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let rec = FlowRecord::from_net(d, -1_200.0, 900.0);
        assert_eq!(rec.total_net(), -300.0);
        assert_eq!(rec.impact(), Decision::Bearish);
        assert_eq!(FlowRecord::from_net(d, 100.0, -100.0).impact(), Decision::Neutral);
    }

    #[test]
    fn signal_families() {
        assert!(FlowSignal::StrongBullish.is_bullish());
        assert!(FlowSignal::Bullish.is_bullish());
        assert!(!FlowSignal::Neutral.is_bullish());
        assert!(!FlowSignal::Neutral.is_bearish());
        assert!(FlowSignal::Bearish.is_bearish());
        assert!(FlowSignal::StrongBearish.is_strong());
        assert!(!FlowSignal::Bearish.is_strong());
    }
}
