//! ATM selection and band derivation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::trade::{build_trades, SniperTrade};
use crate::domain::{Decision, OptionChain, PriceBar, Side};
use crate::math::nearest_strike;

/// Parameters of the band engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SniperRules {
    /// Strike grid of the underlying.
    pub strike_step: i64,
    /// Distance of the wing strikes used for the sniper value and trades.
    pub wing_offset: i64,
    /// Sniper value when either wing premium is missing or zero.
    pub default_sniper: f64,
}

impl Default for SniperRules {
    fn default() -> Self {
        Self {
            strike_step: 50,
            wing_offset: 100,
            default_sniper: 50.0,
        }
    }
}

/// ATM strike for a close: nearest strike, stepped down once when the close
/// sits below it. The result is always at or below the close.
pub fn atm_for_close(close: f64, step: i64) -> i64 {
    let atm = nearest_strike(close, step);
    if close < atm as f64 {
        atm - step
    } else {
        atm
    }
}

/// Bands for one date. Stored one per date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniperLevel {
    pub date: NaiveDate,
    pub close_price: f64,
    pub atm: i64,
    pub sniper: f64,
    pub upper: f64,
    pub lower: f64,
    pub upper_double: f64,
    pub lower_double: f64,
    pub bias: Decision,
}

impl SniperLevel {
    pub fn new(date: NaiveDate, close_price: f64, atm: i64, sniper: f64, bias: Decision) -> Self {
        let centre = atm as f64;
        Self {
            date,
            close_price,
            atm,
            sniper,
            upper: centre + sniper * 0.5,
            lower: centre - sniper * 0.5,
            upper_double: centre + sniper,
            lower_double: centre - sniper,
            bias,
        }
    }

    /// Close inside the single bands.
    pub fn in_range(&self) -> bool {
        self.close_price > self.lower && self.close_price < self.upper
    }
}

/// A level together with the trade set that replaces any previous one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SniperSetup {
    pub level: SniperLevel,
    pub trades: Vec<SniperTrade>,
}

/// Compute bands and trades for the bar's date.
///
/// Returns `None` without a daily bar, without a chain, or with an empty
/// chain; a partial result is never produced.
pub fn compute_sniper(
    bar: Option<&PriceBar>,
    chain: Option<&OptionChain>,
    rules: &SniperRules,
) -> Option<SniperSetup> {
    let bar = bar.filter(|b| b.is_daily() && b.close.is_finite())?;
    let chain = chain.filter(|c| !c.is_empty())?;

    let atm = atm_for_close(bar.close, rules.strike_step);
    let ce_wing = finite_ltp(chain, atm + rules.wing_offset, Side::Ce);
    let pe_wing = finite_ltp(chain, atm - rules.wing_offset, Side::Pe);
    let sniper = if ce_wing > 0.0 && pe_wing > 0.0 {
        (ce_wing + pe_wing) / 2.0
    } else {
        rules.default_sniper
    };

    let level = SniperLevel::new(bar.date, bar.close, atm, sniper, bar.decision());
    let trades = build_trades(&level, bar.points, chain, rules.wing_offset);
    debug!(
        date = %level.date,
        atm = level.atm,
        sniper = level.sniper,
        trades = trades.len(),
        "sniper computed"
    );
    Some(SniperSetup { level, trades })
}

fn finite_ltp(chain: &OptionChain, strike: i64, side: Side) -> f64 {
    let ltp = chain.ltp(strike, side);
    if ltp.is_finite() {
        ltp
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainRow, Interval, OptionQuote};

    fn quote(ltp: f64) -> Option<OptionQuote> {
        Some(OptionQuote {
            last_price: ltp,
            ..Default::default()
        })
    }

    fn chain() -> OptionChain {
        let rows = [
            (19_400.0, 210.0, 60.0),
            (19_500.0, 130.0, 110.0),
            (19_600.0, 70.0, 180.0),
        ]
        .into_iter()
        .map(|(strike, ce, pe)| ChainRow {
            strike_price: strike,
            ce: quote(ce),
            pe: quote(pe),
        })
        .collect();
        OptionChain {
            underlying_value: Some(19_530.0),
            expiries: vec![],
            rows,
        }
    }

    fn bar(close: f64, points: f64) -> PriceBar {
        PriceBar {
            index: "NIFTY".into(),
            interval: Interval::Daily,
            date: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            time: None,
            open: close - points,
            high: close + 20.0,
            low: close - points - 20.0,
            close,
            points,
        }
    }

    #[test]
    fn atm_rounds_then_steps_down() {
        assert_eq!(atm_for_close(19_530.0, 50), 19_500);
        assert_eq!(atm_for_close(19_470.0, 50), 19_450);
        assert_eq!(atm_for_close(19_500.0, 50), 19_500);
        assert_eq!(atm_for_close(19_524.9, 50), 19_500);
    }

    #[test]
    fn bands_from_sniper() {
        let level = SniperLevel::new(
            NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            19_530.0,
            19_500,
            100.0,
            Decision::Bullish,
        );
        assert_eq!(level.upper, 19_550.0);
        assert_eq!(level.lower, 19_450.0);
        assert_eq!(level.upper_double, 19_600.0);
        assert_eq!(level.lower_double, 19_400.0);
        assert!(level.in_range());
    }

    #[test]
    fn sniper_is_mean_of_wings() {
        let setup = compute_sniper(Some(&bar(19_530.0, 120.0)), Some(&chain()), &SniperRules::default())
            .unwrap();
        // CE at 19600 = 70, PE at 19400 = 60.
        assert_eq!(setup.level.atm, 19_500);
        assert_eq!(setup.level.sniper, 65.0);
        assert_eq!(setup.level.bias, Decision::Bullish);
        assert_eq!(setup.trades.len(), 6);
    }

    #[test]
    fn missing_wing_uses_default() {
        let mut c = chain();
        c.rows[0].pe = None;
        let setup =
            compute_sniper(Some(&bar(19_530.0, 10.0)), Some(&c), &SniperRules::default()).unwrap();
        assert_eq!(setup.level.sniper, 50.0);
        assert_eq!(setup.trades.len(), 5);
    }

    #[test]
    fn no_bar_or_chain_is_none() {
        let rules = SniperRules::default();
        assert!(compute_sniper(None, Some(&chain()), &rules).is_none());
        assert!(compute_sniper(Some(&bar(19_530.0, 0.0)), None, &rules).is_none());
        assert!(compute_sniper(Some(&bar(19_530.0, 0.0)), Some(&OptionChain::default()), &rules)
            .is_none());

        let mut hourly = bar(19_530.0, 0.0);
        hourly.interval = Interval::Hourly;
        assert!(compute_sniper(Some(&hourly), Some(&chain()), &rules).is_none());
    }
}
