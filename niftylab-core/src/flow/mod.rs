//! Institutional-flow analytics.
//!
//! - [`normalizer`]: rolling z-scores and the five-level classification
//! - [`trade_idea`]: classification + price → option strategy text
//! - [`reconcile`]: classification vs realized price movement

pub mod normalizer;
pub mod reconcile;
pub mod trade_idea;

pub use normalizer::{label_from_z, FlowNormalizer, FlowScore, STRONG_Z, WEAK_Z};
pub use reconcile::{
    quick_reconcile, reconcile_flows, FlowAnalysis, QuickReconciliation, NEUTRAL_BAND_PCT,
};
pub use trade_idea::{generate_trade_idea, Confidence, RiskProfile, TradeIdea};
