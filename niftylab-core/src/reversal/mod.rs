//! Trend-reversal detection.
//!
//! A cleaned daily (or intraday) series is cut into maximal runs of equal
//! close-to-close direction. Every time the direction flips to up or down,
//! a reversal event is emitted at the first bar of the new run.
//!
//! - [`streak`]: series cleaning and segmentation
//! - [`detect`]: events, momentum bias, summary
//! - [`pivot`]: floor pivots and the reversal/pivot confluence

pub mod detect;
pub mod pivot;
pub mod streak;

pub use detect::{
    detect_reversals, summarize, MomentumBias, ReversalEvent, ReversalKey, ReversalSummary,
    TradeConfidence,
};
pub use pivot::{
    confluence, daily_pivot, hourly_pivot, pivot_levels, weekly_pivot, Confluence, PivotLevels,
    PivotSentiment,
};
pub use streak::{clean_series, segment_streaks, Streak, Trend};
