//! Sniper band engine.
//!
//! From a day's close and the option chain: an ATM strike, a "sniper" value
//! (average premium of the two 100-point wings), single and double bands
//! around ATM, and a small set of trade plans on the strikes next to ATM.
//!
//! Everything here is pure. Persisting a level and replacing its trades is
//! the store's job, as one all-or-nothing operation.

pub mod action;
pub mod band;
pub mod trade;

pub use action::{assign_action, SniperAction};
pub use band::{atm_for_close, compute_sniper, SniperLevel, SniperRules, SniperSetup};
pub use trade::{build_trades, SniperTrade, TradeNoteKind};
