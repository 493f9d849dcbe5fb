//! Trap detection.
//!
//! - [`price`]: a day that moves hard against the institutional flow
//! - [`chain`]: volume/OI shifts between consecutive option-chain captures

pub mod chain;
pub mod price;

pub use chain::{detect_chain_trap, summarize_chain, ChainSummary, ChainTrap, StrikeSummary};
pub use price::{detect_price_traps, related_news, DateRange, TrapResult, TrapRules, TrapType};
