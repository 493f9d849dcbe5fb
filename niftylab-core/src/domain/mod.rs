//! Domain types for NiftyLab

pub mod bar;
pub mod chain;
pub mod decision;
pub mod flow;
pub mod ids;
pub mod news;

pub use bar::{fill_points, Interval, PriceBar};
pub use chain::{ChainRow, OptionChain, OptionQuote, Side};
pub use decision::Decision;
pub use flow::{FlowRecord, FlowSignal};
pub use ids::ChainHash;
pub use news::NewsItem;

/// Index identifier ("NIFTY", "BANKNIFTY", "SENSEX").
pub type IndexId = String;
