use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A scored market headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub published_at: NaiveDateTime,
    /// -1 (strong negative) to +1 (strong positive).
    pub impact_score: f64,
}
