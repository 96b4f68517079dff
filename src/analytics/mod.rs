//! Analytics over the canonical dataset

pub mod trends;

pub use trends::{DailyCount, TrendSummary};
