//! Query execution and ranked results.

pub mod collector;
pub mod engine;

pub use self::collector::{ScoreList, ScoredDoc};
pub use self::engine::SearchEngine;
