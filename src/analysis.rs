//! Text analysis shared by the index builder and the query parser.
//!
//! Documents and query terms must go through the same pipeline, otherwise a
//! query term would never meet its posting list. The pipeline is deliberately
//! small: Unicode word segmentation, lowercasing, English stop word removal.

pub mod analyzer;
pub mod token;

pub use self::analyzer::{Analyzer, StandardAnalyzer};
pub use self::token::{Token, TokenStream};
