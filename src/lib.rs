//! # Quarry
//!
//! A structured-query ranking engine for Rust.
//!
//! ## Features
//!
//! - Query trees built from `#and`, `#or`, `#sum`, `#wand`, `#wsum`,
//!   `#near/k` and `#window/k`
//! - Unranked and ranked boolean retrieval
//! - BM25 and Indri (Dirichlet + Jelinek-Mercer) scoring
//! - Pseudo relevance feedback
//! - Batch runs with TREC output, optionally in parallel
//!
//! ## Example
//!
//! ```
//! use quarry::index::{IndexDocument, MemoryIndex};
//! use quarry::model::RetrievalModel;
//! use quarry::search::SearchEngine;
//!
//! let index = MemoryIndex::from_documents(vec![
//!     IndexDocument::new("a").with_field("body", "information retrieval systems"),
//!     IndexDocument::new("b").with_field("body", "retrieval of information"),
//! ])
//! .unwrap();
//!
//! let engine = SearchEngine::new(&index);
//! let results = engine
//!     .search("#and(#near/1(information retrieval))", &RetrievalModel::RankedBoolean)
//!     .unwrap();
//! assert_eq!(results.doc_ids(), vec![0]);
//! ```

pub mod analysis;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod feedback;
pub mod index;
pub mod model;
pub mod query;
pub mod search;

pub mod prelude {
    pub use crate::error::{QuarryError, Result};
    pub use crate::index::{IndexDocument, IndexStore, MemoryIndex};
    pub use crate::model::{Bm25Params, IndriParams, RetrievalModel};
    pub use crate::query::{Operator, QueryParser, QueryTree};
    pub use crate::search::{ScoreList, SearchEngine};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
