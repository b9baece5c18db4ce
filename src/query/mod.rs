//! Query trees and their evaluation.
//!
//! A query is an arena of [`Operator`] nodes ([`QueryTree`]). Evaluating it
//! under a [`RetrievalModel`](crate::model::RetrievalModel) creates an
//! [`Evaluation`] that iterates matching documents in increasing id order and
//! scores each of them.

pub mod matcher;
pub mod operator;
pub mod parser;
pub mod proximity;
pub mod scorer;
pub mod tree;

pub use self::matcher::{Evaluation, MatchPolicy, MatchState, match_policy};
pub use self::operator::Operator;
pub use self::parser::QueryParser;
pub use self::tree::{NodeId, QueryNode, QueryTree};
