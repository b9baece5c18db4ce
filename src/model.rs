//! Retrieval models and their parameters.
//!
//! A [`RetrievalModel`] decides three things for a query: the operator that
//! wraps the whole query, which compound operators tolerate partially matched
//! documents, and the formulas used to score a document. The parameters are
//! fixed for a run and passed by reference into every scoring call.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::query::operator::Operator;

/// Parameters of the BM25 model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Query term frequency saturation.
    pub k3: f64,
    /// Length normalization.
    pub b: f64,
}

impl Bm25Params {
    /// Create validated BM25 parameters.
    pub fn new(k1: f64, k3: f64, b: f64) -> Result<Self> {
        if !(k1.is_finite() && k1 >= 0.0) {
            return Err(QuarryError::config(format!("BM25:k_1 must be >= 0, got {k1}")));
        }
        if !(k3.is_finite() && k3 >= 0.0) {
            return Err(QuarryError::config(format!("BM25:k_3 must be >= 0, got {k3}")));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(QuarryError::config(format!("BM25:b must be in [0, 1], got {b}")));
        }
        Ok(Bm25Params { k1, k3, b })
    }
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params {
            k1: 1.2,
            k3: 0.0,
            b: 0.75,
        }
    }
}

/// Parameters of the Indri language model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndriParams {
    /// Dirichlet prior.
    pub mu: f64,
    /// Jelinek-Mercer mixing weight.
    pub lambda: f64,
}

impl IndriParams {
    /// Create validated Indri parameters.
    pub fn new(mu: f64, lambda: f64) -> Result<Self> {
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(QuarryError::config(format!("Indri:mu must be >= 0, got {mu}")));
        }
        if !(0.0..=1.0).contains(&lambda) {
            return Err(QuarryError::config(format!(
                "Indri:lambda must be in [0, 1], got {lambda}"
            )));
        }
        Ok(IndriParams { mu, lambda })
    }
}

impl Default for IndriParams {
    fn default() -> Self {
        IndriParams {
            mu: 2500.0,
            lambda: 0.4,
        }
    }
}

/// The retrieval model a query is evaluated under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum RetrievalModel {
    /// Every matching document scores 1.0.
    #[serde(rename = "unrankedboolean")]
    UnrankedBoolean,
    /// Scores are raw term frequencies combined with min/max.
    #[serde(rename = "rankedboolean")]
    RankedBoolean,
    /// Okapi BM25.
    Bm25(Bm25Params),
    /// Dirichlet and Jelinek-Mercer smoothed query likelihood.
    Indri(IndriParams),
}

impl RetrievalModel {
    /// Look up a model by its configuration name with default parameters.
    ///
    /// Names are matched case-insensitively: `unrankedboolean`,
    /// `rankedboolean`, `bm25` and `indri`.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "unrankedboolean" => Ok(RetrievalModel::UnrankedBoolean),
            "rankedboolean" => Ok(RetrievalModel::RankedBoolean),
            "bm25" => Ok(RetrievalModel::Bm25(Bm25Params::default())),
            "indri" => Ok(RetrievalModel::Indri(IndriParams::default())),
            other => Err(QuarryError::config(format!(
                "unknown retrieval algorithm: {other}"
            ))),
        }
    }

    /// Display name used in errors and logs.
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalModel::UnrankedBoolean => "UnrankedBoolean",
            RetrievalModel::RankedBoolean => "RankedBoolean",
            RetrievalModel::Bm25(_) => "BM25",
            RetrievalModel::Indri(_) => "Indri",
        }
    }

    /// The operator the engine wraps every query in.
    pub fn default_operator(&self) -> Operator {
        match self {
            RetrievalModel::UnrankedBoolean | RetrievalModel::RankedBoolean => Operator::Or,
            RetrievalModel::Bm25(_) => Operator::Sum,
            RetrievalModel::Indri(_) => Operator::And,
        }
    }

    /// Whether documents missing some query terms still match conjunctive
    /// operators, scored with default scores for the missing parts.
    pub fn tolerates_missing_terms(&self) -> bool {
        matches!(self, RetrievalModel::Indri(_))
    }

    /// Whether the model defines a score for the operator.
    ///
    /// Term-level operators are never scored directly; they are reached
    /// through SCORE.
    pub fn supports(&self, operator: &Operator) -> bool {
        use Operator::*;
        match self {
            RetrievalModel::UnrankedBoolean | RetrievalModel::RankedBoolean => {
                matches!(operator, Score | And | Or)
            }
            RetrievalModel::Bm25(_) => matches!(operator, Score | Sum),
            RetrievalModel::Indri(_) => matches!(operator, Score | And | Wand | Wsum),
        }
    }
}

impl Default for RetrievalModel {
    fn default() -> Self {
        RetrievalModel::Bm25(Bm25Params::default())
    }
}

impl fmt::Display for RetrievalModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalModel::Bm25(p) => write!(f, "BM25(k1={}, k3={}, b={})", p.k1, p.k3, p.b),
            RetrievalModel::Indri(p) => write!(f, "Indri(mu={}, lambda={})", p.mu, p.lambda),
            other => f.write_str(other.name()),
        }
    }
}
