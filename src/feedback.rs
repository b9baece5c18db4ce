//! Pseudo relevance feedback.
//!
//! The top documents of an initial ranking are assumed relevant. Every term
//! in their `body` term vectors is scored with
//!
//! ```text
//! score(t) = sum over d of p(t|d) * score(d) * ln(|C| / ctf(t))
//! p(t|d)   = (tf(t, d) + mu * ctf(t) / |C|) / (|d| + mu)
//! ```
//!
//! and the best terms form a `#wand` expansion query that is mixed with the
//! original query.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::index::{IndexStore, TermVector};
use crate::search::collector::ScoreList;

/// Field the expansion terms are drawn from.
pub const FEEDBACK_FIELD: &str = "body";

/// Feedback parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeedbackParams {
    /// Number of top documents treated as relevant.
    pub docs: usize,
    /// Number of expansion terms.
    pub terms: usize,
    /// Dirichlet prior for `p(t|d)`.
    pub mu: f64,
    /// Weight of the original query in the expanded query.
    pub orig_weight: f64,
}

impl FeedbackParams {
    /// Create validated feedback parameters.
    pub fn new(docs: usize, terms: usize, mu: f64, orig_weight: f64) -> Result<Self> {
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(QuarryError::config(format!("fbMu must be >= 0, got {mu}")));
        }
        if !(0.0..=1.0).contains(&orig_weight) {
            return Err(QuarryError::config(format!(
                "fbOrigWeight must be in [0, 1], got {orig_weight}"
            )));
        }
        Ok(FeedbackParams {
            docs,
            terms,
            mu,
            orig_weight,
        })
    }
}

impl Default for FeedbackParams {
    fn default() -> Self {
        FeedbackParams {
            docs: 10,
            terms: 10,
            mu: 0.0,
            orig_weight: 0.5,
        }
    }
}

/// A candidate expansion term with its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionTerm {
    /// The term.
    pub term: String,
    /// Feedback score.
    pub score: f64,
}

/// Builds expansion queries from an initial ranking.
#[derive(Debug, Clone)]
pub struct QueryExpander<'a> {
    index: &'a dyn IndexStore,
    params: FeedbackParams,
}

impl<'a> QueryExpander<'a> {
    /// Create an expander over an index.
    pub fn new(index: &'a dyn IndexStore, params: FeedbackParams) -> Self {
        QueryExpander { index, params }
    }

    /// The feedback parameters.
    pub fn params(&self) -> &FeedbackParams {
        &self.params
    }

    /// Score candidate terms of the top documents, best first.
    ///
    /// `ranking` must already be sorted; only its first `docs` entries are
    /// used. Ties are broken by ascending term.
    pub fn expansion_terms(&self, ranking: &ScoreList) -> Result<Vec<ExpansionTerm>> {
        let collection_length = self.index.sum_field_lengths(FEEDBACK_FIELD)? as f64;
        if collection_length == 0.0 {
            return Ok(Vec::new());
        }

        let mut feedback_docs: Vec<(TermVector, f64)> = Vec::new();
        for entry in ranking.iter().take(self.params.docs) {
            if let Some(vector) = self.index.term_vector(FEEDBACK_FIELD, entry.doc_id)? {
                feedback_docs.push((vector, entry.score));
            }
        }

        let mut candidates: BTreeMap<&str, u64> = BTreeMap::new();
        for (vector, _) in &feedback_docs {
            for entry in &vector.entries {
                if entry.term.contains('.') || entry.term.contains(',') || entry.ctf == 0 {
                    continue;
                }
                candidates.entry(entry.term.as_str()).or_insert(entry.ctf);
            }
        }

        let mu = self.params.mu;
        let mut scored: Vec<ExpansionTerm> = candidates
            .into_iter()
            .map(|(term, ctf)| {
                let p_collection = ctf as f64 / collection_length;
                let idf = (collection_length / ctf as f64).ln();
                let score = feedback_docs
                    .iter()
                    .map(|(vector, doc_score)| {
                        let tf = vector.get(term).map_or(0.0, |e| e.tf as f64);
                        let p_doc = (tf + mu * p_collection) / (vector.length as f64 + mu);
                        p_doc * doc_score * idf
                    })
                    .sum();
                ExpansionTerm {
                    term: term.to_string(),
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.term.cmp(&b.term))
        });
        scored.truncate(self.params.terms);
        Ok(scored)
    }

    /// The expansion query for a ranking, e.g. `#wand ( 0.0123 apple )`.
    ///
    /// Returns `None` when no candidate term was found.
    pub fn expansion_query(&self, ranking: &ScoreList) -> Result<Option<String>> {
        let terms = self.expansion_terms(ranking)?;
        if terms.is_empty() {
            return Ok(None);
        }
        let body: Vec<String> = terms
            .iter()
            .map(|t| format!("{:.4} {}", t.score, t.term))
            .collect();
        Ok(Some(format!("#wand ( {} )", body.join(" "))))
    }

    /// Combine the original query with its expansion.
    pub fn expanded_query(&self, original: &str, expansion: &str) -> String {
        let w = self.params.orig_weight;
        format!("#wand ( {w} #and ( {original} ) {} {expansion} )", 1.0 - w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexDocument, MemoryIndex};

    fn index() -> MemoryIndex {
        MemoryIndex::from_documents(vec![
            IndexDocument::new("d0").with_field("body", "rust borrow checker rust"),
            IndexDocument::new("d1").with_field("body", "rust cargo"),
            IndexDocument::new("d2").with_field("body", "python pip"),
            IndexDocument::new("d3").with_field("body", "v1.2 release notes"),
        ])
        .unwrap()
    }

    #[test]
    fn test_expansion_terms_scores() {
        let index = index();
        let params = FeedbackParams::new(2, 10, 0.0, 0.5).unwrap();
        let expander = QueryExpander::new(&index, params);
        let ranking: ScoreList = [(0, 0.8), (1, 0.4), (2, 0.1)].into_iter().collect();

        let terms = expander.expansion_terms(&ranking).unwrap();
        let names: Vec<&str> = terms.iter().map(|t| t.term.as_str()).collect();
        assert!(!names.contains(&"python"));
        assert_eq!(names.len(), 4);

        // |C| = 4 + 2 + 2 + 3 = 11, mu = 0.
        let rust = terms.iter().find(|t| t.term == "rust").unwrap();
        let expected = (2.0 / 4.0 * 0.8 + 1.0 / 2.0 * 0.4) * (11.0f64 / 3.0).ln();
        assert!((rust.score - expected).abs() < 1e-12);
        assert_eq!(terms[0].term, "rust");
    }

    #[test]
    fn test_ties_broken_by_term() {
        let index = index();
        let params = FeedbackParams::new(1, 3, 0.0, 0.5).unwrap();
        let expander = QueryExpander::new(&index, params);
        let ranking: ScoreList = [(0, 1.0)].into_iter().collect();

        let terms = expander.expansion_terms(&ranking).unwrap();
        let names: Vec<&str> = terms.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(names, vec!["rust", "borrow", "checker"]);
        assert_eq!(terms[1].score, terms[2].score);
    }

    #[test]
    fn test_skips_terms_with_periods() {
        let index = index();
        let expander = QueryExpander::new(&index, FeedbackParams::default());
        let ranking: ScoreList = [(3, 1.0)].into_iter().collect();

        let terms = expander.expansion_terms(&ranking).unwrap();
        assert!(terms.iter().all(|t| !t.term.contains('.')));
        assert!(terms.iter().any(|t| t.term == "release"));
    }

    #[test]
    fn test_query_shapes() {
        let index = index();
        let params = FeedbackParams::new(1, 1, 0.0, 0.7).unwrap();
        let expander = QueryExpander::new(&index, params);
        let ranking: ScoreList = [(2, 1.0)].into_iter().collect();

        let expansion = expander.expansion_query(&ranking).unwrap().unwrap();
        assert!(expansion.starts_with("#wand ( "));
        assert!(expansion.ends_with(" pip )"));

        let combined = expander.expanded_query("python", &expansion);
        assert!(combined.starts_with("#wand ( 0.7 #and ( python ) 0.3"));
        assert!(combined.ends_with(&format!(" {expansion} )")));

        assert!(expander.expansion_query(&ScoreList::new()).unwrap().is_none());
    }

    #[test]
    fn test_parameter_validation() {
        assert!(FeedbackParams::new(10, 10, -1.0, 0.5).is_err());
        assert!(FeedbackParams::new(10, 10, 0.0, 1.5).is_err());
    }
}
