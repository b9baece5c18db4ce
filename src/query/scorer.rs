//! Document scoring for every operator and retrieval model.
//!
//! | Operator | Unranked | Ranked | BM25 | Indri |
//! |---|---|---|---|---|
//! | SCORE | 1.0 | tf | RSJ * tf weight | smoothed probability |
//! | AND | 1.0 | min | - | geometric mean |
//! | OR | 1.0 | max | - | - |
//! | SUM | - | - | sum | - |
//! | WAND | - | - | - | weighted geometric mean |
//! | WSUM | - | - | - | weighted mean |
//!
//! Under Indri, a child that does not match the current document contributes
//! its default score, computed recursively with `tf = 0` at the leaves.

use crate::error::{QuarryError, Result};
use crate::index::DocId;
use crate::model::{Bm25Params, IndriParams, RetrievalModel};
use crate::query::matcher::Evaluation;
use crate::query::operator::Operator;
use crate::query::tree::{NodeId, QueryNode, QueryTree};

/// Reject operator and model combinations that cannot be scored, before any
/// document is visited.
pub fn validate(tree: &QueryTree, root: NodeId, model: &RetrievalModel) -> Result<()> {
    let node = tree.node(root);
    let operator = &node.operator;
    if operator.is_term_level() || !model.supports(operator) {
        return Err(QuarryError::unsupported(model.name(), operator.name()));
    }
    if operator.is_weighted() && node.weights.iter().sum::<f64>() <= 0.0 {
        return Err(QuarryError::query(format!(
            "{} weights must not all be zero",
            operator.name()
        )));
    }
    if let Operator::Score = operator {
        return Ok(());
    }
    for &child in &node.children {
        validate(tree, child, model)?;
    }
    Ok(())
}

/// BM25 weight of one term in one document.
///
/// `RSJ = max(0, ln((N - df + 0.5) / (df + 0.5)))` times
/// `tf / (tf + k1 * (1 - b + b * len / avg_len))`.
pub fn bm25_term_weight(
    params: &Bm25Params,
    num_docs: u64,
    df: u64,
    tf: f64,
    doc_len: f64,
    avg_len: f64,
) -> f64 {
    let n = num_docs as f64;
    let df = df as f64;
    let rsj = ((n - df + 0.5) / (df + 0.5)).ln().max(0.0);

    let length_ratio = if avg_len > 0.0 { doc_len / avg_len } else { 1.0 };
    let norm = params.k1 * (1.0 - params.b + params.b * length_ratio);
    if tf + norm == 0.0 {
        return 0.0;
    }
    rsj * tf / (tf + norm)
}

/// Indri probability of one term in one document, with Dirichlet smoothing
/// mixed with the collection model.
pub fn indri_term_score(
    params: &IndriParams,
    tf: f64,
    ctf: u64,
    collection_length: u64,
    doc_len: f64,
) -> f64 {
    let p_mle = if collection_length > 0 {
        ctf as f64 / collection_length as f64
    } else {
        0.0
    };
    let denominator = doc_len + params.mu;
    let bayes = if denominator > 0.0 {
        (tf + params.mu * p_mle) / denominator
    } else {
        0.0
    };
    (1.0 - params.lambda) * bayes + params.lambda * p_mle
}

/// Score of a node for the document it currently matches.
pub fn score(evaluation: &Evaluation<'_>, id: NodeId) -> Result<f64> {
    let doc_id = evaluation.get_match(id)?;
    let model = evaluation.model();
    let node = evaluation.tree().node(id);

    match (&node.operator, model) {
        (Operator::Score, _) => {
            let child = node.children[0];
            let posting = evaluation.current_posting(child)?.ok_or_else(|| {
                QuarryError::illegal_state(format!("{child} has no posting for document {doc_id}"))
            })?;
            term_score(evaluation, child, posting.tf as f64, doc_id)
        }
        (Operator::And | Operator::Or, RetrievalModel::UnrankedBoolean) => Ok(1.0),
        (Operator::And, RetrievalModel::RankedBoolean) => {
            let mut min = f64::MAX;
            for &child in &node.children {
                min = min.min(score(evaluation, child)?);
            }
            Ok(min)
        }
        (Operator::Or, RetrievalModel::RankedBoolean) => {
            let mut max = 0.0f64;
            for &child in &node.children {
                if evaluation.matches_doc(child, doc_id) {
                    max = max.max(score(evaluation, child)?);
                }
            }
            Ok(max)
        }
        (Operator::Sum, RetrievalModel::Bm25(_)) => {
            let mut sum = 0.0;
            for &child in &node.children {
                if evaluation.matches_doc(child, doc_id) {
                    sum += score(evaluation, child)?;
                }
            }
            Ok(sum)
        }
        (Operator::And | Operator::Wand, RetrievalModel::Indri(_)) => {
            let mut product = 1.0;
            for (&child, weight) in node.children.iter().zip(normalized_weights(node)) {
                let child_score = if evaluation.matches_doc(child, doc_id) {
                    score(evaluation, child)?
                } else {
                    default_score(evaluation, child, doc_id)?
                };
                product *= child_score.powf(weight);
            }
            Ok(product)
        }
        (Operator::Wsum, RetrievalModel::Indri(_)) => {
            let mut sum = 0.0;
            for (&child, weight) in node.children.iter().zip(normalized_weights(node)) {
                let child_score = if evaluation.matches_doc(child, doc_id) {
                    score(evaluation, child)?
                } else {
                    default_score(evaluation, child, doc_id)?
                };
                sum += weight * child_score;
            }
            Ok(sum)
        }
        (operator, model) => Err(QuarryError::unsupported(model.name(), operator.name())),
    }
}

/// Score a node would give a document it does not match.
///
/// Only the Indri model defines default scores.
pub fn default_score(evaluation: &Evaluation<'_>, id: NodeId, doc_id: DocId) -> Result<f64> {
    let model = evaluation.model();
    let node = evaluation.tree().node(id);
    let RetrievalModel::Indri(params) = model else {
        return Err(QuarryError::unsupported(model.name(), node.operator.name()));
    };

    match &node.operator {
        Operator::Score => {
            let child = node.children[0];
            let list = evaluation.postings(child)?;
            let index = evaluation.index();
            let doc_len = index.field_length(list.field(), doc_id)? as f64;
            let collection_length = index.sum_field_lengths(list.field())?;
            Ok(indri_term_score(
                params,
                0.0,
                list.ctf(),
                collection_length,
                doc_len,
            ))
        }
        Operator::And | Operator::Wand => {
            let mut product = 1.0;
            for (&child, weight) in node.children.iter().zip(normalized_weights(node)) {
                product *= default_score(evaluation, child, doc_id)?.powf(weight);
            }
            Ok(product)
        }
        Operator::Wsum => {
            let mut sum = 0.0;
            for (&child, weight) in node.children.iter().zip(normalized_weights(node)) {
                sum += weight * default_score(evaluation, child, doc_id)?;
            }
            Ok(sum)
        }
        operator => Err(QuarryError::unsupported(model.name(), operator.name())),
    }
}

fn term_score(evaluation: &Evaluation<'_>, term: NodeId, tf: f64, doc_id: DocId) -> Result<f64> {
    let index = evaluation.index();
    match evaluation.model() {
        RetrievalModel::UnrankedBoolean => Ok(1.0),
        RetrievalModel::RankedBoolean => Ok(tf),
        RetrievalModel::Bm25(params) => {
            let list = evaluation.postings(term)?;
            let field = list.field();
            Ok(bm25_term_weight(
                params,
                index.num_docs(),
                list.df(),
                tf,
                index.field_length(field, doc_id)? as f64,
                index.average_field_length(field)?,
            ))
        }
        RetrievalModel::Indri(params) => {
            let list = evaluation.postings(term)?;
            let field = list.field();
            Ok(indri_term_score(
                params,
                tf,
                list.ctf(),
                index.sum_field_lengths(field)?,
                index.field_length(field, doc_id)? as f64,
            ))
        }
    }
}

/// Child weights divided by their sum; equal weights for unweighted nodes.
fn normalized_weights(node: &QueryNode) -> Vec<f64> {
    if node.weights.is_empty() {
        let n = node.children.len() as f64;
        return vec![1.0 / n; node.children.len()];
    }
    let total: f64 = node.weights.iter().sum();
    node.weights.iter().map(|w| w / total).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexDocument, MemoryIndex};

    fn index() -> MemoryIndex {
        MemoryIndex::from_documents(vec![
            IndexDocument::new("d0").with_field("body", "apple apple pie"),
            IndexDocument::new("d1").with_field("body", "banana split"),
            IndexDocument::new("d2").with_field("body", "apple banana smoothie"),
        ])
        .unwrap()
    }

    fn scores(tree: &QueryTree, model: &RetrievalModel, index: &MemoryIndex) -> Vec<(DocId, f64)> {
        let mut evaluation = Evaluation::initialize(tree, model, index).unwrap();
        let root = tree.root().unwrap();
        let mut results = Vec::new();
        while evaluation.has_match(root).unwrap() {
            let doc_id = evaluation.get_match(root).unwrap();
            results.push((doc_id, evaluation.score(root).unwrap()));
            evaluation.advance_past(root, doc_id).unwrap();
        }
        results
    }

    fn flat(operator: Operator, terms: &[&str]) -> QueryTree {
        let mut tree = QueryTree::new();
        let children = terms.iter().map(|t| tree.add_term("body", *t)).collect();
        let root = tree.add_node(operator, children).unwrap();
        tree.set_root(root).unwrap();
        tree
    }

    #[test]
    fn test_bm25_golden_value() {
        let params = Bm25Params::new(1.2, 0.0, 0.75).unwrap();
        let weight = bm25_term_weight(&params, 1000, 10, 3.0, 100.0, 80.0);

        let rsj = (990.5f64 / 10.5).ln();
        let tf_weight = 3.0 / (3.0 + 1.2 * (0.25 + 0.75 * 1.25));
        assert!((weight - rsj * tf_weight).abs() < 1e-12);
        assert!((weight - 3.0826).abs() < 1e-4);
    }

    #[test]
    fn test_bm25_rsj_floor() {
        let params = Bm25Params::default();
        assert_eq!(bm25_term_weight(&params, 10, 9, 2.0, 5.0, 5.0), 0.0);
    }

    #[test]
    fn test_indri_default_follows_formula() {
        let params = IndriParams::new(2500.0, 0.4).unwrap();
        let default = indri_term_score(&params, 0.0, 50, 100_000, 200.0);

        let p_mle = 50.0 / 100_000.0;
        let expected = 0.6 * (2500.0 * p_mle / 2700.0) + 0.4 * p_mle;
        assert!((default - expected).abs() < 1e-15);
        assert!(default > params.lambda * p_mle);
    }

    #[test]
    fn test_ranked_boolean_min_and_max() {
        let index = index();
        let model = RetrievalModel::RankedBoolean;

        let and = flat(Operator::And, &["apple", "banana"]);
        assert_eq!(scores(&and, &model, &index), vec![(2, 1.0)]);

        let or = flat(Operator::Or, &["apple", "banana"]);
        assert_eq!(
            scores(&or, &model, &index),
            vec![(0, 2.0), (1, 1.0), (2, 1.0)]
        );
    }

    #[test]
    fn test_unranked_boolean() {
        let index = index();
        let or = flat(Operator::Or, &["pie", "split"]);
        assert_eq!(
            scores(&or, &RetrievalModel::UnrankedBoolean, &index),
            vec![(0, 1.0), (1, 1.0)]
        );
    }

    #[test]
    fn test_bm25_sum_adds_matching_children() {
        let index = index();
        let model = RetrievalModel::Bm25(Bm25Params::default());
        let sum = flat(Operator::Sum, &["pie", "smoothie"]);
        let single = flat(Operator::Sum, &["pie"]);

        let combined = scores(&sum, &model, &index);
        let pie = scores(&single, &model, &index);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0], pie[0]);
        assert_eq!(combined[1].0, 2);
        assert!(combined[1].1 > 0.0);
    }

    #[test]
    fn test_indri_and_uses_default_scores() {
        let index = index();
        let params = IndriParams::new(10.0, 0.2).unwrap();
        let model = RetrievalModel::Indri(params);
        let and = flat(Operator::And, &["pie", "split"]);

        let results = scores(&and, &model, &index);
        assert_eq!(results.len(), 2);

        // d0: pie present (tf 1, len 3), split absent.
        let pie = indri_term_score(&params, 1.0, 1, 8, 3.0);
        let split_default = indri_term_score(&params, 0.0, 1, 8, 3.0);
        let expected = (pie * split_default).powf(0.5);
        assert_eq!(results[0].0, 0);
        assert!((results[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn test_indri_weighted_operators() {
        let index = index();
        let params = IndriParams::new(10.0, 0.2).unwrap();
        let model = RetrievalModel::Indri(params);

        let mut tree = QueryTree::new();
        let pie = tree.add_term("body", "pie");
        let split = tree.add_term("body", "split");
        let wsum = tree.add_weighted(Operator::Wsum, vec![(3.0, pie), (1.0, split)]).unwrap();
        tree.set_root(wsum).unwrap();

        let results = scores(&tree, &model, &index);
        let p = indri_term_score(&params, 1.0, 1, 8, 3.0);
        let d = indri_term_score(&params, 0.0, 1, 8, 3.0);
        assert!((results[0].1 - (0.75 * p + 0.25 * d)).abs() < 1e-12);

        let mut tree = QueryTree::new();
        let pie = tree.add_term("body", "pie");
        let split = tree.add_term("body", "split");
        let wand = tree.add_weighted(Operator::Wand, vec![(3.0, pie), (1.0, split)]).unwrap();
        tree.set_root(wand).unwrap();

        let results = scores(&tree, &model, &index);
        assert!((results[0].1 - p.powf(0.75) * d.powf(0.25)).abs() < 1e-12);
    }

    #[test]
    fn test_default_score_is_recursive() {
        let index = index();
        let params = IndriParams::new(10.0, 0.2).unwrap();
        let model = RetrievalModel::Indri(params);

        // #and( pie #wsum( 1 split 1 smoothie ) ): d0 matches only pie.
        let mut tree = QueryTree::new();
        let pie = tree.add_term("body", "pie");
        let split = tree.add_term("body", "split");
        let smoothie = tree.add_term("body", "smoothie");
        let wsum = tree.add_node(Operator::Wsum, vec![split, smoothie]).unwrap();
        let root = tree.add_node(Operator::And, vec![pie, wsum]).unwrap();
        tree.set_root(root).unwrap();

        let results = scores(&tree, &model, &index);
        let pie_score = indri_term_score(&params, 1.0, 1, 8, 3.0);
        let wsum_default = 0.5 * indri_term_score(&params, 0.0, 1, 8, 3.0)
            + 0.5 * indri_term_score(&params, 0.0, 1, 8, 3.0);
        assert_eq!(results[0].0, 0);
        assert!(wsum_default > 0.0);
        assert!((results[0].1 - (pie_score * wsum_default).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_default_score_requires_indri() {
        let index = index();
        let model = RetrievalModel::RankedBoolean;
        let tree = flat(Operator::Or, &["apple"]);
        let evaluation = Evaluation::initialize(&tree, &model, &index).unwrap();

        let err = default_score(&evaluation, tree.root().unwrap(), 0).unwrap_err();
        assert!(matches!(err, QuarryError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_validate_rejects_unsupported() {
        let cases = [
            (Operator::Or, RetrievalModel::Indri(IndriParams::default())),
            (Operator::Sum, RetrievalModel::RankedBoolean),
            (Operator::Wand, RetrievalModel::Bm25(Bm25Params::default())),
            (Operator::Wsum, RetrievalModel::UnrankedBoolean),
        ];
        for (operator, model) in cases {
            let tree = flat(operator, &["apple"]);
            let err = validate(&tree, tree.root().unwrap(), &model).unwrap_err();
            assert!(matches!(err, QuarryError::UnsupportedOperation { .. }));
        }
    }

    #[test]
    fn test_validate_rejects_zero_weights() {
        let mut tree = QueryTree::new();
        let a = tree.add_term("body", "apple");
        let root = tree.add_weighted(Operator::Wand, vec![(0.0, a)]).unwrap();
        tree.set_root(root).unwrap();

        let model = RetrievalModel::Indri(IndriParams::default());
        assert!(matches!(
            validate(&tree, root, &model),
            Err(QuarryError::Query(_))
        ));
    }
}
