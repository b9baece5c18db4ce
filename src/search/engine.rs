//! Query evaluation entry point.

use crate::error::Result;
use crate::index::IndexStore;
use crate::model::RetrievalModel;
use crate::query::matcher::Evaluation;
use crate::query::parser::QueryParser;
use crate::query::tree::QueryTree;
use crate::search::collector::ScoreList;

/// Evaluates queries against an index store.
///
/// The engine borrows the store and keeps no per-query state, so one engine
/// can serve many queries, including from several threads at once.
#[derive(Debug, Clone)]
pub struct SearchEngine<'a> {
    index: &'a dyn IndexStore,
    parser: QueryParser,
}

impl<'a> SearchEngine<'a> {
    /// Create an engine over an index with the default query parser.
    pub fn new(index: &'a dyn IndexStore) -> Self {
        SearchEngine {
            index,
            parser: QueryParser::new(),
        }
    }

    /// Use a custom query parser for [`SearchEngine::search`].
    pub fn with_parser(mut self, parser: QueryParser) -> Self {
        self.parser = parser;
        self
    }

    /// The index store.
    pub fn index(&self) -> &'a dyn IndexStore {
        self.index
    }

    /// Parse a query string the way [`SearchEngine::search`] does.
    pub fn parse(&self, query: &str, model: &RetrievalModel) -> Result<QueryTree> {
        self.parser.parse(query, model.default_operator())
    }

    /// Parse and evaluate a query string.
    pub fn search(&self, query: &str, model: &RetrievalModel) -> Result<ScoreList> {
        let tree = self.parse(query, model)?;
        log::debug!("parsed {query:?} as {tree}");
        self.evaluate(&tree, model)
    }

    /// Evaluate a query tree and return its ranked results.
    ///
    /// The tree is wrapped in the model's default operator unless its root
    /// already is that operator. A tree without a root has no results.
    pub fn evaluate(&self, tree: &QueryTree, model: &RetrievalModel) -> Result<ScoreList> {
        tree.validate()?;
        let Some(root) = tree.root() else {
            log::debug!("empty query, nothing to evaluate");
            return Ok(ScoreList::new());
        };

        let default_operator = model.default_operator();
        let wrapped;
        let tree = if tree.operator(root) == &default_operator {
            tree
        } else {
            let mut copy = tree.clone();
            copy.wrap_root(default_operator)?;
            wrapped = copy;
            &wrapped
        };

        let mut results = self.run(tree, model)?;
        results.sort();
        log::debug!("{} matched {} documents under {model}", tree, results.len());
        Ok(results)
    }

    fn run(&self, tree: &QueryTree, model: &RetrievalModel) -> Result<ScoreList> {
        let mut evaluation = Evaluation::initialize(tree, model, self.index)?;
        let mut results = ScoreList::new();
        let Some(root) = tree.root() else {
            return Ok(results);
        };

        while evaluation.has_match(root)? {
            let doc_id = evaluation.get_match(root)?;
            results.add(doc_id, evaluation.score(root)?);
            evaluation.advance_past(root, doc_id)?;
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QuarryError;
    use crate::index::{IndexDocument, MemoryIndex};
    use crate::model::{Bm25Params, IndriParams};

    fn index() -> MemoryIndex {
        MemoryIndex::from_documents(vec![
            IndexDocument::new("d0").with_field("body", "rust search engine"),
            IndexDocument::new("d1").with_field("body", "search engine ranking"),
            IndexDocument::new("d2").with_field("body", "rust compiler"),
        ])
        .unwrap()
    }

    #[test]
    fn test_custom_parser() {
        let index = MemoryIndex::from_documents(vec![
            IndexDocument::new("d0")
                .with_field("body", "rust compiler")
                .with_field("title", "the book"),
            IndexDocument::new("d1").with_field("title", "rust"),
        ])
        .unwrap();
        let model = RetrievalModel::UnrankedBoolean;

        let engine = SearchEngine::new(&index)
            .with_parser(QueryParser::new().with_default_field("title"));
        assert_eq!(engine.search("rust", &model).unwrap().doc_ids(), vec![1]);
        assert_eq!(engine.search("body.rust", &model).unwrap().doc_ids(), vec![0]);
    }

    #[test]
    fn test_search_wraps_in_default_operator() {
        let index = index();
        let engine = SearchEngine::new(&index);

        let results = engine
            .search("rust search", &RetrievalModel::UnrankedBoolean)
            .unwrap();
        assert_eq!(results.doc_ids(), vec![0, 1, 2]);

        let tree = engine
            .parse("rust search", &RetrievalModel::Bm25(Bm25Params::default()))
            .unwrap();
        assert_eq!(tree.to_string(), "#sum( body.rust body.search )");
    }

    #[test]
    fn test_evaluate_wraps_tree() {
        let index = index();
        let engine = SearchEngine::new(&index);

        let mut tree = QueryTree::new();
        let term = tree.add_term("body", "compiler");
        tree.set_root(term).unwrap();

        let results = engine.evaluate(&tree, &RetrievalModel::RankedBoolean).unwrap();
        assert_eq!(results.doc_ids(), vec![2]);
        assert_eq!(results.get(0).unwrap().score, 1.0);
    }

    #[test]
    fn test_results_are_ranked() {
        let index = index();
        let engine = SearchEngine::new(&index);
        let model = RetrievalModel::Indri(IndriParams::new(100.0, 0.1).unwrap());

        let results = engine.search("search engine ranking", &model).unwrap();
        assert_eq!(results.doc_ids(), vec![1, 0]);
        assert!(results.get(0).unwrap().score > results.get(1).unwrap().score);
    }

    #[test]
    fn test_empty_query() {
        let index = index();
        let engine = SearchEngine::new(&index);
        let results = engine.search("the of", &RetrievalModel::RankedBoolean).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_unsupported_operator() {
        let index = index();
        let engine = SearchEngine::new(&index);
        let err = engine
            .search("#and(rust search)", &RetrievalModel::Bm25(Bm25Params::default()))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unsupported operation: BM25 doesn't support the #AND operator"
        );
        assert!(matches!(err, QuarryError::UnsupportedOperation { .. }));
    }

    #[test]
    fn test_near_field_mismatch_is_query_error() {
        let index = index();
        let engine = SearchEngine::new(&index);
        let err = engine
            .search("#near/2(rust title.search)", &RetrievalModel::RankedBoolean)
            .unwrap_err();
        assert!(matches!(err, QuarryError::Query(_)));
    }
}
