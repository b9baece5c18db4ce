//! Document iteration over a query tree.
//!
//! An [`Evaluation`] holds the mutable state of one query run: a
//! [`MatchState`] per tree node plus the materialised posting list of every
//! term-level node. Compound nodes find their current document by combining
//! their children's states according to a [`MatchPolicy`].
//!
//! The protocol is the same for every node:
//!
//! 1. [`Evaluation::has_match`] computes and caches the current document.
//! 2. [`Evaluation::get_match`] reads the cached document.
//! 3. [`Evaluation::advance_past`] moves past a document and clears the cache.

use std::fmt;

use crate::error::{QuarryError, Result};
use crate::index::posting::{Posting, PostingList};
use crate::index::{DocId, IndexStore};
use crate::model::RetrievalModel;
use crate::query::operator::Operator;
use crate::query::proximity;
use crate::query::scorer;
use crate::query::tree::{NodeId, QueryTree};

/// Iteration state of one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchState {
    /// Not computed since the last advance.
    #[default]
    Unset,
    /// The node currently matches this document.
    Match(DocId),
    /// The node has no further matches.
    Exhausted,
}

impl MatchState {
    /// The matched document, if any.
    pub fn doc_id(self) -> Option<DocId> {
        match self {
            MatchState::Match(doc_id) => Some(doc_id),
            _ => None,
        }
    }
}

/// How a compound node derives its match from its children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Every child matches the same document.
    All,
    /// Smallest document matched by any child.
    Min,
    /// The match of the only child.
    First,
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchPolicy::All => write!(f, "ALL"),
            MatchPolicy::Min => write!(f, "MIN"),
            MatchPolicy::First => write!(f, "FIRST"),
        }
    }
}

/// Match policy of a compound operator under a model.
///
/// Returns `None` for term-level operators, which iterate their own posting
/// list instead.
pub fn match_policy(operator: &Operator, model: &RetrievalModel) -> Option<MatchPolicy> {
    match operator {
        Operator::Term { .. } | Operator::Near(_) | Operator::Window(_) => None,
        Operator::Score => Some(MatchPolicy::First),
        Operator::Or | Operator::Sum => Some(MatchPolicy::Min),
        Operator::And | Operator::Wand | Operator::Wsum => {
            if model.tolerates_missing_terms() {
                Some(MatchPolicy::Min)
            } else {
                Some(MatchPolicy::All)
            }
        }
    }
}

#[derive(Debug, Default)]
struct NodeState {
    state: MatchState,
    postings: Option<PostingList>,
    cursor: usize,
}

/// Iteration state of one query tree under one model.
///
/// Each query gets its own evaluation; nothing in it is shared across
/// queries.
#[derive(Debug)]
pub struct Evaluation<'a> {
    tree: &'a QueryTree,
    model: &'a RetrievalModel,
    index: &'a dyn IndexStore,
    nodes: Vec<NodeState>,
}

impl<'a> Evaluation<'a> {
    /// Validate the tree against the model and materialise every term-level
    /// posting list.
    pub fn initialize(
        tree: &'a QueryTree,
        model: &'a RetrievalModel,
        index: &'a dyn IndexStore,
    ) -> Result<Self> {
        tree.validate()?;
        let root = tree
            .root()
            .ok_or_else(|| QuarryError::query("query tree has no root"))?;
        scorer::validate(tree, root, model)?;

        let mut evaluation = Evaluation {
            tree,
            model,
            index,
            nodes: (0..tree.len()).map(|_| NodeState::default()).collect(),
        };
        evaluation.materialize(root)?;
        Ok(evaluation)
    }

    fn materialize(&mut self, id: NodeId) -> Result<()> {
        let tree = self.tree;
        for &child in tree.children(id) {
            self.materialize(child)?;
        }

        let list = match tree.operator(id) {
            Operator::Term { field, term } => {
                let list = self.index.postings(field, term)?;
                list.validate()?;
                list
            }
            Operator::Near(k) => proximity::near(*k, &self.child_lists(id)?)?,
            Operator::Window(k) => proximity::window(*k, &self.child_lists(id)?)?,
            _ => return Ok(()),
        };
        log::trace!(
            "{id} {} materialised: df={} ctf={}",
            tree.operator(id),
            list.df(),
            list.ctf()
        );
        self.nodes[id.index()].postings = Some(list);
        Ok(())
    }

    fn child_lists(&self, id: NodeId) -> Result<Vec<&PostingList>> {
        self.tree
            .children(id)
            .iter()
            .map(|&child| self.postings(child))
            .collect()
    }

    /// The query tree being evaluated.
    pub fn tree(&self) -> &'a QueryTree {
        self.tree
    }

    /// The active retrieval model.
    pub fn model(&self) -> &'a RetrievalModel {
        self.model
    }

    /// The index the query runs against.
    pub fn index(&self) -> &'a dyn IndexStore {
        self.index
    }

    /// Cached state of a node.
    pub fn state(&self, id: NodeId) -> MatchState {
        self.nodes[id.index()].state
    }

    /// Materialised posting list of a term-level node.
    pub fn postings(&self, id: NodeId) -> Result<&PostingList> {
        self.nodes[id.index()].postings.as_ref().ok_or_else(|| {
            QuarryError::illegal_state(format!(
                "{id} ({}) has no posting list",
                self.tree.operator(id).name()
            ))
        })
    }

    /// Posting under the document cursor of a term-level node.
    pub fn current_posting(&self, id: NodeId) -> Result<Option<&Posting>> {
        let node = &self.nodes[id.index()];
        Ok(self.postings(id)?.get(node.cursor))
    }

    /// Whether the child currently matches `doc_id`, judged by its cached
    /// state only.
    pub fn matches_doc(&self, id: NodeId, doc_id: DocId) -> bool {
        self.state(id) == MatchState::Match(doc_id)
    }

    /// Compute whether the node points at a document, caching the answer.
    pub fn has_match(&mut self, id: NodeId) -> Result<bool> {
        match self.nodes[id.index()].state {
            MatchState::Match(_) => return Ok(true),
            MatchState::Exhausted => return Ok(false),
            MatchState::Unset => {}
        }

        let state = match match_policy(self.tree.operator(id), self.model) {
            None => self
                .current_posting(id)?
                .map_or(MatchState::Exhausted, |posting| {
                    MatchState::Match(posting.doc_id)
                }),
            Some(MatchPolicy::First) => self.has_match_first(id)?,
            Some(MatchPolicy::Min) => self.has_match_min(id)?,
            Some(MatchPolicy::All) => self.has_match_all(id)?,
        };
        self.nodes[id.index()].state = state;
        Ok(state != MatchState::Exhausted)
    }

    fn has_match_first(&mut self, id: NodeId) -> Result<MatchState> {
        let Some(&child) = self.tree.children(id).first() else {
            return Ok(MatchState::Exhausted);
        };
        self.has_match(child)?;
        Ok(self.state(child))
    }

    fn has_match_min(&mut self, id: NodeId) -> Result<MatchState> {
        let tree = self.tree;
        let mut min: Option<DocId> = None;
        for &child in tree.children(id) {
            if self.has_match(child)? {
                let doc_id = self.get_match(child)?;
                min = Some(min.map_or(doc_id, |current| current.min(doc_id)));
            }
        }
        Ok(min.map_or(MatchState::Exhausted, MatchState::Match))
    }

    fn has_match_all(&mut self, id: NodeId) -> Result<MatchState> {
        let tree = self.tree;
        let Some((&first, rest)) = tree.children(id).split_first() else {
            return Ok(MatchState::Exhausted);
        };

        'search: loop {
            if !self.has_match(first)? {
                return Ok(MatchState::Exhausted);
            }
            let candidate = self.get_match(first)?;
            for &child in rest {
                self.advance_to(child, candidate)?;
                if !self.has_match(child)? {
                    return Ok(MatchState::Exhausted);
                }
                let doc_id = self.get_match(child)?;
                if doc_id != candidate {
                    self.advance_to(first, doc_id)?;
                    continue 'search;
                }
            }
            return Ok(MatchState::Match(candidate));
        }
    }

    /// The cached match of a node.
    ///
    /// Fails with `IllegalState` unless the last `has_match` call on the
    /// node succeeded.
    pub fn get_match(&self, id: NodeId) -> Result<DocId> {
        self.state(id).doc_id().ok_or_else(|| {
            QuarryError::illegal_state(format!(
                "get_match on {id} ({}) without a successful has_match",
                self.tree.operator(id).name()
            ))
        })
    }

    /// Move the node and its children past `doc_id` and clear the cache.
    pub fn advance_past(&mut self, id: NodeId, doc_id: DocId) -> Result<()> {
        self.advance(id, doc_id, true)
    }

    /// Move the node and its children to the first document at or after
    /// `doc_id` and clear the cache.
    pub fn advance_to(&mut self, id: NodeId, doc_id: DocId) -> Result<()> {
        self.advance(id, doc_id, false)
    }

    fn advance(&mut self, id: NodeId, doc_id: DocId, past: bool) -> Result<()> {
        let behind = |current: DocId| {
            if past {
                current <= doc_id
            } else {
                current < doc_id
            }
        };
        match self.nodes[id.index()].state {
            MatchState::Exhausted => return Ok(()),
            MatchState::Match(current) if !behind(current) => return Ok(()),
            _ => {}
        }

        if self.tree.operator(id).is_term_level() {
            let node = &mut self.nodes[id.index()];
            if let Some(list) = &node.postings {
                while list.get(node.cursor).is_some_and(|p| behind(p.doc_id)) {
                    node.cursor += 1;
                }
            }
        } else {
            let tree = self.tree;
            for &child in tree.children(id) {
                self.advance(child, doc_id, past)?;
            }
        }
        self.nodes[id.index()].state = MatchState::Unset;
        Ok(())
    }

    /// Score of the node for its current match.
    pub fn score(&self, id: NodeId) -> Result<f64> {
        scorer::score(self, id)
    }
}
