//! Arena-allocated query trees.
//!
//! Nodes are appended to a `Vec` and refer to their children by [`NodeId`].
//! Children are always created before their parent, so a node's id is greater
//! than the ids of everything below it.
//!
//! # Examples
//!
//! ```
//! use quarry::query::operator::Operator;
//! use quarry::query::tree::QueryTree;
//!
//! let mut tree = QueryTree::new();
//! let a = tree.add_term("body", "information");
//! let b = tree.add_term("body", "retrieval");
//! let near = tree.add_node(Operator::Near(1), vec![a, b]).unwrap();
//! let root = tree.add_node(Operator::And, vec![near]).unwrap();
//! tree.set_root(root).unwrap();
//!
//! assert_eq!(tree.to_string(), "#and( #near/1( body.information body.retrieval ) )");
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::query::operator::Operator;

/// Index of a node in a [`QueryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A node of the query tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryNode {
    /// The operator.
    pub operator: Operator,
    /// Ordered children.
    pub children: Vec<NodeId>,
    /// One weight per child for WAND and WSUM, empty otherwise.
    pub weights: Vec<f64>,
}

/// A query as an arena of operator nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTree {
    nodes: Vec<QueryNode>,
    root: Option<NodeId>,
}

impl QueryTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a TERM leaf.
    pub fn add_term<F: Into<String>, T: Into<String>>(&mut self, field: F, term: T) -> NodeId {
        self.push(QueryNode {
            operator: Operator::term(field, term),
            children: Vec::new(),
            weights: Vec::new(),
        })
    }

    /// Add an operator node. Weighted operators get a weight of 1.0 per child.
    pub fn add_node(&mut self, operator: Operator, children: Vec<NodeId>) -> Result<NodeId> {
        let weighted = children.into_iter().map(|child| (1.0, child)).collect();
        self.add_weighted(operator, weighted)
    }

    /// Add an operator node with explicit per-child weights.
    ///
    /// Term-level children of score-combining operators are wrapped in SCORE.
    /// Weights are only kept for WAND and WSUM and must be finite and
    /// non-negative.
    pub fn add_weighted(
        &mut self,
        operator: Operator,
        children: Vec<(f64, NodeId)>,
    ) -> Result<NodeId> {
        if let Operator::Term { .. } = operator {
            return Err(QuarryError::query("use add_term to create TERM nodes"));
        }
        for &(weight, child) in &children {
            if child.0 >= self.nodes.len() {
                return Err(QuarryError::query(format!("unknown node {child}")));
            }
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(QuarryError::query(format!(
                    "{} weight must be finite and non-negative, got {weight}",
                    operator.name()
                )));
            }
        }

        let mut ids = Vec::with_capacity(children.len());
        let mut weights = Vec::with_capacity(children.len());
        for (weight, child) in children {
            let child_term_level = self.nodes[child.0].operator.is_term_level();
            let id = match &operator {
                Operator::Near(_) | Operator::Window(_) | Operator::Score => {
                    if !child_term_level {
                        return Err(QuarryError::query(format!(
                            "{} accepts only term-level arguments",
                            operator.name()
                        )));
                    }
                    child
                }
                _ if child_term_level => self.push(QueryNode {
                    operator: Operator::Score,
                    children: vec![child],
                    weights: Vec::new(),
                }),
                _ => child,
            };
            ids.push(id);
            weights.push(weight);
        }

        match &operator {
            Operator::Score if ids.len() != 1 => {
                return Err(QuarryError::query("#SCORE takes exactly one argument"));
            }
            Operator::Near(_) | Operator::Window(_) if ids.is_empty() => {
                return Err(QuarryError::query(format!(
                    "{} needs at least one argument",
                    operator.name()
                )));
            }
            _ => {}
        }
        if !operator.is_weighted() {
            weights.clear();
        }

        Ok(self.push(QueryNode {
            operator,
            children: ids,
            weights,
        }))
    }

    /// Mark a node as the root of the query.
    pub fn set_root(&mut self, id: NodeId) -> Result<()> {
        if id.0 >= self.nodes.len() {
            return Err(QuarryError::query(format!("unknown node {id}")));
        }
        self.root = Some(id);
        Ok(())
    }

    /// Wrap the current root in a new operator and make that the root.
    pub fn wrap_root(&mut self, operator: Operator) -> Result<NodeId> {
        let root = self
            .root
            .ok_or_else(|| QuarryError::query("cannot wrap an empty query"))?;
        let id = self.add_node(operator, vec![root])?;
        self.root = Some(id);
        Ok(id)
    }

    /// Check the structure that [`QueryTree::add_weighted`] enforces on the
    /// way in. Trees that arrive through serde skip those checks.
    pub fn validate(&self) -> Result<()> {
        if let Some(root) = self.root
            && root.0 >= self.nodes.len()
        {
            return Err(QuarryError::query(format!("unknown root {root}")));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            let id = NodeId(idx);
            let name = node.operator.name();
            // Children precede their parent, which also rules out cycles.
            if let Some(child) = node.children.iter().find(|child| child.0 >= idx) {
                return Err(QuarryError::query(format!("{id} {name} refers to {child}")));
            }
            let term_level = node
                .children
                .iter()
                .map(|child| self.nodes[child.0].operator.is_term_level());
            match &node.operator {
                Operator::Term { .. } if !node.children.is_empty() => {
                    return Err(QuarryError::query(format!("{id} TERM has children")));
                }
                Operator::Term { .. } => {}
                Operator::Score if node.children.len() != 1 => {
                    return Err(QuarryError::query(format!(
                        "{id} #SCORE takes exactly one argument"
                    )));
                }
                Operator::Near(_) | Operator::Window(_) if node.children.is_empty() => {
                    return Err(QuarryError::query(format!("{id} {name} needs an argument")));
                }
                Operator::Near(_) | Operator::Window(_) | Operator::Score => {
                    if !term_level.clone().all(|is_term| is_term) {
                        return Err(QuarryError::query(format!(
                            "{id} {name} accepts only term-level arguments"
                        )));
                    }
                }
                _ => {
                    if term_level.clone().any(|is_term| is_term) {
                        return Err(QuarryError::query(format!(
                            "{id} {name} needs term-level arguments wrapped in #SCORE"
                        )));
                    }
                }
            }
            if node.operator.is_weighted() {
                if node.weights.len() != node.children.len() {
                    return Err(QuarryError::query(format!(
                        "{id} {name} has {} weights for {} arguments",
                        node.weights.len(),
                        node.children.len()
                    )));
                }
                let invalid = node.weights.iter().find(|w| !(w.is_finite() && **w >= 0.0));
                if let Some(weight) = invalid {
                    return Err(QuarryError::query(format!(
                        "{id} {name} weight must be finite and non-negative, got {weight}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The root node, if one was set.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&QueryNode> {
        self.nodes.get(id.0)
    }

    /// Get a node by an id handed out by this tree.
    pub fn node(&self, id: NodeId) -> &QueryNode {
        &self.nodes[id.0]
    }

    /// The operator of a node.
    pub fn operator(&self, id: NodeId) -> &Operator {
        &self.nodes[id.0].operator
    }

    /// The children of a node.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all node ids.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    fn push(&mut self, node: QueryNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.node(id);
        match &node.operator {
            Operator::Term { .. } => write!(f, "{}", node.operator),
            // SCORE is implied by the syntax.
            Operator::Score => self.fmt_node(node.children[0], f),
            operator => {
                write!(f, "{operator}(")?;
                for (i, &child) in node.children.iter().enumerate() {
                    if let Some(weight) = node.weights.get(i) {
                        write!(f, " {weight}")?;
                    }
                    f.write_str(" ")?;
                    self.fmt_node(child, f)?;
                }
                f.write_str(" )")
            }
        }
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.root {
            Some(root) => self.fmt_node(root, f),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_wrapping() {
        let mut tree = QueryTree::new();
        let a = tree.add_term("body", "apple");
        let b = tree.add_term("body", "pie");
        let sum = tree.add_node(Operator::Sum, vec![a, b]).unwrap();

        let children = tree.children(sum);
        assert_eq!(children.len(), 2);
        for &child in children {
            assert_eq!(tree.operator(child), &Operator::Score);
        }
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_structure_errors() {
        let mut tree = QueryTree::new();
        let a = tree.add_term("body", "apple");
        let and = tree.add_node(Operator::And, vec![a]).unwrap();

        assert!(tree.add_node(Operator::Near(2), vec![and]).is_err());
        assert!(tree.add_node(Operator::Window(2), vec![]).is_err());
        assert!(tree.add_node(Operator::Score, vec![and]).is_err());
        assert!(tree.add_node(Operator::term("body", "x"), vec![]).is_err());
        assert!(tree.add_weighted(Operator::Wand, vec![(-1.0, and)]).is_err());
        assert!(tree.add_weighted(Operator::Wand, vec![(f64::INFINITY, and)]).is_err());
        assert!(tree.set_root(NodeId(99)).is_err());
    }

    #[test]
    fn test_weights() {
        let mut tree = QueryTree::new();
        let a = tree.add_term("body", "apple");
        let b = tree.add_term("title", "pie");
        let wand = tree.add_weighted(Operator::Wand, vec![(0.3, a), (0.7, b)]).unwrap();
        assert_eq!(tree.node(wand).weights, vec![0.3, 0.7]);

        let and = tree.add_node(Operator::And, vec![wand]).unwrap();
        assert!(tree.node(and).weights.is_empty());

        tree.set_root(and).unwrap();
        assert_eq!(tree.to_string(), "#and( #wand( 0.3 body.apple 0.7 title.pie ) )");
    }

    #[test]
    fn test_wrap_root() {
        let mut tree = QueryTree::new();
        assert!(tree.wrap_root(Operator::Or).is_err());

        let a = tree.add_term("body", "apple");
        tree.set_root(a).unwrap();
        let root = tree.wrap_root(Operator::Or).unwrap();

        assert_eq!(tree.root(), Some(root));
        assert_eq!(tree.operator(tree.children(root)[0]), &Operator::Score);
        assert_eq!(tree.to_string(), "#or( body.apple )");
    }

    #[test]
    fn test_validate() {
        let mut tree = QueryTree::new();
        let a = tree.add_term("body", "apple");
        let b = tree.add_term("body", "pie");
        let near = tree.add_node(Operator::Near(2), vec![a, b]).unwrap();
        let wand = tree.add_weighted(Operator::Wand, vec![(0.5, near), (0.5, a)]).unwrap();
        tree.set_root(wand).unwrap();
        assert!(tree.validate().is_ok());

        let broken = |edit: fn(&mut QueryTree)| {
            let mut copy = tree.clone();
            edit(&mut copy);
            copy.validate().unwrap_err()
        };
        // Score-combining operator over a bare term.
        broken(|t| t.nodes[5].children[0] = NodeId(2));
        // Forward reference.
        broken(|t| t.nodes[2].children.push(NodeId(4)));
        // Missing weight.
        broken(|t| {
            t.nodes.last_mut().unwrap().weights.pop();
        });
        broken(|t| t.nodes.last_mut().unwrap().weights[0] = f64::NAN);
        broken(|t| t.root = Some(NodeId(99)));
    }
}
