//! Query operators.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The operator held by a query tree node.
///
/// TERM, NEAR and WINDOW are term-level operators: they produce a posting
/// list. The rest combine document scores of their children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// A single term of a field.
    Term {
        /// Field name.
        field: String,
        /// Analyzed term text.
        term: String,
    },
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Sum of matching child scores.
    Sum,
    /// Weighted conjunction.
    Wand,
    /// Weighted sum.
    Wsum,
    /// Turns a term-level child into a scored operand.
    Score,
    /// Ordered proximity: consecutive children at most `k` positions apart.
    Near(u32),
    /// Unordered window: all children within a span narrower than `k`.
    Window(u32),
}

impl Operator {
    /// Create a term operator.
    pub fn term<F: Into<String>, T: Into<String>>(field: F, term: T) -> Self {
        Operator::Term {
            field: field.into(),
            term: term.into(),
        }
    }

    /// Name used in error messages, e.g. `#AND`.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Term { .. } => "TERM",
            Operator::And => "#AND",
            Operator::Or => "#OR",
            Operator::Sum => "#SUM",
            Operator::Wand => "#WAND",
            Operator::Wsum => "#WSUM",
            Operator::Score => "#SCORE",
            Operator::Near(_) => "#NEAR",
            Operator::Window(_) => "#WINDOW",
        }
    }

    /// Check if the operator produces a posting list.
    pub fn is_term_level(&self) -> bool {
        matches!(
            self,
            Operator::Term { .. } | Operator::Near(_) | Operator::Window(_)
        )
    }

    /// Check if the operator carries one weight per child.
    pub fn is_weighted(&self) -> bool {
        matches!(self, Operator::Wand | Operator::Wsum)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Term { field, term } => write!(f, "{field}.{term}"),
            Operator::Near(k) => write!(f, "#near/{k}"),
            Operator::Window(k) => write!(f, "#window/{k}"),
            other => f.write_str(&other.name().to_ascii_lowercase()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_kinds() {
        assert!(Operator::term("body", "apple").is_term_level());
        assert!(Operator::Near(2).is_term_level());
        assert!(!Operator::Score.is_term_level());
        assert!(Operator::Wsum.is_weighted());
        assert!(!Operator::And.is_weighted());
    }

    #[test]
    fn test_display() {
        assert_eq!(Operator::term("title", "rust").to_string(), "title.rust");
        assert_eq!(Operator::Window(8).to_string(), "#window/8");
        assert_eq!(Operator::Wand.to_string(), "#wand");
        assert_eq!(Operator::Wand.name(), "#WAND");
    }
}
