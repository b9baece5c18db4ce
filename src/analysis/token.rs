//! Token types for text analysis.
//!
//! # Examples
//!
//! ```
//! use quarry::analysis::token::Token;
//!
//! let token = Token::new("hello", 0);
//! assert_eq!(token.text, "hello");
//! assert_eq!(token.position, 0);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A token represents a single unit of text after analysis.
///
/// `position` counts retained tokens only: stop words removed by the
/// analyzer do not occupy a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The token text.
    pub text: String,
    /// Position in the token stream (0-based).
    pub position: u32,
}

impl Token {
    /// Create a new token.
    pub fn new<S: Into<String>>(text: S, position: u32) -> Self {
        Token {
            text: text.into(),
            position,
        }
    }

    /// Check if the token text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.text, self.position)
    }
}

/// A stream of analyzed tokens.
pub type TokenStream = Box<dyn Iterator<Item = Token> + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new("retrieval", 3);
        assert_eq!(token.text, "retrieval");
        assert_eq!(token.position, 3);
        assert!(!token.is_empty());
        assert_eq!(token.to_string(), "retrieval@3");
    }
}
