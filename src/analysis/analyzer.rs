//! Analyzer trait and the standard analysis pipeline.
//!
//! # Pipeline
//!
//! 1. Unicode word segmentation (UAX #29)
//! 2. Lowercase normalization
//! 3. Stop word removal (English)
//!
//! # Examples
//!
//! ```
//! use quarry::analysis::analyzer::{Analyzer, StandardAnalyzer};
//!
//! let analyzer = StandardAnalyzer::new();
//! let tokens: Vec<_> = analyzer.analyze("The Information and Retrieval").unwrap().collect();
//!
//! assert_eq!(tokens.len(), 2);
//! assert_eq!(tokens[0].text, "information");
//! assert_eq!(tokens[1].text, "retrieval");
//! assert_eq!(tokens[1].position, 1);
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use unicode_segmentation::UnicodeSegmentation;

use crate::analysis::token::{Token, TokenStream};
use crate::error::Result;

/// Default English stop words list.
const DEFAULT_ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Default English stop words as a set.
pub static DEFAULT_ENGLISH_STOP_WORDS_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| DEFAULT_ENGLISH_STOP_WORDS.iter().copied().collect());

/// Trait for text analyzers.
pub trait Analyzer: Send + Sync + std::fmt::Debug {
    /// Analyze the given text and return a stream of tokens.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &'static str;

    /// Analyze the text and collect only the token texts.
    fn terms(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.analyze(text)?.map(|token| token.text).collect())
    }
}

/// The analyzer used for both indexing and query parsing.
#[derive(Debug, Clone)]
pub struct StandardAnalyzer {
    remove_stop_words: bool,
}

impl StandardAnalyzer {
    /// Create a new standard analyzer with stop word removal.
    pub fn new() -> Self {
        StandardAnalyzer {
            remove_stop_words: true,
        }
    }

    /// Create a new standard analyzer that keeps stop words.
    pub fn without_stop_words() -> Self {
        StandardAnalyzer {
            remove_stop_words: false,
        }
    }

    /// Check whether a lowercased word is a stop word for this analyzer.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.remove_stop_words && DEFAULT_ENGLISH_STOP_WORDS_SET.contains(word)
    }
}

impl Default for StandardAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze(&self, text: &str) -> Result<TokenStream> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for word in text.unicode_words() {
            let lowered = word.to_lowercase();
            if self.is_stop_word(&lowered) {
                continue;
            }
            tokens.push(Token::new(lowered, position));
            position += 1;
        }

        Ok(Box::new(tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "standard"
    }
}
