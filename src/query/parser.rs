//! Parser for the structured query syntax.
//!
//! Supported syntax:
//! - Terms: `apple`, field-qualified terms: `title.apple`
//! - Operators: `#and( ... )`, `#or( ... )`, `#sum( ... )`
//! - Weighted operators: `#wand( 0.7 apple 0.3 pie )`, `#wsum( ... )`
//! - Proximity: `#near/3( ... )`, `#window/8( ... )`
//!
//! Operator names are case-insensitive and whitespace is free-form. Terms go
//! through the same analyzer as the index: a term that is a stop word is
//! dropped, a word that splits into several tokens becomes `#near/1` over
//! them, and an operator left without arguments is dropped.
//!
//! # Examples
//!
//! ```
//! use quarry::query::operator::Operator;
//! use quarry::query::parser::QueryParser;
//!
//! let parser = QueryParser::new();
//! let tree = parser.parse("#NEAR/2(information retrieval) the", Operator::And).unwrap();
//!
//! assert_eq!(tree.to_string(), "#and( #near/2( body.information body.retrieval ) )");
//! ```

use std::sync::LazyLock;

use regex::Regex;

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::error::{QuarryError, Result};
use crate::query::operator::Operator;
use crate::query::tree::{NodeId, QueryTree};

/// Fields that may prefix a term as `field.term`.
pub const KNOWN_FIELDS: &[&str] = &["body", "title", "url", "keywords", "inlink"];

static OPERATOR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#([A-Za-z]+)(?:/(\d+))?$").unwrap_or_else(|e| panic!("invalid pattern: {e}"))
});

/// Parses query strings into [`QueryTree`]s.
#[derive(Debug, Clone)]
pub struct QueryParser {
    default_field: String,
    analyzer: StandardAnalyzer,
}

impl Default for QueryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryParser {
    /// Create a parser with `body` as the default field.
    pub fn new() -> Self {
        QueryParser {
            default_field: "body".to_string(),
            analyzer: StandardAnalyzer::new(),
        }
    }

    /// Set the field used for terms without a field prefix.
    pub fn with_default_field<S: Into<String>>(mut self, field: S) -> Self {
        self.default_field = field.into();
        self
    }

    /// Use a specific analyzer for query terms.
    pub fn with_analyzer(mut self, analyzer: StandardAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// Get the default field.
    pub fn default_field(&self) -> &str {
        &self.default_field
    }

    /// Parse a query string.
    ///
    /// Top-level expressions become the arguments of `top_level`, unless the
    /// query is a single expression that already uses that operator. A query
    /// with nothing left after analysis yields a tree without a root.
    pub fn parse(&self, query: &str, top_level: Operator) -> Result<QueryTree> {
        let lexemes = lex(query);
        let mut parser = QueryStringParser {
            config: self,
            lexemes,
            pos: 0,
            tree: QueryTree::new(),
        };

        let mut items = Vec::new();
        while parser.peek().is_some() {
            if let Some(id) = parser.parse_expression()? {
                items.push(id);
            }
        }

        let mut tree = parser.tree;
        let root = match items.len() {
            0 => None,
            1 if tree.operator(items[0]) == &top_level => Some(items[0]),
            _ => Some(tree.add_node(top_level, items)?),
        };
        if let Some(root) = root {
            tree.set_root(root)?;
        }
        Ok(tree)
    }

    fn split_field<'w>(&self, word: &'w str) -> (String, &'w str) {
        if let Some((prefix, rest)) = word.split_once('.') {
            let prefix = prefix.to_ascii_lowercase();
            if KNOWN_FIELDS.contains(&prefix.as_str()) {
                return (prefix, rest);
            }
        }
        (self.default_field.clone(), word)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lexeme<'a> {
    Open,
    Close,
    Word(&'a str),
}

fn lex(query: &str) -> Vec<Lexeme<'_>> {
    let mut lexemes = Vec::new();
    let mut start: Option<usize> = None;
    for (idx, ch) in query.char_indices() {
        if ch.is_whitespace() || ch == '(' || ch == ')' {
            if let Some(s) = start.take() {
                lexemes.push(Lexeme::Word(&query[s..idx]));
            }
            match ch {
                '(' => lexemes.push(Lexeme::Open),
                ')' => lexemes.push(Lexeme::Close),
                _ => {}
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        lexemes.push(Lexeme::Word(&query[s..]));
    }
    lexemes
}

struct QueryStringParser<'a> {
    config: &'a QueryParser,
    lexemes: Vec<Lexeme<'a>>,
    pos: usize,
    tree: QueryTree,
}

impl<'a> QueryStringParser<'a> {
    fn peek(&self) -> Option<Lexeme<'a>> {
        self.lexemes.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Lexeme<'a>> {
        let lexeme = self.peek();
        self.pos += 1;
        lexeme
    }

    /// Parse one operator or term. `None` means it was dropped.
    fn parse_expression(&mut self) -> Result<Option<NodeId>> {
        match self.next() {
            Some(Lexeme::Word(word)) if word.starts_with('#') => self.parse_operator(word),
            Some(Lexeme::Word(word)) => self.parse_term(word),
            Some(Lexeme::Open) => Err(QuarryError::parse("unexpected '(' without an operator")),
            Some(Lexeme::Close) => Err(QuarryError::parse("unexpected ')'")),
            None => Err(QuarryError::parse("unexpected end of query")),
        }
    }

    fn parse_operator(&mut self, word: &str) -> Result<Option<NodeId>> {
        let operator = parse_operator_name(word)?;
        if self.next() != Some(Lexeme::Open) {
            return Err(QuarryError::parse(format!("missing '(' after {word}")));
        }

        let mut args = Vec::new();
        loop {
            match self.peek() {
                Some(Lexeme::Close) => {
                    self.pos += 1;
                    break;
                }
                None => return Err(QuarryError::parse(format!("missing ')' for {word}"))),
                Some(_) => {}
            }
            let weight = if operator.is_weighted() {
                self.parse_weight(word)?
            } else {
                1.0
            };
            if let Some(id) = self.parse_expression()? {
                args.push((weight, id));
            }
        }

        if args.is_empty() {
            log::debug!("dropping {word} with no arguments");
            return Ok(None);
        }
        self.tree.add_weighted(operator, args).map(Some)
    }

    fn parse_weight(&mut self, operator: &str) -> Result<f64> {
        let Some(Lexeme::Word(token)) = self.next() else {
            return Err(QuarryError::parse(format!("{operator} expects a weight")));
        };
        let weight: f64 = token.parse().map_err(|_| {
            QuarryError::parse(format!("{operator} expects a weight, found '{token}'"))
        })?;
        if !(weight.is_finite() && weight >= 0.0) {
            return Err(QuarryError::parse(format!(
                "{operator} weight must be finite and non-negative, found {token}"
            )));
        }
        Ok(weight)
    }

    fn parse_term(&mut self, word: &str) -> Result<Option<NodeId>> {
        let (field, text) = self.config.split_field(word);
        let terms = self.config.analyzer.terms(text)?;
        match terms.len() {
            0 => Ok(None),
            1 => Ok(Some(self.tree.add_term(field, terms[0].as_str()))),
            _ => {
                let ids = terms
                    .into_iter()
                    .map(|term| self.tree.add_term(field.as_str(), term))
                    .collect();
                self.tree.add_node(Operator::Near(1), ids).map(Some)
            }
        }
    }
}

fn parse_operator_name(word: &str) -> Result<Operator> {
    let captures = OPERATOR_PATTERN
        .captures(word)
        .ok_or_else(|| QuarryError::parse(format!("malformed operator {word}")))?;
    let name = captures
        .get(1)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let distance = captures
        .get(2)
        .map(|m| {
            m.as_str()
                .parse::<u32>()
                .map_err(|_| QuarryError::parse(format!("invalid distance in {word}")))
        })
        .transpose()?;

    let operator = match (name.as_str(), distance) {
        ("and", None) => Operator::And,
        ("or", None) => Operator::Or,
        ("sum", None) => Operator::Sum,
        ("wand", None) => Operator::Wand,
        ("wsum", None) => Operator::Wsum,
        ("near", Some(k)) => Operator::Near(k),
        ("window", Some(k)) => Operator::Window(k),
        ("near" | "window", None) => {
            return Err(QuarryError::parse(format!("{word} needs a distance, e.g. {word}/3")));
        }
        ("and" | "or" | "sum" | "wand" | "wsum", Some(_)) => {
            return Err(QuarryError::parse(format!("{word} does not take a distance")));
        }
        _ => return Err(QuarryError::parse(format!("unknown operator {word}"))),
    };
    Ok(operator)
}
