//! Error types for the Quarry library.
//!
//! Every fallible operation returns [`Result`], whose error type is
//! [`QuarryError`]. Errors are fatal for the query being evaluated but never
//! for the process: the batch driver reports them and moves on to the next
//! query.
//!
//! # Examples
//!
//! ```
//! use quarry::error::{QuarryError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(QuarryError::query("unbalanced parentheses"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Quarry operations.
#[derive(Error, Debug)]
pub enum QuarryError {
    /// I/O errors (index files, query files, run files).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The iterator protocol was used out of order, e.g. a match was read
    /// before `has_match` succeeded.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// The operator is not defined for the active retrieval model.
    #[error("Unsupported operation: {model} doesn't support the {operator} operator")]
    UnsupportedOperation {
        /// Name of the retrieval model.
        model: String,
        /// Name of the operator.
        operator: String,
    },

    /// A posting list violated its ordering invariants.
    #[error("Malformed posting: {0}")]
    MalformedPosting(String),

    /// Query-related errors (parsing, invalid query trees).
    #[error("Query error: {0}")]
    Query(String),

    /// Index store errors.
    #[error("Index error: {0}")]
    Index(String),

    /// Configuration errors (parameter files, invalid model parameters).
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Generic anyhow error
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with QuarryError.
pub type Result<T> = std::result::Result<T, QuarryError>;

impl QuarryError {
    /// Create a new illegal state error.
    pub fn illegal_state<S: Into<String>>(msg: S) -> Self {
        QuarryError::IllegalState(msg.into())
    }

    /// Create a new unsupported operation error.
    pub fn unsupported<M: Into<String>, O: Into<String>>(model: M, operator: O) -> Self {
        QuarryError::UnsupportedOperation {
            model: model.into(),
            operator: operator.into(),
        }
    }

    /// Create a new malformed posting error.
    pub fn malformed_posting<S: Into<String>>(msg: S) -> Self {
        QuarryError::MalformedPosting(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        QuarryError::Query(msg.into())
    }

    /// Create a new parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        QuarryError::Query(msg.into()) // Parse errors are treated as query errors
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        QuarryError::Index(msg.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        QuarryError::Config(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        QuarryError::Other(msg.into())
    }

    /// Create a new not found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        QuarryError::Other(format!("Not found: {}", msg.into()))
    }
}
