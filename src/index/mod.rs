//! Index store abstraction consumed by the query engine.
//!
//! The engine never builds or mutates an index; it only reads postings and
//! collection statistics through [`IndexStore`]. [`memory::MemoryIndex`] is
//! the bundled implementation.

pub mod memory;
pub mod posting;

pub use self::memory::{IndexDocument, MemoryIndex};
pub use self::posting::{Posting, PostingCursor, PostingList};

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};

/// Internal document identifier. Internal ids are dense and start at 0.
pub type DocId = u32;

/// Read-only access to postings, statistics and document metadata.
///
/// Implementations must return posting lists ordered by strictly increasing
/// document id; every merge in the engine depends on it.
pub trait IndexStore: Send + Sync + std::fmt::Debug {
    /// Number of documents in the index.
    fn num_docs(&self) -> u64;

    /// Posting list for a term in a field. Unknown terms yield an empty list.
    fn postings(&self, field: &str, term: &str) -> Result<PostingList>;

    /// Length (token count) of a field in one document; 0 when absent.
    fn field_length(&self, field: &str, doc_id: DocId) -> Result<u64>;

    /// Sum of the field lengths over all documents.
    fn sum_field_lengths(&self, field: &str) -> Result<u64>;

    /// Number of documents that have the field.
    fn doc_count_with_field(&self, field: &str) -> Result<u64>;

    /// Number of occurrences of the term in the field across the collection.
    fn total_term_frequency(&self, field: &str, term: &str) -> Result<u64>;

    /// Translate an external document id to the internal id.
    fn internal_id(&self, external_id: &str) -> Result<DocId>;

    /// Translate an internal document id to the external id.
    fn external_id(&self, doc_id: DocId) -> Result<String>;

    /// Look up a stored attribute of a document.
    fn attribute(&self, name: &str, doc_id: DocId) -> Result<Option<String>>;

    /// Term vector of a field in one document, if the store keeps them.
    fn term_vector(&self, field: &str, doc_id: DocId) -> Result<Option<TermVector>> {
        let _ = (field, doc_id);
        Err(QuarryError::index("term vectors are not supported by this index"))
    }

    /// Average field length over the documents that have the field.
    fn average_field_length(&self, field: &str) -> Result<f64> {
        let doc_count = self.doc_count_with_field(field)?;
        if doc_count == 0 {
            return Ok(0.0);
        }
        Ok(self.sum_field_lengths(field)? as f64 / doc_count as f64)
    }
}

/// One entry of a [`TermVector`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermVectorEntry {
    /// The term.
    pub term: String,
    /// Occurrences of the term in the document field.
    pub tf: u32,
    /// Occurrences of the term in the field across the collection.
    pub ctf: u64,
}

/// The distinct terms of one document field with their statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermVector {
    /// Field name.
    pub field: String,
    /// Number of tokens in the document field.
    pub length: u64,
    /// Distinct terms, sorted by term.
    pub entries: Vec<TermVectorEntry>,
}

impl TermVector {
    /// Find the entry of a term.
    pub fn get(&self, term: &str) -> Option<&TermVectorEntry> {
        self.entries
            .binary_search_by(|entry| entry.term.as_str().cmp(term))
            .ok()
            .map(|idx| &self.entries[idx])
    }

    /// Check whether the document field contains the term.
    pub fn contains(&self, term: &str) -> bool {
        self.get(term).is_some()
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the term vector is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term_vector() -> TermVector {
        TermVector {
            field: "body".to_string(),
            length: 5,
            entries: vec![
                TermVectorEntry {
                    term: "apple".to_string(),
                    tf: 2,
                    ctf: 7,
                },
                TermVectorEntry {
                    term: "pie".to_string(),
                    tf: 3,
                    ctf: 3,
                },
            ],
        }
    }

    #[test]
    fn test_term_vector_lookup() {
        let tv = term_vector();
        assert_eq!(tv.len(), 2);
        assert_eq!(tv.get("pie").map(|e| e.tf), Some(3));
        assert!(tv.contains("apple"));
        assert!(!tv.contains("banana"));
    }
}
