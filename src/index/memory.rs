//! In-memory index store.
//!
//! Documents are analyzed with [`StandardAnalyzer`] and appended in order, so
//! internal ids are assigned 0, 1, 2, ... and every posting list stays sorted
//! by construction. The store is read-only once queries start.
//!
//! # Examples
//!
//! ```
//! use quarry::index::{IndexDocument, IndexStore, MemoryIndex};
//!
//! let mut index = MemoryIndex::new();
//! index
//!     .add_document(IndexDocument::new("d1").with_field("body", "information retrieval"))
//!     .unwrap();
//!
//! assert_eq!(index.num_docs(), 1);
//! assert_eq!(index.postings("body", "retrieval").unwrap().df(), 1);
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::error::{QuarryError, Result};
use crate::index::posting::PostingList;
use crate::index::{DocId, IndexStore, TermVector, TermVectorEntry};

/// A document to be indexed, as read from a JSON-lines file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    /// External document id.
    pub id: String,
    /// Text fields, analyzed and indexed with positions.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Stored attributes, returned verbatim by [`IndexStore::attribute`].
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl IndexDocument {
    /// Create an empty document with an external id.
    pub fn new<S: Into<String>>(id: S) -> Self {
        IndexDocument {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Add a text field.
    pub fn with_field<F: Into<String>, T: Into<String>>(mut self, field: F, text: T) -> Self {
        self.fields.insert(field.into(), text.into());
        self
    }

    /// Add a stored attribute.
    pub fn with_attribute<N: Into<String>, V: Into<String>>(mut self, name: N, value: V) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }
}

/// Per-field inverted index.
#[derive(Debug, Default)]
struct FieldIndex {
    terms: AHashMap<String, PostingList>,
    /// Field length per internal id; 0 for documents without the field.
    lengths: Vec<u64>,
    /// Analyzed tokens per internal id, kept for term vectors.
    tokens: Vec<Vec<String>>,
    sum_lengths: u64,
    doc_count: u64,
}

impl FieldIndex {
    fn pad_to(&mut self, num_docs: usize) {
        self.lengths.resize(num_docs, 0);
        self.tokens.resize(num_docs, Vec::new());
    }
}

/// An index store held entirely in memory.
#[derive(Debug)]
pub struct MemoryIndex {
    analyzer: StandardAnalyzer,
    fields: AHashMap<String, FieldIndex>,
    external_ids: Vec<String>,
    internal_ids: AHashMap<String, DocId>,
    attributes: Vec<BTreeMap<String, String>>,
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIndex {
    /// Create an empty index using the standard analyzer.
    pub fn new() -> Self {
        Self::with_analyzer(StandardAnalyzer::new())
    }

    /// Create an empty index with a specific analyzer configuration.
    pub fn with_analyzer(analyzer: StandardAnalyzer) -> Self {
        MemoryIndex {
            analyzer,
            fields: AHashMap::new(),
            external_ids: Vec::new(),
            internal_ids: AHashMap::new(),
            attributes: Vec::new(),
        }
    }

    /// The analyzer applied to field text. Queries against this index should
    /// be analyzed the same way.
    pub fn analyzer(&self) -> &StandardAnalyzer {
        &self.analyzer
    }

    /// Build an index from a sequence of documents.
    pub fn from_documents<I>(documents: I) -> Result<Self>
    where
        I: IntoIterator<Item = IndexDocument>,
    {
        let mut index = MemoryIndex::new();
        for document in documents {
            index.add_document(document)?;
        }
        Ok(index)
    }

    /// Load an index from a JSON-lines file, one [`IndexDocument`] per line.
    pub fn from_jsonl<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            QuarryError::index(format!("cannot open index file {}: {e}", path.display()))
        })?;
        let index = Self::from_reader(BufReader::new(file))?;
        log::debug!(
            "Loaded {} documents from {}",
            index.num_docs(),
            path.display()
        );
        Ok(index)
    }

    /// Load an index from any JSON-lines reader. Blank lines are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = MemoryIndex::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let document: IndexDocument = serde_json::from_str(&line).map_err(|e| {
                QuarryError::index(format!("invalid document on line {}: {e}", line_num + 1))
            })?;
            index.add_document(document)?;
        }
        Ok(index)
    }

    /// Analyze and append a document, returning its internal id.
    pub fn add_document(&mut self, document: IndexDocument) -> Result<DocId> {
        if self.internal_ids.contains_key(&document.id) {
            return Err(QuarryError::index(format!(
                "duplicate document id {}",
                document.id
            )));
        }
        let doc_id = DocId::try_from(self.external_ids.len())
            .map_err(|_| QuarryError::index("document id space exhausted"))?;
        let num_docs = self.external_ids.len() + 1;

        for (field, text) in &document.fields {
            let tokens: Vec<String> = self.analyzer.terms(text)?;
            let field_index = self.fields.entry(field.clone()).or_default();
            field_index.pad_to(num_docs);

            let mut positions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
            for (position, token) in tokens.iter().enumerate() {
                positions
                    .entry(token.as_str())
                    .or_default()
                    .push(position as u32);
            }
            for (term, term_positions) in positions {
                field_index
                    .terms
                    .entry(term.to_string())
                    .or_insert_with(|| PostingList::new(field.clone()))
                    .append_posting(doc_id, term_positions)?;
            }

            let length = tokens.len() as u64;
            field_index.lengths[doc_id as usize] = length;
            field_index.sum_lengths += length;
            field_index.doc_count += 1;
            field_index.tokens[doc_id as usize] = tokens;
        }

        self.internal_ids.insert(document.id.clone(), doc_id);
        self.external_ids.push(document.id);
        self.attributes.push(document.attributes);
        Ok(doc_id)
    }

    /// Names of all indexed fields, sorted.
    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of distinct terms in a field.
    pub fn num_terms(&self, field: &str) -> usize {
        self.fields.get(field).map_or(0, |f| f.terms.len())
    }

    fn check_doc(&self, doc_id: DocId) -> Result<()> {
        if (doc_id as usize) < self.external_ids.len() {
            Ok(())
        } else {
            Err(QuarryError::index(format!("unknown internal id {doc_id}")))
        }
    }
}

impl IndexStore for MemoryIndex {
    fn num_docs(&self) -> u64 {
        self.external_ids.len() as u64
    }

    fn postings(&self, field: &str, term: &str) -> Result<PostingList> {
        Ok(self
            .fields
            .get(field)
            .and_then(|f| f.terms.get(term))
            .cloned()
            .unwrap_or_else(|| PostingList::new(field)))
    }

    fn field_length(&self, field: &str, doc_id: DocId) -> Result<u64> {
        self.check_doc(doc_id)?;
        Ok(self
            .fields
            .get(field)
            .and_then(|f| f.lengths.get(doc_id as usize).copied())
            .unwrap_or(0))
    }

    fn sum_field_lengths(&self, field: &str) -> Result<u64> {
        Ok(self.fields.get(field).map_or(0, |f| f.sum_lengths))
    }

    fn doc_count_with_field(&self, field: &str) -> Result<u64> {
        Ok(self.fields.get(field).map_or(0, |f| f.doc_count))
    }

    fn total_term_frequency(&self, field: &str, term: &str) -> Result<u64> {
        Ok(self
            .fields
            .get(field)
            .and_then(|f| f.terms.get(term))
            .map_or(0, |list| list.ctf()))
    }

    fn internal_id(&self, external_id: &str) -> Result<DocId> {
        self.internal_ids
            .get(external_id)
            .copied()
            .ok_or_else(|| QuarryError::not_found(format!("external id {external_id}")))
    }

    fn external_id(&self, doc_id: DocId) -> Result<String> {
        self.check_doc(doc_id)?;
        Ok(self.external_ids[doc_id as usize].clone())
    }

    fn attribute(&self, name: &str, doc_id: DocId) -> Result<Option<String>> {
        self.check_doc(doc_id)?;
        Ok(self.attributes[doc_id as usize].get(name).cloned())
    }

    fn term_vector(&self, field: &str, doc_id: DocId) -> Result<Option<TermVector>> {
        self.check_doc(doc_id)?;
        let Some(field_index) = self.fields.get(field) else {
            return Ok(None);
        };
        let Some(tokens) = field_index.tokens.get(doc_id as usize) else {
            return Ok(None);
        };
        if tokens.is_empty() {
            return Ok(None);
        }

        let mut counts: BTreeMap<&str, u32> = BTreeMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }
        let entries = counts
            .into_iter()
            .map(|(term, tf)| TermVectorEntry {
                term: term.to_string(),
                tf,
                ctf: field_index.terms.get(term).map_or(0, |list| list.ctf()),
            })
            .collect();

        Ok(Some(TermVector {
            field: field.to_string(),
            length: tokens.len() as u64,
            entries,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn sample_index() -> MemoryIndex {
        MemoryIndex::from_documents(vec![
            IndexDocument::new("a")
                .with_field("body", "apple pie and apple tart")
                .with_field("title", "Apple")
                .with_attribute("url", "http://a.example"),
            IndexDocument::new("b").with_field("body", "banana bread"),
            IndexDocument::new("c").with_field("body", "apple crumble"),
        ])
        .unwrap()
    }

    #[test]
    fn test_postings_and_statistics() {
        let index = sample_index();

        assert_eq!(index.num_docs(), 3);
        let apple = index.postings("body", "apple").unwrap();
        assert_eq!(apple.df(), 2);
        assert_eq!(apple.ctf(), 3);
        assert_eq!(apple.get(0).unwrap().positions, vec![0, 2]);
        assert_eq!(apple.get(1).unwrap().doc_id, 2);

        assert_eq!(index.field_length("body", 0).unwrap(), 4);
        assert_eq!(index.sum_field_lengths("body").unwrap(), 8);
        assert_eq!(index.doc_count_with_field("body").unwrap(), 3);
        assert_eq!(index.doc_count_with_field("title").unwrap(), 1);
        assert_eq!(index.field_length("title", 1).unwrap(), 0);
        assert_eq!(index.total_term_frequency("body", "apple").unwrap(), 3);
        assert_eq!(index.average_field_length("body").unwrap(), 8.0 / 3.0);
    }

    #[test]
    fn test_unknown_term_is_empty() {
        let index = sample_index();
        assert!(index.postings("body", "cherry").unwrap().is_empty());
        assert!(index.postings("nofield", "apple").unwrap().is_empty());
        assert_eq!(index.total_term_frequency("body", "cherry").unwrap(), 0);
    }

    #[test]
    fn test_id_translation_and_attributes() {
        let index = sample_index();

        assert_eq!(index.internal_id("c").unwrap(), 2);
        assert_eq!(index.external_id(1).unwrap(), "b");
        assert!(index.internal_id("zzz").is_err());
        assert!(index.external_id(9).is_err());
        assert_eq!(
            index.attribute("url", 0).unwrap().as_deref(),
            Some("http://a.example")
        );
        assert_eq!(index.attribute("url", 1).unwrap(), None);
    }

    #[test]
    fn test_duplicate_external_id() {
        let mut index = sample_index();
        let err = index.add_document(IndexDocument::new("a")).unwrap_err();
        assert!(matches!(err, QuarryError::Index(_)));
    }

    #[test]
    fn test_term_vector() {
        let index = sample_index();
        let tv = index.term_vector("body", 0).unwrap().unwrap();

        assert_eq!(tv.length, 4);
        assert_eq!(tv.len(), 3);
        let apple = tv.get("apple").unwrap();
        assert_eq!(apple.tf, 2);
        assert_eq!(apple.ctf, 3);
        assert!(index.term_vector("title", 1).unwrap().is_none());
    }

    #[test]
    fn test_from_reader() {
        let data = r#"{"id": "x", "fields": {"body": "hello world"}}

{"id": "y", "fields": {"body": "world peace"}, "attributes": {"lang": "en"}}
"#;
        let index = MemoryIndex::from_reader(Cursor::new(data)).unwrap();

        assert_eq!(index.num_docs(), 2);
        assert_eq!(index.postings("body", "world").unwrap().df(), 2);
        assert_eq!(index.attribute("lang", 1).unwrap().as_deref(), Some("en"));
        assert_eq!(index.field_names(), vec!["body".to_string()]);
        assert_eq!(index.num_terms("body"), 3);
    }

    #[test]
    fn test_from_reader_reports_bad_line() {
        let err = MemoryIndex::from_reader(Cursor::new("{not json}\n")).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
