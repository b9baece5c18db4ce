//! Posting lists with positions.
//!
//! A [`PostingList`] is the unit every term-level operator produces: plain
//! terms get theirs from the index, NEAR and WINDOW synthesize one at
//! initialization time. Lists are validated on construction, so a merge never
//! sees a non-monotonic sequence.

use serde::{Deserialize, Serialize};

use crate::error::{QuarryError, Result};
use crate::index::DocId;

/// A single posting in a posting list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Document ID.
    pub doc_id: DocId,
    /// Term frequency in the document.
    pub tf: u32,
    /// Positions of the term in the document, strictly increasing.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting; the term frequency is the number of positions.
    pub fn new(doc_id: DocId, positions: Vec<u32>) -> Self {
        Posting {
            doc_id,
            tf: positions.len() as u32,
            positions,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.tf as usize != self.positions.len() {
            return Err(QuarryError::malformed_posting(format!(
                "document {} has tf {} but {} positions",
                self.doc_id,
                self.tf,
                self.positions.len()
            )));
        }
        if let Some(pair) = self.positions.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(QuarryError::malformed_posting(format!(
                "document {} has non-increasing positions {} and {}",
                self.doc_id, pair[0], pair[1]
            )));
        }
        Ok(())
    }
}

/// A posting list for one field, ordered by document id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    field: String,
    postings: Vec<Posting>,
    ctf: u64,
}

impl PostingList {
    /// Create a new empty posting list.
    pub fn new<S: Into<String>>(field: S) -> Self {
        PostingList {
            field: field.into(),
            postings: Vec::new(),
            ctf: 0,
        }
    }

    /// Build a list from postings, checking every ordering invariant.
    pub fn from_postings<S: Into<String>>(field: S, postings: Vec<Posting>) -> Result<Self> {
        let mut list = PostingList::new(field);
        for posting in postings {
            list.push(posting)?;
        }
        Ok(list)
    }

    /// Append a posting for a document after every document already present.
    pub fn append_posting(&mut self, doc_id: DocId, positions: Vec<u32>) -> Result<()> {
        self.push(Posting::new(doc_id, positions))
    }

    fn push(&mut self, posting: Posting) -> Result<()> {
        posting.validate()?;
        if let Some(last) = self.postings.last()
            && last.doc_id >= posting.doc_id
        {
            return Err(QuarryError::malformed_posting(format!(
                "field {}: document {} follows document {}",
                self.field, posting.doc_id, last.doc_id
            )));
        }
        self.ctf += posting.tf as u64;
        self.postings.push(posting);
        Ok(())
    }

    /// Re-check the invariants of a list that was deserialized or built
    /// outside this module.
    pub fn validate(&self) -> Result<()> {
        PostingList::from_postings(self.field.clone(), self.postings.clone()).and_then(|rebuilt| {
            if rebuilt.ctf != self.ctf {
                Err(QuarryError::malformed_posting(format!(
                    "field {}: recorded ctf {} but postings sum to {}",
                    self.field, self.ctf, rebuilt.ctf
                )))
            } else {
                Ok(())
            }
        })
    }

    /// Field name the postings belong to.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Document frequency (number of postings).
    pub fn df(&self) -> u64 {
        self.postings.len() as u64
    }

    /// Collection term frequency (sum of all tf).
    pub fn ctf(&self) -> u64 {
        self.ctf
    }

    /// Get the length of the posting list.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the posting list is empty.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Get the posting at an index.
    pub fn get(&self, idx: usize) -> Option<&Posting> {
        self.postings.get(idx)
    }

    /// All postings.
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Iterate over the postings.
    pub fn iter(&self) -> std::slice::Iter<'_, Posting> {
        self.postings.iter()
    }
}

/// A document cursor plus a position cursor over one posting list.
///
/// The position cursor always refers to the posting under the document
/// cursor and is reset whenever the document cursor moves.
#[derive(Debug, Clone)]
pub struct PostingCursor<'a> {
    list: &'a PostingList,
    doc: usize,
    loc: usize,
}

impl<'a> PostingCursor<'a> {
    /// Create a cursor at the first posting.
    pub fn new(list: &'a PostingList) -> Self {
        PostingCursor {
            list,
            doc: 0,
            loc: 0,
        }
    }

    /// Current document, `None` once exhausted.
    pub fn doc_id(&self) -> Option<DocId> {
        self.list.get(self.doc).map(|posting| posting.doc_id)
    }

    /// Move to the first posting with a document id greater than `doc_id`.
    pub fn advance_past(&mut self, doc_id: DocId) {
        while self.doc_id().is_some_and(|current| current <= doc_id) {
            self.doc += 1;
        }
        self.loc = 0;
    }

    /// Move to the first posting with a document id of at least `doc_id`.
    pub fn advance_to(&mut self, doc_id: DocId) {
        while self.doc_id().is_some_and(|current| current < doc_id) {
            self.doc += 1;
        }
        self.loc = 0;
    }

    /// Current position within the current document.
    pub fn position(&self) -> Option<u32> {
        self.list
            .get(self.doc)
            .and_then(|posting| posting.positions.get(self.loc).copied())
    }

    /// Move to the next position within the current document.
    pub fn next_position(&mut self) {
        if self.position().is_some() {
            self.loc += 1;
        }
    }

    /// Move to the first position greater than `position`.
    pub fn advance_position_past(&mut self, position: u32) {
        while self.position().is_some_and(|current| current <= position) {
            self.loc += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posting_list_statistics() {
        let list = PostingList::from_postings(
            "body",
            vec![Posting::new(1, vec![0, 4]), Posting::new(3, vec![2])],
        )
        .unwrap();

        assert_eq!(list.field(), "body");
        assert_eq!(list.df(), 2);
        assert_eq!(list.ctf(), 3);
        assert_eq!(list.get(1).map(|p| p.doc_id), Some(3));
        assert!(list.validate().is_ok());
    }

    #[test]
    fn test_rejects_non_increasing_documents() {
        let mut list = PostingList::new("body");
        list.append_posting(5, vec![1]).unwrap();

        let err = list.append_posting(5, vec![2]).unwrap_err();
        assert!(matches!(err, QuarryError::MalformedPosting(_)));

        let err = list.append_posting(2, vec![2]).unwrap_err();
        assert!(matches!(err, QuarryError::MalformedPosting(_)));
    }

    #[test]
    fn test_rejects_bad_positions() {
        let err = PostingList::from_postings("body", vec![Posting::new(0, vec![3, 3])]).unwrap_err();
        assert!(matches!(err, QuarryError::MalformedPosting(_)));

        let inconsistent = Posting {
            doc_id: 0,
            tf: 2,
            positions: vec![1],
        };
        let err = PostingList::from_postings("body", vec![inconsistent]).unwrap_err();
        assert!(matches!(err, QuarryError::MalformedPosting(_)));
    }

    #[test]
    fn test_cursor_documents_and_positions() {
        let list = PostingList::from_postings(
            "body",
            vec![
                Posting::new(2, vec![1, 5, 9]),
                Posting::new(4, vec![0]),
                Posting::new(7, vec![3]),
            ],
        )
        .unwrap();
        let mut cursor = PostingCursor::new(&list);

        assert_eq!(cursor.doc_id(), Some(2));
        assert_eq!(cursor.position(), Some(1));
        cursor.advance_position_past(5);
        assert_eq!(cursor.position(), Some(9));
        cursor.next_position();
        assert_eq!(cursor.position(), None);

        cursor.advance_to(4);
        assert_eq!(cursor.doc_id(), Some(4));
        assert_eq!(cursor.position(), Some(0));

        cursor.advance_past(4);
        assert_eq!(cursor.doc_id(), Some(7));
        cursor.advance_past(7);
        assert_eq!(cursor.doc_id(), None);
        assert_eq!(cursor.position(), None);
    }
}
