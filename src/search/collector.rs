//! Ranked result lists.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::index::DocId;

/// A document with its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    /// Internal document id.
    pub doc_id: DocId,
    /// Score under the active retrieval model.
    pub score: f64,
}

impl ScoredDoc {
    /// Ranking order: score descending, then document id ascending.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

/// Scores collected for one query.
///
/// Entries are appended in document order while the query runs and sorted
/// once at the end with [`ScoreList::sort`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreList {
    entries: Vec<ScoredDoc>,
}

impl ScoreList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document.
    pub fn add(&mut self, doc_id: DocId, score: f64) {
        self.entries.push(ScoredDoc { doc_id, score });
    }

    /// Sort by score descending, breaking ties by ascending document id.
    pub fn sort(&mut self) {
        self.entries.sort_by(ScoredDoc::ranking_cmp);
    }

    /// Keep only the first `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get the entry at a rank.
    pub fn get(&self, idx: usize) -> Option<&ScoredDoc> {
        self.entries.get(idx)
    }

    /// Iterate over the entries in their current order.
    pub fn iter(&self) -> std::slice::Iter<'_, ScoredDoc> {
        self.entries.iter()
    }

    /// Document ids in their current order.
    pub fn doc_ids(&self) -> Vec<DocId> {
        self.entries.iter().map(|entry| entry.doc_id).collect()
    }
}

impl<'a> IntoIterator for &'a ScoreList {
    type Item = &'a ScoredDoc;
    type IntoIter = std::slice::Iter<'a, ScoredDoc>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(DocId, f64)> for ScoreList {
    fn from_iter<I: IntoIterator<Item = (DocId, f64)>>(iter: I) -> Self {
        ScoreList {
            entries: iter
                .into_iter()
                .map(|(doc_id, score)| ScoredDoc { doc_id, score })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_score() {
        let mut list: ScoreList = [(1, 0.2), (2, 0.9), (3, 0.5)].into_iter().collect();
        list.sort();
        assert_eq!(list.doc_ids(), vec![2, 3, 1]);
        assert_eq!(list.get(0).map(|e| e.score), Some(0.9));
    }

    #[test]
    fn test_ties_by_ascending_doc_id() {
        let mut list = ScoreList::new();
        list.add(7, 0.5);
        list.add(3, 0.5);
        list.add(5, 1.0);
        list.add(1, 0.5);
        list.sort();
        assert_eq!(list.doc_ids(), vec![5, 1, 3, 7]);
    }

    #[test]
    fn test_sort_is_idempotent() {
        let mut list: ScoreList = [(4, 0.1), (2, 0.3), (9, 0.3)].into_iter().collect();
        list.sort();
        let once = list.clone();
        list.sort();
        assert_eq!(list, once);
    }

    #[test]
    fn test_truncate() {
        let mut list: ScoreList = [(0, 3.0), (1, 2.0), (2, 1.0)].into_iter().collect();
        list.sort();
        list.truncate(2);
        assert_eq!(list.len(), 2);
        assert_eq!(list.iter().map(|e| e.doc_id).collect::<Vec<_>>(), vec![0, 1]);
        assert!(!list.is_empty());
        assert!(ScoreList::new().is_empty());
    }
}
