//! Positional merges for NEAR and WINDOW.
//!
//! Both operators first walk their children's posting lists in lock-step to
//! find documents that every child contains, then merge positions inside each
//! such document. The result is a new [`PostingList`] whose term frequency
//! per document is the number of emitted positions.

use crate::error::{QuarryError, Result};
use crate::index::posting::{PostingCursor, PostingList};

/// Ordered proximity: one position per child, in child order, each strictly
/// after the previous one and at most `k` positions away from it.
///
/// The emitted position is the one matched by the last child.
pub fn near(k: u32, lists: &[&PostingList]) -> Result<PostingList> {
    merge("#NEAR", lists, |cursors| near_positions(k, cursors))
}

/// Unordered window: one position per child with `max - min < k`.
///
/// The emitted position is the largest position of the window.
pub fn window(k: u32, lists: &[&PostingList]) -> Result<PostingList> {
    merge("#WINDOW", lists, |cursors| window_positions(k, cursors))
}

fn merge<F>(operator: &str, lists: &[&PostingList], mut positions: F) -> Result<PostingList>
where
    F: FnMut(&mut [PostingCursor<'_>]) -> Vec<u32>,
{
    let Some(first) = lists.first() else {
        return Err(QuarryError::query(format!("{operator} needs at least one argument")));
    };
    let field = first.field();
    if let Some(other) = lists.iter().find(|list| list.field() != field) {
        return Err(QuarryError::query(format!(
            "{operator} arguments must share a field, found {field} and {}",
            other.field()
        )));
    }

    let mut cursors: Vec<PostingCursor<'_>> =
        lists.iter().map(|list| PostingCursor::new(*list)).collect();
    let mut output = PostingList::new(field);

    'docs: loop {
        let Some(mut candidate) = cursors[0].doc_id() else {
            break;
        };
        'align: loop {
            for cursor in cursors.iter_mut() {
                cursor.advance_to(candidate);
                match cursor.doc_id() {
                    None => break 'docs,
                    Some(doc_id) if doc_id > candidate => {
                        candidate = doc_id;
                        continue 'align;
                    }
                    Some(_) => {}
                }
            }
            break;
        }

        let matched = positions(&mut cursors);
        if !matched.is_empty() {
            output.append_posting(candidate, matched)?;
        }
        for cursor in cursors.iter_mut() {
            cursor.advance_past(candidate);
        }
    }

    Ok(output)
}

fn near_positions(k: u32, cursors: &mut [PostingCursor<'_>]) -> Vec<u32> {
    let mut matched = Vec::new();
    'search: loop {
        let Some(mut anchor) = cursors[0].position() else {
            break;
        };
        let mut complete = true;
        for cursor in cursors[1..].iter_mut() {
            cursor.advance_position_past(anchor);
            let Some(position) = cursor.position() else {
                break 'search;
            };
            if position - anchor > k {
                complete = false;
                break;
            }
            anchor = position;
        }

        if complete {
            matched.push(anchor);
            for cursor in cursors.iter_mut() {
                cursor.next_position();
            }
        } else {
            cursors[0].next_position();
        }
    }
    matched
}

fn window_positions(k: u32, cursors: &mut [PostingCursor<'_>]) -> Vec<u32> {
    let mut matched = Vec::new();
    loop {
        let mut min = u32::MAX;
        let mut max = 0;
        let mut min_idx = 0;
        for (idx, cursor) in cursors.iter().enumerate() {
            let Some(position) = cursor.position() else {
                return matched;
            };
            // Strict comparison keeps the first child on ties.
            if position < min {
                min = position;
                min_idx = idx;
            }
            max = max.max(position);
        }

        if max - min >= k {
            cursors[min_idx].next_position();
        } else {
            matched.push(max);
            for cursor in cursors.iter_mut() {
                cursor.next_position();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::posting::Posting;

    fn list(field: &str, postings: &[(u32, &[u32])]) -> PostingList {
        PostingList::from_postings(
            field,
            postings
                .iter()
                .map(|(doc, positions)| Posting::new(*doc, positions.to_vec()))
                .collect(),
        )
        .unwrap()
    }

    fn positions_of(list: &PostingList) -> Vec<(u32, Vec<u32>)> {
        list.iter()
            .map(|p| (p.doc_id, p.positions.clone()))
            .collect()
    }

    #[test]
    fn test_near_distance() {
        let x = list("body", &[(0, &[1])]);
        let y = list("body", &[(0, &[3])]);

        let result = near(2, &[&x, &y]).unwrap();
        assert_eq!(positions_of(&result), vec![(0, vec![3])]);
        assert_eq!(result.get(0).unwrap().tf, 1);

        assert!(near(1, &[&x, &y]).unwrap().is_empty());
    }

    #[test]
    fn test_near_is_ordered() {
        let x = list("body", &[(0, &[5])]);
        let y = list("body", &[(0, &[4])]);
        assert!(near(3, &[&x, &y]).unwrap().is_empty());
    }

    #[test]
    fn test_near_repeated_terms() {
        // a b a b a b
        let a = list("body", &[(3, &[0, 2, 4])]);
        let b = list("body", &[(3, &[1, 3, 5])]);

        let result = near(1, &[&a, &b]).unwrap();
        assert_eq!(positions_of(&result), vec![(3, vec![1, 3, 5])]);
        assert_eq!(result.ctf(), 3);
    }

    #[test]
    fn test_near_three_children() {
        let a = list("body", &[(1, &[0, 10])]);
        let b = list("body", &[(1, &[2, 11])]);
        let c = list("body", &[(1, &[3, 20])]);

        let result = near(2, &[&a, &b, &c]).unwrap();
        assert_eq!(positions_of(&result), vec![(1, vec![3])]);
    }

    #[test]
    fn test_document_gating() {
        let a = list("body", &[(1, &[0]), (2, &[0]), (5, &[0])]);
        let b = list("body", &[(2, &[1]), (3, &[1]), (5, &[4])]);

        let result = near(1, &[&a, &b]).unwrap();
        // Document 5 holds both terms but too far apart.
        assert_eq!(positions_of(&result), vec![(2, vec![1])]);
        assert_eq!(result.df(), 1);
    }

    #[test]
    fn test_single_child() {
        let a = list("body", &[(0, &[2, 7]), (4, &[1])]);

        let result = near(0, &[&a]).unwrap();
        assert_eq!(positions_of(&result), vec![(0, vec![2, 7]), (4, vec![1])]);

        // A lone position spans zero, which is not below a width of zero.
        assert!(window(0, &[&a]).unwrap().is_empty());
        let result = window(1, &[&a]).unwrap();
        assert_eq!(positions_of(&result), vec![(0, vec![2, 7]), (4, vec![1])]);
    }

    #[test]
    fn test_window_width() {
        let a = list("body", &[(0, &[5])]);
        let b = list("body", &[(0, &[1])]);

        let result = window(5, &[&a, &b]).unwrap();
        assert_eq!(positions_of(&result), vec![(0, vec![5])]);

        assert!(window(4, &[&a, &b]).unwrap().is_empty());
    }

    #[test]
    fn test_window_advances_minimum() {
        let a = list("body", &[(0, &[0, 8])]);
        let b = list("body", &[(0, &[6, 20])]);

        let result = window(3, &[&a, &b]).unwrap();
        assert_eq!(positions_of(&result), vec![(0, vec![8])]);
    }

    #[test]
    fn test_field_mismatch() {
        let a = list("body", &[(0, &[0])]);
        let b = list("title", &[(0, &[1])]);

        let err = near(3, &[&a, &b]).unwrap_err();
        assert!(matches!(err, QuarryError::Query(_)));
        assert!(window(3, &[]).is_err());
    }

    #[test]
    fn test_empty_child() {
        let a = list("body", &[(0, &[0])]);
        let empty = PostingList::new("body");
        assert!(window(10, &[&a, &empty]).unwrap().is_empty());
    }
}
