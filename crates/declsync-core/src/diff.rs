//! Drift classification between stored and discovered state.
//!
//! Two pure comparison primitives, reused at three granularities:
//! function order lists and signature maps, code-file stems and
//! associations, test names and associations. Both return structured
//! reports; printing is the caller's concern.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// One classified disagreement between stored and discovered state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "subject", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Drift {
    /// Same elements, different order.
    Reordered,
    /// Present in the stored record, absent from what was discovered.
    NotFound(String),
    /// Discovered, but absent from the stored record.
    Missing(String),
    /// Present on both sides with disagreeing values.
    Inconsistent(String),
}

impl fmt::Display for Drift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Drift::Reordered => write!(f, "REORDERED"),
            Drift::NotFound(subject) => write!(f, "NOT_FOUND {subject}"),
            Drift::Missing(subject) => write!(f, "MISSING {subject}"),
            Drift::Inconsistent(subject) => write!(f, "INCONSISTENT {subject}"),
        }
    }
}

/// Compare two ordered lists.
///
/// Set-equal and same order: no drift. Set-equal but reordered: a single
/// [`Drift::Reordered`]. Otherwise per-element drift: `NotFound` for
/// stored-only elements (in stored order), `Missing` for found-only
/// elements (in found order); no order verdict is emitted when the sets
/// already disagree.
pub fn compare_ordered(stored: &[String], found: &[String]) -> Vec<Drift> {
    let stored_set: BTreeSet<&String> = stored.iter().collect();
    let found_set: BTreeSet<&String> = found.iter().collect();

    if stored_set == found_set {
        if stored == found {
            return Vec::new();
        }
        return vec![Drift::Reordered];
    }

    let mut drift = Vec::new();
    for name in stored {
        if !found_set.contains(name) {
            drift.push(Drift::NotFound(name.clone()));
        }
    }
    for name in found {
        if !stored_set.contains(name) {
            drift.push(Drift::Missing(name.clone()));
        }
    }
    drift
}

/// Compare two mappings.
///
/// Keys only in stored: `NotFound`. Keys only in found: `Missing`. Keys
/// on both sides with unequal values: `Inconsistent`. Equal entries are
/// silent. Entries come out in key order.
pub fn compare_mapped<V: PartialEq>(
    stored: &BTreeMap<String, V>,
    found: &BTreeMap<String, V>,
) -> Vec<Drift> {
    let keys: BTreeSet<&String> = stored.keys().chain(found.keys()).collect();
    let mut drift = Vec::new();
    for key in keys {
        match (stored.get(key), found.get(key)) {
            (Some(_), None) => drift.push(Drift::NotFound(key.clone())),
            (None, Some(_)) => drift.push(Drift::Missing(key.clone())),
            (Some(a), Some(b)) if a != b => drift.push(Drift::Inconsistent(key.clone())),
            _ => {}
        }
    }
    drift
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    mod ordered {
        use super::*;

        #[test]
        fn identical_lists_are_consistent() {
            assert!(compare_ordered(&strs(&["a", "b"]), &strs(&["a", "b"])).is_empty());
        }

        #[test]
        fn same_set_different_order_is_reordered() {
            assert_eq!(
                compare_ordered(&strs(&["a", "b"]), &strs(&["b", "a"])),
                vec![Drift::Reordered]
            );
        }

        #[test]
        fn diverging_sets_report_per_element() {
            assert_eq!(
                compare_ordered(&strs(&["a", "b"]), &strs(&["a", "c"])),
                vec![
                    Drift::NotFound("b".to_string()),
                    Drift::Missing("c".to_string())
                ]
            );
        }

        #[test]
        fn empty_against_empty_is_consistent() {
            assert!(compare_ordered(&[], &[]).is_empty());
        }

        #[test]
        fn everything_missing_from_empty_record() {
            assert_eq!(
                compare_ordered(&[], &strs(&["a", "b"])),
                vec![
                    Drift::Missing("a".to_string()),
                    Drift::Missing("b".to_string())
                ]
            );
        }
    }

    mod mapped {
        use super::*;

        fn map(pairs: &[(&str, i32)]) -> BTreeMap<String, i32> {
            pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
        }

        #[test]
        fn classifies_all_three_kinds() {
            let stored = map(&[("a", 1), ("b", 2)]);
            let found = map(&[("a", 1), ("b", 3), ("c", 4)]);
            assert_eq!(
                compare_mapped(&stored, &found),
                vec![
                    Drift::Inconsistent("b".to_string()),
                    Drift::Missing("c".to_string())
                ]
            );
        }

        #[test]
        fn stored_only_key_is_not_found() {
            let stored = map(&[("a", 1), ("d", 9)]);
            let found = map(&[("a", 1)]);
            assert_eq!(
                compare_mapped(&stored, &found),
                vec![Drift::NotFound("d".to_string())]
            );
        }

        #[test]
        fn equal_maps_are_silent() {
            let stored = map(&[("a", 1), ("b", 2)]);
            assert!(compare_mapped(&stored, &stored.clone()).is_empty());
        }
    }

    mod display {
        use super::*;

        #[test]
        fn renders_the_report_vocabulary() {
            assert_eq!(Drift::Reordered.to_string(), "REORDERED");
            assert_eq!(Drift::NotFound("x".into()).to_string(), "NOT_FOUND x");
            assert_eq!(Drift::Missing("y".into()).to_string(), "MISSING y");
            assert_eq!(
                Drift::Inconsistent("z".into()).to_string(),
                "INCONSISTENT z"
            );
        }
    }
}
