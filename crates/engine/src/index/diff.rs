//! Index diff
//!
//! Pure comparison of two snapshots. Only index names present in both are
//! compared. An unchanged index is refreshed by re-upserting its values; a
//! changed one yields a remove for every value that left and an upsert for
//! every value that arrived. All removes come before all upserts.

use serde::{Deserialize, Serialize};

use super::IndexSnapshot;

/// What to do with one lookup document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexAction {
    /// Write the lookup document
    Upsert,
    /// Delete the lookup document
    Remove,
}

/// One lookup-document change
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexOperation {
    /// Index name
    pub name: String,
    /// Indexed value
    pub value: String,
    /// Change to apply
    pub action: IndexAction,
}

impl IndexOperation {
    fn new(name: &str, value: &str, action: IndexAction) -> Self {
        IndexOperation {
            name: name.to_string(),
            value: value.to_string(),
            action,
        }
    }
}

/// Operations that move the lookup documents from `prior` to `current`
pub fn diff(prior: &IndexSnapshot, current: &IndexSnapshot) -> Vec<IndexOperation> {
    let mut removes = Vec::new();
    let mut upserts = Vec::new();

    for (name, now) in current {
        let Some(before) = prior.get(name) else {
            continue;
        };
        let (was, is) = (before.value.values(), now.value.values());

        if was == is {
            upserts.extend(is.iter().map(|v| IndexOperation::new(name, v, IndexAction::Upsert)));
            continue;
        }
        removes.extend(
            was.iter()
                .filter(|v| !is.contains(v))
                .map(|v| IndexOperation::new(name, v, IndexAction::Remove)),
        );
        upserts.extend(
            is.iter()
                .filter(|v| !was.contains(v))
                .map(|v| IndexOperation::new(name, v, IndexAction::Upsert)),
        );
    }

    removes.extend(upserts);
    removes
}

/// Removes for every value known to either snapshot
pub fn removal_ops(prior: &IndexSnapshot, current: &IndexSnapshot) -> Vec<IndexOperation> {
    let mut ops: Vec<IndexOperation> = Vec::new();
    for record in prior.values().chain(current.values()) {
        for value in record.value.values() {
            let op = IndexOperation::new(&record.name, value, IndexAction::Remove);
            if !ops.contains(&op) {
                ops.push(op);
            }
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexRecord, IndexValue};
    use proptest::prelude::*;
    use settee_core::FieldPath;

    fn snap(entries: &[(&str, IndexValue)]) -> IndexSnapshot {
        entries
            .iter()
            .map(|(name, value)| {
                let record = IndexRecord {
                    name: name.to_string(),
                    path: FieldPath::from(*name),
                    value: value.clone(),
                };
                (name.to_string(), record)
            })
            .collect()
    }

    fn many(values: &[&str]) -> IndexValue {
        IndexValue::Many(values.iter().map(|v| v.to_string()).collect())
    }

    fn op(name: &str, value: &str, action: IndexAction) -> IndexOperation {
        IndexOperation::new(name, value, action)
    }

    // ========================================================================
    // Single values
    // ========================================================================

    #[test]
    fn test_unchanged_scalar_refreshes() {
        let s = snap(&[("email", IndexValue::One("a@x".into()))]);
        assert_eq!(diff(&s, &s), vec![op("email", "a@x", IndexAction::Upsert)]);
    }

    #[test]
    fn test_changed_scalar_removes_then_upserts() {
        let prior = snap(&[("email", IndexValue::One("a@x".into()))]);
        let current = snap(&[("email", IndexValue::One("b@x".into()))]);
        assert_eq!(
            diff(&prior, &current),
            vec![
                op("email", "a@x", IndexAction::Remove),
                op("email", "b@x", IndexAction::Upsert),
            ]
        );
    }

    #[test]
    fn test_null_values_produce_no_ops() {
        let set = snap(&[("email", IndexValue::One("a@x".into()))]);
        let unset = snap(&[("email", IndexValue::Null)]);
        assert_eq!(diff(&unset, &unset), vec![]);
        assert_eq!(diff(&set, &unset), vec![op("email", "a@x", IndexAction::Remove)]);
        assert_eq!(diff(&unset, &set), vec![op("email", "a@x", IndexAction::Upsert)]);
    }

    #[test]
    fn test_names_missing_on_either_side_are_skipped() {
        let prior = snap(&[("email", IndexValue::One("a@x".into()))]);
        let current = snap(&[("handle", IndexValue::One("ann".into()))]);
        assert!(diff(&prior, &current).is_empty());
    }

    // ========================================================================
    // Array values
    // ========================================================================

    #[test]
    fn test_array_set_difference() {
        let prior = snap(&[("tag", many(&["a", "b"]))]);
        let current = snap(&[("tag", many(&["b", "c"]))]);
        assert_eq!(
            diff(&prior, &current),
            vec![op("tag", "a", IndexAction::Remove), op("tag", "c", IndexAction::Upsert)]
        );
    }

    #[test]
    fn test_removes_precede_upserts_across_indexes() {
        let prior = snap(&[("a", IndexValue::One("1".into())), ("b", IndexValue::One("1".into()))]);
        let current = snap(&[("a", IndexValue::One("2".into())), ("b", IndexValue::One("2".into()))]);
        let actions: Vec<IndexAction> = diff(&prior, &current).iter().map(|o| o.action).collect();
        assert_eq!(
            actions,
            vec![IndexAction::Remove, IndexAction::Remove, IndexAction::Upsert, IndexAction::Upsert]
        );
    }

    #[test]
    fn test_removal_ops_cover_union() {
        let prior = snap(&[("tag", many(&["a", "b"]))]);
        let current = snap(&[("tag", many(&["b", "c"]))]);
        let values: Vec<String> = removal_ops(&prior, &current).into_iter().map(|o| o.value).collect();
        assert_eq!(values, vec!["a", "b", "c"]);
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn sorted_set() -> impl Strategy<Value = Vec<String>> {
        proptest::collection::btree_set("[a-e]{1,2}", 0..6).prop_map(|s| s.into_iter().collect())
    }

    proptest! {
        #[test]
        fn test_diff_of_equal_snapshots_only_upserts(values in sorted_set()) {
            let s = snap(&[("tag", IndexValue::Many(values.clone()))]);
            let ops = diff(&s, &s);
            prop_assert!(ops.iter().all(|o| o.action == IndexAction::Upsert));
            let upserted: Vec<String> = ops.into_iter().map(|o| o.value).collect();
            prop_assert_eq!(upserted, values);
        }

        #[test]
        fn test_diff_applied_to_prior_yields_current(before in sorted_set(), after in sorted_set()) {
            let ops = diff(
                &snap(&[("tag", IndexValue::Many(before.clone()))]),
                &snap(&[("tag", IndexValue::Many(after.clone()))]),
            );
            let mut live: std::collections::BTreeSet<String> = before.into_iter().collect();
            for o in ops {
                match o.action {
                    IndexAction::Remove => prop_assert!(live.remove(&o.value)),
                    IndexAction::Upsert => { live.insert(o.value); }
                }
            }
            prop_assert_eq!(live.into_iter().collect::<Vec<_>>(), after);
        }
    }
}
