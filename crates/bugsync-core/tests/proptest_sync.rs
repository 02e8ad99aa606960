use bugsync_core::hash::content_hash;
use bugsync_core::model::{AnalysisId, BugId};
use bugsync_core::{Decision, SyncSet, decide};
use proptest::prelude::*;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        "[a-z0-9 ]{0,12}".prop_map(Value::String),
    ]
}

fn arb_json() -> impl Strategy<Value = Value> {
    arb_leaf().prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn arb_record() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z_]{1,8}", arb_json(), 1..8)
        .prop_map(|map| map.into_iter().collect())
}

/// Analysis id → (remote listing, tracker matches).
fn arb_fetches() -> impl Strategy<Value = BTreeMap<u64, (Vec<u64>, Vec<u64>)>> {
    prop::collection::btree_map(
        1..6u64,
        (
            prop::collection::vec(1..40u64, 0..10),
            prop::collection::vec(1..40u64, 0..10),
        ),
        0..5,
    )
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn hash_ignores_key_order(record in arb_record()) {
        let forward = Value::Object(record.clone());
        let reversed: Map<String, Value> = record.into_iter().rev().collect();

        prop_assert_eq!(content_hash(&forward), content_hash(&Value::Object(reversed)));
    }

    #[test]
    fn hash_changes_with_any_field(record in arb_record(), key in "[a-z_]{1,8}") {
        let original = Value::Object(record.clone());
        let mut changed = record;
        let marker = json!({"changed": true});
        let previous = changed.insert(key, marker.clone());
        prop_assume!(previous.as_ref() != Some(&marker));

        prop_assert_ne!(content_hash(&original), content_hash(&Value::Object(changed)));
    }

    #[test]
    fn every_state_is_seen_somewhere(fetches in arb_fetches()) {
        let mut states = SyncSet::new();
        for (analysis, (remote, tracker)) in &fetches {
            let analysis = AnalysisId(*analysis);
            states.record_remote(analysis, remote.iter().copied().map(BugId));
            states.record_tracker(
                analysis,
                tracker.iter().map(|id| (BugId(*id), json!({"id": id}))),
            );
        }

        for state in states.iter() {
            prop_assert!(state.on_remote() || state.on_tracker());
            prop_assert_ne!(decide(state), Decision::Inconsistent);
        }
    }

    #[test]
    fn decision_tags_with_exactly_the_matching_analyses(fetches in arb_fetches()) {
        let mut states = SyncSet::new();
        let mut expected: BTreeMap<BugId, BTreeSet<AnalysisId>> = BTreeMap::new();
        for (analysis, (remote, tracker)) in &fetches {
            let analysis = AnalysisId(*analysis);
            states.record_remote(analysis, remote.iter().copied().map(BugId));
            states.record_tracker(
                analysis,
                tracker.iter().map(|id| (BugId(*id), json!({"id": id}))),
            );
            for id in tracker {
                expected.entry(BugId(*id)).or_default().insert(analysis);
            }
        }

        for state in states.iter() {
            match decide(state) {
                Decision::Upsert { analyses } => {
                    prop_assert_eq!(Some(&analyses), expected.get(&state.bug_id));
                }
                Decision::Delete { .. } => {
                    prop_assert!(!expected.contains_key(&state.bug_id));
                }
                Decision::Inconsistent => prop_assert!(false, "unreachable"),
            }
        }
    }
}
