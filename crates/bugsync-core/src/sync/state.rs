use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{AnalysisId, AnalysisPayload, BugId};

/// Everything known about one bug during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BugSyncState {
    pub bug_id: BugId,
    /// Analyses the remote store currently lists this bug under.
    pub analyses_on_remote: BTreeSet<AnalysisId>,
    /// Analyses whose tracker query currently matches this bug.
    pub analyses_on_tracker: BTreeSet<AnalysisId>,
    /// Tracker record from the first query that matched. Later matches never
    /// overwrite it.
    pub raw_record: Option<Value>,
    /// Set once the payload has been assembled in this run.
    pub payload: Option<AnalysisPayload>,
}

impl BugSyncState {
    #[must_use]
    pub const fn new(bug_id: BugId) -> Self {
        Self {
            bug_id,
            analyses_on_remote: BTreeSet::new(),
            analyses_on_tracker: BTreeSet::new(),
            raw_record: None,
            payload: None,
        }
    }

    pub fn mark_remote(&mut self, analysis: AnalysisId) {
        self.analyses_on_remote.insert(analysis);
    }

    /// Record a tracker match. The record is kept only if none is set yet.
    pub fn mark_tracker(&mut self, analysis: AnalysisId, record: Value) {
        self.analyses_on_tracker.insert(analysis);
        if self.raw_record.is_none() {
            self.raw_record = Some(record);
        }
    }

    /// Whether the tracker still matches this bug under any analysis.
    #[must_use]
    pub fn on_tracker(&self) -> bool {
        !self.analyses_on_tracker.is_empty()
    }

    #[must_use]
    pub fn on_remote(&self) -> bool {
        !self.analyses_on_remote.is_empty()
    }
}

/// The per-run set of bug states, keyed by bug id.
///
/// A state exists for a bug iff the bug was seen on the remote store or the
/// tracker during this run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncSet {
    states: BTreeMap<BugId, BugSyncState>,
}

impl SyncSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The state for `bug_id`, created on first access.
    pub fn entry(&mut self, bug_id: BugId) -> &mut BugSyncState {
        self.states
            .entry(bug_id)
            .or_insert_with(|| BugSyncState::new(bug_id))
    }

    /// Mark every bug in `bug_ids` as listed remotely under `analysis`.
    pub fn record_remote(&mut self, analysis: AnalysisId, bug_ids: impl IntoIterator<Item = BugId>) {
        for bug_id in bug_ids {
            self.entry(bug_id).mark_remote(analysis);
        }
    }

    /// Mark every bug in `records` as matched on the tracker by `analysis`.
    pub fn record_tracker(
        &mut self,
        analysis: AnalysisId,
        records: impl IntoIterator<Item = (BugId, Value)>,
    ) {
        for (bug_id, record) in records {
            self.entry(bug_id).mark_tracker(analysis, record);
        }
    }

    #[must_use]
    pub fn get(&self, bug_id: BugId) -> Option<&BugSyncState> {
        self.states.get(&bug_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.states.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &BugSyncState> {
        self.states.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BugSyncState> {
        self.states.values_mut()
    }

    #[must_use]
    pub fn bug_ids(&self) -> Vec<BugId> {
        self.states.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_tracker_record_wins() {
        let mut set = SyncSet::new();
        set.record_tracker(AnalysisId(1), [(BugId(5), json!({"rev": 1}))]);
        set.record_tracker(AnalysisId(2), [(BugId(5), json!({"rev": 2}))]);

        let state = set.get(BugId(5)).expect("state");
        assert_eq!(state.raw_record, Some(json!({"rev": 1})));
        assert_eq!(
            state.analyses_on_tracker,
            [AnalysisId(1), AnalysisId(2)].into_iter().collect()
        );
    }

    #[test]
    fn remote_and_tracker_signals_merge_per_bug() {
        let mut set = SyncSet::new();
        set.record_remote(AnalysisId(3), [BugId(1), BugId(2)]);
        set.record_tracker(AnalysisId(3), [(BugId(2), json!({})), (BugId(9), json!({}))]);

        assert_eq!(set.bug_ids(), vec![BugId(1), BugId(2), BugId(9)]);

        let only_remote = set.get(BugId(1)).expect("state");
        assert!(only_remote.on_remote() && !only_remote.on_tracker());
        assert_eq!(only_remote.raw_record, None);

        let both = set.get(BugId(2)).expect("state");
        assert!(both.on_remote() && both.on_tracker());

        let only_tracker = set.get(BugId(9)).expect("state");
        assert!(!only_tracker.on_remote() && only_tracker.on_tracker());
    }

    #[test]
    fn repeated_marks_are_idempotent() {
        let mut set = SyncSet::new();
        set.record_remote(AnalysisId(1), [BugId(4), BugId(4)]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(BugId(4)).expect("state").analyses_on_remote.len(), 1);
    }

    #[test]
    fn unseen_bugs_have_no_state() {
        let set = SyncSet::new();
        assert!(set.is_empty());
        assert!(set.get(BugId(1)).is_none());
    }
}
