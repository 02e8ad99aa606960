use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{error, info, warn};

use crate::client::{Analyzer, RemoteStore, Tracker};
use crate::error::ErrorCode;
use crate::model::ids::join_ids;
use crate::model::AnalysisId;
use crate::sync::collect::CollectionFailure;
use crate::sync::payload::build_payload;
use crate::sync::state::{BugSyncState, SyncSet};

/// What to do with one bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The bug matches at least one query: (re)build and upsert its payload,
    /// tagged with every matching analysis.
    Upsert { analyses: BTreeSet<AnalysisId> },
    /// No query matches any more but the remote still lists the bug.
    Delete { analyses: BTreeSet<AnalysisId> },
    /// Seen on neither side. Unreachable when the set was built by `collect`.
    Inconsistent,
}

/// Decide the action for one bug. Tracker membership wins over remote
/// membership.
#[must_use]
pub fn decide(state: &BugSyncState) -> Decision {
    if state.on_tracker() {
        Decision::Upsert {
            analyses: state.analyses_on_tracker.clone(),
        }
    } else if state.on_remote() {
        Decision::Delete {
            analyses: state.analyses_on_remote.clone(),
        }
    } else {
        Decision::Inconsistent
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Compute decisions and payloads but send nothing.
    pub dry_run: bool,
}

/// Summary of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub dry_run: bool,
    pub analyses_total: usize,
    pub analyses_failed: usize,
    pub bugs_seen: usize,
    /// Payloads sent (or that would have been sent, in a dry run).
    pub upserted: usize,
    /// Remote records removed (or that would have been removed).
    pub deleted: usize,
    pub analysis_failed: usize,
    pub upsert_failed: usize,
    pub delete_failed: usize,
    pub inconsistent: usize,
    pub collection_failures: Vec<CollectionFailure>,
    pub errors: Vec<String>,
}

impl SyncReport {
    /// Returns `true` if every analysis and every bug went through.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Apply the decision policy to every bug in `states`.
///
/// One remote call per bug, no rollback. Failures are logged and counted,
/// never propagated: a bad bug never stops the run.
pub fn reconcile<R, T, A>(
    states: &mut SyncSet,
    remote: &R,
    tracker: &T,
    analyzer: &A,
    options: ReconcileOptions,
) -> SyncReport
where
    R: RemoteStore + ?Sized,
    T: Tracker + ?Sized,
    A: Analyzer + ?Sized,
{
    let mut report = SyncReport {
        dry_run: options.dry_run,
        bugs_seen: states.len(),
        ..SyncReport::default()
    };

    for state in states.iter_mut() {
        match decide(state) {
            Decision::Upsert { analyses } => {
                upsert_bug(state, &analyses, remote, tracker, analyzer, options, &mut report);
            }
            Decision::Delete { analyses } => {
                delete_bug(state, &analyses, remote, options, &mut report);
            }
            Decision::Inconsistent => {
                debug_assert!(
                    state.on_remote() || state.on_tracker(),
                    "bug {} has sync state but was seen on neither side",
                    state.bug_id
                );
                error!(
                    code = %ErrorCode::InconsistentState,
                    bug_id = %state.bug_id,
                    "Bug #{} seen on neither side",
                    state.bug_id
                );
                report.inconsistent += 1;
                report
                    .errors
                    .push(format!("bug {}: inconsistent sync state", state.bug_id));
            }
        }
    }

    report
}

fn upsert_bug<R, T, A>(
    state: &mut BugSyncState,
    analyses: &BTreeSet<AnalysisId>,
    remote: &R,
    tracker: &T,
    analyzer: &A,
    options: ReconcileOptions,
    report: &mut SyncReport,
) where
    R: RemoteStore + ?Sized,
    T: Tracker + ?Sized,
    A: Analyzer + ?Sized,
{
    let bug_id = state.bug_id;

    if state.payload.is_some() {
        warn!(bug_id = %bug_id, "Bug {bug_id} already processed");
    } else {
        match build_payload(state, tracker, analyzer) {
            Ok(payload) => {
                info!(bug_id = %bug_id, "Updated payload of {bug_id}");
                state.payload = Some(payload);
            }
            Err(err) => {
                error!(code = %err.code(), bug_id = %bug_id, "{err}");
                report.analysis_failed += 1;
                report.errors.push(err.to_string());
                return;
            }
        }
    }

    let Some(payload) = state.payload.as_ref() else {
        return;
    };

    if options.dry_run {
        info!(bug_id = %bug_id, "Would add bug #{bug_id} on analysis {}", join_ids(analyses));
        report.upserted += 1;
        return;
    }

    match remote.upsert(payload) {
        Ok(()) => {
            info!(bug_id = %bug_id, "Added bug #{bug_id} on analysis {}", join_ids(analyses));
            report.upserted += 1;
        }
        Err(err) => {
            error!(
                code = %ErrorCode::UpsertFailed,
                bug_id = %bug_id,
                "Failed to add bug #{bug_id}: {err}"
            );
            report.upsert_failed += 1;
            report.errors.push(format!("add bug {bug_id}: {err}"));
        }
    }
}

fn delete_bug<R>(
    state: &BugSyncState,
    analyses: &BTreeSet<AnalysisId>,
    remote: &R,
    options: ReconcileOptions,
    report: &mut SyncReport,
) where
    R: RemoteStore + ?Sized,
{
    let bug_id = state.bug_id;

    if options.dry_run {
        info!(bug_id = %bug_id, "Would delete bug #{bug_id} from analysis {}", join_ids(analyses));
        report.deleted += 1;
        return;
    }

    match remote.delete(bug_id) {
        Ok(()) => {
            info!(bug_id = %bug_id, "Deleted bug #{bug_id} from analysis {}", join_ids(analyses));
            report.deleted += 1;
        }
        Err(err) => {
            warn!(
                code = %ErrorCode::DeleteFailed,
                bug_id = %bug_id,
                "Failed to delete bug #{bug_id}: {err}"
            );
            report.delete_failed += 1;
            report.errors.push(format!("delete bug {bug_id}: {err}"));
        }
    }
}
