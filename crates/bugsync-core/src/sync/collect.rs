//! Collection phase: fold remote listings and tracker matches into a [`SyncSet`].
//!
//! Each analysis is fetched into a local snapshot first (remote listing, then
//! tracker query) and merged into the set only when both calls succeeded.
//! A half-fetched analysis would otherwise make its bugs look "remote only"
//! and get them deleted.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info};

use crate::client::{RemoteStore, Tracker, TrackerBugs};
use crate::error::ErrorCode;
use crate::model::{Analysis, AnalysisId, BugId};
use crate::sync::state::SyncSet;

/// An analysis whose contribution was skipped this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionFailure {
    pub analysis: AnalysisId,
    pub name: String,
    pub error: String,
}

/// Output of the collection phase.
#[derive(Debug, Default)]
pub struct Collection {
    pub states: SyncSet,
    pub analyses_total: usize,
    pub failures: Vec<CollectionFailure>,
}

/// Attach each bug's attachment list to its record under `attachments`.
///
/// Attachment entries for bugs missing from `records` are dropped.
#[must_use]
pub fn merge_attachments(bugs: TrackerBugs) -> BTreeMap<BugId, Value> {
    let TrackerBugs {
        mut records,
        attachments,
    } = bugs;

    for (bug_id, list) in attachments {
        if let Some(Value::Object(record)) = records.get_mut(&bug_id) {
            record.insert("attachments".to_string(), list);
        }
    }

    records
}

/// Run the collection phase over `analyses`, in order.
///
/// Never fails as a whole: an analysis whose remote listing or tracker query
/// fails is logged, recorded in [`Collection::failures`], and skipped.
#[must_use]
pub fn collect<R, T>(analyses: &[Analysis], remote: &R, tracker: &T) -> Collection
where
    R: RemoteStore + ?Sized,
    T: Tracker + ?Sized,
{
    let mut collection = Collection {
        analyses_total: analyses.len(),
        ..Collection::default()
    };

    for analysis in analyses {
        match fetch_analysis(analysis, remote, tracker) {
            Ok((remote_ids, records)) => {
                collection.states.record_remote(analysis.id, remote_ids);
                collection.states.record_tracker(analysis.id, records);
            }
            Err(err) => {
                error!(
                    code = %ErrorCode::CollectionFailed,
                    analysis = %analysis.id,
                    "Skipping analysis {}: {err}",
                    analysis.name
                );
                collection.failures.push(CollectionFailure {
                    analysis: analysis.id,
                    name: analysis.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    collection
}

fn fetch_analysis<R, T>(
    analysis: &Analysis,
    remote: &R,
    tracker: &T,
) -> Result<(Vec<BugId>, BTreeMap<BugId, Value>), crate::client::ClientError>
where
    R: RemoteStore + ?Sized,
    T: Tracker + ?Sized,
{
    info!(analysis = %analysis.id, "List remote bugs for {}", analysis.name);
    let remote_ids = remote.analysis_bugs(analysis.id)?;

    info!(analysis = %analysis.id, "List tracker bugs for {}", analysis.name);
    let records = merge_attachments(tracker.query(&analysis.parameters)?);

    info!(
        analysis = %analysis.id,
        remote = remote_ids.len(),
        tracker = records.len(),
        "Collected {}",
        analysis.name
    );
    Ok((remote_ids, records))
}
