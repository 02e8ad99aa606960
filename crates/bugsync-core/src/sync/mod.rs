//! Tracker ↔ remote store reconciliation.
//!
//! A run has two phases:
//!
//! 1. [`collect`]: for every analysis, list the bugs the remote store holds
//!    under it and run its query on the tracker. Both signals are folded into
//!    one [`BugSyncState`] per bug id.
//! 2. [`reconcile`]: walk the states once. Bugs matching at least one query
//!    get a freshly assembled payload upserted; bugs that only the remote
//!    still lists get deleted.
//!
//! Nothing is persisted between runs; the state set is rebuilt from scratch
//! every time.
//!
//! [`collect`]: collect::collect
//! [`reconcile`]: reconcile::reconcile
//! [`BugSyncState`]: state::BugSyncState

pub mod collect;
pub mod payload;
pub mod reconcile;
pub mod state;

use tracing::info;

use crate::client::{Analyzer, ClientError, RemoteStore, Tracker};
use crate::error::ErrorCode;
use reconcile::{ReconcileOptions, SyncReport};

/// Errors that stop a run before any bug is looked at.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to list remote analyses: {0}")]
    ListAnalyses(#[source] ClientError),
}

impl SyncError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::ListAnalyses(_) => ErrorCode::ListAnalysesFailed,
        }
    }
}

/// One complete run: list analyses, collect, reconcile.
///
/// # Errors
///
/// Returns [`SyncError::ListAnalyses`] when the remote store cannot list its
/// analyses. Every later failure is per analysis or per bug and ends up in
/// the returned [`SyncReport`].
pub fn run<R, T, A>(
    remote: &R,
    tracker: &T,
    analyzer: &A,
    options: ReconcileOptions,
) -> Result<SyncReport, SyncError>
where
    R: RemoteStore + ?Sized,
    T: Tracker + ?Sized,
    A: Analyzer + ?Sized,
{
    let analyses = remote.list_analyses().map_err(SyncError::ListAnalyses)?;
    info!(analyses = analyses.len(), "Loaded remote analyses");

    let mut collection = collect::collect(&analyses, remote, tracker);
    let mut report =
        reconcile::reconcile(&mut collection.states, remote, tracker, analyzer, options);

    report.analyses_total = collection.analyses_total;
    report.analyses_failed = collection.failures.len();
    let mut errors: Vec<String> = collection
        .failures
        .iter()
        .map(|failure| format!("analysis {} ({}): {}", failure.analysis, failure.name, failure.error))
        .collect();
    errors.append(&mut report.errors);
    report.errors = errors;
    report.collection_failures = collection.failures;

    info!(
        upserted = report.upserted,
        deleted = report.deleted,
        failed = report.errors.len(),
        "Sync finished"
    );
    Ok(report)
}
