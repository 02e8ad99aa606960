//! In-memory collaborators shared by the integration tests.
//!
//! Each fake records the calls it receives so tests can assert on the exact
//! sequence of remote mutations.

#![allow(dead_code)]

use bugsync_core::client::{Analyzer, ClientError, RemoteStore, Tracker, TrackerBugs};
use bugsync_core::model::{
    Analysis, AnalysisId, AnalysisPayload, BugAnalysis, BugId, QueryParams, UserProfile,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

fn status_error(method: &str, url: &str) -> ClientError {
    ClientError::Status {
        method: method.to_string(),
        url: url.to_string(),
        status: 503,
        body: "unavailable".to_string(),
    }
}

pub fn analysis(id: u64, name: &str) -> Analysis {
    Analysis {
        id: AnalysisId(id),
        name: name.to_string(),
        parameters: QueryParams::Raw(format!("query={name}")),
    }
}

pub fn bug_record(id: u64) -> Value {
    json!({"id": id, "summary": format!("Bug {id}"), "status": "NEW"})
}

// ---------------------------------------------------------------------------
// Remote store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Upsert {
        bug_id: BugId,
        analyses: BTreeSet<AnalysisId>,
        hash: String,
    },
    Delete(BugId),
}

#[derive(Default)]
pub struct FakeRemote {
    pub analyses: Vec<Analysis>,
    pub listings: BTreeMap<AnalysisId, Vec<BugId>>,
    pub broken_listings: BTreeSet<AnalysisId>,
    pub fail_list_analyses: bool,
    pub fail_upsert: BTreeSet<BugId>,
    pub fail_delete: BTreeSet<BugId>,
    pub calls: RefCell<Vec<RemoteCall>>,
    pub payloads: RefCell<Vec<AnalysisPayload>>,
}

impl FakeRemote {
    pub fn with_analyses(analyses: Vec<Analysis>) -> Self {
        Self {
            analyses,
            ..Self::default()
        }
    }

    pub fn list(mut self, analysis: u64, bugs: &[u64]) -> Self {
        self.listings
            .insert(AnalysisId(analysis), bugs.iter().copied().map(BugId).collect());
        self
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.borrow().clone()
    }

    pub fn upserts(&self) -> Vec<RemoteCall> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, RemoteCall::Upsert { .. }))
            .collect()
    }

    pub fn deletes(&self) -> Vec<BugId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::Delete(id) => Some(id),
                RemoteCall::Upsert { .. } => None,
            })
            .collect()
    }

    pub fn payload_for(&self, bug_id: u64) -> Option<AnalysisPayload> {
        self.payloads
            .borrow()
            .iter()
            .find(|payload| payload.bug_id == BugId(bug_id))
            .cloned()
    }
}

impl RemoteStore for FakeRemote {
    fn list_analyses(&self) -> Result<Vec<Analysis>, ClientError> {
        if self.fail_list_analyses {
            return Err(status_error("GET", "/analysis"));
        }
        Ok(self.analyses.clone())
    }

    fn analysis_bugs(&self, id: AnalysisId) -> Result<Vec<BugId>, ClientError> {
        if self.broken_listings.contains(&id) {
            return Err(status_error("GET", &format!("/analysis/{id}")));
        }
        Ok(self.listings.get(&id).cloned().unwrap_or_default())
    }

    fn upsert(&self, payload: &AnalysisPayload) -> Result<(), ClientError> {
        self.calls.borrow_mut().push(RemoteCall::Upsert {
            bug_id: payload.bug_id,
            analyses: payload.analyses.clone(),
            hash: payload.payload_hash.clone(),
        });
        if self.fail_upsert.contains(&payload.bug_id) {
            return Err(status_error("POST", "/bugs"));
        }
        self.payloads.borrow_mut().push(payload.clone());
        Ok(())
    }

    fn delete(&self, bug_id: BugId) -> Result<(), ClientError> {
        self.calls.borrow_mut().push(RemoteCall::Delete(bug_id));
        if self.fail_delete.contains(&bug_id) {
            return Err(status_error("DELETE", &format!("/bugs/{bug_id}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tracker
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTracker {
    /// Query results keyed by the raw query string.
    pub results: BTreeMap<String, TrackerBugs>,
    pub broken_queries: BTreeSet<String>,
    pub users: Vec<UserProfile>,
    pub fail_lookup: bool,
    pub lookups: RefCell<Vec<Vec<String>>>,
}

impl FakeTracker {
    /// Make `analysis`'s query return `bugs` with default records.
    pub fn matches(mut self, analysis: &Analysis, bugs: &[u64]) -> Self {
        let records = bugs.iter().map(|id| (BugId(*id), bug_record(*id))).collect();
        self.results.insert(
            query_key(&analysis.parameters),
            TrackerBugs {
                records,
                attachments: BTreeMap::new(),
            },
        );
        self
    }

    pub fn with_result(mut self, analysis: &Analysis, bugs: TrackerBugs) -> Self {
        self.results.insert(query_key(&analysis.parameters), bugs);
        self
    }

    pub fn with_users(mut self, users: Vec<UserProfile>) -> Self {
        self.users = users;
        self
    }

    pub fn lookups(&self) -> Vec<Vec<String>> {
        self.lookups.borrow().clone()
    }
}

pub fn query_key(params: &QueryParams) -> String {
    match params {
        QueryParams::Raw(raw) => raw.clone(),
        QueryParams::Fields(fields) => format!("{fields:?}"),
    }
}

impl Tracker for FakeTracker {
    fn query(&self, params: &QueryParams) -> Result<TrackerBugs, ClientError> {
        let key = query_key(params);
        if self.broken_queries.contains(&key) {
            return Err(status_error("GET", "/rest/bug"));
        }
        Ok(self.results.get(&key).cloned().unwrap_or_default())
    }

    fn lookup_users(&self, keys: &[String]) -> Result<Vec<UserProfile>, ClientError> {
        self.lookups.borrow_mut().push(keys.to_vec());
        if self.fail_lookup {
            return Err(status_error("GET", "/rest/user"));
        }
        Ok(self
            .users
            .iter()
            .filter(|user| {
                keys.iter().any(|key| {
                    *key == user.id.to_string()
                        || user.name.as_deref() == Some(key.as_str())
                        || user.email.as_deref() == Some(key.as_str())
                })
            })
            .cloned()
            .collect())
    }

    fn bug_url(&self, bug_id: BugId) -> String {
        format!("https://bugzilla.test/{bug_id}")
    }
}

// ---------------------------------------------------------------------------
// Analyzer
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeAnalyzer {
    /// Per-bug analyzer output; bugs without an entry get [`default_analysis`].
    pub outputs: BTreeMap<BugId, Value>,
    pub failing: BTreeSet<BugId>,
    pub analyzed: RefCell<Vec<BugId>>,
}

impl FakeAnalyzer {
    pub fn output(mut self, bug_id: u64, value: Value) -> Self {
        self.outputs.insert(BugId(bug_id), value);
        self
    }

    pub fn failing(mut self, bug_id: u64) -> Self {
        self.failing.insert(BugId(bug_id));
        self
    }

    pub fn analyzed(&self) -> Vec<BugId> {
        self.analyzed.borrow().clone()
    }
}

pub fn default_analysis() -> Value {
    json!({
        "users": {"creator": null, "assignee": null, "reviewers": []},
        "uplift_comment": null,
        "uplift_author": null
    })
}

impl Analyzer for FakeAnalyzer {
    fn analyze(&self, bug_id: BugId) -> Result<BugAnalysis, ClientError> {
        self.analyzed.borrow_mut().push(bug_id);
        if self.failing.contains(&bug_id) {
            return Err(ClientError::Analyzer(format!("no patches found for {bug_id}")));
        }
        let value = self
            .outputs
            .get(&bug_id)
            .cloned()
            .unwrap_or_else(default_analysis);
        serde_json::from_value(value).map_err(|err| ClientError::Analyzer(err.to_string()))
    }

    fn render_uplift_comment(&self, text: &str, bug_id: BugId) -> Result<String, ClientError> {
        Ok(format!("<p data-bug=\"{bug_id}\">{text}</p>"))
    }
}
