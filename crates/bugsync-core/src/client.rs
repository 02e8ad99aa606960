//! Collaborator seams.
//!
//! The core never talks to the network. Every external system it depends on
//! (the issue tracker, the remote analysis store, the patch analyzer, the
//! secret store) is reached through one of the traits below. The `bugsync`
//! binary provides HTTP and subprocess implementations; tests provide
//! in-memory fakes.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{ConfigError, Secrets};
use crate::model::{
    Analysis, AnalysisId, AnalysisPayload, BugAnalysis, BugId, QueryParams, UserProfile,
};

/// Errors raised by collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The request never produced a response (DNS, TLS, connection reset...).
    #[error("{method} {url} failed: {message}")]
    Transport {
        method: String,
        url: String,
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("invalid response from {method} {url}: {status} {body}")]
    Status {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// The external analyzer failed or produced unusable output.
    #[error("analyzer failed: {0}")]
    Analyzer(String),
}

/// Result of one tracker query: raw records and their attachments, both keyed
/// by bug id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackerBugs {
    pub records: BTreeMap<BugId, Value>,
    pub attachments: BTreeMap<BugId, Value>,
}

/// The issue tracker.
pub trait Tracker {
    /// Run a saved search. Blocks until both the bug list and the attachment
    /// lists are available.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if any sub-request fails.
    fn query(&self, params: &QueryParams) -> Result<TrackerBugs, ClientError>;

    /// Resolve user keys (ids, logins or email addresses) to full profiles in
    /// a single batched call.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] if the lookup fails.
    fn lookup_users(&self, keys: &[String]) -> Result<Vec<UserProfile>, ClientError>;

    /// Stable, externally addressable URL of a bug.
    fn bug_url(&self, bug_id: BugId) -> String;
}

/// The remote analysis store.
pub trait RemoteStore {
    /// `GET /analysis`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or status failures.
    fn list_analyses(&self) -> Result<Vec<Analysis>, ClientError>;

    /// `GET /analysis/{id}`: bugs currently listed under one analysis.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or status failures.
    fn analysis_bugs(&self, id: AnalysisId) -> Result<Vec<BugId>, ClientError>;

    /// `POST /bugs`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or status failures.
    fn upsert(&self, payload: &AnalysisPayload) -> Result<(), ClientError>;

    /// `DELETE /bugs/{bug_id}`
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] on transport or status failures.
    fn delete(&self, bug_id: BugId) -> Result<(), ClientError>;
}

/// The external patch/review analyzer.
pub trait Analyzer {
    /// Analyze the patches and reviews of one bug.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Analyzer`] when the analysis cannot be produced.
    fn analyze(&self, bug_id: BugId) -> Result<BugAnalysis, ClientError>;

    /// Render an uplift-request comment to HTML for display.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Analyzer`] when rendering fails.
    fn render_uplift_comment(&self, text: &str, bug_id: BugId) -> Result<String, ClientError>;
}

/// Source of the run's credentials.
pub trait SecretProvider {
    /// Load and validate the secret stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the secret cannot be fetched or a
    /// required key is missing.
    fn load(&self, path: &str) -> Result<Secrets, ConfigError>;
}
