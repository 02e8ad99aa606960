use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::ids::{AnalysisId, BugId};
use super::user::UserProfile;

/// A saved tracker query as listed by the remote store (`GET /analysis`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: AnalysisId,
    pub name: String,
    #[serde(default)]
    pub parameters: QueryParams,
}

/// Tracker search parameters of an analysis.
///
/// The remote store hands these out either as a ready-made query string or
/// as a field map; both are forwarded verbatim to the tracker search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParams {
    Raw(String),
    Fields(BTreeMap<String, Value>),
}

impl Default for QueryParams {
    fn default() -> Self {
        Self::Fields(BTreeMap::new())
    }
}

impl QueryParams {
    /// Flatten a field map into `(key, value)` pairs. Arrays repeat the key.
    ///
    /// Returns `None` for [`QueryParams::Raw`], which is already encoded.
    #[must_use]
    pub fn pairs(&self) -> Option<Vec<(String, String)>> {
        let Self::Fields(fields) = self else {
            return None;
        };

        let mut pairs = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            match value {
                Value::Array(items) => {
                    pairs.extend(items.iter().map(|item| (key.clone(), scalar_text(item))));
                }
                Value::Null => {}
                other => pairs.push((key.clone(), scalar_text(other))),
            }
        }
        Some(pairs)
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Output of the external patch/review analyzer for one bug.
///
/// Only the fields the sync pipeline reads are typed; everything else is
/// carried through untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BugAnalysis {
    #[serde(default)]
    pub users: AnalysisUsers,
    #[serde(default)]
    pub uplift_comment: Option<UpliftComment>,
    #[serde(default)]
    pub uplift_author: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisUsers {
    #[serde(default)]
    pub creator: Value,
    #[serde(default)]
    pub assignee: Value,
    #[serde(default)]
    pub reviewers: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpliftComment {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The enriched record sent to the remote store (`POST /bugs`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPayload {
    #[serde(rename = "bugzilla_id")]
    pub bug_id: BugId,
    /// Analyses whose query currently matches the bug on the tracker.
    #[serde(rename = "analysis")]
    pub analyses: BTreeSet<AnalysisId>,
    pub payload: PayloadBody,
    pub payload_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadBody {
    pub url: String,
    pub bug: Value,
    pub analysis: BugAnalysis,
    pub users: Vec<UserProfile>,
}
