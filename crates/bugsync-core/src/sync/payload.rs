//! Per-bug payload assembly.
//!
//! Steps, each of which can fail the bug on its own:
//!
//! 1. run the external analyzer,
//! 2. render the uplift-request comment, when there is one,
//! 3. collect user references and the roles they hold,
//! 4. resolve all of them with one batched tracker lookup,
//! 5. assemble the payload and hash the raw record.

use tracing::debug;

use crate::client::{Analyzer, ClientError, Tracker};
use crate::error::ErrorCode;
use crate::hash::content_hash;
use crate::model::user::InvalidUserReference;
use crate::model::{AnalysisPayload, BugAnalysis, BugId, PayloadBody, Role, RoleMap, UserProfile, UserRef};
use crate::sync::state::BugSyncState;

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("bug {0} has no tracker record")]
    MissingRecord(BugId),

    #[error("patch analysis failed on {bug_id}: {source}")]
    Analysis {
        bug_id: BugId,
        #[source]
        source: ClientError,
    },

    #[error("uplift comment rendering failed on {bug_id}: {source}")]
    Render {
        bug_id: BugId,
        #[source]
        source: ClientError,
    },

    #[error("bug {bug_id}: {source}")]
    InvalidUser {
        bug_id: BugId,
        #[source]
        source: InvalidUserReference,
    },

    #[error("user lookup failed on {bug_id}: {source}")]
    UserLookup {
        bug_id: BugId,
        #[source]
        source: ClientError,
    },
}

impl PayloadError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingRecord(_) => ErrorCode::InconsistentState,
            Self::Analysis { .. } | Self::Render { .. } => ErrorCode::AnalysisFailed,
            Self::InvalidUser { .. } => ErrorCode::InvalidUserReference,
            Self::UserLookup { .. } => ErrorCode::UserLookupFailed,
        }
    }
}

/// Collect every user the analysis mentions, with the roles they hold.
///
/// # Errors
///
/// Returns [`InvalidUserReference`] on the first reference with an
/// unsupported shape.
pub fn extract_roles(analysis: &BugAnalysis) -> Result<RoleMap, InvalidUserReference> {
    let mut roles = RoleMap::new();
    let mut add = |value: &serde_json::Value, role: Role| -> Result<(), InvalidUserReference> {
        if let Some(user) = UserRef::from_json(value)? {
            roles.add(&user, role);
        }
        Ok(())
    };

    add(&analysis.users.creator, Role::Creator)?;
    add(&analysis.users.assignee, Role::Assignee)?;
    for reviewer in &analysis.users.reviewers {
        add(reviewer, Role::Reviewer)?;
    }
    add(&analysis.uplift_author, Role::UpliftAuthor)?;

    Ok(roles)
}

/// Resolve every key in `roles` to a tracker profile tagged with its roles.
///
/// No tracker call is made when `roles` is empty.
///
/// # Errors
///
/// Propagates the tracker's [`ClientError`].
pub fn resolve_users<T>(tracker: &T, roles: &RoleMap) -> Result<Vec<UserProfile>, ClientError>
where
    T: Tracker + ?Sized,
{
    if roles.is_empty() {
        return Ok(Vec::new());
    }

    let mut users = tracker.lookup_users(&roles.keys())?;
    for user in &mut users {
        user.roles = roles.roles_for(user);
    }
    Ok(users)
}

/// Build the payload for one bug that currently matches at least one query.
///
/// # Errors
///
/// Returns a [`PayloadError`] describing the first step that failed. Nothing
/// is sent anywhere by this function.
pub fn build_payload<T, A>(
    state: &BugSyncState,
    tracker: &T,
    analyzer: &A,
) -> Result<AnalysisPayload, PayloadError>
where
    T: Tracker + ?Sized,
    A: Analyzer + ?Sized,
{
    let bug_id = state.bug_id;
    let record = state
        .raw_record
        .as_ref()
        .ok_or(PayloadError::MissingRecord(bug_id))?;
    let payload_hash = content_hash(record);

    let mut analysis = analyzer
        .analyze(bug_id)
        .map_err(|source| PayloadError::Analysis { bug_id, source })?;

    if let Some(comment) = analysis.uplift_comment.as_mut() {
        let html = analyzer
            .render_uplift_comment(&comment.text, bug_id)
            .map_err(|source| PayloadError::Render { bug_id, source })?;
        comment.html = Some(html);
    }

    let roles =
        extract_roles(&analysis).map_err(|source| PayloadError::InvalidUser { bug_id, source })?;
    let users = resolve_users(tracker, &roles)
        .map_err(|source| PayloadError::UserLookup { bug_id, source })?;
    debug!(bug_id = %bug_id, users = users.len(), hash = %payload_hash, "Assembled payload");

    Ok(AnalysisPayload {
        bug_id,
        analyses: state.analyses_on_tracker.clone(),
        payload: PayloadBody {
            url: tracker.bug_url(bug_id),
            bug: record.clone(),
            analysis,
            users,
        },
        payload_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis(value: serde_json::Value) -> BugAnalysis {
        serde_json::from_value(value).expect("analysis json")
    }

    #[test]
    fn assignee_and_reviewer_collapse() {
        let parsed = analysis(json!({
            "users": {
                "creator": {"email": "creator@example.com"},
                "assignee": "dev@example.com",
                "reviewers": ["dev@example.com", {"id": 12}]
            },
            "uplift_author": null
        }));

        let roles = extract_roles(&parsed).expect("roles");
        assert_eq!(roles.len(), 3);
        assert_eq!(roles.get("dev@example.com"), Some(&[Role::Assignee, Role::Reviewer][..]));
        assert_eq!(roles.get("creator@example.com"), Some(&[Role::Creator][..]));
        assert_eq!(roles.get("12"), Some(&[Role::Reviewer][..]));
    }

    #[test]
    fn uplift_author_is_collected() {
        let parsed = analysis(json!({
            "users": {"creator": "a@example.com", "reviewers": []},
            "uplift_author": {"id": "a@example.com", "real_name": "A"}
        }));

        let roles = extract_roles(&parsed).expect("roles");
        assert_eq!(
            roles.get("a@example.com"),
            Some(&[Role::Creator, Role::UpliftAuthor][..])
        );
    }

    #[test]
    fn malformed_reviewer_fails_extraction() {
        let parsed = analysis(json!({
            "users": {"creator": "a@example.com", "reviewers": [42]},
        }));
        let err = extract_roles(&parsed).expect_err("42 is not a user reference");
        assert_eq!(err.reason, "unsupported format");
    }
}
