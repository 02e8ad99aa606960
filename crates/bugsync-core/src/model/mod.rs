//! Domain types shared by the collector, reconciler, and collaborators.

pub mod analysis;
pub mod ids;
pub mod user;

pub use analysis::{
    Analysis, AnalysisPayload, AnalysisUsers, BugAnalysis, PayloadBody, QueryParams, UpliftComment,
};
pub use ids::{AnalysisId, BugId};
pub use user::{Role, RoleMap, UserProfile, UserRef};
