use std::fmt;

/// Machine-readable error codes attached to every logged failure.
///
/// The first digit groups the code by phase: configuration (1), collection
/// (2), payload assembly (3), remote mutation (4), internal (9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    MissingSecret,
    ConfigParseError,
    CollectionFailed,
    ListAnalysesFailed,
    AnalysisFailed,
    InvalidUserReference,
    UserLookupFailed,
    UpsertFailed,
    DeleteFailed,
    InconsistentState,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::MissingSecret => "E1001",
            Self::ConfigParseError => "E1002",
            Self::CollectionFailed => "E2001",
            Self::ListAnalysesFailed => "E2002",
            Self::AnalysisFailed => "E3001",
            Self::InvalidUserReference => "E3002",
            Self::UserLookupFailed => "E3003",
            Self::UpsertFailed => "E4001",
            Self::DeleteFailed => "E4002",
            Self::InconsistentState => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MissingSecret => "Required secret value missing",
            Self::ConfigParseError => "Config file parse error",
            Self::CollectionFailed => "Analysis collection failed",
            Self::ListAnalysesFailed => "Could not list remote analyses",
            Self::AnalysisFailed => "Patch analysis failed",
            Self::InvalidUserReference => "Invalid user reference",
            Self::UserLookupFailed => "User lookup failed",
            Self::UpsertFailed => "Remote upsert failed",
            Self::DeleteFailed => "Remote delete failed",
            Self::InconsistentState => "Bug observed on neither side",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::MissingSecret => {
                Some("Add bugzilla_url, bugzilla_token and api_url to the secret.")
            }
            Self::ConfigParseError => Some("Fix syntax in the bugsync config file and retry."),
            Self::CollectionFailed => {
                Some("The analysis is retried on the next run; check tracker and API reachability.")
            }
            Self::ListAnalysesFailed => Some("Check api_url and the client credentials."),
            Self::AnalysisFailed => Some("Run the analyzer by hand on the bug to see its output."),
            Self::InvalidUserReference => {
                Some("User references must be a string or an object with `id` or `email`.")
            }
            Self::UserLookupFailed => Some("Check the tracker token permissions for user lookup."),
            Self::UpsertFailed => None,
            Self::DeleteFailed => Some("The stale entry stays on the remote until the next run."),
            Self::InconsistentState => Some("Report a bug with the run logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
