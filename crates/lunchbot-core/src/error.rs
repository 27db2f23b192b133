use std::fmt;

use thiserror::Error;

use crate::model::PersonId;

/// Machine-readable error codes for operators and scripted callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    SamePerson,
    EmptyExtremum,
    GroupingBalanced,
    InvalidDate,
    DistributionExhausted,
    InvalidInput,
    ConfigParseError,
    LunchNotFound,
    LunchAlreadyOrganized,
    StorageIo,
    CorruptStore,
    LockContention,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::SamePerson => "E1001",
            Self::EmptyExtremum => "E1002",
            Self::GroupingBalanced => "E1003",
            Self::InvalidDate => "E2001",
            Self::DistributionExhausted => "E2002",
            Self::InvalidInput => "E2003",
            Self::ConfigParseError => "E2004",
            Self::LunchNotFound => "E3001",
            Self::LunchAlreadyOrganized => "E3002",
            Self::StorageIo => "E5001",
            Self::CorruptStore => "E5002",
            Self::LockContention => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SamePerson => "Pairwise query with the same person twice",
            Self::EmptyExtremum => "Extremum over an empty collection",
            Self::GroupingBalanced => "No group is below the target size",
            Self::InvalidDate => "Unparsable date",
            Self::DistributionExhausted => "Probability weights never exceed the draw",
            Self::InvalidInput => "Invalid input",
            Self::ConfigParseError => "Config file parse error",
            Self::LunchNotFound => "No lunch announced for that date",
            Self::LunchAlreadyOrganized => "Lunch already organized",
            Self::StorageIo => "Store read or write failed",
            Self::CorruptStore => "Store content is corrupt",
            Self::LockContention => "Lock contention",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::SamePerson | Self::EmptyExtremum | Self::GroupingBalanced => {
                Some("This is a caller bug. Report it with logs.")
            }
            Self::InvalidDate => Some("Use RFC 3339 timestamps, e.g. 2024-04-17T00:00:00Z."),
            Self::DistributionExhausted => Some("Pass weights that sum to 1."),
            Self::InvalidInput => None,
            Self::ConfigParseError => Some("Fix syntax in .lunchbot/config.toml and retry."),
            Self::LunchNotFound => Some("Run `!announce` before organizing."),
            Self::LunchAlreadyOrganized => {
                Some("Late sign-ups are placed incrementally; do not organize twice.")
            }
            Self::StorageIo => Some("Check disk space and write permissions."),
            Self::CorruptStore => Some("Restore the data directory from a backup."),
            Self::LockContention => Some("Retry after the other `lb` process releases its lock."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the ledger, the solver and the RNG layer.
#[derive(Debug, Error)]
pub enum LunchError {
    #[error("pairwise operation on {0} with itself")]
    SamePerson(PersonId),

    #[error("{0} over an empty collection")]
    EmptyExtremum(&'static str),

    #[error("no group is below the target size {target}")]
    GroupingBalanced { target: usize },

    #[error("invalid date {raw:?}")]
    InvalidDate { raw: String },

    #[error("draw {draw} not covered by cumulative weight {total}")]
    DistributionExhausted { draw: f64, total: f64 },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no lunch announced for {0}")]
    LunchNotFound(String),

    #[error("lunch {0} is already organized")]
    LunchAlreadyOrganized(String),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

impl LunchError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::SamePerson(_) => ErrorCode::SamePerson,
            Self::EmptyExtremum(_) => ErrorCode::EmptyExtremum,
            Self::GroupingBalanced { .. } => ErrorCode::GroupingBalanced,
            Self::InvalidDate { .. } => ErrorCode::InvalidDate,
            Self::DistributionExhausted { .. } => ErrorCode::DistributionExhausted,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::LunchNotFound(_) => ErrorCode::LunchNotFound,
            Self::LunchAlreadyOrganized(_) => ErrorCode::LunchAlreadyOrganized,
            Self::Store(err) => err.code(),
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

pub type Result<T, E = LunchError> = std::result::Result<T, E>;
