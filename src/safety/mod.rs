//! SQL safety validation module.
//!
//! Statically inspects model-generated SQL and accepts or rejects it before
//! execution. Only single, read-only SELECT statements over the projected
//! dataset table are accepted; everything else is rejected with a specific
//! taxonomy value. Validation is deterministic, idempotent, and never
//! attempts auto-repair.

mod validator;

pub use validator::SqlValidator;

use std::fmt;

/// Why a candidate was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// Statement is not a plain SELECT, or contains a mutating or
    /// schema-altering construct anywhere.
    UnsafeVerb,
    /// A second chained statement was detected.
    MultiStatement,
    /// A referenced table or column is not part of the loaded dataset.
    UnknownIdentifier,
    /// The statement could not be parsed at all.
    Malformed,
}

impl RejectionReason {
    /// Returns the stable wire name for this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsafeVerb => "unsafe_verb",
            Self::MultiStatement => "multi_statement",
            Self::UnknownIdentifier => "unknown_identifier",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A SQL statement produced by the language model, before and after safety
/// validation.
///
/// Owned by the pipeline invocation that created it and discarded after use.
/// A candidate only reaches the execution engine once `validated` is true.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlCandidate {
    /// The statement text (whitespace-normalized, trailing semicolons
    /// stripped by the generation adapter).
    pub raw_text: String,
    /// Whether the candidate passed safety validation.
    pub validated: bool,
    /// The rejection reason, when validation failed.
    pub rejection_reason: Option<RejectionReason>,
}

impl SqlCandidate {
    /// Creates an unvalidated candidate.
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self {
            raw_text: raw_text.into(),
            validated: false,
            rejection_reason: None,
        }
    }

    /// Marks the candidate as accepted.
    pub(crate) fn accept(mut self) -> Self {
        self.validated = true;
        self.rejection_reason = None;
        self
    }

    /// Marks the candidate as rejected with the given reason.
    pub(crate) fn reject(mut self, reason: RejectionReason) -> Self {
        self.validated = false;
        self.rejection_reason = Some(reason);
        self
    }
}
