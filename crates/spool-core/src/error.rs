//! Error types reported by rollout collaborators.
//!
//! Environment groups return [`EnvError`], policies return
//! [`PolicyError`], and malformed episode metadata surfaces as
//! [`EpisodeInfoError`]. None of these are recovered from inside a
//! rollout; the engine wraps them with lump context and aborts.

use std::error::Error;
use std::fmt;

/// Errors from an [`EnvGroup`](crate::EnvGroup).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnvError {
    /// The group's worker is gone (thread exited or channel closed).
    Disconnected,
    /// A batch returned by the group has the wrong size.
    BatchSizeMismatch {
        /// Which part of the batch was wrong.
        what: &'static str,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        got: usize,
    },
    /// The environment implementation reported a failure.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "environment worker disconnected"),
            Self::BatchSizeMismatch {
                what,
                expected,
                got,
            } => write!(f, "{what}: expected {expected} elements, got {got}"),
            Self::Failed { reason } => write!(f, "environment failed: {reason}"),
        }
    }
}

impl Error for EnvError {}

/// Errors from a [`PolicyPort`](crate::PolicyPort).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PolicyError {
    /// Inference failed inside the policy.
    Failed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// A policy output tensor has the wrong size for the batch.
    OutputShape {
        /// Which output was wrong.
        what: &'static str,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        got: usize,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "policy failed: {reason}"),
            Self::OutputShape {
                what,
                expected,
                got,
            } => write!(f, "policy {what}: expected {expected} elements, got {got}"),
        }
    }
}

impl Error for PolicyError {}

/// Completed-episode metadata that cannot be interpreted.
///
/// Every completed episode must carry a numeric return (`"r"`) and length
/// (`"l"`); a missing key is a contract violation by the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EpisodeInfoError {
    /// A required key is absent.
    MissingKey {
        /// The missing key.
        key: String,
    },
    /// A key that must be numeric holds a non-numeric value.
    NotNumeric {
        /// The offending key.
        key: String,
    },
    /// A return is not finite, or a length is negative or not finite.
    OutOfRange {
        /// The offending key.
        key: String,
    },
}

impl fmt::Display for EpisodeInfoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey { key } => write!(f, "episode info is missing key '{key}'"),
            Self::NotNumeric { key } => write!(f, "episode info key '{key}' is not numeric"),
            Self::OutOfRange { key } => {
                write!(f, "episode info key '{key}' is out of range")
            }
        }
    }
}

impl Error for EpisodeInfoError {}
