//! Rollout error type.

use std::error::Error;
use std::fmt;

use spool_buffer::BufferError;
use spool_core::{EnvError, EpisodeInfoError, PolicyError};

/// Error from a rollout step, annotated with the failing lump.
///
/// Every variant aborts the rollout; the buffer contents are then
/// unspecified until the next successful `collect_rollout`.
#[derive(Debug, PartialEq)]
pub enum RolloutError {
    /// An environment group failed or returned a malformed batch.
    Env {
        /// Index of the lump (0-based).
        lump: usize,
        /// The underlying environment error.
        error: EnvError,
    },
    /// The policy failed or returned malformed output.
    Policy {
        /// Index of the lump whose observations were being evaluated.
        lump: usize,
        /// The underlying policy error.
        error: PolicyError,
    },
    /// A completed episode carried unusable metadata.
    EpisodeInfo {
        /// Index of the lump.
        lump: usize,
        /// Global index of the environment that reported it.
        env: usize,
        /// The underlying lookup error.
        error: EpisodeInfoError,
    },
    /// An environment step result carried no rewards.
    MissingRewards {
        /// Index of the lump.
        lump: usize,
    },
    /// Results were requested from a lump that was never reset or stepped.
    NotStarted {
        /// Index of the lump.
        lump: usize,
    },
    /// A rollout was started while the step counter was part-way through
    /// the previous one.
    Misaligned {
        /// Global step count at the attempted start.
        step: u64,
        /// Steps per rollout.
        total_steps: usize,
    },
    /// A buffer write failed.
    Buffer(BufferError),
}

impl fmt::Display for RolloutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Env { lump, error } => write!(f, "lump {lump}: {error}"),
            Self::Policy { lump, error } => write!(f, "lump {lump}: {error}"),
            Self::EpisodeInfo { lump, env, error } => {
                write!(f, "lump {lump}, env {env}: {error}")
            }
            Self::MissingRewards { lump } => {
                write!(f, "lump {lump}: step result carried no rewards")
            }
            Self::NotStarted { lump } => {
                write!(f, "lump {lump}: no step issued and no reset performed")
            }
            Self::Misaligned { step, total_steps } => write!(
                f,
                "rollout started at step {step}, not a multiple of {total_steps}"
            ),
            Self::Buffer(e) => write!(f, "buffer: {e}"),
        }
    }
}

impl Error for RolloutError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Env { error, .. } => Some(error),
            Self::Policy { error, .. } => Some(error),
            Self::EpisodeInfo { error, .. } => Some(error),
            Self::Buffer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BufferError> for RolloutError {
    fn from(e: BufferError) -> Self {
        Self::Buffer(e)
    }
}
