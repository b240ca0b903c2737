//! Core types and traits for spool rollout collection.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the vocabulary shared by the buffer and engine crates: rollout
//! configuration, the collaborator traits ([`EnvGroup`], [`PolicyPort`]),
//! the batches exchanged with them, typed environment info, and the
//! collaborator error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod batch;
pub mod config;
pub mod error;
pub mod info;
pub mod traits;

pub use batch::{PolicyFeatures, PolicyOutput, StepBatch};
pub use config::{ConfigError, RewardConfig, RolloutConfig, Shape, StatsConfig};
pub use error::{EnvError, EpisodeInfoError, PolicyError};
pub use info::{EnvInfo, InfoDict, InfoValue};
pub use traits::{EnvGroup, PolicyPort};
