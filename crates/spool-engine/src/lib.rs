//! Segmented rollout collection.
//!
//! [`RolloutCollector`] drives a set of environment groups ("lumps") in
//! lockstep through the reset / step-async / step-wait protocol, queries a
//! policy for actions, and fills a [`SegmentBuffer`] one global step at a
//! time. At every segment boundary it captures one extra observation per
//! environment for bootstrapping, without issuing a new action.
//!
//! Supporting pieces:
//!
//! - [`LumpSlot`] / [`PendingResult`]: the per-lump async state machine.
//! - [`EpisodeRecord`]: completed-episode metadata validated at the boundary.
//! - [`EpisodeStats`]: rolling and cumulative episode statistics.
//! - [`RewardCombiner`]: clipped-extrinsic plus intrinsic training reward.
//! - [`ThreadedEnvGroup`]: runs any [`EnvGroup`] on a worker thread so its
//!   steps overlap with the collector's work on other lumps.
//!
//! [`SegmentBuffer`]: spool_buffer::SegmentBuffer
//! [`EnvGroup`]: spool_core::EnvGroup

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod collector;
pub mod episode;
pub mod error;
pub mod metrics;
pub mod pending;
pub mod reward;
pub mod stats;
pub mod threaded;

pub use collector::{RolloutCollector, RolloutView};
pub use episode::EpisodeRecord;
pub use error::RolloutError;
pub use metrics::RolloutMetrics;
pub use pending::{LumpSlot, PendingResult};
pub use reward::RewardCombiner;
pub use stats::{EpisodeStats, RollingWindow};
pub use threaded::ThreadedEnvGroup;
