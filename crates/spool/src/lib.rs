//! Spool: segmented rollout collection for vectorized reinforcement learning.
//!
//! This is the top-level facade crate that re-exports the public API from all
//! spool sub-crates. For most users, adding `spool` as a single dependency is
//! sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use spool::prelude::*;
//! use smallvec::smallvec;
//!
//! // Two environments whose observation is the step count.
//! struct Clock { t: f32 }
//! impl EnvGroup for Clock {
//!     fn num_envs(&self) -> usize { 2 }
//!     fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
//!         self.t = 0.0;
//!         Ok(vec![0.0; 2])
//!     }
//!     fn step_async(&mut self, _actions: &[f32]) -> Result<(), EnvError> {
//!         Ok(())
//!     }
//!     fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
//!         self.t += 1.0;
//!         Ok(StepBatch {
//!             observations: vec![self.t; 2],
//!             rewards: Some(vec![1.0; 2]),
//!             dones: vec![false; 2],
//!             infos: vec![EnvInfo::new(); 2],
//!         })
//!     }
//! }
//!
//! // A policy that always picks action 0 with value 0.
//! struct Zero;
//! impl PolicyPort for Zero {
//!     fn select_action(&mut self, _obs: &[f32], batch: usize) -> Result<PolicyOutput, PolicyError> {
//!         Ok(PolicyOutput {
//!             actions: vec![0.0; batch],
//!             values: vec![0.0; batch],
//!             neg_log_probs: vec![0.0; batch],
//!         })
//!     }
//!     fn features(&self) -> PolicyFeatures<'_> { PolicyFeatures::default() }
//! }
//!
//! let config = RolloutConfig {
//!     num_envs: 2,
//!     steps_per_segment: 4,
//!     segments_per_env: 2,
//!     num_lumps: 1,
//!     obs_shape: smallvec![1],
//!     action_shape: smallvec![],
//!     feature_dim: 0,
//! };
//! let envs = vec![Clock { t: 0.0 }];
//! let mut collector =
//!     RolloutCollector::new(config, envs, RewardConfig::default(), StatsConfig::default()).unwrap();
//!
//! let view = collector.collect_rollout(&mut Zero).unwrap();
//! assert_eq!(view.next_observations.cell(0, 0), &[4.0]);
//! assert!(collector.buffer().is_complete());
//! collector.update_after_rollout(&[0.0; 16]).unwrap();
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `spool-core` | Configs, collaborator traits, batches, env info, errors |
//! | [`buffer`] | `spool-buffer` | `Tensor`, `SegmentBuffer`, `BufferSlice` |
//! | [`engine`] | `spool-engine` | `RolloutCollector`, episode stats, reward combiner, threaded lumps |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Configs, collaborator traits and shared types (`spool-core`).
///
/// Implement [`types::EnvGroup`] for an environment group and
/// [`types::PolicyPort`] for a policy.
pub use spool_core as types;

/// Fixed-shape rollout storage (`spool-buffer`).
///
/// [`buffer::SegmentBuffer`] holds one rollout; [`buffer::BufferSlice`] is
/// the training read interface.
pub use spool_buffer as buffer;

/// Rollout collection (`spool-engine`).
///
/// [`engine::RolloutCollector`] drives lumps through a rollout;
/// [`engine::ThreadedEnvGroup`] moves a lump onto its own thread.
pub use spool_engine as engine;

/// Common imports for typical spool usage.
///
/// ```rust
/// use spool::prelude::*;
/// ```
pub mod prelude {
    // Configuration
    pub use spool_core::{RewardConfig, RolloutConfig, StatsConfig};

    // Collaborators
    pub use spool_core::{EnvGroup, EnvInfo, InfoValue, PolicyFeatures, PolicyOutput, PolicyPort, StepBatch};

    // Errors
    pub use spool_core::{ConfigError, EnvError, EpisodeInfoError, PolicyError};
    pub use spool_buffer::BufferError;
    pub use spool_engine::RolloutError;

    // Buffer
    pub use spool_buffer::{BufferSlice, SegmentBuffer, Tensor};

    // Engine
    pub use spool_engine::{
        EpisodeRecord, EpisodeStats, RewardCombiner, RolloutCollector, RolloutMetrics,
        RolloutView, ThreadedEnvGroup,
    };
}
