//! Benchmark profiles for spool rollout collection.
//!
//! - [`reference_profile`]: 64 envs in 8 lumps, 4 segments of 32 steps.
//! - [`stress_profile`]: 256 envs in 16 lumps, 8 segments of 64 steps.
//! - [`noisy_lumps`]: seeded random environment groups for a profile.

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use smallvec::smallvec;
use spool_core::RolloutConfig;
use spool_test_utils::NoisyEnvGroup;

/// Observation width used by both profiles.
pub const OBS_LEN: usize = 16;

/// Reference profile: 64 envs, 8 lumps, 128 steps per rollout.
pub fn reference_profile() -> RolloutConfig {
    RolloutConfig {
        num_envs: 64,
        steps_per_segment: 32,
        segments_per_env: 4,
        num_lumps: 8,
        obs_shape: smallvec![OBS_LEN],
        action_shape: smallvec![],
        feature_dim: 8,
    }
}

/// Stress profile: 256 envs, 16 lumps, 512 steps per rollout.
pub fn stress_profile() -> RolloutConfig {
    RolloutConfig {
        num_envs: 256,
        steps_per_segment: 64,
        segments_per_env: 8,
        num_lumps: 16,
        obs_shape: smallvec![OBS_LEN],
        action_shape: smallvec![],
        feature_dim: 8,
    }
}

/// One seeded [`NoisyEnvGroup`] per lump of `config`.
///
/// Lump `l` is seeded with `seed + l`, so runs are reproducible.
pub fn noisy_lumps(config: &RolloutConfig, seed: u64) -> Vec<NoisyEnvGroup> {
    (0..config.num_lumps as u64)
        .map(|l| NoisyEnvGroup::new(config.lump_stride(), config.obs_len(), 0.02, seed + l))
        .collect()
}
