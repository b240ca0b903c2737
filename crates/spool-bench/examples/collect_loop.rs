//! End-to-end collection loop example.
//!
//! Demonstrates: build config → threaded lumps → collect rollout → combine
//! rewards and update stats → gather a training slice → repeat.
//!
//! Run with `RUST_LOG=debug` to see per-lump resets and segment snapshots.

use spool_bench::{noisy_lumps, reference_profile};
use spool_core::{RewardConfig, StatsConfig};
use spool_engine::{RolloutCollector, ThreadedEnvGroup};
use spool_test_utils::EchoPolicy;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = reference_profile();
    let envs = noisy_lumps(&config, 42)
        .into_iter()
        .enumerate()
        .map(|(l, group)| ThreadedEnvGroup::spawn(&format!("spool-env-{l}"), group))
        .collect::<Result<Vec<_>, _>>()?;

    let mut collector = RolloutCollector::new(
        config.clone(),
        envs,
        RewardConfig {
            ext_coeff: 1.0,
            int_coeff: 0.5,
        },
        StatsConfig::default(),
    )?;
    let mut policy = EchoPolicy::new(config.action_len(), config.feature_dim);
    let intrinsic = vec![0.01f32; config.num_envs * config.total_steps()];

    for _ in 0..10 {
        collector.collect_rollout(&mut policy)?;
        let best = collector.update_after_rollout(&intrinsic)?;

        let metrics = collector.metrics();
        tracing::info!(
            rollout = collector.rollouts_completed(),
            episodes = metrics.episodes_completed,
            env_wait_us = metrics.env_wait_us,
            best = ?best,
            "Rollout digested"
        );
        for (name, value) in collector.stats().scalars() {
            tracing::info!(name = %name, value, "Scalar");
        }

        let minibatch: Vec<usize> = (0..config.num_envs).step_by(4).collect();
        let slice = collector.load_slice(&minibatch)?;
        tracing::info!(envs = slice.len(), "Loaded training slice");
    }

    Ok(())
}
