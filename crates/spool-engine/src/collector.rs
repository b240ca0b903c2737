//! The step driver.
//!
//! [`RolloutCollector`] owns one [`LumpSlot`] per environment group and a
//! [`SegmentBuffer`]. Each [`rollout_step`](RolloutCollector::rollout_step)
//! advances every lump by one global step:
//!
//! ```text
//!  for each lump (in index order)
//!      get() / reset()  ── batch (obs, reward of t-1, dones, infos)
//!      infos            ── completed episodes → accumulator
//!      policy(obs)      ── actions, values, neg_log_probs
//!      step_async(actions)
//!      buffer[lump, t] ← obs, dones, values, neg_log_probs, actions
//!      buffer.extrinsic[lump, t-1] ← reward          (t > 0)
//!  step_count += 1
//!  segment end?  for each lump: get() again (cached after the wait)
//!      next_observations[lump, segment] ← obs
//!      rollout end?  extrinsic[lump, t] ← reward,
//!                    done/value_at_rollout_end ← dones, policy(obs).values
//! ```
//!
//! The segment-end `get()` waits for the step issued above; the next
//! `rollout_step` then reads the same cached batch instead of waiting
//! again, so every issued step is waited on exactly once.

use std::time::Instant;

use spool_buffer::{BufferError, BufferSlice, SegmentBuffer, StepRecord, Tensor};
use spool_core::{
    ConfigError, EnvGroup, PolicyOutput, PolicyPort, RewardConfig, RolloutConfig, StatsConfig,
    StepBatch,
};

use crate::episode::EpisodeRecord;
use crate::error::RolloutError;
use crate::metrics::RolloutMetrics;
use crate::pending::{LumpSlot, PendingResult};
use crate::reward::RewardCombiner;
use crate::stats::EpisodeStats;

/// Borrowed view of the tensors filled by a rollout.
#[derive(Clone, Copy, Debug)]
pub struct RolloutView<'a> {
    /// `[num_envs, total_steps, *action_shape]`.
    pub actions: &'a Tensor<f32>,
    /// `[num_envs, total_steps, *obs_shape]`.
    pub observations: &'a Tensor<f32>,
    /// `[num_envs, segments_per_env, *obs_shape]`.
    pub next_observations: &'a Tensor<f32>,
}

/// Drives lumped environment groups and a policy to fill a segment buffer.
pub struct RolloutCollector<G> {
    config: RolloutConfig,
    lumps: Vec<LumpSlot<G>>,
    buffer: SegmentBuffer,
    combiner: RewardCombiner,
    stats: EpisodeStats,
    episodes: Vec<(u64, EpisodeRecord)>,
    step_count: u64,
    rollouts: u64,
    metrics: RolloutMetrics,
}

impl<G: EnvGroup> RolloutCollector<G> {
    /// Build a collector over `envs`, one group per lump.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if any config is invalid, if
    /// `envs.len() != num_lumps`, or if a group's size differs from
    /// `lump_stride`.
    pub fn new(
        config: RolloutConfig,
        envs: Vec<G>,
        reward: RewardConfig,
        stats: StatsConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if envs.len() != config.num_lumps {
            return Err(ConfigError::LumpCountMismatch {
                expected: config.num_lumps,
                got: envs.len(),
            });
        }
        let stride = config.lump_stride();
        for (lump, env) in envs.iter().enumerate() {
            if env.num_envs() != stride {
                return Err(ConfigError::LumpSizeMismatch {
                    lump,
                    expected: stride,
                    got: env.num_envs(),
                });
            }
        }

        Ok(Self {
            buffer: SegmentBuffer::new(&config)?,
            combiner: RewardCombiner::new(reward)?,
            stats: EpisodeStats::new(stats)?,
            lumps: envs
                .into_iter()
                .enumerate()
                .map(|(i, env)| LumpSlot::new(i, env))
                .collect(),
            episodes: Vec::new(),
            step_count: 0,
            rollouts: 0,
            metrics: RolloutMetrics::default(),
            config,
        })
    }

    /// Collect one full rollout of `total_steps` global steps.
    ///
    /// Clears the episode accumulator and the buffer's write coverage
    /// first. Episodes completed during the rollout stay in
    /// [`pending_episodes`](Self::pending_episodes) until
    /// [`update_stats`](Self::update_stats).
    ///
    /// # Errors
    ///
    /// Returns [`RolloutError::Misaligned`] without stepping if the step
    /// counter is not on a rollout boundary, which happens after a direct
    /// [`rollout_step`](Self::rollout_step) or an aborted rollout. Any
    /// collaborator failure aborts the rollout; the buffer contents are
    /// then unspecified.
    pub fn collect_rollout<P>(&mut self, policy: &mut P) -> Result<RolloutView<'_>, RolloutError>
    where
        P: PolicyPort + ?Sized,
    {
        let total_steps = self.config.total_steps();
        if self.step_count % total_steps as u64 != 0 {
            return Err(RolloutError::Misaligned {
                step: self.step_count,
                total_steps,
            });
        }

        let start = Instant::now();
        self.episodes.clear();
        self.metrics = RolloutMetrics::default();
        self.buffer.begin_rollout();

        for _ in 0..total_steps {
            self.rollout_step(policy)?;
        }

        self.metrics.total_us = start.elapsed().as_micros() as u64;
        self.rollouts += 1;
        tracing::info!(
            rollout = self.rollouts,
            steps = self.metrics.steps,
            episodes = self.metrics.episodes_completed,
            total_us = self.metrics.total_us,
            env_wait_us = self.metrics.env_wait_us,
            policy_us = self.metrics.policy_us,
            "Rollout collected"
        );

        Ok(RolloutView {
            actions: self.buffer.actions(),
            observations: self.buffer.observations(),
            next_observations: self.buffer.next_observations(),
        })
    }

    /// Advance every lump by one global step.
    ///
    /// # Errors
    ///
    /// Returns [`RolloutError`] on the first collaborator or buffer failure.
    pub fn rollout_step<P>(&mut self, policy: &mut P) -> Result<(), RolloutError>
    where
        P: PolicyPort + ?Sized,
    {
        let total = self.config.total_steps();
        let sps = self.config.steps_per_segment;
        let stride = self.config.lump_stride();
        let obs_len = self.config.obs_len();
        let action_len = self.config.action_len();
        let t = (self.step_count % total as u64) as usize;
        let first_step = self.step_count == 0;

        for lump in 0..self.lumps.len() {
            let envs = self.config.lump_range(lump);
            let slot = &mut self.lumps[lump];

            let wait = Instant::now();
            let batch = if first_step {
                tracing::debug!(lump, envs = stride, "Resetting environment group");
                slot.reset()?
            } else {
                slot.get()?
            };
            self.metrics.env_wait_us += wait.elapsed().as_micros() as u64;
            check_batch(lump, batch, stride, obs_len)?;

            for (i, info) in batch.infos.iter().enumerate() {
                let record = EpisodeRecord::from_info(info).map_err(|error| {
                    RolloutError::EpisodeInfo {
                        lump,
                        env: envs.start + i,
                        error,
                    }
                })?;
                if let Some(record) = record {
                    self.episodes.push((self.step_count, record));
                    self.metrics.episodes_completed += 1;
                }
            }

            let output = query_policy(
                policy,
                lump,
                &batch.observations,
                stride,
                action_len,
                &mut self.metrics,
            )?;

            let batch = slot
                .step_async(&output.actions)?
                .ok_or(RolloutError::NotStarted { lump })?;

            self.buffer.record_step(
                envs.clone(),
                t,
                &StepRecord {
                    observations: &batch.observations,
                    dones: &batch.dones,
                    values: &output.values,
                    neg_log_probs: &output.neg_log_probs,
                    actions: &output.actions,
                },
            )?;
            if t > 0 {
                let rewards = batch
                    .rewards
                    .as_deref()
                    .ok_or(RolloutError::MissingRewards { lump })?;
                self.buffer.record_reward(envs.clone(), t - 1, rewards)?;
            }
            let features = policy.features();
            self.buffer
                .record_features(envs, t, features.features, features.hidden)?;
        }

        self.step_count += 1;
        self.metrics.steps += 1;

        if t % sps == sps - 1 {
            self.snapshot_segment_end(policy, t)?;
        }
        Ok(())
    }

    /// Retrieve one more result per lump without acting, storing it as the
    /// next observation of the segment ending at `t`. At the end of the
    /// rollout also record the final reward and the bootstrap row.
    fn snapshot_segment_end<P>(&mut self, policy: &mut P, t: usize) -> Result<(), RolloutError>
    where
        P: PolicyPort + ?Sized,
    {
        let segment = t / self.config.steps_per_segment;
        let rollout_end = t == self.config.total_steps() - 1;
        let stride = self.config.lump_stride();
        let obs_len = self.config.obs_len();
        let action_len = self.config.action_len();

        for lump in 0..self.lumps.len() {
            let envs = self.config.lump_range(lump);
            let slot = &mut self.lumps[lump];

            let wait = Instant::now();
            let batch = slot.get()?;
            self.metrics.env_wait_us += wait.elapsed().as_micros() as u64;
            check_batch(lump, batch, stride, obs_len)?;

            self.buffer
                .record_segment_end(envs.clone(), segment, &batch.observations)?;

            if rollout_end {
                let rewards = batch
                    .rewards
                    .as_deref()
                    .ok_or(RolloutError::MissingRewards { lump })?;
                self.buffer.record_reward(envs.clone(), t, rewards)?;
                let output = query_policy(
                    policy,
                    lump,
                    &batch.observations,
                    stride,
                    action_len,
                    &mut self.metrics,
                )?;
                self.buffer
                    .record_rollout_end(envs, &batch.dones, &output.values)?;
            }
        }

        tracing::debug!(
            segment,
            rollout_end,
            step = self.step_count,
            "Segment end snapshot"
        );
        Ok(())
    }

    // ── Post-rollout ────────────────────────────────────────────────

    /// Combine `intrinsic` with the buffered extrinsic rewards into the
    /// training rewards.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::LengthMismatch`] unless `intrinsic` covers
    /// `[num_envs, total_steps]`.
    pub fn update_training_rewards(&mut self, intrinsic: &[f32]) -> Result<(), BufferError> {
        self.combiner.apply(&mut self.buffer, intrinsic)
    }

    /// Digest the episodes completed during the last rollout.
    ///
    /// Returns the largest return among them, if any.
    pub fn update_stats(&mut self) -> Option<f64> {
        self.stats.update(&mut self.episodes)
    }

    /// [`update_training_rewards`](Self::update_training_rewards) then
    /// [`update_stats`](Self::update_stats).
    ///
    /// # Errors
    ///
    /// Returns the reward-combination error; stats are not updated then.
    pub fn update_after_rollout(&mut self, intrinsic: &[f32]) -> Result<Option<f64>, BufferError> {
        self.update_training_rewards(intrinsic)?;
        Ok(self.update_stats())
    }

    /// Gather training inputs for the given environments.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfRange`] for an unknown env index.
    pub fn load_slice(&self, indices: &[usize]) -> Result<BufferSlice, BufferError> {
        self.buffer.load_slice(indices)
    }

    // ── Accessors ───────────────────────────────────────────────────

    /// The rollout configuration.
    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// The segment buffer.
    pub fn buffer(&self) -> &SegmentBuffer {
        &self.buffer
    }

    /// Episode statistics.
    pub fn stats(&self) -> &EpisodeStats {
        &self.stats
    }

    /// The reward combiner.
    pub fn combiner(&self) -> &RewardCombiner {
        &self.combiner
    }

    /// Episodes completed in the current rollout, tagged with the global
    /// step at which they were observed.
    pub fn pending_episodes(&self) -> &[(u64, EpisodeRecord)] {
        &self.episodes
    }

    /// Global steps executed since construction.
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Rollouts completed since construction.
    pub fn rollouts_completed(&self) -> u64 {
        self.rollouts
    }

    /// Metrics of the most recent rollout.
    pub fn metrics(&self) -> &RolloutMetrics {
        &self.metrics
    }

    /// Cache state of `lump`, or `None` for an unknown lump.
    pub fn lump_state(&self, lump: usize) -> Option<&PendingResult> {
        self.lumps.get(lump).map(LumpSlot::state)
    }

    /// Consume the collector, returning the environment groups in lump order.
    pub fn into_envs(self) -> Vec<G> {
        self.lumps.into_iter().map(LumpSlot::into_inner).collect()
    }
}

fn check_batch(
    lump: usize,
    batch: &StepBatch,
    stride: usize,
    obs_len: usize,
) -> Result<(), RolloutError> {
    batch.validate(stride, obs_len).map_err(|error| {
        tracing::warn!(lump, %error, "Environment batch has the wrong shape");
        RolloutError::Env { lump, error }
    })
}

fn query_policy<P>(
    policy: &mut P,
    lump: usize,
    observations: &[f32],
    batch: usize,
    action_len: usize,
    metrics: &mut RolloutMetrics,
) -> Result<PolicyOutput, RolloutError>
where
    P: PolicyPort + ?Sized,
{
    let start = Instant::now();
    let output = policy
        .select_action(observations, batch)
        .map_err(|error| RolloutError::Policy { lump, error })?;
    metrics.policy_us += start.elapsed().as_micros() as u64;
    output
        .validate(batch, action_len)
        .map_err(|error| RolloutError::Policy { lump, error })?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;
    use spool_core::{EnvError, EnvInfo};
    use spool_test_utils::{CountingEnvGroup, DonePolicy, EchoPolicy};

    fn config(num_envs: usize, num_lumps: usize) -> RolloutConfig {
        RolloutConfig {
            num_envs,
            steps_per_segment: 3,
            segments_per_env: 2,
            num_lumps,
            obs_shape: smallvec![2],
            action_shape: smallvec![],
            feature_dim: 1,
        }
    }

    fn collector(
        num_envs: usize,
        num_lumps: usize,
        done: DonePolicy,
    ) -> RolloutCollector<CountingEnvGroup> {
        let cfg = config(num_envs, num_lumps);
        let stride = cfg.lump_stride();
        let envs = (0..num_lumps)
            .map(|l| CountingEnvGroup::new(l * stride, stride, 2, done.clone()))
            .collect();
        RolloutCollector::new(cfg, envs, RewardConfig::default(), StatsConfig::default()).unwrap()
    }

    /// Two-env group whose step results can drop rewards or come back
    /// with too few dones.
    #[derive(Default)]
    struct ScriptedGroup {
        waits: u64,
        rewardless_from: Option<u64>,
        short_dones: bool,
    }

    impl EnvGroup for ScriptedGroup {
        fn num_envs(&self) -> usize {
            2
        }

        fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
            Ok(vec![0.0; 4])
        }

        fn step_async(&mut self, _actions: &[f32]) -> Result<(), EnvError> {
            Ok(())
        }

        fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
            self.waits += 1;
            let rewardless = self.rewardless_from.is_some_and(|from| self.waits >= from);
            Ok(StepBatch {
                observations: vec![self.waits as f32; 4],
                rewards: (!rewardless).then(|| vec![1.0; 2]),
                dones: vec![false; if self.short_dones { 1 } else { 2 }],
                infos: vec![EnvInfo::new(); 2],
            })
        }
    }

    fn scripted(second: ScriptedGroup) -> RolloutCollector<ScriptedGroup> {
        let envs = vec![ScriptedGroup::default(), second];
        RolloutCollector::new(
            config(4, 2),
            envs,
            RewardConfig::default(),
            StatsConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn construction_checks_lump_count_and_size() {
        let cfg = config(4, 2);
        let one = vec![CountingEnvGroup::new(0, 2, 2, DonePolicy::Never)];
        assert!(matches!(
            RolloutCollector::new(cfg.clone(), one, RewardConfig::default(), StatsConfig::default()),
            Err(ConfigError::LumpCountMismatch {
                expected: 2,
                got: 1
            })
        ));

        let uneven = vec![
            CountingEnvGroup::new(0, 2, 2, DonePolicy::Never),
            CountingEnvGroup::new(2, 3, 2, DonePolicy::Never),
        ];
        assert!(matches!(
            RolloutCollector::new(cfg, uneven, RewardConfig::default(), StatsConfig::default()),
            Err(ConfigError::LumpSizeMismatch { lump: 1, .. })
        ));
    }

    #[test]
    fn first_step_resets_and_records_all_done() {
        let mut c = collector(4, 2, DonePolicy::Never);
        let mut policy = EchoPolicy::new(1, 1);
        c.rollout_step(&mut policy).unwrap();

        assert_eq!(c.step_count(), 1);
        let dones = c.buffer().dones();
        assert!((0..4).all(|e| dones.cell(e, 0) == [true]));
        assert_eq!(c.lump_state(0), Some(&PendingResult::Stepping));
        assert_eq!(policy.calls(), 2);
    }

    #[test]
    fn rollout_fills_every_cell_once() {
        let mut c = collector(4, 2, DonePolicy::Never);
        let mut policy = EchoPolicy::new(1, 1);
        c.collect_rollout(&mut policy).unwrap();
        assert!(c.buffer().is_complete());
        assert_eq!(c.step_count(), 6);
        assert_eq!(c.rollouts_completed(), 1);
        assert_eq!(c.metrics().steps, 6);
        // Six acting queries per lump plus one bootstrap query per lump.
        assert_eq!(policy.calls(), 14);
    }

    #[test]
    fn second_rollout_continues_without_reset() {
        let mut c = collector(2, 1, DonePolicy::Never);
        let mut policy = EchoPolicy::new(1, 1);
        c.collect_rollout(&mut policy).unwrap();
        c.collect_rollout(&mut policy).unwrap();
        assert!(c.buffer().is_complete());
        assert_eq!(c.rollouts_completed(), 2);
        let envs = c.into_envs();
        assert_eq!(envs[0].resets(), 1);
        assert_eq!(envs[0].waits(), 12);
    }

    #[test]
    fn episodes_accumulate_then_drain_into_stats() {
        let mut c = collector(2, 1, DonePolicy::Every(2));
        let mut policy = EchoPolicy::new(1, 1);
        c.collect_rollout(&mut policy).unwrap();
        let pending = c.pending_episodes().len();
        assert!(pending > 0);
        assert_eq!(c.metrics().episodes_completed, pending as u64);

        let best = c.update_after_rollout(&[0.0; 12]).unwrap();
        assert!(best.is_some());
        assert!(c.pending_episodes().is_empty());
        assert_eq!(c.stats().episode_count(), pending as u64);
    }

    #[test]
    fn env_failure_is_tagged_with_lump() {
        let cfg = config(4, 2);
        let envs = vec![
            CountingEnvGroup::new(0, 2, 2, DonePolicy::Never),
            CountingEnvGroup::new(2, 2, 2, DonePolicy::Never).fail_at_step(1),
        ];
        let mut c =
            RolloutCollector::new(cfg, envs, RewardConfig::default(), StatsConfig::default())
                .unwrap();
        let mut policy = EchoPolicy::new(1, 1);
        let err = c.collect_rollout(&mut policy).unwrap_err();
        assert!(matches!(
            err,
            RolloutError::Env {
                lump: 1,
                error: EnvError::Failed { .. }
            }
        ));
    }

    #[test]
    fn wrong_policy_width_is_rejected() {
        let mut c = collector(2, 1, DonePolicy::Never);
        let mut policy = EchoPolicy::new(3, 1);
        let err = c.rollout_step(&mut policy).unwrap_err();
        assert!(matches!(err, RolloutError::Policy { lump: 0, .. }));
    }

    #[test]
    fn rollout_refuses_to_start_mid_rollout() {
        let mut c = collector(2, 1, DonePolicy::Never);
        let mut policy = EchoPolicy::new(1, 1);
        c.rollout_step(&mut policy).unwrap();

        let err = c.collect_rollout(&mut policy).unwrap_err();
        assert_eq!(
            err,
            RolloutError::Misaligned {
                step: 1,
                total_steps: 6
            }
        );
        assert_eq!(c.step_count(), 1);
        assert_eq!(policy.calls(), 1);

        // Finishing the rollout by hand realigns the counter.
        for _ in 0..5 {
            c.rollout_step(&mut policy).unwrap();
        }
        c.collect_rollout(&mut policy).unwrap();
        assert!(c.buffer().is_complete());
        assert_eq!(c.step_count(), 12);
    }

    #[test]
    fn rewardless_step_is_rejected_mid_rollout() {
        let mut c = scripted(ScriptedGroup {
            rewardless_from: Some(1),
            ..ScriptedGroup::default()
        });
        let mut policy = EchoPolicy::new(1, 1);
        let err = c.collect_rollout(&mut policy).unwrap_err();
        assert_eq!(err, RolloutError::MissingRewards { lump: 1 });
        assert_eq!(c.step_count(), 1);
    }

    #[test]
    fn rewardless_final_step_is_rejected_at_rollout_end() {
        // The sixth wait is the rollout-end snapshot of a 3x2 rollout.
        let mut c = scripted(ScriptedGroup {
            rewardless_from: Some(6),
            ..ScriptedGroup::default()
        });
        let mut policy = EchoPolicy::new(1, 1);
        let err = c.collect_rollout(&mut policy).unwrap_err();
        assert_eq!(err, RolloutError::MissingRewards { lump: 1 });
        assert_eq!(c.step_count(), 6);
        assert_eq!(c.rollouts_completed(), 0);
    }

    #[test]
    fn short_dones_are_rejected_with_lump() {
        let mut c = scripted(ScriptedGroup {
            short_dones: true,
            ..ScriptedGroup::default()
        });
        let mut policy = EchoPolicy::new(1, 1);
        let err = c.collect_rollout(&mut policy).unwrap_err();
        assert_eq!(
            err,
            RolloutError::Env {
                lump: 1,
                error: EnvError::BatchSizeMismatch {
                    what: "dones",
                    expected: 2,
                    got: 1
                }
            }
        );
    }
}
