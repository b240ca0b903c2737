//! The per-rollout segment buffer.
//!
//! [`SegmentBuffer`] is allocated once from a [`RolloutConfig`] and then
//! reused for every rollout. The collector writes one lump slice per call
//! (`record_*` methods); training reads whole tensors or gathers env rows
//! with [`load_slice`](SegmentBuffer::load_slice).
//!
//! # Reward timing
//!
//! The reward for the action taken at step `t` is only known when the
//! environment result for step `t + 1` is retrieved, so
//! `extrinsic_rewards[.., t]` is written one step late. The reward for the
//! final step is written by the rollout-end snapshot.
//!
//! # Write coverage
//!
//! Every [`record_step`](SegmentBuffer::record_step) increments a
//! per-`[env, step]` counter that [`begin_rollout`](SegmentBuffer::begin_rollout)
//! clears. A completed rollout has every counter at exactly 1.

use std::ops::Range;

use spool_core::{ConfigError, RolloutConfig};

use crate::error::BufferError;
use crate::slice::BufferSlice;
use crate::tensor::Tensor;

/// One lump's worth of per-step data, as written at a single step index.
#[derive(Clone, Copy, Debug)]
pub struct StepRecord<'a> {
    /// Observations seen before acting, `[lump, *obs_shape]`.
    pub observations: &'a [f32],
    /// Done flags accompanying those observations, `[lump]`.
    pub dones: &'a [bool],
    /// Value estimates, `[lump]`.
    pub values: &'a [f32],
    /// Negative log-probabilities of the chosen actions, `[lump]`.
    pub neg_log_probs: &'a [f32],
    /// Chosen actions, `[lump, *action_shape]`.
    pub actions: &'a [f32],
}

/// Fixed-shape storage for one rollout.
pub struct SegmentBuffer {
    config: RolloutConfig,
    observations: Tensor<f32>,
    next_observations: Tensor<f32>,
    actions: Tensor<f32>,
    values: Tensor<f32>,
    neg_log_probs: Tensor<f32>,
    dones: Tensor<bool>,
    extrinsic_rewards: Tensor<f32>,
    intrinsic_rewards: Tensor<f32>,
    training_rewards: Tensor<f32>,
    done_at_rollout_end: Tensor<bool>,
    value_at_rollout_end: Tensor<f32>,
    policy_features: Tensor<f32>,
    policy_hidden: Tensor<f32>,
    write_counts: Tensor<u32>,
}

impl SegmentBuffer {
    /// Allocate every tensor for `config`.
    ///
    /// # Errors
    ///
    /// Returns the [`ConfigError`] from [`RolloutConfig::validate`].
    pub fn new(config: &RolloutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let envs = config.num_envs;
        let steps = config.total_steps();
        let segs = config.segments_per_env;

        Ok(Self {
            observations: Tensor::zeros(&with_trailing(&[envs, steps], &config.obs_shape)),
            next_observations: Tensor::zeros(&with_trailing(&[envs, segs], &config.obs_shape)),
            actions: Tensor::zeros(&with_trailing(&[envs, steps], &config.action_shape)),
            values: Tensor::zeros(&[envs, steps]),
            neg_log_probs: Tensor::zeros(&[envs, steps]),
            dones: Tensor::zeros(&[envs, steps]),
            extrinsic_rewards: Tensor::zeros(&[envs, steps]),
            intrinsic_rewards: Tensor::zeros(&[envs, steps]),
            training_rewards: Tensor::zeros(&[envs, steps]),
            done_at_rollout_end: Tensor::zeros(&[envs]),
            value_at_rollout_end: Tensor::zeros(&[envs]),
            policy_features: Tensor::zeros(&[envs, config.steps_per_segment, config.feature_dim]),
            policy_hidden: Tensor::zeros(&[envs, config.steps_per_segment, config.feature_dim]),
            write_counts: Tensor::zeros(&[envs, steps]),
            config: config.clone(),
        })
    }

    /// The configuration the buffer was allocated for.
    pub fn config(&self) -> &RolloutConfig {
        &self.config
    }

    /// Start a new rollout: clear write coverage.
    ///
    /// Tensor contents are left in place and overwritten by the rollout.
    pub fn begin_rollout(&mut self) {
        self.write_counts.fill(0);
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Write one lump's observations, dones, values, log-probs and actions
    /// at step `t`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] if `envs` or `t` is out of range or a slice
    /// has the wrong length. Nothing is written on error.
    pub fn record_step(
        &mut self,
        envs: Range<usize>,
        t: usize,
        step: &StepRecord<'_>,
    ) -> Result<(), BufferError> {
        self.check_step(&envs, t)?;
        let n = envs.len();
        expect_len("observations", n * self.config.obs_len(), step.observations.len())?;
        expect_len("dones", n, step.dones.len())?;
        expect_len("values", n, step.values.len())?;
        expect_len("neg_log_probs", n, step.neg_log_probs.len())?;
        expect_len("actions", n * self.config.action_len(), step.actions.len())?;

        self.observations
            .write_column("observations", envs.clone(), t, step.observations)?;
        self.dones.write_column("dones", envs.clone(), t, step.dones)?;
        self.values.write_column("values", envs.clone(), t, step.values)?;
        self.neg_log_probs
            .write_column("neg_log_probs", envs.clone(), t, step.neg_log_probs)?;
        self.actions
            .write_column("actions", envs.clone(), t, step.actions)?;
        for env in envs {
            self.write_counts.cell_mut(env, t)[0] += 1;
        }
        Ok(())
    }

    /// Write the extrinsic reward earned by the action taken at step `t`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] on an out-of-range index or wrong length.
    pub fn record_reward(
        &mut self,
        envs: Range<usize>,
        t: usize,
        rewards: &[f32],
    ) -> Result<(), BufferError> {
        self.extrinsic_rewards
            .write_column("extrinsic_rewards", envs, t, rewards)
    }

    /// Write policy diagnostics for step `t` into slot
    /// `t % steps_per_segment`.
    ///
    /// Ignored when `feature_dim == 0`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] on an out-of-range index or wrong length.
    pub fn record_features(
        &mut self,
        envs: Range<usize>,
        t: usize,
        features: &[f32],
        hidden: &[f32],
    ) -> Result<(), BufferError> {
        if self.config.feature_dim == 0 {
            return Ok(());
        }
        let slot = t % self.config.steps_per_segment;
        self.policy_features
            .write_column("policy_features", envs.clone(), slot, features)?;
        self.policy_hidden
            .write_column("policy_hidden", envs, slot, hidden)
    }

    /// Write the observation one step past the end of `segment`.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] on an out-of-range index or wrong length.
    pub fn record_segment_end(
        &mut self,
        envs: Range<usize>,
        segment: usize,
        observations: &[f32],
    ) -> Result<(), BufferError> {
        self.next_observations
            .write_column("next_observations", envs, segment, observations)
    }

    /// Write the bootstrap done flags and value estimates for the step
    /// after the last step of the rollout.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError`] on an out-of-range index or wrong length.
    pub fn record_rollout_end(
        &mut self,
        envs: Range<usize>,
        dones: &[bool],
        values: &[f32],
    ) -> Result<(), BufferError> {
        expect_len("done_at_rollout_end", envs.len(), dones.len())?;
        expect_len("value_at_rollout_end", envs.len(), values.len())?;
        self.done_at_rollout_end
            .write_rows("done_at_rollout_end", envs.clone(), dones)?;
        self.value_at_rollout_end
            .write_rows("value_at_rollout_end", envs, values)
    }

    /// Store `intrinsic` and overwrite `training_rewards` with
    /// `combine(intrinsic, extrinsic)` element-wise.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::LengthMismatch`] unless `intrinsic` covers
    /// the full `[num_envs, total_steps]` grid.
    pub fn fill_training_rewards<F>(
        &mut self,
        intrinsic: &[f32],
        combine: F,
    ) -> Result<(), BufferError>
    where
        F: Fn(f32, f32) -> f32,
    {
        expect_len(
            "intrinsic_rewards",
            self.extrinsic_rewards.len(),
            intrinsic.len(),
        )?;
        self.intrinsic_rewards
            .as_mut_slice()
            .copy_from_slice(intrinsic);
        for ((out, &int), &ext) in self
            .training_rewards
            .as_mut_slice()
            .iter_mut()
            .zip(intrinsic)
            .zip(self.extrinsic_rewards.as_slice())
        {
            *out = combine(int, ext);
        }
        Ok(())
    }

    fn check_step(&self, envs: &Range<usize>, t: usize) -> Result<(), BufferError> {
        if envs.end > self.config.num_envs || envs.start > envs.end {
            return Err(BufferError::IndexOutOfRange {
                axis: "env",
                index: envs.end,
                len: self.config.num_envs,
            });
        }
        let steps = self.config.total_steps();
        if t >= steps {
            return Err(BufferError::IndexOutOfRange {
                axis: "step",
                index: t,
                len: steps,
            });
        }
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Gather the training inputs for the given env rows.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::IndexOutOfRange`] for the first bad index.
    pub fn load_slice(&self, indices: &[usize]) -> Result<BufferSlice, BufferError> {
        Ok(BufferSlice {
            actions: self.actions.gather(indices)?,
            training_rewards: self.training_rewards.gather(indices)?,
            neg_log_probs: self.neg_log_probs.gather(indices)?,
            observations: self.observations.gather(indices)?,
            next_observations: self.next_observations.gather(indices)?,
        })
    }

    /// How many times `[env, t]` was written by `record_step` this rollout.
    pub fn write_count(&self, env: usize, t: usize) -> u32 {
        self.write_counts.cell(env, t)[0]
    }

    /// Whether every `[env, step]` was written exactly once this rollout.
    pub fn is_complete(&self) -> bool {
        self.write_counts.as_slice().iter().all(|&c| c == 1)
    }

    /// Observations before acting, `[envs, steps, *obs]`.
    pub fn observations(&self) -> &Tensor<f32> {
        &self.observations
    }

    /// Bootstrap observations, `[envs, segments, *obs]`.
    pub fn next_observations(&self) -> &Tensor<f32> {
        &self.next_observations
    }

    /// Actions, `[envs, steps, *action]`.
    pub fn actions(&self) -> &Tensor<f32> {
        &self.actions
    }

    /// Value estimates, `[envs, steps]`.
    pub fn values(&self) -> &Tensor<f32> {
        &self.values
    }

    /// Negative log-probabilities, `[envs, steps]`.
    pub fn neg_log_probs(&self) -> &Tensor<f32> {
        &self.neg_log_probs
    }

    /// Done flags, `[envs, steps]`.
    pub fn dones(&self) -> &Tensor<bool> {
        &self.dones
    }

    /// Environment rewards, `[envs, steps]`.
    pub fn extrinsic_rewards(&self) -> &Tensor<f32> {
        &self.extrinsic_rewards
    }

    /// Intrinsic rewards last passed to
    /// [`fill_training_rewards`](Self::fill_training_rewards), `[envs, steps]`.
    pub fn intrinsic_rewards(&self) -> &Tensor<f32> {
        &self.intrinsic_rewards
    }

    /// Combined training rewards, `[envs, steps]`.
    pub fn training_rewards(&self) -> &Tensor<f32> {
        &self.training_rewards
    }

    /// Done flags one step past the rollout, `[envs]`.
    pub fn done_at_rollout_end(&self) -> &Tensor<bool> {
        &self.done_at_rollout_end
    }

    /// Value estimates one step past the rollout, `[envs]`.
    pub fn value_at_rollout_end(&self) -> &Tensor<f32> {
        &self.value_at_rollout_end
    }

    /// Feature-extractor activations, `[envs, steps_per_segment, feature_dim]`.
    pub fn policy_features(&self) -> &Tensor<f32> {
        &self.policy_features
    }

    /// Policy-head hidden activations, `[envs, steps_per_segment, feature_dim]`.
    pub fn policy_hidden(&self) -> &Tensor<f32> {
        &self.policy_hidden
    }
}

fn with_trailing(lead: &[usize], trailing: &[usize]) -> Vec<usize> {
    lead.iter().chain(trailing).copied().collect()
}

fn expect_len(what: &'static str, expected: usize, got: usize) -> Result<(), BufferError> {
    if expected != got {
        return Err(BufferError::LengthMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn config() -> RolloutConfig {
        RolloutConfig {
            num_envs: 4,
            steps_per_segment: 3,
            segments_per_env: 2,
            num_lumps: 2,
            obs_shape: smallvec![2],
            action_shape: smallvec![],
            feature_dim: 2,
        }
    }

    fn record(buf: &mut SegmentBuffer, envs: Range<usize>, t: usize, fill: f32) {
        let n = envs.len();
        let obs = vec![fill; n * 2];
        let dones = vec![false; n];
        let vals = vec![fill; n];
        let acts = vec![fill; n];
        buf.record_step(
            envs,
            t,
            &StepRecord {
                observations: &obs,
                dones: &dones,
                values: &vals,
                neg_log_probs: &vals,
                actions: &acts,
            },
        )
        .unwrap();
    }

    #[test]
    fn shapes_follow_config() {
        let buf = SegmentBuffer::new(&config()).unwrap();
        assert_eq!(buf.observations().shape(), &[4, 6, 2]);
        assert_eq!(buf.next_observations().shape(), &[4, 2, 2]);
        assert_eq!(buf.actions().shape(), &[4, 6]);
        assert_eq!(buf.dones().shape(), &[4, 6]);
        assert_eq!(buf.done_at_rollout_end().shape(), &[4]);
        assert_eq!(buf.policy_features().shape(), &[4, 3, 2]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = RolloutConfig {
            num_envs: 3,
            ..config()
        };
        assert!(matches!(
            SegmentBuffer::new(&cfg),
            Err(ConfigError::EnvsNotDivisible { .. })
        ));
    }

    #[test]
    fn record_step_writes_lump_slice_only() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        record(&mut buf, 2..4, 5, 7.0);
        assert_eq!(buf.observations().cell(2, 5), &[7.0, 7.0]);
        assert_eq!(buf.observations().cell(3, 5), &[7.0, 7.0]);
        assert_eq!(buf.observations().cell(1, 5), &[0.0, 0.0]);
        assert_eq!(buf.values().cell(3, 5), &[7.0]);
        assert_eq!(buf.write_count(2, 5), 1);
        assert_eq!(buf.write_count(1, 5), 0);
    }

    #[test]
    fn coverage_tracks_completion_and_resets() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        for t in 0..6 {
            record(&mut buf, 0..2, t, 1.0);
            record(&mut buf, 2..4, t, 1.0);
        }
        assert!(buf.is_complete());
        record(&mut buf, 0..2, 0, 1.0);
        assert!(!buf.is_complete(), "double write breaks exactly-once");
        buf.begin_rollout();
        assert!(!buf.is_complete());
        assert_eq!(buf.write_count(0, 0), 0);
    }

    #[test]
    fn record_step_rejects_step_out_of_range() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        let err = buf
            .record_step(
                0..2,
                6,
                &StepRecord {
                    observations: &[0.0; 4],
                    dones: &[false; 2],
                    values: &[0.0; 2],
                    neg_log_probs: &[0.0; 2],
                    actions: &[0.0; 2],
                },
            )
            .unwrap_err();
        assert_eq!(
            err,
            BufferError::IndexOutOfRange {
                axis: "step",
                index: 6,
                len: 6
            }
        );
    }

    #[test]
    fn record_step_is_atomic_on_length_error() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        let err = buf
            .record_step(
                0..2,
                0,
                &StepRecord {
                    observations: &[1.0; 4],
                    dones: &[true; 2],
                    values: &[1.0; 2],
                    neg_log_probs: &[1.0; 2],
                    actions: &[1.0; 3],
                },
            )
            .unwrap_err();
        assert!(matches!(
            err,
            BufferError::LengthMismatch { what: "actions", .. }
        ));
        assert_eq!(buf.observations().cell(0, 0), &[0.0, 0.0]);
        assert_eq!(buf.write_count(0, 0), 0);
    }

    #[test]
    fn features_wrap_at_segment_length() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        buf.record_features(0..2, 4, &[1.0, 2.0, 3.0, 4.0], &[5.0; 4])
            .unwrap();
        assert_eq!(buf.policy_features().cell(0, 1), &[1.0, 2.0]);
        assert_eq!(buf.policy_features().cell(1, 1), &[3.0, 4.0]);
        assert_eq!(buf.policy_hidden().cell(1, 1), &[5.0, 5.0]);
    }

    #[test]
    fn rollout_end_writes_bootstrap_rows() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        buf.record_rollout_end(2..4, &[true, false], &[0.5, 0.25])
            .unwrap();
        assert_eq!(
            buf.done_at_rollout_end().as_slice(),
            &[false, false, true, false]
        );
        assert_eq!(
            buf.value_at_rollout_end().as_slice(),
            &[0.0, 0.0, 0.5, 0.25]
        );
    }

    #[test]
    fn training_rewards_combine_elementwise() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        buf.record_reward(0..2, 0, &[3.0, -3.0]).unwrap();
        let intrinsic = vec![0.5; 24];
        buf.fill_training_rewards(&intrinsic, |i, e| i + e).unwrap();
        assert_eq!(buf.training_rewards().cell(0, 0), &[3.5]);
        assert_eq!(buf.training_rewards().cell(1, 0), &[-2.5]);
        assert_eq!(buf.training_rewards().cell(3, 5), &[0.5]);
        assert_eq!(buf.intrinsic_rewards().cell(2, 2), &[0.5]);
    }

    #[test]
    fn training_rewards_reject_partial_intrinsic() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        assert!(matches!(
            buf.fill_training_rewards(&[0.0; 23], |i, _| i),
            Err(BufferError::LengthMismatch { expected: 24, .. })
        ));
    }

    #[test]
    fn load_slice_gathers_env_rows() {
        let mut buf = SegmentBuffer::new(&config()).unwrap();
        record(&mut buf, 2..4, 1, 9.0);
        buf.record_segment_end(2..4, 1, &[4.0, 4.0, 8.0, 8.0]).unwrap();
        let slice = buf.load_slice(&[3, 0]).unwrap();
        assert_eq!(slice.observations.shape(), &[2, 6, 2]);
        assert_eq!(slice.observations.cell(0, 1), &[9.0, 9.0]);
        assert_eq!(slice.observations.cell(1, 1), &[0.0, 0.0]);
        assert_eq!(slice.next_observations.cell(0, 1), &[8.0, 8.0]);
        assert_eq!(slice.actions.shape(), &[2, 6]);
        assert!(buf.load_slice(&[4]).is_err());
    }
}
