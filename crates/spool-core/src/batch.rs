//! Batches exchanged with environment groups and policies.
//!
//! All tensors are flat, row-major `Vec<f32>` (or `Vec<bool>` for done
//! flags) whose leading dimension is the batch (one row per environment
//! in the lump).

use crate::error::{EnvError, PolicyError};
use crate::info::EnvInfo;

/// Result of one environment-group step (or a synthesized reset).
#[derive(Clone, Debug, PartialEq)]
pub struct StepBatch {
    /// Observations, `[batch, *obs_shape]`.
    pub observations: Vec<f32>,
    /// Rewards for the step just taken, `[batch]`. `None` after a reset.
    pub rewards: Option<Vec<f32>>,
    /// Episode-done flags, `[batch]`.
    pub dones: Vec<bool>,
    /// Per-environment info, `[batch]`.
    pub infos: Vec<EnvInfo>,
}

impl StepBatch {
    /// Synthetic result for freshly reset environments: all done, no
    /// reward, empty infos.
    pub fn from_reset(observations: Vec<f32>, batch: usize) -> Self {
        Self {
            observations,
            rewards: None,
            dones: vec![true; batch],
            infos: vec![EnvInfo::default(); batch],
        }
    }

    /// Number of environments in the batch.
    pub fn batch_size(&self) -> usize {
        self.dones.len()
    }

    /// Check that every component is sized for `batch` environments with
    /// `obs_len`-element observations.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::BatchSizeMismatch`] naming the first wrong part.
    pub fn validate(&self, batch: usize, obs_len: usize) -> Result<(), EnvError> {
        check_len("observations", batch * obs_len, self.observations.len())?;
        if let Some(rewards) = &self.rewards {
            check_len("rewards", batch, rewards.len())?;
        }
        check_len("dones", batch, self.dones.len())?;
        check_len("infos", batch, self.infos.len())?;
        Ok(())
    }
}

fn check_len(what: &'static str, expected: usize, got: usize) -> Result<(), EnvError> {
    if expected != got {
        return Err(EnvError::BatchSizeMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}

/// Output of one policy query.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PolicyOutput {
    /// Selected actions, `[batch, *action_shape]`.
    pub actions: Vec<f32>,
    /// Value estimates, `[batch]`.
    pub values: Vec<f32>,
    /// Negative log-probabilities of the selected actions, `[batch]`.
    pub neg_log_probs: Vec<f32>,
}

impl PolicyOutput {
    /// Check that the output is sized for `batch` rows of `action_len`
    /// action elements.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::OutputShape`] naming the first wrong output.
    pub fn validate(&self, batch: usize, action_len: usize) -> Result<(), PolicyError> {
        let checks = [
            ("actions", batch * action_len, self.actions.len()),
            ("values", batch, self.values.len()),
            ("neg_log_probs", batch, self.neg_log_probs.len()),
        ];
        for (what, expected, got) in checks {
            if expected != got {
                return Err(PolicyError::OutputShape {
                    what,
                    expected,
                    got,
                });
            }
        }
        Ok(())
    }
}

/// Diagnostic activations from the most recent policy query.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PolicyFeatures<'a> {
    /// Flattened feature-extractor output, `[batch, feature_dim]`.
    pub features: &'a [f32],
    /// Policy-head hidden activations, `[batch, feature_dim]`.
    pub hidden: &'a [f32],
}
