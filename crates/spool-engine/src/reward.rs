//! Training reward combination.

use spool_buffer::{BufferError, SegmentBuffer};
use spool_core::{ConfigError, RewardConfig};

/// Merges clipped extrinsic reward with intrinsic reward:
/// `ext_coeff * clip(extrinsic, -1, 1) + int_coeff * intrinsic`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardCombiner {
    ext_coeff: f32,
    int_coeff: f32,
}

impl RewardCombiner {
    /// Build a combiner from validated coefficients.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCoefficient`] for a non-finite
    /// coefficient.
    pub fn new(config: RewardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            ext_coeff: config.ext_coeff,
            int_coeff: config.int_coeff,
        })
    }

    /// Extrinsic coefficient.
    pub fn ext_coeff(&self) -> f32 {
        self.ext_coeff
    }

    /// Intrinsic coefficient.
    pub fn int_coeff(&self) -> f32 {
        self.int_coeff
    }

    /// Combine one intrinsic/extrinsic pair.
    #[inline]
    pub fn combine(&self, intrinsic: f32, extrinsic: f32) -> f32 {
        self.ext_coeff * extrinsic.clamp(-1.0, 1.0) + self.int_coeff * intrinsic
    }

    /// Overwrite `buffer`'s training rewards from `intrinsic` and the
    /// buffer's extrinsic rewards.
    ///
    /// # Errors
    ///
    /// Returns [`BufferError::LengthMismatch`] unless `intrinsic` is
    /// `[num_envs, total_steps]`.
    pub fn apply(&self, buffer: &mut SegmentBuffer, intrinsic: &[f32]) -> Result<(), BufferError> {
        buffer.fill_training_rewards(intrinsic, |i, e| self.combine(i, e))
    }
}

impl Default for RewardCombiner {
    fn default() -> Self {
        let config = RewardConfig::default();
        Self {
            ext_coeff: config.ext_coeff,
            int_coeff: config.int_coeff,
        }
    }
}
