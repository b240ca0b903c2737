//! Rollout configuration, validation, and error types.
//!
//! [`RolloutConfig`] fixes the geometry of a rollout (environments, lumps,
//! segments, tensor shapes) for the lifetime of a collector.
//! [`RewardConfig`] holds the reward-combiner coefficients and
//! [`StatsConfig`] the episode-statistics window. All three are validated
//! once, at construction; a failure is a fatal configuration error.

use std::error::Error;
use std::fmt;
use std::ops::Range;

use smallvec::SmallVec;

/// Trailing tensor dimensions of one observation or one action.
///
/// An empty shape denotes a scalar (one element).
pub type Shape = SmallVec<[usize; 4]>;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating rollout configuration.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// `num_envs` is zero.
    ZeroEnvs,
    /// `num_lumps` is zero.
    ZeroLumps,
    /// `num_envs` is not evenly divisible by `num_lumps`.
    EnvsNotDivisible {
        /// Configured environment count.
        num_envs: usize,
        /// Configured lump count.
        num_lumps: usize,
    },
    /// `steps_per_segment * segments_per_env` is zero.
    EmptyRollout,
    /// A shape contains a zero-sized dimension.
    ZeroDimension {
        /// Which shape was invalid.
        which: &'static str,
    },
    /// A derived buffer size does not fit in `usize`.
    SizeOverflow {
        /// Which size overflowed.
        what: &'static str,
    },
    /// A reward coefficient is NaN or infinite.
    InvalidCoefficient {
        /// Coefficient name.
        name: &'static str,
        /// The invalid value.
        value: f32,
    },
    /// The statistics window holds zero episodes.
    ZeroWindow,
    /// The number of environment groups does not match `num_lumps`.
    LumpCountMismatch {
        /// Expected number of groups.
        expected: usize,
        /// Number of groups supplied.
        got: usize,
    },
    /// An environment group's width does not match the lump stride.
    LumpSizeMismatch {
        /// Index of the offending group.
        lump: usize,
        /// Expected number of environments.
        expected: usize,
        /// Number of environments the group reports.
        got: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroEnvs => write!(f, "num_envs must be at least 1"),
            Self::ZeroLumps => write!(f, "num_lumps must be at least 1"),
            Self::EnvsNotDivisible {
                num_envs,
                num_lumps,
            } => write!(
                f,
                "num_envs {num_envs} is not divisible by num_lumps {num_lumps}"
            ),
            Self::EmptyRollout => {
                write!(f, "steps_per_segment * segments_per_env must be at least 1")
            }
            Self::ZeroDimension { which } => write!(f, "{which} has a zero-sized dimension"),
            Self::SizeOverflow { what } => write!(f, "{what} overflows usize"),
            Self::InvalidCoefficient { name, value } => {
                write!(f, "{name} must be finite, got {value}")
            }
            Self::ZeroWindow => write!(f, "statistics window must hold at least 1 episode"),
            Self::LumpCountMismatch { expected, got } => {
                write!(f, "expected {expected} environment groups, got {got}")
            }
            Self::LumpSizeMismatch {
                lump,
                expected,
                got,
            } => write!(
                f,
                "environment group {lump} has {got} environments, expected {expected}"
            ),
        }
    }
}

impl Error for ConfigError {}

// ── RolloutConfig ──────────────────────────────────────────────────

/// Geometry of a segmented rollout.
///
/// A rollout runs `total_steps() = steps_per_segment * segments_per_env`
/// global steps over `num_envs` environments, which are advanced in
/// `num_lumps` groups of `lump_stride()` environments each.
#[derive(Clone, Debug, PartialEq)]
pub struct RolloutConfig {
    /// Total number of environments across all lumps.
    pub num_envs: usize,
    /// Steps per segment.
    pub steps_per_segment: usize,
    /// Segments per environment in one rollout.
    pub segments_per_env: usize,
    /// Number of environment groups. Must divide `num_envs`.
    pub num_lumps: usize,
    /// Shape of a single observation.
    pub obs_shape: Shape,
    /// Shape of a single action.
    pub action_shape: Shape,
    /// Width of the policy's diagnostic feature tensors. Zero disables them.
    pub feature_dim: usize,
}

impl RolloutConfig {
    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant as a [`ConfigError`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_envs == 0 {
            return Err(ConfigError::ZeroEnvs);
        }
        if self.num_lumps == 0 {
            return Err(ConfigError::ZeroLumps);
        }
        if self.num_envs % self.num_lumps != 0 {
            return Err(ConfigError::EnvsNotDivisible {
                num_envs: self.num_envs,
                num_lumps: self.num_lumps,
            });
        }
        let total = self
            .steps_per_segment
            .checked_mul(self.segments_per_env)
            .ok_or(ConfigError::SizeOverflow { what: "total_steps" })?;
        if total == 0 {
            return Err(ConfigError::EmptyRollout);
        }
        if self.obs_shape.contains(&0) {
            return Err(ConfigError::ZeroDimension { which: "obs_shape" });
        }
        if self.action_shape.contains(&0) {
            return Err(ConfigError::ZeroDimension {
                which: "action_shape",
            });
        }
        let obs_len = checked_numel(&self.obs_shape)
            .ok_or(ConfigError::SizeOverflow { what: "obs_shape" })?;
        let action_len = checked_numel(&self.action_shape)
            .ok_or(ConfigError::SizeOverflow {
                what: "action_shape",
            })?;
        let env_steps = self
            .num_envs
            .checked_mul(total)
            .ok_or(ConfigError::SizeOverflow {
                what: "num_envs * total_steps",
            })?;
        env_steps
            .checked_mul(obs_len.max(action_len))
            .ok_or(ConfigError::SizeOverflow {
                what: "step tensor",
            })?;
        self.num_envs
            .checked_mul(self.steps_per_segment)
            .and_then(|n| n.checked_mul(self.feature_dim))
            .ok_or(ConfigError::SizeOverflow {
                what: "feature tensor",
            })?;
        Ok(())
    }

    /// `steps_per_segment * segments_per_env`.
    pub fn total_steps(&self) -> usize {
        self.steps_per_segment * self.segments_per_env
    }

    /// Number of environments in each lump.
    pub fn lump_stride(&self) -> usize {
        self.num_envs / self.num_lumps
    }

    /// Environment indices covered by `lump`.
    pub fn lump_range(&self, lump: usize) -> Range<usize> {
        let stride = self.lump_stride();
        lump * stride..(lump + 1) * stride
    }

    /// Elements in one observation.
    pub fn obs_len(&self) -> usize {
        self.obs_shape.iter().product()
    }

    /// Elements in one action.
    pub fn action_len(&self) -> usize {
        self.action_shape.iter().product()
    }
}

fn checked_numel(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

// ── RewardConfig ───────────────────────────────────────────────────

/// Coefficients of the training reward
/// `ext_coeff * clip(extrinsic, -1, 1) + int_coeff * intrinsic`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardConfig {
    /// Weight on the clipped extrinsic (environment) reward. Default: 1.0.
    pub ext_coeff: f32,
    /// Weight on the intrinsic reward. Default: 1.0.
    pub int_coeff: f32,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            ext_coeff: 1.0,
            int_coeff: 1.0,
        }
    }
}

impl RewardConfig {
    /// Both coefficients must be finite.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidCoefficient`] naming the bad coefficient.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ext_coeff.is_finite() {
            return Err(ConfigError::InvalidCoefficient {
                name: "ext_coeff",
                value: self.ext_coeff,
            });
        }
        if !self.int_coeff.is_finite() {
            return Err(ConfigError::InvalidCoefficient {
                name: "int_coeff",
                value: self.int_coeff,
            });
        }
        Ok(())
    }
}

// ── StatsConfig ────────────────────────────────────────────────────

/// Configuration for episode statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatsConfig {
    /// Number of most recent episodes kept in each rolling window. Default: 100.
    pub window: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { window: 100 }
    }
}

impl StatsConfig {
    /// The window must hold at least one episode.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroWindow`] if `window == 0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(())
    }
}
