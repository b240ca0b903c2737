//! Training-side view of a gathered subset of environments.

use crate::tensor::Tensor;

/// Training inputs for a subset of environments, gathered along the env
/// axis by [`SegmentBuffer::load_slice`](crate::SegmentBuffer::load_slice).
///
/// Row `i` of every tensor belongs to the `i`-th requested env index.
#[derive(Clone, Debug, PartialEq)]
pub struct BufferSlice {
    /// `[n, steps, *action_shape]`.
    pub actions: Tensor<f32>,
    /// `[n, steps]`.
    pub training_rewards: Tensor<f32>,
    /// `[n, steps]`.
    pub neg_log_probs: Tensor<f32>,
    /// `[n, steps, *obs_shape]`.
    pub observations: Tensor<f32>,
    /// `[n, segments, *obs_shape]`.
    pub next_observations: Tensor<f32>,
}

impl BufferSlice {
    /// Number of environments in the slice.
    pub fn len(&self) -> usize {
        self.training_rewards.rows()
    }

    /// Whether the slice selects no environments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
