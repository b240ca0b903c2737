//! Fixed-shape rollout storage.
//!
//! A [`SegmentBuffer`] holds exactly one rollout's worth of transitions,
//! laid out `[env, step, ...]`, plus one bootstrap observation per
//! segment. It is allocated once from a [`RolloutConfig`] and overwritten
//! in place by every rollout; nothing grows.
//!
//! # Architecture
//!
//! ```text
//! SegmentBuffer
//! ├── Tensor<f32>  observations       [envs, steps, *obs]
//! ├── Tensor<f32>  next_observations  [envs, segments, *obs]
//! ├── Tensor<f32>  actions            [envs, steps, *act]
//! ├── Tensor<f32>  values / neg_log_probs / rewards  [envs, steps]
//! ├── Tensor<bool> dones              [envs, steps]
//! ├── Tensor<_>    rollout-end bootstrap values      [envs]
//! ├── Tensor<f32>  policy diagnostics [envs, steps_per_segment, feature_dim]
//! └── Tensor<u32>  write coverage     [envs, steps]
//! ```
//!
//! [`RolloutConfig`]: spool_core::RolloutConfig

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod segment;
pub mod slice;
pub mod tensor;

pub use error::BufferError;
pub use segment::{SegmentBuffer, StepRecord};
pub use slice::BufferSlice;
pub use tensor::Tensor;
