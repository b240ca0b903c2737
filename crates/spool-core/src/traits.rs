//! Collaborator traits: environment groups and policies.
//!
//! The collector never owns environment dynamics or model parameters.
//! It drives an [`EnvGroup`] per lump through the reset / step-async /
//! step-wait protocol and queries a [`PolicyPort`] for actions.

use crate::batch::{PolicyFeatures, PolicyOutput, StepBatch};
use crate::error::{EnvError, PolicyError};

/// One addressable group ("lump") of environments advanced together.
///
/// `step_async` must not block on the environments' work; `step_wait`
/// blocks until the step issued by the preceding `step_async` completes.
/// Whether the environments actually run concurrently with the caller is
/// up to the implementation.
pub trait EnvGroup {
    /// Number of environments in the group.
    fn num_envs(&self) -> usize;

    /// Reset every environment, returning the initial observations
    /// (`[num_envs, *obs_shape]`).
    fn reset(&mut self) -> Result<Vec<f32>, EnvError>;

    /// Begin stepping every environment with `actions`
    /// (`[num_envs, *action_shape]`).
    fn step_async(&mut self, actions: &[f32]) -> Result<(), EnvError>;

    /// Wait for the step issued by the last `step_async` and return its result.
    fn step_wait(&mut self) -> Result<StepBatch, EnvError>;
}

impl<G: EnvGroup + ?Sized> EnvGroup for &mut G {
    fn num_envs(&self) -> usize {
        (**self).num_envs()
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        (**self).reset()
    }

    fn step_async(&mut self, actions: &[f32]) -> Result<(), EnvError> {
        (**self).step_async(actions)
    }

    fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
        (**self).step_wait()
    }
}

impl<G: EnvGroup + ?Sized> EnvGroup for Box<G> {
    fn num_envs(&self) -> usize {
        (**self).num_envs()
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        (**self).reset()
    }

    fn step_async(&mut self, actions: &[f32]) -> Result<(), EnvError> {
        (**self).step_async(actions)
    }

    fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
        (**self).step_wait()
    }
}

/// Action selection and value estimation.
pub trait PolicyPort {
    /// Select actions for `batch` observations
    /// (`observations.len() == batch * obs_len`).
    fn select_action(
        &mut self,
        observations: &[f32],
        batch: usize,
    ) -> Result<PolicyOutput, PolicyError>;

    /// Diagnostic activations produced by the most recent
    /// [`select_action`](Self::select_action) call.
    ///
    /// Policies without diagnostics return empty slices.
    fn features(&self) -> PolicyFeatures<'_>;
}

impl<P: PolicyPort + ?Sized> PolicyPort for &mut P {
    fn select_action(
        &mut self,
        observations: &[f32],
        batch: usize,
    ) -> Result<PolicyOutput, PolicyError> {
        (**self).select_action(observations, batch)
    }

    fn features(&self) -> PolicyFeatures<'_> {
        (**self).features()
    }
}
