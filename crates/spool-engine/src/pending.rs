//! Per-lump async step/wait state machine.
//!
//! ```text
//!            reset()                step_async()
//!   Empty ──────────────► Ready ◄─────────────┐
//!     │                    │  ▲                │
//!     │ step_async()       │  │ get()          │
//!     ▼                    │  │ (step_wait)    │
//!   Stepping ◄─────────────┘  └──────── Stepping
//!              step_async()
//! ```
//!
//! `get()` on a Ready slot returns the cached batch without touching the
//! environment, so a lump can be read twice between two `step_async`
//! calls (once for acting, once for a segment-end snapshot) at the cost of
//! a single `step_wait`.

use std::mem;

use spool_core::{EnvGroup, StepBatch};

use crate::error::RolloutError;

/// Cached result state for one lump.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PendingResult {
    /// Nothing issued since construction.
    #[default]
    Empty,
    /// A step was issued and its result has not been collected.
    Stepping,
    /// A result is available.
    Ready(StepBatch),
}

/// An environment group plus its pending-result cache.
#[derive(Debug)]
pub struct LumpSlot<G> {
    index: usize,
    env: G,
    state: PendingResult,
}

impl<G: EnvGroup> LumpSlot<G> {
    /// Wrap `env` as lump `index`. The slot starts [`PendingResult::Empty`].
    pub fn new(index: usize, env: G) -> Self {
        Self {
            index,
            env,
            state: PendingResult::Empty,
        }
    }

    /// Current cache state.
    pub fn state(&self) -> &PendingResult {
        &self.state
    }

    /// Reset the group and cache a synthetic all-done result built from
    /// the initial observations.
    ///
    /// # Errors
    ///
    /// Returns [`RolloutError::Env`] if the reset fails.
    pub fn reset(&mut self) -> Result<&StepBatch, RolloutError> {
        let observations = self.env.reset().map_err(|error| RolloutError::Env {
            lump: self.index,
            error,
        })?;
        let batch = StepBatch::from_reset(observations, self.env.num_envs());
        self.state = PendingResult::Ready(batch);
        self.get()
    }

    /// Return the current result, waiting on the group if a step is in
    /// flight.
    ///
    /// # Errors
    ///
    /// Returns [`RolloutError::NotStarted`] from an `Empty` slot, or
    /// [`RolloutError::Env`] if the wait fails (the slot is then `Empty`).
    pub fn get(&mut self) -> Result<&StepBatch, RolloutError> {
        if matches!(self.state, PendingResult::Stepping) {
            self.state = PendingResult::Empty;
            let batch = self.env.step_wait().map_err(|error| RolloutError::Env {
                lump: self.index,
                error,
            })?;
            self.state = PendingResult::Ready(batch);
        }
        match &self.state {
            PendingResult::Ready(batch) => Ok(batch),
            PendingResult::Empty | PendingResult::Stepping => {
                Err(RolloutError::NotStarted { lump: self.index })
            }
        }
    }

    /// Issue a step with `actions`, invalidating the cache.
    ///
    /// Returns the batch that was cached before the call, if any, so the
    /// caller can keep using the observations it acted on.
    ///
    /// # Errors
    ///
    /// Returns [`RolloutError::Env`] if the group rejects the step; the
    /// slot is left `Empty`.
    pub fn step_async(&mut self, actions: &[f32]) -> Result<Option<StepBatch>, RolloutError> {
        let previous = match mem::take(&mut self.state) {
            PendingResult::Ready(batch) => Some(batch),
            PendingResult::Empty | PendingResult::Stepping => None,
        };
        self.env
            .step_async(actions)
            .map_err(|error| RolloutError::Env {
                lump: self.index,
                error,
            })?;
        self.state = PendingResult::Stepping;
        Ok(previous)
    }

    /// Consume the slot, returning the wrapped group.
    pub fn into_inner(self) -> G {
        self.env
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spool_core::{EnvError, EnvInfo};

    /// Counts waits and returns the wait index as the observation.
    #[derive(Default)]
    struct Probe {
        waits: usize,
        issued: usize,
    }

    impl EnvGroup for Probe {
        fn num_envs(&self) -> usize {
            2
        }

        fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
            Ok(vec![-1.0, -1.0])
        }

        fn step_async(&mut self, _actions: &[f32]) -> Result<(), EnvError> {
            self.issued += 1;
            Ok(())
        }

        fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
            self.waits += 1;
            Ok(StepBatch {
                observations: vec![self.waits as f32; 2],
                rewards: Some(vec![0.0; 2]),
                dones: vec![false; 2],
                infos: vec![EnvInfo::new(); 2],
            })
        }
    }

    #[test]
    fn get_on_empty_slot_is_not_started() {
        let mut slot = LumpSlot::new(3, Probe::default());
        assert_eq!(slot.get().unwrap_err(), RolloutError::NotStarted { lump: 3 });
    }

    #[test]
    fn reset_synthesizes_all_done() {
        let mut slot = LumpSlot::new(0, Probe::default());
        let batch = slot.reset().unwrap();
        assert_eq!(batch.observations, vec![-1.0, -1.0]);
        assert_eq!(batch.dones, vec![true, true]);
        assert!(batch.rewards.is_none());
    }

    #[test]
    fn second_get_reuses_cached_result() {
        let mut slot = LumpSlot::new(0, Probe::default());
        slot.reset().unwrap();
        slot.step_async(&[0.0, 0.0]).unwrap();
        let first = slot.get().unwrap().clone();
        let second = slot.get().unwrap().clone();
        assert_eq!(first, second);
        assert_eq!(slot.into_inner().waits, 1);
    }

    #[test]
    fn step_async_hands_back_previous_batch() {
        let mut slot = LumpSlot::new(0, Probe::default());
        slot.reset().unwrap();
        let previous = slot.step_async(&[0.0, 0.0]).unwrap();
        assert_eq!(previous.map(|b| b.observations), Some(vec![-1.0, -1.0]));
        assert_eq!(slot.state(), &PendingResult::Stepping);

        // Stepping again without a wait discards nothing cached.
        assert!(slot.step_async(&[0.0, 0.0]).unwrap().is_none());
        assert_eq!(slot.into_inner().issued, 2);
    }
}
