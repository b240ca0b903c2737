//! Stub policy.

use spool_core::{PolicyError, PolicyFeatures, PolicyOutput, PolicyPort};

/// Policy whose outputs are functions of each row's first observation
/// element `x`:
///
/// - every action element is `x`
/// - value is `x * 0.5`
/// - negative log-probability is `x * 0.125`
/// - features are `x`, hidden activations `-x`
pub struct EchoPolicy {
    action_len: usize,
    feature_dim: usize,
    features: Vec<f32>,
    hidden: Vec<f32>,
    calls: usize,
    fail_on_call: Option<usize>,
}

impl EchoPolicy {
    /// Policy emitting `action_len` action and `feature_dim` feature
    /// elements per row.
    pub fn new(action_len: usize, feature_dim: usize) -> Self {
        Self {
            action_len,
            feature_dim,
            features: Vec::new(),
            hidden: Vec::new(),
            calls: 0,
            fail_on_call: None,
        }
    }

    /// Fail the `select_action` call with this 0-based index.
    pub fn fail_on_call(mut self, index: usize) -> Self {
        self.fail_on_call = Some(index);
        self
    }

    /// Number of `select_action` calls, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Value reported for first observation element `x`.
    pub fn value_of(x: f32) -> f32 {
        x * 0.5
    }

    /// Negative log-probability reported for first observation element `x`.
    pub fn neg_log_prob_of(x: f32) -> f32 {
        x * 0.125
    }
}

impl PolicyPort for EchoPolicy {
    fn select_action(
        &mut self,
        observations: &[f32],
        batch: usize,
    ) -> Result<PolicyOutput, PolicyError> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on_call == Some(call) {
            return Err(PolicyError::Failed {
                reason: format!("scripted failure on call {call}"),
            });
        }

        let obs_len = if batch == 0 {
            1
        } else {
            (observations.len() / batch).max(1)
        };
        let firsts: Vec<f32> = observations.chunks(obs_len).map(|row| row[0]).collect();

        let mut out = PolicyOutput::default();
        self.features.clear();
        self.hidden.clear();
        for &x in &firsts {
            out.actions.extend(std::iter::repeat(x).take(self.action_len));
            out.values.push(Self::value_of(x));
            out.neg_log_probs.push(Self::neg_log_prob_of(x));
            self.features
                .extend(std::iter::repeat(x).take(self.feature_dim));
            self.hidden
                .extend(std::iter::repeat(-x).take(self.feature_dim));
        }
        Ok(out)
    }

    fn features(&self) -> PolicyFeatures<'_> {
        PolicyFeatures {
            features: &self.features,
            hidden: &self.hidden,
        }
    }
}
