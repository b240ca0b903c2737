//! Stub environment groups.

use rand_chacha::rand_core::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use spool_core::{EnvError, EnvGroup, EnvInfo, InfoDict, InfoValue, StepBatch};

/// When a [`CountingEnvGroup`] reports episode ends.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DonePolicy {
    /// Never.
    Never,
    /// After every `n`-th step of each environment.
    Every(u64),
    /// On the listed 0-based `step_wait` indices.
    AtStepIndex(Vec<u64>),
}

/// How a [`CountingEnvGroup`] reports completed episodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InfoMode {
    /// `episode` section with `"r"` and `"l"`.
    #[default]
    Standard,
    /// `mz_episode` section only, with an extra `"rooms"` count.
    Mz,
    /// `episode` section plus a `retro_episode` section with a text
    /// `"level"` and an overriding `"r"` of twice the return.
    Retro,
    /// `episode` section without `"l"`.
    Malformed,
    /// Standard section plus visited-state counters.
    WithStates,
}

/// Deterministic environment group.
///
/// Environment `e` (global index `offset + i`) observes
/// [`expected_obs`](Self::expected_obs)`(e, k, c)` for element `c` after
/// its `k`-th step (`k = 0` after reset) and is paid
/// [`reward`](Self::reward)`(e, k)` by step `k`.
#[derive(Clone, Debug)]
pub struct CountingEnvGroup {
    offset: usize,
    num_envs: usize,
    obs_len: usize,
    done: DonePolicy,
    info_mode: InfoMode,
    fail_at: Option<u64>,
    step: u64,
    episode_return: Vec<f64>,
    episode_length: Vec<u64>,
    pending: Option<Vec<f32>>,
    last_actions: Vec<f32>,
    resets: usize,
    waits: usize,
}

impl CountingEnvGroup {
    /// `num_envs` environments with global indices starting at `offset`,
    /// each observing `obs_len` elements.
    pub fn new(offset: usize, num_envs: usize, obs_len: usize, done: DonePolicy) -> Self {
        Self {
            offset,
            num_envs,
            obs_len,
            done,
            info_mode: InfoMode::Standard,
            fail_at: None,
            step: 0,
            episode_return: vec![0.0; num_envs],
            episode_length: vec![0; num_envs],
            pending: None,
            last_actions: Vec::new(),
            resets: 0,
            waits: 0,
        }
    }

    /// Report episodes in `mode`.
    pub fn info_mode(mut self, mode: InfoMode) -> Self {
        self.info_mode = mode;
        self
    }

    /// Fail the `step_wait` with this 0-based index.
    pub fn fail_at_step(mut self, index: u64) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Observation element `c` of global env `e` after its `k`-th step.
    pub fn expected_obs(env: usize, k: u64, c: usize) -> f32 {
        (env as u64 * 1000 + k + 1) as f32 + c as f32 * 0.25
    }

    /// Reward paid to global env `e` by its `k`-th step (`k >= 1`).
    pub fn reward(env: usize, k: u64) -> f32 {
        k as f32 + env as f32 * 0.125
    }

    /// Number of `reset` calls.
    pub fn resets(&self) -> usize {
        self.resets
    }

    /// Number of `step_wait` calls, including failed ones.
    pub fn waits(&self) -> usize {
        self.waits
    }

    /// Actions passed to the most recent `step_async`.
    pub fn last_actions(&self) -> &[f32] {
        &self.last_actions
    }

    fn observations(&self) -> Vec<f32> {
        (0..self.num_envs)
            .flat_map(|i| {
                let env = self.offset + i;
                let k = self.step;
                (0..self.obs_len).map(move |c| Self::expected_obs(env, k, c))
            })
            .collect()
    }

    fn is_done(&self, wait_index: u64) -> bool {
        match &self.done {
            DonePolicy::Never => false,
            DonePolicy::Every(n) => *n > 0 && self.step % *n == 0,
            DonePolicy::AtStepIndex(indices) => indices.contains(&wait_index),
        }
    }

    fn episode_info(&self, reward: f64, length: u64) -> EnvInfo {
        match self.info_mode {
            InfoMode::Standard => EnvInfo::episode_end(reward, length),
            InfoMode::Mz => {
                let mut section = InfoDict::new();
                section.insert("r".into(), InfoValue::Float(reward));
                section.insert("l".into(), InfoValue::from(length));
                section.insert("rooms".into(), InfoValue::Int(2));
                EnvInfo::new().with_mz_episode(section)
            }
            InfoMode::Retro => {
                let mut section = InfoDict::new();
                section.insert("r".into(), InfoValue::Float(reward * 2.0));
                section.insert("level".into(), InfoValue::from("1-1"));
                EnvInfo::episode_end(reward, length).with_retro_episode(section)
            }
            InfoMode::Malformed => {
                let mut section = InfoDict::new();
                section.insert("r".into(), InfoValue::Float(reward));
                EnvInfo {
                    episode: Some(section),
                    ..EnvInfo::default()
                }
            }
            InfoMode::WithStates => {
                let states = (0..length).map(InfoValue::from).collect();
                EnvInfo::episode_end(reward, length).with_states_visited(length, states)
            }
        }
    }
}

impl EnvGroup for CountingEnvGroup {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.resets += 1;
        self.step = 0;
        self.pending = None;
        self.episode_return.fill(0.0);
        self.episode_length.fill(0);
        Ok(self.observations())
    }

    fn step_async(&mut self, actions: &[f32]) -> Result<(), EnvError> {
        self.last_actions = actions.to_vec();
        self.pending = Some(actions.to_vec());
        Ok(())
    }

    fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
        if self.pending.take().is_none() {
            return Err(EnvError::Failed {
                reason: "step_wait without step_async".to_string(),
            });
        }
        let wait_index = self.waits as u64;
        self.waits += 1;
        if self.fail_at == Some(wait_index) {
            return Err(EnvError::Failed {
                reason: format!("scripted failure at step {wait_index}"),
            });
        }

        self.step += 1;
        let done = self.is_done(wait_index);
        let mut rewards = Vec::with_capacity(self.num_envs);
        let mut infos = Vec::with_capacity(self.num_envs);
        for i in 0..self.num_envs {
            let reward = Self::reward(self.offset + i, self.step);
            rewards.push(reward);
            self.episode_return[i] += f64::from(reward);
            self.episode_length[i] += 1;
            if done {
                infos.push(self.episode_info(self.episode_return[i], self.episode_length[i]));
                self.episode_return[i] = 0.0;
                self.episode_length[i] = 0;
            } else {
                infos.push(EnvInfo::new());
            }
        }

        Ok(StepBatch {
            observations: self.observations(),
            rewards: Some(rewards),
            dones: vec![done; self.num_envs],
            infos,
        })
    }
}

/// Environment group with seeded random observations, rewards and dones.
#[derive(Clone, Debug)]
pub struct NoisyEnvGroup {
    num_envs: usize,
    obs_len: usize,
    done_prob: f32,
    rng: ChaCha8Rng,
    episode_return: Vec<f64>,
    episode_length: Vec<u64>,
    pending: bool,
}

impl NoisyEnvGroup {
    /// Group seeded with `seed`; each step ends an episode with
    /// probability `done_prob`.
    pub fn new(num_envs: usize, obs_len: usize, done_prob: f32, seed: u64) -> Self {
        Self {
            num_envs,
            obs_len,
            done_prob,
            rng: ChaCha8Rng::seed_from_u64(seed),
            episode_return: vec![0.0; num_envs],
            episode_length: vec![0; num_envs],
            pending: false,
        }
    }

    /// Uniform sample in `[0, 1)`.
    fn unit(&mut self) -> f32 {
        (self.rng.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    fn observations(&mut self) -> Vec<f32> {
        (0..self.num_envs * self.obs_len)
            .map(|_| self.unit() * 2.0 - 1.0)
            .collect()
    }
}

impl EnvGroup for NoisyEnvGroup {
    fn num_envs(&self) -> usize {
        self.num_envs
    }

    fn reset(&mut self) -> Result<Vec<f32>, EnvError> {
        self.pending = false;
        self.episode_return.fill(0.0);
        self.episode_length.fill(0);
        Ok(self.observations())
    }

    fn step_async(&mut self, _actions: &[f32]) -> Result<(), EnvError> {
        self.pending = true;
        Ok(())
    }

    fn step_wait(&mut self) -> Result<StepBatch, EnvError> {
        if !self.pending {
            return Err(EnvError::Failed {
                reason: "step_wait without step_async".to_string(),
            });
        }
        self.pending = false;

        let mut rewards = Vec::with_capacity(self.num_envs);
        let mut dones = Vec::with_capacity(self.num_envs);
        let mut infos = Vec::with_capacity(self.num_envs);
        for i in 0..self.num_envs {
            let reward = self.unit() * 4.0 - 2.0;
            let done = self.unit() < self.done_prob;
            rewards.push(reward);
            dones.push(done);
            self.episode_return[i] += f64::from(reward);
            self.episode_length[i] += 1;
            if done {
                infos.push(EnvInfo::episode_end(
                    self.episode_return[i],
                    self.episode_length[i],
                ));
                self.episode_return[i] = 0.0;
                self.episode_length[i] = 0;
            } else {
                infos.push(EnvInfo::new());
            }
        }

        Ok(StepBatch {
            observations: self.observations(),
            rewards: Some(rewards),
            dones,
            infos,
        })
    }
}
