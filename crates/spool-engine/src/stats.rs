//! Episode statistics: bounded rolling windows plus run totals.
//!
//! [`EpisodeStats::update`] digests one rollout's completed episodes.
//! Rewards and lengths always get a window; any numeric extra key (and the
//! visited-state count of exploration environments) gets its own window
//! the first time an episode reports it.

use indexmap::IndexMap;
use spool_core::{ConfigError, StatsConfig};

use crate::episode::EpisodeRecord;

/// Fixed-capacity window over the most recent values.
///
/// Writes go to slot `pos % capacity`; once full, each push evicts the
/// oldest value.
#[derive(Clone, Debug, PartialEq)]
pub struct RollingWindow {
    slots: Vec<f64>,
    pos: usize,
    len: usize,
}

impl RollingWindow {
    /// Create an empty window holding at most `capacity` values.
    ///
    /// # Panics
    ///
    /// Panics if `capacity == 0`. [`StatsConfig::validate`] rejects that
    /// before any window is built.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "RollingWindow capacity must be > 0");
        Self {
            slots: vec![0.0; capacity],
            pos: 0,
            len: 0,
        }
    }

    /// Append `value`, evicting the oldest value if full.
    pub fn push(&mut self, value: f64) {
        let cap = self.slots.len();
        self.slots[self.pos] = value;
        self.pos = (self.pos + 1) % cap;
        self.len = (self.len + 1).min(cap);
    }

    /// Append every value in order.
    pub fn extend(&mut self, values: impl IntoIterator<Item = f64>) {
        for v in values {
            self.push(v);
        }
    }

    /// Values oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        let cap = self.slots.len();
        let start = (self.pos + cap - self.len) % cap;
        (0..self.len).map(move |i| self.slots[(start + i) % cap])
    }

    /// Mean of the held values, `None` when empty.
    pub fn mean(&self) -> Option<f64> {
        if self.len == 0 {
            return None;
        }
        Some(self.iter().sum::<f64>() / self.len as f64)
    }

    /// Largest held value, `None` when empty.
    pub fn max(&self) -> Option<f64> {
        self.iter().reduce(f64::max)
    }

    /// Number of values held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the window holds no values.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Maximum number of values held.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Rolling and cumulative statistics over completed episodes.
#[derive(Clone, Debug)]
pub struct EpisodeStats {
    window: usize,
    rewards: RollingWindow,
    lengths: RollingWindow,
    extras: IndexMap<String, RollingWindow>,
    episode_count: u64,
    total_timesteps: u64,
    best_return: Option<f64>,
    current_max: Option<f64>,
    recent_mean_reward: Option<f64>,
}

impl EpisodeStats {
    /// Create empty statistics.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroWindow`] for a zero-sized window.
    pub fn new(config: StatsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: config.window,
            rewards: RollingWindow::new(config.window),
            lengths: RollingWindow::new(config.window),
            extras: IndexMap::new(),
            episode_count: 0,
            total_timesteps: 0,
            best_return: None,
            current_max: None,
            recent_mean_reward: None,
        })
    }

    /// Digest one rollout's `(step, record)` entries, draining `entries`.
    ///
    /// Returns the largest reward in the batch, which is also what
    /// [`current_max`](Self::current_max) reports until the next update.
    pub fn update(&mut self, entries: &mut Vec<(u64, EpisodeRecord)>) -> Option<f64> {
        if entries.is_empty() {
            self.current_max = None;
            return None;
        }

        let n = entries.len();
        let mut batch_sum = 0.0;
        let mut batch_max = f64::NEG_INFINITY;
        for (_, record) in entries.drain(..) {
            self.rewards.push(record.reward);
            self.lengths.push(record.length as f64);
            batch_sum += record.reward;
            batch_max = batch_max.max(record.reward);
            self.total_timesteps += record.length;
            for (key, value) in record.numeric_extras() {
                let window = self.window;
                self.extras
                    .entry(key.to_string())
                    .or_insert_with(|| RollingWindow::new(window))
                    .push(value);
            }
        }

        self.episode_count += n as u64;
        self.recent_mean_reward = Some(batch_sum / n as f64);
        self.current_max = Some(batch_max);
        self.best_return = Some(match self.best_return {
            Some(best) => best.max(batch_max),
            None => batch_max,
        });
        self.current_max
    }

    /// Reward window.
    pub fn rewards(&self) -> &RollingWindow {
        &self.rewards
    }

    /// Length window.
    pub fn lengths(&self) -> &RollingWindow {
        &self.lengths
    }

    /// Window for a numeric extra key, if any episode has reported it.
    pub fn extra(&self, key: &str) -> Option<&RollingWindow> {
        self.extras.get(key)
    }

    /// Episodes completed since construction.
    pub fn episode_count(&self) -> u64 {
        self.episode_count
    }

    /// Sum of completed episode lengths since construction.
    pub fn total_timesteps(&self) -> u64 {
        self.total_timesteps
    }

    /// Best batch-max return seen so far.
    pub fn best_return(&self) -> Option<f64> {
        self.best_return
    }

    /// Max return of the last non-empty update, `None` after an empty one.
    pub fn current_max(&self) -> Option<f64> {
        self.current_max
    }

    /// Mean return of the last non-empty update.
    pub fn recent_mean_reward(&self) -> Option<f64> {
        self.recent_mean_reward
    }

    /// Named scalars for loggers, in a stable order.
    ///
    /// Keys without data yet are omitted. Extra windows are reported as
    /// `episode/<key>` means.
    pub fn scalars(&self) -> IndexMap<String, f64> {
        let mut out = IndexMap::new();
        if let Some(v) = self.rewards.mean() {
            out.insert("performance/episode_reward".to_string(), v);
        }
        if let Some(v) = self.recent_mean_reward {
            out.insert("performance/eprew_recent".to_string(), v);
        }
        if let Some(v) = self.lengths.mean() {
            out.insert("performance/episode_length".to_string(), v);
        }
        out.insert("run/episode_count".to_string(), self.episode_count as f64);
        out.insert("run/num_timesteps".to_string(), self.total_timesteps as f64);
        if let Some(v) = self.best_return {
            out.insert("run/best_return".to_string(), v);
        }
        for (key, window) in &self.extras {
            if let Some(v) = window.mean() {
                out.insert(format!("episode/{key}"), v);
            }
        }
        out
    }
}

impl Default for EpisodeStats {
    fn default() -> Self {
        let window = StatsConfig::default().window;
        Self {
            window,
            rewards: RollingWindow::new(window),
            lengths: RollingWindow::new(window),
            extras: IndexMap::new(),
            episode_count: 0,
            total_timesteps: 0,
            best_return: None,
            current_max: None,
            recent_mean_reward: None,
        }
    }
}
