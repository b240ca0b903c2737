//! Completed-episode metadata, validated at the environment boundary.

use spool_core::{EnvInfo, EpisodeInfoError, InfoDict, InfoValue};

/// Key holding the episode return.
pub const REWARD_KEY: &str = "r";
/// Key holding the episode length in steps.
pub const LENGTH_KEY: &str = "l";
/// Key under which the visited-state count is carried into stats.
pub const STATES_VISITED_KEY: &str = "n_states_visited";

/// One completed episode as reported by an environment.
#[derive(Clone, Debug, PartialEq)]
pub struct EpisodeRecord {
    /// Undiscounted episode return (`"r"`).
    pub reward: f64,
    /// Episode length in steps (`"l"`).
    pub length: u64,
    /// Number of distinct states visited, for exploration environments.
    pub n_states_visited: Option<f64>,
    /// The visited states, reported alongside the count.
    pub states_visited: Option<InfoValue>,
    /// Remaining merged episode keys, in first-insertion order.
    pub extra: InfoDict,
}

impl EpisodeRecord {
    /// Extract a completed episode from `info`.
    ///
    /// The `episode`, `mz_episode` and `retro_episode` sections are merged
    /// in that order. An empty merge means no episode ended and yields
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`EpisodeInfoError`] if `"r"` or `"l"` is missing or not
    /// numeric, if the return is not finite, if the length is not a
    /// non-negative count, or if a visited-state count arrives without the
    /// states themselves.
    pub fn from_info(info: &EnvInfo) -> Result<Option<Self>, EpisodeInfoError> {
        let mut merged = info.merged_episode();
        if merged.is_empty() {
            return Ok(None);
        }

        let reward = take_numeric(&mut merged, REWARD_KEY)?;
        if !reward.is_finite() {
            return Err(EpisodeInfoError::OutOfRange {
                key: REWARD_KEY.to_string(),
            });
        }
        let raw_length = take_numeric(&mut merged, LENGTH_KEY)?;
        if !raw_length.is_finite() || raw_length < 0.0 {
            return Err(EpisodeInfoError::OutOfRange {
                key: LENGTH_KEY.to_string(),
            });
        }

        let (n_states_visited, states_visited) = match &info.n_states_visited {
            None => (None, None),
            Some(count) => {
                let count = count.as_f64().ok_or_else(|| EpisodeInfoError::NotNumeric {
                    key: STATES_VISITED_KEY.to_string(),
                })?;
                let states = info
                    .states_visited
                    .clone()
                    .ok_or_else(|| EpisodeInfoError::MissingKey {
                        key: "states_visited".to_string(),
                    })?;
                (Some(count), Some(states))
            }
        };

        Ok(Some(Self {
            reward,
            length: raw_length as u64,
            n_states_visited,
            states_visited,
            extra: merged,
        }))
    }

    /// Numeric extras, in order, including the visited-state count.
    pub fn numeric_extras(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.extra
            .iter()
            .filter_map(|(k, v)| v.as_f64().map(|x| (k.as_str(), x)))
            .chain(self.n_states_visited.map(|n| (STATES_VISITED_KEY, n)))
    }
}

fn take_numeric(section: &mut InfoDict, key: &str) -> Result<f64, EpisodeInfoError> {
    let value = section
        .shift_remove(key)
        .ok_or_else(|| EpisodeInfoError::MissingKey {
            key: key.to_string(),
        })?;
    value.as_f64().ok_or_else(|| EpisodeInfoError::NotNumeric {
        key: key.to_string(),
    })
}
