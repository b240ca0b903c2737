//! Typed per-environment step info.
//!
//! Environment families report completed episodes under different
//! sections (`episode`, `mz_episode`, `retro_episode`), and exploration
//! environments additionally report visited-state counts. [`EnvInfo`]
//! gives each known section its own optional slot; arbitrary extra data
//! lives in ordered [`InfoDict`]s.

use indexmap::IndexMap;

/// A single info value.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// Boolean flag.
    Bool(bool),
    /// Free-form text.
    Text(String),
    /// Sequence of values (e.g. a list of visited states).
    List(Vec<InfoValue>),
}

impl InfoValue {
    /// Numeric view of the value. Only `Int` and `Float` are numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<f64> for InfoValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for InfoValue {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<i64> for InfoValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for InfoValue {
    fn from(v: u64) -> Self {
        Self::Int(v as i64)
    }
}

impl From<bool> for InfoValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for InfoValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<Vec<InfoValue>> for InfoValue {
    fn from(v: Vec<InfoValue>) -> Self {
        Self::List(v)
    }
}

/// Insertion-ordered string-keyed info values.
pub type InfoDict = IndexMap<String, InfoValue>;

/// Info reported by one environment for one step.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvInfo {
    /// Standard completed-episode section (`"r"`, `"l"`, ...).
    pub episode: Option<InfoDict>,
    /// Montezuma-style episode section.
    pub mz_episode: Option<InfoDict>,
    /// Retro-style episode section.
    pub retro_episode: Option<InfoDict>,
    /// Number of distinct states visited this episode, if tracked.
    pub n_states_visited: Option<InfoValue>,
    /// The visited states themselves, reported alongside the count.
    pub states_visited: Option<InfoValue>,
    /// Anything else the environment reports.
    pub extra: InfoDict,
}

impl EnvInfo {
    /// Empty info (no episode ended).
    pub fn new() -> Self {
        Self::default()
    }

    /// Info for a step that ended an episode with the given return and length.
    pub fn episode_end(reward: f64, length: u64) -> Self {
        let mut section = InfoDict::new();
        section.insert("r".into(), InfoValue::Float(reward));
        section.insert("l".into(), InfoValue::from(length));
        Self {
            episode: Some(section),
            ..Self::default()
        }
    }

    /// Set the `mz_episode` section.
    pub fn with_mz_episode(mut self, section: InfoDict) -> Self {
        self.mz_episode = Some(section);
        self
    }

    /// Set the `retro_episode` section.
    pub fn with_retro_episode(mut self, section: InfoDict) -> Self {
        self.retro_episode = Some(section);
        self
    }

    /// Attach exploration counters.
    pub fn with_states_visited(mut self, count: u64, states: Vec<InfoValue>) -> Self {
        self.n_states_visited = Some(InfoValue::from(count));
        self.states_visited = Some(InfoValue::List(states));
        self
    }

    /// Merge the three episode sections in order `episode`, `mz_episode`,
    /// `retro_episode`. Later sections override earlier ones on key
    /// collision; the position of a key is that of its first insertion.
    pub fn merged_episode(&self) -> InfoDict {
        let mut merged = InfoDict::new();
        for section in [&self.episode, &self.mz_episode, &self.retro_episode]
            .into_iter()
            .flatten()
        {
            for (key, value) in section {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_info_merges_to_nothing() {
        assert!(EnvInfo::new().merged_episode().is_empty());
    }

    #[test]
    fn later_sections_override_earlier() {
        let mut mz = InfoDict::new();
        mz.insert("r".into(), InfoValue::Float(7.0));
        mz.insert("rooms".into(), InfoValue::Int(3));
        let mut retro = InfoDict::new();
        retro.insert("r".into(), InfoValue::Float(9.0));

        let info = EnvInfo::episode_end(1.0, 10)
            .with_mz_episode(mz)
            .with_retro_episode(retro);
        let merged = info.merged_episode();

        assert_eq!(merged["r"], InfoValue::Float(9.0));
        assert_eq!(merged["l"], InfoValue::Int(10));
        assert_eq!(merged["rooms"], InfoValue::Int(3));
        let keys: Vec<_> = merged.keys().map(String::as_str).collect();
        assert_eq!(keys, ["r", "l", "rooms"]);
    }

    #[test]
    fn only_numbers_are_numeric() {
        assert_eq!(InfoValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(InfoValue::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(InfoValue::Bool(true).as_f64(), None);
        assert_eq!(InfoValue::from("x").as_f64(), None);
    }
}
