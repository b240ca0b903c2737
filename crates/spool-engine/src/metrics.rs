//! Per-rollout timing and counters.

/// Timing and counters for the most recent `collect_rollout` call.
///
/// Durations are in microseconds. The collector resets these at the start
/// of every rollout and fills them as it goes, so after an aborted
/// rollout they describe the partial run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RolloutMetrics {
    /// Wall-clock time for the whole rollout.
    pub total_us: u64,
    /// Time spent blocked retrieving environment results (resets included).
    pub env_wait_us: u64,
    /// Time spent inside policy queries.
    pub policy_us: u64,
    /// Global steps executed.
    pub steps: u64,
    /// Completed episodes observed.
    pub episodes_completed: u64,
}
