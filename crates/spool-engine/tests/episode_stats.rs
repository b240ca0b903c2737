//! Episode metadata flowing from environment infos into statistics.

use smallvec::smallvec;
use spool_core::{EpisodeInfoError, RewardConfig, RolloutConfig, StatsConfig};
use spool_engine::{RolloutCollector, RolloutError};
use spool_test_utils::{CountingEnvGroup, DonePolicy, EchoPolicy, InfoMode, NoisyEnvGroup};

fn config(num_envs: usize, num_lumps: usize) -> RolloutConfig {
    RolloutConfig {
        num_envs,
        steps_per_segment: 4,
        segments_per_env: 2,
        num_lumps,
        obs_shape: smallvec![3],
        action_shape: smallvec![2],
        feature_dim: 0,
    }
}

fn counting(mode: InfoMode, window: usize) -> RolloutCollector<CountingEnvGroup> {
    let envs = vec![
        CountingEnvGroup::new(0, 1, 3, DonePolicy::Every(2)).info_mode(mode),
        CountingEnvGroup::new(1, 1, 3, DonePolicy::Every(2)).info_mode(mode),
    ];
    RolloutCollector::new(
        config(2, 2),
        envs,
        RewardConfig::default(),
        StatsConfig { window },
    )
    .unwrap()
}

#[test]
fn standard_episodes_update_counters() {
    let mut c = counting(InfoMode::Standard, 100);
    let mut policy = EchoPolicy::new(2, 0);
    c.collect_rollout(&mut policy).unwrap();

    // Waits 2, 4, 6 end episodes inside the rollout; wait 8 is the
    // rollout-end snapshot and is digested next time.
    assert_eq!(c.pending_episodes().len(), 6);
    let best = c.update_stats();

    let stats = c.stats();
    assert_eq!(stats.episode_count(), 6);
    assert_eq!(stats.total_timesteps(), 12);
    assert_eq!(stats.lengths().mean(), Some(2.0));
    // Env 1 earns 0.125 more per step; its third episode pays 5 + 6.
    let env1_last = f64::from(CountingEnvGroup::reward(1, 5)) + f64::from(CountingEnvGroup::reward(1, 6));
    assert_eq!(best, Some(env1_last));
    assert_eq!(stats.best_return(), Some(env1_last));

    let scalars = stats.scalars();
    assert_eq!(scalars["run/episode_count"], 6.0);
    assert_eq!(scalars["run/num_timesteps"], 12.0);
}

#[test]
fn empty_rollout_clears_current_max_only() {
    let envs = vec![CountingEnvGroup::new(0, 1, 3, DonePolicy::Never)];
    let mut c = RolloutCollector::new(
        config(1, 1),
        envs,
        RewardConfig::default(),
        StatsConfig::default(),
    )
    .unwrap();
    let mut policy = EchoPolicy::new(2, 0);
    c.collect_rollout(&mut policy).unwrap();
    assert_eq!(c.update_after_rollout(&[0.0; 8]).unwrap(), None);
    assert_eq!(c.stats().episode_count(), 0);
    assert_eq!(c.stats().current_max(), None);
    assert_eq!(c.stats().best_return(), None);
}

#[test]
fn mz_extras_get_their_own_window() {
    let mut c = counting(InfoMode::Mz, 100);
    let mut policy = EchoPolicy::new(2, 0);
    c.collect_rollout(&mut policy).unwrap();
    c.update_stats();
    let rooms = c.stats().extra("rooms").unwrap();
    assert_eq!(rooms.len(), 6);
    assert_eq!(rooms.mean(), Some(2.0));
    assert_eq!(c.stats().scalars()["episode/rooms"], 2.0);
}

#[test]
fn retro_section_overrides_reward() {
    let mut c = counting(InfoMode::Retro, 100);
    let mut policy = EchoPolicy::new(2, 0);
    c.collect_rollout(&mut policy).unwrap();
    let (_, first) = &c.pending_episodes()[0];
    let standard = f64::from(CountingEnvGroup::reward(0, 1)) + f64::from(CountingEnvGroup::reward(0, 2));
    assert_eq!(first.reward, standard * 2.0);
    assert_eq!(first.length, 2);
    assert!(first.extra.contains_key("level"));
    c.update_stats();
    assert!(c.stats().extra("level").is_none(), "text extras are not windowed");
}

#[test]
fn exploration_counts_are_tracked() {
    let mut c = counting(InfoMode::WithStates, 100);
    let mut policy = EchoPolicy::new(2, 0);
    c.collect_rollout(&mut policy).unwrap();
    assert!(c
        .pending_episodes()
        .iter()
        .all(|(_, r)| r.n_states_visited == Some(2.0) && r.states_visited.is_some()));
    c.update_stats();
    assert_eq!(
        c.stats().extra("n_states_visited").and_then(|w| w.mean()),
        Some(2.0)
    );
}

#[test]
fn malformed_episode_aborts_with_env_context() {
    let mut c = counting(InfoMode::Malformed, 100);
    let mut policy = EchoPolicy::new(2, 0);
    let err = c.collect_rollout(&mut policy).unwrap_err();
    assert_eq!(
        err,
        RolloutError::EpisodeInfo {
            lump: 0,
            env: 0,
            error: EpisodeInfoError::MissingKey { key: "l".into() },
        }
    );
}

#[test]
fn small_window_keeps_newest_rewards() {
    let mut c = counting(InfoMode::Standard, 4);
    let mut policy = EchoPolicy::new(2, 0);
    for _ in 0..3 {
        c.collect_rollout(&mut policy).unwrap();
        c.update_stats();
        assert!(c.stats().rewards().len() <= 4);
    }
    assert_eq!(c.stats().rewards().len(), 4);
    let newest: Vec<f64> = c.stats().rewards().iter().collect();
    assert!(newest.windows(2).all(|w| w[0] <= w[1] + 1.0));
}

#[test]
fn noisy_soak_counts_every_episode() {
    let envs: Vec<_> = (0..3)
        .map(|l| NoisyEnvGroup::new(2, 3, 0.3, 11 + l))
        .collect();
    let mut c = RolloutCollector::new(
        config(6, 3),
        envs,
        RewardConfig::default(),
        StatsConfig::default(),
    )
    .unwrap();
    let mut policy = EchoPolicy::new(2, 0);
    let mut expected = 0;
    for _ in 0..5 {
        c.collect_rollout(&mut policy).unwrap();
        assert!(c.buffer().is_complete());
        expected += c.pending_episodes().len() as u64;
        assert_eq!(c.metrics().episodes_completed, c.pending_episodes().len() as u64);
        c.update_after_rollout(&[0.0; 48]).unwrap();
    }
    assert_eq!(c.stats().episode_count(), expected);
    assert!(c
        .buffer()
        .training_rewards()
        .as_slice()
        .iter()
        .all(|r| (-1.0..=1.0).contains(r)));
}
