//! Criterion benchmarks for rollout collection and post-rollout updates.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use spool_bench::{noisy_lumps, reference_profile, stress_profile};
use spool_buffer::SegmentBuffer;
use spool_core::{RewardConfig, StatsConfig};
use spool_engine::{RewardCombiner, RolloutCollector, ThreadedEnvGroup};
use spool_test_utils::EchoPolicy;

fn bench_rollout_reference(c: &mut Criterion) {
    let config = reference_profile();
    let envs = noisy_lumps(&config, 42);
    let mut collector =
        RolloutCollector::new(config, envs, RewardConfig::default(), StatsConfig::default())
            .unwrap();
    let mut policy = EchoPolicy::new(1, 8);

    // Warm up: the first rollout performs the reset.
    collector.collect_rollout(&mut policy).unwrap();

    c.bench_function("rollout_64x128", |b| {
        b.iter(|| {
            let view = collector.collect_rollout(&mut policy).unwrap();
            black_box(view.observations.len());
        });
    });
}

fn bench_rollout_threaded(c: &mut Criterion) {
    let config = reference_profile();
    let envs = noisy_lumps(&config, 42)
        .into_iter()
        .enumerate()
        .map(|(l, g)| ThreadedEnvGroup::spawn(&format!("bench-env-{l}"), g).unwrap())
        .collect();
    let mut collector =
        RolloutCollector::new(config, envs, RewardConfig::default(), StatsConfig::default())
            .unwrap();
    let mut policy = EchoPolicy::new(1, 8);
    collector.collect_rollout(&mut policy).unwrap();

    c.bench_function("rollout_64x128_threaded", |b| {
        b.iter(|| {
            let view = collector.collect_rollout(&mut policy).unwrap();
            black_box(view.observations.len());
        });
    });
}

fn bench_rollout_stress(c: &mut Criterion) {
    let config = stress_profile();
    let envs = noisy_lumps(&config, 7);
    let mut collector =
        RolloutCollector::new(config, envs, RewardConfig::default(), StatsConfig::default())
            .unwrap();
    let mut policy = EchoPolicy::new(1, 8);
    collector.collect_rollout(&mut policy).unwrap();

    c.bench_function("rollout_256x512", |b| {
        b.iter(|| {
            let view = collector.collect_rollout(&mut policy).unwrap();
            black_box(view.next_observations.len());
        });
    });
}

fn bench_reward_combine(c: &mut Criterion) {
    let config = stress_profile();
    let mut buffer = SegmentBuffer::new(&config).unwrap();
    let intrinsic = vec![0.25f32; config.num_envs * config.total_steps()];
    let combiner = RewardCombiner::default();

    c.bench_function("reward_combine_256x512", |b| {
        b.iter(|| {
            combiner.apply(&mut buffer, black_box(&intrinsic)).unwrap();
        });
    });
}

fn bench_load_slice(c: &mut Criterion) {
    let config = reference_profile();
    let buffer = SegmentBuffer::new(&config).unwrap();
    let indices: Vec<usize> = (0..config.num_envs).step_by(2).collect();

    c.bench_function("load_slice_32_of_64", |b| {
        b.iter(|| {
            let slice = buffer.load_slice(black_box(&indices)).unwrap();
            black_box(slice.len());
        });
    });
}

criterion_group!(
    benches,
    bench_rollout_reference,
    bench_rollout_threaded,
    bench_rollout_stress,
    bench_reward_combine,
    bench_load_slice
);
criterion_main!(benches);
