//! Throughput of the memoised `push` operation (spec §4.3) under the two
//! access patterns it is designed for: a lock-free hit on an already-
//! memoised child, and the cold path that grows the tree.

use ccs_profiler::{Builtin, ProfilerConfig, ProfilerContext};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_push_memoised_hit(c: &mut Criterion) {
    let ctx = ProfilerContext::init(ProfilerConfig::default());
    let cc = ctx.declare_cost_centre("hot", "Bench", "bench.rs:1:1", false);
    let main = ctx.main_ccs();
    // Warm the memoisation table once; every further push takes the
    // lock-free fast path (spec §4.3 step 2).
    let child = ctx.push(main, cc);
    black_box(child);

    c.bench_function("push_memoised_hit", |b| {
        b.iter(|| black_box(ctx.push(black_box(main), black_box(cc))));
    });
}

fn bench_push_new_child(c: &mut Criterion) {
    c.bench_function("push_new_child", |b| {
        b.iter_batched(
            || {
                let ctx = ProfilerContext::init(ProfilerConfig::default());
                let cc = ctx.declare_cost_centre("fresh", "Bench", "bench.rs:1:1", false);
                (ctx, cc)
            },
            |(ctx, cc)| black_box(ctx.push(black_box(ctx.main_ccs()), black_box(cc))),
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_push_linear_chain(c: &mut Criterion) {
    c.bench_function("push_linear_chain_32", |b| {
        b.iter_batched(
            || {
                let ctx = ProfilerContext::init(ProfilerConfig::default());
                let ccs: Vec<_> = (0..32)
                    .map(|i| {
                        ctx.declare_cost_centre(
                            &format!("frame{i}"),
                            "Bench",
                            "bench.rs:1:1",
                            false,
                        )
                    })
                    .collect();
                (ctx, ccs)
            },
            |(ctx, ccs)| {
                let mut stack = ctx.main_ccs();
                for cc in &ccs {
                    stack = ctx.push(stack, *cc);
                }
                black_box(stack)
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_builtin_lookup(c: &mut Criterion) {
    let ctx = ProfilerContext::init(ProfilerConfig::default());
    c.bench_function("builtin_ccs_lookup", |b| {
        b.iter(|| black_box(ctx.builtin_ccs(black_box(Builtin::Gc))));
    });
}

criterion_group!(
    benches,
    bench_push_memoised_hit,
    bench_push_new_child,
    bench_push_linear_chain,
    bench_builtin_lookup
);
criterion_main!(benches);
