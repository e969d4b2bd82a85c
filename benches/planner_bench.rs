// Benchmark for planner throughput: submit+backplan cost and the full
// submit/dispatch round trip.
// Run with: cargo bench

use criterion::{criterion_group, criterion_main, Criterion};
use ferromill::motion::{MotionContext, RecordingQueue};
use ferromill::Config;

fn bench_feed_submission(c: &mut Criterion) {
    let config = Config::default();
    c.bench_function("submit 8 blended feeds", |b| {
        b.iter(|| {
            let mut ctx = MotionContext::new(&config, RecordingQueue::new());
            for i in 1..=8 {
                let x = (i as f64) * 5.0;
                let y = if i % 2 == 0 { 2.0 } else { -2.0 };
                ctx.submit_feed([x, y, 0.0, 0.0], 0.01).unwrap();
            }
            assert_eq!(ctx.committed_buffers().len(), 24);
        });
    });
}

fn bench_submit_and_dispatch(c: &mut Criterion) {
    let config = Config::default();
    c.bench_function("plan and drain a 40-move zigzag", |b| {
        b.iter(|| {
            let mut ctx = MotionContext::new(&config, RecordingQueue::new());
            for i in 1..=40 {
                let x = (i as f64) * 2.0;
                let y = if i % 2 == 0 { 1.0 } else { 0.0 };
                while !ctx.can_accept() {
                    ctx.step();
                }
                ctx.submit_feed([x, y, 0.0, 0.0], 0.002).unwrap();
            }
            let completed = ctx.run_to_idle();
            assert!(completed > 0);
        });
    });
}

criterion_group!(benches, bench_feed_submission, bench_submit_and_dispatch);
criterion_main!(benches);
