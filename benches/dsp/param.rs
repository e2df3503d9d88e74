//! Benchmarks for parameter automation: the envelope's per-sample cost.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polysynth::dsp::{
    envelope::{Adsr, Envelope},
    param::AudioParam,
};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

pub fn bench_param(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/param");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Constant - no events, fill fast path
        let mut param = AudioParam::new(0.7);
        group.bench_with_input(BenchmarkId::new("constant", size), &size, |b, _| {
            b.iter(|| {
                param.render(black_box(&mut buffer), black_box(0.0), SAMPLE_RATE);
            })
        });

        // Attack - inside a long ramp, evaluated per sample
        let mut param = AudioParam::new(0.0);
        let mut env = Envelope::new();
        let adsr = Adsr {
            attack: 1_000.0,
            ..Adsr::default()
        };
        if env.trigger(&mut param, 0.0, &adsr).is_ok() {
            group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
                b.iter(|| {
                    param.render(black_box(&mut buffer), black_box(1.0), SAMPLE_RATE);
                })
            });
        }

        // Release - cancel and reschedule, the note-off cost
        group.bench_with_input(BenchmarkId::new("release_schedule", size), &size, |b, _| {
            b.iter(|| {
                let mut param = AudioParam::new(0.0);
                let mut env = Envelope::new();
                let _ = env.trigger(&mut param, 0.0, &Adsr::default());
                black_box(env.release(&mut param, black_box(0.05), 0.3))
            })
        });
    }

    group.finish();
}
