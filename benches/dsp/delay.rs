//! Benchmarks for delay line operations.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polysynth::dsp::delay::DelayLine;

use crate::BLOCK_SIZES;

pub fn bench_delay(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/delay");

    // delay times in samples
    let delay_times: &[usize] = &[
        480,    // 10ms at 48kHz
        4800,   // 100ms at 48kHz
        48000,  // 1 second at 48kHz
    ];

    for &size in BLOCK_SIZES {
        let input: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();

        for &delay_samples in delay_times {
            let delay_ms = delay_samples as f32 / 48.0;

            // read then write, as the graph does every quantum
            let mut delay = DelayLine::new(96_000 + size);
            let mut buffer = vec![0.0f32; size];
            group.bench_with_input(
                BenchmarkId::new(format!("read_write_{}ms", delay_ms as u32), size),
                &size,
                |b, _| {
                    b.iter(|| {
                        delay.read_block(black_box(&mut buffer), black_box(delay_samples));
                        delay.write_block(black_box(&input));
                    })
                },
            );
        }
    }

    group.finish();
}
