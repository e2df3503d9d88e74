//! Benchmarks for rendering the engine with many voices sounding.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use polysynth::{dsp::Waveform, Engine, EngineConfig};

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn engine(voices: i32, three_oscillators: bool, delay: bool) -> Option<Engine> {
    let mut engine = Engine::new(EngineConfig {
        sample_rate: SAMPLE_RATE,
        polyphony: 16,
        ..EngineConfig::default()
    })
    .ok()?;

    if three_oscillators {
        engine.set_oscillator_waveform(1, Some(Waveform::Square)).ok()?;
        engine.set_oscillator_waveform(2, Some(Waveform::Triangle)).ok()?;
    }
    engine.set_delay_enabled(delay).ok()?;

    for i in 0..voices {
        engine.note_on(48 + i * 3).ok()?;
    }
    Some(engine)
}

pub fn bench_poly(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/poly");

    let cases: [(&str, i32, bool, bool); 5] = [
        ("idle_chain", 0, false, false),
        ("one_voice", 1, false, false),
        ("eight_voices", 8, false, false),
        ("eight_voices_three_osc", 8, true, false),
        ("sixteen_voices_delay", 16, true, true),
    ];

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        for (name, voices, three, delay) in cases {
            let Some(mut engine) = engine(voices, three, delay) else {
                continue;
            };
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    engine.process_block(black_box(&mut buffer));
                })
            });
        }
    }

    group.finish();
}
