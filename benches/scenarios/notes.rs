//! Benchmarks for voice allocation: build, steal and dispose.

use std::hint::black_box;

use criterion::Criterion;
use polysynth::{Engine, EngineConfig, RENDER_QUANTUM};

use crate::SAMPLE_RATE;

pub fn bench_notes(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/notes");
    let Ok(mut engine) = Engine::new(EngineConfig {
        sample_rate: SAMPLE_RATE,
        polyphony: 4,
        max_nodes: 4_096,
        ..EngineConfig::default()
    }) else {
        return;
    };
    engine.set_release(0.0).ok();
    let mut buffer = [0.0f32; RENDER_QUANTUM];

    // every iteration steals, and short tails keep the arena turning over
    let mut note = 0;
    group.bench_function("note_on_steal_render", |b| {
        b.iter(|| {
            note = (note + 1) % 48;
            let _ = engine.note_on(black_box(36 + note));
            engine.process_block(&mut buffer);
        })
    });

    group.bench_function("note_on_off", |b| {
        b.iter(|| {
            let _ = engine.note_on(black_box(60));
            engine.note_off(black_box(60));
        })
    });

    group.finish();
}
