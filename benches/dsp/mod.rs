//! Benchmarks for low-level DSP primitives.

mod delay;
mod filter;
mod oscillator;
mod param;

pub use delay::bench_delay;
pub use filter::bench_filter;
pub use oscillator::bench_oscillator;
pub use param::bench_param;
