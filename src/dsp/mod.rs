//! Low-level DSP primitives used by the audio graph nodes.
//!
//! These components stay focused on the signal-processing math. The graph
//! layer owns orchestration: connections, render order and timing.

/// Circular delay line with block-wise read/write.
pub mod delay;
/// ADSR envelope scheduling onto an automatable parameter.
pub mod envelope;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Oscillator waveforms.
pub mod oscillator;
/// Sample-accurate parameter automation timeline.
pub mod param;

pub use envelope::{Adsr, EnvelopeStage};
pub use filter::FilterType;
pub use oscillator::Waveform;
pub use param::AudioParam;
