pub mod dsp;
pub mod error; // Typed engine errors
pub mod graph; // Node arena, audio context and the shared chain
pub mod io;
pub mod synth; // Voice management, parameters and the engine facade

pub use error::EngineError;
pub use synth::engine::{Engine, EngineConfig, EngineStatus};
pub use synth::message::{EngineHandle, EngineMessage, MessageReceiver};
pub use synth::params::{
    FilterSettings, OscillatorSettings, ParamChange, ParamValue, ParameterSet, ParameterSnapshot,
};

/// Frames processed per graph pass. Delay feedback loops need at least this
/// much delay.
pub const RENDER_QUANTUM: usize = 128;
pub const MAX_BLOCK_SIZE: usize = 2048;
/// Number of oscillator slots per voice.
pub const OSC_SLOTS: usize = 3;
pub(crate) const MAX_DELAY_SECONDS: f32 = 2.0;
