use thiserror::Error;

use crate::{dsp::envelope::EnvelopeStage, graph::node::NodeId, OSC_SLOTS};

/// Everything the engine can refuse to do.
///
/// Redundant note events and polyphony overflow are not errors: the first
/// are silent no-ops and the second steals the oldest voice.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("unknown waveform `{0}` (expected sine, square, sawtooth, triangle or off)")]
    InvalidWaveform(String),

    #[error("unknown filter type `{0}` (expected lowpass, highpass, bandpass or notch)")]
    InvalidFilterType(String),

    #[error("oscillator slot {0} out of range (0..{max})", max = OSC_SLOTS)]
    InvalidSlot(usize),

    #[error("value {value} is out of range for `{name}`")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("snapshot entry `{key}` has the wrong type")]
    SnapshotType { key: String },

    /// The graph arena is full. Raised while building a voice or the shared
    /// chain; whatever was half-built has already been removed.
    #[error("audio node limit of {limit} reached")]
    NodeLimit { limit: usize },

    #[error("node {0:?} no longer exists")]
    StaleNode(NodeId),

    #[error("node {id:?} is not a {expected} node")]
    NodeKind { id: NodeId, expected: &'static str },

    #[error("illegal envelope transition `{event}` from {from:?}")]
    IllegalTransition {
        from: EnvelopeStage,
        event: &'static str,
    },

    #[error("engine message queue is full")]
    QueueFull,
}
