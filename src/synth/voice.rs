use std::fmt;

use crate::{
    dsp::{
        envelope::{Adsr, Envelope, EnvelopeStage},
        oscillator::Waveform,
    },
    graph::{
        arena::NodeGraph,
        chain::Rollback,
        node::{GainNode, Node, NodeId, OscillatorNode},
    },
    synth::params::ParameterSet,
    EngineError, OSC_SLOTS,
};

/// Equal-tempered pitch, A4 (note 69) = 440 Hz.
///
/// Any integer is accepted; far-out notes give far-out (but finite or
/// infinite, never NaN) frequencies, which oscillators clamp when rendering.
pub fn note_to_frequency(note: i32) -> f64 {
    440.0 * 2.0_f64.powf((note as f64 - 69.0) / 12.0)
}

/// Stable identity of a voice, distinct from the note it plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VoiceId(pub u64);

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

#[derive(Debug, Clone, Copy)]
struct OscSlot {
    osc: NodeId,
    level: NodeId,
}

/// One sounding note:
///
/// ```text
/// osc1 → level1 ─┐
/// osc2 → level2 ─┼→ envelope gain → shared filter
/// osc3 → level3 ─┘
/// ```
///
/// Slots that are off when the voice is built get no nodes at all.
pub struct Voice {
    id: VoiceId,
    note: i32,
    frequency: f64,
    slots: [Option<OscSlot>; OSC_SLOTS],
    envelope_gain: NodeId,
    envelope: Envelope,
    disposed: bool,
}

impl Voice {
    /// Create and wire the voice's nodes. On error nothing is left in the
    /// graph.
    pub fn build(
        graph: &mut NodeGraph,
        id: VoiceId,
        note: i32,
        params: &ParameterSet,
        filter_input: NodeId,
    ) -> Result<Self, EngineError> {
        let frequency = note_to_frequency(note);
        let mut build = Rollback::new(graph);

        let envelope_gain = build.create(Node::Gain(GainNode::new(0.0)))?;
        build.connect(envelope_gain, filter_input)?;

        let mut slots = [None; OSC_SLOTS];
        for (slot, settings) in slots.iter_mut().zip(params.oscillators.iter()) {
            let Some(waveform) = settings.waveform else {
                continue;
            };

            let osc = build.create(Node::Oscillator(OscillatorNode::new(waveform, frequency)))?;
            let level = build.create(Node::Gain(GainNode::new(settings.level.clamp(0.0, 1.0))))?;
            build.connect(osc, level)?;
            build.connect(level, envelope_gain)?;
            *slot = Some(OscSlot { osc, level });
        }

        build.commit();

        Ok(Self {
            id,
            note,
            frequency,
            slots,
            envelope_gain,
            envelope: Envelope::new(),
            disposed: false,
        })
    }

    pub fn id(&self) -> VoiceId {
        self.id
    }

    pub fn note(&self) -> i32 {
        self.note
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn envelope_gain(&self) -> NodeId {
        self.envelope_gain
    }

    /// Nodes owned by this voice (zero once disposed).
    pub fn node_count(&self) -> usize {
        if self.disposed {
            0
        } else {
            1 + 2 * self.slots.iter().flatten().count()
        }
    }

    pub fn has_oscillator(&self, slot: usize) -> bool {
        self.oscillator(slot).is_some()
    }

    /// Oscillator node of `slot`, if the slot was on when the voice was
    /// built.
    pub fn oscillator(&self, slot: usize) -> Option<NodeId> {
        self.slots.get(slot).copied().flatten().map(|s| s.osc)
    }

    /// Level gain node of `slot`.
    pub fn level_gain(&self, slot: usize) -> Option<NodeId> {
        self.slots.get(slot).copied().flatten().map(|s| s.level)
    }

    pub fn stage(&self, now: f64) -> EnvelopeStage {
        self.envelope.stage(now)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Scheduled end of the release ramp, if released.
    pub fn release_end(&self) -> Option<f64> {
        self.envelope.release_end()
    }

    /// Envelope gain at `now` (0.0 once disposed).
    pub fn envelope_level(&self, graph: &NodeGraph, now: f64) -> f32 {
        graph
            .gain_param(self.envelope_gain)
            .map(|param| param.value_at(now))
            .unwrap_or(0.0)
    }

    pub fn trigger(&mut self, graph: &mut NodeGraph, now: f64, adsr: &Adsr) -> Result<(), EngineError> {
        let param = graph.gain_param_mut(self.envelope_gain)?;
        self.envelope.trigger(param, now, adsr)
    }

    /// Start (or re-time) the release tail. Returns the cleanup deadline.
    pub fn release(
        &mut self,
        graph: &mut NodeGraph,
        now: f64,
        release: f32,
    ) -> Result<f64, EngineError> {
        if self.disposed {
            return Err(EngineError::IllegalTransition {
                from: EnvelopeStage::Disposed,
                event: "release",
            });
        }
        let param = graph.gain_param_mut(self.envelope_gain)?;
        self.envelope.release(param, now, release)
    }

    pub fn set_level(&self, graph: &mut NodeGraph, slot: usize, level: f32) -> Result<(), EngineError> {
        let Some(Some(osc_slot)) = self.slots.get(slot) else {
            return Ok(());
        };
        graph
            .gain_param_mut(osc_slot.level)?
            .set_value(level.clamp(0.0, 1.0));
        Ok(())
    }

    /// Change the waveform of an existing oscillator in place. Slots built
    /// as off stay off for the life of the voice.
    pub fn set_waveform(
        &self,
        graph: &mut NodeGraph,
        slot: usize,
        waveform: Waveform,
    ) -> Result<(), EngineError> {
        let Some(Some(osc_slot)) = self.slots.get(slot) else {
            return Ok(());
        };
        graph.oscillator_mut(osc_slot.osc)?.set_waveform(waveform);
        Ok(())
    }

    /// Halt oscillators and remove every node. Returns false if the voice
    /// was already disposed.
    pub fn dispose(&mut self, graph: &mut NodeGraph) -> bool {
        if self.disposed {
            return false;
        }

        for osc_slot in self.slots.iter().flatten() {
            if let Ok(osc) = graph.oscillator_mut(osc_slot.osc) {
                osc.stop();
            }
            graph.remove(osc_slot.osc);
            graph.remove(osc_slot.level);
        }
        graph.remove(self.envelope_gain);

        self.envelope.dispose();
        self.disposed = true;
        true
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("note", &self.note)
            .field("frequency", &self.frequency)
            .field("disposed", &self.disposed)
            .finish()
    }
}
