use rtrb::{Consumer, Producer};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    dsp::{filter::FilterType, oscillator::Waveform},
    graph::{chain::SharedChain, context::AudioContext, node::NodeId},
    synth::{
        manager::{VoiceManager, DEFAULT_POLYPHONY},
        message::{EngineMessage, MessageReceiver},
        params::{ParamChange, ParameterSet, ParameterSnapshot},
        voice::Voice,
    },
    EngineError, RENDER_QUANTUM,
};

/*
Engine
======

The public face of the synth. Everything funnels through here:

    note_on / note_off / stop_all / toggle ──→ VoiceManager ──→ Voice
    set_* / set_param / apply_snapshot ─────→ ParameterSet ──→ SharedChain, Voices
    process_block ───────────────────────────→ disposals, then AudioContext

Time
----

The engine has no clock of its own. "Now" is the audio context's time: the
number of frames rendered so far over the sample rate. A note struck
between two blocks starts at the first frame of the next block.

Lazy Chain
----------

The shared filter/delay/master chain does not exist until the first note
needs it. If that first note then fails to build, the chain is removed
again so a failed note-on leaves the node count untouched.

Threading
---------

The engine is single-threaded and never blocks. A host with a separate UI
thread keeps the engine on the audio thread and talks to it through an
`EngineHandle` (rtrb ring), drained at the top of every `process_block`.
*/

/// Sample rates the engine accepts.
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<f32> = 8_000.0..=384_000.0;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Maximum simultaneously active voices. Releasing tails do not count.
    pub polyphony: usize,
    /// Upper bound on live graph nodes, shared chain and destination included.
    pub max_nodes: usize,
    /// Note held by [`Engine::toggle`].
    pub toggle_note: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            polyphony: DEFAULT_POLYPHONY,
            max_nodes: 512,
            toggle_note: 69,
        }
    }
}

/// Copyable summary for meters and UIs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EngineStatus {
    pub time: f64,
    pub active_voices: usize,
    pub releasing_voices: usize,
    pub live_nodes: usize,
    pub chain_built: bool,
    pub toggled: bool,
    /// Absolute peak of the last rendered block.
    pub peak: f32,
    /// Samples the recorder tap could not take because it was full.
    pub tap_dropped: u64,
}

pub struct Engine {
    config: EngineConfig,
    context: AudioContext,
    chain: Option<SharedChain>,
    voices: VoiceManager,
    params: ParameterSet,
    rx: Option<Consumer<EngineMessage>>,
    tap: Option<Producer<f32>>,
    tap_dropped: u64,
    peak: f32,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        if !SAMPLE_RATE_RANGE.contains(&config.sample_rate) {
            return Err(EngineError::InvalidParameter {
                name: "sample_rate",
                value: config.sample_rate,
            });
        }

        let context = AudioContext::new(config.sample_rate, config.max_nodes)?;
        info!(
            sample_rate = config.sample_rate,
            polyphony = config.polyphony,
            max_nodes = config.max_nodes,
            "engine created"
        );

        Ok(Self {
            config,
            context,
            chain: None,
            voices: VoiceManager::new(config.polyphony),
            params: ParameterSet::default(),
            rx: None,
            tap: None,
            tap_dropped: 0,
            peak: 0.0,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn voices(&self) -> &VoiceManager {
        &self.voices
    }

    /// Master gain node, once the shared chain exists.
    pub fn master_output(&self) -> Option<NodeId> {
        self.chain.map(|chain| chain.master())
    }

    pub fn chain(&self) -> Option<&SharedChain> {
        self.chain.as_ref()
    }

    pub fn active_voice(&self, note: i32) -> Option<&Voice> {
        self.voices.active_voice(note)
    }

    fn ensure_chain(&mut self) -> Result<(SharedChain, bool), EngineError> {
        if let Some(chain) = self.chain {
            return Ok((chain, false));
        }

        let destination = self.context.destination();
        let sample_rate = self.context.sample_rate();
        let chain = SharedChain::build(
            self.context.graph_mut(),
            destination,
            &self.params,
            sample_rate,
        )?;
        self.chain = Some(chain);
        Ok((chain, true))
    }

    pub fn note_on(&mut self, note: i32) -> Result<(), EngineError> {
        if self.voices.active_voice(note).is_some() {
            return Ok(());
        }

        let (chain, fresh) = self.ensure_chain()?;
        let now = self.context.current_time();

        let result = self.voices.note_on(
            self.context.graph_mut(),
            chain.filter_input(),
            note,
            now,
            &self.params,
        );

        if let Err(err) = result {
            if fresh {
                chain.teardown(self.context.graph_mut());
                self.chain = None;
            }
            warn!(note, %err, "note on failed");
            return Err(err);
        }
        Ok(())
    }

    /// Returns false if the note was not sounding.
    pub fn note_off(&mut self, note: i32) -> bool {
        let now = self.context.current_time();
        let released =
            self.voices
                .note_off(self.context.graph_mut(), note, now, self.params.envelope.release);
        if released {
            debug!(note, "note off");
        }
        released
    }

    /// Release every active voice. Returns how many were released.
    pub fn stop_all(&mut self) -> usize {
        let now = self.context.current_time();
        let count =
            self.voices
                .stop_all(self.context.graph_mut(), now, self.params.envelope.release);
        debug!(count, "all notes off");
        count
    }

    /// Whether the toggle note is currently sounding, however it was
    /// started.
    pub fn is_toggled(&self) -> bool {
        self.voices.active_voice(self.config.toggle_note).is_some()
    }

    /// Start or stop the held tone. Returns whether it is now playing.
    pub fn toggle(&mut self) -> Result<bool, EngineError> {
        let note = self.config.toggle_note;
        if self.is_toggled() {
            self.note_off(note);
            Ok(false)
        } else {
            self.note_on(note)?;
            Ok(true)
        }
    }

    pub fn set_oscillator_waveform(
        &mut self,
        slot: usize,
        waveform: Option<Waveform>,
    ) -> Result<(), EngineError> {
        self.set_param(ParamChange::OscWaveform { slot, waveform })
    }

    pub fn set_oscillator_level(&mut self, slot: usize, level: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::OscLevel { slot, level })
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) -> Result<(), EngineError> {
        self.set_param(ParamChange::FilterType(filter_type))
    }

    pub fn set_filter_cutoff(&mut self, hz: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::FilterCutoff(hz))
    }

    pub fn set_filter_q(&mut self, q: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::FilterQ(q))
    }

    pub fn set_attack(&mut self, seconds: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::Attack(seconds))
    }

    pub fn set_decay(&mut self, seconds: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::Decay(seconds))
    }

    pub fn set_sustain(&mut self, level: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::Sustain(level))
    }

    /// Also re-times voices that are already releasing.
    pub fn set_release(&mut self, seconds: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::Release(seconds))
    }

    pub fn set_delay_time(&mut self, seconds: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::DelayTime(seconds))
    }

    pub fn set_delay_feedback(&mut self, feedback: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::DelayFeedback(feedback))
    }

    pub fn set_delay_enabled(&mut self, enabled: bool) -> Result<(), EngineError> {
        self.set_param(ParamChange::DelayEnabled(enabled))
    }

    pub fn set_master_gain(&mut self, gain: f32) -> Result<(), EngineError> {
        self.set_param(ParamChange::MasterGain(gain))
    }

    /// Validate and store `change`, then push it to whatever is live.
    pub fn set_param(&mut self, change: ParamChange) -> Result<(), EngineError> {
        self.params.apply(change)?;
        if let Err(err) = self.apply_live(change) {
            warn!(?change, %err, "stored parameter could not be applied live");
        }
        Ok(())
    }

    fn apply_live(&mut self, change: ParamChange) -> Result<(), EngineError> {
        let now = self.context.current_time();
        let graph = self.context.graph_mut();

        match change {
            ParamChange::OscWaveform {
                slot,
                waveform: Some(waveform),
            } => {
                for voice in self.voices.active_voices() {
                    voice.set_waveform(graph, slot, waveform)?;
                }
            }
            // an off slot only affects voices built later
            ParamChange::OscWaveform { waveform: None, .. } => {}
            ParamChange::OscLevel { slot, level } => {
                for voice in self.voices.active_voices() {
                    voice.set_level(graph, slot, level)?;
                }
            }
            ParamChange::FilterType(_) | ParamChange::FilterCutoff(_) | ParamChange::FilterQ(_) => {
                if let Some(chain) = &self.chain {
                    chain.set_filter(graph, &self.params.filter)?;
                }
            }
            ParamChange::Attack(_) | ParamChange::Decay(_) | ParamChange::Sustain(_) => {}
            ParamChange::Release(seconds) => self.voices.retime_releases(graph, now, seconds),
            ParamChange::DelayTime(_)
            | ParamChange::DelayFeedback(_)
            | ParamChange::DelayEnabled(_) => {
                if let Some(chain) = &self.chain {
                    chain.set_delay(graph, &self.params.delay)?;
                }
            }
            ParamChange::MasterGain(gain) => {
                if let Some(chain) = &self.chain {
                    chain.set_master(graph, gain)?;
                }
            }
        }
        Ok(())
    }

    /// Apply every known key of `snapshot`, or nothing if any entry is bad.
    pub fn apply_snapshot(&mut self, snapshot: &ParameterSnapshot) -> Result<(), EngineError> {
        let changes = snapshot.to_changes()?;
        let count = changes.len();
        for change in changes {
            self.set_param(change)?;
        }
        info!(count, "snapshot applied");
        Ok(())
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        self.params.to_snapshot()
    }

    /// Drain the command queue on every `process_block`.
    pub fn attach_receiver(&mut self, rx: Consumer<EngineMessage>) {
        self.rx = Some(rx);
    }

    /// Apply queued commands. Errors are logged, not returned: there is no
    /// one on the audio thread to hand them to.
    pub fn process_messages<R: MessageReceiver>(&mut self, rx: &mut R) -> usize {
        let mut count = 0;
        while let Some(msg) = rx.pop() {
            self.handle_message(msg);
            count += 1;
        }
        count
    }

    fn handle_message(&mut self, msg: EngineMessage) {
        let result = match msg {
            EngineMessage::NoteOn { note } => self.note_on(note),
            EngineMessage::NoteOff { note } => {
                self.note_off(note);
                Ok(())
            }
            EngineMessage::StopAll => {
                self.stop_all();
                Ok(())
            }
            EngineMessage::Toggle => self.toggle().map(|_| ()),
            EngineMessage::Set(change) => self.set_param(change),
        };

        if let Err(err) = result {
            warn!(?msg, %err, "engine message rejected");
        }
    }

    /// Send a copy of every rendered sample to `tap`. Returns the previous
    /// tap, if any.
    pub fn attach_tap(&mut self, tap: Producer<f32>) -> Option<Producer<f32>> {
        self.tap.replace(tap)
    }

    pub fn detach_tap(&mut self) -> Option<Producer<f32>> {
        self.tap.take()
    }

    /// Render mono audio into `out`, any length.
    pub fn process_block(&mut self, out: &mut [f32]) {
        if let Some(mut rx) = self.rx.take() {
            self.process_messages(&mut rx);
            self.rx = Some(rx);
        }

        for chunk in out.chunks_mut(RENDER_QUANTUM) {
            let now = self.context.current_time();
            self.voices.collect_due(self.context.graph_mut(), now);
            self.context.render_quantum(chunk);
        }

        self.peak = out.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));

        if let Some(tap) = self.tap.as_mut() {
            for &sample in out.iter() {
                if tap.push(sample).is_err() {
                    self.tap_dropped += 1;
                }
            }
        }
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            time: self.context.current_time(),
            active_voices: self.voices.active_count(),
            releasing_voices: self.voices.releasing_count(),
            live_nodes: self.context.graph().len(),
            chain_built: self.chain.is_some(),
            toggled: self.is_toggled(),
            peak: self.peak,
            tap_dropped: self.tap_dropped,
        }
    }
}
