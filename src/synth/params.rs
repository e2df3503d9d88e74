//! Parameter Set: the single source of truth for every sound setting.
//!
//! Values are stored exactly as they were set, so a snapshot read back
//! reproduces what was applied. Clamping for audio safety happens when a
//! value reaches a node, never here.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    dsp::{
        envelope::Adsr,
        filter::FilterType,
        oscillator::{parse_slot_waveform, slot_waveform_name, Waveform},
    },
    EngineError, MAX_DELAY_SECONDS, OSC_SLOTS,
};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorSettings {
    /// `None` means the slot is off and builds no oscillator.
    pub waveform: Option<Waveform>,
    pub level: f32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSettings {
    pub filter_type: FilterType,
    pub cutoff: f32,
    pub q: f32,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelaySettings {
    pub time: f32,
    pub feedback: f32,
    pub enabled: bool,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSet {
    pub oscillators: [OscillatorSettings; OSC_SLOTS],
    pub filter: FilterSettings,
    pub envelope: Adsr,
    pub delay: DelaySettings,
    pub master_gain: f32,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            oscillators: [
                OscillatorSettings {
                    waveform: Some(Waveform::Sawtooth),
                    level: 0.5,
                },
                OscillatorSettings {
                    waveform: None,
                    level: 0.3,
                },
                OscillatorSettings {
                    waveform: None,
                    level: 0.3,
                },
            ],
            filter: FilterSettings {
                filter_type: FilterType::LowPass,
                cutoff: 2_000.0,
                q: 1.0,
            },
            envelope: Adsr::default(),
            delay: DelaySettings {
                time: 0.3,
                feedback: 0.3,
                enabled: false,
            },
            master_gain: 0.5,
        }
    }
}

/// One parameter update. Every setter on the engine is expressed as one of
/// these so updates can also travel through the realtime message queue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    OscWaveform {
        slot: usize,
        waveform: Option<Waveform>,
    },
    OscLevel {
        slot: usize,
        level: f32,
    },
    FilterType(FilterType),
    FilterCutoff(f32),
    FilterQ(f32),
    Attack(f32),
    Decay(f32),
    Sustain(f32),
    Release(f32),
    DelayTime(f32),
    DelayFeedback(f32),
    DelayEnabled(bool),
    MasterGain(f32),
}

fn check(name: &'static str, value: f32, ok: bool) -> Result<(), EngineError> {
    if value.is_finite() && ok {
        Ok(())
    } else {
        Err(EngineError::InvalidParameter { name, value })
    }
}

impl ParamChange {
    pub fn validate(&self) -> Result<(), EngineError> {
        match *self {
            ParamChange::OscWaveform { slot, .. } => check_slot(slot),
            ParamChange::OscLevel { slot, level } => {
                check_slot(slot)?;
                check("osc.level", level, (0.0..=1.0).contains(&level))
            }
            ParamChange::FilterType(_) | ParamChange::DelayEnabled(_) => Ok(()),
            ParamChange::FilterCutoff(hz) => check("filter.cutoff", hz, hz > 0.0),
            ParamChange::FilterQ(q) => check("filter.q", q, q > 0.0),
            ParamChange::Attack(s) => check("env.attack", s, s >= 0.0),
            ParamChange::Decay(s) => check("env.decay", s, s >= 0.0),
            ParamChange::Sustain(level) => {
                check("env.sustain", level, (0.0..=1.0).contains(&level))
            }
            ParamChange::Release(s) => check("env.release", s, s >= 0.0),
            ParamChange::DelayTime(s) => check(
                "delay.time",
                s,
                (0.0..=MAX_DELAY_SECONDS).contains(&s),
            ),
            ParamChange::DelayFeedback(fb) => {
                check("delay.feedback", fb, (0.0..=1.0).contains(&fb))
            }
            ParamChange::MasterGain(gain) => {
                check("master.gain", gain, (0.0..=1.0).contains(&gain))
            }
        }
    }
}

fn check_slot(slot: usize) -> Result<(), EngineError> {
    if slot < OSC_SLOTS {
        Ok(())
    } else {
        Err(EngineError::InvalidSlot(slot))
    }
}

impl ParameterSet {
    /// Validate and store one change. Nothing is stored on error.
    pub fn apply(&mut self, change: ParamChange) -> Result<(), EngineError> {
        change.validate()?;

        match change {
            ParamChange::OscWaveform { slot, waveform } => {
                self.oscillators[slot].waveform = waveform
            }
            ParamChange::OscLevel { slot, level } => self.oscillators[slot].level = level,
            ParamChange::FilterType(filter_type) => self.filter.filter_type = filter_type,
            ParamChange::FilterCutoff(hz) => self.filter.cutoff = hz,
            ParamChange::FilterQ(q) => self.filter.q = q,
            ParamChange::Attack(s) => self.envelope.attack = s,
            ParamChange::Decay(s) => self.envelope.decay = s,
            ParamChange::Sustain(level) => self.envelope.sustain = level,
            ParamChange::Release(s) => self.envelope.release = s,
            ParamChange::DelayTime(s) => self.delay.time = s,
            ParamChange::DelayFeedback(fb) => self.delay.feedback = fb,
            ParamChange::DelayEnabled(enabled) => self.delay.enabled = enabled,
            ParamChange::MasterGain(gain) => self.master_gain = gain,
        }
        Ok(())
    }

    pub fn to_snapshot(&self) -> ParameterSnapshot {
        let mut snapshot = ParameterSnapshot::new();

        for (slot, osc) in self.oscillators.iter().enumerate() {
            snapshot.insert(
                format!("osc{}.waveform", slot + 1),
                ParamValue::Text(slot_waveform_name(osc.waveform).to_string()),
            );
            snapshot.insert(format!("osc{}.level", slot + 1), ParamValue::Number(osc.level));
        }

        snapshot.insert(
            "filter.type",
            ParamValue::Text(self.filter.filter_type.as_str().to_string()),
        );
        snapshot.insert("filter.cutoff", ParamValue::Number(self.filter.cutoff));
        snapshot.insert("filter.q", ParamValue::Number(self.filter.q));
        snapshot.insert("env.attack", ParamValue::Number(self.envelope.attack));
        snapshot.insert("env.decay", ParamValue::Number(self.envelope.decay));
        snapshot.insert("env.sustain", ParamValue::Number(self.envelope.sustain));
        snapshot.insert("env.release", ParamValue::Number(self.envelope.release));
        snapshot.insert("delay.time", ParamValue::Number(self.delay.time));
        snapshot.insert("delay.feedback", ParamValue::Number(self.delay.feedback));
        snapshot.insert("delay.enabled", ParamValue::Bool(self.delay.enabled));
        snapshot.insert("master.gain", ParamValue::Number(self.master_gain));

        snapshot
    }
}

/// Loose value type of an external preset store.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Number(f32),
    Text(String),
}

/// Flat `key → value` view of a [`ParameterSet`], as stored by presets.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSnapshot {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Translate every known key into a validated change.
    ///
    /// Fails on the first bad entry without applying anything; unknown keys
    /// are skipped so stores can keep their own metadata alongside.
    pub fn to_changes(&self) -> Result<Vec<ParamChange>, EngineError> {
        let mut changes = Vec::with_capacity(self.values.len());
        for (key, value) in &self.values {
            match change_for(key, value)? {
                Some(change) => {
                    change.validate()?;
                    changes.push(change);
                }
                None => debug!(key = key.as_str(), "ignoring unknown snapshot key"),
            }
        }
        Ok(changes)
    }

    #[cfg(feature = "serde")]
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

fn change_for(key: &str, value: &ParamValue) -> Result<Option<ParamChange>, EngineError> {
    let wrong_type = || EngineError::SnapshotType {
        key: key.to_string(),
    };
    let number = || match value {
        ParamValue::Number(n) => Ok(*n),
        _ => Err(wrong_type()),
    };
    let text = || match value {
        ParamValue::Text(s) => Ok(s.as_str()),
        _ => Err(wrong_type()),
    };

    if let Some((prefix, field)) = key.split_once('.') {
        if let Some(slot) = prefix
            .strip_prefix("osc")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|n| (1..=OSC_SLOTS).contains(n))
            .map(|n| n - 1)
        {
            return match field {
                "waveform" => Ok(Some(ParamChange::OscWaveform {
                    slot,
                    waveform: parse_slot_waveform(text()?)?,
                })),
                "level" => Ok(Some(ParamChange::OscLevel {
                    slot,
                    level: number()?,
                })),
                _ => Ok(None),
            };
        }
    }

    let change = match key {
        "filter.type" => ParamChange::FilterType(text()?.parse()?),
        "filter.cutoff" => ParamChange::FilterCutoff(number()?),
        "filter.q" => ParamChange::FilterQ(number()?),
        "env.attack" => ParamChange::Attack(number()?),
        "env.decay" => ParamChange::Decay(number()?),
        "env.sustain" => ParamChange::Sustain(number()?),
        "env.release" => ParamChange::Release(number()?),
        "delay.time" => ParamChange::DelayTime(number()?),
        "delay.feedback" => ParamChange::DelayFeedback(number()?),
        "delay.enabled" => match value {
            ParamValue::Bool(enabled) => ParamChange::DelayEnabled(*enabled),
            _ => return Err(wrong_type()),
        },
        "master.gain" => ParamChange::MasterGain(number()?),
        _ => return Ok(None),
    };
    Ok(Some(change))
}
