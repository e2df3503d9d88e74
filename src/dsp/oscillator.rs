use std::{f64::consts::TAU, fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Audio-band waveform of an oscillator slot. A slot that is "off" has no
/// waveform at all (`Option<Waveform>::None`) and builds no oscillator.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const ALL: [Waveform; 4] = [
        Waveform::Sine,
        Waveform::Square,
        Waveform::Sawtooth,
        Waveform::Triangle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    /// Value of one cycle at `phase` in [0, 1).
    #[inline]
    fn sample(self, phase: f64) -> f32 {
        let value = match self {
            Waveform::Sine => (phase * TAU).sin(),
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        };
        value as f32
    }
}

impl fmt::Display for Waveform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Waveform {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sine" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" => Ok(Waveform::Triangle),
            _ => Err(EngineError::InvalidWaveform(s.to_string())),
        }
    }
}

/// Parse a slot setting: one of the four waveforms, or `"off"`.
pub fn parse_slot_waveform(s: &str) -> Result<Option<Waveform>, EngineError> {
    if s.trim().eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    s.parse().map(Some)
}

/// Display form of a slot setting.
pub fn slot_waveform_name(waveform: Option<Waveform>) -> &'static str {
    waveform.map_or("off", Waveform::as_str)
}

/// Naive (non band-limited) phase-accumulator oscillator.
#[derive(Debug, Clone)]
pub struct OscillatorBlock {
    waveform: Waveform,
    phase: f64,
}

impl OscillatorBlock {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Change shape without resetting phase, so a live switch does not jump.
    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    pub fn render(&mut self, out: &mut [f32], frequency: f64, sample_rate: f32) {
        let nyquist = sample_rate as f64 * 0.5;
        // out-of-range notes produce odd pitches, never NaN
        let frequency = if frequency.is_finite() {
            frequency.clamp(0.0, nyquist)
        } else if frequency > 0.0 {
            nyquist
        } else {
            0.0
        };
        let increment = frequency / sample_rate as f64;

        for sample in out.iter_mut() {
            *sample = self.waveform.sample(self.phase);
            self.phase += increment;
            if self.phase >= 1.0 {
                self.phase -= self.phase.floor();
            }
        }
    }
}
