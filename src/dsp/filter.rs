use std::{f32::consts::PI, fmt, str::FromStr};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::EngineError;

/*
| type              | passes          | rejects      |
| ----------------- | --------------- | ------------ |
| low-pass          | below cutoff    | above cutoff |
| high-pass         | above cutoff    | below cutoff |
| band-pass         | around cutoff   | elsewhere    |
| notch / band-stop | elsewhere       | around cutoff|

One state-variable filter produces all four responses from the same two
integrators, so switching type on a sounding chain keeps the filter state
and does not click.

Q maps to damping as k = 1/Q. Q = 0.707 is the flat (Butterworth)
low-pass; higher Q rings at the cutoff.
*/

const MIN_CUTOFF_HZ: f32 = 10.0;
const MIN_Q: f32 = 0.05;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    LowPass,
    HighPass,
    BandPass,
    Notch,
}

impl FilterType {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterType::LowPass => "lowpass",
            FilterType::HighPass => "highpass",
            FilterType::BandPass => "bandpass",
            FilterType::Notch => "notch",
        }
    }
}

impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lowpass" => Ok(FilterType::LowPass),
            "highpass" => Ok(FilterType::HighPass),
            "bandpass" => Ok(FilterType::BandPass),
            "notch" => Ok(FilterType::Notch),
            _ => Err(EngineError::InvalidFilterType(s.to_string())),
        }
    }
}

pub struct FilterOutputs {
    pub lowpass: f32,
    pub bandpass: f32,
    pub highpass: f32,
    pub notch: f32,
}

#[derive(Debug, Clone)]
pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    cutoff_hz: f32,
    q: f32,
    filter_type: FilterType,
}

impl SVFilter {
    pub fn new(filter_type: FilterType, cutoff_hz: f32, q: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            q,
            filter_type,
        }
    }

    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::LowPass, cutoff_hz, std::f32::consts::FRAC_1_SQRT_2)
    }

    pub fn highpass(cutoff_hz: f32) -> Self {
        Self::new(FilterType::HighPass, cutoff_hz, std::f32::consts::FRAC_1_SQRT_2)
    }

    #[inline]
    fn compute_g(&self, sample_rate: f32) -> f32 {
        let cutoff = self.cutoff_hz.max(MIN_CUTOFF_HZ).min(sample_rate * 0.49);
        (PI * cutoff / sample_rate).tan()
    }

    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> FilterOutputs {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        FilterOutputs {
            lowpass: v2,
            bandpass: v1,
            highpass: sample - k * v1 - v2,
            notch: sample - k * v1,
        }
    }

    pub fn render(&mut self, buffer: &mut [f32], sample_rate: f32) {
        let g = self.compute_g(sample_rate);
        let k = 1.0 / self.q.max(MIN_Q);

        for sample in buffer.iter_mut() {
            let outputs = self.next_sample(*sample, k, g);

            *sample = match self.filter_type {
                FilterType::LowPass => outputs.lowpass,
                FilterType::HighPass => outputs.highpass,
                FilterType::BandPass => outputs.bandpass,
                FilterType::Notch => outputs.notch,
            }
        }
    }

    pub fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn q(&self) -> f32 {
        self.q
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.cutoff_hz = cutoff;
    }

    pub fn set_q(&mut self, q: f32) {
        self.q = q;
    }

    pub fn set_filter_type(&mut self, filter_type: FilterType) {
        self.filter_type = filter_type;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::oscillator::{OscillatorBlock, Waveform};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn sine(freq: f64, len: usize) -> Vec<f32> {
        let mut osc = OscillatorBlock::new(Waveform::Sine);
        let mut buffer = vec![0.0f32; len];
        osc.render(&mut buffer, freq, SAMPLE_RATE);
        buffer
    }

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        let skip = buffer.len().min(64);
        buffer
            .get(skip..)
            .unwrap_or(buffer)
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn test_lowpass_basic() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = vec![1.0; 256];

        filter.render(&mut buffer, SAMPLE_RATE);

        assert!(buffer[255] > 0.99);
    }

    #[test]
    fn test_highpass_basic() {
        let mut filter = SVFilter::highpass(500.0);
        let mut buffer = vec![1.0; 256];

        filter.render(&mut buffer, SAMPLE_RATE);

        assert!(buffer[255].abs() < 0.01);
    }

    #[test]
    fn test_lowpass_filters_high_freq() {
        let mut filter = SVFilter::lowpass(500.0);
        let mut buffer = sine(5_000.0, 512);

        filter.render(&mut buffer, SAMPLE_RATE);

        let peak = peak_after_transient(&buffer);
        assert!(peak < 0.3, "Expected high freq attenuation, got peak: {}", peak);
    }

    #[test]
    fn test_notch_rejects_cutoff_frequency() {
        let mut filter = SVFilter::new(FilterType::Notch, 1_000.0, 2.0);
        let mut center = sine(1_000.0, 2048);
        filter.render(&mut center, SAMPLE_RATE);
        let center_peak = peak_after_transient(&center[1024..]);

        filter.reset();
        let mut off = sine(200.0, 2048);
        filter.render(&mut off, SAMPLE_RATE);
        let off_peak = peak_after_transient(&off[1024..]);

        assert!(
            center_peak * 2.0 < off_peak,
            "expected notch to reject center freq, got center_peak={}, off_peak={}",
            center_peak,
            off_peak
        );
    }

    #[test]
    fn test_type_switch_keeps_running() {
        let mut filter = SVFilter::lowpass(1_000.0);
        let mut buffer = sine(1_000.0, 256);
        filter.render(&mut buffer, SAMPLE_RATE);

        filter.set_filter_type(FilterType::HighPass);
        filter.set_q(8.0);
        filter.set_cutoff(30_000.0); // above nyquist, clamped
        let mut buffer = sine(1_000.0, 256);
        filter.render(&mut buffer, SAMPLE_RATE);

        assert!(buffer.iter().all(|s| s.is_finite()));
        assert_eq!(filter.filter_type(), FilterType::HighPass);
    }

    #[test]
    fn test_parse_filter_type() {
        assert_eq!("lowpass".parse::<FilterType>(), Ok(FilterType::LowPass));
        assert_eq!("Notch".parse::<FilterType>(), Ok(FilterType::Notch));
        assert!("peaking".parse::<FilterType>().is_err());
    }

    #[test]
    fn cutoff_floor_above_nyquist_does_not_panic() {
        // 0.49 * 16 Hz is below the 10 Hz cutoff floor
        let mut filter = SVFilter::lowpass(1_000.0);
        let mut buffer = vec![0.5f32; 32];
        filter.render(&mut buffer, 16.0);
        assert!(buffer.iter().all(|s| s.is_finite()));
    }
}
