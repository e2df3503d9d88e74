use crate::{
    dsp::{
        delay::DelayLine,
        filter::{FilterType, SVFilter},
        oscillator::{OscillatorBlock, Waveform},
        param::AudioParam,
    },
    MAX_DELAY_SECONDS, RENDER_QUANTUM,
};

/// Handle to a node in a [`NodeGraph`](super::arena::NodeGraph).
///
/// The generation makes handles to removed nodes stale instead of letting
/// them alias whatever reuses the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Context passed to nodes while rendering one quantum.
///
/// - sample_rate: Audio sample rate (e.g., 48000.0)
/// - frame: Index of the first frame of the quantum on the context clock
#[derive(Debug, Clone, Copy)]
pub struct RenderCtx {
    pub sample_rate: f32,
    pub frame: u64,
}

impl RenderCtx {
    /// Context time (seconds) of the first frame.
    pub fn time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }
}

pub struct OscillatorNode {
    osc: OscillatorBlock,
    frequency: f64,
    stopped: bool,
}

impl OscillatorNode {
    pub fn new(waveform: Waveform, frequency: f64) -> Self {
        Self {
            osc: OscillatorBlock::new(waveform),
            frequency,
            stopped: false,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.osc.waveform()
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.osc.set_waveform(waveform);
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    /// Halt for good. A stopped oscillator renders silence.
    pub fn stop(&mut self) {
        self.stopped = true;
    }
}

pub struct GainNode {
    pub gain: AudioParam,
}

impl GainNode {
    pub fn new(gain: f32) -> Self {
        Self {
            gain: AudioParam::new(gain),
        }
    }
}

pub struct FilterNode {
    pub filter: SVFilter,
}

impl FilterNode {
    pub fn new(filter_type: FilterType, cutoff_hz: f32, q: f32) -> Self {
        Self {
            filter: SVFilter::new(filter_type, cutoff_hz, q),
        }
    }
}

pub struct DelayNode {
    line: DelayLine,
    delay_time: f32,
}

impl DelayNode {
    pub fn new(sample_rate: f32, delay_time: f32) -> Self {
        let capacity = ((MAX_DELAY_SECONDS * sample_rate).ceil() as usize).max(RENDER_QUANTUM)
            + RENDER_QUANTUM;
        Self {
            line: DelayLine::new(capacity),
            delay_time,
        }
    }

    pub fn delay_time(&self) -> f32 {
        self.delay_time
    }

    pub fn set_delay_time(&mut self, seconds: f32) {
        self.delay_time = seconds;
    }

    fn delay_samples(&self, sample_rate: f32) -> usize {
        let requested = (self.delay_time.max(0.0) * sample_rate).round() as usize;
        // feedback loops need a full quantum of delay
        requested.clamp(RENDER_QUANTUM, self.line.capacity() - RENDER_QUANTUM)
    }

    pub(crate) fn feed(&mut self, input: &[f32]) {
        self.line.write_block(input);
    }
}

pub enum Node {
    Oscillator(OscillatorNode),
    Gain(GainNode),
    Filter(FilterNode),
    Delay(DelayNode),
    /// Sums its inputs. The context's output sink.
    Destination,
}

impl Node {
    pub fn is_delay(&self) -> bool {
        matches!(self, Node::Delay(_))
    }

    /// Render one quantum. `input` is the sum of all connected sources
    /// (empty for delays, which are fed after the pass).
    pub(crate) fn process(&mut self, input: &[f32], out: &mut [f32], ctx: &RenderCtx) {
        match self {
            Node::Oscillator(node) => {
                if node.stopped {
                    out.fill(0.0);
                } else {
                    node.osc.render(out, node.frequency, ctx.sample_rate);
                }
            }
            Node::Gain(node) => {
                let mut gains = [0.0f32; RENDER_QUANTUM];
                let gains = &mut gains[..out.len()];
                node.gain.render(gains, ctx.time(), ctx.sample_rate);

                for ((o, i), g) in out.iter_mut().zip(input).zip(gains.iter()) {
                    *o = i * g;
                }
            }
            Node::Filter(node) => {
                out.copy_from_slice(input);
                node.filter.render(out, ctx.sample_rate);
            }
            Node::Delay(node) => {
                let delay_samples = node.delay_samples(ctx.sample_rate);
                node.line.read_block(out, delay_samples);
            }
            Node::Destination => out.copy_from_slice(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: RenderCtx = RenderCtx {
        sample_rate: 1_000.0,
        frame: 0,
    };

    #[test]
    fn gain_follows_automation() {
        let mut gain = GainNode::new(0.0);
        gain.gain.set_value_at_time(0.0, 0.0);
        gain.gain.linear_ramp_to_value_at_time(1.0, 0.01);
        let mut node = Node::Gain(gain);

        let input = [2.0f32; 20];
        let mut out = [0.0f32; 20];
        node.process(&input, &mut out, &CTX);

        assert_eq!(out[0], 0.0);
        assert!((out[5] - 1.0).abs() < 1e-4);
        assert!((out[15] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn stopped_oscillator_is_silent() {
        let mut osc = OscillatorNode::new(Waveform::Square, 100.0);
        osc.stop();
        let mut node = Node::Oscillator(osc);

        let mut out = [1.0f32; 32];
        node.process(&[], &mut out, &CTX);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn zero_delay_returns_previous_quantum() {
        let mut delay = DelayNode::new(1_000.0, 0.0);
        let mut impulse = [0.0f32; RENDER_QUANTUM];
        impulse[0] = 1.0;
        delay.feed(&impulse);

        let mut node = Node::Delay(delay);
        let mut out = [0.0f32; RENDER_QUANTUM];
        node.process(&[], &mut out, &CTX);

        assert_eq!(out[0], 1.0);
        assert!(out[1..].iter().all(|&s| s == 0.0));
    }
}
