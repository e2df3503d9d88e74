/// Circular delay buffer with separate read and write passes.
///
/// The graph reads a delay's output for a block before its input for that
/// block exists, which is what lets a feedback loop run through it. That
/// only works while the delay is at least one block long, so `read_block`
/// callers clamp accordingly.
#[derive(Debug, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0.0; capacity.max(1)],
            write_pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Fill `out` with the samples written `delay_samples` ago.
    pub fn read_block(&self, out: &mut [f32], delay_samples: usize) {
        let len = self.buffer.len();
        let delay_samples = delay_samples.min(len);
        let mut read_pos = (self.write_pos + len - delay_samples) % len;

        for sample in out.iter_mut() {
            *sample = self.buffer[read_pos];
            read_pos = (read_pos + 1) % len;
        }
    }

    pub fn write_block(&mut self, input: &[f32]) {
        let len = self.buffer.len();
        for &sample in input {
            self.buffer[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % len;
        }
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_comes_back_after_delay() {
        let mut line = DelayLine::new(64);
        let mut impulse = [0.0f32; 8];
        impulse[0] = 1.0;

        let mut out = [0.0f32; 8];
        let mut seen_at = None;
        for block in 0..4 {
            line.read_block(&mut out, 16);
            if let Some(i) = out.iter().position(|&s| s == 1.0) {
                seen_at = Some(block * 8 + i);
            }
            line.write_block(if block == 0 { &impulse } else { &[0.0; 8] });
        }

        assert_eq!(seen_at, Some(16));
    }

    #[test]
    fn reset_clears_history() {
        let mut line = DelayLine::new(16);
        line.write_block(&[1.0; 16]);
        line.reset();

        let mut out = [0.5f32; 4];
        line.read_block(&mut out, 4);
        assert_eq!(out, [0.0; 4]);
    }
}
