use crate::{
    graph::{
        arena::NodeGraph,
        node::{Node, NodeId, RenderCtx},
    },
    EngineError, RENDER_QUANTUM,
};

/// The clock, the node arena and the output sink.
///
/// Time only moves when audio is rendered: `current_time()` is the number of
/// frames rendered so far divided by the sample rate. Anything scheduled "now"
/// lands on the next quantum boundary.
pub struct AudioContext {
    sample_rate: f32,
    frame: u64,
    graph: NodeGraph,
    destination: NodeId,
}

impl AudioContext {
    pub fn new(sample_rate: f32, max_nodes: usize) -> Result<Self, EngineError> {
        let mut graph = NodeGraph::new(max_nodes);
        let destination = graph.create(Node::Destination)?;

        Ok(Self {
            sample_rate,
            frame: 0,
            graph,
            destination,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Frames rendered so far.
    pub fn current_frame(&self) -> u64 {
        self.frame
    }

    /// Seconds rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frame as f64 / self.sample_rate as f64
    }

    pub fn destination(&self) -> NodeId {
        self.destination
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        &mut self.graph
    }

    /// Render one quantum into `out` and advance the clock.
    pub fn render_quantum(&mut self, out: &mut [f32]) {
        debug_assert!(out.len() <= RENDER_QUANTUM);
        let ctx = RenderCtx {
            sample_rate: self.sample_rate,
            frame: self.frame,
        };
        self.graph.render(self.destination, out, &ctx);
        self.frame += out.len() as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_advances_with_rendering() {
        let mut context = AudioContext::new(1_000.0, 4).unwrap();
        assert_eq!(context.current_time(), 0.0);

        let mut out = [0.0f32; 100];
        context.render_quantum(&mut out);
        assert_eq!(context.current_frame(), 100);
        assert!((context.current_time() - 0.1).abs() < 1e-12);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn destination_counts_against_limit() {
        let context = AudioContext::new(48_000.0, 1).unwrap();
        assert_eq!(context.graph().len(), 1);
        assert!(AudioContext::new(48_000.0, 0).is_err());
    }
}
