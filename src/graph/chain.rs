use tracing::debug;

use crate::{
    graph::{
        arena::NodeGraph,
        node::{DelayNode, FilterNode, GainNode, Node, NodeId},
    },
    synth::params::{DelaySettings, FilterSettings, ParameterSet},
    EngineError, MAX_DELAY_SECONDS,
};

/*
Shared Chain
============

Every voice ends at the filter input. From there:

    filter ──┬──────────────→ dry ──────────┐
             │                              ↓
             └──→ delay ──┬──→ wet ──→ master ──→ destination
                  ↑       │
                  └─ feedback ←┘

The chain is built once, the first time a note needs it. Nodes are created
from the output backwards so each one has somewhere to connect to the
moment it exists.

Delay on/off only moves the wet gain; the delay line keeps running so
re-enabling it does not click, and its history drains through the
feedback gain.
*/

/// Wet level while the delay is enabled.
pub const WET_LEVEL: f32 = 0.5;
pub const DRY_LEVEL: f32 = 1.0;
/// Feedback is capped below unity so the loop always decays.
pub const MAX_FEEDBACK: f32 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharedChain {
    filter: NodeId,
    delay: NodeId,
    feedback: NodeId,
    wet: NodeId,
    dry: NodeId,
    master: NodeId,
}

/// Tracks nodes created during a multi-node build so a failure can undo it.
pub(crate) struct Rollback<'a> {
    graph: &'a mut NodeGraph,
    created: Vec<NodeId>,
}

impl<'a> Rollback<'a> {
    pub(crate) fn new(graph: &'a mut NodeGraph) -> Self {
        Self {
            graph,
            created: Vec::new(),
        }
    }

    pub(crate) fn create(&mut self, node: Node) -> Result<NodeId, EngineError> {
        let id = self.graph.create(node)?;
        self.created.push(id);
        Ok(id)
    }

    pub(crate) fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        self.graph.connect(from, to)
    }

    /// Keep everything that was built.
    pub(crate) fn commit(mut self) {
        self.created.clear();
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        for id in self.created.drain(..).rev() {
            self.graph.remove(id);
        }
    }
}

impl SharedChain {
    pub fn build(
        graph: &mut NodeGraph,
        destination: NodeId,
        params: &ParameterSet,
        sample_rate: f32,
    ) -> Result<Self, EngineError> {
        let mut build = Rollback::new(graph);

        let master = build.create(Node::Gain(GainNode::new(master_level(params.master_gain))))?;
        build.connect(master, destination)?;

        let dry = build.create(Node::Gain(GainNode::new(DRY_LEVEL)))?;
        let delay = build.create(Node::Delay(DelayNode::new(
            sample_rate,
            delay_seconds(params.delay.time),
        )))?;
        let wet = build.create(Node::Gain(GainNode::new(wet_level(&params.delay))))?;
        build.connect(dry, master)?;
        build.connect(delay, wet)?;
        build.connect(wet, master)?;

        let feedback = build.create(Node::Gain(GainNode::new(feedback_level(
            params.delay.feedback,
        ))))?;
        build.connect(delay, feedback)?;
        build.connect(feedback, delay)?;

        let FilterSettings {
            filter_type,
            cutoff,
            q,
        } = params.filter;
        let filter = build.create(Node::Filter(FilterNode::new(filter_type, cutoff, q)))?;
        build.connect(filter, dry)?;
        build.connect(filter, delay)?;

        build.commit();
        debug!("shared chain built");

        Ok(Self {
            filter,
            delay,
            feedback,
            wet,
            dry,
            master,
        })
    }

    /// Where voices connect their envelope output.
    pub fn filter_input(&self) -> NodeId {
        self.filter
    }

    pub fn master(&self) -> NodeId {
        self.master
    }

    pub fn delay(&self) -> NodeId {
        self.delay
    }

    pub fn wet(&self) -> NodeId {
        self.wet
    }

    pub fn dry(&self) -> NodeId {
        self.dry
    }

    pub fn feedback(&self) -> NodeId {
        self.feedback
    }

    pub fn set_filter(
        &self,
        graph: &mut NodeGraph,
        settings: &FilterSettings,
    ) -> Result<(), EngineError> {
        let node = graph.filter_mut(self.filter)?;
        node.filter.set_filter_type(settings.filter_type);
        node.filter.set_cutoff(settings.cutoff);
        node.filter.set_q(settings.q);
        Ok(())
    }

    pub fn set_delay(
        &self,
        graph: &mut NodeGraph,
        settings: &DelaySettings,
    ) -> Result<(), EngineError> {
        graph
            .delay_mut(self.delay)?
            .set_delay_time(delay_seconds(settings.time));
        graph
            .gain_param_mut(self.feedback)?
            .set_value(feedback_level(settings.feedback));
        graph.gain_param_mut(self.wet)?.set_value(wet_level(settings));
        Ok(())
    }

    pub fn set_master(&self, graph: &mut NodeGraph, gain: f32) -> Result<(), EngineError> {
        graph.gain_param_mut(self.master)?.set_value(master_level(gain));
        Ok(())
    }

    /// Remove every chain node. Safe to call on an already torn down chain.
    pub fn teardown(&self, graph: &mut NodeGraph) {
        for id in [
            self.filter,
            self.delay,
            self.feedback,
            self.wet,
            self.dry,
            self.master,
        ] {
            graph.remove(id);
        }
    }
}

fn master_level(gain: f32) -> f32 {
    gain.clamp(0.0, 1.0)
}

fn feedback_level(feedback: f32) -> f32 {
    feedback.clamp(0.0, MAX_FEEDBACK)
}

fn delay_seconds(time: f32) -> f32 {
    time.clamp(0.0, MAX_DELAY_SECONDS)
}

fn wet_level(settings: &DelaySettings) -> f32 {
    if settings.enabled {
        WET_LEVEL
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dsp::filter::FilterType, graph::node::RenderCtx, RENDER_QUANTUM};

    const SAMPLE_RATE: f32 = 48_000.0;

    fn graph_with_sink(max_nodes: usize) -> (NodeGraph, NodeId) {
        let mut graph = NodeGraph::new(max_nodes);
        let sink = graph.create(Node::Destination).unwrap();
        (graph, sink)
    }

    #[test]
    fn build_wires_the_whole_chain() {
        let (mut graph, sink) = graph_with_sink(16);
        let chain = SharedChain::build(&mut graph, sink, &ParameterSet::default(), SAMPLE_RATE)
            .unwrap();

        assert_eq!(graph.len(), 7);
        assert!(graph.is_connected(chain.master(), sink));
        assert!(graph.is_connected(chain.dry(), chain.master()));
        assert!(graph.is_connected(chain.wet(), chain.master()));
        assert!(graph.is_connected(chain.delay(), chain.wet()));
        assert!(graph.is_connected(chain.delay(), chain.feedback()));
        assert!(graph.is_connected(chain.feedback(), chain.delay()));
        assert!(graph.is_connected(chain.filter_input(), chain.dry()));
        assert!(graph.is_connected(chain.filter_input(), chain.delay()));
    }

    #[test]
    fn failed_build_leaves_nothing_behind() {
        for limit in 1..7 {
            let (mut graph, sink) = graph_with_sink(limit);
            let result =
                SharedChain::build(&mut graph, sink, &ParameterSet::default(), SAMPLE_RATE);

            assert!(matches!(result, Err(EngineError::NodeLimit { .. })));
            assert_eq!(graph.len(), 1);
            assert!(graph.inputs(sink).unwrap().is_empty());
        }
    }

    #[test]
    fn delay_toggle_moves_wet_gain_only() {
        let (mut graph, sink) = graph_with_sink(16);
        let mut params = ParameterSet::default();
        let chain = SharedChain::build(&mut graph, sink, &params, SAMPLE_RATE).unwrap();
        assert_eq!(graph.gain_param(chain.wet()).unwrap().value_at(0.0), 0.0);

        params.delay.enabled = true;
        params.delay.feedback = 1.0;
        chain.set_delay(&mut graph, &params.delay).unwrap();

        assert_eq!(graph.gain_param(chain.wet()).unwrap().value_at(0.0), WET_LEVEL);
        assert_eq!(
            graph.gain_param(chain.feedback()).unwrap().value_at(0.0),
            MAX_FEEDBACK
        );
    }

    #[test]
    fn live_filter_update() {
        let (mut graph, sink) = graph_with_sink(16);
        let chain = SharedChain::build(&mut graph, sink, &ParameterSet::default(), SAMPLE_RATE)
            .unwrap();

        let settings = FilterSettings {
            filter_type: FilterType::HighPass,
            cutoff: 500.0,
            q: 4.0,
        };
        chain.set_filter(&mut graph, &settings).unwrap();

        let node = graph.filter_mut(chain.filter_input()).unwrap();
        assert_eq!(node.filter.filter_type(), FilterType::HighPass);
        assert_eq!(node.filter.cutoff(), 500.0);
        assert_eq!(node.filter.q(), 4.0);
    }

    #[test]
    fn teardown_is_idempotent_and_silent() {
        let (mut graph, sink) = graph_with_sink(16);
        let chain = SharedChain::build(&mut graph, sink, &ParameterSet::default(), SAMPLE_RATE)
            .unwrap();
        chain.teardown(&mut graph);
        chain.teardown(&mut graph);
        assert_eq!(graph.len(), 1);

        let ctx = RenderCtx {
            sample_rate: SAMPLE_RATE,
            frame: 0,
        };
        let mut out = [1.0f32; RENDER_QUANTUM];
        graph.render(sink, &mut out, &ctx);
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
