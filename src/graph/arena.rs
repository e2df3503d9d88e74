use petgraph::{
    algo::{tarjan_scc, toposort},
    stable_graph::{NodeIndex, StableDiGraph},
    visit::{EdgeFiltered, EdgeRef},
    Direction,
};
use tracing::{trace, warn};

use crate::{
    dsp::param::AudioParam,
    graph::node::{DelayNode, FilterNode, Node, NodeId, OscillatorNode, RenderCtx},
    EngineError, RENDER_QUANTUM,
};

/*
Node Arena
==========

Nodes live in a petgraph `StableDiGraph`, whose indices survive removals.
Handles carry the index and a per-index generation; removing a node bumps
the generation, so old handles go stale rather than pointing at whatever
reuses the index.

Edges run from source to consumer; a node pulls by summing the outputs of
its incoming neighbours:

    osc ──→ level ──→ envelope ──→ filter ──┬──→ dry ────────────→ master ──→ destination
                                            └──→ delay ──→ wet ──↗
                                                   ↑  └──→ feedback
                                                   └─────────┘

Render Order
------------

Nodes are processed in topological order, recomputed lazily after any
topology change. Edges *into* delay nodes are filtered out of the sort: a
delay emits last quantum's history first, and is fed its inputs after the
whole pass. That is what makes the delay → feedback → delay loop legal.
A cycle with no delay in it cannot be ordered; its nodes render silence.
*/

struct Entry {
    node: Node,
    output: Box<[f32; RENDER_QUANTUM]>,
}

pub struct NodeGraph {
    graph: StableDiGraph<Entry, ()>,
    generations: Vec<u32>,
    max_nodes: usize,
    order: Vec<NodeIndex>,
    order_dirty: bool,
}

impl NodeGraph {
    pub fn new(max_nodes: usize) -> Self {
        let capacity = max_nodes.min(1024);
        Self {
            graph: StableDiGraph::with_capacity(capacity, capacity),
            generations: Vec::with_capacity(capacity),
            max_nodes,
            order: Vec::new(),
            order_dirty: true,
        }
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn create(&mut self, node: Node) -> Result<NodeId, EngineError> {
        if self.graph.node_count() >= self.max_nodes {
            return Err(EngineError::NodeLimit {
                limit: self.max_nodes,
            });
        }

        let index = self.graph.add_node(Entry {
            node,
            output: Box::new([0.0; RENDER_QUANTUM]),
        });
        if index.index() >= self.generations.len() {
            self.generations.resize(index.index() + 1, 0);
        }

        self.order_dirty = true;
        Ok(self.id_of(index))
    }

    /// Route `from`'s output into `to`. Connecting twice is a no-op.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), EngineError> {
        let src = self.index_of(from).ok_or(EngineError::StaleNode(from))?;
        let dst = self.index_of(to).ok_or(EngineError::StaleNode(to))?;
        if !self.graph.contains_edge(src, dst) {
            self.graph.add_edge(src, dst, ());
            self.order_dirty = true;
        }
        Ok(())
    }

    /// Remove every outgoing edge of `id`.
    pub fn disconnect(&mut self, id: NodeId) {
        let Some(index) = self.index_of(id) else {
            return;
        };
        let edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| edge.id())
            .collect();
        if edges.is_empty() {
            return;
        }
        for edge in edges {
            self.graph.remove_edge(edge);
        }
        self.order_dirty = true;
    }

    /// Disconnect and free a node. Returns false if it was already gone.
    pub fn remove(&mut self, id: NodeId) -> bool {
        let Some(index) = self.index_of(id) else {
            return false;
        };

        self.graph.remove_node(index);
        let generation = &mut self.generations[index.index()];
        *generation = generation.wrapping_add(1);
        self.order_dirty = true;
        true
    }

    /// Sources currently feeding `id`.
    pub fn inputs(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let index = self.index_of(id)?;
        Some(
            self.graph
                .neighbors_directed(index, Direction::Incoming)
                .map(|src| self.id_of(src))
                .collect(),
        )
    }

    pub fn is_connected(&self, from: NodeId, to: NodeId) -> bool {
        match (self.index_of(from), self.index_of(to)) {
            (Some(src), Some(dst)) => self.graph.contains_edge(src, dst),
            _ => false,
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.entry(id).map(|e| &e.node)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.entry_mut(id).map(|e| &mut e.node)
    }

    pub fn gain_param_mut(&mut self, id: NodeId) -> Result<&mut AudioParam, EngineError> {
        match self.node_mut(id) {
            Some(Node::Gain(gain)) => Ok(&mut gain.gain),
            Some(_) => Err(EngineError::NodeKind { id, expected: "gain" }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn gain_param(&self, id: NodeId) -> Result<&AudioParam, EngineError> {
        match self.node(id) {
            Some(Node::Gain(gain)) => Ok(&gain.gain),
            Some(_) => Err(EngineError::NodeKind { id, expected: "gain" }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn oscillator_mut(&mut self, id: NodeId) -> Result<&mut OscillatorNode, EngineError> {
        match self.node_mut(id) {
            Some(Node::Oscillator(osc)) => Ok(osc),
            Some(_) => Err(EngineError::NodeKind {
                id,
                expected: "oscillator",
            }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn oscillator(&self, id: NodeId) -> Result<&OscillatorNode, EngineError> {
        match self.node(id) {
            Some(Node::Oscillator(osc)) => Ok(osc),
            Some(_) => Err(EngineError::NodeKind {
                id,
                expected: "oscillator",
            }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn filter_mut(&mut self, id: NodeId) -> Result<&mut FilterNode, EngineError> {
        match self.node_mut(id) {
            Some(Node::Filter(filter)) => Ok(filter),
            Some(_) => Err(EngineError::NodeKind {
                id,
                expected: "filter",
            }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn filter(&self, id: NodeId) -> Result<&FilterNode, EngineError> {
        match self.node(id) {
            Some(Node::Filter(filter)) => Ok(filter),
            Some(_) => Err(EngineError::NodeKind {
                id,
                expected: "filter",
            }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn delay(&self, id: NodeId) -> Result<&DelayNode, EngineError> {
        match self.node(id) {
            Some(Node::Delay(delay)) => Ok(delay),
            Some(_) => Err(EngineError::NodeKind { id, expected: "delay" }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    pub fn delay_mut(&mut self, id: NodeId) -> Result<&mut DelayNode, EngineError> {
        match self.node_mut(id) {
            Some(Node::Delay(delay)) => Ok(delay),
            Some(_) => Err(EngineError::NodeKind { id, expected: "delay" }),
            None => Err(EngineError::StaleNode(id)),
        }
    }

    /// Render one quantum (`out.len() <= RENDER_QUANTUM`) and copy the
    /// output of `sink` into `out`.
    pub fn render(&mut self, sink: NodeId, out: &mut [f32], ctx: &RenderCtx) {
        debug_assert!(out.len() <= RENDER_QUANTUM);
        let len = out.len();

        if self.order_dirty {
            self.rebuild_order();
        }

        for pos in 0..self.order.len() {
            let index = self.order[pos];
            let mut mix = [0.0f32; RENDER_QUANTUM];
            if !self.is_delay(index) {
                self.sum_inputs(index, &mut mix[..len]);
            }

            if let Some(entry) = self.graph.node_weight_mut(index) {
                entry
                    .node
                    .process(&mix[..len], &mut entry.output[..len], ctx);
            }
        }

        // feed delays now that every source has rendered
        for pos in 0..self.order.len() {
            let index = self.order[pos];
            if !self.is_delay(index) {
                continue;
            }

            let mut mix = [0.0f32; RENDER_QUANTUM];
            self.sum_inputs(index, &mut mix[..len]);
            if let Some(Entry {
                node: Node::Delay(delay),
                ..
            }) = self.graph.node_weight_mut(index)
            {
                delay.feed(&mix[..len]);
            }
        }

        match self.entry(sink) {
            Some(entry) => out.copy_from_slice(&entry.output[..len]),
            None => out.fill(0.0),
        }
    }

    fn is_delay(&self, index: NodeIndex) -> bool {
        self.graph
            .node_weight(index)
            .is_some_and(|e| e.node.is_delay())
    }

    fn sum_inputs(&self, index: NodeIndex, mix: &mut [f32]) {
        for src in self.graph.neighbors_directed(index, Direction::Incoming) {
            if let Some(source) = self.graph.node_weight(src) {
                for (m, s) in mix.iter_mut().zip(source.output.iter()) {
                    *m += s;
                }
            }
        }
    }

    /// Topological sort with edges into delays filtered out. When a cycle
    /// remains, the strongly connected components give the order of the
    /// acyclic part and the cyclic components are muted.
    fn rebuild_order(&mut self) {
        let graph = &self.graph;
        let ordering = EdgeFiltered::from_fn(graph, |edge| !graph[edge.target()].node.is_delay());

        let (order, muted) = match toposort(&ordering, None) {
            Ok(order) => (order, Vec::new()),
            Err(cycle) => {
                let mut order = Vec::new();
                let mut muted = Vec::new();
                // tarjan_scc yields components in reverse topological order
                for component in tarjan_scc(&ordering).into_iter().rev() {
                    let cyclic = match component.as_slice() {
                        [single] => {
                            graph.contains_edge(*single, *single) && !graph[*single].node.is_delay()
                        }
                        _ => true,
                    };
                    if cyclic {
                        muted.extend(component);
                    } else {
                        order.extend(component);
                    }
                }
                warn!(
                    node = cycle.node_id().index(),
                    unordered = muted.len(),
                    "cycle without a delay in the audio graph; affected nodes are muted"
                );
                (order, muted)
            }
        };

        for index in muted {
            if let Some(entry) = self.graph.node_weight_mut(index) {
                entry.output.fill(0.0);
            }
        }

        trace!(nodes = order.len(), "render order rebuilt");
        self.order = order;
        self.order_dirty = false;
    }

    fn id_of(&self, index: NodeIndex) -> NodeId {
        NodeId {
            index: index.index() as u32,
            generation: self.generations.get(index.index()).copied().unwrap_or(0),
        }
    }

    fn index_of(&self, id: NodeId) -> Option<NodeIndex> {
        let index = NodeIndex::new(id.index as usize);
        let current = self.generations.get(id.index as usize)?;
        (*current == id.generation && self.graph.contains_node(index)).then_some(index)
    }

    fn entry(&self, id: NodeId) -> Option<&Entry> {
        self.index_of(id).and_then(|index| self.graph.node_weight(index))
    }

    fn entry_mut(&mut self, id: NodeId) -> Option<&mut Entry> {
        self.index_of(id)
            .and_then(|index| self.graph.node_weight_mut(index))
    }
}
