//! The audio graph: a node arena, the clock that renders it and the shared
//! output chain every voice feeds.
//!
//! Nodes never own each other. The arena holds them all and hands out
//! generation-checked [`NodeId`]s; whoever created a node is responsible
//! for removing it.

/// Node storage, connections and topological rendering.
pub mod arena;
/// Filter → delay → master chain shared by all voices.
pub mod chain;
/// Sample clock and output sink.
pub mod context;
/// Node kinds and their per-quantum processing.
pub mod node;

pub use arena::NodeGraph;
pub use chain::SharedChain;
pub use context::AudioContext;
pub use node::{Node, NodeId};
