// Purpose: Voice management, parameters and the engine facade.
// This layer sits above the graph and decides which nodes exist.

pub mod engine;
pub mod manager;
pub mod message;
pub mod params;
pub mod voice;
