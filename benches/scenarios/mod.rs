//! Real-world scenario benchmarks.
//!
//! Whole-engine rendering with the shared chain and a full set of voices,
//! plus the note-on/note-off churn a fast player produces.

mod notes;
mod poly;

pub use notes::bench_notes;
pub use poly::bench_poly;
