// Core analysis: RPC identity, call graph model, entry matching and
// downstream resolution.

pub mod callgraph;
pub mod catalog;
pub mod downstream;
pub mod entry_point;
pub mod method;
pub mod method_map;
pub mod registry;
pub mod store;
