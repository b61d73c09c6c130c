//! Integration tests for the versioned key-value engine

mod commit_graph;
mod diff_engine;
mod properties;
mod scenarios;
mod search_index;
mod tree_structure;
