//! `yave`: node-graph IR, reference-counted runtime term representation,
//! Hindley–Milner type system, node-graph parser and compiler for a timed
//! multimedia visual-programming environment.

pub mod arena;
pub mod compiler;
pub mod diagnostics;
pub mod graph;
pub mod object;
pub mod parser;
pub mod sgraph;
pub mod types;
pub mod uid;
