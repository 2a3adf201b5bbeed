// src/registry/mod.rs

//! Explicit task graph.
//!
//! Task dependencies are declared as a directed acyclic graph and resolved
//! topologically before execution, so ordering guarantees are explicit
//! rather than an artifact of declaration order.

pub mod graph;

pub use graph::{standard_registry, TaskAction, TaskDef, TaskRegistry};
