//! Dependency-scheduled execution of the prove pipeline.

pub mod task_graph;

pub use task_graph::{Schedule, Slot, TaskGraph, TaskGraphError, TaskId};
