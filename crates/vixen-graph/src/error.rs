//! Crate-wide error taxonomy.

use thiserror::Error;

use crate::gpu::GpuError;

/// A key identifying a node instance, used throughout error reporting.
pub type NodeKey = String;

/// Errors produced while building, compiling, or running a render graph.
#[derive(Error, Debug)]
pub enum GraphError {
    /// The graph's static shape is malformed: a required slot was never
    /// connected, a cycle exists, or two nodes claim the same output slot.
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// A connection, deferred or immediate, refers to a node or slot that
    /// does not exist at resolution time.
    #[error("missing dependency: node {node} slot {slot}")]
    MissingDependency {
        /// Node that could not be found.
        node: NodeKey,
        /// Slot name on that node.
        slot: String,
    },

    /// The active GPU device does not support a feature a node requires.
    #[error("capability missing: {0}")]
    CapabilityMissing(String),

    /// The GPU API reported an error while executing a node operation.
    #[error("gpu error: {0}")]
    Gpu(#[from] GpuError),

    /// A host or device allocation failed outright.
    #[error("out of memory: {requested} bytes requested")]
    OutOfMemory {
        /// Number of bytes that could not be allocated.
        requested: u64,
    },

    /// An allocation would exceed a configured soft or hard budget.
    #[error("budget exceeded for {class}: requested {requested}, available {available}")]
    BudgetExceeded {
        /// Name of the memory class whose budget was exceeded.
        class: String,
        /// Bytes requested.
        requested: u64,
        /// Bytes remaining in the budget.
        available: u64,
    },

    /// Two live resources were assigned overlapping memory during aliasing.
    #[error("alias conflict between {first} and {second}")]
    AliasConflict {
        /// First resource in the conflicting pair.
        first: String,
        /// Second resource in the conflicting pair.
        second: String,
    },

    /// A deferred connection's resolver closure failed to produce a value.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Building a cached resource (pipeline, layout, scene data, ...) failed.
    #[error("cache build failed for key {key}: {source}")]
    CacheBuildFailed {
        /// The cache key that failed to build.
        key: String,
        /// Underlying failure.
        source: Box<GraphError>,
    },

    /// An operation was attempted while a node or resource was in a state
    /// that does not permit it (e.g. executing a node still `Uninit`).
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Convenience alias used across the crate.
pub type GraphResult<T> = Result<T, GraphError>;
