//! Capability and handle types shared by the GPU seam, independent of the
//! concrete backend.

use bitflags::bitflags;

bitflags! {
    /// Device capabilities a node may require (spec §4.5).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct DeviceCapabilities: u32 {
        /// Graphics queue + rasterization pipeline support.
        const GRAPHICS = 1 << 0;
        /// Compute queue support.
        const COMPUTE = 1 << 1;
        /// Hardware ray-tracing extensions.
        const RAY_TRACING = 1 << 2;
        /// Dedicated transfer queue.
        const TRANSFER = 1 << 3;
        /// Mesh shading pipeline.
        const MESH_SHADING = 1 << 4;
        /// Timestamp queries.
        const TIMESTAMP_QUERY = 1 << 5;
    }
}

/// Opaque handle to a GPU-API-owned object. The concrete integer meaning
/// is backend-specific; the graph core only ever compares/clones/stores it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle(pub u64);

impl RawHandle {
    /// The null handle, used as a sentinel before GPU allocation happens.
    pub const NULL: Self = Self(0);

    /// True if this handle is the null sentinel.
    #[must_use]
    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl Default for RawHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Estimated workload metrics for a node, used by the scheduler to reason
/// about parallelism (spec §4.5).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct WorkloadMetrics {
    /// Estimated memory footprint in bytes.
    pub memory_bytes: u64,
    /// Relative compute cost unit (dimensionless, comparable within a graph).
    pub compute_cost: f32,
    /// Relative bandwidth cost unit.
    pub bandwidth_cost: f32,
    /// Whether this node's execute body may run concurrently with peers in
    /// its wave.
    pub parallelizable: bool,
    /// Preferred recording batch size, if the node benefits from batching.
    pub preferred_batch_size: Option<u32>,
}
