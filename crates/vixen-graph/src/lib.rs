//! # vixen-graph
//!
//! A typed, slot-based render-graph engine over an opaque GPU API.
//!
//! ## Features
//!
//! - **Typed slots**: nodes declare input/output schemas; connections are
//!   checked at graph-build time, not at the first bad draw call.
//! - **Content-addressed caching**: pipelines, layouts, and descriptor set
//!   layouts are deduplicated by content hash across the whole graph.
//! - **Backend-agnostic**: the graph compiler and every node talk through
//!   [`gpu::GpuDevice`]; [`gpu::device::AshVulkanDevice`] is the concrete
//!   Vulkan backend, [`gpu::device::fake::FakeGpuDevice`] a deterministic
//!   stand-in for tests.
//! - **Content reload**: shader/scene changes flow in through [`event::EventBus`]
//!   and mark affected nodes dirty for the next compile, instead of a
//!   full graph rebuild.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use vixen_graph::graph::Graph;
//! use vixen_graph::gpu::device::fake::FakeGpuDevice;
//! use vixen_graph::cache::CacheRegistry;
//! use vixen_graph::memory::{BudgetManager, DirectAllocator};
//! use vixen_graph::event::EventBus;
//! use vixen_graph::shared::FrameClock;
//! use vixen_graph::gpu::DeviceCapabilities;
//! use vixen_graph::nodes;
//!
//! fn build() -> vixen_graph::error::GraphResult<()> {
//!     let mut graph = Graph::new();
//!     graph.add_node("device", nodes::device::node_type(DeviceCapabilities::empty()))?;
//!
//!     let device = FakeGpuDevice::new();
//!     let caches = CacheRegistry::new(64 * 1024 * 1024);
//!     let allocator = DirectAllocator;
//!     let budget = BudgetManager::new();
//!     let events = EventBus::new();
//!     let clock: FrameClock = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
//!     let (reclaim_tx, _reclaim_rx) = crossbeam::channel::unbounded();
//!
//!     graph.compile(&device, &caches, &allocator, &budget, &events, &clock, &reclaim_tx, 2)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod cache;
pub mod config;
pub mod connection;
pub mod env;
pub mod error;
pub mod event;
pub mod frame;
pub mod gpu;
pub mod graph;
pub mod logging;
pub mod loop_manager;
pub mod memory;
pub mod node;
pub mod nodes;
pub mod resource;
pub mod shared;
pub mod workers;

pub use connection::{Connection, DeferredConnection, SlotRef};
pub use error::{GraphError, GraphResult};

/// Common imports for crate users.
pub mod prelude {
    pub use crate::{
        cache::CacheRegistry,
        config::Config,
        connection::{Connection, DeferredConnection, SlotRef},
        error::{GraphError, GraphResult},
        event::{EventBus, Topic},
        frame::{FrameHandle, FrameScheduler},
        gpu::{DeviceCapabilities, GpuDevice, RawHandle},
        graph::Graph,
        memory::{Allocator, MemoryClass},
        node::{
            slot::{SlotSchema, SlotValue},
            NodeBehavior, NodeContext, NodeType, ParamBag, ParamValue,
        },
        resource::{ResourceVariant, ShaderDataBundle},
        shared::{FrameClock, SharedResource},
        workers::WavePool,
    };
}
