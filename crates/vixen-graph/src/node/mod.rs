//! Node types and instances (spec §3.1 "Node instance", §4.5).
//!
//! Grounded on the teacher's `ecs/system.rs`/`scheduler.rs` `System` trait
//! shape (a declared schema plus an executable body) but reworked around
//! the spec's four explicit phases instead of one `execute()` call, and
//! around typed slots instead of ECS component sets.

pub mod slot;

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::cache::CacheRegistry;
use crate::error::{GraphError, GraphResult};
use crate::event::EventBus;
use crate::gpu::{DeviceCapabilities, GpuDevice, RawHandle, WorkloadMetrics};
use crate::memory::Allocator;
use crate::resource::ResourceVariant;
use crate::shared::{FrameClock, LifetimeScope};
use slot::{SlotSchema, SlotValue};

/// Per-node state machine (spec §4.5 state machine diagram).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Added to the graph, `Setup` not yet run.
    Uninit,
    /// `Setup` has run; waiting for `Compile`.
    Ready,
    /// `Compile` succeeded; output slots are populated.
    Valid,
    /// A prior `Compile`'s outputs are stale; must recompile before `Execute`.
    Dirty,
    /// `Cleanup` has run; the instance must not be touched again.
    Destroyed,
}

/// A single parameter value, one of the fixed set spec §3.1 names.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Unsigned integer.
    UInt(u64),
    /// Floating point.
    Float(f64),
    /// 3-component vector, e.g. a color or offset.
    Vec3(nalgebra::Vector3<f32>),
    /// UTF-8 string, e.g. a shader entry point name.
    Str(String),
}

/// Map of parameter name to typed value, declared by a node type and set
/// (or defaulted) before `Compile` per invariant §3.2.1.
#[derive(Clone, Debug, Default)]
pub struct ParamBag {
    values: HashMap<String, ParamValue>,
}

impl ParamBag {
    /// An empty bag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, overwriting any previous value and marking the
    /// owning node dirty is the caller's responsibility (see
    /// [`NodeInstance::set_param`]).
    pub fn set(&mut self, name: impl Into<String>, value: ParamValue) {
        self.values.insert(name.into(), value);
    }

    /// Read a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    /// Read a parameter, falling back to `default` if unset — the
    /// "every declared parameter is either set or defaulted" rule from
    /// spec §4.8 step 1.
    #[must_use]
    pub fn get_or(&self, name: &str, default: ParamValue) -> ParamValue {
        self.values.get(name).cloned().unwrap_or(default)
    }
}

/// Whether a node re-records its commands every frame or only on demand
/// (spec §4.9 "Command buffer policy").
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CommandBufferPolicy {
    /// Record once at compile, re-record only after `MarkDirty`.
    Static(RecordScope),
    /// Re-record every frame. Default.
    #[default]
    Dynamic,
}

/// For `STATIC` nodes, how much of the node's slot gets re-recorded on a
/// dirty mark (resolved open question, see `DESIGN.md`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RecordScope {
    /// Re-record the whole primary command buffer contribution.
    #[default]
    WholeSlot,
    /// Re-record only a secondary buffer, leaving the primary-level binds in place.
    SecondaryOnly,
}

/// Arguments available to a node's `Setup`/`Compile` phases.
pub struct NodeContext<'a> {
    /// The GPU device seam, for resource creation.
    pub device: &'a dyn GpuDevice,
    /// Content-addressed caches.
    pub caches: &'a CacheRegistry,
    /// Memory allocator for this node's resource class.
    pub allocator: &'a dyn Allocator,
    /// Process-wide event bus, for subscribe (`Setup`) and publish
    /// (`Compile`/`Execute`).
    pub events: &'a EventBus,
    /// Scope every allocation in this call should be charged against.
    pub scope: &'a mut LifetimeScope,
    /// Shared frame counter, stamped onto a [`crate::shared::SharedResource`]
    /// at drop time. Clone into every `SharedResource` this node creates.
    pub clock: FrameClock,
    /// Channel into the frame scheduler's deferred destruction queue. Clone
    /// into every `SharedResource` this node creates.
    pub reclaim: Sender<(u64, ResourceVariant)>,
}

/// Arguments available to a node's `Execute` phase.
pub struct FrameContext<'a> {
    /// Index of the frame currently executing.
    pub frame_index: u64,
    /// Configured `MAX_FRAMES_IN_FLIGHT`.
    pub frames_in_flight: u64,
    /// Command pool for this frame slot's queue family.
    pub command_pool: RawHandle,
    /// Timestamp query pool for this frame slot, if the node opted into timing.
    pub timestamp_pool: Option<RawHandle>,
    /// Event bus, for publishing dirty/reload notifications mid-execute.
    pub events: &'a EventBus,
    /// The GPU device seam, for nodes that record commands at `Execute`
    /// rather than fully at `Compile` (e.g. compute dispatch).
    pub device: &'a dyn GpuDevice,
}

/// The per-node behavior object a [`NodeType`]'s factory produces. One
/// instance per [`NodeInstance`]; owns whatever CPU-side state the node
/// needs between phases (cached handles, last-seen parameter snapshot).
pub trait NodeBehavior: Send {
    /// Pure CPU-side setup: subscribe to events, discover variadic slots.
    /// `params` holds whatever the instance's `ParamBag` carries at the
    /// time `Setup` runs; a node that needs a value again at `Compile` or
    /// `Execute` should snapshot it into its own fields here.
    fn setup(&mut self, ctx: &mut NodeContext<'_>, params: &ParamBag, outputs: &mut [SlotValue]) -> GraphResult<()>;
    /// Allocate GPU resources and populate every required output slot.
    /// Must be idempotent against re-invocation on recompile.
    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        params: &ParamBag,
        inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()>;
    /// Record work into the frame's command buffer. May be a no-op if the
    /// node's work was fully specified at `Compile`.
    fn execute(&mut self, ctx: &FrameContext<'_>, command_buffer: RawHandle, inputs: &[SlotValue]) -> GraphResult<()>;
    /// Release exactly the references this instance's `compile` claimed.
    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()>;
}

/// Compile-time declaration of a node kind (spec §4.5).
pub struct NodeType {
    /// Stable type name, e.g. `"swapchain"`, `"compute_dispatch"`.
    pub name: &'static str,
    /// Ordered input slot schemas.
    pub input_schema: Vec<SlotSchema>,
    /// Ordered output slot schemas.
    pub output_schema: Vec<SlotSchema>,
    /// Device capabilities every instance of this type requires.
    pub required_capabilities: DeviceCapabilities,
    /// Estimated workload, used by the wave scheduler and budget throttle.
    pub workload: WorkloadMetrics,
    /// Produces a fresh behavior object for a new instance.
    pub factory: fn() -> Box<dyn NodeBehavior>,
}

/// A node bound into a graph: schema-backed slots, a parameter bag, and
/// the state machine from spec §4.5.
pub struct NodeInstance {
    /// Stable name, unique within the owning graph.
    pub name: String,
    /// The declared type this instance was created from.
    pub node_type: Arc<NodeType>,
    /// Parameter values, defaulting per [`ParamBag::get_or`] where unset.
    pub params: ParamBag,
    /// Bound input slot values, indexed as in `node_type.input_schema`.
    pub inputs: Vec<SlotValue>,
    /// Bound output slot values, indexed as in `node_type.output_schema`.
    pub outputs: Vec<SlotValue>,
    /// Current lifecycle state.
    pub state: NodeState,
    /// Static vs. per-frame re-recording policy.
    pub command_buffer_policy: CommandBufferPolicy,
    behavior: Box<dyn NodeBehavior>,
}

impl NodeInstance {
    /// Construct a fresh, `Uninit` instance from a node type.
    #[must_use]
    pub fn new(name: impl Into<String>, node_type: Arc<NodeType>) -> Self {
        let inputs = vec![SlotValue::Empty; node_type.input_schema.len()];
        let outputs = vec![SlotValue::Empty; node_type.output_schema.len()];
        let behavior = (node_type.factory)();
        Self {
            name: name.into(),
            node_type,
            params: ParamBag::new(),
            inputs,
            outputs,
            state: NodeState::Uninit,
            command_buffer_policy: CommandBufferPolicy::default(),
            behavior,
        }
    }

    /// Set a parameter and mark the instance dirty if it was previously
    /// `Valid` (a no-op change to an already-dirty or uncompiled node does
    /// not need re-flagging).
    pub fn set_param(&mut self, name: impl Into<String>, value: ParamValue) {
        self.params.set(name, value);
        if self.state == NodeState::Valid {
            self.state = NodeState::Dirty;
        }
    }

    /// Run `Setup`, transitioning `Uninit -> Ready`.
    pub fn setup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        if self.state != NodeState::Uninit {
            return Err(GraphError::InvalidState(format!("{}: setup called in state {:?}", self.name, self.state)));
        }
        self.behavior.setup(ctx, &self.params, &mut self.outputs)?;
        self.state = NodeState::Ready;
        Ok(())
    }

    /// Run `Compile`, transitioning `Ready|Dirty -> Valid`.
    pub fn compile(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        if !matches!(self.state, NodeState::Ready | NodeState::Dirty) {
            return Err(GraphError::InvalidState(format!("{}: compile called in state {:?}", self.name, self.state)));
        }
        self.behavior.compile(ctx, &self.params, &self.inputs, &mut self.outputs)?;
        for (schema, value) in self.node_type.output_schema.iter().zip(&self.outputs) {
            if !schema.nullable && value.is_empty() {
                return Err(GraphError::MissingDependency { node: self.name.clone(), slot: schema.name.clone() });
            }
        }
        self.state = NodeState::Valid;
        Ok(())
    }

    /// Run `Execute`. Valid in both `Valid` and (for static nodes that
    /// merely replay) `Dirty` is rejected — callers must recompile first.
    pub fn execute(&mut self, ctx: &FrameContext<'_>, command_buffer: RawHandle) -> GraphResult<()> {
        if self.state != NodeState::Valid {
            return Err(GraphError::InvalidState(format!("{}: execute called in state {:?}", self.name, self.state)));
        }
        self.behavior.execute(ctx, command_buffer, &self.inputs)
    }

    /// Run `Cleanup`, transitioning any state `-> Destroyed`. Idempotent:
    /// calling it again on an already-`Destroyed` instance is a no-op.
    pub fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        if self.state == NodeState::Destroyed {
            return Ok(());
        }
        self.behavior.cleanup(ctx)?;
        self.state = NodeState::Destroyed;
        Ok(())
    }

    /// Mark `Valid -> Dirty` explicitly (e.g. on `ShaderReloaded`).
    pub fn mark_dirty(&mut self) {
        if self.state == NodeState::Valid {
            self.state = NodeState::Dirty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopBehavior;
    impl NodeBehavior for NoopBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
            Ok(())
        }
        fn compile(
            &mut self,
            _ctx: &mut NodeContext<'_>,
            _params: &ParamBag,
            _inputs: &[SlotValue],
            _outputs: &mut [SlotValue],
        ) -> GraphResult<()> {
            Ok(())
        }
        fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
            Ok(())
        }
        fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> {
            Ok(())
        }
    }

    fn node_type() -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "noop",
            input_schema: vec![],
            output_schema: vec![],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(NoopBehavior),
        })
    }

    #[test]
    fn out_of_order_phase_calls_are_rejected() {
        let mut node = NodeInstance::new("n0", node_type());
        let device = crate::gpu::device::fake::FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = crate::memory::DirectAllocator;
        let events = EventBus::new();
        let mut scope = LifetimeScope::new(crate::shared::ScopeKind::Compile);
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0));
        let mut ctx = NodeContext {
            device: &device,
            caches: &caches,
            allocator: &allocator,
            events: &events,
            scope: &mut scope,
            clock,
            reclaim: tx,
        };

        assert!(node.compile(&mut ctx).is_err());
        assert!(node.setup(&mut ctx).is_ok());
        assert_eq!(node.state, NodeState::Ready);
    }

    #[test]
    fn set_param_marks_valid_node_dirty() {
        let mut node = NodeInstance::new("n0", node_type());
        node.state = NodeState::Valid;
        node.set_param("scale", ParamValue::Float(2.0));
        assert_eq!(node.state, NodeState::Dirty);
    }
}
