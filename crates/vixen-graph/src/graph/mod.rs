//! The render graph itself and its six-phase compiler (spec §3.1 "Graph",
//! §4.8).

pub mod allocate;
pub mod dependency;
pub mod execute;
pub mod execute_order;
pub mod setup;
pub mod validate;
pub mod waves;

pub use dependency::DependencyGraph;
pub use waves::WaveTable;

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam::channel::Sender;

use crate::cache::CacheRegistry;
use crate::connection::{Connection, DeferredConnection, SlotRef};
use crate::error::{GraphError, GraphResult};
use crate::event::EventBus;
use crate::gpu::GpuDevice;
use crate::memory::{Allocator, BudgetManager};
use crate::node::slot::{ArrayMode, SlotValue};
use crate::node::{NodeInstance, NodeType};
use crate::resource::ResourceVariant;
use crate::shared::FrameClock;

/// Owns node instances, edges, and (after [`Graph::compile`]) the computed
/// wave table and execution order (spec §3.1 "Graph").
pub struct Graph {
    nodes: HashMap<String, NodeInstance>,
    insertion_order: Vec<String>,
    edges: Vec<Connection>,
    deferred: Vec<DeferredConnection>,
    /// Computed wave table, populated by [`Self::compile`].
    pub waves: Option<WaveTable>,
    /// Flattened per-node execution order, populated by [`Self::compile`].
    pub execution_order: Vec<String>,
}

impl Graph {
    /// An empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            insertion_order: Vec::new(),
            edges: Vec::new(),
            deferred: Vec::new(),
            waves: None,
            execution_order: Vec::new(),
        }
    }

    /// Add a node instance. Fails if `name` is already taken, or if
    /// `compile` has already run (spec §3.3 "mutated via Add/Connect only
    /// pre-Compile").
    pub fn add_node(&mut self, name: impl Into<String>, node_type: Arc<NodeType>) -> GraphResult<()> {
        let name = name.into();
        if self.waves.is_some() {
            return Err(GraphError::InvalidState("cannot add nodes after compile".into()));
        }
        if self.nodes.contains_key(&name) {
            return Err(GraphError::InvalidGraph(format!("duplicate node name {name}")));
        }
        self.insertion_order.push(name.clone());
        self.nodes.insert(name.clone(), NodeInstance::new(name, node_type));
        Ok(())
    }

    /// Add an immediate connection; both endpoints must already exist
    /// (spec §3.1 "Connection").
    pub fn connect(&mut self, connection: Connection) -> GraphResult<()> {
        if !self.nodes.contains_key(&connection.source.node) {
            return Err(GraphError::InvalidGraph(format!("unknown source node {}", connection.source.node)));
        }
        if !self.nodes.contains_key(&connection.sink.node) {
            return Err(GraphError::InvalidGraph(format!("unknown sink node {}", connection.sink.node)));
        }
        self.edges.push(connection);
        Ok(())
    }

    /// Queue a deferred connection, resolved after graph-compile-time setup.
    pub fn connect_deferred(&mut self, deferred: DeferredConnection) {
        self.deferred.push(deferred);
    }

    /// Look up a node by name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<&NodeInstance> {
        self.nodes.get(name)
    }

    /// Look up a node by name, mutably.
    pub fn node_mut(&mut self, name: &str) -> Option<&mut NodeInstance> {
        self.nodes.get_mut(name)
    }

    /// Every node name, in insertion order.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.insertion_order.iter().map(String::as_str)
    }

    /// Every immediate connection currently in the graph.
    #[must_use]
    pub fn edges(&self) -> &[Connection] {
        &self.edges
    }

    /// Position `name` was added at, used by the wave tie-break rule.
    #[must_use]
    pub fn insertion_index(&self, name: &str) -> usize {
        self.insertion_order.iter().position(|n| n == name).unwrap_or(usize::MAX)
    }

    /// True if some queued deferred connection is hinted to target
    /// `(node, slot)` (used by `Validate` to avoid false positives on
    /// slots that will be filled once deferred connections resolve).
    #[must_use]
    pub fn has_deferred_target(&self, node: &str, slot: usize) -> bool {
        self.deferred.iter().any(|d| d.target_hint.as_ref().is_some_and(|t| t.node == node && t.slot == slot))
    }

    pub(crate) fn take_deferred(&mut self) -> Vec<DeferredConnection> {
        std::mem::take(&mut self.deferred)
    }

    /// Remove a wave's nodes from the graph by value, so a caller can hand
    /// each one to a worker without holding multiple `&mut` borrows of
    /// `self` at once. Pair with [`Self::restore_node`] once the worker is
    /// done with it.
    pub(crate) fn take_node(&mut self, name: &str) -> Option<NodeInstance> {
        self.nodes.remove(name)
    }

    /// Put a node removed via [`Self::take_node`] back under its own name.
    pub(crate) fn restore_node(&mut self, node: NodeInstance) {
        self.nodes.insert(node.name.clone(), node);
    }

    pub(crate) fn add_resolved_connection(&mut self, connection: Connection) {
        self.edges.push(connection);
    }

    /// Copy every edge's source output into the named sink node's matching
    /// input slot. Safe to call once the source has compiled; called by
    /// [`execute_order::run`] immediately before a node's own `Compile`.
    pub(crate) fn propagate_inputs_for(&mut self, node_name: &str) -> GraphResult<()> {
        let relevant: Vec<Connection> = self.edges.iter().filter(|e| e.sink.node == node_name).cloned().collect();

        for edge in relevant {
            let source_value = self
                .nodes
                .get(&edge.source.node)
                .and_then(|n| n.outputs.get(edge.source.slot))
                .cloned()
                .unwrap_or_default();

            if source_value.is_empty() {
                continue;
            }

            let array_mode = self
                .nodes
                .get(node_name)
                .and_then(|n| n.node_type.input_schema.get(edge.sink.slot))
                .map(|s| s.array_mode);

            let Some(sink) = self.nodes.get_mut(node_name) else { continue };

            match (array_mode, source_value) {
                (Some(ArrayMode::Variadic), SlotValue::Single(resource)) => match &mut sink.inputs[edge.sink.slot] {
                    SlotValue::Variadic(list) => list.push((edge.source.node.clone(), resource)),
                    slot => *slot = SlotValue::Variadic(vec![(edge.source.node.clone(), resource)]),
                },
                (_, value) => sink.inputs[edge.sink.slot] = value,
            }
        }
        Ok(())
    }

    /// Run the six-phase compiler (spec §4.8). On success, [`Self::waves`]
    /// and [`Self::execution_order`] are populated and no further
    /// `add_node`/`connect` calls are permitted.
    ///
    /// `clock`/`reclaim` should be the same [`FrameClock`] and deferred
    /// destruction channel the owning [`crate::frame::FrameScheduler`] was
    /// built with, so every node's output resources drain into that
    /// scheduler's queue rather than an orphaned one.
    #[allow(clippy::too_many_arguments)]
    pub fn compile(
        &mut self,
        device: &dyn GpuDevice,
        caches: &CacheRegistry,
        allocator: &dyn Allocator,
        budget: &BudgetManager,
        events: &EventBus,
        clock: &FrameClock,
        reclaim: &Sender<(u64, ResourceVariant)>,
        frames_in_flight: u64,
    ) -> GraphResult<()> {
        validate::run(self)?;
        setup::run(self, device, caches, allocator, events, clock, reclaim)?;
        let deps = dependency::analyze(self)?;
        let wave_table = waves::compute(self, &deps)?;
        allocate::run(self, budget, frames_in_flight)?;
        let order = execute_order::run(self, device, caches, allocator, events, clock, reclaim, &wave_table)?;

        self.waves = Some(wave_table);
        self.execution_order = order;
        Ok(())
    }

    /// Mark a node dirty by stable name, e.g. in response to a
    /// `ShaderReloaded` event; propagates to every downstream consumer
    /// (spec §4.8 "Dirtiness propagates to downstream nodes").
    pub fn mark_dirty(&mut self, name: &str) {
        let mut frontier = vec![name.to_string()];
        let mut visited = std::collections::HashSet::new();
        while let Some(current) = frontier.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&current) {
                node.mark_dirty();
            }
            for edge in &self.edges {
                if edge.source.node == current {
                    frontier.push(edge.sink.node.clone());
                }
            }
        }
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::gpu::device::fake::FakeGpuDevice;
    use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
    use crate::memory::DirectAllocator;
    use crate::node::slot::SlotSchema;
    use crate::node::{FrameContext, NodeBehavior, NodeContext};
    use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

    struct ProducerBehavior;
    impl NodeBehavior for ProducerBehavior {
        fn setup(&mut self, _ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> { Ok(()) }
        fn compile(&mut self, ctx: &mut NodeContext<'_>, _params: &crate::node::ParamBag, _inputs: &[SlotValue], outputs: &mut [SlotValue]) -> GraphResult<()> {
            let variant = ResourceVariant::Device(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, RawHandle::NULL));
            outputs[0] = SlotValue::Single(crate::shared::SharedResource::new(variant, ctx.clock.clone(), ctx.reclaim.clone()));
            Ok(())
        }
        fn execute(&mut self, _ctx: &FrameContext<'_>, _cb: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> { Ok(()) }
        fn cleanup(&mut self, _ctx: &mut NodeContext<'_>) -> GraphResult<()> { Ok(()) }
    }

    fn producer_type() -> Arc<NodeType> {
        Arc::new(NodeType {
            name: "producer",
            input_schema: vec![],
            output_schema: vec![SlotSchema::required(0, "out", "Buffer")],
            required_capabilities: DeviceCapabilities::empty(),
            workload: WorkloadMetrics::default(),
            factory: || Box::new(ProducerBehavior),
        })
    }

    #[test]
    fn full_compile_of_single_node_graph_succeeds() {
        let mut graph = Graph::new();
        graph.add_node("producer", producer_type()).unwrap();

        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let budget = BudgetManager::new();
        let events = EventBus::new();
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));

        graph.compile(&device, &caches, &allocator, &budget, &events, &clock, &tx, 2).unwrap();
        assert_eq!(graph.execution_order, vec!["producer".to_string()]);
        assert_eq!(graph.waves.unwrap().waves.len(), 1);
    }

    #[test]
    fn add_node_after_compile_is_rejected() {
        let mut graph = Graph::new();
        graph.add_node("producer", producer_type()).unwrap();

        let device = FakeGpuDevice::new();
        let caches = CacheRegistry::new(1_000_000);
        let allocator = DirectAllocator;
        let budget = BudgetManager::new();
        let events = EventBus::new();
        let (tx, _rx) = crossbeam::channel::unbounded();
        let clock: FrameClock = Arc::new(std::sync::atomic::AtomicU64::new(0));
        graph.compile(&device, &caches, &allocator, &budget, &events, &clock, &tx, 2).unwrap();

        assert!(graph.add_node("late", producer_type()).is_err());
    }

    #[test]
    fn duplicate_node_name_is_rejected() {
        let mut graph = Graph::new();
        graph.add_node("a", producer_type()).unwrap();
        assert!(graph.add_node("a", producer_type()).is_err());
    }
}
