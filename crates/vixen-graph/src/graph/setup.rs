//! Graph compiler phase 2: run graph-compile-time setup, then resolve
//! deferred connections (spec §4.8 step 2, §4.6).

use crossbeam::channel::Sender;

use super::Graph;
use crate::cache::CacheRegistry;
use crate::error::{GraphError, GraphResult};
use crate::event::EventBus;
use crate::gpu::GpuDevice;
use crate::memory::Allocator;
use crate::node::{NodeContext, NodeState};
use crate::resource::ResourceVariant;
use crate::shared::{FrameClock, LifetimeScope, ScopeKind};

/// Run every `Uninit` node's `Setup`, then resolve deferred connections in
/// insertion order, appending each to the graph's edge list.
#[allow(clippy::too_many_arguments)]
pub fn run(
    graph: &mut Graph,
    device: &dyn GpuDevice,
    caches: &CacheRegistry,
    allocator: &dyn Allocator,
    events: &EventBus,
    clock: &FrameClock,
    reclaim: &Sender<(u64, ResourceVariant)>,
) -> GraphResult<()> {
    let names: Vec<String> = graph.node_names().map(str::to_string).collect();
    for name in &names {
        let mut scope = LifetimeScope::new(ScopeKind::Compile);
        let node = graph.node_mut(name).expect("name came from node_names()");
        if node.state != NodeState::Uninit {
            continue;
        }
        let mut ctx = NodeContext {
            device,
            caches,
            allocator,
            events,
            scope: &mut scope,
            clock: clock.clone(),
            reclaim: reclaim.clone(),
        };
        node.setup(&mut ctx)?;
    }

    let deferred = graph.take_deferred();
    for entry in deferred {
        let description = entry.description.clone();
        let connection = entry.resolve().map_err(|e| {
            GraphError::ConnectionFailed(format!("{description}: {e}"))
        })?;
        graph.add_resolved_connection(connection);
    }

    Ok(())
}
