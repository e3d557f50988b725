//! Drives `Execute` across a compiled graph's waves (spec §4.8 step 6,
//! §4.9 step 5), recording every wave's nodes concurrently through a
//! [`crate::workers::WavePool`] — sound because wave membership already
//! excludes conflicting resource claims (spec §4.8 step 4).

use super::{Graph, WaveTable};
use crate::error::{GraphError, GraphResult};
use crate::gpu::RawHandle;
use crate::node::{FrameContext, NodeInstance};
use crate::workers::WavePool;

/// Record one command buffer per node, per wave, returning the waves in
/// order — the shape [`crate::frame::FrameScheduler::submit_and_present`]
/// expects for `waves: &[Vec<RawHandle>]`.
pub fn run(graph: &mut Graph, ctx: &FrameContext<'_>, waves: &WaveTable, pool: &WavePool) -> GraphResult<Vec<Vec<RawHandle>>> {
    let mut recorded = Vec::with_capacity(waves.waves.len());

    for wave in &waves.waves {
        // Pull every node in this wave out of the graph by value first, so
        // `WavePool::map` holds owned `NodeInstance`s instead of several
        // simultaneous `&mut Graph` borrows, then hand them back once their
        // command buffer is recorded.
        let taken: Vec<NodeInstance> =
            wave.iter().map(|name| graph.take_node(name).expect("wave contains only graph node names")).collect();

        let device = ctx.device;
        let command_pool = ctx.command_pool;
        let outcomes = pool.map(taken, |mut node: NodeInstance| -> GraphResult<(NodeInstance, RawHandle)> {
            let command_buffer = device.allocate_command_buffer(command_pool).map_err(GraphError::Gpu)?;
            node.execute(ctx, command_buffer)?;
            Ok((node, command_buffer))
        });

        let mut wave_handles = Vec::with_capacity(wave.len());
        for outcome in outcomes {
            let (node, command_buffer) = outcome?;
            graph.restore_node(node);
            wave_handles.push(command_buffer);
        }
        recorded.push(wave_handles);
    }

    Ok(recorded)
}
