//! Command pool node (spec §4.11 "Command pool node").

use std::sync::Arc;

use crate::error::GraphResult;
use crate::gpu::{DeviceCapabilities, RawHandle, WorkloadMetrics};
use crate::node::slot::{SlotSchema, SlotValue};
use crate::node::{FrameContext, NodeBehavior, NodeContext, NodeType, ParamBag, ParamValue};
use crate::resource::{Lifetime, ResourceMeta, ResourceVariant, Shape};

/// Declare the command-pool node type. Depends on the device node's
/// output purely to order after it; the queue family itself comes from
/// the `queue_family` param, defaulted to `0` (the graphics family) if unset.
#[must_use]
pub fn node_type() -> Arc<NodeType> {
    Arc::new(NodeType {
        name: "command_pool",
        input_schema: vec![SlotSchema::required(0, "device", "Device")],
        output_schema: vec![SlotSchema::required(0, "pool", "CommandPool")],
        required_capabilities: DeviceCapabilities::empty(),
        workload: WorkloadMetrics::default(),
        factory: || Box::new(CommandPoolBehavior::default()),
    })
}

#[derive(Default)]
struct CommandPoolBehavior {
    queue_family: u32,
    handle: RawHandle,
}

impl NodeBehavior for CommandPoolBehavior {
    fn setup(&mut self, _ctx: &mut NodeContext<'_>, params: &ParamBag, _outputs: &mut [SlotValue]) -> GraphResult<()> {
        self.queue_family = as_u32(params.get_or("queue_family", ParamValue::UInt(0)));
        Ok(())
    }

    fn compile(
        &mut self,
        ctx: &mut NodeContext<'_>,
        params: &ParamBag,
        _inputs: &[SlotValue],
        outputs: &mut [SlotValue],
    ) -> GraphResult<()> {
        self.queue_family = as_u32(params.get_or("queue_family", ParamValue::UInt(u64::from(self.queue_family))));

        if !self.handle.is_null() {
            ctx.device.reset_command_pool(self.handle)?;
        } else {
            self.handle = ctx.device.create_command_pool(self.queue_family)?;
        }

        let variant = ResourceVariant::CommandPool(ResourceMeta::new(Lifetime::Persistent, Shape::Handle, self.handle));
        outputs[0] = SlotValue::Single(crate::nodes::wrap(ctx, variant));
        Ok(())
    }

    fn execute(&mut self, _ctx: &FrameContext<'_>, _command_buffer: RawHandle, _inputs: &[SlotValue]) -> GraphResult<()> {
        Ok(())
    }

    fn cleanup(&mut self, ctx: &mut NodeContext<'_>) -> GraphResult<()> {
        if !self.handle.is_null() {
            ctx.device.destroy_command_pool(self.handle);
            self.handle = RawHandle::NULL;
        }
        Ok(())
    }
}

fn as_u32(value: ParamValue) -> u32 {
    match value {
        ParamValue::UInt(v) => v as u32,
        ParamValue::Int(v) => v.max(0) as u32,
        _ => 0,
    }
}
