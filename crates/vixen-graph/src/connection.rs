//! Connections between node slots (spec §3.1 "Connection", §4.6).

use crate::error::GraphResult;

/// Addresses one slot of one node instance.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SlotRef {
    /// Owning node's stable instance name.
    pub node: String,
    /// Index into that node's input or output slot table.
    pub slot: usize,
}

impl SlotRef {
    /// Build a slot reference.
    #[must_use]
    pub fn new(node: impl Into<String>, slot: usize) -> Self {
        Self { node: node.into(), slot }
    }
}

/// A directed edge `(sourceNode, sourceSlot) -> (sinkNode, sinkSlot)`
/// (spec §3.1). Type compatibility between the two ends is checked by the
/// graph compiler's `Validate` phase, not by this struct.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Connection {
    /// The edge's source (output) end.
    pub source: SlotRef,
    /// The edge's sink (input) end.
    pub sink: SlotRef,
}

impl Connection {
    /// Build an immediate connection between two already-existing slots.
    #[must_use]
    pub fn new(source: SlotRef, sink: SlotRef) -> Self {
        Self { source, sink }
    }
}

/// A connection whose endpoints are not yet known, because the sink
/// depends on slot arity discovered during graph-compile-time setup
/// (e.g. one sub-slot per reflected struct member). Resolved once, after
/// every node has run its setup hook, in insertion order (spec §4.6).
pub struct DeferredConnection {
    /// Human-readable description, surfaced in `<ConnectionFailed>` if
    /// resolution fails.
    pub description: String,
    /// Best-effort sink this resolver is expected to land on, used by
    /// `Validate` to avoid flagging a slot that will be filled once
    /// deferred connections resolve (spec §4.6). Not authoritative: the
    /// resolver's actual output is what counts once it runs.
    pub target_hint: Option<SlotRef>,
    resolver: Box<dyn FnOnce() -> GraphResult<Connection> + Send>,
}

impl DeferredConnection {
    /// Wrap a resolver closure that produces the concrete connection once
    /// variadic discovery has run.
    pub fn new(description: impl Into<String>, resolver: impl FnOnce() -> GraphResult<Connection> + Send + 'static) -> Self {
        Self { description: description.into(), target_hint: None, resolver: Box::new(resolver) }
    }

    /// Attach a target hint so `Validate` can recognize this deferred
    /// connection will fill a given required input.
    #[must_use]
    pub fn with_target_hint(mut self, target: SlotRef) -> Self {
        self.target_hint = Some(target);
        self
    }

    /// Run the resolver, consuming this deferred connection.
    pub fn resolve(self) -> GraphResult<Connection> {
        (self.resolver)()
    }
}
