//! Slot schema and runtime slot values (spec §3.1 "Slot").

use crate::shared::SharedResource;

/// Whether a slot participates in the dependency DAG or only carries data
/// alongside an existing dependency edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotRole {
    /// Establishes a wave-ordering dependency between nodes.
    Dependency,
    /// Carries a value without itself constraining wave order.
    Data,
}

/// Read/write access a node declares for a slot; used by the graph
/// compiler's wave conflict check (spec §4.8 step 4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mutability {
    /// Read-only.
    Ro,
    /// Write-only.
    Wo,
    /// Read-write; conflicts with any other RO/WO/RW claim on the same
    /// resource within a wave.
    Rw,
}

impl Mutability {
    /// Two claims on the same resource conflict iff at least one is `Rw`.
    #[must_use]
    pub fn conflicts_with(self, other: Self) -> bool {
        self == Self::Rw || other == Self::Rw
    }
}

/// Whether a slot's claimed resource may escape the node that produced it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotScope {
    /// Visible only within the owning node.
    Node,
    /// Visible to any node connected downstream.
    Graph,
}

/// How many concrete sub-slots a declared slot expands to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArrayMode {
    /// Exactly one resource.
    Single,
    /// Arity discovered at graph-compile-time setup (spec §4.6).
    Variadic,
    /// A fixed-size array known at node-type declaration time.
    FixedArray(usize),
}

/// Compile-time metadata for one input or output slot (spec §3.1 "Slot").
#[derive(Clone, Debug)]
pub struct SlotSchema {
    /// Position in the node's input or output table.
    pub index: usize,
    /// Stable name, used in connection diagnostics and variadic prefixes.
    pub name: String,
    /// Resource kind this slot accepts, by [`crate::resource::ResourceVariant::kind_name`].
    pub type_tag: &'static str,
    /// Whether an unconnected required slot is permitted.
    pub nullable: bool,
    pub role: SlotRole,
    pub mutability: Mutability,
    pub scope: SlotScope,
    pub array_mode: ArrayMode,
}

impl SlotSchema {
    /// Build a required, single, read-only, node-scoped slot — the common
    /// case for data inputs.
    #[must_use]
    pub fn required(index: usize, name: impl Into<String>, type_tag: &'static str) -> Self {
        Self {
            index,
            name: name.into(),
            type_tag,
            nullable: false,
            role: SlotRole::Dependency,
            mutability: Mutability::Ro,
            scope: SlotScope::Node,
            array_mode: ArrayMode::Single,
        }
    }
}

/// The runtime value held in a slot: either one resource or, for a variadic
/// slot, an ordered list of named sub-slot resources (spec §3.1).
#[derive(Clone, Default)]
pub enum SlotValue {
    /// Not yet connected / written.
    #[default]
    Empty,
    /// A single bound resource.
    Single(SharedResource),
    /// An ordered `(key, resource)` list for a variadic slot.
    Variadic(Vec<(String, SharedResource)>),
}

impl SlotValue {
    /// True if nothing has been written to this slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Borrow the single resource, if this is a [`SlotValue::Single`].
    #[must_use]
    pub fn as_single(&self) -> Option<&SharedResource> {
        match self {
            Self::Single(resource) => Some(resource),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutability_conflict_rules() {
        assert!(!Mutability::Ro.conflicts_with(Mutability::Ro));
        assert!(Mutability::Rw.conflicts_with(Mutability::Ro));
        assert!(Mutability::Wo.conflicts_with(Mutability::Rw));
        assert!(!Mutability::Wo.conflicts_with(Mutability::Ro));
    }

    #[test]
    fn empty_slot_value_has_no_single() {
        let value = SlotValue::default();
        assert!(value.is_empty());
        assert!(value.as_single().is_none());
    }
}
