//! Handles into the per-unit arenas.
//!
//! Every unit owns two layers of storage: the interface layer, frozen once the
//! interface pass completes and shared with other units, and the
//! implementation layer, private to the unit. A handle names the unit and the
//! layer along with the arena slot, so it stays valid after the syntax tree
//! that produced it is gone.

use std::fmt;

use id_arena::Id;
use serde::Serialize;

use super::declaration::Declaration;
use super::occurrence::NameOccurrence;
use super::scope::Scope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    pub fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Layer {
    Interface,
    Implementation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId {
    pub unit: UnitId,
    pub layer: Layer,
    pub(crate) local: Id<Scope>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeclId {
    pub unit: UnitId,
    pub layer: Layer,
    pub(crate) local: Id<Declaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OccurrenceId {
    pub unit: UnitId,
    pub layer: Layer,
    pub(crate) local: Id<NameOccurrence>,
}

impl DeclId {
    /// Stable ordering key within one build, used for deterministic output.
    pub fn sort_key(&self) -> (UnitId, u8, usize) {
        (self.unit, self.layer as u8, self.local.index())
    }
}
