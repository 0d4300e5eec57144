//! Shared state of a running build.
//!
//! Interface layers are published exactly once, after their pass, and read
//! concurrently by every later pass. Publication goes through a `OnceLock`
//! per unit slot, so readers never need a lock; the name map is a `DashMap`
//! filled by the workers themselves.

use std::sync::OnceLock;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use crate::config::ResolutionConfig;

use super::ids::{Layer, UnitId};
use super::layer::{SymbolLayer, SymbolLookup};

pub struct UnitRegistry {
    names: DashMap<String, UnitId>,
    interfaces: Box<[OnceLock<SymbolLayer>]>,
    system: Option<UnitId>,
}

impl UnitRegistry {
    pub fn new(unit_count: usize, system: Option<UnitId>) -> Self {
        Self {
            names: DashMap::new(),
            interfaces: (0..unit_count).map(|_| OnceLock::new()).collect(),
            system,
        }
    }

    pub fn system(&self) -> Option<UnitId> {
        self.system
    }

    /// Makes `unit` reachable by name before its interface exists. Returns
    /// the unit already holding the name, if any.
    pub fn register(&self, unit: UnitId, name: &str) -> Option<UnitId> {
        match self.names.entry(name.to_lowercase()) {
            Entry::Occupied(entry) => Some(*entry.get()),
            Entry::Vacant(entry) => {
                entry.insert(unit);
                None
            }
        }
    }

    /// Freezes the interface layer of `unit` and makes it reachable by name.
    ///
    /// # Panics
    ///
    /// If the unit was already published.
    pub fn publish(&self, unit: UnitId, name: &str, layer: SymbolLayer) {
        if self.interfaces[unit.index()].set(layer).is_err() {
            panic!("interface of {unit} published twice");
        }
        self.names.insert(name.to_lowercase(), unit);
        debug!(%unit, name, "published interface");
    }

    pub fn lookup(&self, name: &str) -> Option<UnitId> {
        self.names.get(&name.to_lowercase()).map(|entry| *entry)
    }

    /// Resolves a uses-clause name through aliases and unit scope names.
    pub fn resolve_unit_name(&self, name: &str, config: &ResolutionConfig) -> Option<UnitId> {
        config
            .unit_name_candidates(name)
            .iter()
            .find_map(|candidate| self.lookup(candidate))
    }

    pub fn interface(&self, unit: UnitId) -> Option<&SymbolLayer> {
        self.interfaces.get(unit.index())?.get()
    }

    pub fn is_published(&self, unit: UnitId) -> bool {
        self.interface(unit).is_some()
    }

    pub fn into_interfaces(self) -> Vec<Option<SymbolLayer>> {
        self.interfaces
            .into_vec()
            .into_iter()
            .map(OnceLock::into_inner)
            .collect()
    }
}

/// What one unit pass can see: its own layers, possibly still under
/// construction, plus every published interface.
pub(crate) struct BuildView<'a> {
    pub registry: &'a UnitRegistry,
    pub unit: UnitId,
    pub interface: &'a SymbolLayer,
    pub implementation: Option<&'a SymbolLayer>,
}

impl SymbolLookup for BuildView<'_> {
    fn layer(&self, unit: UnitId, layer: Layer) -> Option<&SymbolLayer> {
        if unit == self.unit {
            return match layer {
                Layer::Interface => Some(self.interface),
                Layer::Implementation => self.implementation,
            };
        }
        match layer {
            Layer::Interface => self.registry.interface(unit),
            Layer::Implementation => None,
        }
    }

    fn system_unit(&self) -> Option<UnitId> {
        self.registry.system()
    }
}
