//! Whole-program build.
//!
//! Headers are scanned first to learn unit names and uses clauses. Interface
//! passes then run in waves following the interface import graph, so every
//! unit sees the published interfaces of the units it imports; units caught
//! in an import cycle share a final wave. Implementation passes depend only
//! on their own interface and run all at once. A file that cannot be loaded
//! is reported and left out; the others still build.

use std::collections::HashSet;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::UnitError;
use crate::semantic::builder::{UnitContext, build_implementation, build_interface};
use crate::semantic::dependency::{DependencyTracker, propagate_inline_dependencies};
use crate::semantic::ids::UnitId;
use crate::semantic::index::LocationIndex;
use crate::semantic::layer::SymbolLayer;
use crate::semantic::registry::UnitRegistry;
use crate::semantic::system::{self, SYSTEM_UNIT_NAME};
use crate::semantic::table::{SymbolTable, UnitSymbols};
use crate::syntax::ast::UnitKind;
use crate::syntax::loader::{TreeLoader, UnitHeader};

pub struct BuildOutcome {
    pub table: SymbolTable,
    /// Files left out of the table, in no particular order.
    pub failures: Vec<UnitError>,
}

/// What survives a unit's interface pass besides the published layer.
struct InterfaceState {
    locations: LocationIndex,
    tracker: DependencyTracker,
}

struct ImplementationState {
    layer: Option<SymbolLayer>,
    locations: LocationIndex,
    tracker: DependencyTracker,
}

#[derive(Debug, Clone)]
pub struct Project {
    config: Config,
}

impl Project {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build(&self, paths: &[PathBuf], loader: &dyn TreeLoader) -> BuildOutcome {
        let mut failures = Vec::new();

        let headers = self.scan_headers(paths, loader, &mut failures);
        // slot 0 holds a synthetic System when the project has none
        let supplied_system = headers.iter().position(|h| system::is_system_name(&h.name));
        let mut slots: Vec<Option<UnitHeader>> = Vec::with_capacity(headers.len() + 1);
        if supplied_system.is_none() {
            slots.push(None);
        }
        slots.extend(headers.into_iter().map(Some));
        let system = UnitId::new(
            slots
                .iter()
                .position(|s| s.as_ref().is_some_and(|h| system::is_system_name(&h.name)))
                .unwrap_or(0),
        );

        let registry = UnitRegistry::new(slots.len(), Some(system));
        if supplied_system.is_none() {
            registry.publish(system, SYSTEM_UNIT_NAME, system::synthetic_system(system));
        }
        for (index, header) in slots.iter().enumerate() {
            if let Some(header) = header {
                registry.register(UnitId::new(index), &header.name);
            }
        }

        let interfaces = self.interface_passes(&slots, &registry, loader, &mut failures);
        let mut trackers = self.implementation_passes(&slots, &registry, loader, interfaces, &mut failures);

        let mut implementations: Vec<Option<(Option<SymbolLayer>, LocationIndex)>> =
            Vec::with_capacity(slots.len());
        let mut tracker_slots: Vec<Option<DependencyTracker>> = Vec::with_capacity(slots.len());
        for state in trackers.drain(..) {
            match state {
                Some(state) => {
                    implementations.push(Some((state.layer, state.locations)));
                    tracker_slots.push(Some(state.tracker));
                }
                None => {
                    implementations.push(None);
                    tracker_slots.push(None);
                }
            }
        }
        propagate_inline_dependencies(&mut tracker_slots);

        let units = registry
            .into_interfaces()
            .into_iter()
            .zip(implementations)
            .zip(tracker_slots)
            .zip(slots)
            .enumerate()
            .map(|(index, (((interface, implementation), tracker), header))| {
                let interface = interface?;
                let id = UnitId::new(index);
                let declaration = interface
                    .root()
                    .and_then(|root| interface.scope(root).owner)?;
                let (implementation, locations) = implementation.unwrap_or_default();
                Some(UnitSymbols {
                    id,
                    name: header
                        .as_ref()
                        .map_or_else(|| SYSTEM_UNIT_NAME.to_string(), |h| h.name.clone()),
                    path: header.as_ref().map(|h| h.path.clone()).unwrap_or_default(),
                    kind: header.as_ref().map_or(UnitKind::Unit, |h| h.kind),
                    declaration,
                    interface,
                    implementation,
                    dependencies: tracker
                        .map(DependencyTracker::into_dependencies)
                        .unwrap_or_default(),
                    locations,
                })
            })
            .collect::<Vec<_>>();

        let table = SymbolTable::new(units, Some(system));
        info!(
            units = table.unit_count(),
            failed = failures.len(),
            "symbol table built"
        );
        BuildOutcome { table, failures }
    }

    /// Reads every header, dropping unreadable files and later files that
    /// repeat a unit name.
    fn scan_headers(
        &self,
        paths: &[PathBuf],
        loader: &dyn TreeLoader,
        failures: &mut Vec<UnitError>,
    ) -> Vec<UnitHeader> {
        let scanned: Vec<Result<UnitHeader, UnitError>> = if self.config.build.parallel {
            paths.par_iter().map(|path| loader.header(path)).collect()
        } else {
            paths.iter().map(|path| loader.header(path)).collect()
        };

        let mut seen = HashSet::new();
        let mut headers = Vec::new();
        for header in scanned {
            match header {
                Ok(header) if !seen.insert(header.name.to_lowercase()) => {
                    warn!(path = %header.path.display(), name = %header.name, "duplicate unit name");
                    failures.push(UnitError::DuplicateUnit {
                        path: header.path,
                        name: header.name,
                    });
                }
                Ok(header) => headers.push(header),
                Err(error) => {
                    warn!(path = %error.path().display(), %error, "unit excluded");
                    failures.push(error);
                }
            }
        }
        info!(units = headers.len(), failed = failures.len(), "headers scanned");
        headers
    }

    /// Project units a unit's interface pass has to wait for.
    fn interface_imports(&self, unit: UnitId, header: &UnitHeader, registry: &UnitRegistry) -> Vec<UnitId> {
        let mut imports: Vec<UnitId> = header
            .interface_uses
            .iter()
            .filter_map(|name| registry.resolve_unit_name(name, &self.config.resolution))
            .collect();
        if let Some(system) = registry.system() {
            imports.push(system);
        }
        imports.retain(|import| *import != unit);
        imports
    }

    fn interface_passes(
        &self,
        slots: &[Option<UnitHeader>],
        registry: &UnitRegistry,
        loader: &dyn TreeLoader,
        failures: &mut Vec<UnitError>,
    ) -> Vec<Option<InterfaceState>> {
        let mut states: Vec<Option<InterfaceState>> = slots.iter().map(|_| None).collect();
        let imports: Vec<Vec<UnitId>> = slots
            .iter()
            .enumerate()
            .map(|(index, header)| match header {
                Some(header) => self.interface_imports(UnitId::new(index), header, registry),
                None => Vec::new(),
            })
            .collect();

        // a unit is settled once its pass ran, successfully or not
        let mut settled: Vec<bool> = slots.iter().map(Option::is_none).collect();
        let mut waves = 0;
        while settled.iter().any(|s| !s) {
            let mut wave: Vec<UnitId> = (0..slots.len())
                .filter(|i| !settled[*i])
                .filter(|i| imports[*i].iter().all(|import| settled[import.index()]))
                .map(UnitId::new)
                .collect();
            if wave.is_empty() {
                wave = (0..slots.len()).filter(|i| !settled[*i]).map(UnitId::new).collect();
                warn!(units = wave.len(), "interface import cycle; building remaining units together");
            }

            let pass = |unit: UnitId| -> (UnitId, Result<InterfaceState, UnitError>) {
                let Some(header) = &slots[unit.index()] else {
                    panic!("interface pass scheduled for {unit} without a header");
                };
                let result = loader.load(&header.path).map(|tree| {
                    let ctx = UnitContext {
                        registry,
                        config: &self.config.resolution,
                        header,
                        unit,
                    };
                    let output = build_interface(&ctx, &tree);
                    registry.publish(unit, &header.name, output.layer);
                    InterfaceState {
                        locations: output.locations,
                        tracker: output.tracker,
                    }
                });
                (unit, result)
            };
            let results: Vec<_> = if self.config.build.parallel {
                wave.par_iter().map(|unit| pass(*unit)).collect()
            } else {
                wave.iter().map(|unit| pass(*unit)).collect()
            };

            for (unit, result) in results {
                settled[unit.index()] = true;
                match result {
                    Ok(state) => states[unit.index()] = Some(state),
                    Err(error) => {
                        warn!(path = %error.path().display(), %error, "unit excluded");
                        failures.push(error);
                    }
                }
            }
            waves += 1;
        }
        info!(
            units = states.iter().flatten().count(),
            waves,
            failed = failures.len(),
            "interface passes finished"
        );
        states
    }

    fn implementation_passes(
        &self,
        slots: &[Option<UnitHeader>],
        registry: &UnitRegistry,
        loader: &dyn TreeLoader,
        interfaces: Vec<Option<InterfaceState>>,
        failures: &mut Vec<UnitError>,
    ) -> Vec<Option<ImplementationState>> {
        let pending: Vec<(UnitId, InterfaceState)> = interfaces
            .into_iter()
            .enumerate()
            .filter_map(|(index, state)| Some((UnitId::new(index), state?)))
            .collect();

        let pass = |(unit, state): (UnitId, InterfaceState)| -> (UnitId, ImplementationState, Option<UnitError>) {
            let (Some(header), Some(interface)) = (&slots[unit.index()], registry.interface(unit)) else {
                panic!("implementation pass scheduled for {unit} without a published interface");
            };
            match loader.load(&header.path) {
                Ok(tree) => {
                    let ctx = UnitContext {
                        registry,
                        config: &self.config.resolution,
                        header,
                        unit,
                    };
                    let output = build_implementation(&ctx, &tree, interface, state.locations, state.tracker);
                    let state = ImplementationState {
                        layer: Some(output.layer),
                        locations: output.locations,
                        tracker: output.tracker,
                    };
                    (unit, state, None)
                }
                Err(error) => {
                    let state = ImplementationState {
                        layer: None,
                        locations: state.locations,
                        tracker: state.tracker,
                    };
                    (unit, state, Some(error))
                }
            }
        };
        let results: Vec<_> = if self.config.build.parallel {
            pending.into_par_iter().map(pass).collect()
        } else {
            pending.into_iter().map(pass).collect()
        };

        let mut states: Vec<Option<ImplementationState>> = slots.iter().map(|_| None).collect();
        for (unit, state, error) in results {
            if let Some(error) = error {
                warn!(path = %error.path().display(), %error, "implementation pass skipped");
                failures.push(error);
            }
            states[unit.index()] = Some(state);
        }
        info!(
            units = states.iter().flatten().count(),
            "implementation passes finished"
        );
        states
    }
}
