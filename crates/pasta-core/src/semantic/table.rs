//! The persisted symbol table.
//!
//! Holds, per successfully built unit, its two layers, its dependency sets
//! and the position index used to re-associate a fresh tree. Nothing here
//! refers to a syntax tree.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::syntax::ast::UnitKind;

use super::declaration::Declaration;
use super::dependency::UnitDependencySet;
use super::ids::{DeclId, Layer, OccurrenceId, ScopeId, UnitId};
use super::index::LocationIndex;
use super::layer::{SymbolLayer, SymbolLookup};
use super::occurrence::NameOccurrence;
use super::scope::{Scope, ScopeKind};

/// Everything persisted for one unit.
#[derive(Debug)]
pub struct UnitSymbols {
    pub id: UnitId,
    pub name: String,
    pub path: PathBuf,
    pub kind: UnitKind,
    /// The unit's own declaration, owner of its root scope.
    pub declaration: DeclId,
    pub interface: SymbolLayer,
    /// Absent when the implementation pass did not complete.
    pub implementation: Option<SymbolLayer>,
    pub dependencies: UnitDependencySet,
    pub locations: LocationIndex,
}

impl UnitSymbols {
    pub fn root(&self) -> Option<ScopeId> {
        self.interface.root()
    }

    /// Occurrences of both layers in creation order.
    pub fn occurrences(&self) -> impl Iterator<Item = &NameOccurrence> {
        self.interface
            .occurrences()
            .chain(self.implementation.iter().flat_map(SymbolLayer::occurrences))
    }

    pub fn declarations(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.interface
            .declarations()
            .chain(self.implementation.iter().flat_map(SymbolLayer::declarations))
    }
}

#[derive(Debug, Default)]
pub struct SymbolTable {
    units: Vec<Option<UnitSymbols>>,
    names: HashMap<String, UnitId>,
    paths: HashMap<PathBuf, UnitId>,
    system: Option<UnitId>,
    /// Occurrences per declaration, specializations folded into their
    /// generic declaration.
    references: HashMap<DeclId, Vec<OccurrenceId>>,
}

impl SymbolTable {
    /// `units` is indexed by unit id; failed units leave a `None` slot.
    pub fn new(units: Vec<Option<UnitSymbols>>, system: Option<UnitId>) -> Self {
        let mut table = Self {
            units,
            system,
            ..Self::default()
        };
        for unit in table.units.iter().flatten() {
            table.names.insert(unit.name.to_lowercase(), unit.id);
            table.paths.insert(unit.path.clone(), unit.id);
        }

        let mut references: HashMap<DeclId, Vec<OccurrenceId>> = HashMap::new();
        for unit in table.units.iter().flatten() {
            for occurrence in unit.occurrences() {
                let Some(decl) = occurrence.declaration else {
                    continue;
                };
                references.entry(decl).or_default().push(occurrence.id);
                if let Some(origin) = table.declaration(decl).generic_origin {
                    references.entry(origin).or_default().push(occurrence.id);
                }
            }
        }
        table.references = references;
        table
    }

    pub fn unit(&self, id: UnitId) -> Option<&UnitSymbols> {
        self.units.get(id.index())?.as_ref()
    }

    pub fn unit_by_name(&self, name: &str) -> Option<&UnitSymbols> {
        self.names.get(&name.to_lowercase()).and_then(|id| self.unit(*id))
    }

    pub fn unit_by_path(&self, path: &Path) -> Option<&UnitSymbols> {
        self.paths.get(path).and_then(|id| self.unit(*id))
    }

    pub fn units(&self) -> impl Iterator<Item = &UnitSymbols> {
        self.units.iter().flatten()
    }

    pub fn unit_count(&self) -> usize {
        self.units().count()
    }

    pub fn system(&self) -> Option<UnitId> {
        self.system
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> &[DeclId] {
        self.scope(scope).lookup(name)
    }

    pub fn enclosing_scope_of_kind(&self, scope: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        SymbolLookup::enclosing_scope_of_kind(self, scope, kind)
    }

    /// Every occurrence bound to `decl` or to one of its specializations.
    pub fn occurrences_of(&self, decl: DeclId) -> &[OccurrenceId] {
        self.references.get(&decl).map_or(&[], Vec::as_slice)
    }

    pub fn dependencies(&self, unit: UnitId) -> Option<&UnitDependencySet> {
        self.unit(unit).map(|u| &u.dependencies)
    }

    pub fn interface_dependencies(&self, unit: UnitId) -> Option<&BTreeSet<UnitId>> {
        self.dependencies(unit).map(UnitDependencySet::interface_dependencies)
    }

    pub fn implementation_dependencies(&self, unit: UnitId) -> Option<&BTreeSet<UnitId>> {
        self.dependencies(unit)
            .map(UnitDependencySet::implementation_dependencies)
    }

    pub fn has_dependency(&self, unit: UnitId, other: UnitId) -> bool {
        self.dependencies(unit)
            .is_some_and(|deps| deps.has_dependency(other))
    }

    pub fn location_index(&self, unit: UnitId) -> Option<&LocationIndex> {
        self.unit(unit).map(|u| &u.locations)
    }

    /// Scope of a handle issued by this table.
    ///
    /// # Panics
    ///
    /// If the handle belongs to a unit that is not in the table.
    pub fn scope(&self, id: ScopeId) -> &Scope {
        SymbolLookup::scope(self, id)
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        SymbolLookup::declaration(self, id)
    }

    pub fn occurrence(&self, id: OccurrenceId) -> &NameOccurrence {
        SymbolLookup::occurrence(self, id)
    }
}

impl SymbolLookup for SymbolTable {
    fn layer(&self, unit: UnitId, layer: Layer) -> Option<&SymbolLayer> {
        let unit = self.unit(unit)?;
        match layer {
            Layer::Interface => Some(&unit.interface),
            Layer::Implementation => unit.implementation.as_ref(),
        }
    }

    fn system_unit(&self) -> Option<UnitId> {
        self.system
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::declaration::{DeclKind, Location, UnitDecl};
    use crate::syntax::location::TextRange;

    fn unit(index: usize, name: &str) -> UnitSymbols {
        let id = UnitId::new(index);
        let mut interface = SymbolLayer::new(id, Layer::Interface);
        let root = interface.create_scope(ScopeKind::Unit, None, TextRange::default());
        let declaration = interface.declare(Declaration::new(
            name,
            name,
            Location {
                unit: id,
                range: TextRange::default(),
            },
            root,
            DeclKind::Unit(UnitDecl {
                unit: id,
                unit_kind: UnitKind::Unit,
                namespace: String::new(),
                path: PathBuf::from(format!("{name}.pas")),
            }),
        ));
        interface.scope_mut(root).owner = Some(declaration);
        UnitSymbols {
            id,
            name: name.to_string(),
            path: PathBuf::from(format!("{name}.pas")),
            kind: UnitKind::Unit,
            declaration,
            interface,
            implementation: None,
            dependencies: UnitDependencySet::default(),
            locations: LocationIndex::new(),
        }
    }

    #[test]
    fn units_are_found_by_name_and_path() {
        let table = SymbolTable::new(vec![Some(unit(0, "Alpha")), None, Some(unit(2, "Gamma"))], None);

        assert_eq!(table.unit_count(), 2);
        assert_eq!(table.unit_by_name("GAMMA").map(|u| u.id), Some(UnitId::new(2)));
        assert_eq!(
            table.unit_by_path(Path::new("Alpha.pas")).map(|u| u.id),
            Some(UnitId::new(0))
        );
        assert!(table.unit(UnitId::new(1)).is_none());
        assert!(table.interface_dependencies(UnitId::new(1)).is_none());
    }

    #[test]
    fn unit_scope_resolves_through_the_table() {
        let table = SymbolTable::new(vec![Some(unit(0, "Alpha"))], None);
        let alpha = table.unit(UnitId::new(0)).unwrap();
        let root = alpha.root().unwrap();

        assert_eq!(table.lookup(root, "alpha"), &[alpha.declaration]);
        assert_eq!(table.scope(root).owner, Some(alpha.declaration));
        assert!(table.occurrences_of(alpha.declaration).is_empty());
    }
}
