//! Unit dependency analysis.
//!
//! Dependencies accumulate while a unit's passes resolve references: every
//! occurrence bound into another unit adds that unit to the set of the
//! section being walked. Two extra rules run on top of that: component
//! descendants pull in the units of their published field types, and calls
//! to inline routines pull in the dependencies of the inlined body.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::config::ResolutionConfig;

use super::declaration::{DeclKind, Visibility};
use super::ids::{DeclId, Layer, UnitId};
use super::layer::{SymbolLayer, SymbolLookup};
use super::types::Type;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitDependencySet {
    pub interface: BTreeSet<UnitId>,
    pub implementation: BTreeSet<UnitId>,
}

impl UnitDependencySet {
    pub fn interface_dependencies(&self) -> &BTreeSet<UnitId> {
        &self.interface
    }

    pub fn implementation_dependencies(&self) -> &BTreeSet<UnitId> {
        &self.implementation
    }

    pub fn has_dependency(&self, unit: UnitId) -> bool {
        self.interface.contains(&unit) || self.implementation.contains(&unit)
    }

    fn section_mut(&mut self, section: Layer) -> &mut BTreeSet<UnitId> {
        match section {
            Layer::Interface => &mut self.interface,
            Layer::Implementation => &mut self.implementation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InlineCall {
    pub section: Layer,
    pub caller: Option<DeclId>,
    pub callee: DeclId,
}

/// Per-unit accumulator threaded through both passes.
#[derive(Debug)]
pub(crate) struct DependencyTracker {
    unit: UnitId,
    system: Option<UnitId>,
    pub(crate) dependencies: UnitDependencySet,
    /// Units referenced from each routine body.
    pub(crate) routine_dependencies: HashMap<DeclId, BTreeSet<UnitId>>,
    pub(crate) inline_calls: Vec<InlineCall>,
}

impl DependencyTracker {
    pub fn new(unit: UnitId, system: Option<UnitId>) -> Self {
        Self {
            unit,
            system,
            dependencies: UnitDependencySet::default(),
            routine_dependencies: HashMap::new(),
            inline_calls: Vec::new(),
        }
    }

    fn counts(&self, target: UnitId) -> bool {
        target != self.unit && Some(target) != self.system
    }

    /// A unit the interface already depends on is never also an
    /// implementation dependency.
    fn insert(&mut self, section: Layer, target: UnitId) {
        match section {
            Layer::Interface => {
                self.dependencies.implementation.remove(&target);
            }
            Layer::Implementation if self.dependencies.interface.contains(&target) => return,
            Layer::Implementation => {}
        }
        self.dependencies.section_mut(section).insert(target);
    }

    /// Records a reference into `target` made from `section`, inside the
    /// given enclosing routines.
    pub fn record(&mut self, section: Layer, target: UnitId, routines: &[DeclId]) {
        if !self.counts(target) {
            return;
        }
        self.insert(section, target);
        for routine in routines {
            self.routine_dependencies
                .entry(*routine)
                .or_default()
                .insert(target);
        }
    }

    pub fn record_inline_call(&mut self, section: Layer, caller: Option<DeclId>, callee: DeclId) {
        self.inline_calls.push(InlineCall {
            section,
            caller,
            callee,
        });
    }

    pub fn add_all(&mut self, section: Layer, targets: impl IntoIterator<Item = UnitId>) {
        for target in targets {
            if self.counts(target) {
                self.insert(section, target);
            }
        }
    }

    pub fn into_dependencies(self) -> UnitDependencySet {
        self.dependencies
    }
}

/// Adds, for every inline call, the transitive dependencies of the inlined
/// routine to the calling unit. Runs once all implementation passes are done.
pub(crate) fn propagate_inline_dependencies(trackers: &mut [Option<DependencyTracker>]) {
    let mut closure: HashMap<DeclId, BTreeSet<UnitId>> = HashMap::new();
    let mut nested: HashMap<DeclId, Vec<DeclId>> = HashMap::new();
    for tracker in trackers.iter().flatten() {
        for (routine, deps) in &tracker.routine_dependencies {
            closure.entry(*routine).or_default().extend(deps);
        }
        for call in &tracker.inline_calls {
            if let Some(caller) = call.caller {
                nested.entry(caller).or_default().push(call.callee);
            }
        }
    }

    loop {
        let mut changed = false;
        for (caller, callees) in &nested {
            let mut gained = BTreeSet::new();
            for callee in callees {
                gained.insert(callee.unit);
                if let Some(deps) = closure.get(callee) {
                    gained.extend(deps.iter().copied());
                }
            }
            let entry = closure.entry(*caller).or_default();
            let before = entry.len();
            entry.extend(gained);
            changed |= entry.len() != before;
        }
        if !changed {
            break;
        }
    }

    for tracker in trackers.iter_mut().flatten() {
        let calls = std::mem::take(&mut tracker.inline_calls);
        for call in &calls {
            if let Some(deps) = closure.get(&call.callee) {
                tracker.add_all(call.section, deps.iter().copied());
            }
        }
        tracker.inline_calls = calls;
    }
}

/// Units a component descendant needs for streaming: the declaring units of
/// its published field types and of their ancestors.
pub(crate) fn component_dependencies(
    interface: &SymbolLayer,
    lookup: &dyn SymbolLookup,
    config: &ResolutionConfig,
) -> BTreeSet<UnitId> {
    let mut units = BTreeSet::new();
    let Some((base_unit, base_name)) = config.component_base_parts() else {
        return units;
    };
    for (id, decl) in interface.declarations() {
        let Some(type_decl) = decl.as_type() else {
            continue;
        };
        if !type_decl.ty.is_class() || decl.is_forward {
            continue;
        }
        if !descends_from(id, base_unit, base_name, lookup) {
            continue;
        }
        let Some(body) = type_decl.body else {
            continue;
        };
        for member in lookup.scope(body).declarations() {
            let field = lookup.declaration(member);
            let DeclKind::Variable(variable) = &field.kind else {
                continue;
            };
            if field.visibility != Visibility::Published {
                continue;
            }
            collect_type_units(&variable.ty, lookup, &mut units);
        }
    }
    units
}

fn collect_type_units(ty: &Type, lookup: &dyn SymbolLookup, units: &mut BTreeSet<UnitId>) {
    let Some(decl) = ty.struct_decl() else {
        return;
    };
    let mut pending = vec![decl];
    let mut seen = Vec::new();
    while let Some(current) = pending.pop() {
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        units.insert(current.unit);
        for ancestor in lookup.ancestors_of(current) {
            if let Some(next) = ancestor.struct_decl() {
                pending.push(next);
            }
        }
    }
}

/// Whether `decl` is the component base or inherits from it.
pub(crate) fn descends_from(
    decl: DeclId,
    base_unit: &str,
    base_name: &str,
    lookup: &dyn SymbolLookup,
) -> bool {
    let mut pending = vec![decl];
    let mut seen = Vec::new();
    while let Some(current) = pending.pop() {
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        let declaration = lookup.declaration(current);
        if declaration.name.eq_ignore_ascii_case(base_name)
            && unit_name(current.unit, lookup).is_some_and(|n| n.eq_ignore_ascii_case(base_unit))
        {
            return true;
        }
        for ancestor in lookup.ancestors_of(current) {
            if let Some(next) = ancestor.struct_decl() {
                pending.push(next);
            }
        }
    }
    false
}

fn unit_name(unit: UnitId, lookup: &dyn SymbolLookup) -> Option<&str> {
    let root = lookup.unit_scope(unit)?;
    let owner = lookup.scope(root).owner?;
    Some(lookup.declaration(owner).name.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantic::declaration::Declaration;
    use id_arena::Arena;

    fn routine_id(arena: &mut Arena<Declaration>, unit: u32) -> DeclId {
        DeclId {
            unit: UnitId(unit),
            layer: Layer::Implementation,
            local: arena.next_id(),
        }
    }

    #[test]
    fn own_unit_and_system_are_not_dependencies() {
        let mut tracker = DependencyTracker::new(UnitId(2), Some(UnitId(0)));
        tracker.record(Layer::Interface, UnitId(2), &[]);
        tracker.record(Layer::Interface, UnitId(0), &[]);
        tracker.record(Layer::Implementation, UnitId(5), &[]);

        let deps = tracker.into_dependencies();
        assert!(deps.interface.is_empty());
        assert_eq!(deps.implementation, BTreeSet::from([UnitId(5)]));
        assert!(deps.has_dependency(UnitId(5)));
        assert!(!deps.has_dependency(UnitId(0)));
    }

    #[test]
    fn interface_dependencies_are_not_repeated_in_the_implementation() {
        let mut arena = Arena::<Declaration>::new();
        let body = routine_id(&mut arena, 2);
        let mut tracker = DependencyTracker::new(UnitId(2), Some(UnitId(0)));
        tracker.record(Layer::Interface, UnitId(3), &[]);
        tracker.record(Layer::Implementation, UnitId(3), &[body]);
        tracker.add_all(Layer::Implementation, [UnitId(3), UnitId(4)]);

        assert_eq!(tracker.routine_dependencies[&body], BTreeSet::from([UnitId(3)]));
        let deps = tracker.into_dependencies();
        assert_eq!(deps.interface, BTreeSet::from([UnitId(3)]));
        assert_eq!(deps.implementation, BTreeSet::from([UnitId(4)]));
    }

    #[test]
    fn inline_calls_pull_in_transitive_dependencies() {
        let mut arena = Arena::<Declaration>::new();
        // unit 1: inline Outer calls inline Inner (unit 2); Inner uses unit 3.
        let outer = routine_id(&mut arena, 1);
        let mut arena2 = Arena::<Declaration>::new();
        let inner = routine_id(&mut arena2, 2);

        let mut unit1 = DependencyTracker::new(UnitId(1), Some(UnitId(0)));
        unit1.record(Layer::Implementation, UnitId(2), &[outer]);
        unit1.record_inline_call(Layer::Implementation, Some(outer), inner);

        let mut unit2 = DependencyTracker::new(UnitId(2), Some(UnitId(0)));
        unit2.record(Layer::Implementation, UnitId(3), &[inner]);

        let mut unit4 = DependencyTracker::new(UnitId(4), Some(UnitId(0)));
        unit4.record(Layer::Implementation, UnitId(1), &[]);
        unit4.record_inline_call(Layer::Implementation, None, outer);

        let mut trackers = vec![None, Some(unit1), Some(unit2), None, Some(unit4)];
        propagate_inline_dependencies(&mut trackers);

        let unit4 = trackers[4].take().unwrap().into_dependencies();
        assert_eq!(
            unit4.implementation,
            BTreeSet::from([UnitId(1), UnitId(2), UnitId(3)])
        );
        let unit1 = trackers[1].take().unwrap().into_dependencies();
        assert_eq!(unit1.implementation, BTreeSet::from([UnitId(2), UnitId(3)]));
    }
}
