//! Symbol-table builder.
//!
//! A [`UnitBuilder`] walks one unit's tree for one pass with an explicit
//! scope stack. The interface pass produces the layer other units see; the
//! implementation pass produces a second layer whose unit scope hangs off
//! the interface root. Every reference goes through the resolver, and the
//! occurrences it queues are committed here: specializations are
//! materialized, locations recorded and dependencies tracked.

mod declarations;
mod statements;
mod types;

use std::collections::HashMap;

use tracing::debug;

use crate::config::ResolutionConfig;
use crate::syntax::ast::{Expr, Ident, SourceUnit, SyntaxTree, UnitKind, Visibility};
use crate::syntax::loader::UnitHeader;
use crate::syntax::location::TextRange;

use super::declaration::{DeclKind, Declaration, Location, RoutineDecl, UnitDecl};
use super::dependency::{DependencyTracker, component_dependencies};
use super::ids::{DeclId, Layer, ScopeId, UnitId};
use super::index::LocationIndex;
use super::layer::{SymbolLayer, SymbolLookup};
use super::occurrence::NameOccurrence;
use super::registry::{BuildView, UnitRegistry};
use super::resolver::{Binding, ExprInfo, PendingOccurrence, Resolver};
use super::scope::ScopeKind;
use super::specialize::specialize;
use super::system;
use super::types::Type;

/// What a pass over one unit needs from the surrounding build.
pub(crate) struct UnitContext<'a> {
    pub registry: &'a UnitRegistry,
    pub config: &'a ResolutionConfig,
    pub header: &'a UnitHeader,
    pub unit: UnitId,
}

pub(crate) struct PassOutput {
    pub layer: SymbolLayer,
    pub locations: LocationIndex,
    pub tracker: DependencyTracker,
}

pub(crate) fn build_interface(ctx: &UnitContext<'_>, tree: &SyntaxTree) -> PassOutput {
    let tracker = DependencyTracker::new(ctx.unit, ctx.registry.system());
    let mut builder = UnitBuilder::new(ctx, None, LocationIndex::new(), tracker);
    builder.interface_pass(&tree.unit);
    builder.finish()
}

/// Runs the implementation pass against the unit's published interface,
/// continuing the location index and dependency tracker of that pass.
pub(crate) fn build_implementation(
    ctx: &UnitContext<'_>,
    tree: &SyntaxTree,
    interface: &SymbolLayer,
    locations: LocationIndex,
    tracker: DependencyTracker,
) -> PassOutput {
    let mut builder = UnitBuilder::new(ctx, Some(interface), locations, tracker);
    builder.implementation_pass(&tree.unit);
    builder.finish()
}

/// Resolver output bound to what the occurrence will finally point at.
struct Bound {
    origin: DeclId,
    target: Target,
    inline: bool,
}

enum Target {
    Existing(DeclId),
    Specialized {
        args: Vec<Type>,
        declaration: Box<Declaration>,
    },
}

pub(crate) struct UnitBuilder<'a> {
    ctx: &'a UnitContext<'a>,
    /// The frozen interface while the implementation pass runs.
    interface: Option<&'a SymbolLayer>,
    layer: SymbolLayer,
    section: Layer,
    scopes: Vec<ScopeId>,
    /// Enclosing routine implementations, outermost first.
    routines: Vec<DeclId>,
    visibility: Visibility,
    locations: LocationIndex,
    tracker: DependencyTracker,
    anonymous: HashMap<TextRange, Type>,
}

impl<'a> UnitBuilder<'a> {
    fn new(
        ctx: &'a UnitContext<'a>,
        interface: Option<&'a SymbolLayer>,
        locations: LocationIndex,
        tracker: DependencyTracker,
    ) -> Self {
        let section = match interface {
            Some(_) => Layer::Implementation,
            None => Layer::Interface,
        };
        Self {
            ctx,
            interface,
            layer: SymbolLayer::new(ctx.unit, section),
            section,
            scopes: Vec::new(),
            routines: Vec::new(),
            visibility: Visibility::Public,
            locations,
            tracker,
            anonymous: HashMap::new(),
        }
    }

    fn finish(self) -> PassOutput {
        debug_assert!(self.scopes.is_empty(), "scopes left open at end of pass");
        debug!(
            unit = %self.ctx.unit,
            section = ?self.section,
            scopes = self.layer.scope_count(),
            declarations = self.layer.declaration_count(),
            occurrences = self.layer.occurrence_count(),
            "pass finished"
        );
        PassOutput {
            layer: self.layer,
            locations: self.locations,
            tracker: self.tracker,
        }
    }

    fn is_system(&self) -> bool {
        self.ctx.registry.system() == Some(self.ctx.unit)
    }

    fn interface_pass(&mut self, unit: &SourceUnit) {
        let kind = if self.is_system() {
            ScopeKind::Global
        } else {
            ScopeKind::Unit
        };
        let root = self.push_scope(kind, unit.range, None);

        let name = unit.name.text();
        let namespace = unit.name.parts[..unit.name.parts.len().saturating_sub(1)]
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(".");
        let declaration = Declaration::new(
            name.clone(),
            name,
            self.location(unit.name.range),
            root,
            DeclKind::Unit(UnitDecl {
                unit: self.ctx.unit,
                unit_kind: unit.kind,
                namespace,
                path: self.ctx.header.path.clone(),
            }),
        );
        let unit_decl = self.layer.declare(declaration);
        self.locations.record_declaration(unit.name.range, unit_decl);
        self.layer.scope_mut(root).owner = Some(unit_decl);

        if self.is_system() {
            system::populate(&mut self.layer, root, false);
        }

        if unit.kind == UnitKind::Unit {
            if let Some(section) = &unit.interface {
                self.uses(section);
                self.declarations(&section.declarations);
            }
        }

        let components = {
            let view = self.view();
            component_dependencies(&self.layer, &view, self.ctx.config)
        };
        self.tracker.add_all(Layer::Interface, components);
        self.pop_scope();
    }

    fn implementation_pass(&mut self, unit: &SourceUnit) {
        let Some(interface) = self.interface else {
            panic!("implementation pass of {} without an interface", self.ctx.unit);
        };
        let Some(root) = interface.root() else {
            panic!("interface of {} has no root scope", self.ctx.unit);
        };
        let owner = interface.scope(root).owner;

        let range = unit.implementation.as_ref().map_or(unit.range, |s| s.range);
        let scope = self.layer.create_scope(ScopeKind::Unit, Some(root), range);
        self.layer.scope_mut(scope).owner = owner;
        if unit.implementation.is_some() {
            self.locations.record_scope(range, ScopeKind::Unit, scope);
        }
        self.scopes.push(scope);

        if let Some(section) = &unit.implementation {
            self.uses(section);
            self.declarations(&section.declarations);
        }
        for block in [&unit.initialization, &unit.finalization, &unit.main]
            .into_iter()
            .flatten()
        {
            self.block(block);
        }
        self.pop_scope();
    }

    fn view(&self) -> BuildView<'_> {
        match self.interface {
            None => BuildView {
                registry: self.ctx.registry,
                unit: self.ctx.unit,
                interface: &self.layer,
                implementation: None,
            },
            Some(interface) => BuildView {
                registry: self.ctx.registry,
                unit: self.ctx.unit,
                interface,
                implementation: Some(&self.layer),
            },
        }
    }

    fn location(&self, range: TextRange) -> Location {
        Location {
            unit: self.ctx.unit,
            range,
        }
    }

    // ---- scope stack ----

    fn current(&self) -> ScopeId {
        match self.scopes.last() {
            Some(scope) => *scope,
            None => panic!("scope stack underflow in {}", self.ctx.unit),
        }
    }

    fn push_scope(&mut self, kind: ScopeKind, range: TextRange, owner: Option<DeclId>) -> ScopeId {
        let parent = self.scopes.last().copied();
        let scope = self.layer.create_scope(kind, parent, range);
        self.layer.scope_mut(scope).owner = owner;
        self.locations.record_scope(range, kind, scope);
        self.scopes.push(scope);
        scope
    }

    /// Re-enters a scope created earlier in this pass.
    fn enter_scope(&mut self, scope: ScopeId) {
        self.scopes.push(scope);
    }

    fn pop_scope(&mut self) -> ScopeId {
        match self.scopes.pop() {
            Some(scope) => scope,
            None => panic!("scope stack underflow in {}", self.ctx.unit),
        }
    }

    // ---- declarations ----

    /// Type whose members are declared in `scope`, if it is a struct body.
    fn member_owner(&self, scope: ScopeId) -> Option<DeclId> {
        let view = self.view();
        let scope = view.scope(scope);
        if scope.kind != ScopeKind::Type {
            return None;
        }
        let owner = scope.owner?;
        view.declaration(owner)
            .as_type()
            .filter(|t| t.ty.struct_decl().is_some())
            .map(|_| owner)
    }

    fn qualify(&self, scope: ScopeId, name: &str) -> String {
        let view = self.view();
        view.scope_chain(scope)
            .into_iter()
            .find_map(|id| view.scope(id).owner)
            .map(|owner| view.declaration(owner).qualified_name.clone())
            .filter(|prefix| !prefix.is_empty())
            .map_or_else(|| name.to_string(), |prefix| format!("{prefix}.{name}"))
    }

    fn new_declaration(&self, name: &str, range: TextRange, scope: ScopeId, kind: DeclKind) -> Declaration {
        let mut declaration = Declaration::new(
            name,
            self.qualify(scope, name),
            self.location(range),
            scope,
            kind,
        );
        declaration.owner = self.member_owner(scope);
        if declaration.owner.is_some() {
            declaration.visibility = self.visibility;
        }
        declaration.is_implementation = self.section == Layer::Implementation;
        declaration
    }

    /// Declares `ident` in the current scope.
    fn declare(&mut self, ident: &Ident, kind: DeclKind) -> DeclId {
        let scope = self.current();
        let declaration = self.new_declaration(&ident.name, ident.range, scope, kind);
        let id = self.layer.declare(declaration);
        self.locations.record_declaration(ident.range, id);
        id
    }

    /// Declares a compiler-provided name with no source identifier.
    fn declare_implicit(&mut self, name: &str, kind: DeclKind) -> DeclId {
        let scope = self.current();
        let range = self.layer.scope(scope).range;
        let declaration = self.new_declaration(name, range, scope, kind);
        self.layer.declare(declaration)
    }

    fn routine_mut(&mut self, id: DeclId) -> Option<&mut RoutineDecl> {
        match &mut self.layer.declaration_mut(id).kind {
            DeclKind::Routine(routine) => Some(routine),
            _ => None,
        }
    }

    // ---- resolution ----

    /// Runs `f` against a resolver positioned at the current scope and
    /// commits the occurrences it queued.
    fn resolve<R>(&mut self, f: impl FnOnce(&mut Resolver<'_>) -> R) -> R {
        let scope = self.current();
        let routine = self.routines.last().copied();
        let (result, pending) = {
            let view = self.view();
            let mut resolver = Resolver::new(&view, self.ctx.unit, scope, routine, &self.anonymous);
            let result = f(&mut resolver);
            (result, resolver.finish())
        };
        self.commit(scope, pending);
        result
    }

    fn value(&mut self, expr: &Expr, expected: Option<&Type>) -> ExprInfo {
        self.anonymous_methods(expr);
        self.resolve(|r| r.expression(expr, expected))
    }

    fn expr(&mut self, expr: &Expr, expected: Option<&Type>) -> Type {
        self.value(expr, expected).ty()
    }

    fn commit(&mut self, scope: ScopeId, pending: Vec<PendingOccurrence>) {
        if pending.is_empty() {
            return;
        }
        let bound: Vec<Option<Bound>> = {
            let view = self.view();
            pending
                .iter()
                .map(|p| p.binding.as_ref().map(|b| self.bind(&view, b)))
                .collect()
        };

        let section = self.section;
        let mut ids = Vec::with_capacity(pending.len());
        let mut links = Vec::new();
        for (index, (occurrence, bound)) in pending.into_iter().zip(bound).enumerate() {
            let declaration = match bound {
                Some(bound) => {
                    let id = match bound.target {
                        Target::Existing(id) => id,
                        Target::Specialized { args, declaration } => {
                            match self.layer.cached_specialization(bound.origin, &args) {
                                Some(id) => id,
                                None => {
                                    let id = self.layer.alloc_declaration(*declaration);
                                    self.layer.cache_specialization(bound.origin, args, id);
                                    id
                                }
                            }
                        }
                    };
                    self.tracker.record(section, bound.origin.unit, &self.routines);
                    if bound.inline {
                        let caller = self.routines.last().copied();
                        self.tracker.record_inline_call(section, caller, bound.origin);
                    }
                    Some(id)
                }
                None => None,
            };
            let range = occurrence.range;
            let location = self.location(range);
            let id = self.layer.add_occurrence(|id| NameOccurrence {
                id,
                name: occurrence.name,
                location,
                scope,
                declaration,
                is_explicit_invocation: occurrence.is_explicit_invocation,
                type_arguments: occurrence.type_arguments,
                qualifies: None,
            });
            self.locations.record_occurrence(range, id);
            if let Some(next) = occurrence.qualifies {
                links.push((index, next));
            }
            ids.push(id);
        }
        for (from, to) in links {
            self.layer.occurrence_mut(ids[from]).qualifies = Some(ids[to]);
        }
    }

    fn bind(&self, view: &BuildView<'_>, binding: &Binding) -> Bound {
        let origin = binding.decl;
        let declaration = view.declaration(origin);
        let inline = declaration.as_routine().is_some_and(RoutineDecl::is_inline);
        let target = if binding.substitution.is_empty() {
            Target::Existing(origin)
        } else {
            let args = binding.substitution.types();
            match self.layer.cached_specialization(origin, &args) {
                Some(id) => Target::Existing(id),
                None => match specialize(origin, declaration, &binding.substitution) {
                    Some(specialized) => Target::Specialized {
                        args,
                        declaration: Box::new(specialized),
                    },
                    None => Target::Existing(origin),
                },
            }
        };
        Bound {
            origin,
            target,
            inline,
        }
    }
}
