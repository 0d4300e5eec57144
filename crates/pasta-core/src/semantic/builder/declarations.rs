//! Uses clauses, declaration sections and routines.

use tracing::debug;

use crate::syntax::ast::{
    ConstDeclaration, Constraint, DeclSection, Directive, NameSegment, ParamGroup,
    RoutineHeading, RoutineImplementation, RoutineKind, Section, TypeParameter, VarDeclaration,
};

use super::super::declaration::{
    ConstraintKind, DeclKind, ImportDecl, Parameter, RoutineDecl, TypeParameterDecl,
    VariableDecl, VariableKind,
};
use super::super::ids::{DeclId, Layer};
use super::super::layer::SymbolLookup;
use super::super::scope::ScopeKind;
use super::super::types::{Substitution, Type};
use super::UnitBuilder;

/// Class operators and class constructors cannot be named in expressions.
fn is_callable(heading: &RoutineHeading) -> bool {
    !(heading.kind == RoutineKind::Operator
        || (heading.is_class && heading.kind == RoutineKind::Constructor))
}

fn variable(subkind: VariableKind, ty: Type) -> DeclKind {
    DeclKind::Variable(VariableDecl {
        subkind,
        ty,
        is_union: false,
        is_absolute: false,
    })
}

impl UnitBuilder<'_> {
    pub(super) fn uses(&mut self, section: &Section) {
        let Some(uses) = &section.uses else {
            return;
        };
        let in_implementation = self.section == Layer::Implementation;
        for item in &uses.items {
            let name = item.name.text();
            let target = self
                .ctx
                .registry
                .resolve_unit_name(&name, self.ctx.config)
                .filter(|target| *target != self.ctx.unit);
            if target.is_none() {
                debug!(unit = %self.ctx.unit, import = %name, "imported unit is not part of the project");
            }
            let scope = self.current();
            let declaration = self.new_declaration(
                &name,
                item.name.range,
                scope,
                DeclKind::Import(ImportDecl {
                    target,
                    in_implementation,
                }),
            );
            let id = self.layer.declare(declaration);
            self.locations.record_declaration(item.name.range, id);
            self.layer.scope_mut(scope).add_import(id);
        }
    }

    pub(super) fn declarations(&mut self, sections: &[DeclSection]) {
        for section in sections {
            match section {
                DeclSection::Types { types } => self.type_section(types),
                DeclSection::Consts { consts } => {
                    for constant in consts {
                        self.constant(constant);
                    }
                }
                DeclSection::Vars { vars } => {
                    for var in vars {
                        self.variable(var);
                    }
                }
                DeclSection::Labels { labels } => {
                    for label in labels {
                        self.declare(label, DeclKind::Label);
                    }
                }
                DeclSection::Routine { heading } => {
                    self.routine_heading(heading);
                }
                DeclSection::RoutineImpl { routine } => self.routine_implementation(routine),
            }
        }
    }

    pub(super) fn constant(&mut self, constant: &ConstDeclaration) {
        let declared = constant.ty.as_ref().map(|ty| self.type_of(ty));
        let value = self.expr(&constant.value, declared.as_ref());
        let ty = declared.unwrap_or_else(|| value.base().clone());
        self.declare(&constant.name, variable(VariableKind::Const, ty));
    }

    fn variable(&mut self, var: &VarDeclaration) {
        let ty = self.type_of(&var.ty);
        if let Some(absolute) = &var.absolute {
            self.expr(absolute, None);
        }
        if let Some(value) = &var.value {
            self.expr(value, Some(&ty));
        }
        for name in &var.names {
            self.declare(
                name,
                DeclKind::Variable(VariableDecl {
                    subkind: VariableKind::Var,
                    ty: ty.clone(),
                    is_union: false,
                    is_absolute: var.absolute.is_some(),
                }),
            );
        }
    }

    /// Declares a routine from its heading. The parameters live in a
    /// declaration scope of their own.
    pub(super) fn routine_heading(&mut self, heading: &RoutineHeading) -> DeclId {
        let segment = heading.name.last();
        let id = self.declare(
            &segment.ident,
            DeclKind::Routine(RoutineDecl {
                routine_kind: heading.kind,
                params: Vec::new(),
                return_type: None,
                directives: heading.directives.clone(),
                is_class: heading.is_class,
                is_callable: is_callable(heading),
                type_params: Vec::new(),
                signature_scope: None,
                intrinsic: None,
            }),
        );
        if heading.has_directive(Directive::Forward) {
            self.layer.declaration_mut(id).is_forward = true;
        }

        let scope = self.push_scope(ScopeKind::Declaration, heading.range, Some(id));
        let type_params = self.type_parameters(&segment.type_params);
        let params = self.parameters(&heading.params);
        let return_type = heading.return_type.as_ref().map(|ty| self.type_of(ty));
        self.pop_scope();

        if let Some(routine) = self.routine_mut(id) {
            routine.params = params;
            routine.return_type = return_type;
            routine.type_params = type_params;
            routine.signature_scope = Some(scope);
        }
        id
    }

    pub(super) fn type_parameters(&mut self, params: &[TypeParameter]) -> Vec<DeclId> {
        let ids = self.declare_type_parameters(params);
        self.constrain(params, &ids);
        ids
    }

    pub(super) fn declare_type_parameters(&mut self, params: &[TypeParameter]) -> Vec<DeclId> {
        params
            .iter()
            .enumerate()
            .map(|(index, param)| {
                self.declare(
                    &param.name,
                    DeclKind::TypeParameter(TypeParameterDecl {
                        index,
                        constraint_kinds: Vec::new(),
                        constraints: Vec::new(),
                    }),
                )
            })
            .collect()
    }

    /// Resolves constraints once every parameter of the list is declared.
    pub(super) fn constrain(&mut self, params: &[TypeParameter], ids: &[DeclId]) {
        for (param, id) in params.iter().zip(ids) {
            let mut kinds = Vec::new();
            let mut types = Vec::new();
            for constraint in &param.constraints {
                match constraint {
                    Constraint::Class => kinds.push(ConstraintKind::Class),
                    Constraint::Record => kinds.push(ConstraintKind::Record),
                    Constraint::Constructor => kinds.push(ConstraintKind::Constructor),
                    Constraint::Type { ty } => types.push(self.type_of(ty)),
                }
            }
            if !self.layer.owns_declaration(*id) {
                continue;
            }
            if let DeclKind::TypeParameter(type_param) = &mut self.layer.declaration_mut(*id).kind {
                type_param.constraint_kinds = kinds;
                type_param.constraints = types;
            }
        }
    }

    pub(super) fn parameters(&mut self, groups: &[ParamGroup]) -> Vec<Parameter> {
        let mut params = Vec::new();
        for group in groups {
            let ty = match &group.ty {
                Some(ty) => self.type_of(ty),
                None => Type::Untyped,
            };
            if let Some(default) = &group.default {
                self.expr(default, Some(&ty));
            }
            for name in &group.names {
                self.declare(name, variable(VariableKind::Parameter(group.kind), ty.clone()));
                params.push(Parameter {
                    name: name.name.clone(),
                    kind: group.kind,
                    ty: ty.clone(),
                    has_default: group.default.is_some(),
                });
            }
        }
        params
    }

    /// Binds an implementation to the heading it completes, or declares it
    /// when no heading matches, then walks the body.
    pub(super) fn routine_implementation(&mut self, routine: &RoutineImplementation) {
        let heading = &routine.heading;
        let segment = heading.name.last();
        let owners = heading.name.owners();
        let owner = if owners.is_empty() {
            None
        } else {
            self.resolve(|r| r.owner_chain(owners))
        };
        let candidates = self.implementation_candidates(owner, heading);
        let parent = self.current();

        let scope = self.push_scope(ScopeKind::Method, routine.range, candidates.first().copied());
        self.overlay_owner_type_parameters(owner, owners);
        let first_type_params = candidates
            .first()
            .map(|c| self.type_parameters_of(*c))
            .unwrap_or_default();
        let type_params = self.overlay_type_parameters(&first_type_params, &segment.type_params);
        let params = self.parameters(&heading.params);
        let return_type = heading.return_type.as_ref().map(|ty| self.type_of(ty));

        let matched = self.match_implementation(&candidates, &type_params, &params, return_type.as_ref(), heading);
        let decl = match matched {
            Some(id) => {
                if self.layer.owns_declaration(id) {
                    self.layer.declaration_mut(id).is_forward = false;
                }
                if heading.params.is_empty() && heading.return_type.is_none() {
                    self.redeclare_parameters(id);
                }
                id
            }
            None => {
                let routine_decl = RoutineDecl {
                    routine_kind: heading.kind,
                    params,
                    return_type,
                    directives: heading.directives.clone(),
                    is_class: heading.is_class,
                    is_callable: is_callable(heading),
                    type_params,
                    signature_scope: Some(scope),
                    intrinsic: None,
                };
                let mut declaration = self.new_declaration(
                    &segment.ident.name,
                    segment.ident.range,
                    parent,
                    DeclKind::Routine(routine_decl),
                );
                if owner.is_some() {
                    // a method body without a declaration in its type
                    declaration.owner = owner;
                    self.layer.alloc_declaration(declaration)
                } else {
                    self.layer.declare(declaration)
                }
            }
        };
        self.locations.record_declaration(segment.ident.range, decl);
        self.layer.scope_mut(scope).owner = Some(decl);

        self.implicit_bindings(decl, heading);
        self.routines.push(decl);
        self.declarations(&routine.declarations);
        self.statements(&routine.body.statements);
        self.routines.pop();
        self.pop_scope();
    }

    /// Routines an implementation may complete: members of the owner type,
    /// or headings of the enclosing scope (and the interface, at unit level).
    fn implementation_candidates(&self, owner: Option<DeclId>, heading: &RoutineHeading) -> Vec<DeclId> {
        let segment = heading.name.last();
        let name = &segment.ident.name;
        let view = self.view();
        let mut found: Vec<DeclId> = match owner {
            Some(owner) => view
                .declaration(owner)
                .as_type()
                .and_then(|t| t.body)
                .map(|body| view.scope(body).lookup(name).to_vec())
                .unwrap_or_default(),
            None => {
                let current = view.scope(self.current());
                let mut found = current.lookup(name).to_vec();
                if current.kind == ScopeKind::Unit {
                    if let Some(root) = self.interface.and_then(|i| i.root()) {
                        found.extend_from_slice(view.scope(root).lookup(name));
                    }
                }
                found
            }
        };
        found.retain(|c| {
            let decl = view.declaration(*c);
            decl.as_routine().is_some_and(|r| r.intrinsic.is_none())
                && decl.type_parameter_count() == segment.type_params.len()
        });
        found
    }

    fn type_parameters_of(&self, decl: DeclId) -> Vec<DeclId> {
        self.view()
            .declaration(decl)
            .generifiable()
            .map(|g| g.type_parameters().to_vec())
            .unwrap_or_default()
    }

    /// Owner segments of `TOuter<T>.TInner<U>.Method` repeat the type
    /// parameters of their types; bind them to those declarations.
    fn overlay_owner_type_parameters(&mut self, owner: Option<DeclId>, segments: &[NameSegment]) {
        let mut chain = Vec::new();
        let mut current = owner;
        while let Some(decl) = current {
            chain.push(decl);
            current = self.view().declaration(decl).owner;
        }
        chain.reverse();
        let offset = segments.len().saturating_sub(chain.len());
        for (position, segment) in segments.iter().enumerate() {
            let existing = position
                .checked_sub(offset)
                .and_then(|i| chain.get(i))
                .map(|decl| self.type_parameters_of(*decl))
                .unwrap_or_default();
            self.overlay_type_parameters(&existing, &segment.type_params);
        }
    }

    /// Registers `existing` under the names written at this site, declaring
    /// fresh parameters where there is nothing to bind to.
    fn overlay_type_parameters(&mut self, existing: &[DeclId], params: &[TypeParameter]) -> Vec<DeclId> {
        if existing.len() != params.len() {
            return self.type_parameters(params);
        }
        let scope = self.current();
        for (param, id) in params.iter().zip(existing) {
            self.layer.scope_mut(scope).add_declaration(&param.name.name, *id);
            self.locations.record_declaration(param.name.range, *id);
        }
        self.constrain(params, existing);
        existing.to_vec()
    }

    fn match_implementation(
        &self,
        candidates: &[DeclId],
        type_params: &[DeclId],
        params: &[Parameter],
        return_type: Option<&Type>,
        heading: &RoutineHeading,
    ) -> Option<DeclId> {
        let view = self.view();
        let exact = candidates.iter().copied().find(|c| {
            let declaration = view.declaration(*c);
            let Some(routine) = declaration.as_routine() else {
                return false;
            };
            let mut substitution = Substitution::new();
            for (from, to) in routine.type_params.iter().zip(type_params) {
                substitution.bind(*from, Type::Parameter(*to));
            }
            routine.params.len() == params.len()
                && routine.params.iter().zip(params).all(|(declared, written)| {
                    declared.kind == written.kind
                        && declared.ty.substitute(&substitution) == written.ty
                })
                && (return_type.is_none()
                    || routine.return_type.as_ref().map(|r| r.substitute(&substitution)).as_ref()
                        == return_type)
        });
        if exact.is_some() {
            return exact;
        }
        // the parameter list may be omitted when completing a heading
        let omitted = heading.params.is_empty() && heading.return_type.is_none();
        match candidates {
            [only] if omitted => Some(*only),
            _ => None,
        }
    }

    /// Parameters of a heading completed by an implementation that omits
    /// them, made visible in the body.
    fn redeclare_parameters(&mut self, routine: DeclId) {
        let params = self
            .view()
            .declaration(routine)
            .as_routine()
            .map(|r| r.params.clone())
            .unwrap_or_default();
        for param in params {
            self.declare_implicit(&param.name, variable(VariableKind::Parameter(param.kind), param.ty));
        }
    }

    /// `Self` for methods and `Result` for functions.
    fn implicit_bindings(&mut self, routine: DeclId, heading: &RoutineHeading) {
        let (self_type, result) = {
            let view = self.view();
            let declaration = view.declaration(routine);
            let Some(routine) = declaration.as_routine() else {
                return;
            };
            let result = match routine.routine_kind {
                RoutineKind::Function | RoutineKind::Operator => routine.return_type.clone(),
                _ => None,
            };
            let is_static = routine.is_class && routine.has_directive(Directive::Static);
            let self_type = declaration
                .owner
                .filter(|_| !is_static)
                .and_then(|owner| view.declaration(owner).as_type())
                .map(|owner| {
                    let ty = owner.helper_for.clone().unwrap_or_else(|| owner.ty.clone());
                    if routine.is_class {
                        Type::ClassReference(Box::new(ty))
                    } else {
                        ty
                    }
                });
            (self_type, result)
        };

        let shadowed = heading
            .params
            .iter()
            .flat_map(|g| &g.names)
            .any(|n| n.name.eq_ignore_ascii_case("Self"));
        if let Some(ty) = self_type.filter(|_| !shadowed) {
            self.declare_implicit("Self", variable(VariableKind::SelfRef, ty));
        }
        if let Some(ty) = result {
            self.declare_implicit("Result", variable(VariableKind::Result, ty));
        }
    }
}
