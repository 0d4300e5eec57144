//! Candidate collection.
//!
//! A search walks lexical scopes from the current one outwards, then the
//! imports of the current unit (implementation imports before interface
//! imports, each clause last-to-first), then System. Member searches walk a
//! type's helper, its own body and its ancestors. In both cases the first
//! hit ends the search unless every candidate found so far is an overloaded
//! routine.

use crate::semantic::declaration::{DeclKind, Declaration};
use crate::semantic::ids::{DeclId, ScopeId, UnitId};
use crate::semantic::scope::ScopeKind;
use crate::semantic::types::{HelperKey, Type};

use super::Resolver;

/// Accumulates hits from successive scopes.
#[derive(Debug, Default)]
pub(super) struct Candidates {
    pub found: Vec<DeclId>,
    done: bool,
}

impl Candidates {
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn absorb(&mut self, resolver: &Resolver<'_>, hits: &[DeclId]) {
        if self.done || hits.is_empty() {
            return;
        }
        let declaration = |id: DeclId| resolver.lookup.declaration(id);
        if self.found.is_empty() {
            self.found.extend_from_slice(hits);
        } else {
            for hit in hits {
                if declaration(*hit).is_routine() && !self.found.contains(hit) {
                    self.found.push(*hit);
                }
            }
        }
        let keep_going = hits.iter().all(|h| declaration(*h).is_overload())
            && self.found.iter().all(|f| declaration(*f).is_overload());
        self.done = !keep_going;
    }
}

impl Resolver<'_> {
    pub(super) fn search_scope(&self, name: &str) -> Vec<DeclId> {
        self.search_from(self.scope, name)
    }

    pub(super) fn search_from(&self, start: ScopeId, name: &str) -> Vec<DeclId> {
        let key = name.to_lowercase();
        let mut candidates = Candidates::default();
        let mut unit_scopes = Vec::new();

        for id in self.lookup.scope_chain(start) {
            let scope = self.lookup.scope(id);
            match scope.kind {
                ScopeKind::With => {
                    if let Some(ty) = &scope.with_type {
                        let hits = self.members_of(ty, &key);
                        candidates.absorb(self, &hits);
                    }
                }
                ScopeKind::Type => {
                    match scope.owner.map(|owner| self.declared_type(owner)) {
                        Some(Some(ty)) => {
                            let hits = self.members_of(&ty, &key);
                            candidates.absorb(self, &hits);
                        }
                        _ => candidates.absorb(self, scope.lookup_lowercase(&key)),
                    }
                }
                ScopeKind::Method => {
                    candidates.absorb(self, scope.lookup_lowercase(&key));
                    if let Some(ty) = scope.owner.and_then(|r| self.method_owner_type(r)) {
                        let hits = self.members_of(&ty, &key);
                        candidates.absorb(self, &hits);
                    }
                }
                ScopeKind::Unit | ScopeKind::Global => {
                    candidates.absorb(self, scope.lookup_lowercase(&key));
                    unit_scopes.push(id);
                }
                ScopeKind::Declaration | ScopeKind::Local => {
                    candidates.absorb(self, scope.lookup_lowercase(&key));
                }
            }
            if candidates.is_done() {
                return candidates.found;
            }
        }

        for unit_scope in unit_scopes {
            for import in self.lookup.scope(unit_scope).imports().iter().rev() {
                if let Some(root) = self.import_root(*import) {
                    candidates.absorb(self, self.lookup.scope(root).lookup_lowercase(&key));
                    if candidates.is_done() {
                        return candidates.found;
                    }
                }
            }
        }

        if let Some(system) = self.lookup.system_unit().filter(|s| *s != self.unit) {
            if let Some(root) = self.lookup.unit_scope(system) {
                candidates.absorb(self, self.lookup.scope(root).lookup_lowercase(&key));
            }
        }
        candidates.found
    }

    /// Declarations of `unit` visible by qualification (`Unit.Name`).
    pub(super) fn search_unit(&self, unit: UnitId, name: &str) -> Vec<DeclId> {
        let key = name.to_lowercase();
        let mut candidates = Candidates::default();
        if unit == self.unit {
            for id in self.lookup.scope_chain(self.scope) {
                let scope = self.lookup.scope(id);
                if matches!(scope.kind, ScopeKind::Unit | ScopeKind::Global) {
                    candidates.absorb(self, scope.lookup_lowercase(&key));
                }
            }
        } else if let Some(root) = self.lookup.unit_scope(unit) {
            candidates.absorb(self, self.lookup.scope(root).lookup_lowercase(&key));
        }
        candidates.found
    }

    /// Members of `ty` named `key` (lower-cased), including helper members
    /// and inherited ones.
    pub(super) fn members_of(&self, ty: &Type, key: &str) -> Vec<DeclId> {
        let mut candidates = Candidates::default();
        let mut visited = Vec::new();
        self.collect_members(ty, key, true, &mut candidates, &mut visited);
        candidates.found
    }

    /// Members reachable through the ancestors of `owner` only, as seen by
    /// `inherited`. A helper searches the type it extends.
    pub(super) fn inherited_members(&self, owner: DeclId, key: &str) -> (Vec<DeclId>, Option<Type>) {
        let declaration = self.lookup.declaration(owner);
        let Some(type_decl) = declaration.as_type() else {
            return (Vec::new(), None);
        };
        let mut candidates = Candidates::default();
        let mut visited = vec![owner];
        if let Some(extended) = &type_decl.helper_for {
            self.collect_members(extended, key, false, &mut candidates, &mut visited);
            return (candidates.found, Some(extended.clone()));
        }
        let ancestors = self.lookup.ancestors_of(owner);
        for ancestor in &ancestors {
            self.collect_members(ancestor, key, false, &mut candidates, &mut visited);
            if candidates.is_done() {
                break;
            }
        }
        let search_type = ancestors.into_iter().find(|a| a.is_class() || a.is_record());
        (candidates.found, search_type)
    }

    fn collect_members(
        &self,
        ty: &Type,
        key: &str,
        use_helpers: bool,
        candidates: &mut Candidates,
        visited: &mut Vec<DeclId>,
    ) {
        if candidates.is_done() {
            return;
        }
        match ty {
            Type::ClassReference(inner) | Type::Alias { target: inner, .. } => {
                return self.collect_members(inner, key, use_helpers, candidates, visited);
            }
            Type::Pointer(Some(inner)) if inner.struct_decl().is_some() => {
                return self.collect_members(inner, key, use_helpers, candidates, visited);
            }
            Type::Parameter(param) => {
                return self.collect_constraint_members(*param, key, candidates, visited);
            }
            _ => {}
        }

        if use_helpers {
            if let Some(helper) = self.find_helper(ty) {
                if let Some(body) = self.body_of(helper) {
                    candidates.absorb(self, self.lookup.scope(body).lookup_lowercase(key));
                    if candidates.is_done() {
                        return;
                    }
                }
            }
        }

        let decl = match ty.base() {
            Type::Struct { decl, .. } | Type::Enum(decl) => *decl,
            _ => return,
        };
        if visited.contains(&decl) {
            return;
        }
        visited.push(decl);

        let Some(type_decl) = self.lookup.declaration(decl).as_type() else {
            return;
        };
        if let Some(body) = type_decl.body {
            candidates.absorb(self, self.lookup.scope(body).lookup_lowercase(key));
        }
        if let Some(extended) = &type_decl.helper_for {
            self.collect_members(extended, key, false, candidates, visited);
        }
        for ancestor in self.lookup.ancestors_of(decl) {
            if candidates.is_done() {
                return;
            }
            self.collect_members(&ancestor, key, use_helpers, candidates, visited);
        }
    }

    /// Constraints are searched in declaration order; the first one that
    /// yields anything wins and later constraints are not consulted.
    fn collect_constraint_members(
        &self,
        param: DeclId,
        key: &str,
        candidates: &mut Candidates,
        visited: &mut Vec<DeclId>,
    ) {
        let DeclKind::TypeParameter(type_param) = &self.lookup.declaration(param).kind else {
            return;
        };
        let mut constraints = type_param.constraints.clone();
        if constraints.is_empty() && !type_param.constraint_kinds.is_empty() {
            if let Some(root) = self.lookup.system_type("TObject") {
                constraints.extend(self.declared_type(root));
            }
        }
        for constraint in &constraints {
            let mut local = Candidates::default();
            self.collect_members(constraint, key, true, &mut local, visited);
            if !local.found.is_empty() {
                candidates.absorb(self, &local.found);
                return;
            }
        }
    }

    /// Nearest helper for `ty` or, failing that, for one of its ancestors.
    pub(super) fn find_helper(&self, ty: &Type) -> Option<DeclId> {
        let mut keys: Vec<HelperKey> = ty.helper_key().into_iter().collect();
        if let Some(decl) = ty.struct_decl() {
            let mut pending = self.lookup.ancestors_of(decl);
            let mut seen = vec![decl];
            while let Some(ancestor) = pending.pop() {
                let Some(next) = ancestor.struct_decl() else {
                    continue;
                };
                if seen.contains(&next) {
                    continue;
                }
                seen.push(next);
                keys.push(HelperKey::Declared(next));
                pending.splice(0..0, self.lookup.ancestors_of(next));
            }
        }
        keys.into_iter().find_map(|key| self.helper_in_view(key))
    }

    fn helper_in_view(&self, key: HelperKey) -> Option<DeclId> {
        let chain = self.lookup.scope_chain(self.scope);
        if let Some(helper) = chain.iter().find_map(|s| self.lookup.scope(*s).helper_for(key)) {
            return Some(helper);
        }
        for id in &chain {
            let scope = self.lookup.scope(*id);
            if !matches!(scope.kind, ScopeKind::Unit | ScopeKind::Global) {
                continue;
            }
            for import in scope.imports().iter().rev() {
                let helper = self
                    .import_root(*import)
                    .and_then(|root| self.lookup.scope(root).helper_for(key));
                if helper.is_some() {
                    return helper;
                }
            }
        }
        let system = self.lookup.system_unit().filter(|s| *s != self.unit)?;
        let root = self.lookup.unit_scope(system)?;
        self.lookup.scope(root).helper_for(key)
    }

    fn import_root(&self, import: DeclId) -> Option<ScopeId> {
        match &self.lookup.declaration(import).kind {
            DeclKind::Import(import) => self.lookup.unit_scope(import.target?),
            _ => None,
        }
    }

    pub(super) fn body_of(&self, decl: DeclId) -> Option<ScopeId> {
        self.lookup.declaration(decl).as_type()?.body
    }

    /// The type a type declaration introduces.
    pub(super) fn declared_type(&self, decl: DeclId) -> Option<Type> {
        self.lookup.declaration(decl).as_type().map(|t| t.ty.clone())
    }

    /// Type whose members a method body sees: the declaring type, or the
    /// extended type for helper methods.
    pub(super) fn method_owner_type(&self, routine: DeclId) -> Option<Type> {
        let owner = self.lookup.declaration(routine).owner?;
        self.declared_type(owner)
    }

    /// Type declaring the code at the current position, if any.
    pub(super) fn enclosing_type(&self) -> Option<DeclId> {
        self.lookup.scope_chain(self.scope).into_iter().find_map(|id| {
            let scope = self.lookup.scope(id);
            match scope.kind {
                ScopeKind::Type => scope.owner,
                ScopeKind::Method => scope
                    .owner
                    .and_then(|routine| self.lookup.declaration(routine).owner),
                _ => None,
            }
        })
    }

    pub(super) fn declaration(&self, id: DeclId) -> &Declaration {
        self.lookup.declaration(id)
    }
}
