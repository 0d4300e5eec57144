//! Per-unit storage layers and the lookup interface over them.

use std::collections::HashMap;

use id_arena::Arena;

use crate::syntax::ast::StructKind;

use super::declaration::{DeclKind, Declaration};
use super::ids::{DeclId, Layer, OccurrenceId, ScopeId, UnitId};
use super::occurrence::NameOccurrence;
use super::scope::{Scope, ScopeKind, ScopeTree};
use super::types::Type;

/// Scopes, declarations and occurrences created by one pass over one unit.
pub struct SymbolLayer {
    unit: UnitId,
    layer: Layer,
    root: Option<ScopeId>,
    scopes: ScopeTree,
    declarations: Arena<Declaration>,
    occurrences: Arena<NameOccurrence>,
    specializations: HashMap<(DeclId, Vec<Type>), DeclId>,
}

impl SymbolLayer {
    pub fn new(unit: UnitId, layer: Layer) -> Self {
        Self {
            unit,
            layer,
            root: None,
            scopes: ScopeTree::new(unit, layer),
            declarations: Arena::new(),
            occurrences: Arena::new(),
            specializations: HashMap::new(),
        }
    }

    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// First scope created in this layer.
    pub fn root(&self) -> Option<ScopeId> {
        self.root
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        range: crate::syntax::location::TextRange,
    ) -> ScopeId {
        let id = self.scopes.create_scope(kind, parent, range);
        if self.root.is_none() {
            self.root = Some(id);
        }
        id
    }

    pub fn owns_scope(&self, id: ScopeId) -> bool {
        self.scopes.owns(id)
    }

    pub fn owns_declaration(&self, id: DeclId) -> bool {
        id.unit == self.unit && id.layer == self.layer
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        self.scopes.get(id)
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        self.scopes.get_mut(id)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }

    pub fn next_declaration_id(&self) -> DeclId {
        DeclId {
            unit: self.unit,
            layer: self.layer,
            local: self.declarations.next_id(),
        }
    }

    /// Allocates without registering a name.
    pub fn alloc_declaration(&mut self, declaration: Declaration) -> DeclId {
        DeclId {
            unit: self.unit,
            layer: self.layer,
            local: self.declarations.alloc(declaration),
        }
    }

    /// Allocates and registers under the declaration's own name in its scope.
    /// The scope must belong to this layer.
    pub fn declare(&mut self, declaration: Declaration) -> DeclId {
        let scope = declaration.scope;
        let name = declaration.name.clone();
        let id = self.alloc_declaration(declaration);
        if !name.is_empty() {
            self.scopes.get_mut(scope).add_declaration(&name, id);
        }
        id
    }

    pub fn declaration(&self, id: DeclId) -> &Declaration {
        debug_assert!(self.owns_declaration(id));
        &self.declarations[id.local]
    }

    pub fn declaration_mut(&mut self, id: DeclId) -> &mut Declaration {
        debug_assert!(self.owns_declaration(id));
        &mut self.declarations[id.local]
    }

    pub fn declarations(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        let (unit, layer) = (self.unit, self.layer);
        self.declarations
            .iter()
            .map(move |(local, decl)| (DeclId { unit, layer, local }, decl))
    }

    pub fn add_occurrence(
        &mut self,
        build: impl FnOnce(OccurrenceId) -> NameOccurrence,
    ) -> OccurrenceId {
        let (unit, layer) = (self.unit, self.layer);
        let local = self
            .occurrences
            .alloc_with_id(|local| build(OccurrenceId { unit, layer, local }));
        OccurrenceId { unit, layer, local }
    }

    pub fn occurrence(&self, id: OccurrenceId) -> &NameOccurrence {
        &self.occurrences[id.local]
    }

    pub fn occurrence_mut(&mut self, id: OccurrenceId) -> &mut NameOccurrence {
        &mut self.occurrences[id.local]
    }

    pub fn occurrences(&self) -> impl Iterator<Item = &NameOccurrence> {
        self.occurrences.iter().map(|(_, occurrence)| occurrence)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    pub fn occurrence_count(&self) -> usize {
        self.occurrences.len()
    }

    pub fn cached_specialization(&self, origin: DeclId, args: &[Type]) -> Option<DeclId> {
        self.specializations.get(&(origin, args.to_vec())).copied()
    }

    pub fn cache_specialization(&mut self, origin: DeclId, args: Vec<Type>, specialized: DeclId) {
        self.specializations.insert((origin, args), specialized);
    }
}

impl std::fmt::Debug for SymbolLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolLayer")
            .field("unit", &self.unit)
            .field("layer", &self.layer)
            .field("scopes", &self.scope_count())
            .field("declarations", &self.declaration_count())
            .field("occurrences", &self.occurrence_count())
            .finish()
    }
}

/// Read access to every layer reachable from the current point of a build
/// or from the finished table.
pub trait SymbolLookup {
    fn layer(&self, unit: UnitId, layer: Layer) -> Option<&SymbolLayer>;

    fn system_unit(&self) -> Option<UnitId>;

    fn layer_of(&self, unit: UnitId, layer: Layer) -> &SymbolLayer {
        self.layer(unit, layer)
            .unwrap_or_else(|| panic!("no {layer:?} layer for {unit}"))
    }

    fn scope(&self, id: ScopeId) -> &Scope {
        self.layer_of(id.unit, id.layer).scope(id)
    }

    fn declaration(&self, id: DeclId) -> &Declaration {
        self.layer_of(id.unit, id.layer).declaration(id)
    }

    fn occurrence(&self, id: OccurrenceId) -> &NameOccurrence {
        self.layer_of(id.unit, id.layer).occurrence(id)
    }

    /// The scope itself followed by its ancestors, innermost first.
    fn scope_chain(&self, id: ScopeId) -> Vec<ScopeId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(scope) = current {
            chain.push(scope);
            current = self.scope(scope).parent;
        }
        chain
    }

    fn enclosing_scope_of_kind(&self, id: ScopeId, kind: ScopeKind) -> Option<ScopeId> {
        self.scope_chain(id)
            .into_iter()
            .find(|s| self.scope(*s).kind == kind)
    }

    /// Interface root scope of a unit.
    fn unit_scope(&self, unit: UnitId) -> Option<ScopeId> {
        self.layer(unit, Layer::Interface)?.root()
    }

    /// Type declared at the top level of the System unit.
    fn system_type(&self, name: &str) -> Option<DeclId> {
        let root = self.unit_scope(self.system_unit()?)?;
        self.scope(root)
            .lookup(name)
            .iter()
            .copied()
            .find(|d| matches!(self.declaration(*d).kind, DeclKind::Type(_)))
    }

    /// Declared ancestors plus the implicit `TObject`/`IInterface` root.
    fn ancestors_of(&self, decl: DeclId) -> Vec<Type> {
        let declaration = self.declaration(decl);
        let Some(type_decl) = declaration.as_type() else {
            return Vec::new();
        };
        let mut ancestors = type_decl.ancestors.clone();
        let kind = type_decl.ty.struct_kind();
        let has_class_ancestor = ancestors.iter().any(|a| a.is_class());
        let implicit = match kind {
            Some(StructKind::Class) if !has_class_ancestor => Some("TObject"),
            Some(StructKind::Interface) if ancestors.is_empty() => Some("IInterface"),
            _ => None,
        };
        if let Some(name) = implicit {
            if let Some(root) = self.system_type(name) {
                let is_self = root == decl
                    || (name == "IInterface"
                        && declaration.name.eq_ignore_ascii_case("IUnknown"));
                if !is_self {
                    let root_type = self
                        .declaration(root)
                        .as_type()
                        .map_or(Type::Unknown, |t| t.ty.clone());
                    ancestors.insert(0, root_type);
                }
            }
        }
        ancestors
    }
}
