//! Lexical scopes.
//!
//! Scopes form a parent-linked tree mirroring source nesting. Each scope maps
//! lower-cased names to the declarations registered under them, in
//! insertion order, keeping every overload. Lookup inside one scope never
//! walks to the parent; that is the resolver's job.

use std::collections::HashMap;

use id_arena::Arena;

use crate::syntax::location::TextRange;

use super::ids::{DeclId, Layer, ScopeId, UnitId};
use super::types::{HelperKey, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Root of the System unit.
    Global,
    Unit,
    Type,
    Method,
    /// Parameters of a routine heading, property or procedural type.
    Declaration,
    Local,
    With,
}

#[derive(Debug)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    /// Children allocated in the same layer.
    pub children: Vec<ScopeId>,
    pub range: TextRange,
    /// Type, routine or unit the scope belongs to.
    pub owner: Option<DeclId>,
    /// Type whose members a `with` scope exposes.
    pub with_type: Option<Type>,
    buckets: Vec<(String, Vec<DeclId>)>,
    index: HashMap<String, usize>,
    helpers: Vec<(HelperKey, DeclId)>,
    imports: Vec<DeclId>,
}

impl Scope {
    pub fn lookup(&self, name: &str) -> &[DeclId] {
        self.lookup_lowercase(&name.to_lowercase())
    }

    pub(crate) fn lookup_lowercase(&self, key: &str) -> &[DeclId] {
        match self.index.get(key) {
            Some(&slot) => &self.buckets[slot].1,
            None => &[],
        }
    }

    pub fn add_declaration(&mut self, name: &str, decl: DeclId) {
        let key = name.to_lowercase();
        match self.index.get(&key) {
            Some(&slot) => {
                let bucket = &mut self.buckets[slot].1;
                if !bucket.contains(&decl) {
                    bucket.push(decl);
                }
            }
            None => {
                self.index.insert(key.clone(), self.buckets.len());
                self.buckets.push((key, vec![decl]));
            }
        }
    }

    /// All declarations in insertion order of their names.
    pub fn declarations(&self) -> impl Iterator<Item = DeclId> + '_ {
        self.buckets.iter().flat_map(|(_, ids)| ids.iter().copied())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(name, _)| name.as_str())
    }

    pub fn register_helper(&mut self, key: HelperKey, helper: DeclId) {
        self.helpers.push((key, helper));
    }

    /// Most recently registered helper for `key`.
    pub fn helper_for(&self, key: HelperKey) -> Option<DeclId> {
        self.helpers
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, helper)| *helper)
    }

    pub fn add_import(&mut self, import: DeclId) {
        self.imports.push(import);
    }

    pub fn imports(&self) -> &[DeclId] {
        &self.imports
    }
}

pub struct ScopeTree {
    unit: UnitId,
    layer: Layer,
    arena: Arena<Scope>,
}

impl ScopeTree {
    pub fn new(unit: UnitId, layer: Layer) -> Self {
        Self {
            unit,
            layer,
            arena: Arena::new(),
        }
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        range: TextRange,
    ) -> ScopeId {
        let (unit, layer) = (self.unit, self.layer);
        let local = self.arena.alloc_with_id(|local| Scope {
            id: ScopeId { unit, layer, local },
            kind,
            parent,
            children: Vec::new(),
            range,
            owner: None,
            with_type: None,
            buckets: Vec::new(),
            index: HashMap::new(),
            helpers: Vec::new(),
            imports: Vec::new(),
        });
        let id = ScopeId { unit, layer, local };

        if let Some(parent_id) = parent {
            if self.owns(parent_id) {
                self.arena[parent_id.local].children.push(id);
            }
        }

        id
    }

    pub fn owns(&self, id: ScopeId) -> bool {
        id.unit == self.unit && id.layer == self.layer
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        debug_assert!(self.owns(id), "scope {id:?} belongs to another layer");
        &self.arena[id.local]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        debug_assert!(self.owns(id), "scope {id:?} belongs to another layer");
        &mut self.arena[id.local]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scope> {
        self.arena.iter().map(|(_, scope)| scope)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.len() == 0
    }
}
