//! Position-keyed indexes.
//!
//! [`LocationIndex`] is persisted per unit and maps source positions to the
//! scopes, declarations and occurrences created there. [`SemanticIndex`] is
//! the side table installed for one freshly parsed tree by re-association.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::syntax::location::{Position, TextRange};

use super::ids::{DeclId, OccurrenceId, ScopeId, UnitId};
use super::scope::ScopeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationKey {
    pub line: u32,
    pub column: u32,
}

impl From<Position> for LocationKey {
    fn from(pos: Position) -> Self {
        Self {
            line: pos.line,
            column: pos.column,
        }
    }
}

#[derive(Debug, Default)]
pub struct LocationIndex {
    scopes: HashMap<(LocationKey, ScopeKind), ScopeId>,
    declarations: HashMap<LocationKey, DeclId>,
    occurrences: HashMap<LocationKey, OccurrenceId>,
}

impl LocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scope(&mut self, range: TextRange, kind: ScopeKind, scope: ScopeId) {
        self.scopes.insert((range.start.into(), kind), scope);
    }

    pub fn record_declaration(&mut self, range: TextRange, decl: DeclId) {
        self.declarations.insert(range.start.into(), decl);
    }

    pub fn record_occurrence(&mut self, range: TextRange, occurrence: OccurrenceId) {
        self.occurrences.insert(range.start.into(), occurrence);
    }

    pub fn scope_at(&self, pos: Position, kind: ScopeKind) -> Option<ScopeId> {
        self.scopes.get(&(pos.into(), kind)).copied()
    }

    pub fn declaration_at(&self, pos: Position) -> Option<DeclId> {
        self.declarations.get(&pos.into()).copied()
    }

    pub fn occurrence_at(&self, pos: Position) -> Option<OccurrenceId> {
        self.occurrences.get(&pos.into()).copied()
    }

    pub fn merge(&mut self, other: LocationIndex) {
        self.scopes.extend(other.scopes);
        self.declarations.extend(other.declarations);
        self.occurrences.extend(other.occurrences);
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
}

/// Resolved information for the nodes of one syntax tree.
#[derive(Debug)]
pub struct SemanticIndex {
    pub path: PathBuf,
    pub unit: UnitId,
    scopes: HashMap<TextRange, ScopeId>,
    declarations: HashMap<TextRange, DeclId>,
    occurrences: HashMap<TextRange, OccurrenceId>,
}

impl SemanticIndex {
    pub fn new(path: PathBuf, unit: UnitId) -> Self {
        Self {
            path,
            unit,
            scopes: HashMap::new(),
            declarations: HashMap::new(),
            occurrences: HashMap::new(),
        }
    }

    pub fn insert_scope(&mut self, range: TextRange, scope: ScopeId) {
        self.scopes.insert(range, scope);
    }

    pub fn insert_declaration(&mut self, range: TextRange, decl: DeclId) {
        self.declarations.insert(range, decl);
    }

    pub fn insert_occurrence(&mut self, range: TextRange, occurrence: OccurrenceId) {
        self.occurrences.insert(range, occurrence);
    }

    pub fn scope_at(&self, range: TextRange) -> Option<ScopeId> {
        self.scopes.get(&range).copied()
    }

    pub fn declaration_at(&self, range: TextRange) -> Option<DeclId> {
        self.declarations.get(&range).copied()
    }

    pub fn occurrence_at(&self, range: TextRange) -> Option<OccurrenceId> {
        self.occurrences.get(&range).copied()
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

    /// Occurrences ordered by source position.
    pub fn occurrences(&self) -> Vec<(TextRange, OccurrenceId)> {
        let mut entries: Vec<_> = self.occurrences.iter().map(|(r, o)| (*r, *o)).collect();
        entries.sort_by_key(|(range, _)| *range);
        entries
    }

    /// Declarations ordered by source position.
    pub fn declarations(&self) -> Vec<(TextRange, DeclId)> {
        let mut entries: Vec<_> = self.declarations.iter().map(|(r, d)| (*r, *d)).collect();
        entries.sort_by_key(|(range, _)| *range);
        entries
    }
}
