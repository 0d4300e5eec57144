//! Reference sites.

use super::declaration::Location;
use super::ids::{DeclId, OccurrenceId, ScopeId};
use super::types::Type;

/// A reference to a declaration. An occurrence whose declaration is `None`
/// could not be resolved; that is a normal outcome, not an error.
#[derive(Debug, Clone)]
pub struct NameOccurrence {
    pub id: OccurrenceId,
    pub name: String,
    pub location: Location,
    /// Scope the reference appears in.
    pub scope: ScopeId,
    pub declaration: Option<DeclId>,
    pub is_explicit_invocation: bool,
    pub type_arguments: Vec<Type>,
    /// Next segment of a dotted chain: `A` qualifies `B` in `A.B`.
    pub qualifies: Option<OccurrenceId>,
}

impl NameOccurrence {
    pub fn declaration(&self) -> Option<DeclId> {
        self.declaration
    }

    pub fn is_resolved(&self) -> bool {
        self.declaration.is_some()
    }

    pub fn qualifies(&self) -> Option<OccurrenceId> {
        self.qualifies
    }
}
