//! Semantic model: scopes, declarations, name occurrences and the
//! whole-program symbol table built from them.

pub(crate) mod builder;
pub mod conversion;
pub mod declaration;
pub mod dependency;
pub mod ids;
pub mod index;
pub mod layer;
pub mod occurrence;
pub mod reassociate;
pub mod registry;
pub(crate) mod resolver;
pub mod scope;
pub mod specialize;
pub mod system;
pub mod table;
pub mod types;

pub use declaration::{DeclKind, Declaration};
pub use dependency::UnitDependencySet;
pub use ids::{DeclId, Layer, OccurrenceId, ScopeId, UnitId};
pub use index::{LocationIndex, SemanticIndex};
pub use layer::{SymbolLayer, SymbolLookup};
pub use occurrence::NameOccurrence;
pub use scope::{Scope, ScopeKind};
pub use table::{SymbolTable, UnitSymbols};
pub use types::Type;
