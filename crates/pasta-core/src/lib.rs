//! Semantic analysis core for Object Pascal.
//!
//! Builds a whole-program [`SymbolTable`] from externally parsed syntax
//! trees, resolves every name reference to its declaration, and records the
//! unit dependencies that follow from what each unit actually uses.

pub mod config;
pub mod error;
pub mod project;
pub mod semantic;
pub mod syntax;

pub use config::{Config, ConfigError, ConfigResult};
pub use error::{ReassociateError, ResolveError, UnitError};
pub use project::{BuildOutcome, Project};
pub use semantic::{SemanticIndex, SymbolTable};
