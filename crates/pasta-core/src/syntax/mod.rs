//! Syntax tree contract consumed from the external parser.

pub mod ast;
pub mod loader;
pub mod location;
pub mod visit;

pub use ast::SyntaxTree;
pub use loader::{JsonTreeLoader, TreeLoader, UnitHeader};
pub use location::{Position, TextRange};
pub use visit::{AstVisitor, SectionKind};
