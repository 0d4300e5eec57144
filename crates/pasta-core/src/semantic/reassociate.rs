//! Symbol re-association.
//!
//! Rebinds a freshly parsed tree to the persisted table of the unit it was
//! built from. The walk visits the same structural nodes the builder did and
//! looks each one up in the unit's [`LocationIndex`]; nothing is resolved
//! again. A node the index does not know means the tree and the table
//! diverged, which is not recoverable.

use std::ops::ControlFlow;

use tracing::debug;

use crate::error::ReassociateError;
use crate::syntax::ast::{
    AnonymousMethod, ConstDeclaration, EnumElement, ExceptionHandler, Expr, FieldDeclaration,
    Ident, LoopVariable, NameRef, ParamGroup, PropertyDeclaration, RoutineHeading,
    RoutineImplementation, Section, Statement, SyntaxTree, TypeDeclaration, TypeExpr,
    TypeParameter, UnitKind, UsesItem, VarDeclaration, VariantPart,
};
use crate::syntax::location::TextRange;
use crate::syntax::visit::{AstVisitor, SectionKind, walk_block, walk_section};

use super::index::{LocationIndex, SemanticIndex};
use super::scope::ScopeKind;
use super::table::SymbolTable;

impl SymbolTable {
    /// Installs a side table for `tree`, a fresh parse of a file this table
    /// was built from.
    ///
    /// # Panics
    ///
    /// If a structural node of the tree has no entry in the persisted table.
    pub fn reassociate(&self, tree: &SyntaxTree) -> Result<SemanticIndex, ReassociateError> {
        let Some(unit) = self.unit_by_path(&tree.path) else {
            return Err(ReassociateError::UnknownFile(tree.path.clone()));
        };
        let mut reassociation = Reassociation {
            locations: &unit.locations,
            index: SemanticIndex::new(tree.path.clone(), unit.id),
        };

        let source = &tree.unit;
        let root_kind = if self.system() == Some(unit.id) {
            ScopeKind::Global
        } else {
            ScopeKind::Unit
        };
        reassociation.scope(source.range, root_kind);
        reassociation.declaration(source.name.range);

        if source.kind == UnitKind::Unit {
            if let Some(section) = &source.interface {
                let _ = walk_section(&mut reassociation, section, SectionKind::Interface);
            }
        }
        if let Some(section) = &source.implementation {
            let _ = walk_section(&mut reassociation, section, SectionKind::Implementation);
        }
        for block in [&source.initialization, &source.finalization, &source.main]
            .into_iter()
            .flatten()
        {
            let _ = walk_block(&mut reassociation, block);
        }

        let index = reassociation.index;
        debug!(
            path = %tree.path.display(),
            scopes = index.scope_count(),
            declarations = index.declaration_count(),
            occurrences = index.occurrence_count(),
            "re-associated"
        );
        Ok(index)
    }
}

struct Reassociation<'a> {
    locations: &'a LocationIndex,
    index: SemanticIndex,
}

impl Reassociation<'_> {
    fn scope(&mut self, range: TextRange, kind: ScopeKind) {
        let Some(scope) = self.locations.scope_at(range.start, kind) else {
            panic!(
                "no {kind:?} scope at {} in {}",
                range.start,
                self.index.path.display()
            );
        };
        self.index.insert_scope(range, scope);
    }

    fn declaration(&mut self, range: TextRange) {
        let Some(decl) = self.locations.declaration_at(range.start) else {
            panic!(
                "no declaration at {} in {}",
                range.start,
                self.index.path.display()
            );
        };
        self.index.insert_declaration(range, decl);
    }

    fn declarations<'i>(&mut self, idents: impl IntoIterator<Item = &'i Ident>) {
        for ident in idents {
            self.declaration(ident.range);
        }
    }

    fn occurrence(&mut self, range: TextRange) {
        let Some(occurrence) = self.locations.occurrence_at(range.start) else {
            panic!(
                "no occurrence at {} in {}",
                range.start,
                self.index.path.display()
            );
        };
        self.index.insert_occurrence(range, occurrence);
    }
}

impl AstVisitor for Reassociation<'_> {
    fn visit_section(&mut self, node: &Section, kind: SectionKind) -> ControlFlow<()> {
        if kind == SectionKind::Implementation {
            self.scope(node.range, ScopeKind::Unit);
        }
        ControlFlow::Continue(())
    }

    fn visit_uses_item(&mut self, node: &UsesItem) -> ControlFlow<()> {
        self.declaration(node.name.range);
        ControlFlow::Continue(())
    }

    fn visit_type_declaration(&mut self, node: &TypeDeclaration) -> ControlFlow<()> {
        self.declaration(node.name.range);
        if !node.type_params.is_empty() {
            self.scope(node.range, ScopeKind::Declaration);
        }
        ControlFlow::Continue(())
    }

    fn visit_type_parameter(&mut self, node: &TypeParameter) -> ControlFlow<()> {
        self.declaration(node.name.range);
        ControlFlow::Continue(())
    }

    fn visit_type_expr(&mut self, node: &TypeExpr) -> ControlFlow<()> {
        match node {
            TypeExpr::Enum { range, .. } => self.scope(*range, ScopeKind::Type),
            TypeExpr::Struct(s) if !s.forward => self.scope(s.range, ScopeKind::Type),
            TypeExpr::Procedural(p) if !p.params.is_empty() => {
                self.scope(p.range, ScopeKind::Declaration);
            }
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn visit_enum_element(&mut self, node: &EnumElement) -> ControlFlow<()> {
        self.declaration(node.name.range);
        ControlFlow::Continue(())
    }

    fn visit_const_declaration(&mut self, node: &ConstDeclaration) -> ControlFlow<()> {
        self.declaration(node.name.range);
        ControlFlow::Continue(())
    }

    fn visit_var_declaration(&mut self, node: &VarDeclaration) -> ControlFlow<()> {
        self.declarations(&node.names);
        ControlFlow::Continue(())
    }

    fn visit_field_declaration(&mut self, node: &FieldDeclaration) -> ControlFlow<()> {
        self.declarations(&node.names);
        ControlFlow::Continue(())
    }

    fn visit_variant_part(&mut self, node: &VariantPart) -> ControlFlow<()> {
        self.declarations(&node.tag);
        ControlFlow::Continue(())
    }

    fn visit_label_declaration(&mut self, node: &Ident) -> ControlFlow<()> {
        self.declaration(node.range);
        ControlFlow::Continue(())
    }

    fn visit_routine_heading(&mut self, node: &RoutineHeading) -> ControlFlow<()> {
        self.declaration(node.name.last().ident.range);
        self.scope(node.range, ScopeKind::Declaration);
        ControlFlow::Continue(())
    }

    fn visit_routine_implementation(&mut self, node: &RoutineImplementation) -> ControlFlow<()> {
        self.scope(node.range, ScopeKind::Method);
        for owner in node.heading.name.owners() {
            self.occurrence(owner.ident.range);
        }
        self.declaration(node.heading.name.last().ident.range);
        ControlFlow::Continue(())
    }

    fn visit_param_group(&mut self, node: &ParamGroup) -> ControlFlow<()> {
        self.declarations(&node.names);
        ControlFlow::Continue(())
    }

    fn visit_property(&mut self, node: &PropertyDeclaration) -> ControlFlow<()> {
        self.declaration(node.name.range);
        if !node.params.is_empty() {
            self.scope(node.range, ScopeKind::Declaration);
        }
        ControlFlow::Continue(())
    }

    fn visit_statement(&mut self, node: &Statement) -> ControlFlow<()> {
        match node {
            Statement::Compound { range, .. } | Statement::Case { range, .. } => {
                self.scope(*range, ScopeKind::Local)
            }
            Statement::For {
                variable, range, ..
            } => {
                self.scope(*range, ScopeKind::Local);
                if let LoopVariable::Inline { name, .. } = variable {
                    self.declaration(name.range);
                }
            }
            Statement::With { targets, .. } => {
                for target in targets {
                    self.scope(target.range(), ScopeKind::With);
                }
            }
            Statement::InlineVar { names, .. } => self.declarations(names),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn visit_exception_handler(&mut self, node: &ExceptionHandler) -> ControlFlow<()> {
        self.scope(node.range, ScopeKind::Local);
        self.declarations(&node.variable);
        ControlFlow::Continue(())
    }

    fn visit_label_reference(&mut self, node: &Ident) -> ControlFlow<()> {
        self.occurrence(node.range);
        ControlFlow::Continue(())
    }

    fn visit_expr(&mut self, node: &Expr) -> ControlFlow<()> {
        if let Expr::Inherited {
            name: None, range, ..
        } = node
        {
            self.occurrence(*range);
        }
        ControlFlow::Continue(())
    }

    fn visit_anonymous_method(&mut self, node: &AnonymousMethod) -> ControlFlow<()> {
        self.scope(node.range, ScopeKind::Method);
        ControlFlow::Continue(())
    }

    fn visit_name_ref(&mut self, node: &NameRef) -> ControlFlow<()> {
        self.occurrence(node.ident.range);
        ControlFlow::Continue(())
    }
}
