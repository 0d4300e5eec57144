//! Pre-order traversal over the syntax tree.
//!
//! Implementors override the hooks they care about; every hook defaults to
//! `ControlFlow::Continue(())`. Returning `Break` from any hook stops the
//! whole walk.

use std::ops::ControlFlow;

use super::ast::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Interface,
    Implementation,
}

pub trait AstVisitor {
    fn visit_source_unit(&mut self, _node: &SourceUnit) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_section(&mut self, _node: &Section, _kind: SectionKind) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_uses_item(&mut self, _node: &UsesItem) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_type_declaration(&mut self, _node: &TypeDeclaration) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_type_parameter(&mut self, _node: &TypeParameter) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_type_expr(&mut self, _node: &TypeExpr) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_enum_element(&mut self, _node: &EnumElement) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_const_declaration(&mut self, _node: &ConstDeclaration) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_var_declaration(&mut self, _node: &VarDeclaration) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_field_declaration(&mut self, _node: &FieldDeclaration) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_variant_part(&mut self, _node: &VariantPart) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_label_declaration(&mut self, _node: &Ident) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Headings that declare a routine: interface, forward and method headings.
    fn visit_routine_heading(&mut self, _node: &RoutineHeading) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_routine_implementation(&mut self, _node: &RoutineImplementation) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_param_group(&mut self, _node: &ParamGroup) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_property(&mut self, _node: &PropertyDeclaration) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_statement(&mut self, _node: &Statement) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_exception_handler(&mut self, _node: &ExceptionHandler) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Label identifiers used by `goto` and labelled statements.
    fn visit_label_reference(&mut self, _node: &Ident) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_expr(&mut self, _node: &Expr) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit_anonymous_method(&mut self, _node: &AnonymousMethod) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    /// Every identifier in a reference position.
    fn visit_name_ref(&mut self, _node: &NameRef) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}

pub fn walk_tree<V: AstVisitor + ?Sized>(visitor: &mut V, tree: &SyntaxTree) -> ControlFlow<()> {
    walk_source_unit(visitor, &tree.unit)
}

pub fn walk_source_unit<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &SourceUnit,
) -> ControlFlow<()> {
    visitor.visit_source_unit(node)?;
    if let Some(section) = &node.interface {
        walk_section(visitor, section, SectionKind::Interface)?;
    }
    if let Some(section) = &node.implementation {
        walk_section(visitor, section, SectionKind::Implementation)?;
    }
    for block in [&node.initialization, &node.finalization, &node.main]
        .into_iter()
        .flatten()
    {
        walk_block(visitor, block)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_section<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &Section,
    kind: SectionKind,
) -> ControlFlow<()> {
    visitor.visit_section(node, kind)?;
    if let Some(uses) = &node.uses {
        for item in &uses.items {
            visitor.visit_uses_item(item)?;
        }
    }
    walk_decl_sections(visitor, &node.declarations)
}

pub fn walk_decl_sections<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    sections: &[DeclSection],
) -> ControlFlow<()> {
    for section in sections {
        match section {
            DeclSection::Types { types } => {
                for ty in types {
                    walk_type_declaration(visitor, ty)?;
                }
            }
            DeclSection::Consts { consts } => {
                for c in consts {
                    walk_const_declaration(visitor, c)?;
                }
            }
            DeclSection::Vars { vars } => {
                for v in vars {
                    walk_var_declaration(visitor, v)?;
                }
            }
            DeclSection::Labels { labels } => {
                for label in labels {
                    visitor.visit_label_declaration(label)?;
                }
            }
            DeclSection::Routine { heading } => walk_routine_heading(visitor, heading)?,
            DeclSection::RoutineImpl { routine } => walk_routine_implementation(visitor, routine)?,
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_type_declaration<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &TypeDeclaration,
) -> ControlFlow<()> {
    visitor.visit_type_declaration(node)?;
    for param in &node.type_params {
        walk_type_parameter(visitor, param)?;
    }
    walk_type_expr(visitor, &node.ty)
}

pub fn walk_type_parameter<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &TypeParameter,
) -> ControlFlow<()> {
    visitor.visit_type_parameter(node)?;
    for constraint in &node.constraints {
        if let Constraint::Type { ty } = constraint {
            walk_type_expr(visitor, ty)?;
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_qualified_ref<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &QualifiedRef,
) -> ControlFlow<()> {
    for segment in &node.segments {
        walk_name_ref(visitor, segment)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_name_ref<V: AstVisitor + ?Sized>(visitor: &mut V, node: &NameRef) -> ControlFlow<()> {
    visitor.visit_name_ref(node)?;
    for arg in &node.type_args {
        walk_type_expr(visitor, arg)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_type_expr<V: AstVisitor + ?Sized>(visitor: &mut V, node: &TypeExpr) -> ControlFlow<()> {
    visitor.visit_type_expr(node)?;
    match node {
        TypeExpr::Named { name } => walk_qualified_ref(visitor, name)?,
        TypeExpr::Pointer { target, .. }
        | TypeExpr::ClassOf { target, .. }
        | TypeExpr::StrongAlias { target, .. } => walk_type_expr(visitor, target)?,
        TypeExpr::Array {
            indices, element, ..
        } => {
            for index in indices {
                walk_type_expr(visitor, index)?;
            }
            walk_type_expr(visitor, element)?;
        }
        TypeExpr::ArrayOfConst { .. } => {}
        TypeExpr::Set { element, .. } => walk_type_expr(visitor, element)?,
        TypeExpr::File { element, .. } => {
            if let Some(element) = element {
                walk_type_expr(visitor, element)?;
            }
        }
        TypeExpr::Subrange { low, high, .. } => {
            walk_expr(visitor, low)?;
            walk_expr(visitor, high)?;
        }
        TypeExpr::Enum { elements, .. } => {
            for element in elements {
                visitor.visit_enum_element(element)?;
                if let Some(value) = &element.value {
                    walk_expr(visitor, value)?;
                }
            }
        }
        TypeExpr::Procedural(procedural) => {
            for group in &procedural.params {
                walk_param_group(visitor, group)?;
            }
            if let Some(ret) = &procedural.return_type {
                walk_type_expr(visitor, ret)?;
            }
        }
        TypeExpr::Struct(structure) => walk_struct(visitor, structure)?,
    }
    ControlFlow::Continue(())
}

fn walk_struct<V: AstVisitor + ?Sized>(visitor: &mut V, node: &StructType) -> ControlFlow<()> {
    for ancestor in &node.ancestors {
        walk_type_expr(visitor, ancestor)?;
    }
    if let Some(extended) = &node.helper_for {
        walk_type_expr(visitor, extended)?;
    }
    for section in &node.sections {
        for member in &section.members {
            match member {
                Member::Field { field } => walk_field_declaration(visitor, field)?,
                Member::Method { heading } => walk_routine_heading(visitor, heading)?,
                Member::Property { property } => walk_property(visitor, property)?,
                Member::Types { types } => {
                    for ty in types {
                        walk_type_declaration(visitor, ty)?;
                    }
                }
                Member::Consts { consts } => {
                    for c in consts {
                        walk_const_declaration(visitor, c)?;
                    }
                }
            }
        }
    }
    if let Some(variant) = &node.variant {
        visitor.visit_variant_part(variant)?;
        walk_type_expr(visitor, &variant.tag_type)?;
        for arm in &variant.arms {
            for label in &arm.labels {
                walk_expr(visitor, label)?;
            }
            for field in &arm.fields {
                walk_field_declaration(visitor, field)?;
            }
        }
    }
    ControlFlow::Continue(())
}

pub fn walk_field_declaration<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &FieldDeclaration,
) -> ControlFlow<()> {
    visitor.visit_field_declaration(node)?;
    walk_type_expr(visitor, &node.ty)
}

pub fn walk_const_declaration<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &ConstDeclaration,
) -> ControlFlow<()> {
    visitor.visit_const_declaration(node)?;
    if let Some(ty) = &node.ty {
        walk_type_expr(visitor, ty)?;
    }
    walk_expr(visitor, &node.value)
}

pub fn walk_var_declaration<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &VarDeclaration,
) -> ControlFlow<()> {
    visitor.visit_var_declaration(node)?;
    walk_type_expr(visitor, &node.ty)?;
    if let Some(absolute) = &node.absolute {
        walk_expr(visitor, absolute)?;
    }
    if let Some(value) = &node.value {
        walk_expr(visitor, value)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_routine_heading<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &RoutineHeading,
) -> ControlFlow<()> {
    visitor.visit_routine_heading(node)?;
    walk_signature(visitor, node)
}

fn walk_signature<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &RoutineHeading,
) -> ControlFlow<()> {
    for segment in &node.name.segments {
        for param in &segment.type_params {
            walk_type_parameter(visitor, param)?;
        }
    }
    for group in &node.params {
        walk_param_group(visitor, group)?;
    }
    if let Some(ret) = &node.return_type {
        walk_type_expr(visitor, ret)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_routine_implementation<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &RoutineImplementation,
) -> ControlFlow<()> {
    visitor.visit_routine_implementation(node)?;
    walk_signature(visitor, &node.heading)?;
    walk_decl_sections(visitor, &node.declarations)?;
    walk_block(visitor, &node.body)
}

pub fn walk_param_group<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &ParamGroup,
) -> ControlFlow<()> {
    visitor.visit_param_group(node)?;
    if let Some(ty) = &node.ty {
        walk_type_expr(visitor, ty)?;
    }
    if let Some(default) = &node.default {
        walk_expr(visitor, default)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_property<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &PropertyDeclaration,
) -> ControlFlow<()> {
    visitor.visit_property(node)?;
    for group in &node.params {
        walk_param_group(visitor, group)?;
    }
    if let Some(ty) = &node.ty {
        walk_type_expr(visitor, ty)?;
    }
    if let Some(index) = &node.index {
        walk_expr(visitor, index)?;
    }
    for accessor in [&node.read, &node.write].into_iter().flatten() {
        walk_qualified_ref(visitor, accessor)?;
    }
    if let Some(default) = &node.default_value {
        walk_expr(visitor, default)?;
    }
    ControlFlow::Continue(())
}

pub fn walk_block<V: AstVisitor + ?Sized>(visitor: &mut V, node: &Block) -> ControlFlow<()> {
    walk_statements(visitor, &node.statements)
}

fn walk_statements<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    statements: &[Statement],
) -> ControlFlow<()> {
    for statement in statements {
        walk_statement(visitor, statement)?;
    }
    ControlFlow::Continue(())
}

fn walk_optional<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    statement: &Option<Box<Statement>>,
) -> ControlFlow<()> {
    match statement {
        Some(statement) => walk_statement(visitor, statement),
        None => ControlFlow::Continue(()),
    }
}

pub fn walk_statement<V: AstVisitor + ?Sized>(
    visitor: &mut V,
    node: &Statement,
) -> ControlFlow<()> {
    visitor.visit_statement(node)?;
    match node {
        Statement::Compound { statements, .. } => walk_statements(visitor, statements)?,
        Statement::Assignment { target, value, .. } => {
            walk_expr(visitor, target)?;
            walk_expr(visitor, value)?;
        }
        Statement::Expression { expr, .. } => walk_expr(visitor, expr)?,
        Statement::If {
            condition,
            then_branch,
            else_branch,
            ..
        } => {
            walk_expr(visitor, condition)?;
            walk_optional(visitor, then_branch)?;
            walk_optional(visitor, else_branch)?;
        }
        Statement::Case {
            selector,
            arms,
            else_branch,
            ..
        } => {
            walk_expr(visitor, selector)?;
            for arm in arms {
                for label in &arm.labels {
                    walk_expr(visitor, label)?;
                }
                walk_statement(visitor, &arm.body)?;
            }
            walk_statements(visitor, else_branch)?;
        }
        Statement::For {
            variable,
            iteration,
            body,
            ..
        } => {
            match variable {
                LoopVariable::Existing { name } => walk_name_ref(visitor, name)?,
                LoopVariable::Inline { ty, .. } => {
                    if let Some(ty) = ty {
                        walk_type_expr(visitor, ty)?;
                    }
                }
            }
            match iteration {
                ForIteration::Range { start, end, .. } => {
                    walk_expr(visitor, start)?;
                    walk_expr(visitor, end)?;
                }
                ForIteration::In { collection } => walk_expr(visitor, collection)?,
            }
            walk_optional(visitor, body)?;
        }
        Statement::While {
            condition, body, ..
        } => {
            walk_expr(visitor, condition)?;
            walk_optional(visitor, body)?;
        }
        Statement::Repeat {
            statements,
            condition,
            ..
        } => {
            walk_statements(visitor, statements)?;
            walk_expr(visitor, condition)?;
        }
        Statement::With { targets, body, .. } => {
            for target in targets {
                walk_expr(visitor, target)?;
            }
            walk_optional(visitor, body)?;
        }
        Statement::Try {
            statements,
            handler,
            ..
        } => {
            walk_statements(visitor, statements)?;
            match handler {
                TryHandler::Except {
                    handlers,
                    statements,
                    else_branch,
                } => {
                    for handler in handlers {
                        visitor.visit_exception_handler(handler)?;
                        walk_qualified_ref(visitor, &handler.ty)?;
                        walk_optional(visitor, &handler.body)?;
                    }
                    walk_statements(visitor, statements)?;
                    walk_statements(visitor, else_branch)?;
                }
                TryHandler::Finally { statements } => walk_statements(visitor, statements)?,
            }
        }
        Statement::Raise { exception, at, .. } => {
            for expr in [exception, at].into_iter().flatten() {
                walk_expr(visitor, expr)?;
            }
        }
        Statement::Goto { label, .. } => visitor.visit_label_reference(label)?,
        Statement::Labeled {
            label, statement, ..
        } => {
            visitor.visit_label_reference(label)?;
            walk_statement(visitor, statement)?;
        }
        Statement::InlineVar { ty, value, .. } => {
            if let Some(ty) = ty {
                walk_type_expr(visitor, ty)?;
            }
            if let Some(value) = value {
                walk_expr(visitor, value)?;
            }
        }
        Statement::Empty { .. } => {}
    }
    ControlFlow::Continue(())
}

pub fn walk_expr<V: AstVisitor + ?Sized>(visitor: &mut V, node: &Expr) -> ControlFlow<()> {
    visitor.visit_expr(node)?;
    match node {
        Expr::Name { name } => walk_name_ref(visitor, name)?,
        Expr::Member { base, name, .. } => {
            walk_expr(visitor, base)?;
            walk_name_ref(visitor, name)?;
        }
        Expr::Call { callee, args, .. } => {
            walk_expr(visitor, callee)?;
            for arg in args {
                walk_expr(visitor, arg)?;
            }
        }
        Expr::Index { base, indices, .. } => {
            walk_expr(visitor, base)?;
            for index in indices {
                walk_expr(visitor, index)?;
            }
        }
        Expr::Deref { operand, .. }
        | Expr::AddressOf { operand, .. }
        | Expr::Unary { operand, .. } => walk_expr(visitor, operand)?,
        Expr::Inherited { name, args, .. } => {
            if let Some(name) = name {
                walk_name_ref(visitor, name)?;
            }
            for arg in args.iter().flatten() {
                walk_expr(visitor, arg)?;
            }
        }
        Expr::Literal { .. } | Expr::Nil { .. } => {}
        Expr::Binary { left, right, .. } => {
            walk_expr(visitor, left)?;
            walk_expr(visitor, right)?;
        }
        Expr::Set { elements, .. } => {
            for element in elements {
                walk_expr(visitor, &element.value)?;
                if let Some(upper) = &element.upper {
                    walk_expr(visitor, upper)?;
                }
            }
        }
        Expr::AnonymousMethod(method) => {
            visitor.visit_anonymous_method(method)?;
            for group in &method.params {
                walk_param_group(visitor, group)?;
            }
            if let Some(ret) = &method.return_type {
                walk_type_expr(visitor, ret)?;
            }
            walk_decl_sections(visitor, &method.declarations)?;
            walk_block(visitor, &method.body)?;
        }
        Expr::Paren { inner, .. } => walk_expr(visitor, inner)?,
    }
    ControlFlow::Continue(())
}
