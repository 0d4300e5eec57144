//! Type sections: structured, enumerated and procedural types.

use crate::syntax::ast::{
    EnumElement, Expr, FieldDeclaration, Literal, Member, ProceduralType,
    PropertyDeclaration, StructKind, StructType, TypeDeclaration, TypeExpr, UnaryOp, Visibility,
};
use crate::syntax::location::TextRange;

use super::super::declaration::{
    DeclKind, EnumElementDecl, Parameter, PropertyDecl, TypeDecl, VariableDecl, VariableKind,
};
use super::super::dependency::descends_from;
use super::super::ids::{DeclId, ScopeId};
use super::super::layer::SymbolLookup;
use super::super::resolver::static_array;
use super::super::scope::ScopeKind;
use super::super::types::{ParamType, ProceduralSignature, Type};
use super::UnitBuilder;

/// A type declared by the first step of a type section.
struct DeclaredType {
    id: DeclId,
    /// Holds the type parameters of a generic declaration.
    generic_scope: Option<ScopeId>,
    type_params: Vec<DeclId>,
}

fn empty_type() -> DeclKind {
    DeclKind::Type(TypeDecl {
        ty: Type::Unknown,
        type_params: Vec::new(),
        body: None,
        ancestors: Vec::new(),
        helper_for: None,
    })
}

/// Ordinal written as an integer literal, possibly negated.
fn literal_ordinal(expr: &Expr) -> Option<i64> {
    match expr.unparen() {
        Expr::Literal {
            value: Literal::Integer(value),
            ..
        } => Some(*value),
        Expr::Unary {
            op: UnaryOp::Minus,
            operand,
            ..
        } => literal_ordinal(operand).map(|v| -v),
        _ => None,
    }
}

impl UnitBuilder<'_> {
    /// Declares every name of the section before completing any, so types
    /// of one section may refer to each other.
    pub(super) fn type_section(&mut self, types: &[TypeDeclaration]) {
        let declared: Vec<DeclaredType> = types.iter().map(|t| self.declare_type(t)).collect();
        for (t, declared) in types.iter().zip(declared) {
            self.complete_type(t, declared);
        }
    }

    fn type_decl_mut(&mut self, id: DeclId) -> Option<&mut TypeDecl> {
        match &mut self.layer.declaration_mut(id).kind {
            DeclKind::Type(type_decl) => Some(type_decl),
            _ => None,
        }
    }

    /// A forward declaration in the current scope that `name` completes.
    fn forward_declaration(&self, name: &str, type_params: usize, kind: StructKind) -> Option<DeclId> {
        let scope = self.current();
        self.layer
            .scope(scope)
            .lookup(name)
            .iter()
            .copied()
            .filter(|id| self.layer.owns_declaration(*id))
            .find(|id| {
                let declaration = self.layer.declaration(*id);
                declaration.is_forward
                    && declaration.type_parameter_count() == type_params
                    && declaration
                        .as_type()
                        .is_some_and(|t| t.ty.struct_kind() == Some(kind))
            })
    }

    fn declare_type(&mut self, t: &TypeDeclaration) -> DeclaredType {
        let completes = match &t.ty {
            TypeExpr::Struct(s) if !s.forward => {
                self.forward_declaration(&t.name.name, t.type_params.len(), s.kind)
            }
            _ => None,
        };
        let id = match completes {
            Some(id) => {
                self.layer.declaration_mut(id).is_forward = false;
                self.locations.record_declaration(t.name.range, id);
                id
            }
            None => self.declare(&t.name, empty_type()),
        };
        if matches!(&t.ty, TypeExpr::Struct(s) if s.forward) {
            self.layer.declaration_mut(id).is_forward = true;
        }

        let (generic_scope, type_params) = if t.type_params.is_empty() {
            (None, Vec::new())
        } else {
            let scope = self.push_scope(ScopeKind::Declaration, t.range, Some(id));
            let params = self.declare_type_parameters(&t.type_params);
            self.pop_scope();
            (Some(scope), params)
        };

        let ty = match &t.ty {
            TypeExpr::Struct(s) => Type::Struct {
                decl: id,
                kind: s.kind,
                args: type_params.iter().map(|p| Type::Parameter(*p)).collect(),
            },
            TypeExpr::Enum { .. } => Type::Enum(id),
            _ => Type::Unknown,
        };
        if let Some(type_decl) = self.type_decl_mut(id) {
            type_decl.ty = ty;
            type_decl.type_params = type_params.clone();
        }
        DeclaredType {
            id,
            generic_scope,
            type_params,
        }
    }

    fn complete_type(&mut self, t: &TypeDeclaration, declared: DeclaredType) {
        let id = declared.id;
        if let Some(scope) = declared.generic_scope {
            self.enter_scope(scope);
            self.constrain(&t.type_params, &declared.type_params);
        }
        match &t.ty {
            TypeExpr::Struct(s) if s.forward => {}
            TypeExpr::Struct(s) => self.structure(id, s),
            TypeExpr::Enum { elements, range } => self.enumeration(id, elements, *range),
            TypeExpr::StrongAlias { target, .. } => {
                let target = self.type_of(target);
                if let Some(type_decl) = self.type_decl_mut(id) {
                    type_decl.ty = Type::Alias {
                        decl: id,
                        target: Box::new(target),
                    };
                }
            }
            other => {
                let ty = self.type_of(other);
                if let Some(type_decl) = self.type_decl_mut(id) {
                    type_decl.ty = ty;
                }
            }
        }
        if declared.generic_scope.is_some() {
            self.pop_scope();
        }

        let helped = self
            .layer
            .declaration(id)
            .as_type()
            .and_then(|t| t.helper_for.as_ref())
            .and_then(Type::helper_key);
        if let Some(key) = helped {
            let scope = self.current();
            self.layer.scope_mut(scope).register_helper(key, id);
        }
    }

    /// Fills in a class, record, interface or helper body.
    fn structure(&mut self, id: DeclId, s: &StructType) {
        let ancestors: Vec<Type> = s.ancestors.iter().map(|a| self.type_of(a)).collect();
        let helper_for = s.helper_for.as_ref().map(|h| self.type_of(h));
        let body = self.push_scope(ScopeKind::Type, s.range, Some(id));
        if let Some(type_decl) = self.type_decl_mut(id) {
            type_decl.ancestors = ancestors;
            type_decl.helper_for = helper_for;
            type_decl.body = Some(body);
        }

        let published = s.kind == StructKind::Class
            && self
                .ctx
                .config
                .component_base_parts()
                .is_some_and(|(unit, name)| descends_from(id, unit, name, &self.view()));
        let implicit = if published {
            Visibility::Published
        } else {
            Visibility::Public
        };

        let saved = self.visibility;
        for section in &s.sections {
            self.visibility = section.visibility.unwrap_or(implicit);
            for member in &section.members {
                match member {
                    Member::Field { field } => self.field(field, false),
                    Member::Method { heading } => {
                        self.routine_heading(heading);
                    }
                    Member::Property { property } => self.property(id, property),
                    Member::Types { types } => self.type_section(types),
                    Member::Consts { consts } => {
                        for constant in consts {
                            self.constant(constant);
                        }
                    }
                }
            }
        }
        if let Some(variant) = &s.variant {
            self.visibility = implicit;
            let tag_type = self.type_of(&variant.tag_type);
            if let Some(tag) = &variant.tag {
                self.declare(
                    tag,
                    DeclKind::Variable(VariableDecl {
                        subkind: VariableKind::Field,
                        ty: tag_type.clone(),
                        is_union: false,
                        is_absolute: false,
                    }),
                );
            }
            for arm in &variant.arms {
                for label in &arm.labels {
                    self.expr(label, Some(&tag_type));
                }
                for field in &arm.fields {
                    self.field(field, true);
                }
            }
        }
        self.visibility = saved;
        self.pop_scope();
    }

    fn field(&mut self, field: &FieldDeclaration, is_union: bool) {
        let ty = self.type_of(&field.ty);
        let subkind = if field.is_class {
            VariableKind::ClassVar
        } else {
            VariableKind::Field
        };
        for name in &field.names {
            self.declare(
                name,
                DeclKind::Variable(VariableDecl {
                    subkind,
                    ty: ty.clone(),
                    is_union,
                    is_absolute: false,
                }),
            );
        }
    }

    fn property(&mut self, owner: DeclId, property: &PropertyDeclaration) {
        let id = self.declare(
            &property.name,
            DeclKind::Property(PropertyDecl {
                ty: Type::Unknown,
                params: Vec::new(),
                read: None,
                write: None,
                is_default: property.is_default,
                is_class: property.is_class,
                redeclares: None,
                signature_scope: None,
            }),
        );

        let (signature_scope, mut params) = if property.params.is_empty() {
            (None, Vec::new())
        } else {
            let scope = self.push_scope(ScopeKind::Declaration, property.range, Some(id));
            let params = self.parameters(&property.params);
            self.pop_scope();
            (Some(scope), params)
        };

        let (ty, redeclares) = match &property.ty {
            Some(ty) => (self.type_of(ty), None),
            None => {
                let name = &property.name.name;
                let inherited = self.resolve(|r| r.inherited_property(owner, name));
                let view = self.view();
                match inherited.and_then(|d| view.declaration(d).as_property().map(|p| (d, p))) {
                    Some((d, inherited)) => {
                        if params.is_empty() {
                            params = inherited.params.clone();
                        }
                        (inherited.ty.clone(), Some(d))
                    }
                    None => (Type::Unknown, None),
                }
            }
        };

        if let Some(index) = &property.index {
            self.expr(index, None);
        }
        if let Some(default) = &property.default_value {
            self.expr(default, Some(&ty));
        }
        let owner_type = self
            .layer
            .declaration(owner)
            .as_type()
            .map(|t| t.ty.clone())
            .unwrap_or_default();
        let read = property
            .read
            .as_ref()
            .and_then(|name| self.resolve(|r| r.accessor(&owner_type, name)));
        let write = property
            .write
            .as_ref()
            .and_then(|name| self.resolve(|r| r.accessor(&owner_type, name)));

        if let DeclKind::Property(decl) = &mut self.layer.declaration_mut(id).kind {
            decl.ty = ty;
            decl.params = params;
            decl.read = read;
            decl.write = write;
            decl.redeclares = redeclares;
            decl.signature_scope = signature_scope;
        }
    }

    /// Declares the elements of an enumerated type in its own scope and
    /// makes them visible in the enclosing one.
    fn enumeration(&mut self, id: DeclId, elements: &[EnumElement], range: TextRange) {
        let enclosing = self.current();
        let ty = Type::Enum(id);
        let scope = self.push_scope(ScopeKind::Type, range, Some(id));
        if let Some(type_decl) = self.type_decl_mut(id) {
            type_decl.ty = ty.clone();
            type_decl.body = Some(scope);
        }
        let mut ordinal = 0;
        for element in elements {
            if let Some(value) = &element.value {
                self.expr(value, Some(&ty));
                if let Some(explicit) = literal_ordinal(value) {
                    ordinal = explicit;
                }
            }
            let element_id = self.declare(
                &element.name,
                DeclKind::EnumElement(EnumElementDecl {
                    ty: ty.clone(),
                    ordinal,
                }),
            );
            self.layer
                .scope_mut(enclosing)
                .add_declaration(&element.name.name, element_id);
            ordinal += 1;
        }
        self.pop_scope();
    }

    /// An unnamed type declaration for an inline enumeration or structure.
    fn anonymous_type(&mut self, range: TextRange) -> DeclId {
        let scope = self.current();
        let declaration = self.new_declaration("", range, scope, empty_type());
        self.layer.declare(declaration)
    }

    pub(super) fn type_of(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Named { .. } | TypeExpr::Subrange { .. } | TypeExpr::ArrayOfConst { .. } => {
                self.resolve(|r| r.type_expr(ty))
            }
            TypeExpr::Pointer { target, .. } => Type::pointer_to(self.type_of(target)),
            TypeExpr::Array {
                indices, element, ..
            } => {
                for index in indices {
                    self.type_of(index);
                }
                let element = self.type_of(element);
                static_array(element, indices.len())
            }
            TypeExpr::Set { element, .. } => Type::Set(Box::new(self.type_of(element))),
            TypeExpr::File { element, .. } => {
                if let Some(element) = element {
                    self.type_of(element);
                }
                Type::File
            }
            TypeExpr::ClassOf { target, .. } => Type::ClassReference(Box::new(self.type_of(target))),
            TypeExpr::StrongAlias { target, .. } => self.type_of(target),
            TypeExpr::Enum { elements, range } => {
                let id = self.anonymous_type(*range);
                self.enumeration(id, elements, *range);
                Type::Enum(id)
            }
            TypeExpr::Struct(s) => {
                let id = self.anonymous_type(s.range);
                let ty = Type::Struct {
                    decl: id,
                    kind: s.kind,
                    args: Vec::new(),
                };
                if let Some(type_decl) = self.type_decl_mut(id) {
                    type_decl.ty = ty.clone();
                }
                self.structure(id, s);
                ty
            }
            TypeExpr::Procedural(procedural) => self.procedural(procedural),
        }
    }

    /// Parameters of a procedural type get a declaration scope of their own.
    fn procedural(&mut self, procedural: &ProceduralType) -> Type {
        let params = if procedural.params.is_empty() {
            Vec::new()
        } else {
            self.push_scope(ScopeKind::Declaration, procedural.range, None);
            let params = self.parameters(&procedural.params);
            self.pop_scope();
            params
        };
        let result = procedural.return_type.as_ref().map(|ty| self.type_of(ty));
        signature_type(&params, result, procedural.of_object, procedural.reference)
    }
}

pub(super) fn signature_type(
    params: &[Parameter],
    result: Option<Type>,
    of_object: bool,
    reference: bool,
) -> Type {
    Type::Procedural(Box::new(ProceduralSignature {
        params: params
            .iter()
            .map(|p| ParamType {
                kind: p.kind,
                ty: p.ty.clone(),
                has_default: p.has_default,
            })
            .collect(),
        result,
        of_object,
        reference,
    }))
}
