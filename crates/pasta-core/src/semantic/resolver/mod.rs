//! Name resolution and overload disambiguation.
//!
//! A [`Resolver`] is a short-lived, read-only view over the symbols visible
//! from one scope. Resolving an expression computes what the expression
//! denotes and queues one [`PendingOccurrence`] per identifier in reference
//! position; the builder commits the queue into its layer afterwards. Queued
//! occurrences are indexed so dotted chains can link each segment to the
//! next one.

mod filter;
mod overload;
mod search;

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::syntax::ast::{
    BinaryOp, Expr, Ident, Literal, NameRef, NameSegment, QualifiedRef, RoutineKind, TypeExpr,
    UnaryOp,
};
use crate::syntax::location::TextRange;

use super::declaration::{DeclKind, Intrinsic, Typed};
use super::ids::{DeclId, ScopeId, UnitId};
use super::layer::SymbolLookup;
use super::types::{CharKind, IntegerKind, ProceduralSignature, RealKind, StringKind, Substitution, Type};

pub(crate) use overload::Selected;

/// What an expression denotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprInfo {
    Value(Type),
    TypeReference(Type),
    UnitReference(UnitId),
    Unknown,
}

impl ExprInfo {
    pub fn ty(&self) -> Type {
        match self {
            ExprInfo::Value(ty) | ExprInfo::TypeReference(ty) => ty.clone(),
            ExprInfo::UnitReference(_) | ExprInfo::Unknown => Type::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub decl: DeclId,
    pub substitution: Substitution,
}

#[derive(Debug, Clone)]
pub(crate) struct PendingOccurrence {
    pub name: String,
    pub range: TextRange,
    pub binding: Option<Binding>,
    pub is_explicit_invocation: bool,
    pub type_arguments: Vec<Type>,
    /// Index of the next segment's occurrence in the same queue.
    pub qualifies: Option<usize>,
}

#[derive(Debug, Clone)]
struct Resolved {
    info: ExprInfo,
    /// Queue index of the occurrence for the expression's last name.
    tail: Option<usize>,
}

impl Resolved {
    fn value(ty: Type) -> Self {
        Self {
            info: ExprInfo::Value(ty),
            tail: None,
        }
    }
}

/// Where a name is looked up.
#[derive(Debug, Clone)]
enum SearchContext {
    Scope,
    Members(Type),
    Unit(UnitId),
    Unknown,
}

impl SearchContext {
    fn of(info: &ExprInfo) -> Self {
        match info {
            ExprInfo::Value(ty) | ExprInfo::TypeReference(ty) => SearchContext::Members(ty.clone()),
            ExprInfo::UnitReference(unit) => SearchContext::Unit(*unit),
            ExprInfo::Unknown => SearchContext::Unknown,
        }
    }

    fn search_type(&self) -> Option<&Type> {
        match self {
            SearchContext::Members(ty) => Some(ty),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Argument {
    pub ty: Type,
    pub deferred: Option<Deferred>,
}

/// A bare routine name passed as an argument. Whether it is a call or a
/// method reference depends on the callee chosen.
#[derive(Debug, Clone)]
pub(crate) struct Deferred {
    occurrence: usize,
    candidates: Vec<DeclId>,
    search_type: Option<Type>,
}

/// How a name is used at its reference site.
#[derive(Debug, Clone, Default)]
struct Shape {
    args: Option<Vec<Argument>>,
    expected: Option<ProceduralSignature>,
    explicit: bool,
    method_ref: bool,
}

impl Shape {
    fn bare(expected: Option<&Type>) -> Self {
        Self {
            expected: expected.and_then(Type::procedural).cloned(),
            ..Self::default()
        }
    }

    fn call(args: Vec<Argument>) -> Self {
        Self {
            args: Some(args),
            explicit: true,
            ..Self::default()
        }
    }

    fn method_ref(expected: Option<ProceduralSignature>) -> Self {
        Self {
            expected,
            method_ref: true,
            ..Self::default()
        }
    }
}

pub(crate) struct Resolver<'a> {
    lookup: &'a dyn SymbolLookup,
    unit: UnitId,
    scope: ScopeId,
    /// Innermost routine whose body is being resolved.
    routine: Option<DeclId>,
    anonymous: &'a HashMap<TextRange, Type>,
    pending: Vec<PendingOccurrence>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        lookup: &'a dyn SymbolLookup,
        unit: UnitId,
        scope: ScopeId,
        routine: Option<DeclId>,
        anonymous: &'a HashMap<TextRange, Type>,
    ) -> Self {
        Self {
            lookup,
            unit,
            scope,
            routine,
            anonymous,
            pending: Vec::new(),
        }
    }

    pub fn finish(self) -> Vec<PendingOccurrence> {
        self.pending
    }

    pub fn expression(&mut self, expr: &Expr, expected: Option<&Type>) -> ExprInfo {
        self.resolve(expr, expected).info
    }

    /// Resolves a possibly dotted type name.
    pub fn type_ref(&mut self, name: &QualifiedRef) -> Type {
        let segments: Vec<&NameRef> = name.segments.iter().collect();
        match self.chain(&segments, Shape::default()).info {
            ExprInfo::TypeReference(ty) => ty,
            _ => Type::Unknown,
        }
    }

    /// Type expressions that introduce no declarations of their own.
    pub fn type_expr(&mut self, ty: &TypeExpr) -> Type {
        match ty {
            TypeExpr::Named { name } => self.type_ref(name),
            TypeExpr::Pointer { target, .. } => Type::pointer_to(self.type_expr(target)),
            TypeExpr::Array {
                indices, element, ..
            } => {
                for index in indices {
                    self.type_expr(index);
                }
                let element = self.type_expr(element);
                array_of(element, indices.len())
            }
            TypeExpr::ArrayOfConst { .. } => Type::ArrayOfConst,
            TypeExpr::Set { element, .. } => Type::Set(Box::new(self.type_expr(element))),
            TypeExpr::File { element, .. } => {
                if let Some(element) = element {
                    self.type_expr(element);
                }
                Type::File
            }
            TypeExpr::Subrange { low, high, .. } => {
                let low = self.expression(low, None).ty();
                self.expression(high, None);
                Type::Subrange(Box::new(low.base().clone()))
            }
            TypeExpr::ClassOf { target, .. } => {
                Type::ClassReference(Box::new(self.type_expr(target)))
            }
            TypeExpr::StrongAlias { target, .. } => self.type_expr(target),
            TypeExpr::Enum { .. } | TypeExpr::Procedural(_) | TypeExpr::Struct(_) => Type::Unknown,
        }
    }

    /// Binds the owner segments of a routine implementation name
    /// (`TOuter.TInner<T>.Method`), returning the innermost owner type.
    pub fn owner_chain(&mut self, segments: &[NameSegment]) -> Option<DeclId> {
        let mut current: Option<DeclId> = None;
        let mut previous: Option<usize> = None;
        let mut failed = false;
        for segment in segments {
            let name = &segment.ident.name;
            let candidates = match (failed, current) {
                (true, _) => Vec::new(),
                (false, None) => self.search_scope(name),
                (false, Some(owner)) => self
                    .body_of(owner)
                    .map(|body| self.lookup.scope(body).lookup(name).to_vec())
                    .unwrap_or_default(),
            };
            let found = candidates.into_iter().find(|c| {
                let decl = self.declaration(*c);
                decl.as_type().is_some() && decl.type_parameter_count() == segment.type_params.len()
            });
            failed |= found.is_none();
            let index = self.push(name, segment.ident.range, found.map(plain), false, Vec::new());
            if let Some(previous) = previous {
                self.pending[previous].qualifies = Some(index);
            }
            previous = Some(index);
            current = found;
        }
        current
    }

    /// Binds a property accessor against the members of `owner`.
    pub fn accessor(&mut self, owner: &Type, name: &QualifiedRef) -> Option<DeclId> {
        let mut context = SearchContext::Members(owner.clone());
        let mut previous: Option<usize> = None;
        let mut last = None;
        for segment in &name.segments {
            let found = self.candidates_in(&context, segment.name()).first().copied();
            let index = self.push(segment.name(), segment.ident.range, found.map(plain), false, Vec::new());
            if let Some(previous) = previous {
                self.pending[previous].qualifies = Some(index);
            }
            previous = Some(index);
            context = match found {
                Some(decl) => SearchContext::Members(self.declaration(decl).ty()),
                None => SearchContext::Unknown,
            };
            last = found;
        }
        last
    }

    pub fn label(&mut self, label: &Ident) {
        let key = label.name.to_lowercase();
        let found = self.lookup.scope_chain(self.scope).into_iter().find_map(|id| {
            self.lookup
                .scope(id)
                .lookup_lowercase(&key)
                .iter()
                .copied()
                .find(|d| matches!(self.declaration(*d).kind, DeclKind::Label))
        });
        self.push(&label.name, label.range, found.map(plain), false, Vec::new());
    }

    /// Loop variable of a `for` statement over an existing variable.
    pub fn loop_variable(&mut self, name: &NameRef) -> Type {
        self.reference(SearchContext::Scope, name, Shape::default(), None)
            .info
            .ty()
    }

    /// Property of an ancestor that a type-less property redeclares.
    pub fn inherited_property(&self, owner: DeclId, name: &str) -> Option<DeclId> {
        let (candidates, _) = self.inherited_members(owner, &name.to_lowercase());
        candidates
            .into_iter()
            .find(|c| self.declaration(*c).as_property().is_some())
    }

    /// Element type seen by `for .. in` over a value of type `collection`.
    pub fn enumerated_element(&self, collection: &Type) -> Type {
        if let Some(element) = collection.element() {
            return element;
        }
        let Some(enumerator) = self
            .members_of(collection, "getenumerator")
            .into_iter()
            .find_map(|d| self.declaration(d).as_routine()?.return_type.clone())
        else {
            return Type::Unknown;
        };
        let substitution = Substitution::for_struct(collection, self.lookup);
        let enumerator = enumerator.substitute(&substitution);
        let current = self
            .members_of(&enumerator, "current")
            .first()
            .map(|d| self.declaration(*d).ty())
            .unwrap_or_default();
        current.substitute(&Substitution::for_struct(&enumerator, self.lookup))
    }

    fn push(
        &mut self,
        name: &str,
        range: TextRange,
        binding: Option<Binding>,
        is_explicit_invocation: bool,
        type_arguments: Vec<Type>,
    ) -> usize {
        self.pending.push(PendingOccurrence {
            name: name.to_string(),
            range,
            binding,
            is_explicit_invocation,
            type_arguments,
            qualifies: None,
        });
        self.pending.len() - 1
    }

    fn resolve(&mut self, expr: &Expr, expected: Option<&Type>) -> Resolved {
        match expr {
            Expr::Name { .. } | Expr::Member { .. } => self.reference_expr(expr, Shape::bare(expected)),
            Expr::Call { callee, args, .. } => self.call(callee, args),
            Expr::Index { base, indices, .. } => self.index(base, indices),
            Expr::Deref { operand, .. } => {
                let operand = self.resolve(operand, None);
                let target = match operand.info.ty().base() {
                    Type::Pointer(Some(target)) => (**target).clone(),
                    _ => Type::Unknown,
                };
                Resolved {
                    info: ExprInfo::Value(target),
                    tail: operand.tail,
                }
            }
            Expr::AddressOf { operand, .. } => self.address_of(operand, expected),
            Expr::Inherited { name, args, range } => {
                self.inherited(name.as_ref(), args.as_deref(), *range)
            }
            Expr::Literal { value, .. } => Resolved::value(literal_type(value)),
            Expr::Nil { .. } => Resolved::value(Type::Nil),
            Expr::Unary { op, operand, .. } => {
                let ty = self.resolve(operand, None).info.ty();
                let ty = match op {
                    UnaryOp::Not | UnaryOp::Minus | UnaryOp::Plus => ty.base().clone(),
                };
                Resolved::value(ty)
            }
            Expr::Binary {
                op, left, right, ..
            } => self.binary(*op, left, right),
            Expr::Set { elements, .. } => {
                let mut element = Type::Unknown;
                for item in elements {
                    let ty = self.resolve(&item.value, None).info.ty();
                    if let Some(upper) = &item.upper {
                        self.resolve(upper, None);
                    }
                    if element.is_unknown() {
                        element = ty.base().clone();
                    }
                }
                Resolved::value(Type::Set(Box::new(element)))
            }
            Expr::AnonymousMethod(method) => Resolved::value(
                self.anonymous
                    .get(&method.range)
                    .cloned()
                    .unwrap_or_default(),
            ),
            Expr::Paren { inner, .. } => self.resolve(inner, expected),
        }
    }

    /// Names and member accesses, used as values, calls or method references.
    fn reference_expr(&mut self, expr: &Expr, shape: Shape) -> Resolved {
        match expr.unparen() {
            Expr::Name { name } => self.reference(SearchContext::Scope, name, shape, None),
            Expr::Member { base, name, .. } => {
                if let Some(names) = dotted_names(expr) {
                    if let Some((length, decl)) = self.namespace_prefix(&names) {
                        return self.namespaced(&names, length, decl, shape);
                    }
                }
                let base = self.resolve(base, None);
                let context = SearchContext::of(&base.info);
                self.reference(context, name, shape, base.tail)
            }
            other => {
                let resolved = self.resolve(other, None);
                if let Some(args) = &shape.args {
                    self.settle(args, None);
                }
                resolved
            }
        }
    }

    fn reference(
        &mut self,
        context: SearchContext,
        name: &NameRef,
        shape: Shape,
        qualifier: Option<usize>,
    ) -> Resolved {
        let type_args: Vec<Type> = name.type_args.iter().map(|t| self.type_expr(t)).collect();
        let candidates = self.candidates_in(&context, name.name());
        self.bind(
            &context,
            name.name(),
            name.ident.range,
            candidates,
            type_args,
            shape,
            qualifier,
        )
    }

    fn candidates_in(&self, context: &SearchContext, name: &str) -> Vec<DeclId> {
        match context {
            SearchContext::Scope => self.search_scope(name),
            SearchContext::Members(ty) => self.members_of(ty, &name.to_lowercase()),
            SearchContext::Unit(unit) => self.search_unit(*unit, name),
            SearchContext::Unknown => Vec::new(),
        }
    }

    /// Runs the selection pipeline and queues the occurrence.
    #[allow(clippy::too_many_arguments)]
    fn bind(
        &mut self,
        context: &SearchContext,
        name: &str,
        range: TextRange,
        candidates: Vec<DeclId>,
        type_args: Vec<Type>,
        mut shape: Shape,
        qualifier: Option<usize>,
    ) -> Resolved {
        let has_routine = candidates.iter().any(|c| self.declaration(*c).is_routine());
        if shape.args.is_none() && shape.expected.is_none() && !shape.method_ref && has_routine {
            shape.args = Some(Vec::new());
        }

        let search_type = context.search_type();
        let mut outcome = self.select(name, candidates.clone(), &shape, &type_args, search_type);
        if matches!(outcome, Ok(None)) && shape.expected.is_some() && has_routine {
            // a function returning a procedural value
            shape.expected = None;
            shape.args = Some(Vec::new());
            outcome = self.select(name, candidates, &shape, &type_args, search_type);
        }
        let selected = match outcome {
            Ok(selected) => selected,
            Err(error) => {
                debug!(name, location = %range, %error, "ambiguous reference left unresolved");
                None
            }
        };

        if let Some(args) = &shape.args {
            self.settle(args, selected.as_ref());
        }
        let info = match &selected {
            Some(selected) => self.info_for(selected, &shape, context),
            None => ExprInfo::Unknown,
        };
        trace!(name, location = %range, resolved = selected.is_some(), "reference");

        let binding = selected.map(|s| Binding {
            decl: s.decl,
            substitution: s.substitution,
        });
        let index = self.push(name, range, binding, shape.explicit, type_args);
        if let Some(qualifier) = qualifier {
            self.pending[qualifier].qualifies = Some(index);
        }
        Resolved {
            info,
            tail: Some(index),
        }
    }

    /// Binds deferred routine arguments once the callee is known.
    fn settle(&mut self, args: &[Argument], callee: Option<&Selected>) {
        for (position, argument) in args.iter().enumerate() {
            let Some(deferred) = &argument.deferred else {
                continue;
            };
            let parameter = callee.and_then(|c| self.parameter_type(c, position));
            let shape = match parameter.as_ref().and_then(Type::procedural) {
                Some(signature) => Shape::method_ref(Some(signature.clone())),
                None => Shape {
                    args: Some(Vec::new()),
                    ..Shape::default()
                },
            };
            let name = self.pending[deferred.occurrence].name.clone();
            let selected = match self.select(
                &name,
                deferred.candidates.clone(),
                &shape,
                &[],
                deferred.search_type.as_ref(),
            ) {
                Ok(selected) => selected,
                Err(error) => {
                    debug!(name, %error, "ambiguous routine argument left unresolved");
                    None
                }
            };
            self.pending[deferred.occurrence].binding = selected.map(|s| Binding {
                decl: s.decl,
                substitution: s.substitution,
            });
        }
    }

    fn info_for(
        &self,
        selected: &Selected,
        shape: &Shape,
        context: &SearchContext,
    ) -> ExprInfo {
        let substitution = &selected.substitution;
        let declaration = self.declaration(selected.decl);
        match &declaration.kind {
            DeclKind::Unit(unit) => ExprInfo::UnitReference(unit.unit),
            DeclKind::Import(import) => import
                .target
                .map_or(ExprInfo::Unknown, ExprInfo::UnitReference),
            DeclKind::Type(type_decl) => {
                let ty = type_decl.ty.substitute(substitution);
                if shape.args.as_ref().is_some_and(|a| a.len() == 1) {
                    ExprInfo::Value(ty)
                } else {
                    ExprInfo::TypeReference(ty)
                }
            }
            DeclKind::TypeParameter(_) => {
                let ty = Type::Parameter(selected.decl).substitute(substitution);
                if shape.args.as_ref().is_some_and(|a| a.len() == 1) {
                    ExprInfo::Value(ty)
                } else {
                    ExprInfo::TypeReference(ty)
                }
            }
            DeclKind::Routine(routine) => {
                if shape.method_ref || shape.expected.is_some() {
                    let of_object = declaration.owner.is_some();
                    return ExprInfo::Value(routine.procedural_type(of_object).substitute(substitution));
                }
                if let Some(intrinsic) = routine.intrinsic {
                    return ExprInfo::Value(intrinsic_result(intrinsic, shape.args.as_deref()));
                }
                if routine.routine_kind == RoutineKind::Constructor {
                    let constructed = match context.search_type().map(Type::base) {
                        Some(Type::ClassReference(inner)) => Some((**inner).clone()),
                        Some(ty @ Type::Struct { .. }) => Some(ty.clone()),
                        _ => None,
                    };
                    let constructed = constructed
                        .or_else(|| declaration.owner.and_then(|o| self.declared_type(o)))
                        .unwrap_or_default();
                    return ExprInfo::Value(constructed);
                }
                ExprInfo::Value(
                    routine
                        .return_type
                        .as_ref()
                        .map_or(Type::Void, |r| r.substitute(substitution)),
                )
            }
            DeclKind::Property(property) => ExprInfo::Value(property.ty.substitute(substitution)),
            DeclKind::Variable(variable) => {
                let ty = variable.ty.substitute(substitution);
                let called = shape.explicit && shape.args.is_some();
                match ty.procedural() {
                    Some(signature) if called => {
                        ExprInfo::Value(signature.result.clone().unwrap_or(Type::Void))
                    }
                    _ => ExprInfo::Value(ty),
                }
            }
            DeclKind::EnumElement(element) => ExprInfo::Value(element.ty.clone()),
            DeclKind::Label => ExprInfo::Unknown,
        }
    }

    fn call(&mut self, callee: &Expr, args: &[Expr]) -> Resolved {
        let arguments = self.arguments(args);
        match callee.unparen() {
            Expr::Name { .. } | Expr::Member { .. } => {
                self.reference_expr(callee, Shape::call(arguments))
            }
            other => {
                let resolved = self.resolve(other, None);
                self.settle(&arguments, None);
                let info = match resolved.info {
                    ExprInfo::Value(ty) => match ty.procedural() {
                        Some(signature) => {
                            ExprInfo::Value(signature.result.clone().unwrap_or(Type::Void))
                        }
                        None => ExprInfo::Unknown,
                    },
                    ExprInfo::TypeReference(ty) => ExprInfo::Value(ty),
                    _ => ExprInfo::Unknown,
                };
                Resolved {
                    info,
                    tail: resolved.tail,
                }
            }
        }
    }

    fn arguments(&mut self, args: &[Expr]) -> Vec<Argument> {
        args.iter().map(|arg| self.argument(arg)).collect()
    }

    fn argument(&mut self, expr: &Expr) -> Argument {
        let (context, name, qualifier) = match expr.unparen() {
            Expr::Name { name } if name.type_args.is_empty() => (SearchContext::Scope, name, None),
            member @ Expr::Member { base, name, .. } if name.type_args.is_empty() => {
                let namespaced = dotted_names(member).and_then(|n| self.namespace_prefix(&n));
                if namespaced.is_some() {
                    return Argument {
                        ty: self.resolve(expr, None).info.ty(),
                        deferred: None,
                    };
                }
                let base = self.resolve(base, None);
                (SearchContext::of(&base.info), name, base.tail)
            }
            _ => {
                return Argument {
                    ty: self.resolve(expr, None).info.ty(),
                    deferred: None,
                };
            }
        };

        let candidates = self.candidates_in(&context, name.name());
        let all_routines = !candidates.is_empty()
            && candidates.iter().all(|c| {
                self.declaration(*c)
                    .as_routine()
                    .is_some_and(|r| r.intrinsic.is_none())
            });
        if !all_routines {
            let resolved = self.bind(
                &context,
                name.name(),
                name.ident.range,
                candidates,
                Vec::new(),
                Shape::default(),
                qualifier,
            );
            return Argument {
                ty: resolved.info.ty(),
                deferred: None,
            };
        }

        let index = self.push(name.name(), name.ident.range, None, false, Vec::new());
        if let Some(qualifier) = qualifier {
            self.pending[qualifier].qualifies = Some(index);
        }
        Argument {
            ty: Type::Unknown,
            deferred: Some(Deferred {
                occurrence: index,
                candidates,
                search_type: context.search_type().cloned(),
            }),
        }
    }

    fn index(&mut self, base: &Expr, indices: &[Expr]) -> Resolved {
        let target = match base.unparen() {
            Expr::Name { name } => Some((SearchContext::Scope, name, None)),
            member @ Expr::Member { base: inner, name, .. } => {
                let namespaced = dotted_names(member).and_then(|n| self.namespace_prefix(&n));
                if namespaced.is_none() {
                    let inner = self.resolve(inner, None);
                    Some((SearchContext::of(&inner.info), name, inner.tail))
                } else {
                    None
                }
            }
            _ => None,
        };

        let resolved = match target {
            Some((context, name, qualifier)) => {
                let candidates = self.candidates_in(&context, name.name());
                let indexed_property = candidates.iter().any(|c| {
                    self.declaration(*c)
                        .as_property()
                        .is_some_and(|p| !p.params.is_empty())
                });
                let type_args: Vec<Type> =
                    name.type_args.iter().map(|t| self.type_expr(t)).collect();
                if indexed_property {
                    let args = self.arguments(indices);
                    let shape = Shape {
                        args: Some(args),
                        ..Shape::default()
                    };
                    return self.bind(
                        &context,
                        name.name(),
                        name.ident.range,
                        candidates,
                        type_args,
                        shape,
                        qualifier,
                    );
                }
                self.bind(
                    &context,
                    name.name(),
                    name.ident.range,
                    candidates,
                    type_args,
                    Shape::default(),
                    qualifier,
                )
            }
            None => self.resolve(base, None),
        };
        self.apply_index(resolved, indices)
    }

    fn apply_index(&mut self, base: Resolved, indices: &[Expr]) -> Resolved {
        let args = self.arguments(indices);
        let ty = base.info.ty();
        let element = match ty.base() {
            Type::Array { .. } | Type::ArrayOfConst => {
                let mut element = ty.clone();
                for _ in 0..indices.len() {
                    element = element.element().unwrap_or_default();
                }
                element
            }
            Type::String(_) | Type::Pointer(Some(_)) => ty.element().unwrap_or_default(),
            Type::Variant => Type::Variant,
            Type::Struct { .. } => self.default_property(&ty, &args),
            _ => {
                self.settle(&args, None);
                Type::Unknown
            }
        };
        Resolved {
            info: ExprInfo::Value(element),
            tail: base.tail,
        }
    }

    /// `Obj[I]` through the nearest type declaring a default array property.
    fn default_property(&mut self, ty: &Type, args: &[Argument]) -> Type {
        let mut candidates = Vec::new();
        let mut pending = ty.struct_decl().into_iter().collect::<Vec<_>>();
        let mut seen = Vec::new();
        while let Some(decl) = pending.pop() {
            if seen.contains(&decl) {
                continue;
            }
            seen.push(decl);
            if let Some(body) = self.body_of(decl) {
                candidates.extend(self.lookup.scope(body).declarations().filter(|d| {
                    self.declaration(*d)
                        .as_property()
                        .is_some_and(|p| p.is_default && !p.params.is_empty())
                }));
            }
            if !candidates.is_empty() {
                break;
            }
            pending.extend(self.lookup.ancestors_of(decl).iter().filter_map(Type::struct_decl));
        }

        let shape = Shape {
            args: Some(args.to_vec()),
            ..Shape::default()
        };
        let selected = match self.select("default", candidates, &shape, &[], Some(ty)) {
            Ok(selected) => selected,
            Err(error) => {
                debug!(%error, "ambiguous default property access");
                None
            }
        };
        self.settle(args, selected.as_ref());
        selected.map_or(Type::Unknown, |s| {
            self.declaration(s.decl).ty().substitute(&s.substitution)
        })
    }

    fn address_of(&mut self, operand: &Expr, expected: Option<&Type>) -> Resolved {
        let expected = expected.and_then(Type::procedural).cloned();
        let resolved = match operand.unparen() {
            Expr::Name { .. } | Expr::Member { .. } => {
                self.reference_expr(operand, Shape::method_ref(expected))
            }
            other => self.resolve(other, None),
        };
        let info = match resolved.info {
            ExprInfo::Value(ty) if ty.is_procedural() => ExprInfo::Value(ty),
            ExprInfo::Value(ty) if !ty.is_unknown() => ExprInfo::Value(Type::pointer_to(ty)),
            _ => ExprInfo::Value(Type::Pointer(None)),
        };
        Resolved {
            info,
            tail: resolved.tail,
        }
    }

    /// `inherited`, `inherited Name` and `inherited Name(args)`. The bare
    /// form calls the same-named ancestor method with the current
    /// routine's parameters.
    fn inherited(&mut self, name: Option<&NameRef>, args: Option<&[Expr]>, range: TextRange) -> Resolved {
        let arguments = args.map(|a| self.arguments(a));
        let lookup = self.lookup;
        let routine = self.routine.map(|r| lookup.declaration(r));
        let owner = routine.and_then(|decl| decl.owner);

        let (label, location, type_args, arguments, explicit) = match name {
            Some(name) => {
                let type_args = name.type_args.iter().map(|t| self.type_expr(t)).collect();
                let explicit = arguments.is_some();
                (name.name().to_string(), name.ident.range, type_args, arguments, explicit)
            }
            None => {
                let (label, params) = match routine {
                    Some(decl) => (
                        decl.name.clone(),
                        decl.as_routine()
                            .map(|r| {
                                r.params
                                    .iter()
                                    .map(|p| Argument {
                                        ty: p.ty.clone(),
                                        deferred: None,
                                    })
                                    .collect()
                            })
                            .unwrap_or_default(),
                    ),
                    None => ("inherited".to_string(), Vec::new()),
                };
                (label, range, Vec::new(), Some(params), false)
            }
        };

        let (candidates, search_type) = match owner {
            Some(owner) => self.inherited_members(owner, &label.to_lowercase()),
            None => (Vec::new(), None),
        };
        let context = search_type.map_or(SearchContext::Unknown, SearchContext::Members);
        let shape = Shape {
            args: arguments,
            explicit,
            ..Shape::default()
        };
        self.bind(&context, &label, location, candidates, type_args, shape, None)
    }

    fn binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Resolved {
        let left = self.resolve(left, None).info;
        let right = self.resolve(right, None).info;
        if op == BinaryOp::As {
            return Resolved::value(match right {
                ExprInfo::TypeReference(ty) => ty,
                _ => Type::Unknown,
            });
        }
        let (left, right) = (left.ty(), right.ty());
        if let Some(result) = self.class_operator(op, &left, &right) {
            return Resolved::value(result);
        }
        if op.is_comparison() {
            return Resolved::value(Type::Boolean);
        }
        Resolved::value(arithmetic_type(op, &left, &right))
    }

    /// Result of a `class operator` declared on either operand's record.
    fn class_operator(&self, op: BinaryOp, left: &Type, right: &Type) -> Option<Type> {
        let key = op.operator_name().to_lowercase();
        for operand in [left, right] {
            if !operand.is_record() {
                continue;
            }
            let Some(body) = operand.struct_decl().and_then(|d| self.body_of(d)) else {
                continue;
            };
            let substitution = Substitution::for_struct(operand, self.lookup);
            for candidate in self.lookup.scope(body).lookup_lowercase(&key) {
                let Some(routine) = self.declaration(*candidate).as_routine() else {
                    continue;
                };
                if routine.routine_kind != RoutineKind::Operator || routine.params.len() != 2 {
                    continue;
                }
                let fits = [left, right].iter().zip(&routine.params).all(|(arg, param)| {
                    super::conversion::convert(arg, &param.ty.substitute(&substitution), self.lookup)
                        .is_compatible()
                });
                if fits {
                    return routine.return_type.as_ref().map(|r| r.substitute(&substitution));
                }
            }
        }
        None
    }

    /// Longest dotted prefix naming a unit, e.g. `System.Classes` in
    /// `System.Classes.TList`.
    fn namespace_prefix(&self, names: &[&NameRef]) -> Option<(usize, DeclId)> {
        for length in (2..=names.len()).rev() {
            if names[..length].iter().any(|n| !n.type_args.is_empty()) {
                continue;
            }
            let dotted = names[..length]
                .iter()
                .map(|n| n.name())
                .collect::<Vec<_>>()
                .join(".");
            let unit = self.search_scope(&dotted).into_iter().find(|d| {
                matches!(
                    self.declaration(*d).kind,
                    DeclKind::Unit(_) | DeclKind::Import(_)
                )
            });
            if let Some(unit) = unit {
                return Some((length, unit));
            }
        }
        None
    }

    fn namespaced(&mut self, names: &[&NameRef], length: usize, unit: DeclId, shape: Shape) -> Resolved {
        let mut previous: Option<usize> = None;
        for name in &names[..length] {
            let index = self.push(name.name(), name.ident.range, Some(plain(unit)), false, Vec::new());
            if let Some(previous) = previous {
                self.pending[previous].qualifies = Some(index);
            }
            previous = Some(index);
        }
        let info = self.info_for(
            &Selected {
                decl: unit,
                substitution: Substitution::new(),
            },
            &Shape::default(),
            &SearchContext::Scope,
        );
        let mut resolved = Resolved {
            info,
            tail: previous,
        };
        let rest = &names[length..];
        let mut shape = Some(shape);
        for (position, name) in rest.iter().enumerate() {
            let segment_shape = if position + 1 == rest.len() {
                shape.take().unwrap_or_default()
            } else {
                Shape::default()
            };
            let context = SearchContext::of(&resolved.info);
            resolved = self.reference(context, name, segment_shape, resolved.tail);
        }
        if let Some(Shape { args: Some(args), .. }) = shape {
            self.settle(&args, None);
        }
        resolved
    }

    /// Resolves `names` left to right as one dotted chain.
    fn chain(&mut self, names: &[&NameRef], shape: Shape) -> Resolved {
        if let Some((length, unit)) = self.namespace_prefix(names) {
            return self.namespaced(names, length, unit, shape);
        }
        let mut shape = Some(shape);
        let mut resolved = Resolved {
            info: ExprInfo::Unknown,
            tail: None,
        };
        for (position, name) in names.iter().enumerate() {
            let context = if position == 0 {
                SearchContext::Scope
            } else {
                SearchContext::of(&resolved.info)
            };
            let segment_shape = if position + 1 == names.len() {
                shape.take().unwrap_or_default()
            } else {
                Shape::default()
            };
            resolved = self.reference(context, name, segment_shape, resolved.tail);
        }
        resolved
    }
}

fn plain(decl: DeclId) -> Binding {
    Binding {
        decl,
        substitution: Substitution::new(),
    }
}

/// Name segments of a pure dotted chain `A.B.C`.
fn dotted_names(expr: &Expr) -> Option<Vec<&NameRef>> {
    match expr.unparen() {
        Expr::Name { name } => Some(vec![name]),
        Expr::Member { base, name, .. } => {
            let mut names = dotted_names(base)?;
            names.push(name);
            Some(names)
        }
        _ => None,
    }
}

fn array_of(element: Type, dimensions: usize) -> Type {
    if dimensions == 0 {
        return Type::Array {
            element: Box::new(element),
            dynamic: true,
        };
    }
    (0..dimensions).fold(element, |inner, _| Type::Array {
        element: Box::new(inner),
        dynamic: false,
    })
}

pub(crate) fn static_array(element: Type, dimensions: usize) -> Type {
    array_of(element, dimensions)
}

pub(crate) fn literal_type(literal: &Literal) -> Type {
    match literal {
        Literal::Integer(value) => {
            if i32::try_from(*value).is_ok() {
                Type::Integer(IntegerKind::Integer)
            } else {
                Type::Integer(IntegerKind::Int64)
            }
        }
        Literal::Real(_) => Type::Real(RealKind::Extended),
        Literal::String(text) if text.chars().count() == 1 => Type::Char(CharKind::Wide),
        Literal::String(_) => Type::String(StringKind::Unicode),
    }
}

fn arithmetic_type(op: BinaryOp, left: &Type, right: &Type) -> Type {
    let (l, r) = (left.base(), right.base());
    let widest_integer = || match (l, r) {
        (Type::Integer(a), Type::Integer(b)) if a.size() == 8 || b.size() == 8 => {
            Type::Integer(IntegerKind::Int64)
        }
        _ => Type::Integer(IntegerKind::Integer),
    };
    match op {
        BinaryOp::Divide => Type::Real(RealKind::Extended),
        BinaryOp::IntDiv | BinaryOp::Mod | BinaryOp::Shl | BinaryOp::Shr => widest_integer(),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
            if matches!(l, Type::Boolean) || matches!(r, Type::Boolean) {
                Type::Boolean
            } else {
                widest_integer()
            }
        }
        BinaryOp::Add if left.is_string() || right.is_string() || (left.is_char() && right.is_char()) => {
            Type::String(StringKind::Unicode)
        }
        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply => match (l, r) {
            (Type::Set(_), _) => l.clone(),
            (_, Type::Set(_)) => r.clone(),
            (Type::Pointer(_), _) => l.clone(),
            _ if left.is_real() || right.is_real() => Type::Real(RealKind::Extended),
            _ if left.is_integer() && right.is_integer() => widest_integer(),
            (Type::Variant, _) | (_, Type::Variant) => Type::Variant,
            _ => Type::Unknown,
        },
        _ => Type::Unknown,
    }
}

fn intrinsic_result(intrinsic: Intrinsic, args: Option<&[Argument]>) -> Type {
    let first = args
        .and_then(|a| a.first())
        .map(|a| a.ty.clone())
        .unwrap_or_default();
    match intrinsic {
        Intrinsic::Length | Intrinsic::SizeOf | Intrinsic::Ord | Intrinsic::Pos => {
            Type::Integer(IntegerKind::Integer)
        }
        Intrinsic::High | Intrinsic::Low => {
            if first.is_ordinal() {
                first.base().clone()
            } else {
                Type::Integer(IntegerKind::Integer)
            }
        }
        Intrinsic::Chr => Type::Char(CharKind::Wide),
        Intrinsic::Assigned => Type::Boolean,
        Intrinsic::Trunc | Intrinsic::Round => Type::Integer(IntegerKind::Int64),
        Intrinsic::Copy | Intrinsic::Succ | Intrinsic::Pred | Intrinsic::Abs | Intrinsic::Default => {
            first
        }
        Intrinsic::TypeInfo => Type::Pointer(None),
        Intrinsic::Inc
        | Intrinsic::Dec
        | Intrinsic::Exit
        | Intrinsic::Break
        | Intrinsic::Continue
        | Intrinsic::Write
        | Intrinsic::WriteLn
        | Intrinsic::ReadLn
        | Intrinsic::New
        | Intrinsic::Dispose
        | Intrinsic::FreeAndNil
        | Intrinsic::SetLength
        | Intrinsic::Include
        | Intrinsic::Exclude
        | Intrinsic::Assert
        | Intrinsic::Halt => Type::Void,
    }
}
