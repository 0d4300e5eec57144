//! Candidate filters that do not look at argument types.

use crate::semantic::declaration::{DeclKind, Declaration, Visibility};
use crate::semantic::ids::DeclId;
use crate::semantic::types::{ParamType, Type, inheritance_distance};

use super::{Argument, Resolver};

/// How a candidate takes arguments.
pub(super) enum CallTarget {
    Params(Vec<ParamType>),
    /// Intrinsics accept anything.
    Any,
    /// `TFoo(X)`: a hard cast.
    Cast,
    Opaque,
}

impl CallTarget {
    pub fn of(declaration: &Declaration) -> Self {
        match &declaration.kind {
            DeclKind::Routine(routine) if routine.intrinsic.is_some() => CallTarget::Any,
            DeclKind::Routine(routine) => CallTarget::Params(
                routine
                    .params
                    .iter()
                    .map(|p| ParamType {
                        kind: p.kind,
                        ty: p.ty.clone(),
                        has_default: p.has_default,
                    })
                    .collect(),
            ),
            DeclKind::Property(property) if !property.params.is_empty() => CallTarget::Params(
                property
                    .params
                    .iter()
                    .map(|p| ParamType {
                        kind: p.kind,
                        ty: p.ty.clone(),
                        has_default: p.has_default,
                    })
                    .collect(),
            ),
            DeclKind::Property(property) => procedural_params(&property.ty),
            DeclKind::Variable(variable) => procedural_params(&variable.ty),
            DeclKind::Type(_) | DeclKind::TypeParameter(_) => CallTarget::Cast,
            _ => CallTarget::Opaque,
        }
    }
}

fn procedural_params(ty: &Type) -> CallTarget {
    match ty.procedural() {
        Some(signature) => CallTarget::Params(signature.params.clone()),
        None => CallTarget::Opaque,
    }
}

impl Resolver<'_> {
    pub(super) fn invocable_filter(&self, candidates: &mut Vec<DeclId>) {
        candidates.retain(|c| {
            self.declaration(*c)
                .as_routine()
                .is_none_or(|r| r.is_callable)
        });
    }

    pub(super) fn visibility_filter(&self, candidates: &mut Vec<DeclId>) {
        let context = self.access_context();
        candidates.retain(|c| self.is_accessible(*c, &context));
    }

    /// Types whose non-public members the current position may see: the
    /// enclosing type, plus the extended type when that is a helper.
    fn access_context(&self) -> Vec<DeclId> {
        let Some(enclosing) = self.enclosing_type() else {
            return Vec::new();
        };
        let mut context = vec![enclosing];
        let extended = self
            .declaration(enclosing)
            .as_type()
            .and_then(|t| t.helper_for.as_ref())
            .and_then(Type::struct_decl);
        context.extend(extended);
        context
    }

    fn is_accessible(&self, candidate: DeclId, context: &[DeclId]) -> bool {
        let declaration = self.declaration(candidate);
        let Some(owner) = declaration.owner else {
            return true;
        };
        let same_type = context.contains(&owner);
        let same_unit = owner.unit == self.unit;
        let subtype = || {
            context
                .iter()
                .any(|t| inheritance_distance(*t, owner, self.lookup).is_some())
        };
        match declaration.visibility {
            Visibility::Public | Visibility::Published | Visibility::Automated => true,
            Visibility::StrictPrivate => same_type,
            Visibility::Private => same_type || same_unit,
            Visibility::StrictProtected => same_type || subtype(),
            Visibility::Protected => same_type || same_unit || subtype(),
        }
    }

    /// Explicit type arguments select candidates by type-parameter count.
    /// Without them, generic types drop out and generic routines stay only
    /// if every type parameter can be inferred from the arguments.
    pub(super) fn generic_filter(
        &self,
        candidates: &mut Vec<DeclId>,
        type_args: &[Type],
        args: Option<&[Argument]>,
    ) {
        if !type_args.is_empty() {
            candidates.retain(|c| self.declaration(*c).type_parameter_count() == type_args.len());
            return;
        }
        let has_args = args.is_some_and(|a| !a.is_empty());
        candidates.retain(|c| match &self.declaration(*c).kind {
            DeclKind::Type(type_decl) => type_decl.type_params.is_empty(),
            DeclKind::Routine(routine) if !routine.type_params.is_empty() => {
                has_args
                    && routine.type_params.iter().all(|tp| {
                        routine
                            .params
                            .iter()
                            .any(|p| p.ty.mentions_any(std::slice::from_ref(tp)))
                    })
            }
            _ => true,
        });
    }

    pub(super) fn arity_filter(&self, candidates: &mut Vec<DeclId>, count: usize) {
        candidates.retain(|c| match CallTarget::of(self.declaration(*c)) {
            CallTarget::Params(params) => {
                let required = params.iter().take_while(|p| !p.has_default).count();
                required <= count && count <= params.len()
            }
            CallTarget::Any => true,
            CallTarget::Cast => count == 1,
            CallTarget::Opaque => count == 0,
        });
    }
}
