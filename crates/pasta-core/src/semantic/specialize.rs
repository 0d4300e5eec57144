//! Binding generic declarations to concrete type arguments.

use super::declaration::{DeclKind, Declaration, Parameter};
use super::ids::DeclId;
use super::types::{Substitution, Type};

/// Produces the specialization of `origin` under `substitution`, or `None`
/// when nothing in its signature depends on the substituted parameters.
pub fn specialize(
    origin_id: DeclId,
    origin: &Declaration,
    substitution: &Substitution,
) -> Option<Declaration> {
    if substitution.is_empty() || !depends_on(origin, &substitution.params()) {
        return None;
    }

    let mut specialized = origin.clone();
    specialized.generic_origin = Some(origin.generic_origin.unwrap_or(origin_id));
    let bound = substitution.params();

    match &mut specialized.kind {
        DeclKind::Routine(routine) => {
            substitute_params(&mut routine.params, substitution);
            routine.return_type = routine
                .return_type
                .as_ref()
                .map(|ty| ty.substitute(substitution));
            routine.type_params.retain(|p| !bound.contains(p));
        }
        DeclKind::Property(property) => {
            substitute_params(&mut property.params, substitution);
            property.ty = property.ty.substitute(substitution);
        }
        DeclKind::Variable(variable) => variable.ty = variable.ty.substitute(substitution),
        DeclKind::Type(ty) => {
            ty.ty = ty.ty.substitute(substitution);
            ty.ancestors = ty
                .ancestors
                .iter()
                .map(|a| a.substitute(substitution))
                .collect();
            ty.type_params.retain(|p| !bound.contains(p));
        }
        DeclKind::EnumElement(_)
        | DeclKind::TypeParameter(_)
        | DeclKind::Unit(_)
        | DeclKind::Import(_)
        | DeclKind::Label => return None,
    }

    Some(specialized)
}

fn substitute_params(params: &mut [Parameter], substitution: &Substitution) {
    for param in params {
        param.ty = param.ty.substitute(substitution);
    }
}

fn depends_on(decl: &Declaration, params: &[DeclId]) -> bool {
    let mentions = |ty: &Type| ty.mentions_any(params);
    match &decl.kind {
        DeclKind::Routine(routine) => {
            routine.params.iter().any(|p| mentions(&p.ty))
                || routine.return_type.as_ref().is_some_and(mentions)
        }
        DeclKind::Property(property) => {
            mentions(&property.ty) || property.params.iter().any(|p| mentions(&p.ty))
        }
        DeclKind::Variable(variable) => mentions(&variable.ty),
        DeclKind::Type(ty) => {
            ty.type_params.iter().any(|p| params.contains(p))
                || mentions(&ty.ty)
                || ty.ancestors.iter().any(mentions)
        }
        _ => false,
    }
}
