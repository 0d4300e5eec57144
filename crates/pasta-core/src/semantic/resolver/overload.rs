//! Overload disambiguation.
//!
//! Candidates that survive the filters are ranked per argument. A candidate
//! is kept unless another one is at least as good on every argument and
//! strictly better on one. What remains is narrowed by tie-breaks; more
//! than one survivor is an ambiguity.

use crate::error::ResolveError;
use crate::semantic::conversion::{Equality, rank_argument, signatures_match};
use std::collections::HashSet;

use crate::semantic::declaration::{DeclKey, DeclKind, Typed};
use crate::semantic::ids::DeclId;
use crate::semantic::types::{ParamType, ProceduralSignature, Substitution, Type, inheritance_distance};

use super::filter::CallTarget;
use super::{Argument, Resolver, Shape};

/// Outcome of overload resolution for one reference.
#[derive(Debug, Clone)]
pub(crate) struct Selected {
    pub decl: DeclId,
    pub substitution: Substitution,
}

#[derive(Debug, Clone)]
struct Ranked {
    decl: DeclId,
    substitution: Substitution,
    ranks: Vec<Equality>,
    /// Generic routine whose type parameters were inferred.
    implicit: bool,
}

impl Ranked {
    fn dominates(&self, other: &Ranked) -> bool {
        self.ranks.len() == other.ranks.len()
            && self.ranks.iter().zip(&other.ranks).all(|(a, b)| a >= b)
            && self.ranks.iter().zip(&other.ranks).any(|(a, b)| a > b)
    }
}

impl Resolver<'_> {
    pub(super) fn select(
        &self,
        name: &str,
        candidates: Vec<DeclId>,
        shape: &Shape,
        type_args: &[Type],
        search_type: Option<&Type>,
    ) -> Result<Option<Selected>, ResolveError> {
        let mut candidates = dedup(candidates, |d| self.declaration(d).key());
        self.invocable_filter(&mut candidates);
        self.visibility_filter(&mut candidates);
        self.generic_filter(&mut candidates, type_args, shape.args.as_deref());
        if let Some(args) = &shape.args {
            self.arity_filter(&mut candidates, args.len());
            if args.len() == 1 {
                let casts: Vec<DeclId> = candidates
                    .iter()
                    .copied()
                    .filter(|c| matches!(CallTarget::of(self.declaration(*c)), CallTarget::Cast))
                    .collect();
                if let [cast] = casts[..] {
                    return Ok(Some(Selected {
                        decl: cast,
                        substitution: self.explicit_substitution(cast, type_args),
                    }));
                }
            }
        }
        if candidates.is_empty() {
            return Ok(None);
        }

        let base = search_type
            .map(|t| Substitution::for_struct(t, self.lookup))
            .unwrap_or_default();
        let ranked: Vec<Ranked> = candidates
            .into_iter()
            .filter_map(|candidate| self.rank(candidate, shape, type_args, &base))
            .collect();
        let ranked = pareto(ranked);
        let ranked = self.tie_break(ranked, search_type);

        match ranked.len() {
            0 => Ok(None),
            1 => {
                let winner = ranked.into_iter().next().map(|r| Selected {
                    decl: r.decl,
                    substitution: r.substitution,
                });
                Ok(winner)
            }
            count => Err(ResolveError::Ambiguous {
                name: name.to_string(),
                candidates: count,
            }),
        }
    }

    fn rank(
        &self,
        candidate: DeclId,
        shape: &Shape,
        type_args: &[Type],
        base: &Substitution,
    ) -> Option<Ranked> {
        let declaration = self.declaration(candidate);
        let mut substitution = base.clone();
        substitution.extend(&self.explicit_substitution(candidate, type_args));

        if let Some(expected) = &shape.expected {
            if let DeclKind::Routine(routine) = &declaration.kind {
                let actual = routine
                    .procedural_type(declaration.owner.is_some())
                    .substitute(&substitution);
                let matches = actual.procedural().is_some_and(|a| signatures_match(a, expected));
                if !matches {
                    return None;
                }
            }
            return Some(Ranked {
                decl: candidate,
                substitution,
                ranks: Vec::new(),
                implicit: false,
            });
        }

        let (Some(args), CallTarget::Params(params)) = (&shape.args, CallTarget::of(declaration))
        else {
            return Some(Ranked {
                decl: candidate,
                substitution,
                ranks: Vec::new(),
                implicit: false,
            });
        };

        let type_params: &[DeclId] = match &declaration.kind {
            DeclKind::Routine(routine) if type_args.is_empty() => &routine.type_params,
            _ => &[],
        };
        let implicit = !type_params.is_empty();
        if implicit {
            let inferred = self.infer(type_params, &params, args, &substitution)?;
            substitution.extend(&inferred);
        }

        let mut ranks = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&params) {
            let param_ty = param.ty.substitute(&substitution);
            let arg_ty = self.argument_type(arg, &param_ty);
            let rank = rank_argument(&arg_ty, &param_ty, param.kind, self.lookup);
            if !rank.is_compatible() {
                return None;
            }
            ranks.push(rank);
        }
        Some(Ranked {
            decl: candidate,
            substitution,
            ranks,
            implicit,
        })
    }

    pub(super) fn explicit_substitution(&self, candidate: DeclId, type_args: &[Type]) -> Substitution {
        let mut substitution = Substitution::new();
        if let Some(generic) = self.declaration(candidate).generifiable() {
            for (param, arg) in generic.type_parameters().iter().zip(type_args) {
                substitution.bind(*param, arg.clone());
            }
        }
        substitution
    }

    /// Binds every type parameter by unifying parameter types with argument
    /// types; fails when one stays unbound.
    fn infer(
        &self,
        type_params: &[DeclId],
        params: &[ParamType],
        args: &[Argument],
        base: &Substitution,
    ) -> Option<Substitution> {
        let mut inferred = Substitution::new();
        for (arg, param) in args.iter().zip(params) {
            let param_ty = param.ty.substitute(base);
            let arg_ty = self.argument_type(arg, &param_ty);
            unify(&param_ty, &arg_ty, type_params, &mut inferred);
        }
        type_params
            .iter()
            .all(|tp| inferred.get(*tp).is_some())
            .then_some(inferred)
    }

    /// Type an argument contributes. A deferred routine name stands for a
    /// method reference when the parameter is procedural and for the
    /// result of a parameterless call otherwise.
    fn argument_type(&self, arg: &Argument, param_ty: &Type) -> Type {
        let Some(deferred) = &arg.deferred else {
            return arg.ty.clone();
        };
        let base = deferred
            .search_type
            .as_ref()
            .map(|t| Substitution::for_struct(t, self.lookup))
            .unwrap_or_default();
        let routines = deferred.candidates.iter().filter_map(|c| {
            let declaration = self.declaration(*c);
            declaration.as_routine().map(|r| (declaration, r))
        });
        if let Some(expected) = param_ty.procedural() {
            let mut first = None;
            for (declaration, routine) in routines {
                let ty = routine
                    .procedural_type(declaration.owner.is_some())
                    .substitute(&base);
                if ty.procedural().is_some_and(|a| signatures_match(a, expected)) {
                    return ty;
                }
                first.get_or_insert(ty);
            }
            return first.unwrap_or_default();
        }
        routines
            .filter(|(_, r)| r.params.iter().all(|p| p.has_default))
            .find_map(|(_, r)| r.return_type.as_ref())
            .map(|ty| ty.substitute(&base))
            .unwrap_or_default()
    }

    /// Formal type of argument `position` for the chosen callee.
    pub(super) fn parameter_type(&self, selected: &Selected, position: usize) -> Option<Type> {
        match CallTarget::of(self.declaration(selected.decl)) {
            CallTarget::Params(params) => params
                .get(position)
                .map(|p| p.ty.substitute(&selected.substitution)),
            _ => None,
        }
    }

    fn tie_break(&self, mut ranked: Vec<Ranked>, search_type: Option<&Type>) -> Vec<Ranked> {
        if ranked.len() < 2 {
            return ranked;
        }

        if ranked.iter().filter(|r| !r.implicit).count() == 1 {
            ranked.retain(|r| !r.implicit);
            return ranked;
        }

        if ranked.iter().all(|r| self.declaration(r.decl).is_routine()) {
            if ranked.iter().any(|r| r.decl.unit == self.unit)
                && ranked.iter().any(|r| r.decl.unit != self.unit)
            {
                ranked.retain(|r| r.decl.unit == self.unit);
            }

            let reference = search_type
                .and_then(Type::struct_decl)
                .or_else(|| self.enclosing_type());
            if let Some(reference) = reference {
                let distances: Vec<u32> = ranked
                    .iter()
                    .map(|r| self.owner_distance(r.decl, reference))
                    .collect();
                if let Some(&closest) = distances.iter().min() {
                    let mut distances = distances.into_iter();
                    ranked.retain(|_| distances.next() == Some(closest));
                }
            }
        }

        if ranked.len() > 1 {
            let first = self.signature_of(ranked[0].decl, &ranked[0].substitution);
            let identical = ranked
                .iter()
                .skip(1)
                .all(|r| self.signature_of(r.decl, &r.substitution) == first);
            if identical {
                ranked.truncate(1);
            }
        }
        ranked
    }

    /// Inheritance steps from `reference` up to the candidate's owner.
    fn owner_distance(&self, candidate: DeclId, reference: DeclId) -> u32 {
        let Some(owner) = self.declaration(candidate).owner else {
            return u32::MAX;
        };
        let is_helper = self
            .declaration(owner)
            .as_type()
            .is_some_and(|t| t.helper_for.is_some());
        if is_helper {
            return 0;
        }
        inheritance_distance(reference, owner, self.lookup).unwrap_or(u32::MAX - 1)
    }

    /// Parameter kinds and types plus the result type.
    fn signature_of(&self, decl: DeclId, substitution: &Substitution) -> Option<ProceduralSignature> {
        let declaration = self.declaration(decl);
        let params = match CallTarget::of(declaration) {
            CallTarget::Params(params) => params,
            _ => Vec::new(),
        };
        Some(ProceduralSignature {
            params: params
                .into_iter()
                .map(|p| ParamType {
                    ty: p.ty.substitute(substitution),
                    ..p
                })
                .collect(),
            result: Some(declaration.ty().substitute(substitution)),
            of_object: false,
            reference: false,
        })
    }
}

/// Keeps the first of every group of structurally equal candidates, so a
/// declaration reached through several scopes or materialized in several
/// layers counts once.
fn dedup(candidates: Vec<DeclId>, key: impl Fn(DeclId) -> DeclKey) -> Vec<DeclId> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|candidate| seen.insert(key(*candidate)))
        .collect()
}

/// Drops every candidate another candidate dominates.
fn pareto(ranked: Vec<Ranked>) -> Vec<Ranked> {
    let keep: Vec<bool> = ranked
        .iter()
        .map(|candidate| !ranked.iter().any(|other| other.dominates(candidate)))
        .collect();
    ranked
        .into_iter()
        .zip(keep)
        .filter_map(|(candidate, keep)| keep.then_some(candidate))
        .collect()
}

/// Structural unification of a formal type against an actual one.
fn unify(formal: &Type, actual: &Type, params: &[DeclId], out: &mut Substitution) {
    match (formal, actual) {
        (_, Type::Unknown) => {}
        (Type::Parameter(param), _) if params.contains(param) => {
            if out.get(*param).is_none() {
                out.bind(*param, actual.clone());
            }
        }
        (Type::Array { element: f, .. }, Type::Array { element: a, .. })
        | (Type::Set(f), Type::Set(a))
        | (Type::ClassReference(f), Type::ClassReference(a))
        | (Type::Pointer(Some(f)), Type::Pointer(Some(a))) => unify(f, a, params, out),
        (
            Type::Struct {
                decl: fd, args: fa, ..
            },
            Type::Struct {
                decl: ad, args: aa, ..
            },
        ) if fd == ad => {
            for (f, a) in fa.iter().zip(aa) {
                unify(f, a, params, out);
            }
        }
        (Type::Procedural(f), Type::Procedural(a)) => {
            for (fp, ap) in f.params.iter().zip(&a.params) {
                unify(&fp.ty, &ap.ty, params, out);
            }
            if let (Some(fr), Some(ar)) = (&f.result, &a.result) {
                unify(fr, ar, params, out);
            }
        }
        _ => {}
    }
}
