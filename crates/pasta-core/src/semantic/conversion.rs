//! Argument-to-parameter compatibility ranking.
//!
//! Overload resolution compares candidates by how well each argument type
//! converts to the matching parameter type.

use std::cmp::Ordering;

use crate::syntax::ast::{ParamKind, RoutineKind};

use super::declaration::DeclKind;
use super::layer::SymbolLookup;
use super::types::{ProceduralSignature, Type, inheritance_distance};

pub const WORST_COST: u8 = u8::MAX;
const UNTYPED_COST: u8 = 60;
const VARIANT_COST: u8 = 40;
const IMPLICIT_OPERATOR_COST: u8 = 30;
const GENERIC_COST: u8 = 100;

/// Lowest to highest: `Incompatible < Convertible(high cost) <
/// Convertible(low cost) < Equal < Exact`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Equality {
    Incompatible,
    Convertible(u8),
    Equal,
    Exact,
}

impl Equality {
    fn rank(self) -> u32 {
        match self {
            Equality::Incompatible => 0,
            Equality::Convertible(cost) => 1_000 - u32::from(cost),
            Equality::Equal => 2_000,
            Equality::Exact => 3_000,
        }
    }

    pub fn is_compatible(self) -> bool {
        self != Equality::Incompatible
    }
}

impl PartialOrd for Equality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Equality {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

/// Ranks passing an argument of type `from` to a parameter of type `to`.
pub fn rank_argument(
    from: &Type,
    to: &Type,
    kind: ParamKind,
    lookup: &dyn SymbolLookup,
) -> Equality {
    if matches!(kind, ParamKind::Var | ParamKind::Out) {
        return match (from, to) {
            (Type::Unknown, _) | (_, Type::Unknown) => Equality::Convertible(WORST_COST),
            (_, Type::Untyped) => Equality::Convertible(UNTYPED_COST),
            (_, Type::Parameter(_)) => Equality::Convertible(GENERIC_COST),
            _ if from == to => Equality::Exact,
            _ if from.base() == to.base() => Equality::Equal,
            _ => Equality::Incompatible,
        };
    }
    convert(from, to, lookup)
}

pub fn convert(from: &Type, to: &Type, lookup: &dyn SymbolLookup) -> Equality {
    if from == to {
        return Equality::Exact;
    }
    match (from, to) {
        (Type::Unknown, _) | (_, Type::Unknown) => return Equality::Convertible(WORST_COST),
        (_, Type::Untyped) => return Equality::Convertible(UNTYPED_COST),
        (_, Type::Parameter(_)) | (Type::Parameter(_), _) => {
            return Equality::Convertible(GENERIC_COST);
        }
        _ => {}
    }
    if from.base() == to.base() {
        return Equality::Equal;
    }

    let structural = match (from.base(), to.base()) {
        (Type::Integer(a), Type::Integer(b)) => {
            let size_gap = a.size().abs_diff(b.size());
            let sign_change = u8::from(a.is_signed() != b.is_signed());
            Equality::Convertible(1 + size_gap + sign_change)
        }
        (Type::Integer(_), Type::Real(_)) => Equality::Convertible(20),
        (Type::Real(_), Type::Real(_)) => Equality::Convertible(5),
        (Type::Char(_), Type::Char(_)) => Equality::Convertible(5),
        (Type::Char(_), Type::String(_)) => Equality::Convertible(10),
        (Type::String(_), Type::String(_)) => Equality::Convertible(5),
        (
            Type::Integer(_) | Type::Real(_) | Type::Boolean | Type::Char(_) | Type::String(_),
            Type::Variant,
        ) => Equality::Convertible(VARIANT_COST),
        (
            Type::Variant,
            Type::Integer(_) | Type::Real(_) | Type::Boolean | Type::Char(_) | Type::String(_),
        ) => Equality::Convertible(VARIANT_COST + 5),
        (Type::Nil, target) if accepts_nil(target) => Equality::Equal,
        (Type::Pointer(Some(_)), Type::Pointer(None)) => Equality::Convertible(10),
        (Type::Pointer(None), Type::Pointer(Some(_))) => Equality::Convertible(15),
        (Type::Pointer(Some(a)), Type::Pointer(Some(b))) => {
            if a.base() == b.base() {
                Equality::Equal
            } else {
                Equality::Incompatible
            }
        }
        (Type::Struct { decl: a, .. }, Type::Struct { decl: b, .. }) => {
            match inheritance_distance(*a, *b, lookup) {
                Some(distance) => Equality::Convertible(cost_for_distance(distance)),
                None => Equality::Incompatible,
            }
        }
        (Type::ClassReference(a), Type::ClassReference(b)) => {
            match (a.struct_decl(), b.struct_decl()) {
                (Some(a), Some(b)) => match inheritance_distance(a, b, lookup) {
                    Some(distance) => Equality::Convertible(cost_for_distance(distance)),
                    None => Equality::Incompatible,
                },
                _ => Equality::Incompatible,
            }
        }
        (Type::Set(a), Type::Set(b)) => weaken(convert(a, b, lookup), 5),
        (Type::Set(a), Type::Array { element, .. }) => weaken(convert(a, element, lookup), 10),
        (Type::Set(_), Type::ArrayOfConst) => Equality::Convertible(10),
        (
            Type::Array {
                element: a,
                dynamic: from_dynamic,
            },
            Type::Array {
                element: b,
                dynamic: true,
            },
        ) => {
            if a.base() != b.base() {
                Equality::Incompatible
            } else if *from_dynamic {
                Equality::Equal
            } else {
                Equality::Convertible(5)
            }
        }
        (Type::Procedural(a), Type::Procedural(b)) => {
            if signatures_match(a, b) {
                Equality::Equal
            } else {
                Equality::Incompatible
            }
        }
        _ => Equality::Incompatible,
    };

    if structural.is_compatible() {
        return structural;
    }
    if implicit_operator_exists(from, to, lookup) {
        return Equality::Convertible(IMPLICIT_OPERATOR_COST);
    }
    Equality::Incompatible
}

fn cost_for_distance(distance: u32) -> u8 {
    10u8.saturating_add(u8::try_from(distance).unwrap_or(u8::MAX))
}

/// Exact and equal matches inside a container become conversions.
fn weaken(inner: Equality, cost: u8) -> Equality {
    match inner {
        Equality::Incompatible => Equality::Incompatible,
        Equality::Exact | Equality::Equal => Equality::Convertible(cost),
        Equality::Convertible(c) => Equality::Convertible(c.saturating_add(cost)),
    }
}

fn accepts_nil(target: &Type) -> bool {
    matches!(
        target,
        Type::Pointer(_)
            | Type::ClassReference(_)
            | Type::Procedural(_)
            | Type::String(_)
            | Type::Variant
            | Type::Array { dynamic: true, .. }
    ) || target.is_class()
        || target.is_interface()
}

/// Structural procedural-type equality: parameter kinds and types plus the
/// result type. `of object` and `reference to` do not matter.
pub fn signatures_match(a: &ProceduralSignature, b: &ProceduralSignature) -> bool {
    a.params.len() == b.params.len()
        && a.params
            .iter()
            .zip(&b.params)
            .all(|(x, y)| x.kind == y.kind && (x.ty == y.ty || x.ty.base() == y.ty.base()))
        && a.result == b.result
}

/// Looks for a `class operator Implicit` on either record that turns `from`
/// into `to`.
fn implicit_operator_exists(from: &Type, to: &Type, lookup: &dyn SymbolLookup) -> bool {
    [to, from].into_iter().any(|record| {
        let Some(decl) = record.struct_decl().filter(|_| record.is_record()) else {
            return false;
        };
        let Some(body) = lookup.declaration(decl).as_type().and_then(|t| t.body) else {
            return false;
        };
        lookup.scope(body).lookup("implicit").iter().any(|op| {
            match &lookup.declaration(*op).kind {
                DeclKind::Routine(routine) if routine.routine_kind == RoutineKind::Operator => {
                    routine.params.first().is_some_and(|p| p.ty.base() == from.base())
                        && routine.return_type.as_ref().is_some_and(|r| r.base() == to.base())
                }
                _ => false,
            }
        })
    })
}
