//! Type values computed during resolution.
//!
//! Types are plain values: user-declared types point back to their declaring
//! [`Declaration`](super::declaration::Declaration) through a [`DeclId`], so
//! a member search can reach the declaring type's scope.

use crate::syntax::ast::{ParamKind, StructKind};

use super::declaration::DeclKind;
use super::ids::DeclId;
use super::layer::SymbolLookup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    ShortInt,
    SmallInt,
    Integer,
    Int64,
    Byte,
    Word,
    Cardinal,
    UInt64,
    NativeInt,
    NativeUInt,
}

impl IntegerKind {
    pub fn size(self) -> u8 {
        match self {
            IntegerKind::ShortInt | IntegerKind::Byte => 1,
            IntegerKind::SmallInt | IntegerKind::Word => 2,
            IntegerKind::Integer | IntegerKind::Cardinal => 4,
            IntegerKind::Int64
            | IntegerKind::UInt64
            | IntegerKind::NativeInt
            | IntegerKind::NativeUInt => 8,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntegerKind::ShortInt
                | IntegerKind::SmallInt
                | IntegerKind::Integer
                | IntegerKind::Int64
                | IntegerKind::NativeInt
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RealKind {
    Single,
    Double,
    Extended,
    Currency,
    Comp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharKind {
    Ansi,
    Wide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringKind {
    Short,
    Ansi,
    Wide,
    Unicode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamType {
    pub kind: ParamKind,
    pub ty: Type,
    pub has_default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProceduralSignature {
    pub params: Vec<ParamType>,
    pub result: Option<Type>,
    pub of_object: bool,
    pub reference: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Type {
    /// Resolution gave up; compatible with everything at the worst rank.
    #[default]
    Unknown,
    /// Type of an untyped `var`/`const` parameter.
    Untyped,
    Void,
    Nil,
    Integer(IntegerKind),
    Real(RealKind),
    Boolean,
    Char(CharKind),
    String(StringKind),
    Variant,
    /// `None` for the untyped `Pointer`.
    Pointer(Option<Box<Type>>),
    Enum(DeclId),
    Subrange(Box<Type>),
    Set(Box<Type>),
    Array {
        element: Box<Type>,
        dynamic: bool,
    },
    ArrayOfConst,
    Procedural(Box<ProceduralSignature>),
    ClassReference(Box<Type>),
    Struct {
        decl: DeclId,
        kind: StructKind,
        args: Vec<Type>,
    },
    Parameter(DeclId),
    /// Strong alias (`type Integer`), distinct from its target for matching.
    Alias {
        decl: DeclId,
        target: Box<Type>,
    },
    File,
}

impl Type {
    pub fn pointer_to(target: Type) -> Type {
        Type::Pointer(Some(Box::new(target)))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Identity test.
    pub fn is(&self, other: &Type) -> bool {
        self == other
    }

    /// Strips strong aliases and subranges down to the underlying type.
    pub fn base(&self) -> &Type {
        match self {
            Type::Alias { target, .. } | Type::Subrange(target) => target.base(),
            other => other,
        }
    }

    pub fn struct_decl(&self) -> Option<DeclId> {
        match self.base() {
            Type::Struct { decl, .. } => Some(*decl),
            _ => None,
        }
    }

    pub fn struct_kind(&self) -> Option<StructKind> {
        match self.base() {
            Type::Struct { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_class(&self) -> bool {
        self.struct_kind() == Some(StructKind::Class)
    }

    pub fn is_record(&self) -> bool {
        matches!(
            self.struct_kind(),
            Some(StructKind::Record | StructKind::Object)
        )
    }

    pub fn is_interface(&self) -> bool {
        matches!(
            self.struct_kind(),
            Some(StructKind::Interface | StructKind::DispInterface)
        )
    }

    pub fn is_helper(&self) -> bool {
        self.struct_kind().is_some_and(StructKind::is_helper)
    }

    pub fn is_procedural(&self) -> bool {
        matches!(self.base(), Type::Procedural(_))
    }

    pub fn is_class_reference(&self) -> bool {
        matches!(self.base(), Type::ClassReference(_))
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.base(), Type::Pointer(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.base(), Type::Array { .. } | Type::ArrayOfConst)
    }

    pub fn is_generic_parameter(&self) -> bool {
        matches!(self, Type::Parameter(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self.base(), Type::Integer(_))
    }

    pub fn is_real(&self) -> bool {
        matches!(self.base(), Type::Real(_))
    }

    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_real()
    }

    pub fn is_string(&self) -> bool {
        matches!(self.base(), Type::String(_))
    }

    pub fn is_char(&self) -> bool {
        matches!(self.base(), Type::Char(_))
    }

    pub fn is_ordinal(&self) -> bool {
        matches!(
            self.base(),
            Type::Integer(_) | Type::Char(_) | Type::Boolean | Type::Enum(_)
        )
    }

    pub fn procedural(&self) -> Option<&ProceduralSignature> {
        match self.base() {
            Type::Procedural(signature) => Some(signature),
            _ => None,
        }
    }

    /// Element type of arrays, strings, sets and typed pointers.
    pub fn element(&self) -> Option<Type> {
        match self.base() {
            Type::Array { element, .. } | Type::Set(element) => Some((**element).clone()),
            Type::String(StringKind::Ansi | StringKind::Short) => Some(Type::Char(CharKind::Ansi)),
            Type::String(_) => Some(Type::Char(CharKind::Wide)),
            Type::Pointer(Some(target)) => Some((**target).clone()),
            Type::ArrayOfConst => Some(Type::Variant),
            _ => None,
        }
    }

    /// Whether any type parameter in `params` appears inside this type.
    pub fn mentions_any(&self, params: &[DeclId]) -> bool {
        match self {
            Type::Parameter(decl) => params.contains(decl),
            Type::Pointer(Some(inner))
            | Type::Subrange(inner)
            | Type::Set(inner)
            | Type::ClassReference(inner)
            | Type::Array { element: inner, .. } => inner.mentions_any(params),
            Type::Alias { target, .. } => target.mentions_any(params),
            Type::Procedural(signature) => {
                signature.params.iter().any(|p| p.ty.mentions_any(params))
                    || signature
                        .result
                        .as_ref()
                        .is_some_and(|r| r.mentions_any(params))
            }
            Type::Struct { args, .. } => args.iter().any(|a| a.mentions_any(params)),
            _ => false,
        }
    }

    pub fn substitute(&self, substitution: &Substitution) -> Type {
        if substitution.is_empty() {
            return self.clone();
        }
        match self {
            Type::Parameter(decl) => substitution
                .get(*decl)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            Type::Pointer(Some(inner)) => Type::pointer_to(inner.substitute(substitution)),
            Type::Subrange(inner) => Type::Subrange(Box::new(inner.substitute(substitution))),
            Type::Set(inner) => Type::Set(Box::new(inner.substitute(substitution))),
            Type::ClassReference(inner) => {
                Type::ClassReference(Box::new(inner.substitute(substitution)))
            }
            Type::Array { element, dynamic } => Type::Array {
                element: Box::new(element.substitute(substitution)),
                dynamic: *dynamic,
            },
            Type::Procedural(signature) => Type::Procedural(Box::new(ProceduralSignature {
                params: signature
                    .params
                    .iter()
                    .map(|p| ParamType {
                        kind: p.kind,
                        ty: p.ty.substitute(substitution),
                        has_default: p.has_default,
                    })
                    .collect(),
                result: signature.result.as_ref().map(|r| r.substitute(substitution)),
                of_object: signature.of_object,
                reference: signature.reference,
            })),
            Type::Struct { decl, kind, args } => Type::Struct {
                decl: *decl,
                kind: *kind,
                args: args.iter().map(|a| a.substitute(substitution)).collect(),
            },
            other => other.clone(),
        }
    }

    /// Key under which helpers for this type are registered.
    pub fn helper_key(&self) -> Option<HelperKey> {
        match self.base() {
            Type::Struct { decl, .. } | Type::Enum(decl) => Some(HelperKey::Declared(*decl)),
            Type::Integer(kind) => Some(HelperKey::Integer(*kind)),
            Type::Real(kind) => Some(HelperKey::Real(*kind)),
            Type::String(kind) => Some(HelperKey::String(*kind)),
            Type::Char(kind) => Some(HelperKey::Char(*kind)),
            Type::Boolean => Some(HelperKey::Boolean),
            _ => None,
        }
    }

    /// Subtype test over class ancestry and implemented interfaces.
    pub fn is_sub_type_of(&self, other: &Type, lookup: &dyn SymbolLookup) -> bool {
        match (self.base(), other.base()) {
            (Type::ClassReference(a), Type::ClassReference(b)) => a.is_sub_type_of(b, lookup),
            _ => match (self.struct_decl(), other.struct_decl()) {
                (Some(a), Some(b)) => inheritance_distance(a, b, lookup).is_some(),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HelperKey {
    Declared(DeclId),
    Integer(IntegerKind),
    Real(RealKind),
    String(StringKind),
    Char(CharKind),
    Boolean,
}

/// Number of inheritance steps from `from` up to `to`, counting implemented
/// interfaces as one step.
pub fn inheritance_distance(from: DeclId, to: DeclId, lookup: &dyn SymbolLookup) -> Option<u32> {
    let mut frontier = vec![(from, 0u32)];
    let mut seen = Vec::new();
    while let Some((current, distance)) = frontier.pop() {
        if current == to {
            return Some(distance);
        }
        if seen.contains(&current) {
            continue;
        }
        seen.push(current);
        for ancestor in lookup.ancestors_of(current) {
            if let Some(decl) = ancestor.struct_decl() {
                frontier.insert(0, (decl, distance + 1));
            }
        }
    }
    None
}

/// Mapping from type parameters to the concrete types bound to them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Substitution {
    pairs: Vec<(DeclId, Type)>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, param: DeclId) -> Option<&Type> {
        self.pairs
            .iter()
            .find(|(p, _)| *p == param)
            .map(|(_, ty)| ty)
    }

    pub fn params(&self) -> Vec<DeclId> {
        self.pairs.iter().map(|(p, _)| *p).collect()
    }

    pub fn types(&self) -> Vec<Type> {
        self.pairs.iter().map(|(_, ty)| ty.clone()).collect()
    }

    /// Binds `param`; identity bindings are skipped.
    pub fn bind(&mut self, param: DeclId, ty: Type) {
        if ty == Type::Parameter(param) {
            return;
        }
        if let Some(slot) = self.pairs.iter_mut().find(|(p, _)| *p == param) {
            slot.1 = ty;
        } else {
            self.pairs.push((param, ty));
        }
    }

    pub fn extend(&mut self, other: &Substitution) {
        for (param, ty) in &other.pairs {
            self.bind(*param, ty.clone());
        }
    }

    /// Substitution binding a generic struct's parameters to `args`.
    pub fn for_struct(ty: &Type, lookup: &dyn SymbolLookup) -> Substitution {
        let mut substitution = Substitution::new();
        if let Type::Struct { decl, args, .. } = ty.base() {
            if let DeclKind::Type(type_decl) = &lookup.declaration(*decl).kind {
                for (param, arg) in type_decl.type_params.iter().zip(args) {
                    substitution.bind(*param, arg.clone());
                }
            }
        }
        substitution
    }
}
