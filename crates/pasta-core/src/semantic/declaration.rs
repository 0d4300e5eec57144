//! Declaration model.
//!
//! One closed variant per declaration kind, with small capability traits
//! ([`Typed`], [`Invocable`], [`Visible`], [`Generifiable`]) implemented per
//! variant. Identity between declarations is structural and
//! case-insensitive: see [`DeclKey`].

use std::fmt::Write as _;
use std::path::PathBuf;

use crate::syntax::ast::{Directive, ParamKind, RoutineKind, UnitKind};
use crate::syntax::location::TextRange;

pub use crate::syntax::ast::Visibility;

use super::ids::{DeclId, ScopeId, UnitId};
use super::types::{ParamType, ProceduralSignature, Type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub unit: UnitId,
    pub range: TextRange,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub qualified_name: String,
    pub location: Location,
    /// Scope the declaration was registered in.
    pub scope: ScopeId,
    /// Declaring type for members.
    pub owner: Option<DeclId>,
    pub visibility: Visibility,
    pub is_forward: bool,
    pub is_implementation: bool,
    pub kind: DeclKind,
    /// Set on specializations.
    pub generic_origin: Option<DeclId>,
}

#[derive(Debug, Clone)]
pub enum DeclKind {
    Unit(UnitDecl),
    Import(ImportDecl),
    Type(TypeDecl),
    TypeParameter(TypeParameterDecl),
    Routine(RoutineDecl),
    Property(PropertyDecl),
    Variable(VariableDecl),
    EnumElement(EnumElementDecl),
    Label,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclTag {
    Unit,
    Import,
    Type,
    TypeParameter,
    Routine,
    Property,
    Variable,
    EnumElement,
    Label,
}

#[derive(Debug, Clone)]
pub struct UnitDecl {
    pub unit: UnitId,
    pub unit_kind: UnitKind,
    pub namespace: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ImportDecl {
    /// `None` when the imported unit is not part of the project.
    pub target: Option<UnitId>,
    pub in_implementation: bool,
}

#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub ty: Type,
    pub type_params: Vec<DeclId>,
    /// Member scope of structured and enumerated types.
    pub body: Option<ScopeId>,
    pub ancestors: Vec<Type>,
    pub helper_for: Option<Type>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Class,
    Record,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct TypeParameterDecl {
    pub index: usize,
    pub constraint_kinds: Vec<ConstraintKind>,
    /// Type constraints in declaration order.
    pub constraints: Vec<Type>,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub ty: Type,
    pub has_default: bool,
}

#[derive(Debug, Clone)]
pub struct RoutineDecl {
    pub routine_kind: RoutineKind,
    pub params: Vec<Parameter>,
    pub return_type: Option<Type>,
    pub directives: Vec<Directive>,
    pub is_class: bool,
    /// False for routines that cannot be named in an expression, such as
    /// class operators and class constructors.
    pub is_callable: bool,
    pub type_params: Vec<DeclId>,
    /// Scope holding the parameters of the declaring heading.
    pub signature_scope: Option<ScopeId>,
    pub intrinsic: Option<Intrinsic>,
}

impl RoutineDecl {
    pub fn has_directive(&self, directive: Directive) -> bool {
        self.directives.contains(&directive)
    }

    pub fn is_overload(&self) -> bool {
        self.has_directive(Directive::Overload) || self.intrinsic.is_some()
    }

    pub fn is_inline(&self) -> bool {
        self.has_directive(Directive::Inline)
    }

    pub fn procedural_type(&self, of_object: bool) -> Type {
        Type::Procedural(Box::new(ProceduralSignature {
            params: self
                .params
                .iter()
                .map(|p| ParamType {
                    kind: p.kind,
                    ty: p.ty.clone(),
                    has_default: p.has_default,
                })
                .collect(),
            result: self.return_type.clone(),
            of_object,
            reference: false,
        }))
    }
}

/// Compiler intrinsics that accept any arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intrinsic {
    Length,
    High,
    Low,
    SizeOf,
    Ord,
    Chr,
    Inc,
    Dec,
    Assigned,
    Exit,
    Break,
    Continue,
    Write,
    WriteLn,
    ReadLn,
    New,
    Dispose,
    FreeAndNil,
    Copy,
    Pos,
    SetLength,
    Include,
    Exclude,
    Succ,
    Pred,
    Trunc,
    Round,
    Abs,
    Default,
    TypeInfo,
    Assert,
    Halt,
}

#[derive(Debug, Clone)]
pub struct PropertyDecl {
    pub ty: Type,
    pub params: Vec<Parameter>,
    pub read: Option<DeclId>,
    pub write: Option<DeclId>,
    pub is_default: bool,
    pub is_class: bool,
    /// The inherited property this one narrows.
    pub redeclares: Option<DeclId>,
    pub signature_scope: Option<ScopeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableKind {
    Var,
    Const,
    Field,
    ClassVar,
    Parameter(ParamKind),
    SelfRef,
    Result,
    Inline,
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub subkind: VariableKind,
    pub ty: Type,
    /// Field of a variant record part.
    pub is_union: bool,
    pub is_absolute: bool,
}

#[derive(Debug, Clone)]
pub struct EnumElementDecl {
    pub ty: Type,
    pub ordinal: i64,
}

impl Declaration {
    /// A public, non-member declaration.
    pub fn new(
        name: impl Into<String>,
        qualified_name: impl Into<String>,
        location: Location,
        scope: ScopeId,
        kind: DeclKind,
    ) -> Self {
        Self {
            name: name.into(),
            qualified_name: qualified_name.into(),
            location,
            scope,
            owner: None,
            visibility: Visibility::Public,
            is_forward: false,
            is_implementation: false,
            kind,
            generic_origin: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &str {
        &self.qualified_name
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn kind(&self) -> &DeclKind {
        &self.kind
    }

    pub fn tag(&self) -> DeclTag {
        self.kind.tag()
    }

    pub fn is_forward(&self) -> bool {
        self.is_forward
    }

    pub fn is_implementation_declaration(&self) -> bool {
        self.is_implementation
    }

    pub fn is_specialized_declaration(&self) -> bool {
        self.generic_origin.is_some()
    }

    pub fn generic_declaration(&self) -> Option<DeclId> {
        self.generic_origin
    }

    pub fn as_routine(&self) -> Option<&RoutineDecl> {
        match &self.kind {
            DeclKind::Routine(routine) => Some(routine),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeDecl> {
        match &self.kind {
            DeclKind::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn as_property(&self) -> Option<&PropertyDecl> {
        match &self.kind {
            DeclKind::Property(property) => Some(property),
            _ => None,
        }
    }

    pub fn invocable(&self) -> Option<&dyn Invocable> {
        match &self.kind {
            DeclKind::Routine(routine) => Some(routine),
            DeclKind::Property(property) if !property.params.is_empty() => Some(property),
            _ => None,
        }
    }

    pub fn generifiable(&self) -> Option<&dyn Generifiable> {
        match &self.kind {
            DeclKind::Routine(routine) => Some(routine),
            DeclKind::Type(ty) => Some(ty),
            _ => None,
        }
    }

    pub fn is_routine(&self) -> bool {
        matches!(self.kind, DeclKind::Routine(_))
    }

    /// Overloaded routines keep the candidate search going into outer scopes.
    pub fn is_overload(&self) -> bool {
        self.as_routine().is_some_and(RoutineDecl::is_overload)
    }

    pub fn type_parameter_count(&self) -> usize {
        self.generifiable().map_or(0, |g| g.type_parameters().len())
    }

    /// Structural identity key.
    pub fn key(&self) -> DeclKey {
        let mut signature = String::new();
        match &self.kind {
            DeclKind::Routine(routine) => {
                for param in &routine.params {
                    let _ = write!(signature, "{:?}:{:?};", param.kind, param.ty);
                }
                let _ = write!(
                    signature,
                    "->{:?}|{:?}|{}|{}",
                    routine.return_type,
                    routine.directives,
                    routine.is_class,
                    routine.type_params.len()
                );
            }
            DeclKind::Property(property) => {
                for param in &property.params {
                    let _ = write!(signature, "{:?};", param.ty);
                }
                let _ = write!(signature, "->{:?}", property.ty);
            }
            DeclKind::Type(ty) => {
                let _ = write!(signature, "<{}>", ty.type_params.len());
            }
            _ => {}
        }
        DeclKey {
            name: self.qualified_name.to_lowercase(),
            tag: self.tag(),
            signature,
        }
    }
}

impl DeclKind {
    pub fn tag(&self) -> DeclTag {
        match self {
            DeclKind::Unit(_) => DeclTag::Unit,
            DeclKind::Import(_) => DeclTag::Import,
            DeclKind::Type(_) => DeclTag::Type,
            DeclKind::TypeParameter(_) => DeclTag::TypeParameter,
            DeclKind::Routine(_) => DeclTag::Routine,
            DeclKind::Property(_) => DeclTag::Property,
            DeclKind::Variable(_) => DeclTag::Variable,
            DeclKind::EnumElement(_) => DeclTag::EnumElement,
            DeclKind::Label => DeclTag::Label,
        }
    }
}

/// Lower-cased qualified name, kind and signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeclKey {
    pub name: String,
    pub tag: DeclTag,
    pub signature: String,
}

pub trait Typed {
    fn ty(&self) -> Type;
}

pub trait Invocable {
    fn parameters(&self) -> &[Parameter];

    fn return_type(&self) -> Option<&Type>;

    fn is_callable(&self) -> bool;

    fn is_class_invocable(&self) -> bool;

    fn required_parameter_count(&self) -> usize {
        self.parameters()
            .iter()
            .take_while(|p| !p.has_default)
            .count()
    }
}

pub trait Visible {
    fn visibility(&self) -> Visibility;
}

pub trait Generifiable {
    fn type_parameters(&self) -> &[DeclId];

    fn is_generic(&self) -> bool {
        !self.type_parameters().is_empty()
    }
}

impl Typed for TypeDecl {
    fn ty(&self) -> Type {
        self.ty.clone()
    }
}

impl Typed for RoutineDecl {
    fn ty(&self) -> Type {
        self.return_type.clone().unwrap_or(Type::Void)
    }
}

impl Typed for PropertyDecl {
    fn ty(&self) -> Type {
        self.ty.clone()
    }
}

impl Typed for VariableDecl {
    fn ty(&self) -> Type {
        self.ty.clone()
    }
}

impl Typed for EnumElementDecl {
    fn ty(&self) -> Type {
        self.ty.clone()
    }
}

impl Typed for Declaration {
    fn ty(&self) -> Type {
        match &self.kind {
            DeclKind::Type(t) => t.ty(),
            DeclKind::Routine(r) => r.ty(),
            DeclKind::Property(p) => p.ty(),
            DeclKind::Variable(v) => v.ty(),
            DeclKind::EnumElement(e) => e.ty(),
            DeclKind::TypeParameter(_) => Type::Unknown,
            DeclKind::Unit(_) | DeclKind::Import(_) | DeclKind::Label => Type::Unknown,
        }
    }
}

impl Invocable for RoutineDecl {
    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn return_type(&self) -> Option<&Type> {
        self.return_type.as_ref()
    }

    fn is_callable(&self) -> bool {
        self.is_callable
    }

    fn is_class_invocable(&self) -> bool {
        self.is_class || self.routine_kind == RoutineKind::Constructor
    }
}

impl Invocable for PropertyDecl {
    fn parameters(&self) -> &[Parameter] {
        &self.params
    }

    fn return_type(&self) -> Option<&Type> {
        Some(&self.ty)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn is_class_invocable(&self) -> bool {
        self.is_class
    }
}

impl Visible for Declaration {
    fn visibility(&self) -> Visibility {
        self.visibility
    }
}

impl Generifiable for RoutineDecl {
    fn type_parameters(&self) -> &[DeclId] {
        &self.type_params
    }
}

impl Generifiable for TypeDecl {
    fn type_parameters(&self) -> &[DeclId] {
        &self.type_params
    }
}
