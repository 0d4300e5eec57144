//! The System unit.
//!
//! Every unit implicitly sees System, which is searched last. A project may
//! supply its own System source; it then receives the compiler-predeclared
//! types and intrinsic routines in its interface scope. Otherwise a synthetic
//! System carrying the runtime root types is used.

use std::path::PathBuf;

use crate::syntax::ast::{Directive, ParamKind, RoutineKind, StructKind, UnitKind, Visibility};
use crate::syntax::location::TextRange;

use super::declaration::{
    DeclKind, Declaration, Intrinsic, Location, Parameter, PropertyDecl, RoutineDecl, TypeDecl,
    UnitDecl, VariableDecl, VariableKind,
};
use super::ids::{DeclId, Layer, ScopeId, UnitId};
use super::layer::SymbolLayer;
use super::scope::ScopeKind;
use super::types::{CharKind, IntegerKind, RealKind, StringKind, Type};

pub const SYSTEM_UNIT_NAME: &str = "System";

pub fn is_system_name(name: &str) -> bool {
    name.eq_ignore_ascii_case(SYSTEM_UNIT_NAME)
}

const PRIMITIVES: &[(&str, Type)] = &[
    ("ShortInt", Type::Integer(IntegerKind::ShortInt)),
    ("SmallInt", Type::Integer(IntegerKind::SmallInt)),
    ("Integer", Type::Integer(IntegerKind::Integer)),
    ("LongInt", Type::Integer(IntegerKind::Integer)),
    ("Int64", Type::Integer(IntegerKind::Int64)),
    ("Byte", Type::Integer(IntegerKind::Byte)),
    ("Word", Type::Integer(IntegerKind::Word)),
    ("Cardinal", Type::Integer(IntegerKind::Cardinal)),
    ("LongWord", Type::Integer(IntegerKind::Cardinal)),
    ("UInt64", Type::Integer(IntegerKind::UInt64)),
    ("NativeInt", Type::Integer(IntegerKind::NativeInt)),
    ("NativeUInt", Type::Integer(IntegerKind::NativeUInt)),
    ("HRESULT", Type::Integer(IntegerKind::Integer)),
    ("THandle", Type::Integer(IntegerKind::NativeUInt)),
    ("Single", Type::Real(RealKind::Single)),
    ("Double", Type::Real(RealKind::Double)),
    ("Real", Type::Real(RealKind::Double)),
    ("Extended", Type::Real(RealKind::Extended)),
    ("Currency", Type::Real(RealKind::Currency)),
    ("Comp", Type::Real(RealKind::Comp)),
    ("TDateTime", Type::Real(RealKind::Double)),
    ("Boolean", Type::Boolean),
    ("ByteBool", Type::Boolean),
    ("WordBool", Type::Boolean),
    ("LongBool", Type::Boolean),
    ("Char", Type::Char(CharKind::Wide)),
    ("WideChar", Type::Char(CharKind::Wide)),
    ("AnsiChar", Type::Char(CharKind::Ansi)),
    ("string", Type::String(StringKind::Unicode)),
    ("UnicodeString", Type::String(StringKind::Unicode)),
    ("WideString", Type::String(StringKind::Wide)),
    ("AnsiString", Type::String(StringKind::Ansi)),
    ("ShortString", Type::String(StringKind::Short)),
    ("Pointer", Type::Pointer(None)),
    ("Variant", Type::Variant),
    ("OleVariant", Type::Variant),
    ("Text", Type::File),
    ("TextFile", Type::File),
];

const INTRINSICS: &[(&str, Intrinsic, RoutineKind)] = &[
    ("Length", Intrinsic::Length, RoutineKind::Function),
    ("High", Intrinsic::High, RoutineKind::Function),
    ("Low", Intrinsic::Low, RoutineKind::Function),
    ("SizeOf", Intrinsic::SizeOf, RoutineKind::Function),
    ("Ord", Intrinsic::Ord, RoutineKind::Function),
    ("Chr", Intrinsic::Chr, RoutineKind::Function),
    ("Inc", Intrinsic::Inc, RoutineKind::Procedure),
    ("Dec", Intrinsic::Dec, RoutineKind::Procedure),
    ("Assigned", Intrinsic::Assigned, RoutineKind::Function),
    ("Exit", Intrinsic::Exit, RoutineKind::Procedure),
    ("Break", Intrinsic::Break, RoutineKind::Procedure),
    ("Continue", Intrinsic::Continue, RoutineKind::Procedure),
    ("Write", Intrinsic::Write, RoutineKind::Procedure),
    ("WriteLn", Intrinsic::WriteLn, RoutineKind::Procedure),
    ("ReadLn", Intrinsic::ReadLn, RoutineKind::Procedure),
    ("New", Intrinsic::New, RoutineKind::Procedure),
    ("Dispose", Intrinsic::Dispose, RoutineKind::Procedure),
    ("FreeAndNil", Intrinsic::FreeAndNil, RoutineKind::Procedure),
    ("Copy", Intrinsic::Copy, RoutineKind::Function),
    ("Pos", Intrinsic::Pos, RoutineKind::Function),
    ("SetLength", Intrinsic::SetLength, RoutineKind::Procedure),
    ("Include", Intrinsic::Include, RoutineKind::Procedure),
    ("Exclude", Intrinsic::Exclude, RoutineKind::Procedure),
    ("Succ", Intrinsic::Succ, RoutineKind::Function),
    ("Pred", Intrinsic::Pred, RoutineKind::Function),
    ("Trunc", Intrinsic::Trunc, RoutineKind::Function),
    ("Round", Intrinsic::Round, RoutineKind::Function),
    ("Abs", Intrinsic::Abs, RoutineKind::Function),
    ("Default", Intrinsic::Default, RoutineKind::Function),
    ("TypeInfo", Intrinsic::TypeInfo, RoutineKind::Function),
    ("Assert", Intrinsic::Assert, RoutineKind::Procedure),
    ("Halt", Intrinsic::Halt, RoutineKind::Procedure),
];

/// Builds the interface layer of a System unit that has no source.
pub fn synthetic_system(unit: UnitId) -> SymbolLayer {
    let mut layer = SymbolLayer::new(unit, Layer::Interface);
    let root = layer.create_scope(ScopeKind::Global, None, TextRange::default());
    let unit_decl = layer.declare(Declaration::new(
        SYSTEM_UNIT_NAME,
        SYSTEM_UNIT_NAME,
        location(unit),
        root,
        DeclKind::Unit(UnitDecl {
            unit,
            unit_kind: UnitKind::Unit,
            namespace: String::new(),
            path: PathBuf::new(),
        }),
    ));
    layer.scope_mut(root).owner = Some(unit_decl);
    populate(&mut layer, root, true);
    layer
}

/// Declares the predeclared types, constants and intrinsic routines in
/// `root`. Runtime root types (`TObject` and friends) are only added for the
/// synthetic System; a real System source declares its own.
pub fn populate(layer: &mut SymbolLayer, root: ScopeId, runtime_types: bool) {
    let mut system = SystemScope { layer, root };
    for (name, ty) in PRIMITIVES {
        system.type_alias(name, ty.clone());
    }
    let pchar = Type::pointer_to(Type::Char(CharKind::Wide));
    system.type_alias("PChar", pchar.clone());
    system.type_alias("PWideChar", pchar);
    system.type_alias("PAnsiChar", Type::pointer_to(Type::Char(CharKind::Ansi)));
    system.constant("True", Type::Boolean);
    system.constant("False", Type::Boolean);
    system.constant("MaxInt", Type::Integer(IntegerKind::Integer));
    for (name, intrinsic, kind) in INTRINSICS {
        system.intrinsic(name, *intrinsic, *kind);
    }
    if runtime_types {
        system.runtime_types();
    }
}

fn location(unit: UnitId) -> Location {
    Location {
        unit,
        range: TextRange::default(),
    }
}

struct SystemScope<'a> {
    layer: &'a mut SymbolLayer,
    root: ScopeId,
}

impl SystemScope<'_> {
    fn qualified(name: &str) -> String {
        format!("{SYSTEM_UNIT_NAME}.{name}")
    }

    fn declare_in(&mut self, scope: ScopeId, name: &str, owner: Option<DeclId>, kind: DeclKind) -> DeclId {
        let qualified = match owner {
            Some(owner) => format!("{}.{name}", self.layer.declaration(owner).qualified_name),
            None => Self::qualified(name),
        };
        let mut decl = Declaration::new(name, qualified, location(self.layer.unit()), scope, kind);
        decl.owner = owner;
        self.layer.declare(decl)
    }

    fn type_alias(&mut self, name: &str, ty: Type) -> DeclId {
        self.declare_in(
            self.root,
            name,
            None,
            DeclKind::Type(TypeDecl {
                ty,
                type_params: Vec::new(),
                body: None,
                ancestors: Vec::new(),
                helper_for: None,
            }),
        )
    }

    fn constant(&mut self, name: &str, ty: Type) {
        self.declare_in(
            self.root,
            name,
            None,
            DeclKind::Variable(VariableDecl {
                subkind: VariableKind::Const,
                ty,
                is_union: false,
                is_absolute: false,
            }),
        );
    }

    fn intrinsic(&mut self, name: &str, intrinsic: Intrinsic, kind: RoutineKind) {
        self.declare_in(
            self.root,
            name,
            None,
            DeclKind::Routine(RoutineDecl {
                routine_kind: kind,
                params: Vec::new(),
                return_type: None,
                directives: vec![Directive::Overload],
                is_class: false,
                is_callable: true,
                type_params: Vec::new(),
                signature_scope: None,
                intrinsic: Some(intrinsic),
            }),
        );
    }

    /// Declares a struct type with an empty body scope.
    fn structure(&mut self, name: &str, kind: StructKind, ancestors: Vec<Type>) -> (DeclId, Type) {
        let body = self
            .layer
            .create_scope(ScopeKind::Type, Some(self.root), TextRange::default());
        let id = self.layer.next_declaration_id();
        let ty = Type::Struct {
            decl: id,
            kind,
            args: Vec::new(),
        };
        let declared = self.declare_in(
            self.root,
            name,
            None,
            DeclKind::Type(TypeDecl {
                ty: ty.clone(),
                type_params: Vec::new(),
                body: Some(body),
                ancestors,
                helper_for: None,
            }),
        );
        debug_assert_eq!(declared, id);
        self.layer.scope_mut(body).owner = Some(id);
        (id, ty)
    }

    fn body(&self, owner: DeclId) -> ScopeId {
        match &self.layer.declaration(owner).kind {
            DeclKind::Type(TypeDecl { body: Some(body), .. }) => *body,
            _ => unreachable!("system structs always have a body"),
        }
    }

    fn method(
        &mut self,
        owner: DeclId,
        name: &str,
        kind: RoutineKind,
        params: Vec<Parameter>,
        return_type: Option<Type>,
        is_class: bool,
        directives: Vec<Directive>,
    ) {
        let body = self.body(owner);
        self.declare_in(
            body,
            name,
            Some(owner),
            DeclKind::Routine(RoutineDecl {
                routine_kind: kind,
                params,
                return_type,
                directives,
                is_class,
                is_callable: true,
                type_params: Vec::new(),
                signature_scope: None,
                intrinsic: None,
            }),
        );
    }

    fn field(&mut self, owner: DeclId, name: &str, ty: Type, visibility: Visibility) -> DeclId {
        let body = self.body(owner);
        let id = self.declare_in(
            body,
            name,
            Some(owner),
            DeclKind::Variable(VariableDecl {
                subkind: VariableKind::Field,
                ty,
                is_union: false,
                is_absolute: false,
            }),
        );
        self.layer.declaration_mut(id).visibility = visibility;
        id
    }

    fn runtime_types(&mut self) {
        let string = Type::String(StringKind::Unicode);
        let integer = Type::Integer(IntegerKind::Integer);

        let (tobject, tobject_ty) = self.structure("TObject", StructKind::Class, Vec::new());
        let tclass_ty = Type::ClassReference(Box::new(tobject_ty.clone()));
        self.type_alias("TClass", tclass_ty.clone());

        let virtual_ = vec![Directive::Virtual];
        self.method(tobject, "Create", RoutineKind::Constructor, Vec::new(), None, false, Vec::new());
        self.method(tobject, "Destroy", RoutineKind::Destructor, Vec::new(), None, false, virtual_.clone());
        self.method(tobject, "Free", RoutineKind::Procedure, Vec::new(), None, false, Vec::new());
        self.method(tobject, "ClassName", RoutineKind::Function, Vec::new(), Some(string.clone()), true, Vec::new());
        self.method(tobject, "ClassType", RoutineKind::Function, Vec::new(), Some(tclass_ty.clone()), false, Vec::new());
        self.method(
            tobject,
            "InheritsFrom",
            RoutineKind::Function,
            vec![param("AClass", ParamKind::Value, tclass_ty)],
            Some(Type::Boolean),
            true,
            Vec::new(),
        );
        self.method(tobject, "AfterConstruction", RoutineKind::Procedure, Vec::new(), None, false, virtual_.clone());
        self.method(tobject, "BeforeDestruction", RoutineKind::Procedure, Vec::new(), None, false, virtual_.clone());
        self.method(
            tobject,
            "Equals",
            RoutineKind::Function,
            vec![param("Obj", ParamKind::Value, tobject_ty.clone())],
            Some(Type::Boolean),
            false,
            virtual_.clone(),
        );
        self.method(tobject, "GetHashCode", RoutineKind::Function, Vec::new(), Some(integer.clone()), false, virtual_.clone());
        self.method(tobject, "ToString", RoutineKind::Function, Vec::new(), Some(string), false, virtual_);

        let (tguid, tguid_ty) = self.structure("TGUID", StructKind::Record, Vec::new());
        self.field(tguid, "D1", Type::Integer(IntegerKind::Cardinal), Visibility::Public);
        self.field(tguid, "D2", Type::Integer(IntegerKind::Word), Visibility::Public);
        self.field(tguid, "D3", Type::Integer(IntegerKind::Word), Visibility::Public);

        let (iinterface, iinterface_ty) = self.structure("IInterface", StructKind::Interface, Vec::new());
        self.method(
            iinterface,
            "QueryInterface",
            RoutineKind::Function,
            vec![
                param("IID", ParamKind::Const, tguid_ty),
                param("Obj", ParamKind::Out, Type::Untyped),
            ],
            Some(integer.clone()),
            false,
            Vec::new(),
        );
        self.method(iinterface, "_AddRef", RoutineKind::Function, Vec::new(), Some(integer.clone()), false, Vec::new());
        self.method(iinterface, "_Release", RoutineKind::Function, Vec::new(), Some(integer.clone()), false, Vec::new());
        self.type_alias("IUnknown", iinterface_ty.clone());

        let (interfaced, _) = self.structure(
            "TInterfacedObject",
            StructKind::Class,
            vec![tobject_ty, iinterface_ty],
        );
        let ref_count = self.field(interfaced, "FRefCount", integer.clone(), Visibility::Protected);
        let body = self.body(interfaced);
        self.declare_in(
            body,
            "RefCount",
            Some(interfaced),
            DeclKind::Property(PropertyDecl {
                ty: integer,
                params: Vec::new(),
                read: Some(ref_count),
                write: None,
                is_default: false,
                is_class: false,
                redeclares: None,
                signature_scope: None,
            }),
        );
    }
}

fn param(name: &str, kind: ParamKind, ty: Type) -> Parameter {
    Parameter {
        name: name.into(),
        kind,
        ty,
        has_default: false,
    }
}
