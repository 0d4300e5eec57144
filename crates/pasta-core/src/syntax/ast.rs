//! Closed node set of the Object Pascal syntax tree.
//!
//! Trees are produced by an external parser and consumed read-only here.
//! Every node carries its [`TextRange`]; resolved information is never
//! written back into nodes but kept in side tables keyed by position.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::location::TextRange;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    pub path: PathBuf,
    pub unit: SourceUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ident {
    pub name: String,
    pub range: TextRange,
}

impl Ident {
    pub fn new(name: impl Into<String>, range: TextRange) -> Self {
        Self {
            name: name.into(),
            range,
        }
    }
}

/// A dotted identifier such as a unit name `System.Classes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DottedName {
    pub parts: Vec<Ident>,
    pub range: TextRange,
}

impl DottedName {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty() || self.parts.iter().any(|p| p.name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Unit,
    Program,
    Library,
    Package,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub kind: UnitKind,
    pub name: DottedName,
    pub interface: Option<Section>,
    pub implementation: Option<Section>,
    pub initialization: Option<Block>,
    pub finalization: Option<Block>,
    /// Main block of a program or library.
    pub main: Option<Block>,
    pub range: TextRange,
}

impl SourceUnit {
    pub fn uses(&self) -> impl Iterator<Item = &UsesItem> {
        self.interface
            .iter()
            .chain(self.implementation.iter())
            .filter_map(|s| s.uses.as_ref())
            .flat_map(|u| u.items.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub uses: Option<UsesClause>,
    pub declarations: Vec<DeclSection>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsesClause {
    pub items: Vec<UsesItem>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsesItem {
    pub name: DottedName,
    pub in_path: Option<String>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum DeclSection {
    Types { types: Vec<TypeDeclaration> },
    Consts { consts: Vec<ConstDeclaration> },
    Vars { vars: Vec<VarDeclaration> },
    Labels { labels: Vec<Ident> },
    Routine { heading: RoutineHeading },
    RoutineImpl { routine: RoutineImplementation },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDeclaration {
    pub name: Ident,
    pub type_params: Vec<TypeParameter>,
    pub ty: TypeExpr,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: Ident,
    pub constraints: Vec<Constraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Constraint {
    Class,
    Record,
    Constructor,
    Type { ty: TypeExpr },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstDeclaration {
    pub name: Ident,
    pub ty: Option<TypeExpr>,
    pub value: Expr,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDeclaration {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    pub absolute: Option<Expr>,
    pub value: Option<Expr>,
    pub range: TextRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Procedure,
    Function,
    Constructor,
    Destructor,
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Directive {
    Overload,
    Virtual,
    Dynamic,
    Override,
    Abstract,
    Reintroduce,
    Static,
    Inline,
    Forward,
    External,
    Message,
    Final,
    Deprecated,
    Cdecl,
    Stdcall,
    Register,
    Safecall,
    Assembler,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineHeading {
    pub kind: RoutineKind,
    pub is_class: bool,
    pub name: RoutineName,
    pub params: Vec<ParamGroup>,
    pub return_type: Option<TypeExpr>,
    pub directives: Vec<Directive>,
    pub range: TextRange,
}

impl RoutineHeading {
    pub fn has_directive(&self, directive: Directive) -> bool {
        self.directives.contains(&directive)
    }
}

/// Routine name, qualified by owner types in implementations (`TList<T>.Add`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineName {
    pub segments: Vec<NameSegment>,
}

impl RoutineName {
    pub fn last(&self) -> &NameSegment {
        self.segments
            .last()
            .unwrap_or_else(|| panic!("routine name without segments"))
    }

    pub fn owners(&self) -> &[NameSegment] {
        &self.segments[..self.segments.len().saturating_sub(1)]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameSegment {
    pub ident: Ident,
    pub type_params: Vec<TypeParameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Value,
    Const,
    Var,
    Out,
    ConstRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub kind: ParamKind,
    pub names: Vec<Ident>,
    /// `None` for untyped `var`/`const` parameters.
    pub ty: Option<TypeExpr>,
    pub default: Option<Expr>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineImplementation {
    pub heading: RoutineHeading,
    pub declarations: Vec<DeclSection>,
    pub body: Block,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub range: TextRange,
}

/// A possibly dotted reference to a declaration: `Classes.TList<Integer>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualifiedRef {
    pub segments: Vec<NameRef>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRef {
    pub ident: Ident,
    pub type_args: Vec<TypeExpr>,
}

impl NameRef {
    pub fn name(&self) -> &str {
        &self.ident.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TypeExpr {
    Named {
        name: QualifiedRef,
    },
    Pointer {
        target: Box<TypeExpr>,
        range: TextRange,
    },
    /// `array[...] of T`; no index types means a dynamic array.
    Array {
        indices: Vec<TypeExpr>,
        element: Box<TypeExpr>,
        range: TextRange,
    },
    ArrayOfConst {
        range: TextRange,
    },
    Set {
        element: Box<TypeExpr>,
        range: TextRange,
    },
    File {
        element: Option<Box<TypeExpr>>,
        range: TextRange,
    },
    Subrange {
        low: Expr,
        high: Expr,
        range: TextRange,
    },
    Enum {
        elements: Vec<EnumElement>,
        range: TextRange,
    },
    ClassOf {
        target: Box<TypeExpr>,
        range: TextRange,
    },
    Procedural(ProceduralType),
    Struct(StructType),
    StrongAlias {
        target: Box<TypeExpr>,
        range: TextRange,
    },
}

impl TypeExpr {
    pub fn range(&self) -> TextRange {
        match self {
            TypeExpr::Named { name } => name.range,
            TypeExpr::Pointer { range, .. }
            | TypeExpr::Array { range, .. }
            | TypeExpr::ArrayOfConst { range }
            | TypeExpr::Set { range, .. }
            | TypeExpr::File { range, .. }
            | TypeExpr::Subrange { range, .. }
            | TypeExpr::Enum { range, .. }
            | TypeExpr::ClassOf { range, .. }
            | TypeExpr::StrongAlias { range, .. } => *range,
            TypeExpr::Procedural(p) => p.range,
            TypeExpr::Struct(s) => s.range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumElement {
    pub name: Ident,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProceduralType {
    pub kind: RoutineKind,
    pub params: Vec<ParamGroup>,
    pub return_type: Option<Box<TypeExpr>>,
    pub of_object: bool,
    pub reference: bool,
    pub range: TextRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructKind {
    Class,
    Record,
    Object,
    Interface,
    DispInterface,
    ClassHelper,
    RecordHelper,
}

impl StructKind {
    pub fn is_helper(self) -> bool {
        matches!(self, StructKind::ClassHelper | StructKind::RecordHelper)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructType {
    pub kind: StructKind,
    /// `TFoo = class;`
    pub forward: bool,
    pub ancestors: Vec<TypeExpr>,
    pub helper_for: Option<Box<TypeExpr>>,
    pub sections: Vec<StructSection>,
    pub variant: Option<Box<VariantPart>>,
    pub range: TextRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    StrictPrivate,
    Private,
    StrictProtected,
    Protected,
    Public,
    Published,
    Automated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructSection {
    /// `None` for members preceding any visibility specifier.
    pub visibility: Option<Visibility>,
    pub members: Vec<Member>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Member {
    Field { field: FieldDeclaration },
    Method { heading: RoutineHeading },
    Property { property: PropertyDeclaration },
    Types { types: Vec<TypeDeclaration> },
    Consts { consts: Vec<ConstDeclaration> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub names: Vec<Ident>,
    pub ty: TypeExpr,
    /// `class var`
    pub is_class: bool,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPart {
    pub tag: Option<Ident>,
    pub tag_type: TypeExpr,
    pub arms: Vec<VariantArm>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantArm {
    pub labels: Vec<Expr>,
    pub fields: Vec<FieldDeclaration>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDeclaration {
    pub name: Ident,
    pub is_class: bool,
    pub params: Vec<ParamGroup>,
    /// Absent when the property redeclares an inherited one.
    pub ty: Option<TypeExpr>,
    pub index: Option<Expr>,
    pub read: Option<QualifiedRef>,
    pub write: Option<QualifiedRef>,
    pub default_value: Option<Expr>,
    pub is_default: bool,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Statement {
    Compound {
        statements: Vec<Statement>,
        range: TextRange,
    },
    Assignment {
        target: Expr,
        value: Expr,
        range: TextRange,
    },
    Expression {
        expr: Expr,
        range: TextRange,
    },
    If {
        condition: Expr,
        then_branch: Option<Box<Statement>>,
        else_branch: Option<Box<Statement>>,
        range: TextRange,
    },
    Case {
        selector: Expr,
        arms: Vec<CaseArm>,
        else_branch: Vec<Statement>,
        range: TextRange,
    },
    For {
        variable: LoopVariable,
        iteration: ForIteration,
        body: Option<Box<Statement>>,
        range: TextRange,
    },
    While {
        condition: Expr,
        body: Option<Box<Statement>>,
        range: TextRange,
    },
    Repeat {
        statements: Vec<Statement>,
        condition: Expr,
        range: TextRange,
    },
    With {
        targets: Vec<Expr>,
        body: Option<Box<Statement>>,
        range: TextRange,
    },
    Try {
        statements: Vec<Statement>,
        handler: TryHandler,
        range: TextRange,
    },
    Raise {
        exception: Option<Expr>,
        at: Option<Expr>,
        range: TextRange,
    },
    Goto {
        label: Ident,
        range: TextRange,
    },
    Labeled {
        label: Ident,
        statement: Box<Statement>,
        range: TextRange,
    },
    InlineVar {
        names: Vec<Ident>,
        ty: Option<TypeExpr>,
        value: Option<Expr>,
        is_const: bool,
        range: TextRange,
    },
    Empty {
        range: TextRange,
    },
}

impl Statement {
    pub fn range(&self) -> TextRange {
        match self {
            Statement::Compound { range, .. }
            | Statement::Assignment { range, .. }
            | Statement::Expression { range, .. }
            | Statement::If { range, .. }
            | Statement::Case { range, .. }
            | Statement::For { range, .. }
            | Statement::While { range, .. }
            | Statement::Repeat { range, .. }
            | Statement::With { range, .. }
            | Statement::Try { range, .. }
            | Statement::Raise { range, .. }
            | Statement::Goto { range, .. }
            | Statement::Labeled { range, .. }
            | Statement::InlineVar { range, .. }
            | Statement::Empty { range } => *range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseArm {
    pub labels: Vec<Expr>,
    pub body: Statement,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum LoopVariable {
    Existing {
        name: NameRef,
    },
    Inline {
        name: Ident,
        ty: Option<TypeExpr>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum ForIteration {
    Range {
        start: Expr,
        end: Expr,
        downto: bool,
    },
    In {
        collection: Expr,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum TryHandler {
    Except {
        handlers: Vec<ExceptionHandler>,
        /// Statements of an `except` block without `on` handlers.
        statements: Vec<Statement>,
        else_branch: Vec<Statement>,
    },
    Finally {
        statements: Vec<Statement>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    pub variable: Option<Ident>,
    pub ty: QualifiedRef,
    pub body: Option<Box<Statement>>,
    pub range: TextRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Integer(i64),
    Real(f64),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Minus,
    Plus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDiv,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    In,
    Is,
    As,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::Less
                | BinaryOp::LessEqual
                | BinaryOp::Greater
                | BinaryOp::GreaterEqual
                | BinaryOp::In
                | BinaryOp::Is
        )
    }

    /// Name of the `class operator` overloading this operator.
    pub fn operator_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "Add",
            BinaryOp::Subtract => "Subtract",
            BinaryOp::Multiply => "Multiply",
            BinaryOp::Divide => "Divide",
            BinaryOp::IntDiv => "IntDivide",
            BinaryOp::Mod => "Modulus",
            BinaryOp::And => "BitwiseAnd",
            BinaryOp::Or => "BitwiseOr",
            BinaryOp::Xor => "BitwiseXor",
            BinaryOp::Shl => "LeftShift",
            BinaryOp::Shr => "RightShift",
            BinaryOp::Equal => "Equal",
            BinaryOp::NotEqual => "NotEqual",
            BinaryOp::Less => "LessThan",
            BinaryOp::LessEqual => "LessThanOrEqual",
            BinaryOp::Greater => "GreaterThan",
            BinaryOp::GreaterEqual => "GreaterThanOrEqual",
            BinaryOp::In => "In",
            BinaryOp::Is => "Is",
            BinaryOp::As => "As",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetElement {
    pub value: Expr,
    pub upper: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Expr {
    Name {
        name: NameRef,
    },
    Member {
        base: Box<Expr>,
        name: NameRef,
        range: TextRange,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        range: TextRange,
    },
    Index {
        base: Box<Expr>,
        indices: Vec<Expr>,
        range: TextRange,
    },
    Deref {
        operand: Box<Expr>,
        range: TextRange,
    },
    AddressOf {
        operand: Box<Expr>,
        range: TextRange,
    },
    /// `inherited`, `inherited Foo` or `inherited Foo(args)`.
    Inherited {
        name: Option<NameRef>,
        args: Option<Vec<Expr>>,
        range: TextRange,
    },
    Literal {
        value: Literal,
        range: TextRange,
    },
    Nil {
        range: TextRange,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        range: TextRange,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        range: TextRange,
    },
    Set {
        elements: Vec<SetElement>,
        range: TextRange,
    },
    AnonymousMethod(Box<AnonymousMethod>),
    Paren {
        inner: Box<Expr>,
        range: TextRange,
    },
}

impl Expr {
    pub fn range(&self) -> TextRange {
        match self {
            Expr::Name { name } => name.ident.range,
            Expr::Member { range, .. }
            | Expr::Call { range, .. }
            | Expr::Index { range, .. }
            | Expr::Deref { range, .. }
            | Expr::AddressOf { range, .. }
            | Expr::Inherited { range, .. }
            | Expr::Literal { range, .. }
            | Expr::Nil { range }
            | Expr::Unary { range, .. }
            | Expr::Binary { range, .. }
            | Expr::Set { range, .. }
            | Expr::Paren { range, .. } => *range,
            Expr::AnonymousMethod(method) => method.range,
        }
    }

    /// Strips redundant parentheses.
    pub fn unparen(&self) -> &Expr {
        match self {
            Expr::Paren { inner, .. } => inner.unparen(),
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymousMethod {
    pub kind: RoutineKind,
    pub params: Vec<ParamGroup>,
    pub return_type: Option<TypeExpr>,
    pub declarations: Vec<DeclSection>,
    pub body: Block,
    pub range: TextRange,
}
