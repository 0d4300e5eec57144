//! Reader for the Pascal subset the integration suites are written in.
//!
//! Produces the same node set the external parser emits, with 1-based
//! ranges. Malformed input panics with the offending position.

use std::path::Path;

use pasta_core::syntax::ast::*;
use pasta_core::syntax::location::{Position, TextRange};

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Int(i64),
    Real(f64),
    Str(String),
    Sym(&'static str),
    Eof,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    range: TextRange,
}

const SYMBOLS: &[&str] = &[
    ":=", "..", "<>", "<=", ">=", "(", ")", "[", "]", ",", ";", ":", ".", "=", "<", ">", "+", "-",
    "*", "/", "^", "@",
];

const RESERVED: &[&str] = &[
    "and", "array", "as", "begin", "case", "class", "const", "constructor", "destructor", "div",
    "do", "downto", "else", "end", "except", "finalization", "finally", "for", "function", "goto",
    "if", "implementation", "in", "inherited", "initialization", "interface", "is", "label", "mod",
    "nil", "not", "object", "of", "operator", "or", "procedure", "program", "property", "raise",
    "record", "repeat", "resourcestring", "set", "shl", "shr", "then", "threadvar", "to", "try",
    "type", "unit", "until", "uses", "var", "while", "with", "xor", "private", "protected",
    "public", "published", "strict", "automated",
];

const DIRECTIVES: &[(&str, Directive)] = &[
    ("overload", Directive::Overload),
    ("virtual", Directive::Virtual),
    ("dynamic", Directive::Dynamic),
    ("override", Directive::Override),
    ("abstract", Directive::Abstract),
    ("reintroduce", Directive::Reintroduce),
    ("static", Directive::Static),
    ("inline", Directive::Inline),
    ("forward", Directive::Forward),
    ("external", Directive::External),
    ("message", Directive::Message),
    ("final", Directive::Final),
    ("deprecated", Directive::Deprecated),
    ("cdecl", Directive::Cdecl),
    ("stdcall", Directive::Stdcall),
    ("register", Directive::Register),
    ("safecall", Directive::Safecall),
    ("assembler", Directive::Assembler),
];

fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let (mut i, mut line, mut column) = (0usize, 1u32, 1u32);

    macro_rules! advance {
        () => {{
            if chars[i] == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
            i += 1;
        }};
    }

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            advance!();
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                advance!();
            }
            continue;
        }
        if c == '{' {
            while i < chars.len() && chars[i] != '}' {
                advance!();
            }
            advance!();
            continue;
        }
        if c == '(' && chars.get(i + 1) == Some(&'*') {
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == ')') {
                advance!();
            }
            advance!();
            advance!();
            continue;
        }

        let start = Position::new(line, column);
        let tok = if c.is_alphabetic() || c == '_' || c == '&' {
            let mut word = String::new();
            if c == '&' {
                advance!();
            }
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                word.push(chars[i]);
                advance!();
            }
            Tok::Word(word)
        } else if c.is_ascii_digit() {
            let mut digits = String::new();
            while i < chars.len() && chars[i].is_ascii_digit() {
                digits.push(chars[i]);
                advance!();
            }
            let fraction = chars.get(i) == Some(&'.')
                && chars.get(i + 1).is_some_and(|c| c.is_ascii_digit());
            if fraction {
                digits.push('.');
                advance!();
                while i < chars.len() && chars[i].is_ascii_digit() {
                    digits.push(chars[i]);
                    advance!();
                }
                Tok::Real(digits.parse().unwrap())
            } else {
                Tok::Int(digits.parse().unwrap())
            }
        } else if c == '\'' {
            let mut text = String::new();
            advance!();
            loop {
                if chars[i] == '\'' {
                    advance!();
                    if chars.get(i) == Some(&'\'') {
                        text.push('\'');
                        advance!();
                    } else {
                        break;
                    }
                } else {
                    text.push(chars[i]);
                    advance!();
                }
            }
            Tok::Str(text)
        } else {
            let symbol = SYMBOLS
                .iter()
                .find(|s| s.chars().enumerate().all(|(k, sc)| chars.get(i + k) == Some(&sc)))
                .unwrap_or_else(|| panic!("unexpected character {c:?} at {start}"));
            for _ in 0..symbol.len() {
                advance!();
            }
            Tok::Sym(symbol)
        };
        tokens.push(Token {
            tok,
            range: TextRange::new(start, Position::new(line, column)),
        });
    }

    let end = Position::new(line, column);
    tokens.push(Token {
        tok: Tok::Eof,
        range: TextRange::new(end, end),
    });
    tokens
}

pub fn parse(path: &Path, source: &str) -> SyntaxTree {
    let mut parser = Parser {
        tokens: tokenize(source),
        pos: 0,
        last_end: Position::new(1, 1),
    };
    SyntaxTree {
        path: path.to_path_buf(),
        unit: parser.source_unit(),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    last_end: Position,
}

impl Parser {
    // ---- token access ----

    fn peek_at(&self, offset: usize) -> &Tok {
        let index = (self.pos + offset).min(self.tokens.len() - 1);
        &self.tokens[index].tok
    }

    fn start(&self) -> Position {
        self.tokens[self.pos].range.start
    }

    fn since(&self, start: Position) -> TextRange {
        TextRange::new(start, self.last_end)
    }

    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        if token.tok != Tok::Eof {
            self.pos += 1;
            self.last_end = token.range.end;
        }
        token
    }

    fn fail(&self, expected: &str) -> ! {
        let token = &self.tokens[self.pos];
        panic!("expected {expected} at {}, found {:?}", token.range.start, token.tok)
    }

    fn is_kw_at(&self, offset: usize, kw: &str) -> bool {
        matches!(self.peek_at(offset), Tok::Word(w) if w.eq_ignore_ascii_case(kw))
    }

    fn is_kw(&self, kw: &str) -> bool {
        self.is_kw_at(0, kw)
    }

    fn is_any_kw(&self, kws: &[&str]) -> bool {
        kws.iter().any(|kw| self.is_kw(kw))
    }

    fn is_sym_at(&self, offset: usize, sym: &str) -> bool {
        matches!(self.peek_at(offset), Tok::Sym(s) if *s == sym)
    }

    fn is_sym(&self, sym: &str) -> bool {
        self.is_sym_at(0, sym)
    }

    fn eat_kw(&mut self, kw: &str) -> bool {
        let found = self.is_kw(kw);
        if found {
            self.bump();
        }
        found
    }

    fn eat_sym(&mut self, sym: &str) -> bool {
        let found = self.is_sym(sym);
        if found {
            self.bump();
        }
        found
    }

    fn expect_kw(&mut self, kw: &str) {
        if !self.eat_kw(kw) {
            self.fail(kw);
        }
    }

    fn expect_sym(&mut self, sym: &str) {
        if !self.eat_sym(sym) {
            self.fail(sym);
        }
    }

    fn is_name_at(&self, offset: usize) -> bool {
        matches!(self.peek_at(offset), Tok::Word(w)
            if !RESERVED.iter().any(|r| r.eq_ignore_ascii_case(w)))
    }

    fn is_name(&self) -> bool {
        self.is_name_at(0)
    }

    fn ident(&mut self) -> Ident {
        if !matches!(self.peek_at(0), Tok::Word(_) | Tok::Int(_)) {
            self.fail("identifier");
        }
        let token = self.bump();
        match token.tok {
            Tok::Word(name) => Ident::new(name, token.range),
            Tok::Int(value) => Ident::new(value.to_string(), token.range),
            _ => unreachable!(),
        }
    }

    fn ident_list(&mut self) -> Vec<Ident> {
        let mut names = vec![self.ident()];
        while self.eat_sym(",") {
            names.push(self.ident());
        }
        names
    }

    fn dotted_name(&mut self) -> DottedName {
        let start = self.start();
        let mut parts = vec![self.ident()];
        while self.eat_sym(".") {
            parts.push(self.ident());
        }
        DottedName {
            parts,
            range: self.since(start),
        }
    }

    // ---- units ----

    fn source_unit(&mut self) -> SourceUnit {
        let start = self.start();
        let kind = if self.eat_kw("unit") {
            UnitKind::Unit
        } else if self.eat_kw("program") {
            UnitKind::Program
        } else if self.eat_kw("library") {
            UnitKind::Library
        } else if self.eat_kw("package") {
            UnitKind::Package
        } else {
            self.fail("unit header")
        };
        let name = self.dotted_name();
        self.expect_sym(";");

        let mut unit = SourceUnit {
            kind,
            name,
            interface: None,
            implementation: None,
            initialization: None,
            finalization: None,
            main: None,
            range: TextRange::default(),
        };
        if kind == UnitKind::Unit {
            let section_start = self.start();
            self.expect_kw("interface");
            unit.interface = Some(self.section(section_start, true));
            let section_start = self.start();
            self.expect_kw("implementation");
            unit.implementation = Some(self.section(section_start, false));
            if self.is_kw("initialization") {
                let start = self.start();
                self.bump();
                let statements = self.statement_list(&["finalization", "end"]);
                unit.initialization = Some(Block {
                    statements,
                    range: self.since(start),
                });
            }
            if self.is_kw("finalization") {
                let start = self.start();
                self.bump();
                let statements = self.statement_list(&["end"]);
                unit.finalization = Some(Block {
                    statements,
                    range: self.since(start),
                });
            }
            self.expect_kw("end");
        } else {
            let section_start = self.start();
            unit.implementation = Some(self.section(section_start, false));
            unit.main = Some(self.block());
        }
        self.expect_sym(".");
        unit.range = self.since(start);
        unit
    }

    fn section(&mut self, start: Position, interface: bool) -> Section {
        let uses = self.is_kw("uses").then(|| self.uses_clause());
        let declarations = self.decl_sections(interface);
        Section {
            uses,
            declarations,
            range: self.since(start),
        }
    }

    fn uses_clause(&mut self) -> UsesClause {
        let start = self.start();
        self.expect_kw("uses");
        let mut items = Vec::new();
        loop {
            let item_start = self.start();
            let name = self.dotted_name();
            let in_path = if self.eat_kw("in") {
                match self.bump().tok {
                    Tok::Str(path) => Some(path),
                    _ => self.fail("unit path"),
                }
            } else {
                None
            };
            items.push(UsesItem {
                name,
                in_path,
                range: self.since(item_start),
            });
            if !self.eat_sym(",") {
                break;
            }
        }
        self.expect_sym(";");
        UsesClause {
            items,
            range: self.since(start),
        }
    }

    // ---- declarations ----

    fn decl_sections(&mut self, interface: bool) -> Vec<DeclSection> {
        let mut sections = Vec::new();
        loop {
            if self.eat_kw("type") {
                sections.push(DeclSection::Types {
                    types: self.type_declarations(),
                });
            } else if self.eat_kw("const") || self.eat_kw("resourcestring") {
                sections.push(DeclSection::Consts {
                    consts: self.const_declarations(),
                });
            } else if self.eat_kw("var") || self.eat_kw("threadvar") {
                let mut vars = Vec::new();
                while self.is_name() {
                    vars.push(self.var_declaration());
                }
                sections.push(DeclSection::Vars { vars });
            } else if self.eat_kw("label") {
                let labels = self.ident_list();
                self.expect_sym(";");
                sections.push(DeclSection::Labels { labels });
            } else if self.is_routine_start() {
                sections.push(self.routine(interface));
            } else {
                break;
            }
        }
        sections
    }

    fn is_routine_start(&self) -> bool {
        const KINDS: &[&str] = &["procedure", "function", "constructor", "destructor", "operator"];
        self.is_any_kw(KINDS) || (self.is_kw("class") && KINDS.iter().any(|k| self.is_kw_at(1, k)))
    }

    fn is_type_declaration_start(&self) -> bool {
        self.is_name() && (self.is_sym_at(1, "=") || self.is_sym_at(1, "<"))
    }

    fn type_declarations(&mut self) -> Vec<TypeDeclaration> {
        let mut types = Vec::new();
        while self.is_type_declaration_start() {
            let start = self.start();
            let name = self.ident();
            let type_params = if self.is_sym("<") {
                self.type_parameters()
            } else {
                Vec::new()
            };
            self.expect_sym("=");
            let ty = self.type_expr();
            self.expect_sym(";");
            types.push(TypeDeclaration {
                name,
                type_params,
                ty,
                range: self.since(start),
            });
        }
        types
    }

    fn type_parameters(&mut self) -> Vec<TypeParameter> {
        self.expect_sym("<");
        let mut params = Vec::new();
        loop {
            let names = self.ident_list();
            let mut constraints = Vec::new();
            if self.eat_sym(":") {
                loop {
                    let constraint = if self.eat_kw("class") {
                        Constraint::Class
                    } else if self.eat_kw("record") {
                        Constraint::Record
                    } else if self.eat_kw("constructor") {
                        Constraint::Constructor
                    } else {
                        Constraint::Type {
                            ty: self.type_expr(),
                        }
                    };
                    constraints.push(constraint);
                    if !self.eat_sym(",") {
                        break;
                    }
                }
            }
            params.extend(names.into_iter().map(|name| TypeParameter {
                name,
                constraints: constraints.clone(),
            }));
            if !self.eat_sym(";") && !self.eat_sym(",") {
                break;
            }
        }
        self.expect_sym(">");
        params
    }

    fn const_declarations(&mut self) -> Vec<ConstDeclaration> {
        let mut consts = Vec::new();
        while self.is_name() {
            let start = self.start();
            let name = self.ident();
            let ty = self.eat_sym(":").then(|| self.type_expr());
            self.expect_sym("=");
            let value = self.expr();
            self.expect_sym(";");
            consts.push(ConstDeclaration {
                name,
                ty,
                value,
                range: self.since(start),
            });
        }
        consts
    }

    fn var_declaration(&mut self) -> VarDeclaration {
        let start = self.start();
        let names = self.ident_list();
        self.expect_sym(":");
        let ty = self.type_expr();
        let absolute = self.eat_kw("absolute").then(|| self.expr());
        let value = self.eat_sym("=").then(|| self.expr());
        self.expect_sym(";");
        VarDeclaration {
            names,
            ty,
            absolute,
            value,
            range: self.since(start),
        }
    }

    fn routine(&mut self, interface: bool) -> DeclSection {
        let start = self.start();
        let heading = self.routine_heading();
        let external = heading.has_directive(Directive::Forward)
            || heading.has_directive(Directive::External);
        if interface || external {
            return DeclSection::Routine { heading };
        }
        let declarations = self.decl_sections(false);
        let body = self.block();
        self.expect_sym(";");
        DeclSection::RoutineImpl {
            routine: RoutineImplementation {
                heading,
                declarations,
                body,
                range: self.since(start),
            },
        }
    }

    fn routine_kind(&mut self) -> RoutineKind {
        let kind = match self.peek_at(0) {
            Tok::Word(w) => match w.to_lowercase().as_str() {
                "procedure" => RoutineKind::Procedure,
                "function" => RoutineKind::Function,
                "constructor" => RoutineKind::Constructor,
                "destructor" => RoutineKind::Destructor,
                "operator" => RoutineKind::Operator,
                _ => self.fail("routine kind"),
            },
            _ => self.fail("routine kind"),
        };
        self.bump();
        kind
    }

    fn routine_heading(&mut self) -> RoutineHeading {
        let start = self.start();
        let is_class = self.eat_kw("class");
        let kind = self.routine_kind();

        let mut segments = Vec::new();
        loop {
            let ident = self.ident();
            let type_params = if self.is_sym("<") {
                self.type_parameters()
            } else {
                Vec::new()
            };
            segments.push(NameSegment { ident, type_params });
            if !self.eat_sym(".") {
                break;
            }
        }
        let params = self.formal_parameters();
        let return_type = self.eat_sym(":").then(|| self.type_expr());
        self.expect_sym(";");

        let mut directives = Vec::new();
        while let Some(directive) = self.directive() {
            directives.push(directive);
            while !self.is_sym(";") {
                self.bump();
            }
            self.expect_sym(";");
        }
        RoutineHeading {
            kind,
            is_class,
            name: RoutineName { segments },
            params,
            return_type,
            directives,
            range: self.since(start),
        }
    }

    fn directive(&mut self) -> Option<Directive> {
        let Tok::Word(word) = self.peek_at(0) else {
            return None;
        };
        let directive = DIRECTIVES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(word))
            .map(|(_, d)| *d)?;
        self.bump();
        Some(directive)
    }

    fn formal_parameters(&mut self) -> Vec<ParamGroup> {
        let mut groups = Vec::new();
        if !self.eat_sym("(") {
            return groups;
        }
        if self.eat_sym(")") {
            return groups;
        }
        loop {
            let start = self.start();
            let kind = if self.eat_kw("const") {
                ParamKind::Const
            } else if self.eat_kw("var") {
                ParamKind::Var
            } else if self.eat_kw("out") {
                ParamKind::Out
            } else if self.eat_kw("constref") {
                ParamKind::ConstRef
            } else {
                ParamKind::Value
            };
            let names = self.ident_list();
            let ty = self.eat_sym(":").then(|| self.type_expr());
            let default = self.eat_sym("=").then(|| self.expr());
            groups.push(ParamGroup {
                kind,
                names,
                ty,
                default,
                range: self.since(start),
            });
            if !self.eat_sym(";") {
                break;
            }
        }
        self.expect_sym(")");
        groups
    }

    // ---- type expressions ----

    fn type_expr(&mut self) -> TypeExpr {
        let start = self.start();
        if self.is_kw("class") {
            if self.is_kw_at(1, "of") {
                self.bump();
                self.bump();
                let target = Box::new(self.type_expr());
                return TypeExpr::ClassOf {
                    target,
                    range: self.since(start),
                };
            }
            let kind = if self.is_kw_at(1, "helper") {
                StructKind::ClassHelper
            } else {
                StructKind::Class
            };
            return TypeExpr::Struct(self.struct_type(kind));
        }
        if self.is_kw("record") {
            let kind = if self.is_kw_at(1, "helper") {
                StructKind::RecordHelper
            } else {
                StructKind::Record
            };
            return TypeExpr::Struct(self.struct_type(kind));
        }
        if self.is_kw("object") {
            return TypeExpr::Struct(self.struct_type(StructKind::Object));
        }
        if self.is_kw("interface") {
            return TypeExpr::Struct(self.struct_type(StructKind::Interface));
        }
        if self.is_kw("dispinterface") {
            return TypeExpr::Struct(self.struct_type(StructKind::DispInterface));
        }
        if self.eat_sym("(") {
            let mut elements = Vec::new();
            loop {
                let name = self.ident();
                let value = self.eat_sym("=").then(|| self.expr());
                elements.push(EnumElement { name, value });
                if !self.eat_sym(",") {
                    break;
                }
            }
            self.expect_sym(")");
            return TypeExpr::Enum {
                elements,
                range: self.since(start),
            };
        }
        if self.eat_sym("^") {
            let target = Box::new(self.type_expr());
            return TypeExpr::Pointer {
                target,
                range: self.since(start),
            };
        }
        if self.eat_kw("array") {
            let mut indices = Vec::new();
            if self.eat_sym("[") {
                loop {
                    indices.push(self.type_expr());
                    if !self.eat_sym(",") {
                        break;
                    }
                }
                self.expect_sym("]");
            }
            self.expect_kw("of");
            if indices.is_empty() && self.eat_kw("const") {
                return TypeExpr::ArrayOfConst {
                    range: self.since(start),
                };
            }
            let element = Box::new(self.type_expr());
            return TypeExpr::Array {
                indices,
                element,
                range: self.since(start),
            };
        }
        if self.eat_kw("set") {
            self.expect_kw("of");
            let element = Box::new(self.type_expr());
            return TypeExpr::Set {
                element,
                range: self.since(start),
            };
        }
        if self.eat_kw("file") {
            let element = self.eat_kw("of").then(|| Box::new(self.type_expr()));
            return TypeExpr::File {
                element,
                range: self.since(start),
            };
        }
        if self.is_kw("reference") && self.is_kw_at(1, "to") {
            self.bump();
            self.bump();
            return TypeExpr::Procedural(self.procedural_type(start, true));
        }
        if self.is_any_kw(&["procedure", "function"]) {
            return TypeExpr::Procedural(self.procedural_type(start, false));
        }
        if self.eat_kw("type") {
            let target = Box::new(self.type_expr());
            return TypeExpr::StrongAlias {
                target,
                range: self.since(start),
            };
        }
        let subrange = matches!(self.peek_at(0), Tok::Int(_) | Tok::Str(_))
            || self.is_sym("-")
            || (self.is_name() && self.is_sym_at(1, ".."));
        if subrange {
            let low = self.simple_expr();
            self.expect_sym("..");
            let high = self.simple_expr();
            return TypeExpr::Subrange {
                low,
                high,
                range: self.since(start),
            };
        }
        TypeExpr::Named {
            name: self.qualified_ref(),
        }
    }

    fn qualified_ref(&mut self) -> QualifiedRef {
        let start = self.start();
        let mut segments = Vec::new();
        loop {
            let ident = self.ident();
            let type_args = if self.is_sym("<") {
                self.type_arguments()
            } else {
                Vec::new()
            };
            segments.push(NameRef { ident, type_args });
            if !self.eat_sym(".") {
                break;
            }
        }
        QualifiedRef {
            segments,
            range: self.since(start),
        }
    }

    fn type_arguments(&mut self) -> Vec<TypeExpr> {
        self.expect_sym("<");
        let mut args = vec![self.type_expr()];
        while self.eat_sym(",") {
            args.push(self.type_expr());
        }
        self.expect_sym(">");
        args
    }

    fn procedural_type(&mut self, start: Position, reference: bool) -> ProceduralType {
        let kind = self.routine_kind();
        let params = self.formal_parameters();
        let return_type = self.eat_sym(":").then(|| Box::new(self.type_expr()));
        let of_object = self.is_kw("of") && self.is_kw_at(1, "object");
        if of_object {
            self.bump();
            self.bump();
        }
        ProceduralType {
            kind,
            params,
            return_type,
            of_object,
            reference,
            range: self.since(start),
        }
    }

    fn struct_type(&mut self, kind: StructKind) -> StructType {
        let start = self.start();
        self.bump();
        if kind.is_helper() {
            self.expect_kw("helper");
        }
        if self.is_sym(";") && matches!(kind, StructKind::Class | StructKind::Interface | StructKind::DispInterface) {
            return StructType {
                kind,
                forward: true,
                ancestors: Vec::new(),
                helper_for: None,
                sections: Vec::new(),
                variant: None,
                range: self.since(start),
            };
        }

        let mut ancestors = Vec::new();
        if self.eat_sym("(") {
            loop {
                ancestors.push(self.type_expr());
                if !self.eat_sym(",") {
                    break;
                }
            }
            self.expect_sym(")");
        }
        let helper_for = kind.is_helper().then(|| {
            self.expect_kw("for");
            Box::new(self.type_expr())
        });
        if self.eat_sym("[") {
            while !self.eat_sym("]") {
                self.bump();
            }
        }
        // `EError = class(Exception);`
        if self.is_sym(";") {
            return StructType {
                kind,
                forward: false,
                ancestors,
                helper_for,
                sections: Vec::new(),
                variant: None,
                range: self.since(start),
            };
        }

        let mut sections = Vec::new();
        let mut variant = None;
        let mut section: Option<StructSection> = None;
        loop {
            if self.is_kw("end") {
                break;
            }
            let section_start = self.start();
            if let Some(visibility) = self.visibility() {
                sections.extend(section.take());
                section = Some(StructSection {
                    visibility: Some(visibility),
                    members: Vec::new(),
                    range: self.since(section_start),
                });
                continue;
            }
            if self.is_kw("case") {
                variant = Some(Box::new(self.variant_part()));
                break;
            }
            let members = self.members();
            let section = section.get_or_insert_with(|| StructSection {
                visibility: None,
                members: Vec::new(),
                range: TextRange::new(section_start, section_start),
            });
            section.members.extend(members);
            section.range.end = self.last_end;
        }
        sections.extend(section);
        self.expect_kw("end");
        StructType {
            kind,
            forward: false,
            ancestors,
            helper_for,
            sections,
            variant,
            range: self.since(start),
        }
    }

    fn visibility(&mut self) -> Option<Visibility> {
        let strict = self.is_kw("strict");
        let offset = usize::from(strict);
        let visibility = if self.is_kw_at(offset, "private") {
            if strict {
                Visibility::StrictPrivate
            } else {
                Visibility::Private
            }
        } else if self.is_kw_at(offset, "protected") {
            if strict {
                Visibility::StrictProtected
            } else {
                Visibility::Protected
            }
        } else if self.is_kw_at(offset, "public") {
            Visibility::Public
        } else if self.is_kw_at(offset, "published") {
            Visibility::Published
        } else if self.is_kw_at(offset, "automated") {
            Visibility::Automated
        } else {
            return None;
        };
        for _ in 0..=offset {
            self.bump();
        }
        Some(visibility)
    }

    fn members(&mut self) -> Vec<Member> {
        if self.is_kw("class") && self.is_kw_at(1, "var") {
            self.bump();
            self.bump();
            let mut members = Vec::new();
            while self.is_name() {
                let mut field = self.field();
                field.is_class = true;
                members.push(Member::Field { field });
            }
            return members;
        }
        if self.eat_kw("var") {
            let mut members = Vec::new();
            while self.is_name() {
                members.push(Member::Field { field: self.field() });
            }
            return members;
        }
        if self.is_routine_start() {
            let heading = self.routine_heading();
            return vec![Member::Method { heading }];
        }
        if self.is_kw("property") || (self.is_kw("class") && self.is_kw_at(1, "property")) {
            let property = self.property();
            return vec![Member::Property { property }];
        }
        if self.eat_kw("type") {
            let types = self.type_declarations();
            return vec![Member::Types { types }];
        }
        if self.eat_kw("const") {
            let consts = self.const_declarations();
            return vec![Member::Consts { consts }];
        }
        if self.is_name() {
            return vec![Member::Field { field: self.field() }];
        }
        self.fail("member")
    }

    fn field(&mut self) -> FieldDeclaration {
        let start = self.start();
        let names = self.ident_list();
        self.expect_sym(":");
        let ty = self.type_expr();
        let range = self.since(start);
        if !self.is_kw("end") && !self.is_sym(")") {
            self.expect_sym(";");
        }
        FieldDeclaration {
            names,
            ty,
            is_class: false,
            range,
        }
    }

    fn property(&mut self) -> PropertyDeclaration {
        let start = self.start();
        let is_class = self.eat_kw("class");
        self.expect_kw("property");
        let name = self.ident();
        let mut params = Vec::new();
        if self.eat_sym("[") {
            loop {
                let group_start = self.start();
                let kind = if self.eat_kw("const") {
                    ParamKind::Const
                } else {
                    ParamKind::Value
                };
                let names = self.ident_list();
                self.expect_sym(":");
                let ty = Some(self.type_expr());
                params.push(ParamGroup {
                    kind,
                    names,
                    ty,
                    default: None,
                    range: self.since(group_start),
                });
                if !self.eat_sym(";") {
                    break;
                }
            }
            self.expect_sym("]");
        }
        let ty = self.eat_sym(":").then(|| self.type_expr());
        let mut property = PropertyDeclaration {
            name,
            is_class,
            params,
            ty,
            index: None,
            read: None,
            write: None,
            default_value: None,
            is_default: false,
            range: TextRange::default(),
        };
        loop {
            if self.eat_kw("index") {
                property.index = Some(self.expr());
            } else if self.eat_kw("read") {
                property.read = Some(self.qualified_ref());
            } else if self.eat_kw("write") {
                property.write = Some(self.qualified_ref());
            } else if self.eat_kw("default") {
                property.default_value = Some(self.expr());
            } else if self.eat_kw("stored") {
                self.expr();
            } else {
                break;
            }
        }
        property.range = self.since(start);
        self.expect_sym(";");
        if self.is_kw("default") && self.is_sym_at(1, ";") {
            self.bump();
            self.bump();
            property.is_default = true;
        }
        property
    }

    fn variant_part(&mut self) -> VariantPart {
        let start = self.start();
        self.expect_kw("case");
        let tag = (self.is_name() && self.is_sym_at(1, ":")).then(|| {
            let tag = self.ident();
            self.expect_sym(":");
            tag
        });
        let tag_type = self.type_expr();
        self.expect_kw("of");
        let mut arms = Vec::new();
        while !self.is_kw("end") {
            let arm_start = self.start();
            let mut labels = vec![self.expr()];
            while self.eat_sym(",") {
                labels.push(self.expr());
            }
            self.expect_sym(":");
            self.expect_sym("(");
            let mut fields = Vec::new();
            while !self.is_sym(")") {
                fields.push(self.field());
            }
            self.expect_sym(")");
            arms.push(VariantArm {
                labels,
                fields,
                range: self.since(arm_start),
            });
            self.eat_sym(";");
        }
        VariantPart {
            tag,
            tag_type,
            arms,
            range: self.since(start),
        }
    }

    // ---- statements ----

    fn block(&mut self) -> Block {
        let start = self.start();
        self.expect_kw("begin");
        let statements = self.statement_list(&["end"]);
        self.expect_kw("end");
        Block {
            statements,
            range: self.since(start),
        }
    }

    fn statement_list(&mut self, terminators: &[&str]) -> Vec<Statement> {
        let mut statements = Vec::new();
        loop {
            if self.is_any_kw(terminators) || self.peek_at(0) == &Tok::Eof {
                break;
            }
            if let Some(statement) = self.statement() {
                statements.push(statement);
            }
            if !self.eat_sym(";") {
                break;
            }
        }
        statements
    }

    fn boxed_statement(&mut self) -> Option<Box<Statement>> {
        self.statement().map(Box::new)
    }

    fn statement(&mut self) -> Option<Statement> {
        if self.is_sym(";") || self.is_any_kw(&["end", "else", "until", "except", "finally"]) {
            return None;
        }
        let start = self.start();

        let labelled = (self.is_name() || matches!(self.peek_at(0), Tok::Int(_)))
            && self.is_sym_at(1, ":");
        if labelled {
            let label = self.ident();
            self.expect_sym(":");
            let statement = Box::new(self.statement().unwrap_or(Statement::Empty {
                range: TextRange::new(self.last_end, self.last_end),
            }));
            return Some(Statement::Labeled {
                label,
                statement,
                range: self.since(start),
            });
        }

        if self.is_kw("begin") {
            let block = self.block();
            return Some(Statement::Compound {
                statements: block.statements,
                range: block.range,
            });
        }
        if self.eat_kw("if") {
            let condition = self.expr();
            self.expect_kw("then");
            let then_branch = self.boxed_statement();
            let else_branch = if self.eat_kw("else") {
                self.boxed_statement()
            } else {
                None
            };
            return Some(Statement::If {
                condition,
                then_branch,
                else_branch,
                range: self.since(start),
            });
        }
        if self.eat_kw("while") {
            let condition = self.expr();
            self.expect_kw("do");
            let body = self.boxed_statement();
            return Some(Statement::While {
                condition,
                body,
                range: self.since(start),
            });
        }
        if self.eat_kw("repeat") {
            let statements = self.statement_list(&["until"]);
            self.expect_kw("until");
            let condition = self.expr();
            return Some(Statement::Repeat {
                statements,
                condition,
                range: self.since(start),
            });
        }
        if self.eat_kw("for") {
            return Some(self.for_statement(start));
        }
        if self.eat_kw("case") {
            return Some(self.case_statement(start));
        }
        if self.eat_kw("with") {
            let mut targets = vec![self.expr()];
            while self.eat_sym(",") {
                targets.push(self.expr());
            }
            self.expect_kw("do");
            let body = self.boxed_statement();
            return Some(Statement::With {
                targets,
                body,
                range: self.since(start),
            });
        }
        if self.eat_kw("try") {
            return Some(self.try_statement(start));
        }
        if self.eat_kw("raise") {
            let exception = (!self.is_sym(";") && !self.is_kw("end")).then(|| self.expr());
            let at = self.eat_kw("at").then(|| self.expr());
            return Some(Statement::Raise {
                exception,
                at,
                range: self.since(start),
            });
        }
        if self.eat_kw("goto") {
            let label = self.ident();
            return Some(Statement::Goto {
                label,
                range: self.since(start),
            });
        }
        if self.is_kw("var") || self.is_kw("const") {
            let is_const = self.is_kw("const");
            self.bump();
            let names = self.ident_list();
            let ty = self.eat_sym(":").then(|| self.type_expr());
            let value = (self.eat_sym(":=") || self.eat_sym("=")).then(|| self.expr());
            return Some(Statement::InlineVar {
                names,
                ty,
                value,
                is_const,
                range: self.since(start),
            });
        }

        let target = self.expr();
        if self.eat_sym(":=") {
            let value = self.expr();
            return Some(Statement::Assignment {
                target,
                value,
                range: self.since(start),
            });
        }
        Some(Statement::Expression {
            expr: target,
            range: self.since(start),
        })
    }

    fn for_statement(&mut self, start: Position) -> Statement {
        let variable = if self.eat_kw("var") {
            let name = self.ident();
            let ty = self.eat_sym(":").then(|| self.type_expr());
            LoopVariable::Inline { name, ty }
        } else {
            LoopVariable::Existing {
                name: NameRef {
                    ident: self.ident(),
                    type_args: Vec::new(),
                },
            }
        };
        let iteration = if self.eat_kw("in") {
            ForIteration::In {
                collection: self.expr(),
            }
        } else {
            self.expect_sym(":=");
            let start = self.expr();
            let downto = self.eat_kw("downto");
            if !downto {
                self.expect_kw("to");
            }
            let end = self.expr();
            ForIteration::Range { start, end, downto }
        };
        self.expect_kw("do");
        let body = self.boxed_statement();
        Statement::For {
            variable,
            iteration,
            body,
            range: self.since(start),
        }
    }

    fn case_statement(&mut self, start: Position) -> Statement {
        let selector = self.expr();
        self.expect_kw("of");
        let mut arms = Vec::new();
        while !self.is_kw("else") && !self.is_kw("end") {
            let arm_start = self.start();
            let mut labels = vec![self.case_label()];
            while self.eat_sym(",") {
                labels.push(self.case_label());
            }
            self.expect_sym(":");
            let body = self.statement().unwrap_or(Statement::Empty {
                range: TextRange::new(self.last_end, self.last_end),
            });
            arms.push(CaseArm {
                labels,
                body,
                range: self.since(arm_start),
            });
            self.eat_sym(";");
        }
        let else_branch = if self.eat_kw("else") {
            self.statement_list(&["end"])
        } else {
            Vec::new()
        };
        self.expect_kw("end");
        Statement::Case {
            selector,
            arms,
            else_branch,
            range: self.since(start),
        }
    }

    /// `1`, `Red` or a range `1..5`, kept as a set element expression.
    fn case_label(&mut self) -> Expr {
        let start = self.start();
        let value = self.simple_expr();
        if self.eat_sym("..") {
            let upper = self.simple_expr();
            return Expr::Set {
                elements: vec![SetElement {
                    value,
                    upper: Some(upper),
                }],
                range: self.since(start),
            };
        }
        value
    }

    fn try_statement(&mut self, start: Position) -> Statement {
        let statements = self.statement_list(&["except", "finally"]);
        let handler = if self.eat_kw("finally") {
            TryHandler::Finally {
                statements: self.statement_list(&["end"]),
            }
        } else {
            self.expect_kw("except");
            let mut handlers = Vec::new();
            let mut plain = Vec::new();
            if self.is_kw("on") {
                while self.is_kw("on") {
                    let handler_start = self.start();
                    self.bump();
                    let variable = (self.is_name() && self.is_sym_at(1, ":")).then(|| {
                        let name = self.ident();
                        self.expect_sym(":");
                        name
                    });
                    let ty = self.qualified_ref();
                    self.expect_kw("do");
                    let body = self.boxed_statement();
                    handlers.push(ExceptionHandler {
                        variable,
                        ty,
                        body,
                        range: self.since(handler_start),
                    });
                    self.eat_sym(";");
                }
            } else {
                plain = self.statement_list(&["else", "end"]);
            }
            let else_branch = if self.eat_kw("else") {
                self.statement_list(&["end"])
            } else {
                Vec::new()
            };
            TryHandler::Except {
                handlers,
                statements: plain,
                else_branch,
            }
        };
        self.expect_kw("end");
        Statement::Try {
            statements,
            handler,
            range: self.since(start),
        }
    }

    // ---- expressions ----

    fn expr(&mut self) -> Expr {
        let start = self.start();
        let mut left = self.simple_expr();
        loop {
            let op = match self.peek_at(0) {
                Tok::Sym("=") => BinaryOp::Equal,
                Tok::Sym("<>") => BinaryOp::NotEqual,
                Tok::Sym("<") => BinaryOp::Less,
                Tok::Sym("<=") => BinaryOp::LessEqual,
                Tok::Sym(">") => BinaryOp::Greater,
                Tok::Sym(">=") => BinaryOp::GreaterEqual,
                _ if self.is_kw("in") => BinaryOp::In,
                _ if self.is_kw("is") => BinaryOp::Is,
                _ => return left,
            };
            self.bump();
            let right = self.simple_expr();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                range: self.since(start),
            };
        }
    }

    fn simple_expr(&mut self) -> Expr {
        let start = self.start();
        let mut left = self.term();
        loop {
            let op = match self.peek_at(0) {
                Tok::Sym("+") => BinaryOp::Add,
                Tok::Sym("-") => BinaryOp::Subtract,
                _ if self.is_kw("or") => BinaryOp::Or,
                _ if self.is_kw("xor") => BinaryOp::Xor,
                _ => return left,
            };
            self.bump();
            let right = self.term();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                range: self.since(start),
            };
        }
    }

    fn term(&mut self) -> Expr {
        let start = self.start();
        let mut left = self.factor();
        loop {
            let op = match self.peek_at(0) {
                Tok::Sym("*") => BinaryOp::Multiply,
                Tok::Sym("/") => BinaryOp::Divide,
                _ if self.is_kw("div") => BinaryOp::IntDiv,
                _ if self.is_kw("mod") => BinaryOp::Mod,
                _ if self.is_kw("and") => BinaryOp::And,
                _ if self.is_kw("shl") => BinaryOp::Shl,
                _ if self.is_kw("shr") => BinaryOp::Shr,
                _ if self.is_kw("as") => BinaryOp::As,
                _ => return left,
            };
            self.bump();
            let right = self.factor();
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                range: self.since(start),
            };
        }
    }

    fn factor(&mut self) -> Expr {
        let start = self.start();
        let op = if self.eat_kw("not") {
            Some(UnaryOp::Not)
        } else if self.eat_sym("-") {
            Some(UnaryOp::Minus)
        } else if self.eat_sym("+") {
            Some(UnaryOp::Plus)
        } else {
            None
        };
        if let Some(op) = op {
            let operand = Box::new(self.factor());
            return Expr::Unary {
                op,
                operand,
                range: self.since(start),
            };
        }
        if self.eat_sym("@") {
            let operand = Box::new(self.factor());
            return Expr::AddressOf {
                operand,
                range: self.since(start),
            };
        }
        let primary = self.primary();
        self.postfix(start, primary)
    }

    fn postfix(&mut self, start: Position, mut expr: Expr) -> Expr {
        loop {
            if self.eat_sym(".") {
                let name = self.name_ref();
                expr = Expr::Member {
                    base: Box::new(expr),
                    name,
                    range: self.since(start),
                };
            } else if self.is_sym("(") {
                let args = self.arguments();
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    range: self.since(start),
                };
            } else if self.eat_sym("[") {
                let mut indices = vec![self.expr()];
                while self.eat_sym(",") {
                    indices.push(self.expr());
                }
                self.expect_sym("]");
                expr = Expr::Index {
                    base: Box::new(expr),
                    indices,
                    range: self.since(start),
                };
            } else if self.eat_sym("^") {
                expr = Expr::Deref {
                    operand: Box::new(expr),
                    range: self.since(start),
                };
            } else {
                return expr;
            }
        }
    }

    fn arguments(&mut self) -> Vec<Expr> {
        self.expect_sym("(");
        let mut args = Vec::new();
        if self.eat_sym(")") {
            return args;
        }
        loop {
            args.push(self.expr());
            if !self.eat_sym(",") {
                break;
            }
        }
        self.expect_sym(")");
        args
    }

    fn primary(&mut self) -> Expr {
        let start = self.start();
        match self.peek_at(0).clone() {
            Tok::Int(value) => {
                self.bump();
                return Expr::Literal {
                    value: Literal::Integer(value),
                    range: self.since(start),
                };
            }
            Tok::Real(value) => {
                self.bump();
                return Expr::Literal {
                    value: Literal::Real(value),
                    range: self.since(start),
                };
            }
            Tok::Str(text) => {
                self.bump();
                return Expr::Literal {
                    value: Literal::String(text),
                    range: self.since(start),
                };
            }
            _ => {}
        }
        if self.eat_kw("nil") {
            return Expr::Nil {
                range: self.since(start),
            };
        }
        if self.eat_sym("(") {
            let inner = Box::new(self.expr());
            self.expect_sym(")");
            return Expr::Paren {
                inner,
                range: self.since(start),
            };
        }
        if self.eat_sym("[") {
            let mut elements = Vec::new();
            if !self.is_sym("]") {
                loop {
                    let value = self.expr();
                    let upper = self.eat_sym("..").then(|| self.expr());
                    elements.push(SetElement { value, upper });
                    if !self.eat_sym(",") {
                        break;
                    }
                }
            }
            self.expect_sym("]");
            return Expr::Set {
                elements,
                range: self.since(start),
            };
        }
        if self.eat_kw("inherited") {
            let name = self.is_name().then(|| self.name_ref());
            let args = (name.is_some() && self.is_sym("(")).then(|| self.arguments());
            return Expr::Inherited {
                name,
                args,
                range: self.since(start),
            };
        }
        if self.is_any_kw(&["procedure", "function"]) {
            return Expr::AnonymousMethod(Box::new(self.anonymous_method()));
        }
        Expr::Name {
            name: self.name_ref(),
        }
    }

    fn anonymous_method(&mut self) -> AnonymousMethod {
        let start = self.start();
        let kind = self.routine_kind();
        let params = self.formal_parameters();
        let return_type = self.eat_sym(":").then(|| self.type_expr());
        let declarations = self.decl_sections(false);
        let body = self.block();
        AnonymousMethod {
            kind,
            params,
            return_type,
            declarations,
            body,
            range: self.since(start),
        }
    }

    /// A name in expression position. `<` starts type arguments only when
    /// a closed argument list follows that cannot be a comparison.
    fn name_ref(&mut self) -> NameRef {
        let ident = self.ident();
        let mut type_args = Vec::new();
        if self.is_sym("<") {
            let saved = (self.pos, self.last_end);
            match self.speculative_type_arguments() {
                Some(args) => type_args = args,
                None => (self.pos, self.last_end) = saved,
            }
        }
        NameRef { ident, type_args }
    }

    fn speculative_type_arguments(&mut self) -> Option<Vec<TypeExpr>> {
        self.bump();
        let mut args = Vec::new();
        loop {
            args.push(self.speculative_named_type()?);
            if self.eat_sym(">") {
                break;
            }
            if !self.eat_sym(",") {
                return None;
            }
        }
        let follows = ["(", ".", ";", ")", ",", "]", ":="].iter().any(|s| self.is_sym(s))
            || self.is_any_kw(&["end", "else", "then", "do", "of"]);
        follows.then_some(args)
    }

    fn speculative_named_type(&mut self) -> Option<TypeExpr> {
        let start = self.start();
        let mut segments = Vec::new();
        loop {
            if !self.is_name() {
                return None;
            }
            let ident = self.ident();
            let mut type_args = Vec::new();
            if self.is_sym("<") {
                self.bump();
                loop {
                    type_args.push(self.speculative_named_type()?);
                    if self.eat_sym(">") {
                        break;
                    }
                    if !self.eat_sym(",") {
                        return None;
                    }
                }
            }
            segments.push(NameRef { ident, type_args });
            if !(self.is_sym(".") && self.is_name_at(1)) {
                break;
            }
            self.bump();
        }
        Some(TypeExpr::Named {
            name: QualifiedRef {
                segments,
                range: self.since(start),
            },
        })
    }
}
