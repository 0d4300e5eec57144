//! Statement bodies and anonymous methods.

use crate::syntax::ast::{
    AnonymousMethod, Block, Expr, ForIteration, Ident, LoopVariable, Statement, TryHandler,
    TypeExpr,
};

use super::super::declaration::{DeclKind, VariableDecl, VariableKind};
use super::super::scope::ScopeKind;
use super::super::types::Type;
use super::UnitBuilder;
use super::types::signature_type;

/// Anonymous methods of `expr` that are not nested in another one.
fn collect_anonymous<'e>(expr: &'e Expr, found: &mut Vec<&'e AnonymousMethod>) {
    match expr {
        Expr::AnonymousMethod(method) => found.push(method),
        Expr::Name { .. } | Expr::Literal { .. } | Expr::Nil { .. } => {}
        Expr::Member { base, .. } => collect_anonymous(base, found),
        Expr::Call { callee, args, .. } => {
            collect_anonymous(callee, found);
            for arg in args {
                collect_anonymous(arg, found);
            }
        }
        Expr::Index { base, indices, .. } => {
            collect_anonymous(base, found);
            for index in indices {
                collect_anonymous(index, found);
            }
        }
        Expr::Deref { operand, .. }
        | Expr::AddressOf { operand, .. }
        | Expr::Unary { operand, .. } => collect_anonymous(operand, found),
        Expr::Inherited { args, .. } => {
            for arg in args.iter().flatten() {
                collect_anonymous(arg, found);
            }
        }
        Expr::Binary { left, right, .. } => {
            collect_anonymous(left, found);
            collect_anonymous(right, found);
        }
        Expr::Set { elements, .. } => {
            for element in elements {
                collect_anonymous(&element.value, found);
                if let Some(upper) = &element.upper {
                    collect_anonymous(upper, found);
                }
            }
        }
        Expr::Paren { inner, .. } => collect_anonymous(inner, found),
    }
}

fn local(subkind: VariableKind, ty: Type) -> DeclKind {
    DeclKind::Variable(VariableDecl {
        subkind,
        ty,
        is_union: false,
        is_absolute: false,
    })
}

impl UnitBuilder<'_> {
    pub(super) fn block(&mut self, block: &Block) {
        self.statements(&block.statements);
    }

    pub(super) fn statements(&mut self, statements: &[Statement]) {
        for statement in statements {
            self.statement(statement);
        }
    }

    fn branch(&mut self, statement: Option<&Statement>) {
        if let Some(statement) = statement {
            self.statement(statement);
        }
    }

    fn statement(&mut self, statement: &Statement) {
        match statement {
            Statement::Compound { statements, range } => {
                self.push_scope(ScopeKind::Local, *range, None);
                self.statements(statements);
                self.pop_scope();
            }
            Statement::Assignment { target, value, .. } => {
                let target = self.expr(target, None);
                self.expr(value, Some(&target));
            }
            Statement::Expression { expr, .. } => {
                self.value(expr, None);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                self.expr(condition, Some(&Type::Boolean));
                self.branch(then_branch.as_deref());
                self.branch(else_branch.as_deref());
            }
            Statement::Case {
                selector,
                arms,
                else_branch,
                range,
            } => {
                self.push_scope(ScopeKind::Local, *range, None);
                let selector = self.expr(selector, None);
                for arm in arms {
                    for label in &arm.labels {
                        self.expr(label, Some(&selector));
                    }
                    self.statement(&arm.body);
                }
                self.statements(else_branch);
                self.pop_scope();
            }
            Statement::For {
                variable,
                iteration,
                body,
                range,
            } => {
                self.push_scope(ScopeKind::Local, *range, None);
                self.for_loop(variable, iteration);
                self.branch(body.as_deref());
                self.pop_scope();
            }
            Statement::While {
                condition, body, ..
            } => {
                self.expr(condition, Some(&Type::Boolean));
                self.branch(body.as_deref());
            }
            Statement::Repeat {
                statements,
                condition,
                ..
            } => {
                self.statements(statements);
                self.expr(condition, Some(&Type::Boolean));
            }
            Statement::With { targets, body, .. } => {
                for target in targets {
                    let ty = self.expr(target, None);
                    let scope = self.push_scope(ScopeKind::With, target.range(), None);
                    self.layer.scope_mut(scope).with_type = Some(ty);
                }
                self.branch(body.as_deref());
                for _ in targets {
                    self.pop_scope();
                }
            }
            Statement::Try {
                statements,
                handler,
                ..
            } => {
                self.statements(statements);
                match handler {
                    TryHandler::Except {
                        handlers,
                        statements,
                        else_branch,
                    } => {
                        for handler in handlers {
                            self.push_scope(ScopeKind::Local, handler.range, None);
                            let ty = self.resolve(|r| r.type_ref(&handler.ty));
                            if let Some(variable) = &handler.variable {
                                self.declare(variable, local(VariableKind::Var, ty));
                            }
                            self.branch(handler.body.as_deref());
                            self.pop_scope();
                        }
                        self.statements(statements);
                        self.statements(else_branch);
                    }
                    TryHandler::Finally { statements } => self.statements(statements),
                }
            }
            Statement::Raise { exception, at, .. } => {
                for expr in [exception, at].into_iter().flatten() {
                    self.expr(expr, None);
                }
            }
            Statement::Goto { label, .. } => self.label(label),
            Statement::Labeled {
                label, statement, ..
            } => {
                self.label(label);
                self.statement(statement);
            }
            Statement::InlineVar {
                names,
                ty,
                value,
                is_const,
                ..
            } => self.inline_variable(names, ty.as_ref(), value.as_ref(), *is_const),
            Statement::Empty { .. } => {}
        }
    }

    fn label(&mut self, label: &Ident) {
        self.resolve(|r| r.label(label));
    }

    fn for_loop(&mut self, variable: &LoopVariable, iteration: &ForIteration) {
        let declared = match variable {
            LoopVariable::Existing { name } => Some(self.resolve(|r| r.loop_variable(name))),
            LoopVariable::Inline { ty: Some(ty), .. } => Some(self.type_of(ty)),
            LoopVariable::Inline { ty: None, .. } => None,
        };
        let inferred = match iteration {
            ForIteration::Range { start, end, .. } => {
                let start = self.expr(start, declared.as_ref());
                self.expr(end, declared.as_ref());
                start
            }
            ForIteration::In { collection } => {
                let collection = self.expr(collection, None);
                self.resolve(|r| r.enumerated_element(&collection))
            }
        };
        if let LoopVariable::Inline { name, .. } = variable {
            let ty = declared.unwrap_or(inferred);
            self.declare(name, local(VariableKind::Inline, ty));
        }
    }

    /// `var X: T := V;` inside a block. The value is resolved before the
    /// names are visible.
    fn inline_variable(&mut self, names: &[Ident], ty: Option<&TypeExpr>, value: Option<&Expr>, is_const: bool) {
        let declared = ty.map(|ty| self.type_of(ty));
        let inferred = value.map(|value| self.expr(value, declared.as_ref()));
        let ty = declared.or(inferred).unwrap_or_default();
        let subkind = if is_const {
            VariableKind::Const
        } else {
            VariableKind::Inline
        };
        for name in names {
            self.declare(name, local(subkind, ty.clone()));
        }
    }

    /// Builds the anonymous methods of `expr` so the resolver can type them
    /// as method references.
    pub(super) fn anonymous_methods(&mut self, expr: &Expr) {
        let mut found = Vec::new();
        collect_anonymous(expr, &mut found);
        for method in found {
            self.anonymous_method(method);
        }
    }

    fn anonymous_method(&mut self, method: &AnonymousMethod) {
        self.push_scope(ScopeKind::Method, method.range, None);
        let params = self.parameters(&method.params);
        let result = method.return_type.as_ref().map(|ty| self.type_of(ty));
        if let Some(ty) = &result {
            self.declare_implicit("Result", local(VariableKind::Result, ty.clone()));
        }
        let ty = signature_type(&params, result, false, true);
        self.anonymous.insert(method.range, ty);
        self.declarations(&method.declarations);
        self.statements(&method.body.statements);
        self.pop_scope();
    }
}
