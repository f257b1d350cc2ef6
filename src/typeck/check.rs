use crate::diagnostics::Diagnostics;
use crate::parser::ast::*;
use crate::pretty::expr_to_string;
use crate::select::normalize::{StmtChecker, normalize_select};
use crate::span::Spanned;

use super::env::TypeEnv;
use super::types::{Assignability, Type, assignability};
use super::type_of;

pub(crate) struct Checker<'d> {
    pub(crate) env: TypeEnv,
    pub(crate) locals: Locals,
    pub(crate) diags: &'d mut Diagnostics,
    /// Number of enclosing `for`/`select` statements.
    breakable_depth: usize,
}

impl<'d> Checker<'d> {
    pub(crate) fn new(env: TypeEnv, diags: &'d mut Diagnostics) -> Self {
        Self { env, locals: Locals::default(), diags, breakable_depth: 0 }
    }

    pub(crate) fn check_function(&mut self, func: &mut Function, param_types: Vec<Type>) {
        self.env.reset_scopes();
        self.locals = Locals::default();
        self.breakable_depth = 0;

        for (param, ty) in func.params.iter_mut().zip(param_types) {
            if param.name.node != "_" && self.env.defined_in_current_scope(&param.name.node) {
                self.diags.type_error(param.name.span, format!("duplicate argument {}", param.name.node));
            }
            let var = self.locals.declare(param.name.node.clone(), ty, LocalKind::Param);
            if param.name.node != "_" {
                self.env.define(param.name.node.clone(), var);
            }
            param.var = Some(var);
        }

        // Parameters and the top-level body share a scope.
        let mut body = std::mem::take(&mut func.body);
        self.check_stmts(&mut body);
        func.body = body;
        func.locals = std::mem::take(&mut self.locals);
    }

    pub(crate) fn check_stmts(&mut self, stmts: &mut [Spanned<Stmt>]) {
        for stmt in stmts.iter_mut() {
            self.check_stmt(stmt);
        }
    }

    fn check_block(&mut self, stmts: &mut [Spanned<Stmt>]) {
        self.env.push_scope();
        self.check_stmts(stmts);
        self.env.pop_scope();
    }

    fn declare(&mut self, name: &Spanned<String>, ty: Type) -> VarId {
        if name.node != "_" && self.env.defined_in_current_scope(&name.node) {
            self.diags.type_error(name.span, format!("{} redeclared in this block", name.node));
        }
        let var = self.locals.declare(name.node.clone(), ty, LocalKind::User);
        if name.node != "_" {
            self.env.define(name.node.clone(), var);
        }
        var
    }

    pub(crate) fn check_stmt(&mut self, stmt: &mut Spanned<Stmt>) {
        let span = stmt.span;
        if matches!(stmt.node, Stmt::Assign { .. }) {
            let node = std::mem::replace(&mut stmt.node, Stmt::Break);
            stmt.node = into_recv2(node);
        }

        match &mut stmt.node {
            Stmt::Var { name, ty, value, var } => {
                let declared = ty.as_ref().map(|t| super::resolve::resolve_type(t, self.diags));
                let value_ty = value.as_mut().map(|v| self.check_expr(v));
                let var_ty = match (declared, value_ty) {
                    (Some(declared), Some(value_ty)) => {
                        if let Some(v) = value.as_mut() {
                            self.coerce(v, &value_ty, &declared, "variable declaration");
                        }
                        declared
                    }
                    (Some(declared), None) => declared,
                    (None, Some(Type::Nil)) => {
                        self.diags.type_error(span, "use of untyped nil in variable declaration");
                        Type::Invalid
                    }
                    (None, Some(value_ty)) => value_ty,
                    (None, None) => Type::Invalid,
                };
                *var = Some(self.declare(name, var_ty));
            }
            Stmt::Assign { lhs, rhs, define } => {
                let rhs_tys: Vec<Type> = rhs.iter_mut().map(|e| self.check_expr(e)).collect();
                if lhs.len() != rhs.len() {
                    self.diags.type_error(
                        span,
                        format!("assignment mismatch: {} variables but {} values", lhs.len(), rhs.len()),
                    );
                    return;
                }
                if *define {
                    let mut fresh = 0;
                    for (target, ty) in lhs.iter_mut().zip(rhs_tys.iter()) {
                        if self.bind_define(target, ty) {
                            fresh += 1;
                        }
                    }
                    if fresh == 0 {
                        self.diags.type_error(span, "no new variables on left side of :=");
                    }
                } else {
                    for ((target, value), ty) in lhs.iter_mut().zip(rhs.iter_mut()).zip(rhs_tys.iter()) {
                        match self.assign_target(target) {
                            Some(target_ty) => self.coerce(value, ty, &target_ty, "assignment"),
                            None if *ty == Type::Nil => {
                                self.diags.type_error(value.span, "use of untyped nil in assignment");
                            }
                            None => {}
                        }
                    }
                }
            }
            Stmt::AssignRecv2 { value, ok, recv, define } => {
                let elem = self.check_expr(recv);
                if *define {
                    let fresh_value = self.bind_define(value, &elem);
                    let fresh_ok = self.bind_define(ok, &Type::Bool);
                    if !fresh_value && !fresh_ok {
                        self.diags.type_error(span, "no new variables on left side of :=");
                    }
                } else {
                    if let Some(target_ty) = self.assign_target(value) {
                        self.check_assignable(value, &elem, &target_ty);
                    }
                    if let Some(target_ty) = self.assign_target(ok) {
                        self.check_assignable(ok, &Type::Bool, &target_ty);
                    }
                }
            }
            Stmt::Send { channel, value } => {
                let chan_ty = self.check_expr(channel);
                let value_ty = self.check_expr(value);
                match chan_ty.chan_elem() {
                    Some((dir, elem)) => {
                        if !dir.can_send() {
                            self.diags.type_error(
                                span,
                                format!(
                                    "invalid operation: cannot send to receive-only channel {} (type {chan_ty})",
                                    expr_to_string(&channel.node)
                                ),
                            );
                        }
                        let elem = elem.clone();
                        self.coerce(value, &value_ty, &elem, "send");
                    }
                    None if chan_ty.is_invalid() => {}
                    None => {
                        self.diags.type_error(
                            span,
                            format!(
                                "invalid operation: cannot send to non-channel {} (type {chan_ty})",
                                expr_to_string(&channel.node)
                            ),
                        );
                    }
                }
            }
            Stmt::Expr(expr) => {
                let ty = self.check_expr(expr);
                let used = matches!(expr.node, Expr::Call { .. } | Expr::Recv(_) | Expr::Runtime { .. });
                if !used && !ty.is_invalid() {
                    self.diags.type_error(span, format!("{} is not used", expr_to_string(&expr.node)));
                }
            }
            Stmt::If { cond, then_body, else_body } => {
                let ty = self.check_expr(cond);
                if !ty.is_invalid() && ty != Type::Bool {
                    self.diags.type_error(
                        cond.span,
                        format!("non-boolean condition in if statement (type {ty})"),
                    );
                }
                self.check_block(then_body);
                self.check_block(else_body);
            }
            Stmt::For { cond, body } => {
                if let Some(cond) = cond {
                    let ty = self.check_expr(cond);
                    if !ty.is_invalid() && ty != Type::Bool {
                        self.diags.type_error(
                            cond.span,
                            format!("non-boolean condition in for statement (type {ty})"),
                        );
                    }
                }
                self.breakable_depth += 1;
                self.check_block(body);
                self.breakable_depth -= 1;
            }
            Stmt::Break => {
                if self.breakable_depth == 0 {
                    self.diags.type_error(span, "break is not in a loop or select");
                }
            }
            Stmt::Select(sel) => {
                let clauses = std::mem::take(&mut sel.clauses);
                self.breakable_depth += 1;
                let construct = normalize_select(self, clauses, span);
                self.breakable_depth -= 1;
                stmt.node = Stmt::CheckedSelect(construct);
            }
            // Compiler-produced forms are already checked.
            Stmt::Decl { .. } | Stmt::CheckedSelect(_) | Stmt::Breakable(_) | Stmt::VarKill(_) => {}
        }
    }

    /// Bind one `:=` target. Returns whether a new variable was declared.
    fn bind_define(&mut self, target: &mut Spanned<Expr>, ty: &Type) -> bool {
        match &mut target.node {
            Expr::Blank => false,
            Expr::Ident(ident) if self.env.defined_in_current_scope(&ident.name) => {
                let var = self.env.lookup(&ident.name);
                ident.var = var;
                if let Some(var) = var {
                    let declared = self.locals.ty(var);
                    if assignability(ty, &declared) == Assignability::No {
                        self.diags.type_error(
                            target.span,
                            format!("cannot assign {ty} to {} (type {declared})", ident.name),
                        );
                    }
                }
                false
            }
            Expr::Ident(ident) => {
                let ty = if *ty == Type::Nil {
                    self.diags.type_error(target.span, "use of untyped nil in assignment");
                    Type::Invalid
                } else {
                    ty.clone()
                };
                let name = Spanned::new(ident.name.clone(), target.span);
                ident.var = Some(self.declare(&name, ty));
                true
            }
            other => {
                self.diags.type_error(
                    target.span,
                    format!("non-name {} on left side of :=", expr_to_string(other)),
                );
                false
            }
        }
    }

    /// Type of an assignment destination, or `None` for the blank placeholder.
    fn assign_target(&mut self, target: &mut Spanned<Expr>) -> Option<Type> {
        match &target.node {
            Expr::Blank => None,
            Expr::Ident(_) => Some(self.check_expr(target)),
            other => {
                self.diags.type_error(target.span, format!("cannot assign to {}", expr_to_string(other)));
                Some(Type::Invalid)
            }
        }
    }

    fn check_assignable(&mut self, target: &Spanned<Expr>, from: &Type, to: &Type) {
        if assignability(from, to) == Assignability::No {
            self.diags.type_error(
                target.span,
                format!(
                    "cannot assign {from} to {} (type {to}) in assignment",
                    expr_to_string(&target.node)
                ),
            );
        }
    }
}

/// `v, ok = <-c` is its own statement form.
fn into_recv2(stmt: Stmt) -> Stmt {
    match stmt {
        Stmt::Assign { lhs, mut rhs, define }
            if lhs.len() == 2 && rhs.len() == 1 && matches!(rhs[0].node, Expr::Recv(_)) =>
        {
            match (<[Spanned<Expr>; 2]>::try_from(lhs), rhs.pop()) {
                (Ok([value, ok]), Some(recv)) => Stmt::AssignRecv2 { value, ok, recv, define },
                (Ok(lhs), None) => Stmt::Assign { lhs: lhs.into(), rhs, define },
                (Err(lhs), recv) => {
                    rhs.extend(recv);
                    Stmt::Assign { lhs, rhs, define }
                }
            }
        }
        other => other,
    }
}

impl StmtChecker for Checker<'_> {
    fn check_stmt(&mut self, stmt: &mut Spanned<Stmt>) {
        Checker::check_stmt(self, stmt);
    }

    fn check_stmts(&mut self, stmts: &mut [Spanned<Stmt>]) {
        Checker::check_stmts(self, stmts);
    }

    fn check_guard(&mut self, guard: &mut Spanned<Stmt>) {
        match &mut guard.node {
            // The normalizer decides which bare expressions are acceptable.
            Stmt::Expr(expr) => {
                self.check_expr(expr);
            }
            _ => Checker::check_stmt(self, guard),
        }
    }

    fn enter_scope(&mut self) {
        self.env.push_scope();
    }

    fn exit_scope(&mut self) {
        self.env.pop_scope();
    }

    fn type_of(&self, expr: &Expr) -> Type {
        type_of(expr, &self.locals)
    }

    fn diagnostics(&mut self) -> &mut Diagnostics {
        self.diags
    }
}
