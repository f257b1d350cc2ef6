//! AST visitor infrastructure
//!
//! - `Visitor` walks the tree by shared reference (analysis passes)
//! - `VisitMut` walks it by mutable reference (in-place rewriting passes)
//!
//! Override only the methods you need and call the matching `walk_*`
//! function to continue the default recursion. Omitting the walk call prunes
//! traversal at that node.

use crate::parser::ast::*;
use crate::select::{Case, CaseKind, SelectConstruct};
use crate::span::Spanned;

// ============================================================================
// Visitor Trait (Read-Only)
// ============================================================================

pub trait Visitor: Sized {
    fn visit_program(&mut self, program: &Program) {
        walk_program(self, program);
    }

    fn visit_function(&mut self, func: &Spanned<Function>) {
        walk_function(self, func);
    }

    fn visit_block(&mut self, stmts: &[Spanned<Stmt>]) {
        walk_block(self, stmts);
    }

    fn visit_stmt(&mut self, stmt: &Spanned<Stmt>) {
        walk_stmt(self, stmt);
    }

    fn visit_select(&mut self, select: &SelectConstruct) {
        walk_select(self, select);
    }

    fn visit_case(&mut self, case: &Case) {
        walk_case(self, case);
    }

    fn visit_expr(&mut self, expr: &Spanned<Expr>) {
        walk_expr(self, expr);
    }
}

pub fn walk_program<V: Visitor>(v: &mut V, program: &Program) {
    for func in &program.functions {
        v.visit_function(func);
    }
}

pub fn walk_function<V: Visitor>(v: &mut V, func: &Spanned<Function>) {
    v.visit_block(&func.node.body);
}

pub fn walk_block<V: Visitor>(v: &mut V, stmts: &[Spanned<Stmt>]) {
    for stmt in stmts {
        v.visit_stmt(stmt);
    }
}

pub fn walk_stmt<V: Visitor>(v: &mut V, stmt: &Spanned<Stmt>) {
    match &stmt.node {
        Stmt::Var { value, .. } => {
            if let Some(value) = value {
                v.visit_expr(value);
            }
        }
        Stmt::Decl { init, .. } => {
            if let DeclInit::Value(value) = init {
                v.visit_expr(value);
            }
        }
        Stmt::Assign { lhs, rhs, .. } => {
            for e in lhs.iter().chain(rhs.iter()) {
                v.visit_expr(e);
            }
        }
        Stmt::AssignRecv2 { value, ok, recv, .. } => {
            v.visit_expr(value);
            v.visit_expr(ok);
            v.visit_expr(recv);
        }
        Stmt::Send { channel, value } => {
            v.visit_expr(channel);
            v.visit_expr(value);
        }
        Stmt::Expr(expr) => v.visit_expr(expr),
        Stmt::If { cond, then_body, else_body } => {
            v.visit_expr(cond);
            v.visit_block(then_body);
            v.visit_block(else_body);
        }
        Stmt::For { cond, body } => {
            if let Some(cond) = cond {
                v.visit_expr(cond);
            }
            v.visit_block(body);
        }
        Stmt::Select(sel) => {
            for clause in &sel.clauses {
                v.visit_block(&clause.guards);
                v.visit_block(&clause.body);
            }
        }
        Stmt::CheckedSelect(select) => v.visit_select(select),
        Stmt::Breakable(body) => v.visit_block(body),
        Stmt::Break | Stmt::VarKill(_) => {}
    }
}

pub fn walk_select<V: Visitor>(v: &mut V, select: &SelectConstruct) {
    v.visit_block(&select.init);
    for case in &select.cases {
        v.visit_case(case);
    }
}

pub fn walk_case<V: Visitor>(v: &mut V, case: &Case) {
    v.visit_block(&case.init);
    match &case.kind {
        CaseKind::Send { channel, value } => {
            v.visit_expr(channel);
            v.visit_expr(value);
        }
        CaseKind::Recv { target, channel, .. } => {
            v.visit_expr(target);
            v.visit_expr(channel);
        }
        CaseKind::RecvOk { target, ok, channel, .. } => {
            v.visit_expr(target);
            v.visit_expr(ok);
            v.visit_expr(channel);
        }
        CaseKind::Default => {}
    }
    v.visit_block(&case.body);
}

pub fn walk_expr<V: Visitor>(v: &mut V, expr: &Spanned<Expr>) {
    match &expr.node {
        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::Nil | Expr::Ident(_) | Expr::Blank => {}
        Expr::Call { args, .. } | Expr::Runtime { args, .. } => {
            for arg in args {
                v.visit_expr(arg);
            }
        }
        Expr::Recv(inner) | Expr::AddrOf(inner) => v.visit_expr(inner),
        Expr::Unary { operand, .. } => v.visit_expr(operand),
        Expr::Binary { lhs, rhs, .. } => {
            v.visit_expr(lhs);
            v.visit_expr(rhs);
        }
        Expr::Conv { expr: inner, .. } | Expr::ConvNop { expr: inner, .. } => v.visit_expr(inner),
        Expr::Index { base, .. } | Expr::Field { base, .. } => v.visit_expr(base),
    }
}

// ============================================================================
// VisitMut Trait (Mutable)
// ============================================================================

pub trait VisitMut: Sized {
    fn visit_program_mut(&mut self, program: &mut Program) {
        walk_program_mut(self, program);
    }

    fn visit_function_mut(&mut self, func: &mut Spanned<Function>) {
        walk_function_mut(self, func);
    }

    fn visit_block_mut(&mut self, stmts: &mut Vec<Spanned<Stmt>>) {
        walk_block_mut(self, stmts);
    }

    fn visit_stmt_mut(&mut self, stmt: &mut Spanned<Stmt>) {
        walk_stmt_mut(self, stmt);
    }

    fn visit_case_mut(&mut self, case: &mut Case) {
        walk_case_mut(self, case);
    }

    fn visit_expr_mut(&mut self, expr: &mut Spanned<Expr>) {
        walk_expr_mut(self, expr);
    }
}

pub fn walk_program_mut<V: VisitMut>(v: &mut V, program: &mut Program) {
    for func in &mut program.functions {
        v.visit_function_mut(func);
    }
}

pub fn walk_function_mut<V: VisitMut>(v: &mut V, func: &mut Spanned<Function>) {
    v.visit_block_mut(&mut func.node.body);
}

pub fn walk_block_mut<V: VisitMut>(v: &mut V, stmts: &mut Vec<Spanned<Stmt>>) {
    for stmt in stmts.iter_mut() {
        v.visit_stmt_mut(stmt);
    }
}

pub fn walk_stmt_mut<V: VisitMut>(v: &mut V, stmt: &mut Spanned<Stmt>) {
    match &mut stmt.node {
        Stmt::Var { value, .. } => {
            if let Some(value) = value {
                v.visit_expr_mut(value);
            }
        }
        Stmt::Decl { init, .. } => {
            if let DeclInit::Value(value) = init {
                v.visit_expr_mut(value);
            }
        }
        Stmt::Assign { lhs, rhs, .. } => {
            for e in lhs.iter_mut().chain(rhs.iter_mut()) {
                v.visit_expr_mut(e);
            }
        }
        Stmt::AssignRecv2 { value, ok, recv, .. } => {
            v.visit_expr_mut(value);
            v.visit_expr_mut(ok);
            v.visit_expr_mut(recv);
        }
        Stmt::Send { channel, value } => {
            v.visit_expr_mut(channel);
            v.visit_expr_mut(value);
        }
        Stmt::Expr(expr) => v.visit_expr_mut(expr),
        Stmt::If { cond, then_body, else_body } => {
            v.visit_expr_mut(cond);
            v.visit_block_mut(then_body);
            v.visit_block_mut(else_body);
        }
        Stmt::For { cond, body } => {
            if let Some(cond) = cond {
                v.visit_expr_mut(cond);
            }
            v.visit_block_mut(body);
        }
        Stmt::Select(sel) => {
            for clause in &mut sel.clauses {
                v.visit_block_mut(&mut clause.guards);
                v.visit_block_mut(&mut clause.body);
            }
        }
        Stmt::CheckedSelect(select) => {
            v.visit_block_mut(&mut select.init);
            for case in &mut select.cases {
                v.visit_case_mut(case);
            }
        }
        Stmt::Breakable(body) => v.visit_block_mut(body),
        Stmt::Break | Stmt::VarKill(_) => {}
    }
}

pub fn walk_case_mut<V: VisitMut>(v: &mut V, case: &mut Case) {
    v.visit_block_mut(&mut case.init);
    match &mut case.kind {
        CaseKind::Send { channel, value } => {
            v.visit_expr_mut(channel);
            v.visit_expr_mut(value);
        }
        CaseKind::Recv { target, channel, .. } => {
            v.visit_expr_mut(target);
            v.visit_expr_mut(channel);
        }
        CaseKind::RecvOk { target, ok, channel, .. } => {
            v.visit_expr_mut(target);
            v.visit_expr_mut(ok);
            v.visit_expr_mut(channel);
        }
        CaseKind::Default => {}
    }
    v.visit_block_mut(&mut case.body);
}

pub fn walk_expr_mut<V: VisitMut>(v: &mut V, expr: &mut Spanned<Expr>) {
    match &mut expr.node {
        Expr::IntLit(_) | Expr::BoolLit(_) | Expr::Nil | Expr::Ident(_) | Expr::Blank => {}
        Expr::Call { args, .. } | Expr::Runtime { args, .. } => {
            for arg in args {
                v.visit_expr_mut(arg);
            }
        }
        Expr::Recv(inner) | Expr::AddrOf(inner) => v.visit_expr_mut(inner),
        Expr::Unary { operand, .. } => v.visit_expr_mut(operand),
        Expr::Binary { lhs, rhs, .. } => {
            v.visit_expr_mut(lhs);
            v.visit_expr_mut(rhs);
        }
        Expr::Conv { expr: inner, .. } | Expr::ConvNop { expr: inner, .. } => v.visit_expr_mut(inner),
        Expr::Index { base, .. } | Expr::Field { base, .. } => v.visit_expr_mut(base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    struct CallCounter {
        calls: Vec<String>,
    }

    impl Visitor for CallCounter {
        fn visit_expr(&mut self, expr: &Spanned<Expr>) {
            if let Expr::Call { func, .. } = &expr.node {
                self.calls.push(func.node.clone());
            }
            walk_expr(self, expr);
        }
    }

    fn call(name: &str, args: Vec<Spanned<Expr>>) -> Spanned<Expr> {
        Spanned::dummy(Expr::Call { func: Spanned::dummy(name.to_string()), args })
    }

    #[test]
    fn visitor_reaches_select_case_bodies() {
        let case = Case {
            kind: CaseKind::Default,
            init: vec![],
            body: vec![Spanned::dummy(Stmt::Expr(call("g", vec![])))],
            span: Span::dummy(),
        };
        let stmt = Spanned::dummy(Stmt::CheckedSelect(SelectConstruct {
            init: vec![],
            cases: vec![case],
            span: Span::dummy(),
        }));
        let mut counter = CallCounter { calls: vec![] };
        counter.visit_block(&[stmt]);
        assert_eq!(counter.calls, vec!["g"]);
    }

    #[test]
    fn visitor_recurses_into_arguments() {
        let stmt = Spanned::dummy(Stmt::Expr(call("f", vec![call("h", vec![])])));
        let mut counter = CallCounter { calls: vec![] };
        counter.visit_stmt(&stmt);
        assert_eq!(counter.calls, vec!["f", "h"]);
    }

    struct Renamer;

    impl VisitMut for Renamer {
        fn visit_expr_mut(&mut self, expr: &mut Spanned<Expr>) {
            if let Expr::Call { func, .. } = &mut expr.node {
                func.node = func.node.to_uppercase();
            }
            walk_expr_mut(self, expr);
        }
    }

    #[test]
    fn visit_mut_rewrites_in_place() {
        let mut body = vec![Spanned::dummy(Stmt::For {
            cond: None,
            body: vec![Spanned::dummy(Stmt::Expr(call("tick", vec![])))],
        })];
        Renamer.visit_block_mut(&mut body);
        let mut counter = CallCounter { calls: vec![] };
        counter.visit_block(&body);
        assert_eq!(counter.calls, vec!["TICK"]);
    }
}
