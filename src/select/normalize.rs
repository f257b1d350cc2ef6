use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::parser::ast::*;
use crate::span::{Span, Spanned};
use crate::typeck::types::Type;

use super::{Case, CaseKind, SelectConstruct};

/// Checker services the normalizer calls back into.
pub trait StmtChecker {
    /// Check an ordinary statement in the current scope.
    fn check_stmt(&mut self, stmt: &mut Spanned<Stmt>);
    /// Check statements in the current scope without opening a new one.
    fn check_stmts(&mut self, stmts: &mut [Spanned<Stmt>]);
    /// Check a case guard. Bare expressions are typed but not required to be used.
    fn check_guard(&mut self, guard: &mut Spanned<Stmt>);
    fn enter_scope(&mut self);
    fn exit_scope(&mut self);
    fn type_of(&self, expr: &Expr) -> Type;
    fn diagnostics(&mut self) -> &mut Diagnostics;
}

/// Check every clause of a select and classify it as a send, receive,
/// receive-with-ok or default case. Malformed clauses are reported and
/// dropped; their bodies are still checked.
pub fn normalize_select<C: StmtChecker + ?Sized>(
    checker: &mut C,
    clauses: Vec<CommClause>,
    span: Span,
) -> SelectConstruct {
    let mut cases = Vec::with_capacity(clauses.len());
    let mut first_default: Option<Span> = None;

    for clause in clauses {
        checker.enter_scope();
        let case = normalize_clause(checker, clause, &mut first_default);
        checker.exit_scope();
        cases.extend(case);
    }

    SelectConstruct { init: Vec::new(), cases, span }
}

fn normalize_clause<C: StmtChecker + ?Sized>(
    checker: &mut C,
    clause: CommClause,
    first_default: &mut Option<Span>,
) -> Option<Case> {
    let CommClause { mut guards, mut body, span } = clause;
    let mut init = Vec::new();

    let kind = match guards.len() {
        0 => match *first_default {
            Some(first) => {
                let diags = checker.diagnostics();
                let pos = diags.position(first);
                diags.error_with_related(
                    DiagnosticKind::MultipleDefaults,
                    span,
                    first,
                    format!("multiple defaults in select (first at {pos})"),
                );
                None
            }
            None => {
                *first_default = Some(span);
                Some(CaseKind::Default)
            }
        },
        1 => guards.pop().and_then(|mut guard| {
            checker.check_guard(&mut guard);
            classify(checker, guard, span, &mut init)
        }),
        _ => {
            checker
                .diagnostics()
                .error(DiagnosticKind::CaseListNotAllowed, span, "select cases cannot be lists");
            None
        }
    };

    checker.check_stmts(&mut body);
    kind.map(|kind| Case { kind, init, body, span })
}

fn classify<C: StmtChecker + ?Sized>(
    checker: &mut C,
    guard: Spanned<Stmt>,
    case_span: Span,
    init: &mut Vec<Spanned<Stmt>>,
) -> Option<CaseKind> {
    let guard_span = guard.span;
    match guard.node {
        Stmt::Assign { mut lhs, mut rhs, define } if lhs.len() == 1 && rhs.len() == 1 => {
            let (target, value) = (lhs.pop()?, strip_implicit(rhs.pop()?));
            match value.node {
                Expr::Recv(channel) => {
                    if define {
                        declare_in_init(&target, init);
                    }
                    let elem = channel_elem(checker, &channel.node);
                    Some(CaseKind::Recv { target, channel: *channel, elem })
                }
                _ => {
                    checker.diagnostics().error(
                        DiagnosticKind::AssignmentWithoutReceive,
                        guard_span,
                        "select assignment must have receive on right hand side",
                    );
                    None
                }
            }
        }
        Stmt::AssignRecv2 { value, ok, recv, define } => match strip_implicit(recv).node {
            Expr::Recv(channel) => {
                if define {
                    declare_in_init(&value, init);
                    declare_in_init(&ok, init);
                }
                let elem = channel_elem(checker, &channel.node);
                Some(CaseKind::RecvOk { target: value, ok, channel: *channel, elem })
            }
            _ => invalid_case(checker, guard_span),
        },
        Stmt::Expr(expr) => {
            let expr = strip_implicit(expr);
            match expr.node {
                Expr::Recv(channel) => {
                    let elem = channel_elem(checker, &channel.node);
                    Some(CaseKind::Recv { target: Spanned::new(Expr::Blank, expr.span), channel: *channel, elem })
                }
                // A bare name only carries the case position.
                Expr::Ident(_) => invalid_case(checker, case_span),
                _ => invalid_case(checker, guard_span),
            }
        }
        Stmt::Send { channel, value } => Some(CaseKind::Send { channel, value }),
        _ => invalid_case(checker, guard_span),
    }
}

fn invalid_case<C: StmtChecker + ?Sized>(checker: &mut C, span: Span) -> Option<CaseKind> {
    checker.diagnostics().error(
        DiagnosticKind::InvalidCaseForm,
        span,
        "select case must be receive, send, or assign receive",
    );
    None
}

/// Implicit conversions are the only transparent wrapper; explicit ones are
/// part of what the user wrote.
fn strip_implicit(expr: Spanned<Expr>) -> Spanned<Expr> {
    match expr.node {
        Expr::Conv { expr: inner, implicit: true, .. } => strip_implicit(*inner),
        node => Spanned::new(node, expr.span),
    }
}

fn channel_elem<C: StmtChecker + ?Sized>(checker: &C, channel: &Expr) -> Type {
    checker
        .type_of(channel)
        .chan_elem()
        .map(|(_, elem)| elem.clone())
        .unwrap_or(Type::Invalid)
}

/// `case v := <-c` declares `v` ahead of the select; the guard then assigns it.
fn declare_in_init(target: &Spanned<Expr>, init: &mut Vec<Spanned<Stmt>>) {
    if let Some(var) = target.node.var() {
        init.push(Spanned::new(Stmt::Decl { var, init: DeclInit::Zero }, target.span));
    }
}
