use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::span::{Span, Spanned};
use crate::typeck::types::Type;

use super::descriptor::{Direction, Operands, prepare_operands};
use super::{Case, CaseKind, LowerCtx};

/// How a select is translated. A pure function of the case count
/// (default included) and whether one of the cases is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// No cases: park forever.
    BlockForever,
    /// One case: run it as a plain statement.
    Direct,
    /// One real case plus a default: non-blocking probe.
    Probe,
    /// Descriptor arrays and the runtime multiplexer.
    General,
}

pub fn select_strategy(case_count: usize, has_default: bool) -> Strategy {
    match (case_count, has_default) {
        (0, _) => Strategy::BlockForever,
        (1, _) => Strategy::Direct,
        (2, true) => Strategy::Probe,
        _ => Strategy::General,
    }
}

pub(crate) fn runtime_call(func: RuntimeFn, args: Vec<Spanned<Expr>>, span: Span) -> Spanned<Expr> {
    Spanned::new(Expr::Runtime { func, args }, span)
}

pub(crate) fn addr_of(expr: Spanned<Expr>) -> Spanned<Expr> {
    let span = expr.span;
    Spanned::new(Expr::AddrOf(Box::new(expr)), span)
}

/// `expr` converted to `to` when their types differ.
pub(crate) fn convert_to(expr: Spanned<Expr>, from: &Type, to: &Type) -> Spanned<Expr> {
    if from == to || to.is_invalid() {
        return expr;
    }
    let span = expr.span;
    Spanned::new(Expr::Conv { expr: Box::new(expr), to: to.clone(), implicit: true }, span)
}

pub fn lower_block_forever(span: Span) -> Vec<Spanned<Stmt>> {
    vec![Spanned::new(Stmt::Expr(runtime_call(RuntimeFn::Block, vec![], span)), span)]
}

/// The only case runs as an ordinary statement followed by its body.
pub fn lower_direct(case: Case, ctx: &mut LowerCtx<'_>) -> Vec<Spanned<Stmt>> {
    let Case { kind, init, body, span } = case;
    let mut out = init;

    match kind {
        CaseKind::Default => {}
        CaseKind::Send { channel, value } => {
            out.push(Spanned::new(Stmt::Send { channel, value }, span));
        }
        CaseKind::Recv { target, channel, elem } => {
            let recv = Spanned::new(Expr::Recv(Box::new(channel)), span);
            if target.node.is_blank() {
                out.push(Spanned::new(Stmt::Expr(recv), span));
            } else {
                let target_ty = ctx.type_of(&target.node);
                let value = convert_to(recv, &elem, &target_ty);
                out.push(Spanned::new(Stmt::Assign { lhs: vec![target], rhs: vec![value], define: false }, span));
            }
        }
        CaseKind::RecvOk { target, ok, channel, .. } => {
            let recv = Spanned::new(Expr::Recv(Box::new(channel)), span);
            if target.node.is_blank() && ok.node.is_blank() {
                out.push(Spanned::new(Stmt::Expr(recv), span));
            } else {
                out.push(Spanned::new(Stmt::AssignRecv2 { value: target, ok, recv, define: false }, span));
            }
        }
    }

    out.extend(body);
    out.push(Spanned::new(Stmt::Break, span));
    out
}

/// `if probe(...) { body } else { default body }` for one real case and a default.
pub fn lower_probe(cases: Vec<Case>, ctx: &mut LowerCtx<'_>) -> Result<Vec<Spanned<Stmt>>, CompileError> {
    let mut default = None;
    let mut real = None;
    for case in cases {
        if case.kind.is_default() {
            default = Some(case);
        } else {
            real = Some(case);
        }
    }
    let (Some(default), Some(real)) = (default, real) else {
        return Err(CompileError::internal("probe select needs exactly one case and a default"));
    };

    let span = real.span;
    let mut out = real.init;
    let Operands { direction, channel, elem, ok, prologue, mut epilogue } = prepare_operands(real.kind, ctx)?;
    out.extend(prologue);

    let nil = || Spanned::new(Expr::Nil, span);
    let call = match ok {
        None if direction == Direction::Send => {
            let value = elem.unwrap_or_else(nil);
            runtime_call(RuntimeFn::SelectNbSend, vec![channel, value], span)
        }
        None => {
            let target = elem.unwrap_or_else(nil);
            runtime_call(RuntimeFn::SelectNbRecv, vec![target, channel], span)
        }
        Some(ok) => {
            let target = elem.unwrap_or_else(nil);
            let ok_ty = ctx.type_of(&ok.node);
            let okp = if ok_ty == Type::Bool {
                addr_of(ok)
            } else {
                let (_, tmp) = ctx.temp("ok", Type::Bool, span);
                if let Some(var) = tmp.node.var() {
                    out.push(Spanned::new(Stmt::Decl { var, init: DeclInit::Zero }, span));
                }
                let value = convert_to(tmp.clone(), &Type::Bool, &ok_ty);
                epilogue.push(Spanned::new(Stmt::Assign { lhs: vec![ok], rhs: vec![value], define: false }, span));
                addr_of(tmp)
            };
            runtime_call(RuntimeFn::SelectNbRecv2, vec![target, okp, channel], span)
        }
    };

    let mut then_body = epilogue;
    then_body.extend(real.body);
    let mut else_body = default.init;
    else_body.extend(default.body);

    out.push(Spanned::new(Stmt::If { cond: call, then_body, else_body }, span));
    out.push(Spanned::new(Stmt::Break, span));
    Ok(out)
}
