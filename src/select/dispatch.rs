use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::span::{Span, Spanned};
use crate::typeck::types::Type;

use super::descriptor::{build_descriptors, conv_nop, index_expr};
use super::strategy::{addr_of, convert_to, runtime_call};
use super::{Case, LowerCtx};

/// Register every case with the runtime multiplexer, call it, then branch
/// on the chosen index.
pub fn lower_general(cases: Vec<Case>, span: Span, ctx: &mut LowerCtx<'_>) -> Result<Vec<Spanned<Stmt>>, CompileError> {
    let mut out = Vec::new();
    let desc = build_descriptors(cases, span, ctx, &mut out)?;

    let ncases = desc.slots.len();
    if desc.nsends + desc.nrecvs != ncases {
        return Err(CompileError::internal(format!(
            "select miscount: {} + {} != {ncases}",
            desc.nsends, desc.nrecvs
        )));
    }

    let (_, chosen) = ctx.temp("chosen", Type::Int, span);
    let (_, recv_ok) = ctx.temp("recv_ok", Type::Bool, span);

    let byte_ptr = |base: Spanned<Expr>| conv_nop(addr_of(index_expr(base, 0, span)), Type::ptr(Type::Uint8));
    let pc0 = match desc.pcs {
        Some(pcs) => addr_of(index_expr(ctx.var_expr(pcs, span), 0, span)),
        None => Spanned::new(Expr::Nil, span),
    };
    let call = runtime_call(
        RuntimeFn::SelectGo,
        vec![
            byte_ptr(ctx.var_expr(desc.cases, span)),
            byte_ptr(ctx.var_expr(desc.order, span)),
            pc0,
            Spanned::new(Expr::IntLit(desc.nsends as i64), span),
            Spanned::new(Expr::IntLit(desc.nrecvs as i64), span),
            Spanned::new(Expr::BoolLit(desc.default.is_some()), span),
        ],
        span,
    );
    out.push(Spanned::new(
        Stmt::Assign { lhs: vec![chosen.clone(), recv_ok.clone()], rhs: vec![call], define: false },
        span,
    ));

    // The arrays are dead once the multiplexer returns.
    out.push(Spanned::new(Stmt::VarKill(desc.cases), span));
    out.push(Spanned::new(Stmt::VarKill(desc.order), span));
    if let Some(pcs) = desc.pcs {
        out.push(Spanned::new(Stmt::VarKill(pcs), span));
    }

    let compare = |op: BinOp, value: i64| {
        Spanned::new(
            Expr::Binary {
                op,
                lhs: Box::new(chosen.clone()),
                rhs: Box::new(Spanned::new(Expr::IntLit(value), span)),
            },
            span,
        )
    };

    if let Some(body) = desc.default {
        out.push(dispatch(compare(BinOp::Lt, 0), Vec::new(), body, span));
    }

    for slot in desc.slots {
        let mut prefix = Vec::new();
        if let Some(ok) = slot.ok {
            let ok_ty = ctx.type_of(&ok.node);
            let value = convert_to(recv_ok.clone(), &Type::Bool, &ok_ty);
            prefix.push(Spanned::new(Stmt::Assign { lhs: vec![ok], rhs: vec![value], define: false }, slot.span));
        }
        prefix.extend(slot.epilogue);
        out.push(dispatch(compare(BinOp::Eq, slot.index as i64), prefix, slot.body, slot.span));
    }

    Ok(out)
}

fn dispatch(cond: Spanned<Expr>, prefix: Vec<Spanned<Stmt>>, body: Vec<Spanned<Stmt>>, span: Span) -> Spanned<Stmt> {
    let mut then_body = prefix;
    then_body.extend(body);
    then_body.push(Spanned::new(Stmt::Break, span));
    Spanned::new(Stmt::If { cond, then_body, else_body: Vec::new() }, span)
}
