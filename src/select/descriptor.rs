use tracing::trace;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::span::{Span, Spanned};
use crate::typeck::types::{StructType, Type};

use super::strategy::{addr_of, convert_to, runtime_call};
use super::{Case, CaseKind, LowerCtx};

/// The runtime's case record: `{c unsafe.Pointer; elem unsafe.Pointer}`.
/// Field order and width must match the multiplexer's layout.
pub fn select_case_type() -> StructType {
    let mut scase = StructType::new("scase", vec![("c", Type::UnsafePointer), ("elem", Type::UnsafePointer)]);
    scase.noalg = true;
    scase
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Recv,
}

impl Direction {
    pub fn of(kind: &CaseKind) -> Option<Direction> {
        match kind {
            CaseKind::Send { .. } => Some(Direction::Send),
            CaseKind::Recv { .. } | CaseKind::RecvOk { .. } => Some(Direction::Recv),
            CaseKind::Default => None,
        }
    }
}

/// Descriptor slot for each case, in the order given. Sends take indices
/// upward from 0 and receives take them downward from `n - 1`, so the
/// runtime can tell a case's direction from its index alone.
pub fn assign_slots(directions: &[Direction]) -> Vec<usize> {
    let n = directions.len();
    let mut sends = 0;
    let mut recvs = 0;
    directions
        .iter()
        .map(|dir| match dir {
            Direction::Send => {
                sends += 1;
                sends - 1
            }
            Direction::Recv => {
                recvs += 1;
                n - recvs
            }
        })
        .collect()
}

/// Channel operands of one case, reduced to what the runtime calls take.
pub(crate) struct Operands {
    pub direction: Direction,
    pub channel: Spanned<Expr>,
    /// Address of the send value or receive target; `None` for `_`.
    pub elem: Option<Spanned<Expr>>,
    /// Destination of the received-ok flag.
    pub ok: Option<Spanned<Expr>>,
    /// Runs before the operation is registered.
    pub prologue: Vec<Spanned<Stmt>>,
    /// Runs first in the chosen case's body.
    pub epilogue: Vec<Spanned<Stmt>>,
}

pub(crate) fn prepare_operands(kind: CaseKind, ctx: &mut LowerCtx<'_>) -> Result<Operands, CompileError> {
    let mut prologue = Vec::new();
    let mut epilogue = Vec::new();
    match kind {
        CaseKind::Default => Err(CompileError::internal("default case has no channel operands")),
        CaseKind::Send { channel, value } => {
            let elem_ty = ctx
                .type_of(&channel.node)
                .chan_elem()
                .map(|(_, elem)| elem.clone())
                .unwrap_or_else(|| ctx.type_of(&value.node));
            let (channel, elem) = if value.node.is_blank() {
                (channel, None)
            } else if value.node.var().is_some() {
                (channel, Some(addr_of(value)))
            } else {
                // The value moves into the prologue, so the channel must be
                // evaluated there first.
                let channel = spill(channel, ctx, &mut prologue);
                (channel, Some(send_value(value, elem_ty, ctx, &mut prologue)))
            };
            Ok(Operands { direction: Direction::Send, channel, elem, ok: None, prologue, epilogue })
        }
        CaseKind::Recv { target, channel, elem } => {
            let elem = recv_target(target, &elem, ctx, &mut prologue, &mut epilogue);
            Ok(Operands { direction: Direction::Recv, channel, elem, ok: None, prologue, epilogue })
        }
        CaseKind::RecvOk { target, ok, channel, elem } => {
            let elem = recv_target(target, &elem, ctx, &mut prologue, &mut epilogue);
            let ok = if ok.node.is_blank() { None } else { Some(ok) };
            Ok(Operands { direction: Direction::Recv, channel, elem, ok, prologue, epilogue })
        }
    }
}

/// `expr` itself when it is a plain variable, otherwise a temporary holding
/// its value.
fn spill(expr: Spanned<Expr>, ctx: &mut LowerCtx<'_>, prologue: &mut Vec<Spanned<Stmt>>) -> Spanned<Expr> {
    if expr.node.var().is_some() {
        return expr;
    }
    let span = expr.span;
    let ty = ctx.type_of(&expr.node);
    let (var, tmp) = ctx.temp("tmp", ty, span);
    prologue.push(Spanned::new(Stmt::Decl { var, init: DeclInit::Value(expr) }, span));
    tmp
}

/// Copy of a non-addressable send value, evaluated exactly once.
fn send_value(
    value: Spanned<Expr>,
    elem_ty: Type,
    ctx: &mut LowerCtx<'_>,
    prologue: &mut Vec<Spanned<Stmt>>,
) -> Spanned<Expr> {
    let span = value.span;
    let (var, tmp) = ctx.temp("tmp", elem_ty, span);
    prologue.push(Spanned::new(Stmt::Decl { var, init: DeclInit::Value(value) }, span));
    addr_of(tmp)
}

/// Address the runtime writes the received element to. A target whose type
/// differs from the element type receives through a temporary instead.
fn recv_target(
    target: Spanned<Expr>,
    elem_ty: &Type,
    ctx: &mut LowerCtx<'_>,
    prologue: &mut Vec<Spanned<Stmt>>,
    epilogue: &mut Vec<Spanned<Stmt>>,
) -> Option<Spanned<Expr>> {
    if target.node.is_blank() {
        return None;
    }
    let target_ty = ctx.type_of(&target.node);
    if target_ty == *elem_ty && target.node.var().is_some() {
        return Some(addr_of(target));
    }
    let span = target.span;
    let (var, tmp) = ctx.temp("tmp", elem_ty.clone(), span);
    prologue.push(Spanned::new(Stmt::Decl { var, init: DeclInit::Zero }, span));
    let value = convert_to(tmp.clone(), elem_ty, &target_ty);
    epilogue.push(Spanned::new(Stmt::Assign { lhs: vec![target], rhs: vec![value], define: false }, span));
    Some(addr_of(tmp))
}

/// A registered case, ready for dispatch.
pub(crate) struct Slot {
    pub index: usize,
    pub ok: Option<Spanned<Expr>>,
    pub epilogue: Vec<Spanned<Stmt>>,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}

pub(crate) struct Descriptors {
    pub cases: VarId,
    pub order: VarId,
    pub pcs: Option<VarId>,
    pub nsends: usize,
    pub nrecvs: usize,
    /// Cases by descriptor index.
    pub slots: Vec<Slot>,
    pub default: Option<Vec<Spanned<Stmt>>>,
}

/// Declare the descriptor and order arrays and fill one descriptor per
/// non-default case. Case init statements are emitted in source order.
pub(crate) fn build_descriptors(
    cases: Vec<Case>,
    span: Span,
    ctx: &mut LowerCtx<'_>,
    out: &mut Vec<Spanned<Stmt>>,
) -> Result<Descriptors, CompileError> {
    let directions: Vec<Direction> = cases.iter().filter_map(|c| Direction::of(&c.kind)).collect();
    let n = directions.len();
    let indices = assign_slots(&directions);

    let scase = ctx.session.select_case_type();
    let (cases_var, cases_arr) = ctx.temp("cases", Type::array(scase, n as u64), span);
    out.push(Spanned::new(Stmt::Decl { var: cases_var, init: DeclInit::Zero }, span));
    // The runtime initializes the order array itself.
    let (order_var, _) = ctx.temp("order", Type::array(Type::Uint16, 2 * n as u64), span);
    out.push(Spanned::new(Stmt::Decl { var: order_var, init: DeclInit::Uninit }, span));

    let pcs = if ctx.session.race() {
        let (var, _) = ctx.temp("pcs", Type::array(Type::Uintptr, n as u64), span);
        out.push(Spanned::new(Stmt::Decl { var, init: DeclInit::Zero }, span));
        Some(var)
    } else {
        None
    };

    let mut table: Vec<Option<Slot>> = (0..n).map(|_| None).collect();
    let mut default = None;
    let mut nsends = 0;
    let mut nrecvs = 0;
    let mut next = indices.into_iter();

    for case in cases {
        let Case { kind, init, body, span: case_span } = case;
        out.extend(init);
        if kind.is_default() {
            default = Some(body);
            continue;
        }

        let index = next
            .next()
            .ok_or_else(|| CompileError::internal("select case has no descriptor slot"))?;
        let ops = prepare_operands(kind, ctx)?;
        match ops.direction {
            Direction::Send => nsends += 1,
            Direction::Recv => nrecvs += 1,
        }
        trace!(index, direction = ?ops.direction, "select descriptor slot");

        out.extend(ops.prologue);
        let slot_expr = |span| index_expr(cases_arr.clone(), index, span);
        out.push(set_field(slot_expr(case_span), "c", ops.channel, case_span));
        if let Some(elem) = ops.elem {
            out.push(set_field(slot_expr(case_span), "elem", elem, case_span));
        }
        if let Some(pcs) = pcs {
            let marker = addr_of(index_expr(ctx.var_expr(pcs, case_span), index, case_span));
            let call = runtime_call(RuntimeFn::SelectSetPc, vec![marker], case_span);
            out.push(Spanned::new(Stmt::Expr(call), case_span));
        }

        let entry = table
            .get_mut(index)
            .ok_or_else(|| CompileError::internal(format!("select slot {index} out of range for {n} cases")))?;
        if entry.is_some() {
            return Err(CompileError::internal(format!("select slot {index} assigned twice")));
        }
        *entry = Some(Slot { index, ok: ops.ok, epilogue: ops.epilogue, body, span: case_span });
    }

    let slots = table
        .into_iter()
        .enumerate()
        .map(|(i, slot)| slot.ok_or_else(|| CompileError::internal(format!("select slot {i} unassigned"))))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Descriptors { cases: cases_var, order: order_var, pcs, nsends, nrecvs, slots, default })
}

pub(crate) fn index_expr(base: Spanned<Expr>, index: usize, span: Span) -> Spanned<Expr> {
    Spanned::new(Expr::Index { base: Box::new(base), index: index as u64 }, span)
}

pub(crate) fn conv_nop(expr: Spanned<Expr>, to: Type) -> Spanned<Expr> {
    let span = expr.span;
    Spanned::new(Expr::ConvNop { expr: Box::new(expr), to }, span)
}

/// `slot.field = (unsafe.Pointer)(value)`
fn set_field(slot: Spanned<Expr>, field: &str, value: Spanned<Expr>, span: Span) -> Spanned<Stmt> {
    let lhs = Spanned::new(Expr::Field { base: Box::new(slot), field: field.to_string() }, span);
    let rhs = conv_nop(value, Type::UnsafePointer);
    Spanned::new(Stmt::Assign { lhs: vec![lhs], rhs: vec![rhs], define: false }, span)
}
