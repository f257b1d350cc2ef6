//! Select statement normalization and lowering.
//!
//! The type checker hands each `select` to [`normalize::normalize_select`],
//! which produces a [`SelectConstruct`]. After checking succeeds,
//! [`lower_program`] replaces every construct with plain statements plus
//! runtime calls, picking one of four strategies by case count.

pub mod descriptor;
pub mod dispatch;
pub mod normalize;
pub mod strategy;

use tracing::debug;

use crate::diagnostics::CompileError;
use crate::parser::ast::*;
use crate::session::Session;
use crate::span::{Span, Spanned};
use crate::typeck::type_of;
use crate::typeck::types::Type;
use crate::visit::{VisitMut, walk_stmt_mut};
use strategy::{Strategy, select_strategy};

/// One normalized arm of a select.
#[derive(Debug, Clone)]
pub struct Case {
    pub kind: CaseKind,
    /// Statements evaluated before the select dispatches, e.g. declarations
    /// introduced by `case v := <-c`.
    pub init: Vec<Spanned<Stmt>>,
    pub body: Vec<Spanned<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum CaseKind {
    Send {
        channel: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    /// `target = <-channel`; `target` may be `Expr::Blank`.
    Recv {
        target: Spanned<Expr>,
        channel: Spanned<Expr>,
        /// Element type of `channel`.
        elem: Type,
    },
    /// `target, ok = <-channel`.
    RecvOk {
        target: Spanned<Expr>,
        ok: Spanned<Expr>,
        channel: Spanned<Expr>,
        elem: Type,
    },
    Default,
}

impl CaseKind {
    pub fn is_default(&self) -> bool {
        matches!(self, CaseKind::Default)
    }

    pub fn is_send(&self) -> bool {
        matches!(self, CaseKind::Send { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            CaseKind::Send { .. } => "send",
            CaseKind::Recv { .. } => "recv",
            CaseKind::RecvOk { .. } => "recv-ok",
            CaseKind::Default => "default",
        }
    }

    /// `x, _ = <-c` receives exactly like `x = <-c`.
    pub fn without_blank_ok(self) -> CaseKind {
        match self {
            CaseKind::RecvOk { target, ok, channel, elem } if ok.node.is_blank() => {
                CaseKind::Recv { target, channel, elem }
            }
            other => other,
        }
    }
}

/// A type-checked select, cases in source order.
#[derive(Debug, Clone)]
pub struct SelectConstruct {
    /// Evaluated unconditionally before any case.
    pub init: Vec<Spanned<Stmt>>,
    pub cases: Vec<Case>,
    pub span: Span,
}

impl SelectConstruct {
    pub fn has_default(&self) -> bool {
        self.cases.iter().any(|c| c.kind.is_default())
    }

    pub fn send_count(&self) -> usize {
        self.cases.iter().filter(|c| c.kind.is_send()).count()
    }

    pub fn recv_count(&self) -> usize {
        self.cases
            .iter()
            .filter(|c| matches!(c.kind, CaseKind::Recv { .. } | CaseKind::RecvOk { .. }))
            .count()
    }

    pub fn strategy(&self) -> Strategy {
        select_strategy(self.cases.len(), self.has_default())
    }
}

/// State lowering needs from the enclosing function.
pub struct LowerCtx<'a> {
    pub session: &'a Session,
    pub locals: &'a mut Locals,
}

impl<'a> LowerCtx<'a> {
    pub fn new(session: &'a Session, locals: &'a mut Locals) -> Self {
        Self { session, locals }
    }

    pub fn type_of(&self, expr: &Expr) -> Type {
        type_of(expr, self.locals)
    }

    /// Declare a temporary and return it with a reference expression.
    pub fn temp(&mut self, name: &str, ty: Type, span: Span) -> (VarId, Spanned<Expr>) {
        let var = self.locals.temp(name, ty);
        (var, self.var_expr(var, span))
    }

    pub fn var_expr(&self, var: VarId, span: Span) -> Spanned<Expr> {
        Spanned::new(Expr::local(self.locals.name(var), var), span)
    }
}

/// Lower one select into a `Stmt::Breakable` block.
pub fn lower_select(construct: SelectConstruct, ctx: &mut LowerCtx<'_>) -> Result<Spanned<Stmt>, CompileError> {
    let strategy = construct.strategy();
    let has_default = construct.has_default();
    let SelectConstruct { init, cases, span } = construct;
    debug!(cases = cases.len(), has_default, ?strategy, "lowering select");

    let mut out = init;
    match strategy {
        Strategy::BlockForever => out.extend(strategy::lower_block_forever(span)),
        Strategy::Direct => {
            let case = cases
                .into_iter()
                .next()
                .ok_or_else(|| CompileError::internal("direct select lowering without a case"))?;
            out.extend(strategy::lower_direct(case, ctx));
        }
        Strategy::Probe => out.extend(strategy::lower_probe(without_blank_ok(cases), ctx)?),
        Strategy::General => out.extend(dispatch::lower_general(without_blank_ok(cases), span, ctx)?),
    }
    Ok(Spanned::new(Stmt::Breakable(out), span))
}

fn without_blank_ok(cases: Vec<Case>) -> Vec<Case> {
    cases
        .into_iter()
        .map(|case| Case { kind: case.kind.without_blank_ok(), ..case })
        .collect()
}

/// Lower every select in the program, innermost first.
pub fn lower_program(program: &mut Program, session: &Session) -> Result<(), CompileError> {
    for func in &mut program.functions {
        lower_function(&mut func.node, session)?;
    }
    Ok(())
}

pub fn lower_function(func: &mut Function, session: &Session) -> Result<(), CompileError> {
    let mut lowerer = SelectLowerer { session, locals: &mut func.locals, error: None };
    lowerer.visit_block_mut(&mut func.body);
    match lowerer.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct SelectLowerer<'a> {
    session: &'a Session,
    locals: &'a mut Locals,
    error: Option<CompileError>,
}

impl VisitMut for SelectLowerer<'_> {
    fn visit_stmt_mut(&mut self, stmt: &mut Spanned<Stmt>) {
        if self.error.is_some() {
            return;
        }
        // Nested selects in case bodies are lowered before their parent.
        walk_stmt_mut(self, stmt);
        match &stmt.node {
            Stmt::CheckedSelect(_) => {
                let node = std::mem::replace(&mut stmt.node, Stmt::Breakable(Vec::new()));
                let Stmt::CheckedSelect(construct) = node else {
                    return;
                };
                let mut ctx = LowerCtx::new(self.session, self.locals);
                match lower_select(construct, &mut ctx) {
                    Ok(lowered) => *stmt = lowered,
                    Err(err) => self.error = Some(err),
                }
            }
            Stmt::Select(_) => {
                self.error = Some(CompileError::internal("select reached lowering without being checked"));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;

    fn recv_case(target: Expr, ok: Option<Expr>) -> Case {
        let channel = Spanned::dummy(Expr::Ident(Ident { name: "c".into(), var: None }));
        let kind = match ok {
            Some(ok) => CaseKind::RecvOk {
                target: Spanned::dummy(target),
                ok: Spanned::dummy(ok),
                channel,
                elem: Type::Int,
            },
            None => CaseKind::Recv { target: Spanned::dummy(target), channel, elem: Type::Int },
        };
        Case { kind, init: vec![], body: vec![], span: Span::dummy() }
    }

    #[test]
    fn blank_ok_becomes_plain_receive() {
        let case = recv_case(Expr::Blank, Some(Expr::Blank));
        assert!(matches!(case.kind.without_blank_ok(), CaseKind::Recv { .. }));
        let keep = recv_case(Expr::Blank, Some(Expr::local("ok", VarId(0))));
        assert!(matches!(keep.kind.without_blank_ok(), CaseKind::RecvOk { .. }));
    }

    #[test]
    fn counts_by_kind() {
        let construct = SelectConstruct {
            init: vec![],
            cases: vec![
                recv_case(Expr::Blank, None),
                Case { kind: CaseKind::Default, init: vec![], body: vec![], span: Span::dummy() },
                recv_case(Expr::Blank, Some(Expr::Blank)),
            ],
            span: Span::dummy(),
        };
        assert!(construct.has_default());
        assert_eq!(construct.send_count(), 0);
        assert_eq!(construct.recv_count(), 2);
        assert_eq!(construct.strategy(), Strategy::General);
    }

    #[test]
    fn raw_select_in_lowering_is_internal_error() {
        let session = Session::new(Options::default());
        let mut func = Function {
            name: Spanned::dummy("main".into()),
            params: vec![],
            body: vec![Spanned::dummy(Stmt::Select(SelectStmt { clauses: vec![] }))],
            locals: Locals::default(),
        };
        let err = lower_function(&mut func, &session).unwrap_err();
        assert!(matches!(err, CompileError::Internal { .. }));
    }

    #[test]
    fn empty_select_lowers_to_block() {
        let session = Session::new(Options::default());
        let mut locals = Locals::default();
        let mut ctx = LowerCtx::new(&session, &mut locals);
        let construct = SelectConstruct { init: vec![], cases: vec![], span: Span::dummy() };
        let lowered = lower_select(construct, &mut ctx).unwrap();
        match lowered.node {
            Stmt::Breakable(body) => {
                assert_eq!(body.len(), 1);
                assert!(matches!(
                    &body[0].node,
                    Stmt::Expr(Spanned { node: Expr::Runtime { func: RuntimeFn::Block, .. }, .. })
                ));
            }
            other => panic!("expected breakable, got {other:?}"),
        }
        assert!(locals.is_empty());
    }
}
