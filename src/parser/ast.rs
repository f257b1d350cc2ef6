use crate::select::SelectConstruct;
use crate::span::{Span, Spanned};
use crate::typeck::types::{ChanDir, Type};

#[derive(Debug, Clone)]
pub struct Program {
    pub functions: Vec<Spanned<Function>>,
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Spanned<String>,
    pub params: Vec<Param>,
    pub body: Vec<Spanned<Stmt>>,
    /// Every local of the function, filled in by the type checker and
    /// extended with temporaries by lowering.
    pub locals: Locals,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
    pub var: Option<VarId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Named(String),
    Chan { dir: ChanDir, elem: Box<Spanned<TypeExpr>> },
}

impl std::fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::Chan { dir: ChanDir::Both, elem } => write!(f, "chan {}", elem.node),
            TypeExpr::Chan { dir: ChanDir::Send, elem } => write!(f, "chan<- {}", elem.node),
            TypeExpr::Chan { dir: ChanDir::Recv, elem } => write!(f, "<-chan {}", elem.node),
        }
    }
}

/// Index into a function's `Locals` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalKind {
    Param,
    User,
    /// Compiler-introduced temporary; never visible to user code.
    Temp,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: String,
    pub ty: Type,
    pub kind: LocalKind,
}

#[derive(Debug, Clone, Default)]
pub struct Locals {
    vars: Vec<Local>,
}

impl Locals {
    pub fn declare(&mut self, name: impl Into<String>, ty: Type, kind: LocalKind) -> VarId {
        let id = VarId(self.vars.len() as u32);
        self.vars.push(Local { name: name.into(), ty, kind });
        id
    }

    /// Declare a compiler temporary. Temporaries print with a `%` prefix and
    /// get a numeric suffix when the name is already taken.
    pub fn temp(&mut self, name: &str, ty: Type) -> VarId {
        let base = format!("%{name}");
        let mut candidate = base.clone();
        let mut n = 1;
        while self.vars.iter().any(|l| l.name == candidate) {
            candidate = format!("{base}{n}");
            n += 1;
        }
        self.declare(candidate, ty, LocalKind::Temp)
    }

    pub fn get(&self, id: VarId) -> Option<&Local> {
        self.vars.get(id.0 as usize)
    }

    pub fn ty(&self, id: VarId) -> Type {
        self.get(id).map(|l| l.ty.clone()).unwrap_or(Type::Invalid)
    }

    pub fn name(&self, id: VarId) -> &str {
        self.get(id).map(|l| l.name.as_str()).unwrap_or("<unknown>")
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Local)> {
        self.vars.iter().enumerate().map(|(i, l)| (VarId(i as u32), l))
    }

    pub fn temps(&self) -> impl Iterator<Item = (VarId, &Local)> {
        self.iter().filter(|(_, l)| l.kind == LocalKind::Temp)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    /// Resolved by the type checker.
    pub var: Option<VarId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::Lt => "<",
            BinOp::LtEq => "<=",
            BinOp::Gt => ">",
            BinOp::GtEq => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinOp::Eq | BinOp::Neq | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Runtime entry points the select lowering calls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeFn {
    /// Blocks the calling task forever.
    Block,
    /// General multiplexer: `(cases, order, pcs, nsends, nrecvs, has_default) -> (chosen, recv_ok)`.
    SelectGo,
    SelectNbSend,
    SelectNbRecv,
    SelectNbRecv2,
    /// Registers a race-instrumentation marker for one case.
    SelectSetPc,
}

impl RuntimeFn {
    pub fn name(self) -> &'static str {
        match self {
            RuntimeFn::Block => "block",
            RuntimeFn::SelectGo => "selectgo",
            RuntimeFn::SelectNbSend => "selectnbsend",
            RuntimeFn::SelectNbRecv => "selectnbrecv",
            RuntimeFn::SelectNbRecv2 => "selectnbrecv2",
            RuntimeFn::SelectSetPc => "selectsetpc",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            RuntimeFn::Block => "__chansel_block",
            RuntimeFn::SelectGo => "__chansel_selectgo",
            RuntimeFn::SelectNbSend => "__chansel_selectnbsend",
            RuntimeFn::SelectNbRecv => "__chansel_selectnbrecv",
            RuntimeFn::SelectNbRecv2 => "__chansel_selectnbrecv2",
            RuntimeFn::SelectSetPc => "__chansel_selectsetpc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    IntLit(i64),
    BoolLit(bool),
    Nil,
    Ident(Ident),
    /// The `_` placeholder.
    Blank,
    Call {
        func: Spanned<String>,
        args: Vec<Spanned<Expr>>,
    },
    Recv(Box<Spanned<Expr>>),
    Unary {
        op: UnaryOp,
        operand: Box<Spanned<Expr>>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Spanned<Expr>>,
        rhs: Box<Spanned<Expr>>,
    },
    /// Value conversion. `implicit` marks conversions inserted by the checker.
    Conv {
        expr: Box<Spanned<Expr>>,
        to: Type,
        implicit: bool,
    },
    /// Pointer reinterpretation with no runtime effect.
    ConvNop {
        expr: Box<Spanned<Expr>>,
        to: Type,
    },
    AddrOf(Box<Spanned<Expr>>),
    Index {
        base: Box<Spanned<Expr>>,
        index: u64,
    },
    Field {
        base: Box<Spanned<Expr>>,
        field: String,
    },
    Runtime {
        func: RuntimeFn,
        args: Vec<Spanned<Expr>>,
    },
}

impl Expr {
    pub fn is_blank(&self) -> bool {
        matches!(self, Expr::Blank)
    }

    pub fn local(name: impl Into<String>, var: VarId) -> Expr {
        Expr::Ident(Ident { name: name.into(), var: Some(var) })
    }

    /// The resolved local, if this is a plain name.
    pub fn var(&self) -> Option<VarId> {
        match self {
            Expr::Ident(ident) => ident.var,
            _ => None,
        }
    }
}

/// How a compiler-introduced declaration initializes its storage.
#[derive(Debug, Clone, PartialEq)]
pub enum DeclInit {
    Zero,
    /// Storage is left as-is; some other party fills it before use.
    Uninit,
    Value(Spanned<Expr>),
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Var {
        name: Spanned<String>,
        ty: Option<Spanned<TypeExpr>>,
        value: Option<Spanned<Expr>>,
        var: Option<VarId>,
    },
    /// Declaration of a local already registered in `Locals`.
    Decl {
        var: VarId,
        init: DeclInit,
    },
    Assign {
        lhs: Vec<Spanned<Expr>>,
        rhs: Vec<Spanned<Expr>>,
        define: bool,
    },
    /// `v, ok = <-c`, produced by the checker.
    AssignRecv2 {
        value: Spanned<Expr>,
        ok: Spanned<Expr>,
        recv: Spanned<Expr>,
        define: bool,
    },
    Send {
        channel: Spanned<Expr>,
        value: Spanned<Expr>,
    },
    Expr(Spanned<Expr>),
    If {
        cond: Spanned<Expr>,
        then_body: Vec<Spanned<Stmt>>,
        else_body: Vec<Spanned<Stmt>>,
    },
    For {
        cond: Option<Spanned<Expr>>,
        body: Vec<Spanned<Stmt>>,
    },
    Break,
    /// Select as parsed.
    Select(SelectStmt),
    /// Select after normalization.
    CheckedSelect(SelectConstruct),
    /// A block an unlabeled `break` exits; the output of select lowering.
    Breakable(Vec<Spanned<Stmt>>),
    /// Marks a temporary dead; it must not be read afterwards.
    VarKill(VarId),
}

#[derive(Debug, Clone)]
pub struct SelectStmt {
    pub clauses: Vec<CommClause>,
}

/// One `case`/`default` arm as written. A default has no guards.
#[derive(Debug, Clone)]
pub struct CommClause {
    pub guards: Vec<Spanned<Stmt>>,
    pub body: Vec<Spanned<Stmt>>,
    /// From the `case`/`default` keyword through the colon.
    pub span: Span,
}
