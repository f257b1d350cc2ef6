use crate::parser::ast::*;
use crate::select::{Case, CaseKind, SelectConstruct};
use crate::span::Spanned;

/// Render a checked or lowered program as source-like text. Compiler
/// temporaries keep their `%` names, so the output does not reparse.
pub fn pretty_print(program: &Program) -> String {
    let mut pp = PrettyPrinter::new(None);
    for (i, func) in program.functions.iter().enumerate() {
        if i > 0 {
            pp.newline();
        }
        pp.emit_function(&func.node);
    }
    pp.buf
}

pub fn function_to_string(func: &Function) -> String {
    let mut pp = PrettyPrinter::new(None);
    pp.emit_function(func);
    pp.buf
}

/// Single-line rendering used in diagnostics, e.g. `n + 1`.
pub fn expr_to_string(expr: &Expr) -> String {
    let mut pp = PrettyPrinter::new(None);
    pp.emit_expr(expr, 0);
    pp.buf
}

struct PrettyPrinter<'a> {
    buf: String,
    indent: usize,
    /// Locals of the function being printed; needed to name `Decl`s.
    locals: Option<&'a Locals>,
}

impl<'a> PrettyPrinter<'a> {
    fn new(locals: Option<&'a Locals>) -> Self {
        Self { buf: String::new(), indent: 0, locals }
    }

    fn write(&mut self, s: &str) {
        self.buf.push_str(s);
    }

    fn newline(&mut self) {
        self.buf.push('\n');
    }

    fn write_indent(&mut self) {
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
    }

    fn indent(&mut self) {
        self.indent += 1;
    }

    fn dedent(&mut self) {
        self.indent -= 1;
    }

    fn var_name(&self, var: VarId) -> String {
        match self.locals {
            Some(locals) => locals.name(var).to_string(),
            None => format!("v{}", var.0),
        }
    }

    // ── Functions ────────────────────────────────────────────────────

    fn emit_function(&mut self, func: &'a Function) {
        let saved = self.locals.replace(&func.locals);
        self.write("func ");
        self.write(&func.name.node);
        self.write("(");
        for (i, p) in func.params.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.write(&p.name.node);
            self.write(" ");
            self.write(&p.ty.node.to_string());
        }
        self.write(") ");
        self.emit_block(&func.body);
        self.newline();
        self.locals = saved;
    }

    fn emit_block(&mut self, stmts: &[Spanned<Stmt>]) {
        self.write("{");
        self.newline();
        self.indent();
        self.emit_stmts(stmts);
        self.dedent();
        self.write_indent();
        self.write("}");
    }

    fn emit_stmts(&mut self, stmts: &[Spanned<Stmt>]) {
        for stmt in stmts {
            self.write_indent();
            self.emit_stmt(&stmt.node);
            self.newline();
        }
    }

    // ── Statements ───────────────────────────────────────────────────

    fn emit_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Var { name, ty, value, .. } => {
                self.write("var ");
                self.write(&name.node);
                if let Some(ty) = ty {
                    self.write(" ");
                    self.write(&ty.node.to_string());
                }
                if let Some(value) = value {
                    self.write(" = ");
                    self.emit_expr(&value.node, 0);
                }
            }
            Stmt::Decl { var, init } => {
                self.write("var ");
                self.write(&self.var_name(*var));
                if let Some(locals) = self.locals {
                    self.write(" ");
                    self.write(&locals.ty(*var).to_string());
                }
                match init {
                    DeclInit::Zero => {}
                    DeclInit::Uninit => self.write(" (uninit)"),
                    DeclInit::Value(value) => {
                        self.write(" = ");
                        self.emit_expr(&value.node, 0);
                    }
                }
            }
            Stmt::Assign { lhs, rhs, define } => {
                self.emit_expr_list(lhs);
                self.write(if *define { " := " } else { " = " });
                self.emit_expr_list(rhs);
            }
            Stmt::AssignRecv2 { value, ok, recv, define } => {
                self.emit_expr(&value.node, 0);
                self.write(", ");
                self.emit_expr(&ok.node, 0);
                self.write(if *define { " := " } else { " = " });
                self.emit_expr(&recv.node, 0);
            }
            Stmt::Send { channel, value } => {
                self.emit_expr(&channel.node, 0);
                self.write(" <- ");
                self.emit_expr(&value.node, 0);
            }
            Stmt::Expr(expr) => self.emit_expr(&expr.node, 0),
            Stmt::If { cond, then_body, else_body } => {
                self.write("if ");
                self.emit_expr(&cond.node, 0);
                self.write(" ");
                self.emit_block(then_body);
                if !else_body.is_empty() {
                    self.write(" else ");
                    self.emit_block(else_body);
                }
            }
            Stmt::For { cond, body } => {
                self.write("for ");
                if let Some(cond) = cond {
                    self.emit_expr(&cond.node, 0);
                    self.write(" ");
                }
                self.emit_block(body);
            }
            Stmt::Break => self.write("break"),
            Stmt::Select(select) => {
                self.write("select {");
                self.newline();
                for clause in &select.clauses {
                    self.write_indent();
                    if clause.guards.is_empty() {
                        self.write("default:");
                    } else {
                        self.write("case ");
                        for (i, guard) in clause.guards.iter().enumerate() {
                            if i > 0 {
                                self.write(", ");
                            }
                            self.emit_stmt(&guard.node);
                        }
                        self.write(":");
                    }
                    self.newline();
                    self.indent();
                    self.emit_stmts(&clause.body);
                    self.dedent();
                }
                self.write_indent();
                self.write("}");
            }
            Stmt::CheckedSelect(construct) => self.emit_checked_select(construct),
            Stmt::Breakable(body) => {
                self.write("breakable ");
                self.emit_block(body);
            }
            Stmt::VarKill(var) => {
                self.write("varkill ");
                self.write(&self.var_name(*var));
            }
        }
    }

    fn emit_checked_select(&mut self, construct: &SelectConstruct) {
        for stmt in &construct.init {
            self.emit_stmt(&stmt.node);
            self.newline();
            self.write_indent();
        }
        self.write("select {");
        self.newline();
        for case in &construct.cases {
            self.write_indent();
            self.emit_case_head(case);
            self.newline();
            self.indent();
            self.emit_stmts(&case.body);
            self.dedent();
        }
        self.write_indent();
        self.write("}");
    }

    fn emit_case_head(&mut self, case: &Case) {
        if case.kind.is_default() {
            self.write("default:");
            return;
        }
        self.write("case ");
        for stmt in &case.init {
            self.emit_stmt(&stmt.node);
            self.write("; ");
        }
        match &case.kind {
            CaseKind::Send { channel, value } => {
                self.emit_expr(&channel.node, 0);
                self.write(" <- ");
                self.emit_expr(&value.node, 0);
            }
            CaseKind::Recv { target, channel, .. } => {
                if !target.node.is_blank() {
                    self.emit_expr(&target.node, 0);
                    self.write(" = ");
                }
                self.write("<-");
                self.emit_expr(&channel.node, PREC_UNARY);
            }
            CaseKind::RecvOk { target, ok, channel, .. } => {
                self.emit_expr(&target.node, 0);
                self.write(", ");
                self.emit_expr(&ok.node, 0);
                self.write(" = <-");
                self.emit_expr(&channel.node, PREC_UNARY);
            }
            CaseKind::Default => {}
        }
        self.write(":");
    }

    // ── Expressions ──────────────────────────────────────────────────

    fn emit_expr_list(&mut self, exprs: &[Spanned<Expr>]) {
        for (i, e) in exprs.iter().enumerate() {
            if i > 0 {
                self.write(", ");
            }
            self.emit_expr(&e.node, 0);
        }
    }

    fn emit_expr(&mut self, expr: &Expr, parent_prec: u8) {
        match expr {
            Expr::IntLit(n) => self.write(&n.to_string()),
            Expr::BoolLit(b) => self.write(if *b { "true" } else { "false" }),
            Expr::Nil => self.write("nil"),
            Expr::Ident(ident) => self.write(&ident.name),
            Expr::Blank => self.write("_"),
            Expr::Call { func, args } => {
                self.write(&func.node);
                self.emit_args(args);
            }
            Expr::Runtime { func, args } => {
                self.write(func.name());
                self.emit_args(args);
            }
            Expr::Recv(channel) => {
                self.write("<-");
                self.emit_expr(&channel.node, PREC_UNARY);
            }
            Expr::Unary { op, operand } => {
                self.write(match op {
                    UnaryOp::Not => "!",
                    UnaryOp::Neg => "-",
                });
                self.emit_expr(&operand.node, PREC_UNARY);
            }
            Expr::Binary { op, lhs, rhs } => {
                let prec = binop_prec(*op);
                let need_parens = prec < parent_prec;
                if need_parens {
                    self.write("(");
                }
                self.emit_expr(&lhs.node, prec);
                self.write(" ");
                self.write(op.symbol());
                self.write(" ");
                // Same precedence on the right needs parens.
                self.emit_expr(&rhs.node, prec + 1);
                if need_parens {
                    self.write(")");
                }
            }
            Expr::Conv { expr, to, .. } => {
                self.write(&to.to_string());
                self.write("(");
                self.emit_expr(&expr.node, 0);
                self.write(")");
            }
            Expr::ConvNop { expr, to } => {
                self.write("(");
                self.write(&to.to_string());
                self.write(")(");
                self.emit_expr(&expr.node, 0);
                self.write(")");
            }
            Expr::AddrOf(inner) => {
                self.write("&");
                self.emit_expr(&inner.node, PREC_UNARY);
            }
            Expr::Index { base, index } => {
                self.emit_expr(&base.node, PREC_POSTFIX);
                self.write(&format!("[{index}]"));
            }
            Expr::Field { base, field } => {
                self.emit_expr(&base.node, PREC_POSTFIX);
                self.write(".");
                self.write(field);
            }
        }
    }

    fn emit_args(&mut self, args: &[Spanned<Expr>]) {
        self.write("(");
        self.emit_expr_list(args);
        self.write(")");
    }
}

const PREC_UNARY: u8 = 20;
const PREC_POSTFIX: u8 = 25;

fn binop_prec(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 1,
        BinOp::And => 3,
        BinOp::Eq | BinOp::Neq => 5,
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => 7,
        BinOp::Add | BinOp::Sub => 9,
    }
}
