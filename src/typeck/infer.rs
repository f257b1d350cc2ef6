use crate::parser::ast::*;
use crate::pretty::expr_to_string;
use crate::span::Spanned;

use super::check::Checker;
use super::resolve::conversion_target;
use super::types::{Assignability, Type, assignability};
use super::type_of;

impl Checker<'_> {
    /// Resolve names inside `expr`, report type errors, and return its type.
    /// Conversions spelled as calls are rewritten to `Expr::Conv`.
    pub(crate) fn check_expr(&mut self, expr: &mut Spanned<Expr>) -> Type {
        let span = expr.span;
        match &mut expr.node {
            Expr::IntLit(_) => Type::Int,
            Expr::BoolLit(_) => Type::Bool,
            Expr::Nil => Type::Nil,
            Expr::Ident(ident) => match self.env.lookup(&ident.name) {
                Some(var) => {
                    ident.var = Some(var);
                    self.locals.ty(var)
                }
                None => {
                    self.diags.type_error(span, format!("undefined: {}", ident.name));
                    Type::Invalid
                }
            },
            Expr::Blank => {
                self.diags.type_error(span, "cannot use _ as value");
                Type::Invalid
            }
            Expr::Call { func, .. }
                if !self.env.functions.contains_key(&func.node) && conversion_target(&func.node).is_some() =>
            {
                let to = conversion_target(&func.node).unwrap_or(Type::Invalid);
                self.check_conversion(expr, to)
            }
            Expr::Call { func, args } => {
                let sig = self.env.functions.get(&func.node).cloned();
                match sig {
                    Some(sig) => {
                        if args.len() != sig.params.len() {
                            let which = if args.len() < sig.params.len() { "not enough" } else { "too many" };
                            self.diags.type_error(span, format!("{which} arguments in call to {}", func.node));
                        }
                        let context = format!("argument to {}", func.node);
                        for (arg, param) in args.iter_mut().zip(sig.params.iter()) {
                            let ty = self.check_expr(arg);
                            self.coerce(arg, &ty, param, &context);
                        }
                    }
                    None => {
                        // Undeclared functions are external and take their arguments as-is.
                        for arg in args.iter_mut() {
                            let ty = self.check_expr(arg);
                            if ty == Type::Nil {
                                self.diags.type_error(arg.span, "use of untyped nil in argument");
                            }
                        }
                    }
                }
                Type::Int
            }
            Expr::Recv(operand) => {
                let ty = self.check_expr(operand);
                match ty.chan_elem() {
                    Some((dir, elem)) => {
                        if !dir.can_recv() {
                            self.diags.type_error(
                                span,
                                format!(
                                    "invalid operation: cannot receive from send-only channel {} (type {ty})",
                                    expr_to_string(&operand.node)
                                ),
                            );
                        }
                        elem.clone()
                    }
                    None => {
                        if !ty.is_invalid() {
                            self.diags.type_error(
                                span,
                                format!(
                                    "invalid operation: cannot receive from non-channel {} (type {ty})",
                                    expr_to_string(&operand.node)
                                ),
                            );
                        }
                        Type::Invalid
                    }
                }
            }
            Expr::Unary { op, operand } => {
                let ty = self.check_expr(operand);
                let (want, sym) = match op {
                    UnaryOp::Not => (Type::Bool, "!"),
                    UnaryOp::Neg => (Type::Int, "-"),
                };
                if !ty.is_invalid() && ty != want {
                    self.diags.type_error(
                        span,
                        format!(
                            "invalid operation: operator {sym} not defined on {} (type {ty})",
                            expr_to_string(&operand.node)
                        ),
                    );
                }
                want
            }
            Expr::Binary { op, lhs, rhs } => {
                let op = *op;
                let lt = self.check_expr(lhs);
                let rt = self.check_expr(rhs);
                if lt.is_invalid() || rt.is_invalid() {
                    return binary_result(op);
                }
                let ok = match op {
                    BinOp::Add | BinOp::Sub | BinOp::Lt | BinOp::LtEq | BinOp::Gt | BinOp::GtEq => {
                        lt == Type::Int && rt == Type::Int
                    }
                    BinOp::And | BinOp::Or => lt == Type::Bool && rt == Type::Bool,
                    BinOp::Eq | BinOp::Neq => {
                        assignability(&lt, &rt) == Assignability::Identical
                            || assignability(&rt, &lt) == Assignability::Identical
                    }
                };
                if !ok {
                    let msg = if lt == rt {
                        format!("invalid operation: operator {} not defined on {lt}", op.symbol())
                    } else {
                        format!("invalid operation: mismatched types {lt} and {rt}")
                    };
                    self.diags.type_error(span, msg);
                }
                binary_result(op)
            }
            Expr::Conv { .. }
            | Expr::ConvNop { .. }
            | Expr::AddrOf(_)
            | Expr::Index { .. }
            | Expr::Field { .. }
            | Expr::Runtime { .. } => type_of(&expr.node, &self.locals),
        }
    }

    fn check_conversion(&mut self, expr: &mut Spanned<Expr>, to: Type) -> Type {
        let span = expr.span;
        let Expr::Call { args, .. } = &mut expr.node else {
            return Type::Invalid;
        };
        if args.len() != 1 {
            self.diags.type_error(span, format!("wrong argument count in conversion to {to}"));
            return Type::Invalid;
        }
        let mut arg = args.remove(0);
        let from = self.check_expr(&mut arg);
        if assignability(&from, &to) == Assignability::No {
            self.diags.type_error(
                span,
                format!("cannot convert {} (type {from}) to type {to}", expr_to_string(&arg.node)),
            );
        }
        expr.node = Expr::Conv { expr: Box::new(arg), to: to.clone(), implicit: false };
        to
    }

    /// Make `expr` (of type `from`) usable as `to`, inserting an implicit
    /// conversion when needed.
    pub(crate) fn coerce(&mut self, expr: &mut Spanned<Expr>, from: &Type, to: &Type, context: &str) {
        match assignability(from, to) {
            Assignability::Identical => {}
            Assignability::Convert => {
                let inner = std::mem::replace(&mut expr.node, Expr::Nil);
                expr.node = Expr::Conv {
                    expr: Box::new(Spanned::new(inner, expr.span)),
                    to: to.clone(),
                    implicit: true,
                };
            }
            Assignability::No => {
                let msg = if *from == Type::Nil {
                    format!("cannot use nil as type {to} in {context}")
                } else {
                    format!(
                        "cannot use {} (type {from}) as type {to} in {context}",
                        expr_to_string(&expr.node)
                    )
                };
                self.diags.type_error(expr.span, msg);
            }
        }
    }
}

fn binary_result(op: BinOp) -> Type {
    match op {
        BinOp::Add | BinOp::Sub => Type::Int,
        _ => Type::Bool,
    }
}
