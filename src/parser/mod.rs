pub mod ast;

use crate::diagnostics::CompileError;
use crate::lexer::token::Token;
use crate::span::{Span, Spanned};
use crate::typeck::types::ChanDir;
use ast::*;

pub struct Parser<'a> {
    tokens: &'a [Spanned<Token>],
    source: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Spanned<Token>], source: &'a str) -> Self {
        Self { tokens, source, pos: 0 }
    }

    fn peek(&self) -> Option<&Spanned<Token>> {
        let mut i = self.pos;
        // Skip newlines when peeking
        while i < self.tokens.len() {
            if matches!(self.tokens[i].node, Token::Newline) {
                i += 1;
            } else {
                return Some(&self.tokens[i]);
            }
        }
        None
    }

    fn peek_raw(&self) -> Option<&Spanned<Token>> {
        self.tokens.get(self.pos)
    }

    fn peek_is(&self, expected: &Token) -> bool {
        self.peek().is_some_and(|t| std::mem::discriminant(&t.node) == std::mem::discriminant(expected))
    }

    fn peek_raw_is(&self, expected: &Token) -> bool {
        self.peek_raw()
            .is_some_and(|t| std::mem::discriminant(&t.node) == std::mem::discriminant(expected))
    }

    fn advance(&mut self) -> Option<&Spanned<Token>> {
        if self.pos < self.tokens.len() {
            let tok = &self.tokens[self.pos];
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    fn skip_newlines(&mut self) {
        while self.pos < self.tokens.len() && matches!(self.tokens[self.pos].node, Token::Newline) {
            self.pos += 1;
        }
    }

    fn skip_separators(&mut self) {
        while self.pos < self.tokens.len()
            && matches!(self.tokens[self.pos].node, Token::Newline | Token::Semi)
        {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<Span, CompileError> {
        self.skip_newlines();
        match self.tokens.get(self.pos) {
            Some(tok) if std::mem::discriminant(&tok.node) == std::mem::discriminant(expected) => {
                self.pos += 1;
                Ok(tok.span)
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected {expected}, found {}", tok.node),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                format!("expected {expected}, found end of file"),
                self.eof_span(),
            )),
        }
    }

    fn expect_ident(&mut self) -> Result<Spanned<String>, CompileError> {
        self.skip_newlines();
        match self.tokens.get(self.pos) {
            Some(tok) if matches!(tok.node, Token::Ident) => {
                let name = self.text(tok.span).to_string();
                self.pos += 1;
                Ok(Spanned::new(name, tok.span))
            }
            Some(tok) => Err(CompileError::syntax(
                format!("expected identifier, found {}", tok.node),
                tok.span,
            )),
            None => Err(CompileError::syntax(
                "expected identifier, found end of file",
                self.eof_span(),
            )),
        }
    }

    fn text(&self, span: Span) -> &'a str {
        &self.source[span.start..span.end]
    }

    fn eof_span(&self) -> Span {
        if let Some(last) = self.tokens.last() {
            Span::new(last.span.end, last.span.end)
        } else {
            Span::dummy()
        }
    }

    /// A statement ends at a newline, `;`, a closing brace, or end of input.
    /// Inside a select clause body the next `case`/`default` also ends it.
    fn consume_statement_end(&mut self) -> Result<(), CompileError> {
        match self.peek_raw() {
            None => Ok(()),
            Some(tok) => match tok.node {
                Token::Newline | Token::Semi => {
                    self.advance();
                    Ok(())
                }
                Token::RBrace | Token::Case | Token::Default => Ok(()),
                _ => Err(CompileError::syntax(
                    format!("expected newline or ';' after statement, found {}", tok.node),
                    tok.span,
                )),
            },
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut functions = Vec::new();
        self.skip_separators();
        while self.peek().is_some() {
            functions.push(self.parse_function()?);
            self.skip_separators();
        }
        Ok(Program { functions })
    }

    fn parse_function(&mut self) -> Result<Spanned<Function>, CompileError> {
        let start = self.expect(&Token::Func)?.start;
        let name = self.expect_ident()?;
        self.expect(&Token::LParen)?;
        let mut params = Vec::new();
        self.skip_newlines();
        while !self.peek_is(&Token::RParen) {
            if !params.is_empty() {
                self.expect(&Token::Comma)?;
                self.skip_newlines();
            }
            let pname = self.expect_ident()?;
            let ty = self.parse_type()?;
            params.push(Param { name: pname, ty, var: None });
            self.skip_newlines();
        }
        self.expect(&Token::RParen)?;
        let (body, body_span) = self.parse_block()?;
        Ok(Spanned::new(
            Function { name, params, body, locals: Locals::default() },
            Span::new(start, body_span.end),
        ))
    }

    fn parse_type(&mut self) -> Result<Spanned<TypeExpr>, CompileError> {
        self.skip_newlines();
        let Some(tok) = self.peek_raw().cloned() else {
            return Err(CompileError::syntax("expected type, found end of file", self.eof_span()));
        };
        match tok.node {
            Token::Chan => {
                self.advance();
                let dir = if self.peek_raw_is(&Token::Arrow) {
                    self.advance();
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                let elem = self.parse_type()?;
                let span = Span::new(tok.span.start, elem.span.end);
                Ok(Spanned::new(TypeExpr::Chan { dir, elem: Box::new(elem) }, span))
            }
            Token::Arrow => {
                self.advance();
                self.expect(&Token::Chan)?;
                let elem = self.parse_type()?;
                let span = Span::new(tok.span.start, elem.span.end);
                Ok(Spanned::new(TypeExpr::Chan { dir: ChanDir::Recv, elem: Box::new(elem) }, span))
            }
            Token::Ident => {
                self.advance();
                Ok(Spanned::new(TypeExpr::Named(self.text(tok.span).to_string()), tok.span))
            }
            other => Err(CompileError::syntax(format!("expected type, found {other}"), tok.span)),
        }
    }

    fn parse_block(&mut self) -> Result<(Vec<Spanned<Stmt>>, Span), CompileError> {
        let open = self.expect(&Token::LBrace)?;
        let mut stmts = Vec::new();
        self.skip_separators();
        while self.peek().is_some() && !self.peek_is(&Token::RBrace) {
            stmts.push(self.parse_stmt()?);
            self.consume_statement_end()?;
            self.skip_separators();
        }
        let close = self.expect(&Token::RBrace)?;
        Ok((stmts, Span::new(open.start, close.end)))
    }

    fn parse_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let tok = self.peek().cloned().ok_or_else(|| {
            CompileError::syntax("unexpected end of file", self.eof_span())
        })?;

        match tok.node {
            Token::Var => self.parse_var_stmt(),
            Token::If => self.parse_if_stmt(),
            Token::For => self.parse_for_stmt(),
            Token::Select => self.parse_select_stmt(),
            Token::Break => {
                self.skip_newlines();
                self.advance();
                Ok(Spanned::new(Stmt::Break, tok.span))
            }
            _ => {
                let mut stmts = self.parse_simple_stmt()?;
                if stmts.len() > 1 {
                    return Err(CompileError::syntax(
                        "expected '=' or ':=' after expression list",
                        stmts[1].span,
                    ));
                }
                stmts.pop().ok_or_else(|| CompileError::syntax("expected statement", tok.span))
            }
        }
    }

    /// Assignment, send, or expression list. A bare expression list yields one
    /// expression statement per element.
    fn parse_simple_stmt(&mut self) -> Result<Vec<Spanned<Stmt>>, CompileError> {
        let lhs = self.parse_expr_list()?;
        let start = lhs[0].span.start;

        match self.peek_raw().map(|t| t.node.clone()) {
            Some(Token::Eq) | Some(Token::ColonEq) => {
                let define = self.peek_raw_is(&Token::ColonEq);
                self.advance();
                self.skip_newlines();
                let rhs = self.parse_expr_list()?;
                let end = rhs.last().map(|e| e.span.end).unwrap_or(start);
                Ok(vec![Spanned::new(Stmt::Assign { lhs, rhs, define }, Span::new(start, end))])
            }
            Some(Token::Arrow) => {
                let arrow = self.advance().map(|t| t.span).unwrap_or_else(Span::dummy);
                if lhs.len() != 1 {
                    return Err(CompileError::syntax("send statement takes a single channel", arrow));
                }
                self.skip_newlines();
                let value = self.parse_expr(0)?;
                let mut lhs = lhs;
                let channel = lhs.remove(0);
                let span = Span::new(start, value.span.end);
                Ok(vec![Spanned::new(Stmt::Send { channel, value }, span)])
            }
            _ => Ok(lhs
                .into_iter()
                .map(|e| {
                    let span = e.span;
                    Spanned::new(Stmt::Expr(e), span)
                })
                .collect()),
        }
    }

    fn parse_expr_list(&mut self) -> Result<Vec<Spanned<Expr>>, CompileError> {
        let mut exprs = vec![self.parse_expr(0)?];
        while self.peek_raw_is(&Token::Comma) {
            self.advance();
            self.skip_newlines();
            exprs.push(self.parse_expr(0)?);
        }
        Ok(exprs)
    }

    fn parse_var_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::Var)?.start;
        let name = self.expect_ident()?;
        let mut end = name.span.end;

        let ty = if self.peek_raw_is(&Token::Eq) {
            None
        } else {
            let ty = self.parse_type()?;
            end = ty.span.end;
            Some(ty)
        };

        let value = if self.peek_raw_is(&Token::Eq) {
            self.advance();
            self.skip_newlines();
            let value = self.parse_expr(0)?;
            end = value.span.end;
            Some(value)
        } else {
            None
        };

        Ok(Spanned::new(Stmt::Var { name, ty, value, var: None }, Span::new(start, end)))
    }

    fn parse_if_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::If)?.start;
        let cond = self.parse_expr(0)?;
        let (then_body, then_span) = self.parse_block()?;
        let mut end = then_span.end;

        let else_body = if self.peek_raw_is(&Token::Else) {
            self.advance();
            if self.peek_is(&Token::If) {
                let nested = self.parse_if_stmt()?;
                end = nested.span.end;
                vec![nested]
            } else {
                let (body, span) = self.parse_block()?;
                end = span.end;
                body
            }
        } else {
            Vec::new()
        };

        Ok(Spanned::new(Stmt::If { cond, then_body, else_body }, Span::new(start, end)))
    }

    fn parse_for_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::For)?.start;
        let cond = if self.peek_is(&Token::LBrace) { None } else { Some(self.parse_expr(0)?) };
        let (body, span) = self.parse_block()?;
        Ok(Spanned::new(Stmt::For { cond, body }, Span::new(start, span.end)))
    }

    fn parse_select_stmt(&mut self) -> Result<Spanned<Stmt>, CompileError> {
        let start = self.expect(&Token::Select)?.start;
        self.expect(&Token::LBrace)?;
        let mut clauses = Vec::new();
        self.skip_separators();

        loop {
            self.skip_separators();
            let Some(tok) = self.peek_raw().cloned() else {
                return Err(CompileError::syntax("unterminated select", self.eof_span()));
            };
            let guards = match tok.node {
                Token::RBrace => break,
                Token::Default => {
                    self.advance();
                    Vec::new()
                }
                Token::Case => {
                    self.advance();
                    self.skip_newlines();
                    self.parse_simple_stmt()?
                }
                other => {
                    return Err(CompileError::syntax(
                        format!("expected 'case' or 'default', found {other}"),
                        tok.span,
                    ));
                }
            };
            let colon = self.expect(&Token::Colon)?;

            let mut body = Vec::new();
            self.skip_separators();
            while self.peek().is_some()
                && !self.peek_is(&Token::Case)
                && !self.peek_is(&Token::Default)
                && !self.peek_is(&Token::RBrace)
            {
                body.push(self.parse_stmt()?);
                self.consume_statement_end()?;
                self.skip_separators();
            }

            clauses.push(CommClause { guards, body, span: Span::new(tok.span.start, colon.end) });
        }

        let close = self.expect(&Token::RBrace)?;
        Ok(Spanned::new(Stmt::Select(SelectStmt { clauses }), Span::new(start, close.end)))
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Spanned<Expr>, CompileError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            // A newline ends the expression unless it follows an operator.
            let Some(tok) = self.peek_raw() else { break };
            let Some(op) = binary_op(&tok.node) else { break };
            let (l_bp, r_bp) = infix_binding_power(op);
            if l_bp < min_bp {
                break;
            }
            self.advance();
            self.skip_newlines();
            let rhs = self.parse_expr(r_bp)?;
            let span = lhs.span.to(rhs.span);
            lhs = Spanned::new(Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) }, span);
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Spanned<Expr>, CompileError> {
        self.skip_newlines();
        let Some(tok) = self.advance().cloned() else {
            return Err(CompileError::syntax("expected expression, found end of file", self.eof_span()));
        };

        match tok.node {
            Token::IntLit(n) => Ok(Spanned::new(Expr::IntLit(n), tok.span)),
            Token::True => Ok(Spanned::new(Expr::BoolLit(true), tok.span)),
            Token::False => Ok(Spanned::new(Expr::BoolLit(false), tok.span)),
            Token::Nil => Ok(Spanned::new(Expr::Nil, tok.span)),
            Token::Arrow => {
                let operand = self.parse_prefix()?;
                let span = tok.span.to(operand.span);
                Ok(Spanned::new(Expr::Recv(Box::new(operand)), span))
            }
            Token::Bang | Token::Minus => {
                let op = if tok.node == Token::Bang { UnaryOp::Not } else { UnaryOp::Neg };
                let operand = self.parse_prefix()?;
                let span = tok.span.to(operand.span);
                Ok(Spanned::new(Expr::Unary { op, operand: Box::new(operand) }, span))
            }
            Token::LParen => {
                let inner = self.parse_expr(0)?;
                let close = self.expect(&Token::RParen)?;
                Ok(Spanned::new(inner.node, Span::new(tok.span.start, close.end)))
            }
            Token::Ident => {
                let name = self.text(tok.span);
                if name == "_" {
                    return Ok(Spanned::new(Expr::Blank, tok.span));
                }
                let func = Spanned::new(name.to_string(), tok.span);
                if self.peek_raw_is(&Token::LParen) {
                    return self.parse_call(func);
                }
                Ok(Spanned::new(Expr::Ident(Ident { name: func.node, var: None }), tok.span))
            }
            other => Err(CompileError::syntax(format!("expected expression, found {other}"), tok.span)),
        }
    }

    fn parse_call(&mut self, func: Spanned<String>) -> Result<Spanned<Expr>, CompileError> {
        self.expect(&Token::LParen)?;
        let mut args = Vec::new();
        self.skip_newlines();
        while !self.peek_is(&Token::RParen) {
            if !args.is_empty() {
                self.expect(&Token::Comma)?;
                self.skip_newlines();
            }
            args.push(self.parse_expr(0)?);
            self.skip_newlines();
        }
        let close = self.expect(&Token::RParen)?;
        let span = Span::new(func.span.start, close.end);
        Ok(Spanned::new(Expr::Call { func, args }, span))
    }
}

fn binary_op(tok: &Token) -> Option<BinOp> {
    Some(match tok {
        Token::PipePipe => BinOp::Or,
        Token::AmpAmp => BinOp::And,
        Token::EqEq => BinOp::Eq,
        Token::BangEq => BinOp::Neq,
        Token::Lt => BinOp::Lt,
        Token::LtEq => BinOp::LtEq,
        Token::Gt => BinOp::Gt,
        Token::GtEq => BinOp::GtEq,
        Token::Plus => BinOp::Add,
        Token::Minus => BinOp::Sub,
        _ => return None,
    })
}

fn infix_binding_power(op: BinOp) -> (u8, u8) {
    match op {
        BinOp::Or => (1, 2),
        BinOp::And => (3, 4),
        BinOp::Eq | BinOp::Neq => (5, 6),
        BinOp::Lt | BinOp::Gt | BinOp::LtEq | BinOp::GtEq => (7, 8),
        BinOp::Add | BinOp::Sub => (9, 10),
    }
}
