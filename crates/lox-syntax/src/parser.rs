use std::mem;
use std::rc::Rc;

use lox_common::error::{ErrorS, Result, SyntaxError};

use crate::ast::{
    Expr, ExprAssign, ExprCall, ExprGet, ExprGrouping, ExprInfix, ExprLiteral, ExprLogical,
    ExprPrefix, ExprS, ExprSet, ExprSuper, ExprThis, ExprVar, OpInfix, OpLogical, OpPrefix,
    Program, Span, Spanned, Stmt, StmtBlock, StmtClass, StmtExpr, StmtFun, StmtIf, StmtPrint,
    StmtReturn, StmtS, StmtVar, StmtWhile, Var,
};
use crate::lexer::{Lexer, Token};

/// Maximum number of parameters a function may declare, and of arguments a
/// call may pass.
pub const MAX_ARGS: usize = 255;

/// A recursive-descent parser for Lox.
///
/// Syntax errors do not stop the parse: the parser records the error, skips
/// ahead to the next statement boundary and carries on, so that a single run
/// can report every error in the source.
pub struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Spanned<Token>>,
    cursor: usize,
    errors: Vec<ErrorS>,
}

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();
        for token in Lexer::new(source) {
            match token {
                Ok(token) => tokens.push(token),
                Err(e) => errors.push(e),
            }
        }
        Self { source, tokens, cursor: 0, errors }
    }

    pub fn parse(mut self) -> (Program, Vec<ErrorS>) {
        let mut program = Program::default();
        while !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                program.stmts.push(stmt);
            }
        }
        (program, self.errors)
    }

    fn declaration(&mut self) -> Option<StmtS> {
        let start = self.start();
        let result = if self.eat(&Token::Class) {
            self.class_decl(start)
        } else if self.eat(&Token::Fun) {
            self.function("function").map(|fun| (Stmt::Fun(Rc::new(fun)), self.span_from(start)))
        } else if self.eat(&Token::Var) {
            self.var_decl(start)
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }

    fn class_decl(&mut self, start: usize) -> Result<StmtS> {
        let (name, _) = self.expect_ident("class name")?;
        let super_ = if self.eat(&Token::Less) {
            let (name, span) = self.expect_ident("superclass name")?;
            Some((Expr::Var(ExprVar { var: Var::new(name) }), span))
        } else {
            None
        };

        self.expect(&Token::LtBrace, "'{' before class body")?;
        let mut methods = Vec::new();
        while !self.check(&Token::RtBrace) && !self.is_at_end() {
            let start = self.start();
            let method = self.function("method")?;
            methods.push((Rc::new(method), self.span_from(start)));
        }
        self.expect(&Token::RtBrace, "'}' after class body")?;

        let class = StmtClass { name, super_, methods };
        Ok((Stmt::Class(Box::new(class)), self.span_from(start)))
    }

    fn function(&mut self, kind: &str) -> Result<StmtFun> {
        let (name, _) = self.expect_ident(&format!("{kind} name"))?;
        self.expect(&Token::LtParen, &format!("'(' after {kind} name"))?;

        let mut params = Vec::new();
        if !self.check(&Token::RtParen) {
            loop {
                if params.len() >= MAX_ARGS {
                    let span = self.peek_span();
                    self.errors.push((SyntaxError::TooManyParameters { max: MAX_ARGS }.into(), span));
                }
                let (param, _) = self.expect_ident("parameter name")?;
                params.push(param);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        self.expect(&Token::RtParen, "')' after parameters")?;

        self.expect(&Token::LtBrace, &format!("'{{' before {kind} body"))?;
        let body = self.block()?;
        Ok(StmtFun { name, params, body })
    }

    fn var_decl(&mut self, start: usize) -> Result<StmtS> {
        let (name, _) = self.expect_ident("variable name")?;
        let value = if self.eat(&Token::Equal) { Some(self.expression()?) } else { None };
        self.expect(&Token::Semicolon, "';' after variable declaration")?;
        Ok((Stmt::Var(StmtVar { var: Var::new(name), value }), self.span_from(start)))
    }

    fn statement(&mut self) -> Result<StmtS> {
        let start = self.start();
        if self.eat(&Token::For) {
            self.for_stmt(start)
        } else if self.eat(&Token::If) {
            self.if_stmt(start)
        } else if self.eat(&Token::Print) {
            let value = self.expression()?;
            self.expect(&Token::Semicolon, "';' after value")?;
            Ok((Stmt::Print(StmtPrint { value }), self.span_from(start)))
        } else if self.eat(&Token::Return) {
            let value = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
            self.expect(&Token::Semicolon, "';' after return value")?;
            Ok((Stmt::Return(StmtReturn { value }), self.span_from(start)))
        } else if self.eat(&Token::While) {
            self.expect(&Token::LtParen, "'(' after 'while'")?;
            let cond = self.expression()?;
            self.expect(&Token::RtParen, "')' after condition")?;
            let body = self.statement()?;
            Ok((Stmt::While(Box::new(StmtWhile { cond, body })), self.span_from(start)))
        } else if self.eat(&Token::LtBrace) {
            let block = self.block()?;
            Ok((Stmt::Block(block), self.span_from(start)))
        } else {
            self.expr_stmt()
        }
    }

    /// Desugars `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_stmt(&mut self, start: usize) -> Result<StmtS> {
        self.expect(&Token::LtParen, "'(' after 'for'")?;
        let init_start = self.start();
        let init = if self.eat(&Token::Semicolon) {
            None
        } else if self.eat(&Token::Var) {
            Some(self.var_decl(init_start)?)
        } else {
            Some(self.expr_stmt()?)
        };

        let cond = if self.check(&Token::Semicolon) { None } else { Some(self.expression()?) };
        self.expect(&Token::Semicolon, "';' after loop condition")?;

        let incr = if self.check(&Token::RtParen) { None } else { Some(self.expression()?) };
        self.expect(&Token::RtParen, "')' after for clauses")?;

        let body = self.statement()?;
        let span = self.span_from(start);

        let body = match incr {
            Some(incr) => {
                let incr_span = incr.1.clone();
                let stmts = vec![body, (Stmt::Expr(StmtExpr { value: incr }), incr_span)];
                (Stmt::Block(StmtBlock { stmts }), span.clone())
            }
            None => body,
        };
        let cond = cond.unwrap_or_else(|| (Expr::Literal(ExprLiteral::Bool(true)), span.clone()));
        let while_ = (Stmt::While(Box::new(StmtWhile { cond, body })), span.clone());

        Ok(match init {
            Some(init) => (Stmt::Block(StmtBlock { stmts: vec![init, while_] }), span),
            None => while_,
        })
    }

    fn if_stmt(&mut self, start: usize) -> Result<StmtS> {
        self.expect(&Token::LtParen, "'(' after 'if'")?;
        let cond = self.expression()?;
        self.expect(&Token::RtParen, "')' after if condition")?;
        let then = self.statement()?;
        let else_ = if self.eat(&Token::Else) { Some(self.statement()?) } else { None };
        Ok((Stmt::If(Box::new(StmtIf { cond, then, else_ })), self.span_from(start)))
    }

    /// Parses the statements of a block whose opening brace has already been
    /// consumed.
    fn block(&mut self) -> Result<StmtBlock> {
        let mut stmts = Vec::new();
        while !self.check(&Token::RtBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                stmts.push(stmt);
            }
        }
        self.expect(&Token::RtBrace, "'}' after block")?;
        Ok(StmtBlock { stmts })
    }

    fn expr_stmt(&mut self) -> Result<StmtS> {
        let start = self.start();
        let value = self.expression()?;
        self.expect(&Token::Semicolon, "';' after expression")?;
        Ok((Stmt::Expr(StmtExpr { value }), self.span_from(start)))
    }

    fn expression(&mut self) -> Result<ExprS> {
        self.assignment()
    }

    fn assignment(&mut self) -> Result<ExprS> {
        let start = self.start();
        let expr = self.logic_or()?;
        if !self.check(&Token::Equal) {
            return Ok(expr);
        }

        let equals = self.peek_span();
        self.cursor += 1;
        let value = self.assignment()?;
        let span = self.span_from(start);
        match expr {
            (Expr::Var(ExprVar { var }), _) => {
                Ok((Expr::Assign(Box::new(ExprAssign { var: Var::new(var.name), value })), span))
            }
            (Expr::Get(get), _) => {
                let ExprGet { object, name } = *get;
                Ok((Expr::Set(Box::new(ExprSet { object, name, value })), span))
            }
            expr => {
                // Reported, but the parser is not confused: no need to synchronize.
                self.errors.push((SyntaxError::InvalidAssignTarget.into(), equals));
                Ok(expr)
            }
        }
    }

    fn logic_or(&mut self) -> Result<ExprS> {
        self.logical(OpLogical::Or, &Token::Or, Self::logic_and)
    }

    fn logic_and(&mut self) -> Result<ExprS> {
        self.logical(OpLogical::And, &Token::And, Self::equality)
    }

    fn logical(
        &mut self,
        op: OpLogical,
        token: &Token,
        operand: fn(&mut Self) -> Result<ExprS>,
    ) -> Result<ExprS> {
        let start = self.start();
        let mut expr = operand(self)?;
        while self.eat(token) {
            let rt = operand(self)?;
            expr = (Expr::Logical(Box::new(ExprLogical { lt: expr, op, rt })), self.span_from(start));
        }
        Ok(expr)
    }

    fn equality(&mut self) -> Result<ExprS> {
        self.infix(Self::comparison, |token| match token {
            Token::BangEqual => Some(OpInfix::NotEqual),
            Token::EqualEqual => Some(OpInfix::Equal),
            _ => None,
        })
    }

    fn comparison(&mut self) -> Result<ExprS> {
        self.infix(Self::term, |token| match token {
            Token::Greater => Some(OpInfix::Greater),
            Token::GreaterEqual => Some(OpInfix::GreaterEqual),
            Token::Less => Some(OpInfix::Less),
            Token::LessEqual => Some(OpInfix::LessEqual),
            _ => None,
        })
    }

    fn term(&mut self) -> Result<ExprS> {
        self.infix(Self::factor, |token| match token {
            Token::Minus => Some(OpInfix::Subtract),
            Token::Plus => Some(OpInfix::Add),
            _ => None,
        })
    }

    fn factor(&mut self) -> Result<ExprS> {
        self.infix(Self::unary, |token| match token {
            Token::Slash => Some(OpInfix::Divide),
            Token::Asterisk => Some(OpInfix::Multiply),
            _ => None,
        })
    }

    /// Parses a left-associative chain of binary operators of the same
    /// precedence.
    fn infix(
        &mut self,
        operand: fn(&mut Self) -> Result<ExprS>,
        op_of: fn(&Token) -> Option<OpInfix>,
    ) -> Result<ExprS> {
        let start = self.start();
        let mut expr = operand(self)?;
        while let Some(op) = self.peek().and_then(op_of) {
            self.cursor += 1;
            let rt = operand(self)?;
            expr = (Expr::Infix(Box::new(ExprInfix { lt: expr, op, rt })), self.span_from(start));
        }
        Ok(expr)
    }

    fn unary(&mut self) -> Result<ExprS> {
        let start = self.start();
        let op = match self.peek() {
            Some(Token::Bang) => OpPrefix::Not,
            Some(Token::Minus) => OpPrefix::Negate,
            _ => return self.call(),
        };
        self.cursor += 1;
        let rt = self.unary()?;
        Ok((Expr::Prefix(Box::new(ExprPrefix { op, rt })), self.span_from(start)))
    }

    fn call(&mut self) -> Result<ExprS> {
        let start = self.start();
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::LtParen) {
                let mut args = Vec::new();
                if !self.check(&Token::RtParen) {
                    loop {
                        if args.len() >= MAX_ARGS {
                            let span = self.peek_span();
                            self.errors
                                .push((SyntaxError::TooManyArguments { max: MAX_ARGS }.into(), span));
                        }
                        args.push(self.expression()?);
                        if !self.eat(&Token::Comma) {
                            break;
                        }
                    }
                }
                self.expect(&Token::RtParen, "')' after arguments")?;
                expr = (Expr::Call(Box::new(ExprCall { callee: expr, args })), self.span_from(start));
            } else if self.eat(&Token::Dot) {
                let (name, _) = self.expect_ident("property name after '.'")?;
                expr = (Expr::Get(Box::new(ExprGet { object: expr, name })), self.span_from(start));
            } else {
                break;
            }
        }
        Ok(expr)
    }

    fn primary(&mut self) -> Result<ExprS> {
        let start = self.start();
        let token = match self.peek() {
            Some(token) => token.clone(),
            None => return Err(self.error_here("expression")),
        };

        let expr = match token {
            Token::False => Expr::Literal(ExprLiteral::Bool(false)),
            Token::True => Expr::Literal(ExprLiteral::Bool(true)),
            Token::Nil => Expr::Literal(ExprLiteral::Nil),
            Token::Number(number) => Expr::Literal(ExprLiteral::Number(number)),
            Token::String(string) => Expr::Literal(ExprLiteral::String(string)),
            Token::This => Expr::This(ExprThis { this: Var::new("this") }),
            Token::Identifier(name) => Expr::Var(ExprVar { var: Var::new(name) }),
            Token::LtParen => {
                self.cursor += 1;
                let value = self.expression()?;
                self.expect(&Token::RtParen, "')' after expression")?;
                let grouping = Expr::Grouping(Box::new(ExprGrouping { value }));
                return Ok((grouping, self.span_from(start)));
            }
            Token::Super => {
                self.cursor += 1;
                self.expect(&Token::Dot, "'.' after 'super'")?;
                let (name, _) = self.expect_ident("superclass method name")?;
                let super_ = Expr::Super(ExprSuper { super_: Var::new("super"), name });
                return Ok((super_, self.span_from(start)));
            }
            _ => return Err(self.error_here("expression")),
        };
        self.cursor += 1;
        Ok((expr, self.span_from(start)))
    }

    /// Discards tokens until the start of what is probably the next
    /// statement.
    fn synchronize(&mut self) {
        if self.is_at_end() {
            return;
        }
        self.cursor += 1;

        while let Some(token) = self.peek() {
            if self.tokens[self.cursor - 1].0 == Token::Semicolon {
                return;
            }
            match token {
                Token::Class
                | Token::Fun
                | Token::Var
                | Token::For
                | Token::If
                | Token::While
                | Token::Print
                | Token::Return => return,
                _ => self.cursor += 1,
            }
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn peek_span(&self) -> Span {
        match self.tokens.get(self.cursor) {
            Some((_, span)) => span.clone(),
            None => self.source.len()..self.source.len(),
        }
    }

    fn check(&self, token: &Token) -> bool {
        self.peek().map_or(false, |next| mem::discriminant(next) == mem::discriminant(token))
    }

    fn eat(&mut self, token: &Token) -> bool {
        let matched = self.check(token);
        if matched {
            self.cursor += 1;
        }
        matched
    }

    fn expect(&mut self, token: &Token, expected: &str) -> Result<Span> {
        if self.check(token) {
            let span = self.peek_span();
            self.cursor += 1;
            Ok(span)
        } else {
            Err(self.error_here(expected))
        }
    }

    fn expect_ident(&mut self, expected: &str) -> Result<Spanned<String>> {
        match self.tokens.get(self.cursor) {
            Some((Token::Identifier(name), span)) => {
                let ident = (name.clone(), span.clone());
                self.cursor += 1;
                Ok(ident)
            }
            _ => Err(self.error_here(expected)),
        }
    }

    fn error_here(&self, expected: &str) -> ErrorS {
        let span = self.peek_span();
        let error = if self.is_at_end() {
            SyntaxError::UnrecognizedEOF { expected: expected.to_string() }
        } else {
            let token = self.source[span.clone()].to_string();
            SyntaxError::UnrecognizedToken { token, expected: expected.to_string() }
        };
        (error.into(), span)
    }

    fn is_at_end(&self) -> bool {
        self.cursor >= self.tokens.len()
    }

    /// Start offset of the next token.
    fn start(&self) -> usize {
        self.peek_span().start
    }

    fn span_from(&self, start: usize) -> Span {
        let end = match self.cursor.checked_sub(1).and_then(|idx| self.tokens.get(idx)) {
            Some((_, span)) => span.end,
            None => start,
        };
        start..end.max(start)
    }
}
