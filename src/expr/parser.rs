// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Recursive descent parser for rule expressions.
//!
//! Precedence, lowest first:
//! `?:`, `||`, `&&`, relations (`== != < <= > >= in`), `+ -`, `* / %`,
//! unary `! -`, then postfix member access, calls and indexing.

use crate::engine_core::errors::CompileError;
use crate::expr::ast::{BinaryOp, Expr, ExprKind, LogicalOp, UnaryOp};
use crate::expr::lexer::{tokenize, Token};
use crate::expr::value::Value;
use bytes::Bytes;
use std::ops::Range;

/// Bound on parser recursion and on the height of the resulting tree
const MAX_DEPTH: usize = 64;

/// Parse expression text into a syntax tree.
pub fn parse(source: &str) -> Result<Expr, CompileError> {
    let tokens = tokenize(source)?;
    let mut stream = TokenStream::new(&tokens, source.len());
    let expr = stream.expression(0)?;
    if let Some(token) = stream.peek() {
        return Err(CompileError::new(
            format!("Syntax error: unexpected {}", token.describe()),
            stream.offset(),
        ));
    }
    Ok(expr)
}

struct TokenStream<'src> {
    tokens: &'src [(Token, Range<usize>)],
    pos: usize,
    end: usize,
}

impl<'src> TokenStream<'src> {
    fn new(tokens: &'src [(Token, Range<usize>)], end: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            end,
        }
    }

    fn peek(&self) -> Option<&'src Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn advance(&mut self) -> Option<&'src Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Byte offset of the current token, or the end of input
    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.end)
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), CompileError> {
        if self.eat(&expected) {
            return Ok(());
        }
        let found = self
            .peek()
            .map(Token::describe)
            .unwrap_or_else(|| "end of input".to_string());
        Err(CompileError::new(
            format!("Syntax error: expected {}, found {}", expected.describe(), found),
            self.offset(),
        ))
    }

    /// Build a node, rejecting trees too tall to check and evaluate
    fn node(&self, kind: ExprKind, offset: usize) -> Result<Expr, CompileError> {
        let expr = Expr::new(kind, offset);
        if expr.height() > MAX_DEPTH {
            return Err(CompileError::new(
                "Syntax error: expression nested too deeply",
                offset,
            ));
        }
        Ok(expr)
    }

    fn guard(&self, depth: usize) -> Result<(), CompileError> {
        if depth > MAX_DEPTH {
            return Err(CompileError::new(
                "Syntax error: expression nested too deeply",
                self.offset(),
            ));
        }
        Ok(())
    }

    fn expression(&mut self, depth: usize) -> Result<Expr, CompileError> {
        self.guard(depth)?;
        let offset = self.offset();
        let cond = self.binary(0, depth)?;
        if !self.eat(&Token::Question) {
            return Ok(cond);
        }
        let then = self.binary(0, depth)?;
        self.expect(Token::Colon)?;
        let otherwise = self.expression(depth + 1)?;
        self.node(
            ExprKind::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
            offset,
        )
    }

    /// Precedence climbing over the binary operator levels
    fn binary(&mut self, level: usize, depth: usize) -> Result<Expr, CompileError> {
        if level == LEVELS {
            return self.unary(depth);
        }
        let offset = self.offset();
        let mut lhs = self.binary(level + 1, depth)?;
        if let Some(op) = logical_op(level) {
            return self.logical(op, lhs, level, depth, offset);
        }
        while let Some(op) = self.peek().and_then(|t| binary_op(t, level)) {
            self.advance();
            let rhs = self.binary(level + 1, depth)?;
            lhs = self.node(
                ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                offset,
            )?;
        }
        Ok(lhs)
    }

    /// Collect `first op b op c ...` into one n-ary node
    fn logical(
        &mut self,
        op: LogicalOp,
        first: Expr,
        level: usize,
        depth: usize,
        offset: usize,
    ) -> Result<Expr, CompileError> {
        let token = match op {
            LogicalOp::Or => Token::OrOr,
            LogicalOp::And => Token::AndAnd,
        };
        if self.peek() != Some(&token) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&token) {
            operands.push(self.binary(level + 1, depth)?);
        }
        self.node(ExprKind::Logical { op, operands }, offset)
    }

    fn unary(&mut self, depth: usize) -> Result<Expr, CompileError> {
        self.guard(depth)?;
        let offset = self.offset();
        let op = match self.peek() {
            Some(Token::Bang) => UnaryOp::Not,
            Some(Token::Minus) => UnaryOp::Neg,
            _ => return self.postfix(depth),
        };
        self.advance();
        // Negative literals fold into constants unless a postfix follows
        if op == UnaryOp::Neg {
            if let Some(Token::Int(i)) = self.peek() {
                let postfix = matches!(
                    self.tokens.get(self.pos + 1),
                    Some((Token::Dot | Token::LBracket, _))
                );
                if !postfix {
                    let value = *i;
                    self.advance();
                    return self.node(ExprKind::Literal(Value::Int(-value)), offset);
                }
            }
        }
        let operand = self.unary(depth + 1)?;
        self.node(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            offset,
        )
    }

    fn postfix(&mut self, depth: usize) -> Result<Expr, CompileError> {
        let mut expr = self.primary(depth)?;
        loop {
            let offset = self.offset();
            if self.eat(&Token::Dot) {
                let name = self.ident()?;
                if self.eat(&Token::LParen) {
                    let args = self.arguments(Token::RParen, depth)?;
                    expr = self.node(
                        ExprKind::Call {
                            function: name,
                            target: Some(Box::new(expr)),
                            args,
                            overloads: Vec::new(),
                        },
                        offset,
                    )?;
                } else {
                    expr = self.node(
                        ExprKind::Select {
                            operand: Box::new(expr),
                            field: name,
                        },
                        offset,
                    )?;
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.expression(depth + 1)?;
                self.expect(Token::RBracket)?;
                expr = self.node(
                    ExprKind::Index {
                        operand: Box::new(expr),
                        index: Box::new(index),
                    },
                    offset,
                )?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self, depth: usize) -> Result<Expr, CompileError> {
        let offset = self.offset();
        let token = match self.advance() {
            Some(token) => token,
            None => {
                return Err(CompileError::new(
                    "Syntax error: unexpected end of input",
                    offset,
                ))
            }
        };
        let kind = match token {
            Token::True => ExprKind::Literal(Value::Bool(true)),
            Token::False => ExprKind::Literal(Value::Bool(false)),
            Token::Null => ExprKind::Literal(Value::Null),
            Token::Int(i) => ExprKind::Literal(Value::Int(*i)),
            Token::Str(s) => ExprKind::Literal(Value::String(s.clone())),
            Token::Bytes(b) => ExprKind::Literal(Value::Bytes(Bytes::from(b.clone()))),
            Token::Ident(name) => {
                if self.eat(&Token::LParen) {
                    ExprKind::Call {
                        function: name.clone(),
                        target: None,
                        args: self.arguments(Token::RParen, depth)?,
                        overloads: Vec::new(),
                    }
                } else {
                    ExprKind::Ident(name.clone())
                }
            }
            Token::LParen => {
                let inner = self.expression(depth + 1)?;
                self.expect(Token::RParen)?;
                return Ok(inner);
            }
            Token::LBracket => ExprKind::List(self.arguments(Token::RBracket, depth)?),
            Token::LBrace => ExprKind::Map(self.entries(depth)?),
            other => {
                return Err(CompileError::new(
                    format!("Syntax error: unexpected {}", other.describe()),
                    offset,
                ))
            }
        };
        self.node(kind, offset)
    }

    fn ident(&mut self) -> Result<String, CompileError> {
        let offset = self.offset();
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name.clone()),
            other => Err(CompileError::new(
                format!(
                    "Syntax error: expected identifier, found {}",
                    other
                        .map(Token::describe)
                        .unwrap_or_else(|| "end of input".to_string())
                ),
                offset,
            )),
        }
    }

    /// Comma separated expressions up to `close`, which is consumed
    fn arguments(&mut self, close: Token, depth: usize) -> Result<Vec<Expr>, CompileError> {
        let mut args = Vec::new();
        if self.eat(&close) {
            return Ok(args);
        }
        loop {
            args.push(self.expression(depth + 1)?);
            if self.eat(&close) {
                return Ok(args);
            }
            self.expect(Token::Comma)?;
        }
    }

    fn entries(&mut self, depth: usize) -> Result<Vec<(Expr, Expr)>, CompileError> {
        let mut entries = Vec::new();
        if self.eat(&Token::RBrace) {
            return Ok(entries);
        }
        loop {
            let key = self.expression(depth + 1)?;
            self.expect(Token::Colon)?;
            let value = self.expression(depth + 1)?;
            entries.push((key, value));
            if self.eat(&Token::RBrace) {
                return Ok(entries);
            }
            self.expect(Token::Comma)?;
        }
    }
}

/// Number of binary precedence levels handled by `binary`
const LEVELS: usize = 5;

/// The two lowest levels are the n-ary connectives
fn logical_op(level: usize) -> Option<LogicalOp> {
    match level {
        0 => Some(LogicalOp::Or),
        1 => Some(LogicalOp::And),
        _ => None,
    }
}

/// Operator for `token` at precedence `level`, lowest level first
fn binary_op(token: &Token, level: usize) -> Option<BinaryOp> {
    let op = match (level, token) {
        (2, Token::EqEq) => BinaryOp::Eq,
        (2, Token::NotEq) => BinaryOp::Ne,
        (2, Token::Lt) => BinaryOp::Lt,
        (2, Token::Le) => BinaryOp::Le,
        (2, Token::Gt) => BinaryOp::Gt,
        (2, Token::Ge) => BinaryOp::Ge,
        (2, Token::In) => BinaryOp::In,
        (3, Token::Plus) => BinaryOp::Add,
        (3, Token::Minus) => BinaryOp::Sub,
        (4, Token::Star) => BinaryOp::Mul,
        (4, Token::Slash) => BinaryOp::Div,
        (4, Token::Percent) => BinaryOp::Rem,
        _ => return None,
    };
    Some(op)
}
