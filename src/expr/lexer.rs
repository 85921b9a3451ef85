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

//! Lexical analysis for rule expressions.
//!
//! Tokenization is done with logos. String and byte literals are unescaped
//! in their callbacks, so the parser only ever sees decoded contents.

use crate::engine_core::errors::CompileError;
use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum Token {
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[token("null")]
    Null,
    #[token("in")]
    In,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,

    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("!")]
    Bang,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    Le,
    #[token(">")]
    Gt,
    #[token(">=")]
    Ge,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i64::from_str_radix(&lex.slice()[2..], 16).ok())]
    Int(i64),

    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| unescape_str(strip_quotes(lex.slice())))]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| unescape_str(strip_quotes(lex.slice())))]
    #[regex(r#"[rR]"[^"\n]*""#, |lex| Some(strip_quotes(&lex.slice()[1..]).to_string()))]
    #[regex(r#"[rR]'[^'\n]*'"#, |lex| Some(strip_quotes(&lex.slice()[1..]).to_string()))]
    Str(String),

    #[regex(r#"[bB]"([^"\\\n]|\\.)*""#, |lex| unescape_bytes(strip_quotes(&lex.slice()[1..])))]
    #[regex(r#"[bB]'([^'\\\n]|\\.)*'"#, |lex| unescape_bytes(strip_quotes(&lex.slice()[1..])))]
    Bytes(Vec<u8>),

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Int(i) => format!("integer {}", i),
            Token::Str(_) => "string literal".to_string(),
            Token::Bytes(_) => "bytes literal".to_string(),
            Token::Ident(name) => format!("identifier '{}'", name),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::True => "true",
            Token::False => "false",
            Token::Null => "null",
            Token::In => "in",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Dot => ".",
            Token::Comma => ",",
            Token::Colon => ":",
            Token::Question => "?",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Bang => "!",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Int(_) | Token::Str(_) | Token::Bytes(_) | Token::Ident(_) => "",
        }
    }
}

/// Tokenize `source`, failing at the first unrecognised input.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Range<usize>)>, CompileError> {
    let mut tokens = Vec::new();
    for (result, span) in Token::lexer(source).spanned() {
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => {
                return Err(CompileError::new(
                    format!("Syntax error: unexpected input '{}'", &source[span.clone()]),
                    span.start,
                ))
            }
        }
    }
    Ok(tokens)
}

fn strip_quotes(s: &str) -> &str {
    &s[1..s.len() - 1]
}

enum Unescaped {
    Char(char),
    Byte(u8),
}

fn unescape(body: &str, bytes_mode: bool) -> Option<Vec<Unescaped>> {
    let mut out = Vec::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(Unescaped::Char(c));
            continue;
        }
        let escaped = match chars.next()? {
            'n' => Unescaped::Char('\n'),
            'r' => Unescaped::Char('\r'),
            't' => Unescaped::Char('\t'),
            '0' => Unescaped::Char('\0'),
            '\\' => Unescaped::Char('\\'),
            '"' => Unescaped::Char('"'),
            '\'' => Unescaped::Char('\''),
            '`' => Unescaped::Char('`'),
            '?' => Unescaped::Char('?'),
            'x' | 'X' => {
                let code = read_hex(&mut chars, 2)?;
                if bytes_mode {
                    Unescaped::Byte(code as u8)
                } else {
                    Unescaped::Char(char::from_u32(code)?)
                }
            }
            'u' => Unescaped::Char(char::from_u32(read_hex(&mut chars, 4)?)?),
            'U' => Unescaped::Char(char::from_u32(read_hex(&mut chars, 8)?)?),
            _ => return None,
        };
        out.push(escaped);
    }
    Some(out)
}

fn read_hex(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<u32> {
    let mut code = 0u32;
    for _ in 0..digits {
        code = code.checked_mul(16)? + chars.next()?.to_digit(16)?;
    }
    Some(code)
}

fn unescape_str(body: &str) -> Option<String> {
    unescape(body, false)?
        .into_iter()
        .map(|u| match u {
            Unescaped::Char(c) => Some(c),
            Unescaped::Byte(_) => None,
        })
        .collect()
}

fn unescape_bytes(body: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(body.len());
    for u in unescape(body, true)? {
        match u {
            Unescaped::Char(c) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            Unescaped::Byte(b) => out.push(b),
        }
    }
    Some(out)
}
