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

//! Expression syntax tree.

use crate::expr::value::{Type, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Short-circuiting connectives, kept n-ary so long chains stay shallow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::In => "in",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Byte offset of the expression in the source text
    pub offset: usize,
    height: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Value),
    Ident(String),
    Select {
        operand: Box<Expr>,
        field: String,
    },
    Index {
        operand: Box<Expr>,
        index: Box<Expr>,
    },
    /// `f(args)` or `target.f(args)`; the target is passed as the first argument
    Call {
        function: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
        /// Overloads accepting the static argument types, most recent first.
        /// Filled in by the checker.
        overloads: Vec<Overload>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `a && b && c` or `a || b || c`, evaluated left to right
    Logical {
        op: LogicalOp,
        operands: Vec<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    List(Vec<Expr>),
    Map(Vec<(Expr, Expr)>),
}

/// A resolved call candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overload {
    pub id: String,
    pub params: Vec<Type>,
}

impl Expr {
    pub fn new(kind: ExprKind, offset: usize) -> Self {
        let mut below = 0;
        kind.for_each_child(|child| below = below.max(child.height));
        Self {
            kind,
            offset,
            height: below + 1,
        }
    }

    /// Number of nodes on the longest path from this node to a leaf
    pub fn height(&self) -> usize {
        self.height
    }

    /// Visit this node and all of its descendants
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Expr)) {
        visit(self);
        self.kind.for_each_child(|child| child.walk(visit));
    }
}

impl ExprKind {
    /// Call `f` on each direct child, in source order
    fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match self {
            ExprKind::Literal(_) | ExprKind::Ident(_) => {}
            ExprKind::Select { operand, .. } | ExprKind::Unary { operand, .. } => f(&**operand),
            ExprKind::Index { operand, index } => {
                f(&**operand);
                f(&**index);
            }
            ExprKind::Call { target, args, .. } => {
                if let Some(target) = target {
                    f(&**target);
                }
                args.iter().for_each(f);
            }
            ExprKind::Binary { lhs, rhs, .. } => {
                f(&**lhs);
                f(&**rhs);
            }
            ExprKind::Logical { operands, .. } => operands.iter().for_each(f),
            ExprKind::Conditional {
                cond,
                then,
                otherwise,
            } => {
                f(&**cond);
                f(&**then);
                f(&**otherwise);
            }
            ExprKind::List(items) => items.iter().for_each(f),
            ExprKind::Map(entries) => {
                for (k, v) in entries {
                    f(k);
                    f(v);
                }
            }
        }
    }
}
