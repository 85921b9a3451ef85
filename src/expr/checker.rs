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

//! Static type checking of parsed expressions.
//!
//! The checker resolves identifiers and calls against a `Declarations`
//! source, annotates every call with its candidate overloads and returns the
//! expression's result type. It reports the first violation it finds.

use crate::engine_core::errors::CompileError;
use crate::expr::ast::{BinaryOp, Expr, ExprKind, Overload, UnaryOp};
use crate::expr::value::{Type, Value};

/// Read-only view of declared variables and function overloads
pub trait Declarations {
    fn variable(&self, name: &str) -> Option<&Type>;

    /// Overloads declared under `name` with the given arity, most recent first
    fn overloads(&self, name: &str, arity: usize) -> Vec<(Overload, Type)>;

    /// Whether any overload is declared under `name`
    fn has_function(&self, name: &str) -> bool;
}

pub fn check(expr: &mut Expr, decls: &dyn Declarations) -> Result<Type, CompileError> {
    let offset = expr.offset;
    match &mut expr.kind {
        ExprKind::Literal(value) => Ok(literal_type(value)),

        ExprKind::Ident(name) => decls.variable(name).cloned().ok_or_else(|| {
            CompileError::new(format!("undeclared reference to '{}'", name), offset)
        }),

        ExprKind::Select { operand, field } => {
            let operand_ty = check(operand, decls)?;
            match &operand_ty {
                Type::Object(obj) => obj.field_type(field).ok_or_else(|| {
                    CompileError::new(
                        format!("undefined field '{}' on type '{}'", field, obj.name()),
                        offset,
                    )
                }),
                Type::Map(value) => Ok((**value).clone()),
                Type::Dyn => Ok(Type::Dyn),
                other => Err(CompileError::new(
                    format!("type '{}' does not support field selection", other),
                    offset,
                )),
            }
        }

        ExprKind::Index { operand, index } => {
            let operand_ty = check(operand, decls)?;
            let index_ty = check(index, decls)?;
            match &operand_ty {
                Type::Map(value) if Type::String.is_assignable_from(&index_ty) => {
                    Ok((**value).clone())
                }
                Type::List(elem) if Type::Int.is_assignable_from(&index_ty) => {
                    Ok((**elem).clone())
                }
                Type::Dyn => Ok(Type::Dyn),
                _ => Err(no_matching_overload("_[_]", &[operand_ty, index_ty], offset)),
            }
        }

        ExprKind::Call {
            function,
            target,
            args,
            overloads,
        } => {
            let mut arg_types = Vec::with_capacity(args.len() + 1);
            if let Some(target) = target {
                arg_types.push(check(target, decls)?);
            }
            for arg in args.iter_mut() {
                arg_types.push(check(arg, decls)?);
            }

            if !decls.has_function(function) {
                return Err(CompileError::new(
                    format!("undeclared reference to '{}'", function),
                    offset,
                ));
            }

            let mut result = None;
            for (overload, ret) in decls.overloads(function, arg_types.len()) {
                let accepts = overload
                    .params
                    .iter()
                    .zip(&arg_types)
                    .all(|(param, arg)| param.is_assignable_from(arg));
                if accepts {
                    result = Some(match result {
                        None => ret,
                        Some(prev) => ret.join(&prev),
                    });
                    overloads.push(overload);
                }
            }
            result.ok_or_else(|| no_matching_overload(function, &arg_types, offset))
        }

        ExprKind::Unary { op, operand } => {
            let ty = check(operand, decls)?;
            let (name, expected) = match op {
                UnaryOp::Not => ("!_", Type::Bool),
                UnaryOp::Neg => ("-_", Type::Int),
            };
            if expected.is_assignable_from(&ty) {
                Ok(expected)
            } else {
                Err(no_matching_overload(name, &[ty], offset))
            }
        }

        ExprKind::Logical { op, operands } => {
            let name = format!("_{}_", op);
            for operand in operands.iter_mut() {
                let ty = check(operand, decls)?;
                if !Type::Bool.is_assignable_from(&ty) {
                    return Err(no_matching_overload(&name, &[Type::Bool, ty], operand.offset));
                }
            }
            Ok(Type::Bool)
        }

        ExprKind::Binary { op, lhs, rhs } => {
            let op = *op;
            let lhs_ty = check(lhs, decls)?;
            let rhs_ty = check(rhs, decls)?;
            binary_type(op, &lhs_ty, &rhs_ty)
                .ok_or_else(|| no_matching_overload(&format!("_{}_", op), &[lhs_ty, rhs_ty], offset))
        }

        ExprKind::Conditional {
            cond,
            then,
            otherwise,
        } => {
            let cond_ty = check(cond, decls)?;
            if !Type::Bool.is_assignable_from(&cond_ty) {
                return Err(no_matching_overload("_?_:_", &[cond_ty], offset));
            }
            let then_ty = check(then, decls)?;
            let otherwise_ty = check(otherwise, decls)?;
            if !then_ty.is_assignable_from(&otherwise_ty) {
                return Err(no_matching_overload(
                    "_?_:_",
                    &[Type::Bool, then_ty, otherwise_ty],
                    offset,
                ));
            }
            Ok(then_ty.join(&otherwise_ty))
        }

        ExprKind::List(items) => {
            let mut elem: Option<Type> = None;
            for item in items.iter_mut() {
                let ty = check(item, decls)?;
                elem = Some(match elem {
                    None => ty,
                    Some(prev) if prev == ty => prev,
                    Some(_) => Type::Dyn,
                });
            }
            Ok(Type::List(Box::new(elem.unwrap_or(Type::Dyn))))
        }

        ExprKind::Map(entries) => {
            let mut value_ty: Option<Type> = None;
            for (key, value) in entries.iter_mut() {
                let key_ty = check(key, decls)?;
                if !Type::String.is_assignable_from(&key_ty) {
                    return Err(CompileError::new(
                        format!("map keys must be strings, found '{}'", key_ty),
                        key.offset,
                    ));
                }
                let ty = check(value, decls)?;
                value_ty = Some(match value_ty {
                    None => ty,
                    Some(prev) if prev == ty => prev,
                    Some(_) => Type::Dyn,
                });
            }
            Ok(Type::Map(Box::new(value_ty.unwrap_or(Type::Dyn))))
        }
    }
}

fn literal_type(value: &Value) -> Type {
    match value {
        Value::List(_) => Type::List(Box::new(Type::Dyn)),
        Value::Map(_) => Type::Map(Box::new(Type::Dyn)),
        other => other.type_of(),
    }
}

fn binary_type(op: BinaryOp, lhs: &Type, rhs: &Type) -> Option<Type> {
    let either_dyn = *lhs == Type::Dyn || *rhs == Type::Dyn;
    match op {
        BinaryOp::Eq | BinaryOp::Ne => lhs.is_assignable_from(rhs).then_some(Type::Bool),

        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let comparable = |t: &Type| {
                matches!(t, Type::Int | Type::String | Type::Bytes | Type::Dyn)
            };
            (comparable(lhs) && comparable(rhs) && lhs.is_assignable_from(rhs))
                .then_some(Type::Bool)
        }

        BinaryOp::In => match rhs {
            Type::Map(_) => Type::String.is_assignable_from(lhs).then_some(Type::Bool),
            Type::List(elem) => elem.is_assignable_from(lhs).then_some(Type::Bool),
            Type::Dyn => Some(Type::Bool),
            _ => None,
        },

        BinaryOp::Add => {
            if either_dyn {
                let known = if *lhs == Type::Dyn { rhs } else { lhs };
                return matches!(
                    known,
                    Type::Int | Type::String | Type::Bytes | Type::List(_) | Type::Dyn
                )
                .then(|| known.clone());
            }
            match (lhs, rhs) {
                (Type::Int, Type::Int) => Some(Type::Int),
                (Type::String, Type::String) => Some(Type::String),
                (Type::Bytes, Type::Bytes) => Some(Type::Bytes),
                (Type::List(_), Type::List(_)) => Some(lhs.join(rhs)),
                _ => None,
            }
        }

        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            (Type::Int.is_assignable_from(lhs) && Type::Int.is_assignable_from(rhs))
                .then_some(Type::Int)
        }
    }
}

fn no_matching_overload(name: &str, args: &[Type], offset: usize) -> CompileError {
    let args = args
        .iter()
        .map(Type::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    CompileError::new(
        format!("found no matching overload for '{}' applied to '({})'", name, args),
        offset,
    )
}
