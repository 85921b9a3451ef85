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

//! Executable programs and their evaluation.
//!
//! A `Program` is a checked syntax tree whose every call overload has been
//! bound to an implementation. It holds no per-evaluation state, so one
//! program can be evaluated concurrently against many activations.

use crate::engine_core::constants::vars;
use crate::engine_core::errors::{EvalError, ProbeError};
use crate::engine_core::models::{Request, Response};
use crate::expr::ast::{BinaryOp, Expr, ExprKind, LogicalOp, Overload, UnaryOp};
use crate::expr::function::Function;
use crate::expr::value::Value;
use futures::future::BoxFuture;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Variable bindings for one evaluation
#[derive(Debug, Clone, Default)]
pub struct Activation {
    vars: HashMap<String, Value>,
}

impl Activation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn with_request(mut self, request: Arc<Request>) -> Self {
        self.insert(vars::REQUEST, request);
        self
    }

    pub fn with_response(mut self, response: Arc<Response>) -> Self {
        self.insert(vars::RESPONSE, response);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

pub struct Program {
    expr: Expr,
    functions: HashMap<String, Arc<dyn Function>>,
}

impl std::fmt::Debug for Program {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("expr", &self.expr)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Program {
    /// `functions` must hold an implementation for every overload in `expr`
    pub(crate) fn new(expr: Expr, functions: HashMap<String, Arc<dyn Function>>) -> Self {
        Self { expr, functions }
    }

    pub async fn evaluate(&self, activation: &Activation) -> Result<Value, ProbeError> {
        Ok(self.eval(&self.expr, activation).await?)
    }

    fn eval<'a>(
        &'a self,
        expr: &'a Expr,
        activation: &'a Activation,
    ) -> BoxFuture<'a, Result<Value, EvalError>> {
        Box::pin(async move {
            match &expr.kind {
                ExprKind::Literal(value) => Ok(value.clone()),

                ExprKind::Ident(name) => activation
                    .get(name)
                    .cloned()
                    .ok_or_else(|| EvalError::new(format!("no such attribute: '{}'", name))),

                ExprKind::Select { operand, field } => {
                    self.eval(operand, activation).await?.select(field)
                }

                ExprKind::Index { operand, index } => {
                    let operand = self.eval(operand, activation).await?;
                    let index = self.eval(index, activation).await?;
                    index_value(&operand, &index)
                }

                ExprKind::Call {
                    function,
                    target,
                    args,
                    overloads,
                } => {
                    let mut values = Vec::with_capacity(args.len() + 1);
                    if let Some(target) = target {
                        values.push(self.eval(target, activation).await?);
                    }
                    for arg in args {
                        values.push(self.eval(arg, activation).await?);
                    }
                    let overload = dispatch(function, overloads, &values)?;
                    let implementation = self.functions.get(&overload.id).ok_or_else(|| {
                        EvalError::new(format!("no implementation bound for '{}'", overload.id))
                    })?;
                    implementation.call(values).await
                }

                ExprKind::Unary { op, operand } => {
                    let value = self.eval(operand, activation).await?;
                    match (op, &value) {
                        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                        (UnaryOp::Neg, Value::Int(i)) => i
                            .checked_neg()
                            .map(Value::Int)
                            .ok_or_else(overflow),
                        (UnaryOp::Not, other) => {
                            Err(EvalError::unexpected_type(&other.type_name(), "!_"))
                        }
                        (UnaryOp::Neg, other) => {
                            Err(EvalError::unexpected_type(&other.type_name(), "-_"))
                        }
                    }
                }

                ExprKind::Logical { op, operands } => {
                    let short_circuit = *op == LogicalOp::Or;
                    let name = format!("_{}_", op);
                    for operand in operands {
                        if self.eval_bool(operand, activation, &name).await? == short_circuit {
                            return Ok(Value::Bool(short_circuit));
                        }
                    }
                    Ok(Value::Bool(!short_circuit))
                }

                ExprKind::Binary { op, lhs, rhs } => {
                    let lhs = self.eval(lhs, activation).await?;
                    let rhs = self.eval(rhs, activation).await?;
                    binary_value(*op, lhs, rhs)
                }

                ExprKind::Conditional {
                    cond,
                    then,
                    otherwise,
                } => {
                    if self.eval_bool(cond, activation, "_?_:_").await? {
                        self.eval(then, activation).await
                    } else {
                        self.eval(otherwise, activation).await
                    }
                }

                ExprKind::List(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval(item, activation).await?);
                    }
                    Ok(Value::from(values))
                }

                ExprKind::Map(entries) => {
                    let mut map = BTreeMap::new();
                    for (key, value) in entries {
                        let key = match self.eval(key, activation).await? {
                            Value::String(s) => s,
                            other => {
                                return Err(EvalError::new(format!(
                                    "map keys must be strings, found '{}'",
                                    other.type_name()
                                )))
                            }
                        };
                        map.insert(key, self.eval(value, activation).await?);
                    }
                    Ok(Value::from(map))
                }
            }
        })
    }

    async fn eval_bool(
        &self,
        expr: &Expr,
        activation: &Activation,
        operator: &str,
    ) -> Result<bool, EvalError> {
        let value = self.eval(expr, activation).await?;
        value
            .as_bool()
            .ok_or_else(|| EvalError::unexpected_type(&value.type_name(), operator))
    }
}

/// Most recent overload whose parameters accept the runtime values
fn dispatch<'a>(
    function: &str,
    overloads: &'a [Overload],
    values: &[Value],
) -> Result<&'a Overload, EvalError> {
    let accepts = |overload: &Overload| {
        overload.params.len() == values.len()
            && overload
                .params
                .iter()
                .zip(values)
                .all(|(param, value)| value.conforms_to(param))
    };
    if let Some(found) = overloads.iter().find(|o| accepts(o)) {
        return Ok(found);
    }

    let offending = overloads
        .first()
        .and_then(|o| {
            o.params
                .iter()
                .zip(values)
                .find(|(param, value)| !value.conforms_to(param))
                .map(|(_, value)| value.type_name())
        })
        .unwrap_or_else(|| "null_type".to_string());
    Err(EvalError::unexpected_type(&offending, function))
}

fn index_value(operand: &Value, index: &Value) -> Result<Value, EvalError> {
    match (operand, index) {
        (Value::Map(map), Value::String(key)) => map
            .get(key)
            .cloned()
            .ok_or_else(|| EvalError::new(format!("no such key: '{}'", key))),
        (Value::List(items), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .ok_or_else(|| EvalError::new(format!("index out of range: {}", i))),
        (Value::Map(_) | Value::List(_), other) => {
            Err(EvalError::unexpected_type(&other.type_name(), "_[_]"))
        }
        (other, _) => Err(EvalError::unexpected_type(&other.type_name(), "_[_]")),
    }
}

fn binary_value(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value, EvalError> {
    let name = format!("_{}_", op);
    let mismatch = |v: &Value| EvalError::unexpected_type(&v.type_name(), &name);

    match op {
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),

        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => a.cmp(b),
                (Value::String(a), Value::String(b)) => a.cmp(b),
                (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
                (Value::Int(_) | Value::String(_) | Value::Bytes(_), other) => {
                    return Err(mismatch(other))
                }
                (other, _) => return Err(mismatch(other)),
            };
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Bool(result))
        }

        BinaryOp::In => match (&lhs, &rhs) {
            (Value::String(key), Value::Map(map)) => Ok(Value::Bool(map.contains_key(key))),
            (other, Value::Map(_)) => Err(mismatch(other)),
            (item, Value::List(items)) => Ok(Value::Bool(items.contains(item))),
            (_, other) => Err(mismatch(other)),
        },

        BinaryOp::Add => match (lhs, rhs) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(b).map(Value::Int).ok_or_else(overflow),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            (Value::Bytes(a), Value::Bytes(b)) => {
                let mut joined = Vec::with_capacity(a.len() + b.len());
                joined.extend_from_slice(&a);
                joined.extend_from_slice(&b);
                Ok(Value::from(joined))
            }
            (Value::List(a), Value::List(b)) => {
                Ok(Value::from(a.iter().chain(b.iter()).cloned().collect::<Vec<_>>()))
            }
            (Value::Int(_) | Value::String(_) | Value::Bytes(_) | Value::List(_), other) => {
                Err(mismatch(&other))
            }
            (other, _) => Err(mismatch(&other)),
        },

        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = match (&lhs, &rhs) {
                (Value::Int(a), Value::Int(b)) => (*a, *b),
                (Value::Int(_), other) | (other, _) => return Err(mismatch(other)),
            };
            let result = match op {
                BinaryOp::Sub => a.checked_sub(b),
                BinaryOp::Mul => a.checked_mul(b),
                BinaryOp::Div if b == 0 => return Err(EvalError::new("division by zero")),
                BinaryOp::Div => a.checked_div(b),
                _ if b == 0 => return Err(EvalError::new("modulus by zero")),
                _ => a.checked_rem(b),
            };
            result.map(Value::Int).ok_or_else(overflow)
        }
    }
}

fn overflow() -> EvalError {
    EvalError::new("integer overflow")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;

    fn program(src: &str) -> Program {
        Program::new(parse(src).unwrap(), HashMap::new())
    }

    async fn eval(src: &str, activation: &Activation) -> Result<Value, ProbeError> {
        program(src).evaluate(activation).await
    }

    #[tokio::test]
    async fn test_arithmetic() {
        let act = Activation::new();
        assert_eq!(eval("1 + 2 * 3 - 4 % 3", &act).await.unwrap(), Value::Int(6));
        assert_eq!(eval("'ab' + 'cd'", &act).await.unwrap(), Value::from("abcd"));
        assert_eq!(
            eval("b'ab' + b'cd'", &act).await.unwrap(),
            Value::from(b"abcd".to_vec())
        );
    }

    #[tokio::test]
    async fn test_division_by_zero_is_error() {
        let err = eval("1 / 0", &Activation::new()).await.unwrap_err();
        assert!(matches!(err, ProbeError::EvaluationError(_)));
        assert!(eval("1 % 0", &Activation::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_overflow_is_error() {
        let mut act = Activation::new();
        act.insert("max", i64::MAX);
        let err = eval("max + 1", &act).await.unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[tokio::test]
    async fn test_short_circuit_skips_missing_binding() {
        let act = Activation::new();
        assert_eq!(eval("false && missing", &act).await.unwrap(), Value::Bool(false));
        assert_eq!(eval("true || missing", &act).await.unwrap(), Value::Bool(true));
        assert!(eval("true && missing", &act).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_binding() {
        let err = eval("x == 1", &Activation::new()).await.unwrap_err();
        assert!(err.to_string().contains("no such attribute: 'x'"));
    }

    #[tokio::test]
    async fn test_cross_type_equality_is_false() {
        let act = Activation::new();
        assert_eq!(eval("1 == '1'", &act).await.unwrap(), Value::Bool(false));
        assert_eq!(eval("b'a' != 'a'", &act).await.unwrap(), Value::Bool(true));
    }

    #[tokio::test]
    async fn test_collections() {
        let act = Activation::new();
        assert_eq!(eval("2 in [1, 2, 3]", &act).await.unwrap(), Value::Bool(true));
        assert_eq!(eval("'k' in {'k': 1}", &act).await.unwrap(), Value::Bool(true));
        assert_eq!(eval("{'k': 'v'}.k", &act).await.unwrap(), Value::from("v"));
        assert_eq!(eval("[1, 2][1]", &act).await.unwrap(), Value::Int(2));
        assert!(eval("[1, 2][2]", &act).await.is_err());
    }

    #[tokio::test]
    async fn test_response_fields() {
        let resp = Response {
            status: 404,
            ..Response::default()
        };
        let act = Activation::new().with_response(Arc::new(resp));
        assert_eq!(
            eval("response.status == 404 ? 'gone' : 'ok'", &act).await.unwrap(),
            Value::from("gone")
        );
    }

    #[test]
    fn test_dispatch_prefers_first_conforming() {
        let overloads = vec![
            Overload {
                id: "f_bytes".to_string(),
                params: vec![crate::expr::value::Type::Bytes],
            },
            Overload {
                id: "f_string".to_string(),
                params: vec![crate::expr::value::Type::String],
            },
        ];
        let picked = dispatch("f", &overloads, &[Value::from("x")]).unwrap();
        assert_eq!(picked.id, "f_string");

        let err = dispatch("f", &overloads, &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.to_string(), "unexpected type 'int' passed to 'f'");
    }
}
