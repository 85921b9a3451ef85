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

//! Expression environment.
//!
//! The environment is the typed registry rule expressions compile against.
//! It is built once per rule-set: seeded with `request`, `response` and the
//! builtin catalog, then extended with rule variables and result functions.
//! Setup methods take `&mut self`; compilation and evaluation take `&self`,
//! so a finished environment can be shared behind an `Arc` by every worker.

use crate::engine::builtins;
use crate::engine::reverse::ReverseCheck;
use crate::engine_core::constants::{inference, vars};
use crate::engine_core::errors::ProbeError;
use crate::expr::ast::{Expr, ExprKind, Overload};
use crate::expr::checker::{self, Declarations};
use crate::expr::function::{native, Function};
use crate::expr::parser;
use crate::expr::program::{Activation, Program};
use crate::expr::value::{ObjectType, Type, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Declared type of a rule variable, inferred from its right-hand-side text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableKind {
    /// `randomInt(...)`
    RandomIntLiteral,
    /// `newReverse()`
    NewReverseLiteral,
    PlainString,
}

impl VariableKind {
    /// Classify by exact prefix; the text is not trimmed
    pub fn infer(rhs: &str) -> Self {
        if rhs.starts_with(inference::RANDOM_INT_PREFIX) {
            VariableKind::RandomIntLiteral
        } else if rhs.starts_with(inference::NEW_REVERSE_PREFIX) {
            VariableKind::NewReverseLiteral
        } else {
            VariableKind::PlainString
        }
    }

    pub fn declared_type(&self) -> Type {
        match self {
            VariableKind::RandomIntLiteral => Type::Int,
            VariableKind::NewReverseLiteral => Type::Object(ObjectType::Reverse),
            VariableKind::PlainString => Type::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub name: String,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub overload: Overload,
    pub result: Type,
}

/// A parsed and type-checked expression
#[derive(Debug, Clone)]
pub struct Ast {
    expr: Expr,
    result_type: Type,
    source: String,
}

impl Ast {
    pub fn result_type(&self) -> &Type {
        &self.result_type
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

#[derive(Default)]
pub struct Environment {
    variables: Vec<VariableDecl>,
    functions: Vec<FunctionDecl>,
    implementations: HashMap<String, Arc<dyn Function>>,
}

impl Environment {
    /// Environment with `request`, `response` and the builtin catalog
    pub fn new(reverse: Arc<dyn ReverseCheck>) -> Self {
        let mut env = Self::empty();
        env.declare(vars::REQUEST, Type::Object(ObjectType::Request));
        env.declare(vars::RESPONSE, Type::Object(ObjectType::Response));
        builtins::register(&mut env, reverse);
        env
    }

    /// Environment with no declarations at all
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: impl Into<String>, ty: Type) {
        self.variables.push(VariableDecl {
            name: name.into(),
            ty,
        });
    }

    /// Declare a rule variable, typing it from its assignment text
    pub fn declare_rule_variable(&mut self, name: impl Into<String>, rhs: &str) -> VariableKind {
        let kind = VariableKind::infer(rhs);
        self.declare(name, kind.declared_type());
        kind
    }

    pub fn declare_rule_variables<I, N, R>(&mut self, assignments: I)
    where
        I: IntoIterator<Item = (N, R)>,
        N: Into<String>,
        R: AsRef<str>,
    {
        for (name, rhs) in assignments {
            self.declare_rule_variable(name, rhs.as_ref());
        }
    }

    /// Declare an overload without binding an implementation
    pub fn declare_function(
        &mut self,
        name: impl Into<String>,
        overload_id: impl Into<String>,
        params: Vec<Type>,
        result: Type,
    ) {
        self.functions.push(FunctionDecl {
            name: name.into(),
            overload: Overload {
                id: overload_id.into(),
                params,
            },
            result,
        });
    }

    /// Bind an implementation to an overload id, replacing any earlier binding
    pub fn bind(&mut self, overload_id: impl Into<String>, function: Arc<dyn Function>) {
        self.implementations.insert(overload_id.into(), function);
    }

    pub fn register_function(
        &mut self,
        name: &str,
        overload_id: &str,
        params: Vec<Type>,
        result: Type,
        function: Arc<dyn Function>,
    ) {
        self.declare_function(name, overload_id, params, result);
        self.bind(overload_id, function);
    }

    /// Declare `name()` returning the fixed `value`; a later registration
    /// under the same name wins
    pub fn register_result_function(&mut self, name: &str, value: bool) {
        self.register_function(
            name,
            name,
            Vec::new(),
            Type::Bool,
            native(move |_| Ok(Value::Bool(value))),
        );
    }

    pub fn variables(&self) -> &[VariableDecl] {
        &self.variables
    }

    pub fn functions(&self) -> &[FunctionDecl] {
        &self.functions
    }

    /// Parse and type-check `source`
    pub fn compile(&self, source: &str) -> Result<Ast, ProbeError> {
        let mut expr = parser::parse(source)?;
        let result_type = checker::check(&mut expr, self)?;
        Ok(Ast {
            expr,
            result_type,
            source: source.to_string(),
        })
    }

    /// Bind every overload referenced by `ast` to its implementation
    pub fn prepare(&self, ast: &Ast) -> Result<Program, ProbeError> {
        let mut bound: HashMap<String, Arc<dyn Function>> = HashMap::new();
        let mut missing: Option<(String, String)> = None;
        ast.expr.walk(&mut |node| {
            if let ExprKind::Call {
                function,
                overloads,
                ..
            } = &node.kind
            {
                for overload in overloads {
                    match self.implementations.get(&overload.id) {
                        Some(f) => {
                            bound.insert(overload.id.clone(), f.clone());
                        }
                        None => {
                            missing.get_or_insert_with(|| (function.clone(), overload.id.clone()));
                        }
                    }
                }
            }
        });

        if let Some((function, id)) = missing {
            return Err(ProbeError::ProgramCreationError(format!(
                "no implementation bound for overload '{}' of '{}'",
                id, function
            )));
        }
        Ok(Program::new(ast.expr.clone(), bound))
    }

    /// Compile, prepare and evaluate `source` against `activation`
    pub async fn evaluate(&self, source: &str, activation: &Activation) -> Result<Value, ProbeError> {
        debug!("Evaluate expression: {}", source.trim());
        let ast = self.compile(source)?;
        let program = self.prepare(&ast)?;
        let value = program.evaluate(activation).await?;
        debug!(verdict = %value.to_json(), "Expression evaluated");
        Ok(value)
    }
}

impl Declarations for Environment {
    fn variable(&self, name: &str) -> Option<&Type> {
        self.variables
            .iter()
            .rev()
            .find(|decl| decl.name == name)
            .map(|decl| &decl.ty)
    }

    fn overloads(&self, name: &str, arity: usize) -> Vec<(Overload, Type)> {
        self.functions
            .iter()
            .rev()
            .filter(|decl| decl.name == name && decl.overload.params.len() == arity)
            .map(|decl| (decl.overload.clone(), decl.result.clone()))
            .collect()
    }

    fn has_function(&self, name: &str) -> bool {
        self.functions.iter().any(|decl| decl.name == name)
    }
}
