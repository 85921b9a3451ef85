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

// Domain error types

use thiserror::Error;

/// Main error type for the rule engine
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Malformed or ill-typed expression text
    #[error("Compile error: {0}")]
    CompileError(#[from] CompileError),

    /// A checked expression could not be turned into a program
    #[error("Program creation error: {0}")]
    ProgramCreationError(String),

    /// Runtime failure inside a builtin or a missing binding
    #[error("Evaluation error: {0}")]
    EvaluationError(#[from] EvalError),

    /// Transport failure issuing a request
    #[error("Request error: {0}")]
    RequestError(String),

    /// Failure reading or decoding a response body
    #[error("Response error: {0}")]
    ResponseError(String),

    /// Malformed downstream proxy configuration
    #[error("Proxy error: {0}")]
    ProxyError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// The unit of work an error aborts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Only the verdict of the rule that produced it
    Rule,
    /// Only the evaluation of the target that produced it
    Target,
}

/// First syntax or type violation found in an expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} (at offset {offset})")]
pub struct CompileError {
    pub message: String,
    pub offset: usize,
}

impl CompileError {
    pub fn new(message: impl Into<String>, offset: usize) -> Self {
        Self {
            message: message.into(),
            offset,
        }
    }
}

/// Runtime error raised while evaluating a program
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EvalError(pub String);

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The error every builtin returns for an operand of the wrong runtime type
    pub fn unexpected_type(type_name: &str, function: &str) -> Self {
        Self(format!(
            "unexpected type '{}' passed to '{}'",
            type_name, function
        ))
    }
}

impl ProbeError {
    pub fn scope(&self) -> ErrorScope {
        match self {
            ProbeError::CompileError(_)
            | ProbeError::ProgramCreationError(_)
            | ProbeError::EvaluationError(_) => ErrorScope::Rule,
            ProbeError::RequestError(_)
            | ProbeError::ResponseError(_)
            | ProbeError::ProxyError(_)
            | ProbeError::ConfigurationError(_) => ErrorScope::Target,
        }
    }

    /// Rule-authoring defects are reported to the rule author rather than per target
    pub fn is_authoring_defect(&self) -> bool {
        matches!(
            self,
            ProbeError::CompileError(_) | ProbeError::ProgramCreationError(_)
        )
    }
}
