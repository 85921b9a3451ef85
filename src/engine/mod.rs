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

//! Rule evaluation engine.
//!
//! This module contains the expression environment, the builtin catalog
//! and the out-of-band callback checker behind `wait`.

pub mod builtins;
pub mod environment;
pub mod reverse;

pub use environment::{Ast, Environment, VariableKind};
pub use reverse::{ReverseCheck, ReverseChecker};
