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

//! lilith-probe: rule-driven vulnerability verification.
//!
//! This library evaluates declarative rule expressions against live HTTP
//! request/response traffic and out-of-band callback evidence. It provides
//! the expression environment and evaluator, the canonical request/response
//! model, the request deduplication cache and the callback checker.

pub mod config;
pub mod engine;
pub mod engine_core;
pub mod expr;
pub mod net;
pub mod utils;
