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

//! Function implementation seam.

use crate::engine_core::errors::EvalError;
use crate::expr::value::Value;
use async_trait::async_trait;
use std::sync::Arc;

/// Implementation bound to one overload id.
///
/// Receivers of member-style calls arrive as the first argument.
#[async_trait]
pub trait Function: Send + Sync {
    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError>;
}

struct NativeFunction<F>(F);

#[async_trait]
impl<F> Function for NativeFunction<F>
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync,
{
    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        (self.0)(&args)
    }
}

/// Wrap a synchronous closure as a `Function`
pub fn native<F>(f: F) -> Arc<dyn Function>
where
    F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
{
    Arc::new(NativeFunction(f))
}
