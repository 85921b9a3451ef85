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

//! Runtime values and static types of the expression language.

use crate::engine_core::errors::EvalError;
use crate::engine_core::models::{Request, Response, Reverse, UrlType};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Object types exposed to expressions with a fixed field table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Url,
    Request,
    Response,
    Reverse,
}

impl ObjectType {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Url => "UrlType",
            ObjectType::Request => "Request",
            ObjectType::Response => "Response",
            ObjectType::Reverse => "Reverse",
        }
    }

    /// Static type of `field`, or `None` when the object has no such field
    pub fn field_type(&self, field: &str) -> Option<Type> {
        let ty = match (self, field) {
            (
                ObjectType::Url,
                "scheme" | "domain" | "host" | "port" | "path" | "query" | "fragment",
            ) => Type::String,

            (ObjectType::Request, "url") => Type::Object(ObjectType::Url),
            (ObjectType::Request, "method" | "content_type") => Type::String,
            (ObjectType::Request, "headers") => Type::Map(Box::new(Type::String)),
            (ObjectType::Request, "body" | "raw" | "raw_header") => Type::Bytes,

            (ObjectType::Response, "status" | "latency") => Type::Int,
            (ObjectType::Response, "url") => Type::Object(ObjectType::Url),
            (ObjectType::Response, "content_type") => Type::String,
            (ObjectType::Response, "headers") => Type::Map(Box::new(Type::String)),
            (ObjectType::Response, "body" | "raw" | "raw_header") => Type::Bytes,

            (ObjectType::Reverse, "url") => Type::Object(ObjectType::Url),
            (ObjectType::Reverse, "domain" | "ip") => Type::String,
            (ObjectType::Reverse, "is_domain_name_server") => Type::Bool,
            _ => return None,
        };
        Some(ty)
    }
}

/// Static type used by the checker
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Null,
    Bool,
    Int,
    String,
    Bytes,
    List(Box<Type>),
    /// Maps are keyed by string
    Map(Box<Type>),
    Object(ObjectType),
    /// Unknown until runtime; assignable in both directions
    Dyn,
}

impl Type {
    pub fn is_assignable_from(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Dyn, _) | (_, Type::Dyn) => true,
            (Type::List(a), Type::List(b)) | (Type::Map(a), Type::Map(b)) => {
                a.is_assignable_from(b)
            }
            (a, b) => a == b,
        }
    }

    /// Common type of two branches, collapsing to `dyn` when they disagree
    pub fn join(&self, other: &Type) -> Type {
        match (self, other) {
            (Type::Dyn, t) | (t, Type::Dyn) => t.clone(),
            (a, b) if a == b => a.clone(),
            (Type::List(a), Type::List(b)) => Type::List(Box::new(a.join(b))),
            (Type::Map(a), Type::Map(b)) => Type::Map(Box::new(a.join(b))),
            _ => Type::Dyn,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Null => f.write_str("null_type"),
            Type::Bool => f.write_str("bool"),
            Type::Int => f.write_str("int"),
            Type::String => f.write_str("string"),
            Type::Bytes => f.write_str("bytes"),
            Type::List(elem) => write!(f, "list({})", elem),
            Type::Map(value) => write!(f, "map(string, {})", value),
            Type::Object(obj) => f.write_str(obj.name()),
            Type::Dyn => f.write_str("dyn"),
        }
    }
}

/// A value produced or consumed by an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
    Bytes(Bytes),
    List(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    Url(Arc<UrlType>),
    Request(Arc<Request>),
    Response(Arc<Response>),
    Reverse(Arc<Reverse>),
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Bool(_) => Type::Bool,
            Value::Int(_) => Type::Int,
            Value::String(_) => Type::String,
            Value::Bytes(_) => Type::Bytes,
            Value::List(_) => Type::List(Box::new(Type::Dyn)),
            Value::Map(_) => Type::Map(Box::new(Type::Dyn)),
            Value::Url(_) => Type::Object(ObjectType::Url),
            Value::Request(_) => Type::Object(ObjectType::Request),
            Value::Response(_) => Type::Object(ObjectType::Response),
            Value::Reverse(_) => Type::Object(ObjectType::Reverse),
        }
    }

    /// Name used in runtime error messages
    pub fn type_name(&self) -> String {
        self.type_of().to_string()
    }

    /// Whether this value may be passed where `ty` is expected
    pub fn conforms_to(&self, ty: &Type) -> bool {
        ty.is_assignable_from(&self.type_of())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Field selection on objects and string-keyed maps
    pub fn select(&self, field: &str) -> Result<Value, EvalError> {
        let missing = || EvalError::new(format!("no such key: '{}'", field));
        let value = match self {
            Value::Map(map) => return map.get(field).cloned().ok_or_else(missing),
            Value::Url(url) => match field {
                "scheme" => Value::from(url.scheme.as_str()),
                "domain" => Value::from(url.domain.as_str()),
                "host" => Value::from(url.host.as_str()),
                "port" => Value::from(url.port.as_str()),
                "path" => Value::from(url.path.as_str()),
                "query" => Value::from(url.query.as_str()),
                "fragment" => Value::from(url.fragment.as_str()),
                _ => return Err(missing()),
            },
            Value::Request(req) => match field {
                "url" => Value::Url(Arc::new(req.url.clone())),
                "method" => Value::from(req.method.as_str()),
                "headers" => Value::string_map(&req.headers),
                "content_type" => Value::from(req.content_type.as_str()),
                "body" => Value::Bytes(req.body.clone()),
                "raw" => Value::Bytes(req.raw.clone()),
                "raw_header" => Value::Bytes(req.raw_header.clone()),
                _ => return Err(missing()),
            },
            Value::Response(resp) => match field {
                "status" => Value::Int(resp.status),
                "url" => Value::Url(Arc::new(resp.url.clone())),
                "headers" => Value::string_map(&resp.headers),
                "content_type" => Value::from(resp.content_type.as_str()),
                "body" => Value::Bytes(resp.body.clone()),
                "raw" => Value::Bytes(resp.raw.clone()),
                "raw_header" => Value::Bytes(resp.raw_header.clone()),
                "latency" => Value::Int(resp.latency),
                _ => return Err(missing()),
            },
            Value::Reverse(rev) => match field {
                "url" => Value::Url(Arc::new(rev.url.clone())),
                "domain" => Value::from(rev.domain.as_str()),
                "ip" => Value::from(rev.ip.as_str()),
                "is_domain_name_server" => Value::Bool(rev.is_domain_name_server),
                _ => return Err(missing()),
            },
            other => {
                return Err(EvalError::new(format!(
                    "type '{}' does not support field selection",
                    other.type_name()
                )))
            }
        };
        Ok(value)
    }

    pub fn string_map(map: &HashMap<String, String>) -> Value {
        Value::Map(Arc::new(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
                .collect(),
        ))
    }

    /// JSON rendering used when logging verdicts
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(b) => Json::String(String::from_utf8_lossy(b).into_owned()),
            Value::List(items) => Json::Array(items.iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Url(url) => Json::String(url.to_string()),
            Value::Request(req) => Json::String(format!("{} {}", req.method, req.url)),
            Value::Response(resp) => Json::String(format!("{} {}", resp.status, resp.url)),
            Value::Reverse(rev) => Json::String(rev.domain.clone()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(Bytes::from(b))
    }
}

impl From<Bytes> for Value {
    fn from(b: Bytes) -> Self {
        Value::Bytes(b)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(Arc::new(map))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }
}

impl From<Arc<Request>> for Value {
    fn from(req: Arc<Request>) -> Self {
        Value::Request(req)
    }
}

impl From<Arc<Response>> for Value {
    fn from(resp: Arc<Response>) -> Self {
        Value::Response(resp)
    }
}

impl From<Reverse> for Value {
    fn from(rev: Reverse) -> Self {
        Value::Reverse(Arc::new(rev))
    }
}
