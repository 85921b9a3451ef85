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

//! Builtin function catalog.
//!
//! Every builtin checks its operands' runtime types itself and reports a
//! mismatch with `EvalError::unexpected_type`. Regex builtins share a bounded
//! cache of compiled patterns, since rule-sets reuse the same few patterns
//! against every target.

use crate::engine::environment::Environment;
use crate::engine::reverse::ReverseCheck;
use crate::engine_core::errors::EvalError;
use crate::expr::function::{native, Function};
use crate::expr::value::{Type, Value};
use crate::utils::bytes::contains_subslice;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::{Digest, Md5};
use rand::Rng;
use regex::bytes::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

const REGEX_CACHE_CAPACITY: u64 = 512;

/// Register the builtin catalog and the standard functions on `env`
pub fn register(env: &mut Environment, reverse: Arc<dyn ReverseCheck>) {
    use Type::{Bool, Bytes, Dyn, Int, String as Str};

    let regexes = RegexCache::new();

    env.register_function(
        "bcontains",
        "bytes_bcontains_bytes",
        vec![Bytes, Bytes],
        Bool,
        native(|args| {
            let (haystack, needle) = (bytes_arg(args, 0, "bcontains")?, bytes_arg(args, 1, "bcontains")?);
            Ok(Value::Bool(contains_subslice(haystack, needle)))
        }),
    );
    env.register_function(
        "ibcontains",
        "bytes_ibcontains_bytes",
        vec![Bytes, Bytes],
        Bool,
        native(|args| {
            let haystack = lower_bytes(bytes_arg(args, 0, "ibcontains")?);
            let needle = lower_bytes(bytes_arg(args, 1, "ibcontains")?);
            Ok(Value::Bool(contains_subslice(&haystack, &needle)))
        }),
    );
    env.register_function(
        "icontains",
        "icontains_string",
        vec![Str, Str],
        Bool,
        native(|args| {
            let haystack = string_arg(args, 0, "icontains")?.to_lowercase();
            let needle = string_arg(args, 1, "icontains")?.to_lowercase();
            Ok(Value::Bool(haystack.contains(&needle)))
        }),
    );
    env.register_function(
        "bstartsWith",
        "bytes_bstartsWith_bytes",
        vec![Bytes, Bytes],
        Bool,
        native(|args| {
            let value = bytes_arg(args, 0, "bstartsWith")?;
            let prefix = bytes_arg(args, 1, "bstartsWith")?;
            Ok(Value::Bool(value.starts_with(prefix)))
        }),
    );

    // Regex builtins take the pattern as the receiver
    {
        let regexes = regexes.clone();
        env.register_function(
            "matches",
            "string_matches_string",
            vec![Str, Str],
            Bool,
            native(move |args| {
                let re = regexes.compile(string_arg(args, 0, "matches")?)?;
                Ok(Value::Bool(re.is_match(string_arg(args, 1, "matches")?.as_bytes())))
            }),
        );
    }
    {
        let regexes = regexes.clone();
        env.register_function(
            "bmatches",
            "string_bmatches_bytes",
            vec![Str, Bytes],
            Bool,
            native(move |args| {
                let re = regexes.compile(string_arg(args, 0, "bmatches")?)?;
                Ok(Value::Bool(re.is_match(bytes_arg(args, 1, "bmatches")?)))
            }),
        );
    }
    {
        let regexes = regexes.clone();
        env.register_function(
            "submatch",
            "string_submatch_string",
            vec![Str, Str],
            Type::Map(Box::new(Str)),
            native(move |args| {
                let re = regexes.compile(string_arg(args, 0, "submatch")?)?;
                Ok(submatch(&re, string_arg(args, 1, "submatch")?.as_bytes()))
            }),
        );
    }
    env.register_function(
        "bsubmatch",
        "string_bsubmatch_bytes",
        vec![Str, Bytes],
        Type::Map(Box::new(Str)),
        native(move |args| {
            let re = regexes.compile(string_arg(args, 0, "bsubmatch")?)?;
            Ok(submatch(&re, bytes_arg(args, 1, "bsubmatch")?))
        }),
    );

    env.register_function(
        "wait",
        "reverse_wait_int",
        vec![Dyn, Int],
        Bool,
        Arc::new(WaitFunction { checker: reverse }),
    );

    env.register_function(
        "md5",
        "md5_string",
        vec![Str],
        Str,
        native(|args| {
            let digest = Md5::digest(string_arg(args, 0, "md5")?.as_bytes());
            Ok(Value::String(hex::encode(digest)))
        }),
    );
    env.register_function(
        "randomInt",
        "randomInt_int_int",
        vec![Int, Int],
        Int,
        native(|args| {
            let (min, max) = (int_arg(args, 0, "randomInt")?, int_arg(args, 1, "randomInt")?);
            if min >= max {
                return Err(EvalError::new(format!(
                    "invalid range [{}, {}) passed to 'randomInt'",
                    min, max
                )));
            }
            Ok(Value::Int(rand::rng().random_range(min..max)))
        }),
    );
    env.register_function(
        "randomLowercase",
        "randomLowercase_int",
        vec![Int],
        Str,
        native(|args| {
            let n = int_arg(args, 0, "randomLowercase")?;
            let n = usize::try_from(n).map_err(|_| {
                EvalError::new(format!("invalid length {} passed to 'randomLowercase'", n))
            })?;
            Ok(Value::String(random_lowercase(n)))
        }),
    );

    env.register_function(
        "base64",
        "base64_string",
        vec![Str],
        Str,
        native(|args| Ok(Value::String(STANDARD.encode(string_arg(args, 0, "base64")?)))),
    );
    env.register_function(
        "base64",
        "base64_bytes",
        vec![Bytes],
        Str,
        native(|args| Ok(Value::String(STANDARD.encode(bytes_arg(args, 0, "base64")?)))),
    );
    env.register_function(
        "base64Decode",
        "base64Decode_string",
        vec![Str],
        Str,
        native(|args| base64_decode(string_arg(args, 0, "base64Decode")?.as_bytes())),
    );
    env.register_function(
        "base64Decode",
        "base64Decode_bytes",
        vec![Bytes],
        Str,
        native(|args| base64_decode(bytes_arg(args, 0, "base64Decode")?)),
    );

    env.register_function(
        "urlencode",
        "urlencode_string",
        vec![Str],
        Str,
        native(|args| Ok(Value::String(query_escape(string_arg(args, 0, "urlencode")?.as_bytes())))),
    );
    env.register_function(
        "urlencode",
        "urlencode_bytes",
        vec![Bytes],
        Str,
        native(|args| Ok(Value::String(query_escape(bytes_arg(args, 0, "urlencode")?)))),
    );
    env.register_function(
        "urldecode",
        "urldecode_string",
        vec![Str],
        Str,
        native(|args| query_unescape(string_arg(args, 0, "urldecode")?.as_bytes()).map(Value::String)),
    );
    env.register_function(
        "urldecode",
        "urldecode_bytes",
        vec![Bytes],
        Str,
        native(|args| query_unescape(bytes_arg(args, 0, "urldecode")?).map(Value::String)),
    );

    env.register_function(
        "substr",
        "substr_string_int_int",
        vec![Str, Int, Int],
        Str,
        native(|args| {
            substr(
                string_arg(args, 0, "substr")?,
                int_arg(args, 1, "substr")?,
                int_arg(args, 2, "substr")?,
            )
            .map(Value::String)
        }),
    );
    env.register_function(
        "replaceAll",
        "replaceAll_string_string_string",
        vec![Str, Str, Str],
        Str,
        native(|args| {
            let s = string_arg(args, 0, "replaceAll")?;
            let from = string_arg(args, 1, "replaceAll")?;
            let to = string_arg(args, 2, "replaceAll")?;
            Ok(Value::String(replace_all(s, from, to)))
        }),
    );
    env.register_function(
        "printable",
        "printable_string",
        vec![Str],
        Str,
        native(|args| {
            let s = string_arg(args, 0, "printable")?;
            Ok(Value::String(s.chars().filter(|c| is_printable(*c)).collect()))
        }),
    );
    env.register_function("sleep", "sleep_int", vec![Int], Bool, Arc::new(SleepFunction));

    register_standard(env);
}

/// Core string and conversion functions
fn register_standard(env: &mut Environment) {
    use Type::{Bool, Bytes, Int, String as Str};

    env.register_function(
        "contains",
        "contains_string",
        vec![Str, Str],
        Bool,
        native(|args| {
            let (s, sub) = (string_arg(args, 0, "contains")?, string_arg(args, 1, "contains")?);
            Ok(Value::Bool(s.contains(sub)))
        }),
    );
    env.register_function(
        "startsWith",
        "startsWith_string",
        vec![Str, Str],
        Bool,
        native(|args| {
            let (s, p) = (string_arg(args, 0, "startsWith")?, string_arg(args, 1, "startsWith")?);
            Ok(Value::Bool(s.starts_with(p)))
        }),
    );
    env.register_function(
        "endsWith",
        "endsWith_string",
        vec![Str, Str],
        Bool,
        native(|args| {
            let (s, p) = (string_arg(args, 0, "endsWith")?, string_arg(args, 1, "endsWith")?);
            Ok(Value::Bool(s.ends_with(p)))
        }),
    );

    let size = || {
        native(|args| {
            let n = match args.first() {
                Some(Value::String(s)) => s.chars().count(),
                Some(Value::Bytes(b)) => b.len(),
                Some(Value::List(items)) => items.len(),
                Some(Value::Map(map)) => map.len(),
                other => return Err(mismatch(other, "size")),
            };
            i64::try_from(n)
                .map(Value::Int)
                .map_err(|_| EvalError::new("integer overflow"))
        })
    };
    env.register_function("size", "size_string", vec![Str], Int, size());
    env.register_function("size", "size_bytes", vec![Bytes], Int, size());
    env.register_function(
        "size",
        "size_list",
        vec![Type::List(Box::new(Type::Dyn))],
        Int,
        size(),
    );
    env.register_function(
        "size",
        "size_map",
        vec![Type::Map(Box::new(Type::Dyn))],
        Int,
        size(),
    );

    let to_string = || {
        native(|args| match args.first() {
            Some(Value::String(s)) => Ok(Value::String(s.clone())),
            Some(Value::Int(i)) => Ok(Value::String(i.to_string())),
            Some(Value::Bytes(b)) => String::from_utf8(b.to_vec())
                .map(Value::String)
                .map_err(|_| EvalError::new("invalid UTF-8 in bytes passed to 'string'")),
            other => Err(mismatch(other, "string")),
        })
    };
    env.register_function("string", "string_string", vec![Str], Str, to_string());
    env.register_function("string", "string_int", vec![Int], Str, to_string());
    env.register_function("string", "string_bytes", vec![Bytes], Str, to_string());

    let to_bytes = || {
        native(|args| match args.first() {
            Some(Value::String(s)) => Ok(Value::from(s.as_bytes().to_vec())),
            Some(Value::Bytes(b)) => Ok(Value::Bytes(b.clone())),
            other => Err(mismatch(other, "bytes")),
        })
    };
    env.register_function("bytes", "bytes_string", vec![Str], Bytes, to_bytes());
    env.register_function("bytes", "bytes_bytes", vec![Bytes], Bytes, to_bytes());

    let to_int = || {
        native(|args| match args.first() {
            Some(Value::Int(i)) => Ok(Value::Int(*i)),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| EvalError::new(format!("cannot convert '{}' to int", s))),
            other => Err(mismatch(other, "int")),
        })
    };
    env.register_function("int", "int_int", vec![Int], Int, to_int());
    env.register_function("int", "int_string", vec![Str], Int, to_int());
}

struct WaitFunction {
    checker: Arc<dyn ReverseCheck>,
}

#[async_trait]
impl Function for WaitFunction {
    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let reverse = match args.first() {
            Some(Value::Reverse(reverse)) => reverse.clone(),
            other => return Err(mismatch(other, "wait")),
        };
        let timeout = int_arg(&args, 1, "wait")?;
        Ok(Value::Bool(self.checker.check(&reverse, timeout).await))
    }
}

struct SleepFunction;

#[async_trait]
impl Function for SleepFunction {
    async fn call(&self, args: Vec<Value>) -> Result<Value, EvalError> {
        let secs = int_arg(&args, 0, "sleep")?;
        tokio::time::sleep(Duration::from_secs(secs.max(0).unsigned_abs())).await;
        Ok(Value::Bool(true))
    }
}

#[derive(Clone)]
struct RegexCache(moka::sync::Cache<String, Arc<Regex>>);

impl RegexCache {
    fn new() -> Self {
        Self(moka::sync::Cache::new(REGEX_CACHE_CAPACITY))
    }

    fn compile(&self, pattern: &str) -> Result<Arc<Regex>, EvalError> {
        self.0
            .try_get_with(pattern.to_string(), || Regex::new(pattern).map(Arc::new))
            .map_err(|e| EvalError::new(format!("invalid regex '{}': {}", pattern, e)))
    }
}

/// Capture groups 1..n keyed by name, or by index when unnamed
fn submatch(re: &Regex, haystack: &[u8]) -> Value {
    let mut groups = BTreeMap::new();
    if let Some(caps) = re.captures(haystack) {
        for (i, name) in re.capture_names().enumerate().skip(1) {
            let key = name.map(str::to_string).unwrap_or_else(|| i.to_string());
            let value = caps
                .get(i)
                .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
                .unwrap_or_default();
            groups.insert(key, Value::String(value));
        }
    }
    Value::from(groups)
}

fn lower_bytes(b: &[u8]) -> Vec<u8> {
    match std::str::from_utf8(b) {
        Ok(s) => s.to_lowercase().into_bytes(),
        Err(_) => b.to_ascii_lowercase(),
    }
}

fn random_lowercase(n: usize) -> String {
    let mut rng = rand::rng();
    (0..n).map(|_| rng.random_range(b'a'..=b'z') as char).collect()
}

fn base64_decode(input: &[u8]) -> Result<Value, EvalError> {
    STANDARD
        .decode(input)
        .map(|decoded| Value::String(String::from_utf8_lossy(&decoded).into_owned()))
        .map_err(|e| EvalError::new(e.to_string()))
}

/// Query-component escaping: spaces become `+`
fn query_escape(input: &[u8]) -> String {
    url::form_urlencoded::byte_serialize(input).collect()
}

/// Strict inverse of `query_escape`; a malformed `%` escape is an error
fn query_unescape(input: &[u8]) -> Result<String, EvalError> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'%' => {
                let escape = input.get(i + 1..i + 3);
                let decoded = escape
                    .filter(|hex| hex.iter().all(u8::is_ascii_hexdigit))
                    .and_then(|hex| std::str::from_utf8(hex).ok())
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                match decoded {
                    Some(b) => out.push(b),
                    None => {
                        let end = input.len().min(i + 3);
                        return Err(EvalError::new(format!(
                            "invalid URL escape \"{}\"",
                            String::from_utf8_lossy(&input[i..end])
                        )));
                    }
                }
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(String::from_utf8_lossy(&out).into_owned())
}

fn substr(s: &str, start: i64, length: i64) -> Result<String, EvalError> {
    let runes: Vec<char> = s.chars().collect();
    let invalid = || EvalError::new("invalid start or length to 'substr'");
    let start = usize::try_from(start).map_err(|_| invalid())?;
    let length = usize::try_from(length).map_err(|_| invalid())?;
    let end = start.checked_add(length).ok_or_else(invalid)?;
    if end > runes.len() {
        return Err(invalid());
    }
    Ok(runes[start..end].iter().collect())
}

fn replace_all(s: &str, from: &str, to: &str) -> String {
    if !from.is_empty() {
        return s.replace(from, to);
    }
    // An empty pattern matches before every rune and at the end
    let mut out = String::with_capacity(s.len() + to.len() * (s.len() + 1));
    for c in s.chars() {
        out.push_str(to);
        out.push(c);
    }
    out.push_str(to);
    out
}

fn is_printable(c: char) -> bool {
    if c == ' ' {
        return true;
    }
    !(c.is_control() || c.is_whitespace() || is_format_char(c))
}

/// Invisible formatting characters (Unicode category Cf) that show up in responses
fn is_format_char(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{0600}'..='\u{0605}'
            | '\u{061C}'
            | '\u{06DD}'
            | '\u{070F}'
            | '\u{180E}'
            | '\u{200B}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{206F}'
            | '\u{FEFF}'
            | '\u{FFF9}'..='\u{FFFB}'
    )
}

fn mismatch(value: Option<&Value>, function: &str) -> EvalError {
    let type_name = value.map(Value::type_name).unwrap_or_else(|| "null_type".to_string());
    EvalError::unexpected_type(&type_name, function)
}

fn string_arg<'a>(args: &'a [Value], i: usize, function: &str) -> Result<&'a str, EvalError> {
    match args.get(i) {
        Some(Value::String(s)) => Ok(s.as_str()),
        other => Err(mismatch(other, function)),
    }
}

fn bytes_arg<'a>(args: &'a [Value], i: usize, function: &str) -> Result<&'a [u8], EvalError> {
    match args.get(i) {
        Some(Value::Bytes(b)) => Ok(&b[..]),
        other => Err(mismatch(other, function)),
    }
}

fn int_arg(args: &[Value], i: usize, function: &str) -> Result<i64, EvalError> {
    match args.get(i) {
        Some(Value::Int(n)) => Ok(*n),
        other => Err(mismatch(other, function)),
    }
}
