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

//! Domain models for the rule engine.
//!
//! This module contains the canonical snapshots of URLs, requests, responses
//! and reverse-callback descriptors that rule expressions operate on, plus the
//! rule-level request description used as the deduplication key. It is free
//! of I/O side effects; `net::normalize` builds these from live traffic.

use crate::engine_core::constants::reverse;
use crate::engine_core::errors::ProbeError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Decomposed URL as seen by rule expressions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlType {
    pub scheme: String,
    /// Host name without port
    pub domain: String,
    /// Host name with port, when the URL carried one
    pub host: String,
    pub port: String,
    /// Escaped path
    pub path: String,
    /// Raw query without the leading `?`
    pub query: String,
    pub fragment: String,
}

impl UrlType {
    /// Parse a raw URL string into its canonical parts.
    pub fn parse(raw: &str) -> Result<Self, ProbeError> {
        let url = url::Url::parse(raw)
            .map_err(|e| ProbeError::RequestError(format!("Invalid URL '{}': {}", raw, e)))?;
        Ok(Self::from(&url))
    }
}

impl From<&url::Url> for UrlType {
    fn from(url: &url::Url) -> Self {
        let host_str = url.host_str().unwrap_or_default();
        let port = url.port().map(|p| p.to_string()).unwrap_or_default();
        let host = if port.is_empty() {
            host_str.to_string()
        } else {
            format!("{}:{}", host_str, port)
        };

        Self {
            scheme: url.scheme().to_string(),
            domain: host_str
                .trim_start_matches('[')
                .trim_end_matches(']')
                .to_string(),
            host,
            port,
            path: url.path().to_string(),
            query: url.query().unwrap_or_default().to_string(),
            fragment: url.fragment().unwrap_or_default().to_string(),
        }
    }
}

impl fmt::Display for UrlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = String::new();
        if !self.scheme.is_empty() {
            buf.push_str(&self.scheme);
            buf.push(':');
        }
        if !self.scheme.is_empty() || !self.host.is_empty() {
            if !self.host.is_empty() || !self.path.is_empty() {
                buf.push_str("//");
            }
            buf.push_str(&self.host);
        }
        let path = self.path.as_str();
        if !path.is_empty() && !path.starts_with('/') && !self.host.is_empty() {
            buf.push('/');
        }
        // A relative path like "a:b" would otherwise parse back as a scheme
        if buf.is_empty() {
            if let Some(colon) = path.find(':') {
                if !path[..colon].contains('/') {
                    buf.push_str("./");
                }
            }
        }
        buf.push_str(path);

        if !self.query.is_empty() {
            buf.push('?');
            buf.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            buf.push('#');
            buf.push_str(&self.fragment);
        }
        f.write_str(&buf)
    }
}

/// Snapshot of an issued request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub method: String,
    pub url: UrlType,
    /// Header name to last value
    pub headers: HashMap<String, String>,
    /// `name=value` lines, one per header name
    pub raw_header: Bytes,
    pub content_type: String,
    pub body: Bytes,
    /// Full request in wire form
    pub raw: Bytes,
}

/// Snapshot of a received response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub status: i64,
    /// URL of the request that produced this response (after redirects)
    pub url: UrlType,
    pub headers: HashMap<String, String>,
    pub raw_header: Bytes,
    pub content_type: String,
    /// Decoded body
    pub body: Bytes,
    pub raw: Bytes,
    /// Milliseconds until the response head arrived
    pub latency: i64,
}

/// Out-of-band record service a callback domain was allocated from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[non_exhaustive]
pub enum ReverseProvider {
    Ceye,
    DnslogCn,
    Unsupported(String),
}

impl ReverseProvider {
    pub fn as_str(&self) -> &str {
        match self {
            ReverseProvider::Ceye => reverse::PROVIDER_CEYE,
            ReverseProvider::DnslogCn => reverse::PROVIDER_DNSLOG_CN,
            ReverseProvider::Unsupported(tag) => tag,
        }
    }
}

impl From<&str> for ReverseProvider {
    fn from(tag: &str) -> Self {
        match tag {
            reverse::PROVIDER_CEYE => ReverseProvider::Ceye,
            reverse::PROVIDER_DNSLOG_CN => ReverseProvider::DnslogCn,
            other => ReverseProvider::Unsupported(other.to_string()),
        }
    }
}

impl From<String> for ReverseProvider {
    fn from(tag: String) -> Self {
        ReverseProvider::from(tag.as_str())
    }
}

impl From<ReverseProvider> for String {
    fn from(provider: ReverseProvider) -> Self {
        provider.as_str().to_string()
    }
}

impl fmt::Display for ReverseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reverse-callback descriptor produced by a domain allocator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reverse {
    pub provider: ReverseProvider,
    /// Allocated callback domain, e.g. `abcd1234.xxxx.ceye.io`
    pub domain: String,
    #[serde(default)]
    pub url: UrlType,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub is_domain_name_server: bool,
}

impl Reverse {
    pub fn new(provider: impl Into<ReverseProvider>, domain: impl Into<String>) -> Self {
        let domain = domain.into();
        let url = UrlType {
            scheme: "http".to_string(),
            domain: domain.clone(),
            host: domain.clone(),
            ..UrlType::default()
        };
        Self {
            provider: provider.into(),
            domain,
            url,
            ip: String::new(),
            is_domain_name_server: false,
        }
    }

    /// First label of the allocated domain, used as the record filter
    pub fn label(&self) -> &str {
        self.domain.split('.').next().unwrap_or_default()
    }
}

/// The network-observable part of a rule's sub-request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRequest {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub follow_redirects: bool,
}

impl RuleRequest {
    /// Two sub-requests are clusterable when every network-observable field matches
    pub fn can_cluster(&self, other: &RuleRequest) -> bool {
        self.method == other.method
            && self.path == other.path
            && self.body == other.body
            && self.follow_redirects == other.follow_redirects
            && self.headers == other.headers
    }
}
