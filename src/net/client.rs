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

//! HTTP transport.
//!
//! Two clients are kept: one follows redirects, one returns the first
//! response. Each has its own cookie store. TLS certificates are not
//! validated since scan targets are routinely self-signed.

use crate::config::Config;
use crate::engine_core::constants::http;
use crate::engine_core::errors::ProbeError;
use crate::engine_core::models::RuleRequest;
use crate::net::cache::{CacheEntry, RequestCache};
use crate::net::normalize::{parse_request, parse_response};
use reqwest::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::{Client, Proxy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct HttpClient {
    redirect: Client,
    no_redirect: Client,
}

impl HttpClient {
    pub fn new(config: &Config) -> Result<Self, ProbeError> {
        let proxy = config
            .proxy
            .as_deref()
            .map(|raw| {
                Proxy::all(raw)
                    .map_err(|e| ProbeError::ProxyError(format!("Parse Proxy error: {}", e)))
            })
            .transpose()?;

        Ok(Self {
            redirect: build_client(config, proxy.clone(), Policy::default())?,
            no_redirect: build_client(config, proxy, Policy::none())?,
        })
    }

    /// Issue `request`, returning the response and the milliseconds until
    /// its head arrived
    pub async fn send(
        &self,
        mut request: reqwest::Request,
        follow_redirects: bool,
    ) -> Result<(reqwest::Response, i64), ProbeError> {
        apply_body_headers(&mut request);
        let client = if follow_redirects {
            &self.redirect
        } else {
            &self.no_redirect
        };

        let start = Instant::now();
        let response = client
            .execute(request)
            .await
            .map_err(|e| ProbeError::RequestError(format!("Request error: {}", e)))?;
        let latency = i64::try_from(start.elapsed().as_millis()).unwrap_or(i64::MAX);
        Ok((response, latency))
    }

    /// Round trip for a rule's sub-request, reusing any cached result for
    /// an identical sub-request
    pub async fn fetch(
        &self,
        cache: &RequestCache,
        rule: &RuleRequest,
        mut request: reqwest::Request,
    ) -> Result<Arc<CacheEntry>, ProbeError> {
        if let Some(entry) = cache.get(rule) {
            debug!("Cache hit for {} {}", rule.method, rule.path);
            return Ok(entry);
        }
        debug!("Cache miss for {} {}", rule.method, rule.path);

        apply_body_headers(&mut request);
        let parsed_request = parse_request(&request)?;
        let outgoing = request.try_clone().ok_or_else(|| {
            ProbeError::RequestError("Request body cannot be replayed".to_string())
        })?;

        let (response, latency) = self.send(request, rule.follow_redirects).await?;
        let parsed_response = parse_response(response, latency).await?;

        let (entry, inserted) = cache.get_or_insert(
            rule,
            CacheEntry {
                outgoing,
                request: Arc::new(parsed_request),
                response: Arc::new(parsed_response),
            },
        );
        if !inserted {
            warn!(
                "Concurrent round trip for {} {} lost the cache race, keeping first result",
                rule.method, rule.path
            );
        }
        Ok(entry)
    }
}

fn build_client(config: &Config, proxy: Option<Proxy>, policy: Policy) -> Result<Client, ProbeError> {
    let mut builder = Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(config.timeout())
        .connect_timeout(http::DIAL_TIMEOUT)
        .tcp_keepalive(http::KEEP_ALIVE)
        .pool_idle_timeout(http::KEEP_ALIVE)
        .pool_max_idle_per_host(config.threads.saturating_mul(http::IDLE_PER_THREAD))
        .cookie_store(true)
        .redirect(policy);

    builder = match proxy {
        Some(proxy) => builder.proxy(proxy),
        None => builder.no_proxy(),
    };

    builder
        .build()
        .map_err(|e| ProbeError::RequestError(format!("Failed to build HTTP client: {}", e)))
}

/// Requests carrying a body get an exact `Content-Length` and a default
/// `Content-Type`
fn apply_body_headers(request: &mut reqwest::Request) {
    let Some(body) = request.body() else {
        return;
    };
    let length = body.as_bytes().map(<[u8]>::len);

    let headers = request.headers_mut();
    if let Some(length) = length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(http::DEFAULT_CONTENT_TYPE));
    }
}
