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

//! Out-of-band callback checker.
//!
//! Backs the `wait` builtin: after a fixed wait, asks the record service the
//! callback domain was allocated from whether anything reached it. Every
//! failure reads as "no callback observed".

use crate::config::Config;
use crate::engine_core::constants::reverse as endpoints;
use crate::engine_core::errors::ProbeError;
use crate::engine_core::models::{Reverse, ReverseProvider};
use crate::net::client::HttpClient;
use crate::net::normalize::parse_response;
use crate::utils::bytes::contains_subslice;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderValue, COOKIE};
use reqwest::{Method, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[async_trait]
pub trait ReverseCheck: Send + Sync {
    /// Wait `timeout_secs`, then report whether a callback for `reverse` arrived
    async fn check(&self, reverse: &Reverse, timeout_secs: i64) -> bool;
}

pub struct ReverseChecker {
    client: Arc<HttpClient>,
    ceye_token: Option<String>,
    ceye_api_url: String,
    dnslog_cn_url: String,
    dnslog_cn_session: Option<String>,
}

impl ReverseChecker {
    pub fn new(client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            client,
            ceye_token: config.ceye_token.clone(),
            ceye_api_url: config.ceye_api_url.clone(),
            dnslog_cn_url: config.dnslog_cn_url.clone(),
            dnslog_cn_session: config.dnslog_cn_session.clone(),
        }
    }

    async fn lookup(&self, reverse: &Reverse) -> Result<bool, ProbeError> {
        let label = reverse.label();
        match &reverse.provider {
            ReverseProvider::Ceye => {
                let token = self.ceye_token.as_deref().ok_or_else(|| {
                    ProbeError::ConfigurationError("ceye token is not configured".to_string())
                })?;
                let mut url = parse_endpoint(&format!(
                    "{}{}",
                    self.ceye_api_url.trim_end_matches('/'),
                    endpoints::CEYE_RECORDS_PATH
                ))?;
                url.query_pairs_mut()
                    .append_pair("token", token)
                    .append_pair("type", "dns")
                    .append_pair("filter", label);

                let body = self.fetch_body(reqwest::Request::new(Method::GET, url)).await?;
                Ok(!contains_subslice(&body, endpoints::CEYE_EMPTY_MARKER))
            }
            ReverseProvider::DnslogCn => {
                let url = parse_endpoint(&self.dnslog_cn_url)?;
                let mut request = reqwest::Request::new(Method::GET, url);
                if let Some(session) = &self.dnslog_cn_session {
                    let cookie = HeaderValue::from_str(&format!("PHPSESSID={}", session))
                        .map_err(|e| ProbeError::ConfigurationError(e.to_string()))?;
                    request.headers_mut().insert(COOKIE, cookie);
                }

                let body = self.fetch_body(request).await?;
                Ok(contains_subslice(&body, label.as_bytes()))
            }
            ReverseProvider::Unsupported(_) => Ok(false),
        }
    }

    async fn fetch_body(&self, request: reqwest::Request) -> Result<Bytes, ProbeError> {
        let (response, latency) = self.client.send(request, false).await?;
        Ok(parse_response(response, latency).await?.body)
    }
}

#[async_trait]
impl ReverseCheck for ReverseChecker {
    async fn check(&self, reverse: &Reverse, timeout_secs: i64) -> bool {
        if let ReverseProvider::Unsupported(tag) = &reverse.provider {
            debug!("Unsupported reverse provider '{}' for {}", tag, reverse.domain);
            return false;
        }

        tokio::time::sleep(Duration::from_secs(timeout_secs.max(0).unsigned_abs())).await;

        match self.lookup(reverse).await {
            Ok(true) => {
                info!("Got reverse callback from {}", reverse.domain);
                true
            }
            Ok(false) => false,
            Err(e) => {
                error!("Reverse check error for {}: {}", reverse.domain, e);
                false
            }
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ProbeError> {
    Url::parse(raw)
        .map_err(|e| ProbeError::ConfigurationError(format!("Invalid endpoint '{}': {}", raw, e)))
}
