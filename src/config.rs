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

use crate::engine_core::constants::{config as keys, defaults, reverse};
use crate::engine_core::errors::ProbeError;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub threads: usize,
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub ceye_token: Option<String>,
    pub ceye_api_url: String,
    pub dnslog_cn_url: String,
    /// PHPSESSID the dnslog.cn domain was allocated under
    pub dnslog_cn_session: Option<String>,
    pub log_level: String,
    pub log_format: String, // "json" or "text"
}

impl Config {
    pub fn from_env() -> Result<Self, ProbeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ProbeError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            threads: parse_number(&lookup, keys::ENV_THREADS)?.unwrap_or(defaults.threads),
            proxy: lookup(keys::ENV_PROXY).filter(|p| !p.is_empty()),
            timeout_secs: parse_number(&lookup, keys::ENV_TIMEOUT_SECS)?
                .unwrap_or(defaults.timeout_secs),
            ceye_token: lookup(keys::ENV_CEYE_TOKEN).filter(|t| !t.is_empty()),
            ceye_api_url: lookup(keys::ENV_CEYE_API_URL).unwrap_or(defaults.ceye_api_url),
            dnslog_cn_url: lookup(keys::ENV_DNSLOG_CN_URL).unwrap_or(defaults.dnslog_cn_url),
            dnslog_cn_session: lookup(keys::ENV_DNSLOG_CN_SESSION).filter(|s| !s.is_empty()),
            log_level: lookup(keys::ENV_LOG_LEVEL).unwrap_or(defaults.log_level),
            log_format: lookup(keys::ENV_LOG_FORMAT).unwrap_or(defaults.log_format),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn parse_number<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ProbeError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            ProbeError::ConfigurationError(format!("{} must be a number, got '{}'", key, raw))
        }),
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threads: defaults::THREADS,
            proxy: None,
            timeout_secs: defaults::TIMEOUT_SECS,
            ceye_token: None,
            ceye_api_url: reverse::CEYE_API_URL.to_string(),
            dnslog_cn_url: reverse::DNSLOG_CN_URL.to_string(),
            dnslog_cn_session: None,
            log_level: defaults::LOG_LEVEL.to_string(),
            log_format: defaults::LOG_FORMAT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.threads, 10);
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.ceye_api_url, "http://api.ceye.io");
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            (keys::ENV_THREADS, "32"),
            (keys::ENV_PROXY, "http://127.0.0.1:8080"),
            (keys::ENV_CEYE_TOKEN, "secret"),
            (keys::ENV_LOG_FORMAT, "json"),
        ]))
        .unwrap();
        assert_eq!(config.threads, 32);
        assert_eq!(config.proxy.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.ceye_token.as_deref(), Some("secret"));
        assert_eq!(config.log_format, "json");
    }

    #[test]
    fn test_bad_number_is_configuration_error() {
        let err = Config::from_lookup(lookup(&[(keys::ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(matches!(err, ProbeError::ConfigurationError(_)));
    }
}
