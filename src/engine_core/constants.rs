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

//! lilith-probe Constants - Single source of truth for configuration values.
//!
//! This module centralizes endpoints, markers, timeouts and environment
//! variable names so the transport, checker and config agree on them.

/// Names of the variables always present in a rule environment
pub mod vars {
    pub const REQUEST: &str = "request";
    pub const RESPONSE: &str = "response";
}

/// Right-hand-side prefixes used to infer a rule variable's type
pub mod inference {
    pub const RANDOM_INT_PREFIX: &str = "randomInt";
    pub const NEW_REVERSE_PREFIX: &str = "newReverse";
}

/// Out-of-band record services
pub mod reverse {
    pub const PROVIDER_CEYE: &str = "ceye";
    pub const PROVIDER_DNSLOG_CN: &str = "dnslog-cn";
    /// Default ceye API base (the records path is appended)
    pub const CEYE_API_URL: &str = "http://api.ceye.io";
    pub const CEYE_RECORDS_PATH: &str = "/v1/records";
    /// Body fragment returned by ceye when no record matched the filter
    pub const CEYE_EMPTY_MARKER: &[u8] = br#""data": []"#;
    pub const DNSLOG_CN_URL: &str = "http://dnslog.cn/getrecords.php";
}

/// HTTP transport tuning
pub mod http {
    use std::time::Duration;

    pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);
    pub const KEEP_ALIVE: Duration = Duration::from_secs(15);
    /// Idle connections kept per host, multiplied by the worker count
    pub const IDLE_PER_THREAD: usize = 2;
    /// Content-Type applied to bodies the rule left untyped
    pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";
    /// Read size used while inflating gzip bodies
    pub const GZIP_CHUNK_SIZE: usize = 1024;
}

/// Configuration defaults
pub mod defaults {
    pub const THREADS: usize = 10;
    pub const TIMEOUT_SECS: u64 = 10;
    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FORMAT: &str = "text";
}

/// Configuration Environment Variables
pub mod config {
    pub const ENV_THREADS: &str = "LILITH_PROBE_THREADS";
    pub const ENV_PROXY: &str = "LILITH_PROBE_PROXY";
    pub const ENV_TIMEOUT_SECS: &str = "LILITH_PROBE_TIMEOUT_SECS";
    pub const ENV_CEYE_TOKEN: &str = "LILITH_PROBE_CEYE_TOKEN";
    pub const ENV_CEYE_API_URL: &str = "LILITH_PROBE_CEYE_API_URL";
    pub const ENV_DNSLOG_CN_URL: &str = "LILITH_PROBE_DNSLOG_CN_URL";
    pub const ENV_DNSLOG_CN_SESSION: &str = "LILITH_PROBE_DNSLOG_CN_SESSION";
    pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
    pub const ENV_LOG_FORMAT: &str = "LOG_FORMAT";
}
