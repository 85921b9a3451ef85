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

//! Request deduplication cache.
//!
//! Rules whose sub-requests are clusterable share one network round trip.
//! Entries are keyed by a structural hash of the `RuleRequest` and are never
//! overwritten: the first writer wins, atomically, for the whole session.

use crate::engine_core::models::{Request, Response, RuleRequest};
use moka::sync::Cache;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// One issued round trip
#[derive(Debug)]
pub struct CacheEntry {
    /// The request as it went out on the wire
    pub outgoing: reqwest::Request,
    pub request: Arc<Request>,
    pub response: Arc<Response>,
}

/// Session-wide registry of completed round trips
#[derive(Clone)]
pub struct RequestCache {
    entries: Cache<String, Arc<CacheEntry>>,
}

impl Default for RequestCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestCache {
    /// Unbounded, with no expiry
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().build(),
        }
    }

    /// Deterministic digest of the network-observable fields, independent
    /// of header iteration order. Every string is length-prefixed so field
    /// boundaries cannot shift between requests.
    pub fn hash(rule: &RuleRequest) -> String {
        let mut names: Vec<&String> = rule.headers.keys().collect();
        names.sort();

        let mut hasher = Sha256::new();
        let mut field = |s: &str| {
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        };
        field(&rule.method);
        field(&rule.path);
        for name in names {
            field(name);
            field(&rule.headers[name]);
        }
        field(&rule.body);
        hasher.update([u8::from(rule.follow_redirects)]);
        hex::encode(hasher.finalize())
    }

    pub fn get(&self, rule: &RuleRequest) -> Option<Arc<CacheEntry>> {
        self.entries.get(&Self::hash(rule))
    }

    /// Store the round trip unless one is already cached for this shape.
    /// Returns whether this call inserted.
    pub fn set_if_absent(
        &self,
        rule: &RuleRequest,
        outgoing: reqwest::Request,
        request: Request,
        response: Response,
    ) -> bool {
        let entry = CacheEntry {
            outgoing,
            request: Arc::new(request),
            response: Arc::new(response),
        };
        self.get_or_insert(rule, entry).1
    }

    /// Insert `entry` if absent and return the cached entry, which is the
    /// first writer's when another insert raced this one
    pub fn get_or_insert(&self, rule: &RuleRequest, entry: CacheEntry) -> (Arc<CacheEntry>, bool) {
        let cached = self
            .entries
            .entry(Self::hash(rule))
            .or_insert_with(|| Arc::new(entry));
        let inserted = cached.is_fresh();
        (cached.into_value(), inserted)
    }

    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn outgoing() -> reqwest::Request {
        reqwest::Request::new(
            reqwest::Method::GET,
            reqwest::Url::parse("http://example.com/a").unwrap(),
        )
    }

    fn rule(follow_redirects: bool) -> RuleRequest {
        RuleRequest {
            method: "GET".to_string(),
            path: "/a".to_string(),
            headers: HashMap::from([("A".to_string(), "1".to_string())]),
            body: String::new(),
            follow_redirects,
        }
    }

    #[test]
    fn test_hash_distinguishes_redirect_flag() {
        assert_ne!(RequestCache::hash(&rule(true)), RequestCache::hash(&rule(false)));
    }

    #[test]
    fn test_first_writer_wins() {
        let cache = RequestCache::new();
        let first = Response {
            status: 200,
            ..Response::default()
        };
        let second = Response {
            status: 500,
            ..Response::default()
        };

        assert!(cache.set_if_absent(&rule(false), outgoing(), Request::default(), first));
        assert!(!cache.set_if_absent(&rule(false), outgoing(), Request::default(), second));
        assert_eq!(cache.get(&rule(false)).unwrap().response.status, 200);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_on_empty_cache() {
        let cache = RequestCache::new();
        assert!(cache.get(&rule(false)).is_none());
        assert!(cache.is_empty());
    }
}
