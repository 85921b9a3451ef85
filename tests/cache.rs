use lilith_probe::engine_core::models::{Request, Response, RuleRequest};
use lilith_probe::net::RequestCache;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn outgoing() -> reqwest::Request {
    reqwest::Request::new(
        reqwest::Method::GET,
        reqwest::Url::parse("http://target.local/a").unwrap(),
    )
}

fn rule_with_headers(headers: &[(&str, &str)]) -> RuleRequest {
    let mut map = HashMap::new();
    for (k, v) in headers {
        map.insert(k.to_string(), v.to_string());
    }
    RuleRequest {
        method: "GET".to_string(),
        path: "/a".to_string(),
        headers: map,
        ..RuleRequest::default()
    }
}

#[test]
fn test_hash_ignores_header_insertion_order() {
    let a = rule_with_headers(&[("B", "2"), ("A", "1")]);
    let b = rule_with_headers(&[("A", "1"), ("B", "2")]);
    assert_eq!(RequestCache::hash(&a), RequestCache::hash(&b));
    assert!(a.can_cluster(&b));
}

#[test]
fn test_hash_changes_with_any_observable_field() {
    let base = rule_with_headers(&[("A", "1")]);
    let variants = [
        RuleRequest {
            method: "POST".to_string(),
            ..base.clone()
        },
        RuleRequest {
            path: "/b".to_string(),
            ..base.clone()
        },
        RuleRequest {
            body: "x=1".to_string(),
            ..base.clone()
        },
        RuleRequest {
            follow_redirects: true,
            ..base.clone()
        },
        rule_with_headers(&[("A", "2")]),
    ];
    for variant in &variants {
        assert_ne!(RequestCache::hash(&base), RequestCache::hash(variant));
        assert!(!base.can_cluster(variant));
    }
}

#[test]
fn test_shifted_field_boundaries_do_not_collide() {
    let path_vs_body = (
        RuleRequest {
            path: "/admin".to_string(),
            ..rule_with_headers(&[])
        },
        RuleRequest {
            path: "/".to_string(),
            body: "admin".to_string(),
            ..rule_with_headers(&[])
        },
    );
    let name_vs_value = (
        rule_with_headers(&[("X-Ab", "")]),
        rule_with_headers(&[("X-A", "b")]),
    );
    let header_vs_body = (
        rule_with_headers(&[("A", "1x")]),
        RuleRequest {
            body: "x".to_string(),
            ..rule_with_headers(&[("A", "1")])
        },
    );

    for (a, b) in [path_vs_body, name_vs_value, header_vs_body] {
        assert!(!a.can_cluster(&b));
        assert_ne!(RequestCache::hash(&a), RequestCache::hash(&b));

        let cache = RequestCache::new();
        assert!(cache.set_if_absent(&a, outgoing(), Request::default(), Response::default()));
        assert!(cache.get(&b).is_none());
        assert!(cache.set_if_absent(&b, outgoing(), Request::default(), Response::default()));
        assert_eq!(cache.len(), 2);
    }
}

#[test]
fn test_can_cluster_reflexive_and_symmetric() {
    let a = rule_with_headers(&[("Cookie", "x=1")]);
    let b = rule_with_headers(&[("Cookie", "x=1"), ("Extra", "y")]);
    assert!(a.can_cluster(&a));
    assert_eq!(a.can_cluster(&b), b.can_cluster(&a));
    assert!(!a.can_cluster(&b));
}

#[test]
fn test_set_if_absent_keeps_first_payload() {
    let cache = RequestCache::new();
    let rule = rule_with_headers(&[]);

    let first = Response {
        status: 200,
        ..Response::default()
    };
    let second = Response {
        status: 404,
        ..Response::default()
    };
    assert!(cache.set_if_absent(&rule, outgoing(), Request::default(), first));
    assert!(!cache.set_if_absent(&rule, outgoing(), Request::default(), second));

    let entry = cache.get(&rule).unwrap();
    assert_eq!(entry.response.status, 200);
    assert_eq!(entry.outgoing.url().path(), "/a");
}

#[test]
fn test_get_does_not_insert() {
    let cache = RequestCache::new();
    let rule = rule_with_headers(&[]);
    assert!(cache.get(&rule).is_none());
    assert!(cache.get(&rule).is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_concurrent_set_if_absent_single_winner() {
    let cache = RequestCache::new();
    let rule = Arc::new(rule_with_headers(&[("A", "1")]));
    let winners = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let cache = cache.clone();
            let rule = rule.clone();
            let winners = winners.clone();
            std::thread::spawn(move || {
                let response = Response {
                    status: 200 + i,
                    ..Response::default()
                };
                if cache.set_if_absent(&rule, outgoing(), Request::default(), response) {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
    assert_eq!(cache.len(), 1);
    let status = cache.get(&rule).unwrap().response.status;
    assert!((200..216).contains(&status));
}
