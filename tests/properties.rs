use async_trait::async_trait;
use lilith_probe::engine::{Environment, ReverseCheck};
use lilith_probe::engine_core::models::{Reverse, RuleRequest};
use lilith_probe::expr::{Activation, Type, Value};
use lilith_probe::net::RequestCache;
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

struct NoCallbacks;

#[async_trait]
impl ReverseCheck for NoCallbacks {
    async fn check(&self, _reverse: &Reverse, _timeout_secs: i64) -> bool {
        false
    }
}

fn env() -> Environment {
    let mut env = Environment::new(Arc::new(NoCallbacks));
    env.declare("a", Type::Bytes);
    env.declare("b", Type::Bytes);
    env.declare("lo", Type::Int);
    env.declare("hi", Type::Int);
    env
}

fn eval(env: &Environment, src: &str, activation: &Activation) -> Value {
    let rt = Runtime::new().unwrap();
    rt.block_on(env.evaluate(src, activation)).unwrap()
}

proptest! {
    #[test]
    fn test_bcontains_finds_embedded_needle(
        prefix in proptest::collection::vec(any::<u8>(), 0..64),
        needle in proptest::collection::vec(any::<u8>(), 0..16),
        suffix in proptest::collection::vec(any::<u8>(), 0..64),
    ) {
        let env = env();
        let haystack = [prefix, needle.clone(), suffix].concat();
        let mut activation = Activation::new();
        activation.insert("a", haystack).insert("b", needle);

        prop_assert_eq!(eval(&env, "a.bcontains(b)", &activation), Value::Bool(true));
        prop_assert_eq!(eval(&env, "a.ibcontains(b)", &activation), Value::Bool(true));
    }

    #[test]
    fn test_ibcontains_ignores_case(
        prefix in "[a-z ]{0,20}",
        needle in "[a-z]{1,10}",
        suffix in "[a-z ]{0,20}",
    ) {
        let env = env();
        let haystack = format!("{}{}{}", prefix, needle.to_uppercase(), suffix);
        let mut activation = Activation::new();
        activation
            .insert("a", haystack.into_bytes())
            .insert("b", needle.into_bytes());

        prop_assert_eq!(eval(&env, "a.ibcontains(b)", &activation), Value::Bool(true));
    }

    #[test]
    fn test_random_int_within_bounds(lo in -1000i64..1000, span in 1i64..1000) {
        let env = env();
        let mut activation = Activation::new();
        activation.insert("lo", lo).insert("hi", lo + span);

        for _ in 0..8 {
            match eval(&env, "randomInt(lo, hi)", &activation) {
                Value::Int(v) => prop_assert!(lo <= v && v < lo + span),
                other => prop_assert!(false, "unexpected value {:?}", other),
            }
        }
    }

    #[test]
    fn test_hash_independent_of_header_order(
        headers in proptest::collection::vec(("[A-Za-z-]{1,12}", "[ -~]{0,24}"), 0..8),
    ) {
        let forward: HashMap<String, String> = headers.iter().cloned().collect();
        let mut backward = HashMap::new();
        for (k, _) in headers.iter().rev() {
            backward.insert(k.clone(), forward[k].clone());
        }

        let a = RuleRequest {
            method: "GET".to_string(),
            path: "/".to_string(),
            headers: forward,
            ..RuleRequest::default()
        };
        let b = RuleRequest {
            headers: backward,
            ..a.clone()
        };

        prop_assert!(a.can_cluster(&b));
        prop_assert!(b.can_cluster(&a));
        prop_assert_eq!(RequestCache::hash(&a), RequestCache::hash(&b));
    }
}
