use async_trait::async_trait;
use bytes::Bytes;
use lilith_probe::engine::{Environment, ReverseCheck, VariableKind};
use lilith_probe::engine_core::errors::{ErrorScope, ProbeError};
use lilith_probe::engine_core::models::{Response, Reverse};
use lilith_probe::expr::{Activation, Type, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Records calls and answers with a fixed verdict
struct StubReverse {
    verdict: bool,
    calls: AtomicUsize,
}

#[async_trait]
impl ReverseCheck for StubReverse {
    async fn check(&self, _reverse: &Reverse, _timeout_secs: i64) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict
    }
}

fn stub(verdict: bool) -> Arc<StubReverse> {
    Arc::new(StubReverse {
        verdict,
        calls: AtomicUsize::new(0),
    })
}

fn env() -> Environment {
    Environment::new(stub(false))
}

async fn eval(env: &Environment, src: &str) -> Result<Value, ProbeError> {
    env.evaluate(src, &Activation::new()).await
}

#[tokio::test]
async fn test_icontains() {
    let env = env();
    assert_eq!(
        eval(&env, r#"icontains("HeLLo ProC", "hello")"#).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&env, r#""abc".icontains("xyz")"#).await.unwrap(),
        Value::Bool(false)
    );
}

#[tokio::test]
async fn test_bcontains_is_case_sensitive() {
    let env = env();
    assert_eq!(
        eval(&env, r#"b"Hello World".bcontains(b"world")"#).await.unwrap(),
        Value::Bool(false)
    );
    assert_eq!(
        eval(&env, r#"b"Hello World".ibcontains(b"world")"#).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&env, r#"b"Hello World".bstartsWith(b"Hell")"#).await.unwrap(),
        Value::Bool(true)
    );
}

#[tokio::test]
async fn test_substr() {
    let env = env();
    assert_eq!(
        eval(&env, r#"substr("hello", 1, 3)"#).await.unwrap(),
        Value::from("ell")
    );

    for src in [r#"substr("hello", -1, 2)"#, r#"substr("hello", 0, 10)"#] {
        let err = eval(&env, src).await.unwrap_err();
        assert!(matches!(err, ProbeError::EvaluationError(_)), "{}", src);
        assert_eq!(err.scope(), ErrorScope::Rule);
    }
}

#[tokio::test]
async fn test_submatch() {
    let env = env();
    let out = eval(&env, r#""(?P<x>[0-9]+)".submatch("abc123def")"#)
        .await
        .unwrap();
    let expected = BTreeMap::from([("x".to_string(), Value::from("123"))]);
    assert_eq!(out, Value::from(expected));

    let out = eval(&env, r#""(?P<x>[0-9]+)".submatch("no digits")"#)
        .await
        .unwrap();
    assert_eq!(out, Value::from(BTreeMap::new()));

    assert_eq!(
        eval(&env, r#""(?P<v>[0-9.]+)".bsubmatch(b"version 1.2.3")["v"] == "1.2.3""#)
            .await
            .unwrap(),
        Value::Bool(true)
    );
}

#[tokio::test]
async fn test_regex_pattern_is_receiver() {
    let env = env();
    assert_eq!(
        eval(&env, r#""^root:.*:0:0:".matches("root:x:0:0:root")"#)
            .await
            .unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&env, r#""[0-9]{3}".bmatches(b"abc")"#).await.unwrap(),
        Value::Bool(false)
    );
    let err = eval(&env, r#""(".matches("x")"#).await.unwrap_err();
    assert!(matches!(err, ProbeError::EvaluationError(_)));
}

#[tokio::test]
async fn test_encoding_builtins() {
    let env = env();
    assert_eq!(
        eval(&env, r#"md5("admin")"#).await.unwrap(),
        Value::from("21232f297a57a5a743894a0e4a801fc3")
    );
    assert_eq!(
        eval(&env, r#"base64("hello")"#).await.unwrap(),
        Value::from("aGVsbG8=")
    );
    assert_eq!(
        eval(&env, r#"base64(b"hello")"#).await.unwrap(),
        Value::from("aGVsbG8=")
    );
    assert_eq!(
        eval(&env, r#"base64Decode("aGVsbG8=")"#).await.unwrap(),
        Value::from("hello")
    );
    assert!(eval(&env, r#"base64Decode("***")"#).await.is_err());
    assert_eq!(
        eval(&env, r#"urlencode("a b&c")"#).await.unwrap(),
        Value::from("a+b%26c")
    );
    assert_eq!(
        eval(&env, r#"urldecode(b"a+b%26c")"#).await.unwrap(),
        Value::from("a b&c")
    );
    assert!(eval(&env, r#"urldecode("%g1")"#).await.is_err());
}

#[tokio::test]
async fn test_string_builtins() {
    let env = env();
    assert_eq!(
        eval(&env, r#"replaceAll("a.b.c", ".", "/")"#).await.unwrap(),
        Value::from("a/b/c")
    );
    assert_eq!(
        eval(&env, r#"printable("ab\x01c")"#).await.unwrap(),
        Value::from("abc")
    );
    assert_eq!(
        eval(&env, r#"size(randomLowercase(12))"#).await.unwrap(),
        Value::Int(12)
    );
    assert_eq!(
        eval(&env, r#""abc".startsWith("ab") && "abc".endsWith("bc") && "abc".contains("b")"#)
            .await
            .unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        eval(&env, r#"string(12) + string(b"3") == "123""#).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(eval(&env, r#"int("42") + 1"#).await.unwrap(), Value::Int(43));
}

#[tokio::test]
async fn test_sleep_returns_true() {
    let env = env();
    assert_eq!(eval(&env, "sleep(0)").await.unwrap(), Value::Bool(true));
}

#[tokio::test]
async fn test_compile_errors_are_authoring_defects() {
    let env = env();
    for src in ["undeclared == 1", "md5(1)", "response.status ==", "bcontains(b'a')"] {
        let err = env.compile(src).unwrap_err();
        assert!(matches!(err, ProbeError::CompileError(_)), "{}", src);
        assert!(err.is_authoring_defect());
    }
}

#[tokio::test]
async fn test_response_bound_expression() {
    let env = env();
    let response = Response {
        status: 200,
        body: Bytes::from_static(b"root:x:0:0:root:/root:/bin/bash"),
        headers: HashMap::from([("server".to_string(), "Apache".to_string())]),
        latency: 12,
        ..Response::default()
    };
    let activation = Activation::new().with_response(Arc::new(response));

    let verdict = env
        .evaluate(
            r#"response.status == 200 && "root:.*?:[0-9]*:[0-9]*:".bmatches(response.body) && response.headers["server"].icontains("apache")"#,
            &activation,
        )
        .await
        .unwrap();
    assert_eq!(verdict, Value::Bool(true));
}

#[tokio::test]
async fn test_missing_binding_is_evaluation_error() {
    let env = env();
    let err = eval(&env, "response.status == 200").await.unwrap_err();
    assert!(matches!(err, ProbeError::EvaluationError(_)));
}

#[tokio::test]
async fn test_rule_variables_typed_from_assignment_text() {
    let mut env = env();
    env.declare_rule_variables([
        ("r1", "randomInt(800000000, 1000000000)"),
        ("r2", "randomLowercase(4)"),
        ("reverse", "newReverse()"),
    ]);

    let mut activation = Activation::new();
    activation.insert("r1", 900000000i64);
    activation.insert("r2", "abcd");

    assert_eq!(
        env.evaluate("r1 + 1 == 900000001 && r2.size() == 4", &activation)
            .await
            .unwrap(),
        Value::Bool(true)
    );
    assert!(env.compile("r2 + 1").is_err());
    assert_eq!(
        env.compile("reverse.domain").unwrap().result_type(),
        &Type::String
    );
    assert_eq!(
        env.declare_rule_variable("r3", "newReverse()"),
        VariableKind::NewReverseLiteral
    );
}

#[tokio::test]
async fn test_wait_delegates_to_checker() {
    let checker = stub(true);
    let mut env = Environment::new(checker.clone());
    env.declare_rule_variable("reverse", "newReverse()");

    let activation = {
        let mut a = Activation::new();
        a.insert("reverse", Reverse::new("ceye", "abc123.x.ceye.io"));
        a
    };
    assert_eq!(
        env.evaluate("reverse.wait(5)", &activation).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(
        env.evaluate("wait(reverse, 5)", &activation).await.unwrap(),
        Value::Bool(true)
    );
    assert_eq!(checker.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_wait_rejects_non_reverse_at_runtime() {
    let checker = stub(true);
    let mut env = Environment::new(checker.clone());
    env.declare("anything", Type::Dyn);

    let mut activation = Activation::new();
    activation.insert("anything", "not a reverse");
    let err = env
        .evaluate("wait(anything, 1)", &activation)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unexpected type 'string' passed to 'wait'"));
    assert_eq!(checker.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_result_functions() {
    let mut env = env();
    env.register_result_function("r0", true);
    env.register_result_function("r1", false);
    assert_eq!(
        eval(&env, "r0() && !r1()").await.unwrap(),
        Value::Bool(true)
    );

    env.register_result_function("r1", true);
    assert_eq!(eval(&env, "r0() && r1()").await.unwrap(), Value::Bool(true));
}

#[tokio::test]
async fn test_compiled_program_is_reusable() {
    let mut env = env();
    env.declare("n", Type::Int);
    let program = env.prepare(&env.compile("n * 2").unwrap()).unwrap();

    for n in [1i64, 5, -3] {
        let mut activation = Activation::new();
        activation.insert("n", n);
        assert_eq!(program.evaluate(&activation).await.unwrap(), Value::Int(n * 2));
    }
}

#[tokio::test]
async fn test_long_connective_chains_evaluate() {
    let env = env();
    let all_true = format!("true{}", " && true".repeat(9_999));
    assert_eq!(eval(&env, &all_true).await.unwrap(), Value::Bool(true));

    let last_true = format!("false{} || true", " || false".repeat(9_998));
    assert_eq!(eval(&env, &last_true).await.unwrap(), Value::Bool(true));

    let err = eval(&env, &format!("1{} == 10001", " + 1".repeat(10_000)))
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::CompileError(_)));
    assert_eq!(err.scope(), ErrorScope::Rule);
}

#[test]
fn test_declarations_are_listed() {
    let mut env = env();
    let names: Vec<&str> = env.variables().iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, ["request", "response"]);
    assert!(env.functions().iter().any(|f| f.name == "bcontains"));
    assert!(env.functions().iter().all(|f| f.name != "r0"));

    env.declare_rule_variable("r0", "randomInt(1, 10)");
    env.register_result_function("r0", true);
    let last = env.variables().last().unwrap();
    assert_eq!((last.name.as_str(), &last.ty), ("r0", &Type::Int));
    let r0 = env.functions().last().unwrap();
    assert_eq!((r0.name.as_str(), &r0.result), ("r0", &Type::Bool));
}
