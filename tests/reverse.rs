use lilith_probe::config::Config;
use lilith_probe::engine::{ReverseCheck, ReverseChecker};
use lilith_probe::engine_core::models::Reverse;
use lilith_probe::net::HttpClient;
use mockito::Matcher;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn checker(config: &Config) -> ReverseChecker {
    let client = Arc::new(HttpClient::new(config).unwrap());
    ReverseChecker::new(client, config)
}

fn config_for(server: &mockito::ServerGuard) -> Config {
    Config {
        ceye_token: Some("t0ken".to_string()),
        ceye_api_url: server.url(),
        dnslog_cn_url: format!("{}/getrecords.php", server.url()),
        dnslog_cn_session: Some("sess1".to_string()),
        ..Config::default()
    }
}

fn ceye_query() -> Matcher {
    Matcher::AllOf(vec![
        Matcher::UrlEncoded("token".into(), "t0ken".into()),
        Matcher::UrlEncoded("type".into(), "dns".into()),
        Matcher::UrlEncoded("filter".into(), "abc123".into()),
    ])
}

#[tokio::test]
async fn test_ceye_record_found() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/records")
        .match_query(ceye_query())
        .with_body(r#"{"meta": {"code": 200}, "data": [{"name": "abc123.x1y2.ceye.io"}]}"#)
        .create_async()
        .await;

    let reverse = Reverse::new("ceye", "abc123.x1y2.ceye.io");
    assert!(checker(&config_for(&server)).check(&reverse, 0).await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ceye_empty_result() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/records")
        .match_query(ceye_query())
        .with_body(r#"{"meta": {"code": 200}, "data": []}"#)
        .create_async()
        .await;

    let reverse = Reverse::new("ceye", "abc123.x1y2.ceye.io");
    assert!(!checker(&config_for(&server)).check(&reverse, 0).await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_dnslog_cn_label_lookup() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/getrecords.php")
        .match_header("cookie", "PHPSESSID=sess1")
        .with_body(r#"[["abc123.qwe.dnslog.cn","1.2.3.4","2026-01-01 00:00:00"]]"#)
        .expect(2)
        .create_async()
        .await;

    let checker = checker(&config_for(&server));
    assert!(checker.check(&Reverse::new("dnslog-cn", "abc123.qwe.dnslog.cn"), 0).await);
    assert!(!checker.check(&Reverse::new("dnslog-cn", "zzz999.qwe.dnslog.cn"), 0).await);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unsupported_provider_makes_no_call_and_skips_wait() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let reverse = Reverse::new("interactsh", "abc123.oast.fun");
    let start = Instant::now();
    assert!(!checker(&config_for(&server)).check(&reverse, 30).await);
    assert!(start.elapsed() < Duration::from_secs(5));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_server_error_body_fails_closed() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/getrecords.php")
        .with_status(500)
        .with_body("internal error")
        .create_async()
        .await;

    let reverse = Reverse::new("dnslog-cn", "abc123.qwe.dnslog.cn");
    assert!(!checker(&config_for(&server)).check(&reverse, 0).await);
}

#[tokio::test]
async fn test_unreachable_service_fails_closed() {
    let config = Config {
        ceye_token: Some("t0ken".to_string()),
        ceye_api_url: "http://127.0.0.1:9".to_string(),
        ..Config::default()
    };
    let reverse = Reverse::new("ceye", "abc123.x1y2.ceye.io");
    assert!(!checker(&config).check(&reverse, 0).await);
}

#[tokio::test]
async fn test_missing_ceye_token_fails_closed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let config = Config {
        ceye_token: None,
        ..config_for(&server)
    };
    let reverse = Reverse::new("ceye", "abc123.x1y2.ceye.io");
    assert!(!checker(&config).check(&reverse, 0).await);
    mock.assert_async().await;
}
