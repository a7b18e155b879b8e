//! HTTP API tests against a real listener.

use std::io::Write;
use std::time::Duration;

use serde_json::Value;

use fx_gateway::config::GatewayConfig;

mod common;

const HEADER: &str = "Record Date,Country - Currency Description,Exchange Rate,Effective Date,ISO code";

#[tokio::test]
async fn test_health_and_greetings() {
    let gateway = common::start_gateway(GatewayConfig::default(), None).await;
    let client = common::client();

    let res = client.get(gateway.url("/health")).send().await.expect("gateway unreachable");
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["content-type"], "application/json");
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
    let text = res.text().await.unwrap();
    // two-space pretty printing
    assert!(text.starts_with("{\n  \"status\": \"OK\""), "{text}");

    let json: Value = client.get(gateway.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(json["message"], "Hello World!");

    let json: Value = client.get(gateway.url("/hello")).send().await.unwrap().json().await.unwrap();
    assert_eq!(json["endpoint"], "/hello");

    gateway.stop().await;
}

#[tokio::test]
async fn test_convert_with_embedded_rates() {
    let gateway = common::start_gateway(GatewayConfig::default(), None).await;
    let client = common::client();

    let res = client
        .get(gateway.url("/convert"))
        .query(&[("amount", "50"), ("from", "jpy"), ("to", "usd")])
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["amount"], 50);
    assert_eq!(json["from"], "JPY");
    assert_eq!(json["to"], "USD");
    let rate = json["rate"].as_f64().unwrap();
    assert!((rate - 1.0 / 156.61).abs() < 1e-12);
    assert!((json["converted"].as_f64().unwrap() - 50.0 * rate).abs() < 1e-9);

    let res = client.get(gateway.url("/convert?amount=1&from=EUR&to=GBP")).send().await.unwrap();
    assert_eq!(res.status(), 400);
    let json: Value = res.json().await.unwrap();
    assert_eq!(
        json["message"],
        "Only conversions involving USD are supported. USD must be either source or target currency."
    );

    let res = client.get(gateway.url("/convert?amount=1&from=USD&to=ABC")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["message"], "Invalid target currency code: ABC");

    gateway.stop().await;
}

#[tokio::test]
async fn test_methods_and_unknown_routes() {
    let gateway = common::start_gateway(GatewayConfig::default(), None).await;
    let client = common::client();

    let res = client
        .request(reqwest::Method::OPTIONS, gateway.url("/convert"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["access-control-allow-methods"], "GET, OPTIONS");
    assert_eq!(res.headers()["access-control-allow-headers"], "Content-Type");
    assert!(res.text().await.unwrap().is_empty());

    let res = client.delete(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 405);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["error"], "Method Not Allowed");

    let res = client.get(gateway.url("/rates/latest")).send().await.unwrap();
    assert_eq!(res.status(), 404);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["path"], "/rates/latest");

    gateway.stop().await;
}

#[tokio::test]
async fn test_unreadable_rate_file_yields_server_errors() {
    let mut config = GatewayConfig::default();
    config.rates.path = Some(
        std::env::temp_dir()
            .join(format!("fx-gateway-api-{}-missing.csv", std::process::id()))
            .display()
            .to_string(),
    );
    let gateway = common::start_gateway(config, None).await;
    let client = common::client();

    let res = client.get(gateway.url("/currencies")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["error"], "Internal server error");
    assert_eq!(json["message"], "Failed to load currency list");

    let res = client.get(gateway.url("/convert?amount=1&from=USD&to=EUR")).send().await.unwrap();
    assert_eq!(res.status(), 500);
    let json: Value = res.json().await.unwrap();
    assert_eq!(json["message"], "Failed to perform conversion");

    // parameter validation still runs first
    let res = client.get(gateway.url("/convert?amount=0&from=USD&to=EUR")).send().await.unwrap();
    assert_eq!(res.status(), 400);

    gateway.stop().await;
}

#[tokio::test]
async fn test_rate_file_hot_reload() {
    let path = std::env::temp_dir().join(format!("fx-gateway-api-{}-watched.csv", std::process::id()));
    let write = |rate: &str| {
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "2025-12-31,Euro Zone-Euro,{rate},2025-12-31,EUR").unwrap();
        file.sync_all().unwrap();
    };
    write("0.851");

    let mut config = GatewayConfig::default();
    config.rates.path = Some(path.display().to_string());
    config.rates.watch = true;
    let gateway = common::start_gateway(config, None).await;
    let client = common::client();

    // a reload can observe the file mid-write, which answers without a rate
    let rate_of = |json: Value| json["rate"].as_f64().unwrap_or(0.0);
    let url = gateway.url("/convert?amount=1&from=USD&to=EUR");
    let json: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
    assert_eq!(rate_of(json), 0.851);

    // give the watcher time to start before changing the file
    tokio::time::sleep(Duration::from_millis(300)).await;
    write("0.9");

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    let mut rate = 0.851;
    while tokio::time::Instant::now() < deadline {
        let json: Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        rate = rate_of(json);
        if rate == 0.9 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(rate, 0.9);

    gateway.stop().await;
    let _ = std::fs::remove_file(&path);
}
