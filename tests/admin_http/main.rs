//! HTTP admin surface integration tests.
//!
//! Starts an axum server and exercises it with reqwest.

#![cfg(feature = "http")]

use std::sync::Arc;

use chrono::{Datelike, TimeZone, Utc};
use serde_json::{json, Value};
use receipt_numbering::admin::{self, CONFIRM_RESET_HEADER};
use receipt_numbering::{
    Counters, InMemoryDocumentStore, Numbering, NumberingConfig, Record, Records, ScopeKey,
};

type TestNumbering = Numbering<InMemoryDocumentStore>;

fn test_numbering() -> Arc<TestNumbering> {
    Arc::new(Numbering::new(InMemoryDocumentStore::new(), NumberingConfig::default()))
}

/// Bind to port 0 and return the actual address.
async fn start_server(numbering: Arc<TestNumbering>) -> String {
    let app = admin::router(numbering);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn seed_2025(numbering: &TestNumbering, owner: &str, numbers: &[&str]) {
    let config = numbering.config().clone();
    let records = Records::new(numbering.store(), &config.retry);
    for (i, number) in numbers.iter().enumerate() {
        let created = Utc.with_ymd_and_hms(2025, 1, 1 + i as u32, 9, 0, 0).unwrap();
        records
            .insert(&Record::new(format!("{owner}-{i}"), owner, created).with_receipt_number(*number))
            .unwrap();
    }
}

#[tokio::test]
async fn health_check() {
    let base = start_server(test_numbering()).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({ "ok": true, "prefix": "REC" }));
}

#[tokio::test]
async fn allocate_returns_consecutive_numbers() {
    let base = start_server(test_numbering()).await;
    let client = reqwest::Client::new();
    let year = Utc::now().year();

    for expected in 1..=2 {
        let resp = client
            .post(format!("{base}/owners/shop-1/allocate"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["receipt_number"], format!("REC {:03}-{}", expected, year));
        assert_eq!(body["mode"], "primary");
    }
}

#[tokio::test]
async fn diagnosis_reports_duplicates() {
    let numbering = test_numbering();
    seed_2025(&numbering, "shop-1", &["REC 001-2025", "REC 002-2025", "REC 002-2025", "REC 004-2025"]);
    let base = start_server(numbering).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base}/owners/shop-1/diagnosis?year=2025"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["total_records"], 4);
    assert_eq!(body["is_dense"], false);
    assert_eq!(body["duplicates"][0]["number"], "REC 002-2025");
    assert_eq!(body["missing"], json!([3]));
}

#[tokio::test]
async fn repair_returns_a_structured_result() {
    let numbering = test_numbering();
    seed_2025(&numbering, "shop-1", &["REC 002-2025", "REC 002-2025"]);
    let base = start_server(numbering.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/owners/shop-1/repair"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["fixed"], 2);
    assert_eq!(body["errors"], json!([]));

    let report = numbering.diagnose_scope(&ScopeKey::new("shop-1", 2025)).unwrap();
    assert!(report.is_consistent());
}

#[tokio::test]
async fn reset_requires_confirmation() {
    let numbering = test_numbering();
    let scope = ScopeKey::new("shop-1", 2025);
    let retry = numbering.config().retry.clone();
    Counters::new(numbering.store(), &retry).set(&scope, 50).unwrap();
    let base = start_server(numbering.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/owners/shop-1/reset?year=2025"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 412);
    assert_eq!(
        Counters::new(numbering.store(), &retry).get(&scope).unwrap().unwrap().last_number,
        50
    );

    let resp = client
        .post(format!("{base}/owners/shop-1/reset?year=2025"))
        .header(CONFIRM_RESET_HEADER, "someone-else")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 412);
}

#[tokio::test]
async fn confirmed_reset_zeroes_the_counter() {
    let numbering = test_numbering();
    let scope = ScopeKey::new("shop-1", 2025);
    let retry = numbering.config().retry.clone();
    Counters::new(numbering.store(), &retry).set(&scope, 50).unwrap();
    let base = start_server(numbering.clone()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/owners/shop-1/reset?year=2025"))
        .header(CONFIRM_RESET_HEADER, "shop-1")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(numbering.allocate_in(&scope).unwrap().number.seq(), 1);
}
