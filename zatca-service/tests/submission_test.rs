mod common;

use common::{valid_invoice, TestApp, TestOptions};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

async fn mount_stage(app: &TestApp, stage: &str, response: ResponseTemplate, expected: u64) {
    Mock::given(method("POST"))
        .and(path(format!("/{}", stage)))
        .respond_with(response)
        .expect(expected)
        .mount(&app.zatca)
        .await;
}

#[tokio::test]
async fn cleared_invoice_returns_uuid_and_qr_code() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/compliance"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("content-type", "application/xml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "approved" })))
        .expect(1)
        .mount(&app.zatca)
        .await;
    mount_stage(&app, "reporting", ResponseTemplate::new(200), 1).await;
    mount_stage(
        &app,
        "clearance",
        ResponseTemplate::new(200).set_body_json(json!({
            "uuid": "zatca-uuid-1",
            "qrCode": "QR-FROM-ZATCA"
        })),
        1,
    )
    .await;

    let response = app
        .submit(&json!({ "invoice": valid_invoice(), "request_id": "req-42" }))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
    assert_eq!(body["uuid"], "zatca-uuid-1");
    assert_eq!(body["qr_code"], "QR-FROM-ZATCA");
    assert_eq!(body["compliance_status"], "approved");
    assert_eq!(body["reporting_status"], "submitted");
    assert_eq!(body["clearance_status"], "cleared");
    assert!(body.get("simulated").is_none());
}

#[tokio::test]
async fn compliance_rejection_stops_the_pipeline() {
    let app = TestApp::spawn().await;

    mount_stage(
        &app,
        "compliance",
        ResponseTemplate::new(400).set_body_string("schema error"),
        1,
    )
    .await;
    mount_stage(&app, "reporting", ResponseTemplate::new(200), 0).await;
    mount_stage(&app, "clearance", ResponseTemplate::new(200), 0).await;

    let response = app.submit(&json!({ "invoice": valid_invoice() })).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Compliance check failed: schema error");
    assert_eq!(body["compliance_status"], "rejected");
    assert!(body.get("reporting_status").is_none());
}

#[tokio::test]
async fn clearance_rejection_reports_earlier_stages() {
    let app = TestApp::spawn().await;

    mount_stage(&app, "compliance", ResponseTemplate::new(200), 1).await;
    mount_stage(&app, "reporting", ResponseTemplate::new(200), 1).await;
    mount_stage(
        &app,
        "clearance",
        ResponseTemplate::new(422).set_body_string("duplicate invoice"),
        1,
    )
    .await;

    let response = app.submit(&json!({ "invoice": valid_invoice() })).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Clearance failed: duplicate invoice");
    assert_eq!(body["reporting_status"], "submitted");
    assert_eq!(body["clearance_status"], "rejected");
}

#[tokio::test]
async fn invalid_invoice_is_rejected_before_any_zatca_call() {
    let app = TestApp::spawn().await;
    mount_stage(&app, "compliance", ResponseTemplate::new(200), 0).await;

    let mut invoice = valid_invoice();
    invoice["customer"] = json!("");
    invoice["items"] = json!([]);

    let response = app.submit(&json!({ "invoice": invoice })).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(
        body["error"],
        "Invoice validation failed: Customer name is required, Invoice must have at least one item"
    );
}

#[tokio::test]
async fn out_of_range_amount_is_rejected_without_crashing() {
    let app = TestApp::spawn().await;
    mount_stage(&app, "compliance", ResponseTemplate::new(200), 0).await;

    let mut invoice = valid_invoice();
    invoice["items"] = json!([
        { "name": "Widget", "quantity": "79228162514264337593543950335", "price": 2 }
    ]);

    let response = app.submit(&json!({ "invoice": invoice })).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(
        body["error"],
        "Invoice validation failed: Line item 1 amount is out of range"
    );

    // The server keeps serving after the rejected request.
    let health = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");
    assert!(health.status().is_success());
}

#[tokio::test]
async fn mixed_field_spellings_and_unknown_type_are_accepted() {
    let app = TestApp::spawn_with(TestOptions {
        testing_mode: true,
        ..TestOptions::default()
    })
    .await;

    let mut invoice = valid_invoice();
    invoice["type"] = json!("invoice");
    invoice["invoice_number"] = json!(9999);
    invoice["customer_name"] = json!("Ignored Name");

    let response = app.submit(&json!({ "invoice": invoice })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn missing_invoice_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app.submit(&json!({ "request_id": "req-1" })).await;

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["error"], "Invoice data is required");
    assert_eq!(body["request_id"], "req-1");
}

#[tokio::test]
async fn malformed_body_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .post(format!("{}/invoices/submit", app.address))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request body"));
}

#[tokio::test]
async fn testing_mode_simulates_clearance_without_calling_zatca() {
    let app = TestApp::spawn_with(TestOptions {
        testing_mode: true,
        ..TestOptions::default()
    })
    .await;

    let response = app.submit(&json!({ "invoice": valid_invoice() })).await;

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["success"], true);
    assert_eq!(body["simulated"], true);
    assert!(!body["uuid"].as_str().unwrap().is_empty());
    assert!(!body["qr_code"].as_str().unwrap().is_empty());

    let received = app.zatca.received_requests().await.unwrap_or_default();
    assert!(received.is_empty());
}

#[tokio::test]
async fn preflight_returns_cors_headers() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/invoices/submit", app.address),
        )
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
    assert_eq!(
        response.headers()["access-control-allow-headers"],
        "authorization, x-client-info, apikey, content-type"
    );
    assert_eq!(response.text().await.unwrap(), "ok");
}
