//! Devices, download licenses and their coupling to subscription state.

mod common;

use axum::http::{Method, StatusCode};
use serde_json::Value;

use common::{subscription_event, TestApp, Viewer};

async fn device(app: &TestApp, token: &str, identifier: &str) -> Value {
    let (status, body) = app.register_device(token, identifier).await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["id"].clone()
}

async fn deliver(app: &TestApp, viewer: &Viewer, id: &str, event_type: &str, status: &str, created: i64) {
    let payload = subscription_event(
        id,
        event_type,
        &viewer.subscription_id,
        &viewer.customer_id,
        status,
        created,
        &viewer.email,
    );
    let (http_status, body) = app.deliver_webhook(&payload).await;
    assert_eq!(http_status, StatusCode::OK, "{}", body);
}

// ════════════════════════════════════════════════════════════════════════════════
// Devices
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn fifth_device_exceeds_the_premium_limit() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;

    for n in 0..4 {
        device(&app, &viewer.access_token, &format!("phone-{}", n)).await;
    }
    let (status, body) = app.register_device(&viewer.access_token, "phone-4").await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DEVICE_LIMIT_EXCEEDED");
}

#[tokio::test]
async fn re_registering_a_known_device_refreshes_it() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "basic").await;
    let first = device(&app, &viewer.access_token, "tv-1").await;

    let (status, body) = app.register_device(&viewer.access_token, "tv-1").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], first);
}

#[tokio::test]
async fn deregistering_frees_a_device_slot() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "basic").await;
    let id = device(&app, &viewer.access_token, "tv-1").await;

    let (blocked, _) = app.register_device(&viewer.access_token, "tv-2").await;
    assert_eq!(blocked, StatusCode::CONFLICT);

    let uri = format!("/devices/{}", id.as_str().unwrap());
    let (status, _) = app
        .request(Method::DELETE, &uri, Some(&viewer.access_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    device(&app, &viewer.access_token, "tv-2").await;
    let (_, list) = app
        .request(Method::GET, "/devices", Some(&viewer.access_token), None)
        .await;
    assert_eq!(list["devices"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn deregistering_an_unknown_device_is_not_found() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "basic").await;
    let uri = format!("/devices/{}", uuid::Uuid::new_v4());

    let (status, body) = app
        .request(Method::DELETE, &uri, Some(&viewer.access_token), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "DEVICE_NOT_FOUND");
}

#[tokio::test]
async fn devices_of_other_users_are_invisible() {
    let app = TestApp::new();
    let ada = app.sign_up("ada@example.com", "premium").await;
    let bob = app.sign_up("bob@example.com", "premium").await;
    let id = device(&app, &ada.access_token, "phone").await;

    let uri = format!("/devices/{}", id.as_str().unwrap());
    let (status, _) = app
        .request(Method::DELETE, &uri, Some(&bob.access_token), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ════════════════════════════════════════════════════════════════════════════════
// Download licenses
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn plan_without_offline_cannot_issue_licenses() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "basic").await;

    let (status, body) = app.issue_license(&viewer.access_token, "ep-1").await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "OFFLINE_NOT_ALLOWED");
}

#[tokio::test]
async fn license_redeems_exactly_once() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let device_id = device(&app, &viewer.access_token, "phone").await;
    let (issued_status, issued) = app.issue_license(&viewer.access_token, "ep-1").await;
    assert_eq!(issued_status, StatusCode::CREATED);

    let (first, grant) = app
        .redeem(&viewer.access_token, &issued["token"], &device_id)
        .await;
    let (second, error) = app
        .redeem(&viewer.access_token, &issued["token"], &device_id)
        .await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(grant["licenseId"], issued["licenseId"]);
    assert!(!grant["mediaGrant"].as_str().unwrap().is_empty());
    assert_eq!(second, StatusCode::CONFLICT);
    assert_eq!(error["code"], "TOKEN_ALREADY_REDEEMED");
}

#[tokio::test]
async fn concurrent_redemptions_have_one_winner() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let device_id = device(&app, &viewer.access_token, "phone").await;
    let (_, issued) = app.issue_license(&viewer.access_token, "ep-1").await;

    let attempts = (0..8).map(|_| app.redeem(&viewer.access_token, &issued["token"], &device_id));
    let results = futures::future::join_all(attempts).await;

    let winners = results
        .iter()
        .filter(|(status, _)| *status == StatusCode::OK)
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn unredeemed_license_expires() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let device_id = device(&app, &viewer.access_token, "phone").await;
    let (_, issued) = app.issue_license(&viewer.access_token, "ep-1").await;

    app.clock.advance_secs(601);
    let (status, body) = app
        .redeem(&viewer.access_token, &issued["token"], &device_id)
        .await;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "TOKEN_EXPIRED");
}

#[tokio::test]
async fn redeemed_licenses_count_against_the_offline_quota() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let device_id = device(&app, &viewer.access_token, "phone").await;

    for episode in ["ep-1", "ep-2"] {
        let (_, issued) = app.issue_license(&viewer.access_token, episode).await;
        let (status, _) = app
            .redeem(&viewer.access_token, &issued["token"], &device_id)
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = app.issue_license(&viewer.access_token, "ep-3").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DOWNLOAD_QUOTA_EXCEEDED");

    // Slots free up once the offline window closes
    app.clock.advance_secs(48 * 3600 + 1);
    let token = app.refresh_token(&viewer);
    let (status, _) = app.issue_license(&token, "ep-3").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn redeeming_on_an_unregistered_device_is_rejected() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let (_, issued) = app.issue_license(&viewer.access_token, "ep-1").await;
    let stranger = Value::String(uuid::Uuid::new_v4().to_string());

    let (status, body) = app.redeem(&viewer.access_token, &issued["token"], &stranger).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "DEVICE_NOT_REGISTERED");
}

// ════════════════════════════════════════════════════════════════════════════════
// Subscription state coupling
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn cancellation_revokes_outstanding_licenses() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let device_id = device(&app, &viewer.access_token, "phone").await;
    let (_, pending) = app.issue_license(&viewer.access_token, "ep-1").await;

    let later = app.now().as_unix_secs() + 5;
    deliver(&app, &viewer, "evt_cancel", "customer.subscription.deleted", "canceled", later).await;

    let (status, body) = app
        .redeem(&viewer.access_token, &pending["token"], &device_id)
        .await;
    assert!(
        status == StatusCode::GONE || status == StatusCode::FORBIDDEN,
        "unexpected {} {}",
        status,
        body
    );

    let (_, me) = app
        .request(Method::GET, "/subscriptions/me", Some(&viewer.access_token), None)
        .await;
    assert_eq!(me["isSubscribed"], false);

    let (register, _) = app.register_device(&viewer.access_token, "tablet").await;
    assert_eq!(register, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn past_due_keeps_playback_but_blocks_new_downloads() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    device(&app, &viewer.access_token, "phone").await;

    let later = app.now().as_unix_secs() + 5;
    deliver(&app, &viewer, "evt_failed", "customer.subscription.updated", "past_due", later).await;

    let (_, me) = app
        .request(Method::GET, "/subscriptions/me", Some(&viewer.access_token), None)
        .await;
    assert_eq!(me["isSubscribed"], true);
    assert_eq!(me["status"], "past_due");

    let (known, _) = app.register_device(&viewer.access_token, "phone").await;
    assert_eq!(known, StatusCode::OK);
    let (issue, body) = app.issue_license(&viewer.access_token, "ep-1").await;
    assert_eq!(issue, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "NOT_SUBSCRIBED");
}

#[tokio::test]
async fn stale_event_does_not_overwrite_newer_state() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let base = app.now().as_unix_secs();

    deliver(&app, &viewer, "evt_newer", "customer.subscription.updated", "past_due", base + 100).await;
    deliver(&app, &viewer, "evt_older", "customer.subscription.updated", "active", base + 50).await;

    let (_, me) = app
        .request(Method::GET, "/subscriptions/me", Some(&viewer.access_token), None)
        .await;
    assert_eq!(me["status"], "past_due");
}

#[tokio::test]
async fn duplicate_webhook_delivery_is_acknowledged_once() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;
    let payload = subscription_event(
        "evt_dup",
        "customer.subscription.updated",
        &viewer.subscription_id,
        &viewer.customer_id,
        "past_due",
        app.now().as_unix_secs() + 5,
        &viewer.email,
    );

    let (_, first) = app.deliver_webhook(&payload).await;
    let (status, second) = app.deliver_webhook(&payload).await;

    assert_eq!(first["duplicate"], false);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["duplicate"], true);
    assert_eq!(app.inbox.len().await, 1);
}

#[tokio::test]
async fn unsigned_webhook_is_rejected_and_not_recorded() {
    let app = TestApp::new();
    let request = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/webhooks/payment-provider")
        .body(axum::body::Body::from("{}"))
        .unwrap();

    let (status, _) = app.send(request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.inbox.is_empty().await);
}

// ════════════════════════════════════════════════════════════════════════════════
// Catalog and operator endpoints
// ════════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn plans_are_listed_publicly() {
    let app = TestApp::new();
    let (status, body) = app.request(Method::GET, "/plans", None, None).await;

    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["plans"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["basic", "premium"]);
}

#[tokio::test]
async fn ledger_is_admin_only() {
    let app = TestApp::new();
    let viewer = app.sign_up("ada@example.com", "premium").await;

    let (subscriber, _) = app
        .request(Method::GET, "/admin/ledger", Some(&viewer.access_token), None)
        .await;
    assert_eq!(subscriber, StatusCode::FORBIDDEN);

    let admin = app.admin_token();
    let (status, ledger) = app
        .request(Method::GET, "/admin/ledger?churnWindowDays=7", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["activeCount"], 1);
    assert_eq!(ledger["churnWindowDays"], 7);
}

#[tokio::test]
async fn operator_can_reprocess_and_purge() {
    let app = TestApp::new();
    let admin = app.admin_token();

    let (reprocess, summary) = app
        .request(Method::POST, "/admin/webhooks/reprocess?limit=10", Some(&admin), None)
        .await;
    let (purge, purged) = app
        .request(Method::POST, "/admin/saga-intents/purge", Some(&admin), None)
        .await;

    assert_eq!(reprocess, StatusCode::OK);
    assert_eq!(summary["examined"], 0);
    assert_eq!(purge, StatusCode::OK);
    assert_eq!(purged["purged"], 0);
}
