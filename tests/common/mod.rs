//! Test application wired with in-memory adapters.
//!
//! Requests go through the real router, middleware and handlers; only the
//! payment provider, clock and notifier are test doubles.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::{json, Value};
use tower::ServiceExt;

use reelpass::adapters::http::{app_router, AppDependencies, AppState, Repositories};
use reelpass::adapters::{
    InMemoryEntitlementStore, InMemoryWebhookInbox, JwtTokenService, ManualClock,
    MockPaymentProvider, RecordingNotifier, StaticPlanCatalog,
};
use reelpass::application::RetryPolicy;
use reelpass::config::{AuthConfig, EntitlementConfig, PaymentConfig, ReconcilerConfig, ServerConfig};
use reelpass::domain::foundation::{AuthenticatedUser, DomainError, Role, Timestamp, UserId};
use reelpass::domain::subscription::{sign_payload, WebhookVerifier};
use reelpass::ports::{Clock, PasswordHasher, TokenService};

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const PASSWORD: &str = "correct-horse-battery";

const PLANS: &str = r#"
plans:
  - id: basic
    name: Basic
    billing_period: monthly
    provider_price_id: price_basic
    terms:
      - revision: 1
        price_minor: 799
        currency: USD
        device_limit: 1
        offline_allowed: false
        max_offline_downloads: 0
  - id: premium
    name: Premium
    billing_period: monthly
    provider_price_id: price_premium
    terms:
      - revision: 1
        price_minor: 1599
        currency: USD
        device_limit: 4
        offline_allowed: true
        max_offline_downloads: 2
"#;

/// Reversible hasher so tests do not pay for Argon2.
pub struct PlainHasher;

impl PasswordHasher for PlainHasher {
    fn hash(&self, password: &str) -> Result<String, DomainError> {
        Ok(format!("plain:{}", password))
    }

    fn verify(&self, password: &str, hash: &str) -> Result<bool, DomainError> {
        Ok(hash == format!("plain:{}", password))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryEntitlementStore>,
    pub inbox: Arc<InMemoryWebhookInbox>,
    pub provider: Arc<MockPaymentProvider>,
    pub clock: Arc<ManualClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub tokens: Arc<JwtTokenService>,
}

/// A signed-up viewer.
pub struct Viewer {
    pub user_id: String,
    pub email: String,
    pub subscription_id: String,
    pub customer_id: String,
    pub access_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(Timestamp::now()));
        let store = Arc::new(InMemoryEntitlementStore::new());
        let inbox = Arc::new(InMemoryWebhookInbox::new());
        let provider = Arc::new(MockPaymentProvider::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let tokens = Arc::new(JwtTokenService::new(
            &AuthConfig::new("integration-signing-secret-0123456789"),
            clock.clone(),
        ));

        let mut payment = PaymentConfig::new("sk_test_integration", WEBHOOK_SECRET);
        payment.initial_backoff_ms = 1;

        let state = AppState::new(AppDependencies {
            repositories: Repositories::from_store(store.clone()),
            inbox: inbox.clone(),
            catalog: Arc::new(StaticPlanCatalog::from_yaml_str(PLANS).unwrap()),
            payment_provider: provider.clone(),
            password_hasher: Arc::new(PlainHasher),
            token_service: tokens.clone(),
            notifier: notifier.clone(),
            clock: clock.clone(),
            webhook_verifier: WebhookVerifier::new(SecretString::new(WEBHOOK_SECRET.to_string())),
            retry: RetryPolicy::from_config(&payment),
            entitlement: EntitlementConfig::default(),
            reconciler: ReconcilerConfig::default(),
        });

        Self {
            router: app_router(state, &ServerConfig::default()),
            store,
            inbox,
            provider,
            clock,
            notifier,
            tokens,
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    /// Delivers `payload` signed with the shared secret at the current time.
    pub async fn deliver_webhook(&self, payload: &str) -> (StatusCode, Value) {
        let signature = sign_payload(WEBHOOK_SECRET, self.now().as_unix_secs(), payload);
        let request = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/payment-provider")
            .header("Payment-Signature", signature)
            .header("Content-Type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn start_intent(&self, email: &str, plan_id: &str) -> Value {
        let (status, body) = self
            .request(
                Method::POST,
                "/auth/signup-subscription/intent",
                None,
                Some(json!({
                    "email": email,
                    "name": "Integration Viewer",
                    "planId": plan_id,
                    "paymentMethodId": "pm_card_visa",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "intent failed: {}", body);
        body
    }

    pub async fn finalize(&self, email: &str, plan_id: &str, intent: &Value) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/auth/signup-subscription/finalize",
            None,
            Some(json!({
                "email": email,
                "password": PASSWORD,
                "name": "Integration Viewer",
                "planId": plan_id,
                "subscriptionId": intent["subscriptionId"],
                "customerId": intent["customerId"],
            })),
        )
        .await
    }

    /// Runs both signup phases with a confirmed payment.
    pub async fn sign_up(&self, email: &str, plan_id: &str) -> Viewer {
        let intent = self.start_intent(email, plan_id).await;
        let subscription_id = intent["subscriptionId"].as_str().unwrap().to_string();
        self.provider.confirm_payment(&subscription_id);

        let (status, body) = self.finalize(email, plan_id, &intent).await;
        assert_eq!(status, StatusCode::OK, "finalize failed: {}", body);

        Viewer {
            user_id: body["userId"].as_str().unwrap().to_string(),
            email: email.to_string(),
            subscription_id,
            customer_id: intent["customerId"].as_str().unwrap().to_string(),
            access_token: body["accessToken"].as_str().unwrap().to_string(),
        }
    }

    /// Fresh access token for `viewer` at the current clock.
    pub fn refresh_token(&self, viewer: &Viewer) -> String {
        let user_id: UserId = viewer.user_id.parse().unwrap();
        let identity = AuthenticatedUser::new(user_id, viewer.email.as_str(), Role::Subscriber);
        self.tokens
            .issue_session(&identity, self.now())
            .unwrap()
            .access_token
    }

    pub fn admin_token(&self) -> String {
        let identity = AuthenticatedUser::new(UserId::new(), "ops@example.com", Role::Admin);
        self.tokens
            .issue_session(&identity, self.now())
            .unwrap()
            .access_token
    }

    pub async fn register_device(&self, token: &str, identifier: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/devices",
            Some(token),
            Some(json!({"platform": "ios", "deviceIdentifier": identifier})),
        )
        .await
    }

    pub async fn issue_license(&self, token: &str, episode: &str) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/downloads/licenses",
            Some(token),
            Some(json!({"episodeId": episode})),
        )
        .await
    }

    pub async fn redeem(&self, token: &str, license_token: &Value, device_id: &Value) -> (StatusCode, Value) {
        self.request(
            Method::POST,
            "/downloads/redeem",
            Some(token),
            Some(json!({"token": license_token, "deviceId": device_id})),
        )
        .await
    }
}

/// A provider subscription event as the provider would send it.
pub fn subscription_event(
    event_id: &str,
    event_type: &str,
    viewer_subscription: &str,
    customer: &str,
    status: &str,
    created: i64,
    email: &str,
) -> String {
    json!({
        "id": event_id,
        "type": event_type,
        "created": created,
        "data": {"object": {
            "id": viewer_subscription,
            "customer": customer,
            "status": status,
            "current_period_end": created + 30 * 24 * 3600,
            "metadata": {"email": email, "plan_id": "premium"}
        }}
    })
    .to_string()
}

/// An `invoice.payment_failed` event for a signup subscription.
pub fn payment_failed_event(
    event_id: &str,
    viewer_subscription: &str,
    customer: &str,
    created: i64,
    email: &str,
) -> String {
    json!({
        "id": event_id,
        "type": "invoice.payment_failed",
        "created": created,
        "data": {"object": {
            "subscription": viewer_subscription,
            "customer": customer,
            "subscription_details": {"metadata": {"email": email, "plan_id": "premium"}}
        }}
    })
    .to_string()
}
