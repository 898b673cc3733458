//! Stripe payment provider adapter.
//!
//! Implements the `PaymentProvider` port against the Stripe REST API.
//! Every mutating call sends the caller's idempotency key in the
//! `Idempotency-Key` header so retries never create duplicate objects.
//! Webhook verification is not done here; see `WebhookVerifier`.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::config::PaymentConfig;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, CreateSubscriptionRequest,
    Customer, PaymentError, PaymentErrorCode, PaymentProvider, ProviderSubscription,
};

use super::wire::{StripeCheckoutSession, StripeCustomer, StripeErrorBody, StripeSubscription};

/// Stripe payment provider adapter.
pub struct StripePaymentAdapter {
    api_key: SecretString,
    api_base_url: String,
    http_client: reqwest::Client,
}

impl StripePaymentAdapter {
    /// Create an adapter whose HTTP client enforces the configured timeout.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PaymentError::network(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            api_key: config.api_key.clone(),
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base_url, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, PaymentError> {
        let mut request = self
            .http_client
            .post(self.url(path))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .form(params);
        if let Some(key) = idempotency_key {
            request = request.header("Idempotency-Key", key);
        }
        let response = request.send().await.map_err(transport_error)?;
        read_response(path, response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, PaymentError> {
        let response = self
            .http_client
            .get(self.url(path))
            .basic_auth(self.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_response(path, response).await.map(Some)
    }
}

fn transport_error(err: reqwest::Error) -> PaymentError {
    if err.is_timeout() {
        PaymentError::timeout(err.to_string())
    } else {
        PaymentError::network(err.to_string())
    }
}

async fn read_response<T: DeserializeOwned>(
    path: &str,
    response: reqwest::Response,
) -> Result<T, PaymentError> {
    let status = response.status();
    if status.is_success() {
        return response.json().await.map_err(|e| {
            PaymentError::provider(format!("Failed to parse Stripe response: {}", e))
        });
    }

    let body = response.text().await.unwrap_or_default();
    let error = error_from_status(status, &body);
    tracing::warn!(
        path,
        status = status.as_u16(),
        code = %error.code,
        "Stripe API call failed"
    );
    Err(error)
}

/// Maps a non-2xx Stripe response to a payment error.
fn error_from_status(status: StatusCode, body: &str) -> PaymentError {
    let detail = serde_json::from_str::<StripeErrorBody>(body).ok().map(|b| b.error);
    let message = detail
        .as_ref()
        .and_then(|d| d.message.clone())
        .unwrap_or_else(|| format!("Stripe returned {}", status));

    let code = match status {
        StatusCode::PAYMENT_REQUIRED => PaymentErrorCode::CardDeclined,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PaymentErrorCode::AuthenticationError,
        StatusCode::NOT_FOUND => PaymentErrorCode::NotFound,
        StatusCode::TOO_MANY_REQUESTS => PaymentErrorCode::RateLimitExceeded,
        StatusCode::BAD_REQUEST | StatusCode::CONFLICT => PaymentErrorCode::InvalidRequest,
        s if s.is_server_error() => PaymentErrorCode::ProviderError,
        _ => PaymentErrorCode::Unknown,
    };

    let error = PaymentError::new(code, message);
    match detail.and_then(|d| d.code.or(d.error_type)) {
        Some(provider_code) => error.with_provider_code(provider_code),
        None => error,
    }
}

fn push_metadata(params: &mut Vec<(String, String)>, prefix: &str, metadata: &BTreeMap<String, String>) {
    for (key, value) in metadata {
        params.push((format!("{}[{}]", prefix, key), value.clone()));
    }
}

#[async_trait]
impl PaymentProvider for StripePaymentAdapter {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let params = vec![
            ("email".to_string(), request.email.clone()),
            ("name".to_string(), request.name),
            ("payment_method".to_string(), request.payment_method_id.clone()),
            (
                "invoice_settings[default_payment_method]".to_string(),
                request.payment_method_id,
            ),
        ];
        let customer: StripeCustomer = self
            .post_form("customers", &params, Some(&request.idempotency_key))
            .await?;

        Ok(Customer {
            id: customer.id,
            email: customer.email.unwrap_or(request.email),
        })
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<ProviderSubscription, PaymentError> {
        let mut params = vec![
            ("customer".to_string(), request.customer_id),
            ("items[0][price]".to_string(), request.price_id),
            ("payment_behavior".to_string(), "default_incomplete".to_string()),
            (
                "expand[]".to_string(),
                "latest_invoice.payment_intent".to_string(),
            ),
        ];
        push_metadata(&mut params, "metadata", &request.metadata);

        let subscription: StripeSubscription = self
            .post_form("subscriptions", &params, Some(&request.idempotency_key))
            .await?;
        Ok(subscription.into())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let subscription: Option<StripeSubscription> = self
            .get(&format!("subscriptions/{}", subscription_id))
            .await?;
        Ok(subscription.map(Into::into))
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut params = vec![
            ("mode".to_string(), "subscription".to_string()),
            ("customer_email".to_string(), request.email),
            ("line_items[0][price]".to_string(), request.price_id),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            ("success_url".to_string(), request.success_url),
            ("cancel_url".to_string(), request.cancel_url),
        ];
        push_metadata(&mut params, "subscription_data[metadata]", &request.metadata);

        let session: StripeCheckoutSession =
            self.post_form("checkout/sessions", &params, None).await?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::provider("checkout session has no URL"))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
            expires_at: session.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declined_card_is_permanent() {
        let err = error_from_status(
            StatusCode::PAYMENT_REQUIRED,
            r#"{"error":{"type":"card_error","code":"card_declined","message":"Your card was declined."}}"#,
        );
        assert_eq!(err.code, PaymentErrorCode::CardDeclined);
        assert_eq!(err.provider_code.as_deref(), Some("card_declined"));
        assert_eq!(err.message, "Your card was declined.");
        assert!(!err.retryable);
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = error_from_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert_eq!(err.code, PaymentErrorCode::ProviderError);
        assert!(err.retryable);
        assert!(err.provider_code.is_none());
    }

    #[test]
    fn rate_limit_is_retryable() {
        assert!(error_from_status(StatusCode::TOO_MANY_REQUESTS, "").retryable);
    }

    #[test]
    fn metadata_is_flattened_into_form_keys() {
        let mut params = Vec::new();
        let metadata = BTreeMap::from([
            ("email".to_string(), "a@example.com".to_string()),
            ("plan_id".to_string(), "premium".to_string()),
        ]);
        push_metadata(&mut params, "subscription_data[metadata]", &metadata);
        assert_eq!(
            params,
            vec![
                (
                    "subscription_data[metadata][email]".to_string(),
                    "a@example.com".to_string()
                ),
                (
                    "subscription_data[metadata][plan_id]".to_string(),
                    "premium".to_string()
                ),
            ]
        );
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let mut config = PaymentConfig::new("sk_test_xxx", "whsec_xxx");
        config.api_base_url = "http://localhost:12111/v1/".to_string();
        let adapter = StripePaymentAdapter::new(&config).unwrap();
        assert_eq!(adapter.url("customers"), "http://localhost:12111/v1/customers");
    }
}
