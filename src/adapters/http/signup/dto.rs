//! HTTP DTOs for signup endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::signup::{
    CreateCheckoutSessionResult, FinalizeSignupResult, StartSignupIntentResult,
};

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupIntentRequest {
    pub email: String,
    pub name: String,
    pub plan_id: String,
    pub payment_method_id: String,
    /// Takes precedence over the `Idempotency-Key` header.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeSignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    pub plan_id: String,
    pub subscription_id: String,
    pub customer_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionRequest {
    pub plan_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupIntentResponse {
    pub subscription_id: String,
    pub customer_id: String,
    /// Client secret the frontend confirms the payment with.
    pub confirmation_token: String,
}

impl From<StartSignupIntentResult> for SignupIntentResponse {
    fn from(result: StartSignupIntentResult) -> Self {
        Self {
            subscription_id: result.subscription_id,
            customer_id: result.customer_id,
            confirmation_token: result.confirmation_token,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeSignupResponse {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

impl From<FinalizeSignupResult> for FinalizeSignupResponse {
    fn from(result: FinalizeSignupResult) -> Self {
        Self {
            user_id: result.user_id.to_string(),
            access_token: result.tokens.access_token,
            refresh_token: result.tokens.refresh_token,
            expires_in: result.tokens.expires_in,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSessionResponse {
    pub checkout_url: String,
    pub session_id: String,
    /// Unix seconds.
    pub expires_at: i64,
}

impl From<CreateCheckoutSessionResult> for CheckoutSessionResponse {
    fn from(result: CreateCheckoutSessionResult) -> Self {
        Self {
            checkout_url: result.checkout_url,
            session_id: result.session_id,
            expires_at: result.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_request_reads_camel_case() {
        let json = r#"{
            "email": "viewer@example.com",
            "name": "Viewer",
            "planId": "premium",
            "paymentMethodId": "pm_card_visa"
        }"#;
        let req: SignupIntentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.plan_id, "premium");
        assert_eq!(req.payment_method_id, "pm_card_visa");
        assert!(req.idempotency_key.is_none());
    }

    #[test]
    fn checkout_response_writes_camel_case() {
        let response = CheckoutSessionResponse {
            checkout_url: "https://pay.example.com/cs_1".into(),
            session_id: "cs_1".into(),
            expires_at: 1_700_000_000,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["checkoutUrl"], "https://pay.example.com/cs_1");
        assert_eq!(json["sessionId"], "cs_1");
        assert_eq!(json["expiresAt"], 1_700_000_000);
    }
}
