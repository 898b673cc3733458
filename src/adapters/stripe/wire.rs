//! Stripe REST payloads as they arrive over the wire.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::domain::subscription::ProviderStatus;
use crate::ports::ProviderSubscription;

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: ProviderStatus,
    pub created: i64,
    pub current_period_end: i64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Present when requested with `expand[]=latest_invoice.payment_intent`.
    #[serde(default)]
    pub latest_invoice: Option<ExpandableInvoice>,
}

/// `latest_invoice` is an id unless expanded.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpandableInvoice {
    Id(String),
    Expanded(StripeInvoice),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeInvoice {
    #[serde(default)]
    pub payment_intent: Option<ExpandablePaymentIntent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExpandablePaymentIntent {
    Id(String),
    Expanded(StripePaymentIntent),
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripePaymentIntent {
    #[serde(default)]
    pub client_secret: Option<String>,
}

impl StripeSubscription {
    fn client_secret(&self) -> Option<String> {
        match &self.latest_invoice {
            Some(ExpandableInvoice::Expanded(StripeInvoice {
                payment_intent: Some(ExpandablePaymentIntent::Expanded(intent)),
            })) => intent.client_secret.clone(),
            _ => None,
        }
    }
}

impl From<StripeSubscription> for ProviderSubscription {
    fn from(sub: StripeSubscription) -> Self {
        let client_secret = sub.client_secret();
        ProviderSubscription {
            id: sub.id,
            customer_id: sub.customer,
            status: sub.status,
            created: sub.created,
            current_period_end: sub.current_period_end,
            client_secret,
            metadata: sub.metadata,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeCheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    pub expires_at: i64,
}

/// Error envelope of a non-2xx response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorBody {
    pub error: StripeErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
