//! Payment-provider webhook event envelope.
//!
//! Only the fields the reconciler needs are captured. Provider objects are
//! kept as raw JSON on the envelope and decoded per event kind.

use serde::{Deserialize, Serialize};

use super::reconciliation::{ProviderSignal, SubscriptionChange};
use super::{ProviderStatus, WebhookError};
use crate::domain::foundation::Timestamp;

/// Webhook event as delivered by the provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEvent {
    /// Unique identifier for the event (`evt_...`).
    pub id: String,

    /// Event type, e.g. `customer.subscription.updated`.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix time the provider created the event.
    pub created: i64,

    /// The object that triggered the event.
    pub data: ProviderEventData,

    /// Whether this is a live mode event.
    #[serde(default)]
    pub livemode: bool,
}

/// Container for the event object.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderEventData {
    pub object: serde_json::Value,
}

/// Event kinds the reconciler acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderEventKind {
    SubscriptionCreated,
    SubscriptionUpdated,
    SubscriptionDeleted,
    InvoicePaymentFailed,
    InvoicePaid,
    Unknown,
}

impl ProviderEventKind {
    /// Parses an event type, with or without the `customer.` prefix.
    pub fn parse(s: &str) -> Self {
        match s.strip_prefix("customer.").unwrap_or(s) {
            "subscription.created" => Self::SubscriptionCreated,
            "subscription.updated" => Self::SubscriptionUpdated,
            "subscription.deleted" | "subscription.cancelled" | "subscription.canceled" => {
                Self::SubscriptionDeleted
            }
            "invoice.payment_failed" => Self::InvoicePaymentFailed,
            "invoice.paid" | "invoice.payment_succeeded" => Self::InvoicePaid,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionCreated => "subscription.created",
            Self::SubscriptionUpdated => "subscription.updated",
            Self::SubscriptionDeleted => "subscription.deleted",
            Self::InvoicePaymentFailed => "invoice.payment_failed",
            Self::InvoicePaid => "invoice.paid",
            Self::Unknown => "unknown",
        }
    }
}

/// Metadata the signup saga attaches to provider objects.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub plan_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SubscriptionObject {
    id: String,
    customer: Option<String>,
    status: ProviderStatus,
    current_period_end: Option<i64>,
    #[serde(default)]
    metadata: EventMetadata,
}

#[derive(Debug, Deserialize)]
struct InvoiceObject {
    subscription: Option<String>,
    customer: Option<String>,
    period_end: Option<i64>,
    #[serde(default)]
    subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Deserialize)]
struct InvoiceSubscriptionDetails {
    #[serde(default)]
    metadata: EventMetadata,
}

impl ProviderEvent {
    /// Parse the event type into a known kind.
    pub fn kind(&self) -> ProviderEventKind {
        ProviderEventKind::parse(&self.event_type)
    }

    /// When the provider created the event.
    pub fn occurred_at(&self) -> Result<Timestamp, WebhookError> {
        Timestamp::from_unix_secs(self.created)
            .ok_or_else(|| WebhookError::ParseError("event timestamp out of range".to_string()))
    }

    /// Best-effort subscription id for logging and the inbox record.
    pub fn subscription_ref(&self) -> Option<String> {
        let field = match self.kind() {
            ProviderEventKind::InvoicePaid | ProviderEventKind::InvoicePaymentFailed => {
                "subscription"
            }
            _ => "id",
        };
        self.data
            .object
            .get(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }

    /// Decodes the event into a subscription change.
    ///
    /// Returns `Ok(None)` for event kinds the reconciler does not handle.
    pub fn to_change(&self) -> Result<Option<SubscriptionChange>, WebhookError> {
        let occurred_at = self.occurred_at()?;

        let change = match self.kind() {
            ProviderEventKind::Unknown => return Ok(None),
            kind @ (ProviderEventKind::SubscriptionCreated
            | ProviderEventKind::SubscriptionUpdated
            | ProviderEventKind::SubscriptionDeleted) => {
                let object: SubscriptionObject = self.decode_object()?;
                let signal = if kind == ProviderEventKind::SubscriptionDeleted {
                    ProviderSignal::Deleted
                } else {
                    ProviderSignal::Snapshot {
                        status: object.status,
                        period_end: unix_opt(object.current_period_end)?,
                    }
                };
                SubscriptionChange {
                    external_subscription_id: object.id,
                    external_customer_id: object.customer,
                    occurred_at,
                    signal,
                    metadata: object.metadata,
                }
            }
            kind @ (ProviderEventKind::InvoicePaid | ProviderEventKind::InvoicePaymentFailed) => {
                let object: InvoiceObject = self.decode_object()?;
                let external_subscription_id = object
                    .subscription
                    .ok_or(WebhookError::MissingField("subscription"))?;
                let signal = if kind == ProviderEventKind::InvoicePaid {
                    ProviderSignal::PaymentSucceeded {
                        period_end: unix_opt(object.period_end)?,
                    }
                } else {
                    ProviderSignal::PaymentFailed
                };
                SubscriptionChange {
                    external_subscription_id,
                    external_customer_id: object.customer,
                    occurred_at,
                    signal,
                    metadata: object
                        .subscription_details
                        .map(|d| d.metadata)
                        .unwrap_or_default(),
                }
            }
        };

        if change.external_subscription_id.trim().is_empty() {
            return Err(WebhookError::MissingField("id"));
        }
        Ok(Some(change))
    }

    fn decode_object<T: serde::de::DeserializeOwned>(&self) -> Result<T, WebhookError> {
        serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::ParseError(e.to_string()))
    }
}

fn unix_opt(secs: Option<i64>) -> Result<Option<Timestamp>, WebhookError> {
    secs.map(|s| {
        Timestamp::from_unix_secs(s)
            .ok_or_else(|| WebhookError::ParseError("period end out of range".to_string()))
    })
    .transpose()
}

/// Builder for creating test ProviderEvent instances.
#[cfg(test)]
pub struct ProviderEventBuilder {
    id: String,
    event_type: String,
    created: i64,
    object: serde_json::Value,
}

#[cfg(test)]
impl ProviderEventBuilder {
    pub fn new() -> Self {
        Self {
            id: "evt_test_123".to_string(),
            event_type: "customer.subscription.updated".to_string(),
            created: chrono::Utc::now().timestamp(),
            object: serde_json::json!({}),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = event_type.into();
        self
    }

    pub fn created(mut self, created: i64) -> Self {
        self.created = created;
        self
    }

    pub fn object(mut self, object: serde_json::Value) -> Self {
        self.object = object;
        self
    }

    pub fn build(self) -> ProviderEvent {
        ProviderEvent {
            id: self.id,
            event_type: self.event_type,
            created: self.created,
            data: ProviderEventData {
                object: self.object,
            },
            livemode: false,
        }
    }
}
