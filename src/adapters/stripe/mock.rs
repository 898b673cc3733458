//! Mock payment provider for testing.
//!
//! Provides an in-process `PaymentProvider` for unit and integration tests.
//! Supports:
//! - Idempotent object creation keyed by the request's idempotency key
//! - Error injection per method
//! - Call tracking
//! - Simulating client-side payment confirmation

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::domain::subscription::ProviderStatus;
use crate::ports::{
    CheckoutSession, CreateCheckoutRequest, CreateCustomerRequest, CreateSubscriptionRequest,
    Customer, PaymentError, PaymentProvider, ProviderSubscription,
};

/// Mock payment provider for testing.
///
/// # Example
///
/// ```ignore
/// let provider = MockPaymentProvider::new();
/// provider.fail_next("create_subscription", PaymentError::network("reset"));
///
/// let sub = provider.create_subscription(request).await?;
/// provider.confirm_payment(&sub.id);
/// ```
#[derive(Clone, Default)]
pub struct MockPaymentProvider {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    customers: HashMap<String, Customer>,
    subscriptions: HashMap<String, ProviderSubscription>,

    /// Idempotency key to the object created under it.
    customer_keys: HashMap<String, String>,
    subscription_keys: HashMap<String, String>,

    /// Errors returned by the next calls of a method, in order.
    method_errors: HashMap<&'static str, VecDeque<PaymentError>>,

    call_log: Vec<MethodCall>,
    sequence: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{}_mock_{}", prefix, self.sequence)
    }

    fn record(&mut self, method: &'static str, args: Vec<String>) -> Result<(), PaymentError> {
        self.call_log.push(MethodCall { method, args });
        match self.method_errors.get_mut(method).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Recorded method call for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodCall {
    pub method: &'static str,
    pub args: Vec<String>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Queue an error for the next call of `method`.
    pub fn fail_next(&self, method: &'static str, error: PaymentError) {
        self.state()
            .method_errors
            .entry(method)
            .or_default()
            .push_back(error);
    }

    /// Queue the same error for the next `times` calls of `method`.
    pub fn fail_times(&self, method: &'static str, error: PaymentError, times: usize) {
        for _ in 0..times {
            self.fail_next(method, error.clone());
        }
    }

    /// Simulates the client confirming the first payment.
    pub fn confirm_payment(&self, subscription_id: &str) {
        self.set_subscription_status(subscription_id, ProviderStatus::Active);
    }

    pub fn set_subscription_status(&self, subscription_id: &str, status: ProviderStatus) {
        if let Some(sub) = self.state().subscriptions.get_mut(subscription_id) {
            sub.status = status;
        }
    }

    /// Insert a provider subscription directly, bypassing creation.
    pub fn insert_subscription(&self, subscription: ProviderSubscription) {
        self.state()
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertion Helpers
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Number of distinct customers created.
    pub fn customer_count(&self) -> usize {
        self.state().customers.len()
    }

    /// Number of distinct subscriptions known to the provider.
    pub fn subscription_count(&self) -> usize {
        self.state().subscriptions.len()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<Customer, PaymentError> {
        let mut state = self.state();
        state.record(
            "create_customer",
            vec![request.email.clone(), request.idempotency_key.clone()],
        )?;

        if let Some(existing) = state
            .customer_keys
            .get(&request.idempotency_key)
            .and_then(|id| state.customers.get(id))
        {
            return Ok(existing.clone());
        }

        let customer = Customer {
            id: state.next_id("cus"),
            email: request.email,
        };
        state
            .customer_keys
            .insert(request.idempotency_key, customer.id.clone());
        state.customers.insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn create_subscription(
        &self,
        request: CreateSubscriptionRequest,
    ) -> Result<ProviderSubscription, PaymentError> {
        let mut state = self.state();
        state.record(
            "create_subscription",
            vec![
                request.customer_id.clone(),
                request.price_id.clone(),
                request.idempotency_key.clone(),
            ],
        )?;

        if let Some(existing) = state
            .subscription_keys
            .get(&request.idempotency_key)
            .and_then(|id| state.subscriptions.get(id))
        {
            return Ok(existing.clone());
        }

        let id = state.next_id("sub");
        let created = Utc::now().timestamp();
        let subscription = ProviderSubscription {
            client_secret: Some(format!("pi_{}_secret", id)),
            id,
            customer_id: request.customer_id,
            status: ProviderStatus::Incomplete,
            created,
            current_period_end: created + Duration::days(30).num_seconds(),
            metadata: request.metadata,
        };
        state
            .subscription_keys
            .insert(request.idempotency_key, subscription.id.clone());
        state
            .subscriptions
            .insert(subscription.id.clone(), subscription.clone());
        Ok(subscription)
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<ProviderSubscription>, PaymentError> {
        let mut state = self.state();
        state.record("get_subscription", vec![subscription_id.to_string()])?;
        Ok(state.subscriptions.get(subscription_id).cloned())
    }

    async fn create_checkout_session(
        &self,
        request: CreateCheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let mut state = self.state();
        state.record(
            "create_checkout_session",
            vec![request.email.clone(), request.price_id.clone()],
        )?;

        let id = state.next_id("cs");
        Ok(CheckoutSession {
            url: format!("https://checkout.mock.test/{}?price={}", id, request.price_id),
            id,
            expires_at: (Utc::now() + Duration::hours(24)).timestamp(),
        })
    }
}
