use serde::{Deserialize, Serialize};

use crate::application::handlers::webhook::ReprocessSummary;
use crate::domain::catalog::Plan;
use crate::domain::ledger::{LedgerSnapshot, PlanLedgerLine};

// ════════════════════════════════════════════════════════════════════════════════
// Query parameters
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlansParams {
    #[serde(default)]
    pub include_retired: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerParams {
    pub churn_window_days: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReprocessParams {
    pub limit: Option<u32>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// A plan as shown to prospective subscribers, with its current terms.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub id: String,
    pub name: String,
    pub billing_period: String,
    pub active: bool,
    pub revision: u32,
    pub price_minor: i64,
    pub currency: String,
    pub device_limit: u32,
    pub offline_allowed: bool,
    pub max_offline_downloads: u32,
}

impl From<&Plan> for PlanResponse {
    fn from(plan: &Plan) -> Self {
        let terms = plan.current_terms();
        Self {
            id: plan.id.to_string(),
            name: plan.name.clone(),
            billing_period: plan.billing_period.to_string(),
            active: plan.active,
            revision: terms.revision,
            price_minor: terms.price_minor,
            currency: terms.currency.clone(),
            device_limit: terms.device_limit,
            offline_allowed: terms.offline_allowed,
            max_offline_downloads: terms.max_offline_downloads,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanListResponse {
    pub plans: Vec<PlanResponse>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLedgerResponse {
    pub plan_id: String,
    pub plan_name: String,
    pub active: u64,
    pub past_due: u64,
    pub monthly_revenue_minor: i64,
    pub currency: String,
}

impl From<PlanLedgerLine> for PlanLedgerResponse {
    fn from(line: PlanLedgerLine) -> Self {
        Self {
            plan_id: line.plan_id.to_string(),
            plan_name: line.plan_name,
            active: line.active,
            past_due: line.past_due,
            monthly_revenue_minor: line.monthly_revenue_minor,
            currency: line.currency,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerResponse {
    pub generated_at: String,
    pub active_count: u64,
    pub past_due_count: u64,
    pub pending_count: u64,
    pub by_plan: Vec<PlanLedgerResponse>,
    pub churn_window_days: i64,
    pub churned_in_window: u64,
    pub live_at_window_start: u64,
    pub churn_rate: f64,
}

impl From<LedgerSnapshot> for LedgerResponse {
    fn from(snapshot: LedgerSnapshot) -> Self {
        Self {
            generated_at: snapshot.generated_at.as_datetime().to_rfc3339(),
            active_count: snapshot.active_count,
            past_due_count: snapshot.past_due_count,
            pending_count: snapshot.pending_count,
            by_plan: snapshot
                .by_plan
                .into_iter()
                .map(PlanLedgerResponse::from)
                .collect(),
            churn_window_days: snapshot.churn_window_days,
            churned_in_window: snapshot.churned_in_window,
            live_at_window_start: snapshot.live_at_window_start,
            churn_rate: snapshot.churn_rate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReprocessResponse {
    pub examined: usize,
    pub applied: usize,
    pub ignored: usize,
    pub deferred: usize,
    pub failed: usize,
}

impl From<ReprocessSummary> for ReprocessResponse {
    fn from(summary: ReprocessSummary) -> Self {
        Self {
            examined: summary.examined,
            applied: summary.applied,
            ignored: summary.ignored,
            deferred: summary.deferred,
            failed: summary.failed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PurgeResponse {
    pub purged: u64,
}
