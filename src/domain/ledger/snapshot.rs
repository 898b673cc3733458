use serde::Serialize;
use std::collections::BTreeMap;

use crate::domain::catalog::Plan;
use crate::domain::foundation::{PlanId, Timestamp};
use crate::domain::subscription::{Subscription, SubscriptionStatus};

/// Per-plan totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanLedgerLine {
    pub plan_id: PlanId,
    pub plan_name: String,
    pub active: u64,
    pub past_due: u64,
    /// Monthly recurring revenue of active subscriptions, minor units.
    pub monthly_revenue_minor: i64,
    pub currency: String,
}

/// Platform-wide subscription totals at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerSnapshot {
    pub generated_at: Timestamp,
    pub active_count: u64,
    pub past_due_count: u64,
    pub pending_count: u64,
    pub by_plan: Vec<PlanLedgerLine>,
    pub churn_window_days: i64,
    /// Subscriptions that ended inside the window.
    pub churned_in_window: u64,
    /// Subscriptions live when the window opened.
    pub live_at_window_start: u64,
    /// `churned_in_window / live_at_window_start`, 0 when nothing was live.
    pub churn_rate: f64,
}

/// Projects `subscriptions` into a ledger snapshot.
///
/// Subscriptions on plans missing from `plans` are counted in the totals
/// but contribute no revenue.
pub fn build_snapshot(
    subscriptions: &[Subscription],
    plans: &[Plan],
    now: Timestamp,
    churn_window_days: i64,
) -> LedgerSnapshot {
    let window_start = now.minus_days(churn_window_days);
    let plans_by_id: BTreeMap<&PlanId, &Plan> = plans.iter().map(|p| (&p.id, p)).collect();
    let mut lines: BTreeMap<PlanId, PlanLedgerLine> = BTreeMap::new();

    let mut active_count = 0;
    let mut past_due_count = 0;
    let mut pending_count = 0;
    let mut churned_in_window = 0;
    let mut live_at_window_start = 0;

    for sub in subscriptions {
        let plan = plans_by_id.get(&sub.plan_id).copied();
        let line = lines.entry(sub.plan_id.clone()).or_insert_with(|| PlanLedgerLine {
            plan_id: sub.plan_id.clone(),
            plan_name: plan.map(|p| p.name.clone()).unwrap_or_default(),
            active: 0,
            past_due: 0,
            monthly_revenue_minor: 0,
            currency: plan
                .map(|p| p.current_terms().currency.clone())
                .unwrap_or_default(),
        });

        let ended = matches!(
            sub.status,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired
        );
        let existed_at_start = sub.created_at.is_before(&window_start);

        match sub.status {
            SubscriptionStatus::Active => {
                active_count += 1;
                line.active += 1;
                if let Some(plan) = plan {
                    line.monthly_revenue_minor += plan.monthly_revenue_minor(sub.plan_revision);
                }
            }
            SubscriptionStatus::PastDue => {
                past_due_count += 1;
                line.past_due += 1;
            }
            SubscriptionStatus::Pending => pending_count += 1,
            SubscriptionStatus::Cancelled | SubscriptionStatus::Expired => {}
        }

        let ended_in_window = ended && !sub.updated_at.is_before(&window_start);
        if ended_in_window {
            churned_in_window += 1;
        }
        if existed_at_start
            && sub.status != SubscriptionStatus::Pending
            && (!ended || ended_in_window)
        {
            live_at_window_start += 1;
        }
    }

    let churn_rate = if live_at_window_start == 0 {
        0.0
    } else {
        churned_in_window as f64 / live_at_window_start as f64
    };

    LedgerSnapshot {
        generated_at: now,
        active_count,
        past_due_count,
        pending_count,
        by_plan: lines.into_values().collect(),
        churn_window_days,
        churned_in_window,
        live_at_window_start,
        churn_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures::plan;
    use crate::domain::catalog::BillingPeriod;
    use crate::domain::subscription::fixtures::subscription_with_status;

    fn sub(status: SubscriptionStatus, plan_id: &str, age_days: i64, now: Timestamp) -> Subscription {
        let mut s = subscription_with_status(status);
        s.plan_id = PlanId::new(plan_id).unwrap();
        s.created_at = now.minus_days(age_days);
        s.updated_at = s.created_at;
        s
    }

    #[test]
    fn empty_ledger_has_zero_churn() {
        let snapshot = build_snapshot(&[], &[], Timestamp::now(), 30);
        assert_eq!(snapshot.active_count, 0);
        assert_eq!(snapshot.churn_rate, 0.0);
        assert!(snapshot.by_plan.is_empty());
    }

    #[test]
    fn revenue_is_grouped_by_plan_and_normalized() {
        let now = Timestamp::now();
        let monthly = plan("monthly", 2, false, 0);
        let mut yearly = plan("yearly", 4, true, 5);
        yearly.billing_period = BillingPeriod::Yearly;
        yearly.terms[0].price_minor = 12_000;

        let subs = vec![
            sub(SubscriptionStatus::Active, "monthly", 5, now),
            sub(SubscriptionStatus::Active, "monthly", 5, now),
            sub(SubscriptionStatus::Active, "yearly", 5, now),
            sub(SubscriptionStatus::PastDue, "yearly", 5, now),
        ];
        let snapshot = build_snapshot(&subs, &[monthly, yearly], now, 30);

        assert_eq!(snapshot.active_count, 3);
        assert_eq!(snapshot.past_due_count, 1);
        let monthly_line = &snapshot.by_plan[0];
        assert_eq!(monthly_line.plan_id.as_str(), "monthly");
        assert_eq!(monthly_line.monthly_revenue_minor, 2 * 999);
        let yearly_line = &snapshot.by_plan[1];
        assert_eq!(yearly_line.monthly_revenue_minor, 1_000);
        assert_eq!(yearly_line.past_due, 1);
    }

    #[test]
    fn churn_counts_subscriptions_ended_inside_window() {
        let now = Timestamp::now();
        let mut churned = sub(SubscriptionStatus::Cancelled, "monthly", 60, now);
        churned.updated_at = now.minus_days(3);
        let mut old_churn = sub(SubscriptionStatus::Cancelled, "monthly", 90, now);
        old_churn.updated_at = now.minus_days(45);
        let subs = vec![
            churned,
            old_churn,
            sub(SubscriptionStatus::Active, "monthly", 60, now),
            sub(SubscriptionStatus::Active, "monthly", 60, now),
            sub(SubscriptionStatus::Active, "monthly", 60, now),
            sub(SubscriptionStatus::Active, "monthly", 2, now),
        ];

        let snapshot = build_snapshot(&subs, &[plan("monthly", 2, false, 0)], now, 30);
        assert_eq!(snapshot.churned_in_window, 1);
        assert_eq!(snapshot.live_at_window_start, 4);
        assert!((snapshot.churn_rate - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_plan_counts_without_revenue() {
        let now = Timestamp::now();
        let subs = vec![sub(SubscriptionStatus::Active, "retired", 1, now)];
        let snapshot = build_snapshot(&subs, &[], now, 30);
        assert_eq!(snapshot.active_count, 1);
        assert_eq!(snapshot.by_plan[0].monthly_revenue_minor, 0);
        assert_eq!(snapshot.by_plan[0].plan_name, "");
    }
}
