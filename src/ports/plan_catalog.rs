//! Plan catalog port.
//!
//! Plans are static reference data loaded once at startup, so lookups are
//! synchronous.

use crate::domain::catalog::Plan;
use crate::domain::foundation::PlanId;

/// Read access to subscribable plans.
pub trait PlanCatalog: Send + Sync {
    /// Find a plan by id, including retired ones.
    fn find(&self, id: &PlanId) -> Option<Plan>;

    /// Every plan, retired ones included, in catalog order.
    fn list(&self) -> Vec<Plan>;

    /// Plans open for new signups.
    fn list_active(&self) -> Vec<Plan> {
        self.list().into_iter().filter(|p| p.active).collect()
    }

    /// Find a plan open for new signups.
    fn find_active(&self, id: &PlanId) -> Option<Plan> {
        self.find(id).filter(|p| p.active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::fixtures::plan;

    struct TwoPlans;

    impl PlanCatalog for TwoPlans {
        fn find(&self, id: &PlanId) -> Option<Plan> {
            self.list().into_iter().find(|p| &p.id == id)
        }

        fn list(&self) -> Vec<Plan> {
            let mut retired = plan("legacy", 1, false, 0);
            retired.active = false;
            vec![plan("premium", 4, true, 25), retired]
        }
    }

    #[test]
    fn plan_catalog_is_object_safe() {
        fn _accepts_dyn(_catalog: &dyn PlanCatalog) {}
    }

    #[test]
    fn retired_plans_are_found_but_not_offered() {
        let catalog = TwoPlans;
        let legacy = PlanId::new("legacy").unwrap();

        assert!(catalog.find(&legacy).is_some());
        assert!(catalog.find_active(&legacy).is_none());
        assert_eq!(catalog.list_active().len(), 1);
    }
}
