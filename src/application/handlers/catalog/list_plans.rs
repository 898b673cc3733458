//! ListPlansHandler - Query handler for subscribable plans.

use std::sync::Arc;

use crate::domain::catalog::Plan;
use crate::ports::PlanCatalog;

/// Query for catalog plans.
#[derive(Debug, Clone, Default)]
pub struct ListPlansQuery {
    /// Include plans closed to new signups.
    pub include_retired: bool,
}

pub struct ListPlansHandler {
    catalog: Arc<dyn PlanCatalog>,
}

impl ListPlansHandler {
    pub fn new(catalog: Arc<dyn PlanCatalog>) -> Self {
        Self { catalog }
    }

    pub fn handle(&self, query: ListPlansQuery) -> Vec<Plan> {
        if query.include_retired {
            self.catalog.list()
        } else {
            self.catalog.list_active()
        }
    }
}
