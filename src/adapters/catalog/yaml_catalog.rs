//! YAML-backed plan catalog.
//!
//! Plans are read once at startup. The file holds a top-level `plans` list;
//! every plan is validated and ids must be unique.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::config::{CatalogConfig, ConfigError};
use crate::domain::catalog::Plan;
use crate::domain::foundation::PlanId;
use crate::ports::PlanCatalog;

const BUILTIN_PLANS: &str = include_str!("builtin_plans.yaml");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    plans: Vec<Plan>,
}

/// Immutable plan catalog held in memory.
#[derive(Debug, Clone)]
pub struct StaticPlanCatalog {
    plans: Vec<Plan>,
}

impl StaticPlanCatalog {
    /// Build a catalog from already-parsed plans.
    pub fn new(plans: Vec<Plan>) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        for plan in &plans {
            plan.validate()
                .map_err(|e| ConfigError::Catalog(format!("plan '{}': {}", plan.id, e)))?;
            if !seen.insert(plan.id.clone()) {
                return Err(ConfigError::Catalog(format!(
                    "plan '{}' is defined more than once",
                    plan.id
                )));
            }
        }
        if plans.is_empty() {
            return Err(ConfigError::Catalog("catalog defines no plans".to_string()));
        }
        Ok(Self { plans })
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile =
            serde_yaml::from_str(yaml).map_err(|e| ConfigError::Catalog(e.to_string()))?;
        Self::new(file.plans)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Catalog(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml_str(&yaml)
    }

    /// The catalog shipped with the binary.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml_str(BUILTIN_PLANS)
    }

    /// Load from the configured file, or fall back to the built-in catalog.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, ConfigError> {
        let catalog = match &config.plans_file {
            Some(path) => Self::from_file(path)?,
            None => Self::builtin()?,
        };
        tracing::info!(
            plans = catalog.plans.len(),
            source = config
                .plans_file
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "builtin".to_string()),
            "Plan catalog loaded"
        );
        Ok(catalog)
    }
}

impl PlanCatalog for StaticPlanCatalog {
    fn find(&self, id: &PlanId) -> Option<Plan> {
        self.plans.iter().find(|p| &p.id == id).cloned()
    }

    fn list(&self) -> Vec<Plan> {
        self.plans.clone()
    }
}
