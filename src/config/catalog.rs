//! Plan catalog configuration

use serde::Deserialize;
use std::path::PathBuf;

/// Where plans come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    /// YAML plan file. The built-in catalog is used when unset.
    pub plans_file: Option<PathBuf>,
}
