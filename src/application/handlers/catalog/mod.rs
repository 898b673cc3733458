//! Plan catalog queries.

mod list_plans;

pub use list_plans::{ListPlansHandler, ListPlansQuery};
