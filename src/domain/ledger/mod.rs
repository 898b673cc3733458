//! Plan & revenue ledger.
//!
//! Read-only projections rebuilt on demand from subscription rows and the
//! plan catalog. Nothing here is persisted.

mod snapshot;

pub use snapshot::{build_snapshot, LedgerSnapshot, PlanLedgerLine};
