//! Ledger queries.

mod get_ledger_snapshot;

pub use get_ledger_snapshot::{GetLedgerSnapshotHandler, GetLedgerSnapshotQuery};
