//! Device and offline-download entitlements.

mod device;
mod entitlement;
mod errors;
mod license;

pub use device::{normalize_identifier, Device, Platform};
pub use entitlement::Entitlement;
pub use errors::EntitlementError;
pub use license::{
    offline_slots_in_use, DownloadLicense, LicenseStatus, LicenseToken, RedeemOutcome,
};
