//! Device and download entitlement handlers.
//!
//! Every handler derives entitlement from the caller's current subscription
//! through [`EntitlementResolver`], which also expires lapsed subscriptions.

mod get_my_subscription;
mod issue_download_license;
mod manage_devices;
mod redeem_download_license;
mod register_device;
mod resolver;
mod revoke_all_licenses;

pub use get_my_subscription::{GetMySubscriptionHandler, GetMySubscriptionQuery, MySubscriptionView};
pub use issue_download_license::{
    IssueDownloadLicenseCommand, IssueDownloadLicenseHandler, IssueDownloadLicenseResult,
};
pub use manage_devices::{
    DeregisterDeviceCommand, DeregisterDeviceHandler, DeregisterDeviceResult, ListDevicesHandler,
    ListDevicesQuery,
};
pub use redeem_download_license::{
    RedeemDownloadLicenseCommand, RedeemDownloadLicenseHandler, RedeemDownloadLicenseResult,
};
pub use register_device::{RegisterDeviceCommand, RegisterDeviceHandler, RegisterDeviceResult};
pub use resolver::EntitlementResolver;
pub use revoke_all_licenses::{RevokeAllLicensesCommand, RevokeAllLicensesHandler};
