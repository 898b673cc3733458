//! Single-use download licenses.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use super::EntitlementError;
use crate::domain::foundation::{
    DeviceId, EpisodeId, LicenseId, StateMachine, Timestamp, UserId, ValidationError,
};

/// Bytes of randomness in a license token.
const TOKEN_BYTES: usize = 32;

/// License lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseStatus {
    Issued,
    Redeemed,
    Revoked,
    Expired,
}

impl LicenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseStatus::Issued => "issued",
            LicenseStatus::Redeemed => "redeemed",
            LicenseStatus::Revoked => "revoked",
            LicenseStatus::Expired => "expired",
        }
    }

    /// Returns true while revocation still has something to revoke.
    pub fn is_revocable(&self) -> bool {
        matches!(self, LicenseStatus::Issued | LicenseStatus::Redeemed)
    }
}

impl FromStr for LicenseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issued" => Ok(LicenseStatus::Issued),
            "redeemed" => Ok(LicenseStatus::Redeemed),
            "revoked" => Ok(LicenseStatus::Revoked),
            "expired" => Ok(LicenseStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown license status '{}'", other),
            )),
        }
    }
}

impl StateMachine for LicenseStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use LicenseStatus::*;
        matches!(
            (self, target),
            (Issued, Redeemed) | (Issued, Revoked) | (Issued, Expired) | (Redeemed, Revoked)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use LicenseStatus::*;
        match self {
            Issued => vec![Redeemed, Revoked, Expired],
            Redeemed => vec![Revoked],
            Revoked | Expired => vec![],
        }
    }
}

/// Plaintext license token. Only its digest is ever stored.
#[derive(Clone, PartialEq, Eq)]
pub struct LicenseToken(String);

impl LicenseToken {
    /// Generates a fresh random token.
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Wraps a token presented by a client.
    pub fn from_presented(raw: &str) -> Result<Self, ValidationError> {
        let token = raw.trim();
        if token.is_empty() {
            return Err(ValidationError::empty_field("token"));
        }
        if token.len() > 512 {
            return Err(ValidationError::invalid_format("token", "too long"));
        }
        Ok(Self(token.to_string()))
    }

    /// Hex SHA-256 digest used as the lookup key.
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LicenseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LicenseToken(***)")
    }
}

/// Result of a successful redemption attempt on the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// The license is now bound to the device.
    Redeemed,
    /// The unredeemed TTL had passed; the license is now expired.
    ExpiredNow,
}

/// A download license.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLicense {
    pub id: LicenseId,
    pub user_id: UserId,
    pub episode_id: EpisodeId,
    pub token_digest: String,
    /// Bound at redemption.
    pub device_id: Option<DeviceId>,
    pub status: LicenseStatus,
    pub issued_at: Timestamp,
    /// Redemption deadline while issued, end of offline playback once redeemed.
    pub expires_at: Timestamp,
    pub redeemed_at: Option<Timestamp>,
}

impl DownloadLicense {
    /// Issues a license valid for redemption during `ttl_secs`.
    pub fn issue(
        user_id: UserId,
        episode_id: EpisodeId,
        ttl_secs: u64,
        now: Timestamp,
    ) -> (Self, LicenseToken) {
        let token = LicenseToken::generate();
        let license = Self {
            id: LicenseId::new(),
            user_id,
            episode_id,
            token_digest: token.digest(),
            device_id: None,
            status: LicenseStatus::Issued,
            issued_at: now,
            expires_at: now.plus_secs(ttl_secs),
            redeemed_at: None,
        };
        (license, token)
    }

    /// Returns true if this license uses one offline download slot.
    pub fn occupies_offline_slot(&self, now: Timestamp) -> bool {
        self.status == LicenseStatus::Redeemed && now.is_before(&self.expires_at)
    }

    /// Binds the license to `device_id` for `offline_window_secs`.
    ///
    /// An issued license past its deadline becomes expired instead; the
    /// caller persists that and reports `TokenExpired`.
    pub fn redeem(
        &mut self,
        device_id: DeviceId,
        offline_window_secs: u64,
        now: Timestamp,
    ) -> Result<RedeemOutcome, EntitlementError> {
        match self.status {
            LicenseStatus::Issued if !now.is_before(&self.expires_at) => {
                self.status = LicenseStatus::Expired;
                Ok(RedeemOutcome::ExpiredNow)
            }
            LicenseStatus::Issued => {
                self.status = LicenseStatus::Redeemed;
                self.device_id = Some(device_id);
                self.redeemed_at = Some(now);
                self.expires_at = now.plus_secs(offline_window_secs);
                Ok(RedeemOutcome::Redeemed)
            }
            LicenseStatus::Redeemed => Err(EntitlementError::TokenAlreadyRedeemed),
            LicenseStatus::Revoked => Err(EntitlementError::LicenseRevoked),
            LicenseStatus::Expired => Err(EntitlementError::TokenExpired),
        }
    }

    /// Redeems while enforcing the offline quota.
    ///
    /// Status errors take precedence over the quota, and an expired token
    /// still expires even when the quota is full.
    pub fn redeem_within_quota(
        &mut self,
        device_id: DeviceId,
        slots_in_use: u32,
        quota: u32,
        offline_window_secs: u64,
        now: Timestamp,
    ) -> Result<RedeemOutcome, EntitlementError> {
        let fresh = self.status == LicenseStatus::Issued && now.is_before(&self.expires_at);
        if fresh && slots_in_use >= quota {
            return Err(EntitlementError::DownloadQuotaExceeded { limit: quota });
        }
        self.redeem(device_id, offline_window_secs, now)
    }

    /// Withdraws the license. Returns false if nothing changed.
    pub fn revoke(&mut self) -> bool {
        match self.status.transition_to(LicenseStatus::Revoked) {
            Ok(next) => {
                self.status = next;
                true
            }
            Err(_) => false,
        }
    }
}

/// Number of offline slots in use among `licenses`.
pub fn offline_slots_in_use<'a>(
    licenses: impl IntoIterator<Item = &'a DownloadLicense>,
    now: Timestamp,
) -> u32 {
    licenses
        .into_iter()
        .filter(|l| l.occupies_offline_slot(now))
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: u64 = 600;
    const WINDOW: u64 = 48 * 3600;

    fn issued(now: Timestamp) -> (DownloadLicense, LicenseToken) {
        DownloadLicense::issue(UserId::new(), EpisodeId::new("ep-1").unwrap(), TTL, now)
    }

    #[test]
    fn tokens_are_random_and_url_safe() {
        let a = LicenseToken::generate();
        let b = LicenseToken::generate();
        assert_ne!(a, b);
        assert_eq!(a.expose().len(), 43);
        assert!(a
            .expose()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn license_stores_digest_not_token() {
        let (license, token) = issued(Timestamp::now());
        assert_eq!(license.token_digest, token.digest());
        assert_ne!(license.token_digest, token.expose());
        assert_eq!(format!("{:?}", token), "LicenseToken(***)");
    }

    #[test]
    fn redeem_binds_device_and_opens_offline_window() {
        let now = Timestamp::now();
        let (mut license, _) = issued(now);
        let device = DeviceId::new();
        let at = now.plus_secs(10);

        assert_eq!(license.redeem(device, WINDOW, at).unwrap(), RedeemOutcome::Redeemed);
        assert_eq!(license.device_id, Some(device));
        assert_eq!(license.redeemed_at, Some(at));
        assert_eq!(license.expires_at, at.plus_secs(WINDOW));
        assert!(license.occupies_offline_slot(at));
    }

    #[test]
    fn second_redemption_fails() {
        let now = Timestamp::now();
        let (mut license, _) = issued(now);
        license.redeem(DeviceId::new(), WINDOW, now).unwrap();
        assert_eq!(
            license.redeem(DeviceId::new(), WINDOW, now),
            Err(EntitlementError::TokenAlreadyRedeemed)
        );
    }

    #[test]
    fn late_redemption_expires_the_license() {
        let now = Timestamp::now();
        let (mut license, _) = issued(now);
        let outcome = license.redeem(DeviceId::new(), WINDOW, now.plus_secs(TTL)).unwrap();
        assert_eq!(outcome, RedeemOutcome::ExpiredNow);
        assert_eq!(license.status, LicenseStatus::Expired);
        assert_eq!(license.device_id, None);
        assert_eq!(
            license.redeem(DeviceId::new(), WINDOW, now),
            Err(EntitlementError::TokenExpired)
        );
    }

    #[test]
    fn revoked_license_cannot_be_redeemed() {
        let now = Timestamp::now();
        let (mut license, _) = issued(now);
        assert!(license.revoke());
        assert!(!license.revoke());
        assert_eq!(
            license.redeem(DeviceId::new(), WINDOW, now),
            Err(EntitlementError::LicenseRevoked)
        );
    }

    #[test]
    fn expired_offline_window_frees_the_slot() {
        let now = Timestamp::now();
        let (mut license, _) = issued(now);
        license.redeem(DeviceId::new(), WINDOW, now).unwrap();
        assert_eq!(offline_slots_in_use([&license], now), 1);
        assert_eq!(offline_slots_in_use([&license], now.plus_secs(WINDOW)), 0);
    }

    #[test]
    fn issued_licenses_do_not_use_slots() {
        let now = Timestamp::now();
        let (license, _) = issued(now);
        assert_eq!(offline_slots_in_use([&license], now), 0);
    }

    #[test]
    fn full_quota_blocks_fresh_redemption_only() {
        let now = Timestamp::now();
        let (mut fresh, _) = issued(now);
        assert_eq!(
            fresh.redeem_within_quota(DeviceId::new(), 2, 2, WINDOW, now),
            Err(EntitlementError::DownloadQuotaExceeded { limit: 2 })
        );
        assert_eq!(fresh.status, LicenseStatus::Issued);

        let (mut stale, _) = issued(now);
        let outcome = stale
            .redeem_within_quota(DeviceId::new(), 2, 2, WINDOW, now.plus_secs(TTL))
            .unwrap();
        assert_eq!(outcome, RedeemOutcome::ExpiredNow);

        let (mut used, _) = issued(now);
        used.redeem(DeviceId::new(), WINDOW, now).unwrap();
        assert_eq!(
            used.redeem_within_quota(DeviceId::new(), 2, 2, WINDOW, now),
            Err(EntitlementError::TokenAlreadyRedeemed)
        );
    }

    #[test]
    fn terminal_statuses_have_no_exits() {
        assert!(LicenseStatus::Revoked.is_terminal());
        assert!(LicenseStatus::Expired.is_terminal());
        assert!(!LicenseStatus::Redeemed.can_transition_to(&LicenseStatus::Issued));
    }
}
