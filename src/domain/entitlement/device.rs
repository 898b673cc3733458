//! Registered playback device.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DeviceId, Timestamp, UserId, ValidationError};

/// Client platform of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Web,
    Ios,
    Android,
    Tv,
    Desktop,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Web => "web",
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Tv => "tv",
            Platform::Desktop => "desktop",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(Platform::Web),
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "tv" => Ok(Platform::Tv),
            "desktop" => Ok(Platform::Desktop),
            other => Err(ValidationError::invalid_format(
                "platform",
                format!("unknown platform '{}'", other),
            )),
        }
    }
}

/// A device bound to a user account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub user_id: UserId,
    pub platform: Platform,
    /// Client-generated identifier, unique per user.
    pub device_identifier: String,
    pub registered_at: Timestamp,
    pub last_active_at: Timestamp,
}

impl Device {
    pub fn register(
        user_id: UserId,
        platform: Platform,
        device_identifier: &str,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        Ok(Self {
            id: DeviceId::new(),
            user_id,
            platform,
            device_identifier: normalize_identifier(device_identifier)?,
            registered_at: now,
            last_active_at: now,
        })
    }

    pub fn touch(&mut self, now: Timestamp) {
        if now.is_after(&self.last_active_at) {
            self.last_active_at = now;
        }
    }
}

/// Trims a device identifier and checks its length.
pub fn normalize_identifier(raw: &str) -> Result<String, ValidationError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ValidationError::empty_field("device_identifier"));
    }
    if id.len() > 128 {
        return Err(ValidationError::out_of_range(
            "device_identifier",
            1,
            128,
            id.len() as i64,
        ));
    }
    Ok(id.to_string())
}
