// Account modes
//
// The platform exposes two parallel integration flavours with their own
// login endpoints, password hashing, REST paths, MQ config endpoints and
// message encryption. Every per-mode difference lives on `AccountMode`
// so call sites never branch on the mode themselves.

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Which integration flavour the account was provisioned with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountMode {
    /// Consumer "smart home" app accounts. MD5 password, country code +
    /// app schema at login, AES-ECB encrypted MQ payloads.
    SmartHome,
    /// Custom / industry-solution accounts. SHA-256 password, AES-GCM
    /// encrypted MQ payloads.
    Custom,
}

/// HTTP method used by the token refresh endpoint, which differs by mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMethod {
    Get,
    Post,
}

/// Cipher used to wrap MQ payloads for a given mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadCipher {
    /// AES-128-ECB with a trailing pad-length byte (`msg_encrypted_version` 1.0).
    AesEcb,
    /// AES-128-GCM with an IV-length-prefixed buffer and trailing tag (2.0).
    AesGcm,
}

impl AccountMode {
    /// Login endpoint path.
    pub fn login_path(self) -> &'static str {
        match self {
            Self::SmartHome => "/v1.0/iot-01/associated-users/actions/authorized-login",
            Self::Custom => "/v1.0/iot-03/users/login",
        }
    }

    /// Prefix of the token refresh endpoint. The refresh token is appended.
    pub fn refresh_prefix(self) -> &'static str {
        match self {
            Self::SmartHome => "/v1.0/token/",
            Self::Custom => "/v1.0/iot-03/users/token/",
        }
    }

    pub fn refresh_method(self) -> RefreshMethod {
        match self {
            Self::SmartHome => RefreshMethod::Get,
            Self::Custom => RefreshMethod::Post,
        }
    }

    /// Hash the login password the way this mode's login endpoint expects.
    ///
    /// Both variants produce lowercase hex.
    pub fn hash_password(self, password: &str) -> String {
        match self {
            Self::SmartHome => hex::encode(Md5::digest(password.as_bytes())),
            Self::Custom => hex::encode(Sha256::digest(password.as_bytes())),
        }
    }

    /// Configuration name of the mode, as written in profiles.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SmartHome => "smart_home",
            Self::Custom => "custom",
        }
    }

    /// Whether login also sends `country_code` and `schema`.
    pub fn sends_country_and_schema(self) -> bool {
        matches!(self, Self::SmartHome)
    }

    /// Returns `true` when `path` targets the login or refresh endpoints,
    /// which are exempt from proactive refresh and carry SDK headers.
    pub fn is_token_path(self, path: &str) -> bool {
        path == self.login_path() || path.starts_with(self.refresh_prefix())
    }

    // ── Event channel ───────────────────────────────────────────────

    /// Broker access-config endpoint.
    pub fn mq_config_path(self) -> &'static str {
        match self {
            Self::SmartHome => "/v1.0/open-hub/access/config",
            Self::Custom => "/v1.0/iot-03/open-hub/access-config",
        }
    }

    /// Value of `msg_encrypted_version` requested from the config endpoint.
    pub fn encryption_version(self) -> &'static str {
        match self {
            Self::SmartHome => "1.0",
            Self::Custom => "2.0",
        }
    }

    pub fn payload_cipher(self) -> PayloadCipher {
        match self {
            Self::SmartHome => PayloadCipher::AesEcb,
            Self::Custom => PayloadCipher::AesGcm,
        }
    }

    // ── Device endpoints ────────────────────────────────────────────

    /// Single-device info path.
    pub fn device_path(self, device_id: &str) -> String {
        match self {
            Self::SmartHome => format!("/v1.0/devices/{device_id}"),
            Self::Custom => format!("/v1.0/iot-03/devices/{device_id}"),
        }
    }

    /// Batch device info path (ids go in the `device_ids` query).
    pub fn device_batch_path(self) -> &'static str {
        match self {
            Self::SmartHome => "/v1.0/devices/",
            Self::Custom => "/v1.0/iot-03/devices",
        }
    }

    /// Batch device status path. SmartHome has no dedicated endpoint and
    /// reuses the batch info listing, which embeds status.
    pub fn device_status_batch_path(self) -> &'static str {
        match self {
            Self::SmartHome => "/v1.0/devices/",
            Self::Custom => "/v1.0/iot-03/devices/status",
        }
    }

    /// Single-device status path. SmartHome embeds status in the info record.
    pub fn device_status_path(self, device_id: &str) -> String {
        match self {
            Self::SmartHome => self.device_path(device_id),
            Self::Custom => format!("/v1.0/iot-03/devices/{device_id}/status"),
        }
    }

    /// Factory info path (ids go in the `device_ids` query).
    pub fn factory_infos_path(self) -> &'static str {
        match self {
            Self::SmartHome => "/v1.0/devices/factory-infos",
            Self::Custom => "/v1.0/iot-03/devices/factory-infos",
        }
    }

    /// Standard instruction set of a product category.
    pub fn category_functions_path(self, category: &str) -> String {
        match self {
            Self::SmartHome => format!("/v1.0/functions/{category}"),
            Self::Custom => format!("/v1.0/iot-03/categories/{category}/functions"),
        }
    }

    /// Batch removal path. Only Custom accounts can remove in bulk.
    pub fn batch_remove_path(self) -> Option<&'static str> {
        match self {
            Self::SmartHome => None,
            Self::Custom => Some("/v1.0/iot-03/devices"),
        }
    }

    pub fn specification_path(self, device_id: &str) -> String {
        match self {
            Self::SmartHome => format!("/v1.0/devices/{device_id}/specifications"),
            Self::Custom => format!("/v1.0/iot-03/devices/{device_id}/specification"),
        }
    }

    pub fn functions_path(self, device_id: &str) -> String {
        format!("{}/functions", self.device_path(device_id))
    }

    pub fn commands_path(self, device_id: &str) -> String {
        format!("{}/commands", self.device_path(device_id))
    }

    /// Factory reset path; SmartHome resets with POST, Custom with DELETE.
    pub fn factory_reset_path(self, device_id: &str) -> String {
        match self {
            Self::SmartHome => format!("/v1.0/devices/{device_id}/reset-factory"),
            Self::Custom => format!("/v1.0/iot-03/devices/{device_id}/actions/reset"),
        }
    }
}
