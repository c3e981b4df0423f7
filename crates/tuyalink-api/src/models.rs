// Open API response types
//
// Every endpoint wraps its payload in the `ApiResponse` envelope. Fields use
// `#[serde(default)]` liberally because the platform omits keys freely and
// the two account modes return slightly different shapes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::Error;

// ── Response Envelope ────────────────────────────────────────────────

/// Standard open API response envelope.
///
/// ```json
/// { "success": true, "t": 1700000000000, "result": { ... } }
/// { "success": false, "code": 1010, "msg": "token invalid", "t": 1700000000000 }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T = Value> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default = "Option::default")]
    pub result: Option<T>,
    /// Server time in milliseconds.
    #[serde(default)]
    pub t: i64,
}

impl ApiResponse<Value> {
    /// Turn the envelope into its `result`, or an [`Error::Api`] when the
    /// platform reported failure.
    pub fn into_result<T: DeserializeOwned>(self) -> Result<T, Error> {
        if !self.success {
            return Err(Error::Api {
                code: self.code.unwrap_or_default(),
                message: self.msg.unwrap_or_else(|| "request failed".into()),
            });
        }
        let value = self.result.unwrap_or(Value::Null);
        serde_json::from_value(value.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: crate::redact::redact(&value).to_string(),
        })
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// Device record as returned by the info endpoints.
///
/// The SmartHome batch listing embeds `status`; the Custom listing does not.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub local_key: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub sub: bool,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub lat: Option<String>,
    #[serde(default)]
    pub lon: Option<String>,
    #[serde(default)]
    pub time_zone: String,
    #[serde(default)]
    pub active_time: i64,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub status: Vec<StatusEntry>,
}

/// One `{code, value}` data point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub code: String,
    #[serde(default)]
    pub value: Value,
}

/// Status snapshot for one device from the batch status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatus {
    pub id: String,
    #[serde(default)]
    pub status: Vec<StatusEntry>,
}

/// Manufacturing identifiers of a device.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactoryInfo {
    pub id: String,
    #[serde(default)]
    pub uuid: String,
    #[serde(default)]
    pub sn: String,
    #[serde(default)]
    pub mac: String,
}

/// Page of the Custom-mode batch info listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DeviceListPage {
    #[serde(default)]
    pub list: Vec<DeviceInfo>,
}

/// SmartHome batch listing, which nests devices under `devices`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct DeviceBatch {
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
}

// ── Specification ────────────────────────────────────────────────────

/// Instruction and status sets of a device.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Specification {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub functions: Vec<DeviceFunction>,
    #[serde(default)]
    pub status: Vec<StatusRange>,
}

/// Standard instruction set of a product category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryFunctions {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub functions: Vec<DeviceFunction>,
}

/// A command the device accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFunction {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub desc: String,
    /// `Boolean`, `Integer`, `Enum`, `Json`, ...
    #[serde(default, rename = "type")]
    pub kind: String,
    /// Value range, usually a JSON-encoded string.
    #[serde(default)]
    pub values: Value,
}

/// Value range of a reported status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRange {
    pub code: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub values: Value,
}

/// One command for `send_commands`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub code: String,
    pub value: Value,
}

impl Command {
    pub fn new(code: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            code: code.into(),
            value: value.into(),
        }
    }
}

// ── Assets ───────────────────────────────────────────────────────────

/// One page of a cursor-paginated asset listing.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssetPage<T> {
    #[serde(default = "Vec::new")]
    pub list: Vec<T>,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub last_row_key: String,
    #[serde(default)]
    pub total_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct AssetDeviceRef {
    pub device_id: String,
}

/// Asset node in the project tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    pub asset_id: String,
    #[serde(default)]
    pub asset_name: String,
    #[serde(default)]
    pub parent_asset_id: Option<String>,
}

// ── Homes, scenes, infrared ──────────────────────────────────────────

/// A home of a SmartHome account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Home {
    #[serde(deserialize_with = "string_or_number")]
    pub home_id: String,
    #[serde(default)]
    pub name: String,
}

/// A tap-to-run scene. `home_id` is filled in from the home it was listed under.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    #[serde(deserialize_with = "string_or_number")]
    pub scene_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub actions: Vec<Value>,
    #[serde(default, skip_deserializing)]
    pub home_id: String,
}

/// A remote learned by an infrared hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteDevice {
    #[serde(deserialize_with = "string_or_number")]
    pub remote_id: String,
    #[serde(default)]
    pub remote_name: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub category_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub brand_id: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub remote_index: String,
}

/// One button of a learned remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteKey {
    pub key: String,
    #[serde(default)]
    pub key_id: i64,
    #[serde(default)]
    pub key_name: String,
    #[serde(default)]
    pub standard_key: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RemoteKeyList {
    #[serde(default)]
    pub key_list: Vec<RemoteKey>,
}

/// Ids arrive as JSON numbers or strings depending on the endpoint.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}
