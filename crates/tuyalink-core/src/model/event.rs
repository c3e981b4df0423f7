// ── Device events ──
//
// Typed view of the decoded broker messages the registry acts on.

use serde::Deserialize;
use serde_json::Value;
use strum::{Display, EnumString};

use tuyalink_api::{MqMessage, StatusEntry};

/// Envelope protocol of a device status report.
pub const PROTOCOL_DEVICE_REPORT: i64 = 4;
/// Envelope protocol of a business event.
pub const PROTOCOL_BUSINESS: i64 = 20;

/// Secondary classifier of a business event (`bizCode`).
#[derive(Debug, Clone, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum BizCode {
    Online,
    Offline,
    NameUpdate,
    DpNameUpdate,
    BindUser,
    Delete,
    #[strum(serialize = "p2pSignal")]
    P2pSignal,
    #[strum(default)]
    Other(String),
}

/// What a decoded message means for the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Data point values changed.
    StatusReport {
        device_id: String,
        status: Vec<StatusEntry>,
    },
    /// A business event with its optional new name (`nameUpdate`).
    Business {
        device_id: String,
        code: BizCode,
        name: Option<String>,
    },
    /// Any other protocol, or a message missing its device id.
    Ignored,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportData {
    dev_id: String,
    #[serde(default)]
    status: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BusinessData {
    dev_id: String,
    biz_code: String,
    #[serde(default)]
    biz_data: Value,
}

impl DeviceEvent {
    pub fn from_message(message: &MqMessage) -> Self {
        match message.protocol {
            PROTOCOL_DEVICE_REPORT => {
                let Ok(data) = ReportData::deserialize(&message.data) else {
                    return Self::Ignored;
                };
                // Entries without both `code` and `value` are skipped.
                let status = data
                    .status
                    .into_iter()
                    .filter_map(|entry| {
                        let code = entry.get("code")?.as_str()?.to_owned();
                        let value = entry.get("value")?.clone();
                        Some(StatusEntry { code, value })
                    })
                    .collect();
                Self::StatusReport {
                    device_id: data.dev_id,
                    status,
                }
            }
            PROTOCOL_BUSINESS => {
                let Ok(data) = BusinessData::deserialize(&message.data) else {
                    return Self::Ignored;
                };
                let code = data
                    .biz_code
                    .parse()
                    .unwrap_or(BizCode::Other(data.biz_code));
                let name = data
                    .biz_data
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                Self::Business {
                    device_id: data.dev_id,
                    code,
                    name,
                }
            }
            _ => Self::Ignored,
        }
    }
}
