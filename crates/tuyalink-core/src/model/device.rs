// ── Device domain type ──
//
// The registry's view of one device: the platform record plus three
// per-instance maps (current status, accepted commands, status ranges).

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use tuyalink_api::{DeviceFunction, DeviceInfo, Specification, StatusEntry, StatusRange};

/// A device held by the registry.
///
/// Equality is by `id` only; two snapshots of the same device with
/// different status compare equal.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Device {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub local_key: String,
    pub category: String,
    pub product_id: String,
    pub product_name: String,
    pub sub: bool,
    pub uuid: String,
    pub asset_id: String,
    pub online: bool,
    pub icon: String,
    pub ip: String,
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub time_zone: String,
    pub active_time: i64,
    pub create_time: i64,
    pub update_time: i64,

    /// Data point code → current value.
    pub status: HashMap<String, Value>,
    /// Command code → definition.
    pub function: HashMap<String, DeviceFunction>,
    /// Status code → value range.
    pub status_range: HashMap<String, StatusRange>,
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Device {}

impl Device {
    /// Merge `{code, value}` pairs into `status`. Unknown codes are added.
    pub fn apply_status(&mut self, entries: &[StatusEntry]) {
        for entry in entries {
            self.status.insert(entry.code.clone(), entry.value.clone());
        }
    }

    /// Replace `function` and `status_range` from a specification.
    pub fn set_specification(&mut self, spec: Specification) {
        self.function = spec
            .functions
            .into_iter()
            .map(|f| (f.code.clone(), f))
            .collect();
        self.status_range = spec
            .status
            .into_iter()
            .map(|s| (s.code.clone(), s))
            .collect();
    }
}

impl From<DeviceInfo> for Device {
    fn from(info: DeviceInfo) -> Self {
        let mut device = Self {
            id: info.id,
            name: info.name,
            local_key: info.local_key,
            category: info.category,
            product_id: info.product_id,
            product_name: info.product_name,
            sub: info.sub,
            uuid: info.uuid,
            asset_id: info.asset_id,
            online: info.online,
            icon: info.icon,
            ip: info.ip,
            lat: info.lat,
            lon: info.lon,
            time_zone: info.time_zone,
            active_time: info.active_time,
            create_time: info.create_time,
            update_time: info.update_time,
            status: HashMap::new(),
            function: HashMap::new(),
            status_range: HashMap::new(),
        };
        device.apply_status(&info.status);
        device
    }
}
