// Device endpoints
//
// Info, status, specification and control calls. Paths differ per account
// mode and come from `AccountMode`; the SmartHome batch listing embeds
// status, so batch status is derived from it there.

use serde_json::{Value, json};
use tracing::debug;

use crate::client::{OpenApiClient, Query};
use crate::error::Error;
use crate::mode::AccountMode;
use crate::models::{
    CategoryFunctions, Command, DeviceBatch, DeviceInfo, DeviceListPage, DeviceStatus, FactoryInfo,
    Specification, StatusEntry,
};

/// Most ids accepted by one batch call.
pub const MAX_BATCH_IDS: usize = 20;

fn ids_query(device_ids: &[String]) -> Query {
    Query::from([("device_ids".to_owned(), device_ids.join(","))])
}

impl OpenApiClient {
    /// Get a single device.
    ///
    /// `GET /v1.0/devices/{id}` or `GET /v1.0/iot-03/devices/{id}`
    pub async fn get_device(&self, device_id: &str) -> Result<DeviceInfo, Error> {
        self.get(&self.mode().device_path(device_id), &Query::new()).await
    }

    /// Get info for up to [`MAX_BATCH_IDS`] devices.
    pub async fn get_devices(&self, device_ids: &[String]) -> Result<Vec<DeviceInfo>, Error> {
        debug!(count = device_ids.len(), "fetching device info batch");
        let path = self.mode().device_batch_path();
        let query = ids_query(device_ids);
        match self.mode() {
            AccountMode::SmartHome => {
                let batch: DeviceBatch = self.get(path, &query).await?;
                Ok(batch.devices)
            }
            AccountMode::Custom => {
                let page: DeviceListPage = self.get(path, &query).await?;
                Ok(page.list)
            }
        }
    }

    /// Get the current status of up to [`MAX_BATCH_IDS`] devices.
    pub async fn get_devices_status(&self, device_ids: &[String]) -> Result<Vec<DeviceStatus>, Error> {
        debug!(count = device_ids.len(), "fetching device status batch");
        let query = ids_query(device_ids);
        match self.mode() {
            AccountMode::SmartHome => {
                let batch: DeviceBatch = self
                    .get(self.mode().device_status_batch_path(), &query)
                    .await?;
                Ok(batch
                    .devices
                    .into_iter()
                    .map(|d| DeviceStatus {
                        id: d.id,
                        status: d.status,
                    })
                    .collect())
            }
            AccountMode::Custom => {
                self.get(self.mode().device_status_batch_path(), &query)
                    .await
            }
        }
    }

    /// Current status of one device.
    ///
    /// SmartHome has no status endpoint; the status embedded in the info
    /// record is returned instead.
    pub async fn get_device_status(&self, device_id: &str) -> Result<Vec<StatusEntry>, Error> {
        let path = self.mode().device_status_path(device_id);
        match self.mode() {
            AccountMode::SmartHome => {
                let info: DeviceInfo = self.get(&path, &Query::new()).await?;
                Ok(info.status)
            }
            AccountMode::Custom => self.get(&path, &Query::new()).await,
        }
    }

    /// Manufacturing identifiers (uuid, serial, MAC) for a batch of devices.
    pub async fn get_factory_infos(&self, device_ids: &[String]) -> Result<Vec<FactoryInfo>, Error> {
        self.get(self.mode().factory_infos_path(), &ids_query(device_ids))
            .await
    }

    /// Standard instruction set of a product category, e.g. `dj` for lights.
    pub async fn get_category_functions(&self, category: &str) -> Result<CategoryFunctions, Error> {
        self.get(&self.mode().category_functions_path(category), &Query::new())
            .await
    }

    /// Instruction set and status ranges of a device.
    pub async fn get_specification(&self, device_id: &str) -> Result<Specification, Error> {
        self.get(&self.mode().specification_path(device_id), &Query::new())
            .await
    }

    /// Instruction set only. Returned as a `Specification` with empty `status`.
    pub async fn get_functions(&self, device_id: &str) -> Result<Specification, Error> {
        self.get(&self.mode().functions_path(device_id), &Query::new())
            .await
    }

    /// Devices bound to the logged-in user (SmartHome).
    ///
    /// `GET /v1.0/users/{uid}/devices`
    pub async fn list_user_devices(&self) -> Result<Vec<DeviceInfo>, Error> {
        let uid = self.uid().ok_or(Error::NotConnected)?;
        self.get(&format!("/v1.0/users/{uid}/devices"), &Query::new())
            .await
    }

    /// Send commands to a device.
    ///
    /// `POST {device}/commands` with `{"commands": [...]}`. Returns the
    /// platform's acknowledgement flag.
    pub async fn send_commands(&self, device_id: &str, commands: &[Command]) -> Result<bool, Error> {
        debug!(device_id, count = commands.len(), "sending commands");
        let body = json!({ "commands": commands });
        self.post(&self.mode().commands_path(device_id), Some(&body))
            .await
    }

    /// Remove a device from the account.
    pub async fn remove_device(&self, device_id: &str) -> Result<(), Error> {
        debug!(device_id, "removing device");
        let _: Value = self
            .delete(&self.mode().device_path(device_id), &Query::new())
            .await?;
        Ok(())
    }

    /// Remove several devices at once. Custom accounts only.
    pub async fn remove_devices(&self, device_ids: &[String]) -> Result<(), Error> {
        let path = self.mode().batch_remove_path().ok_or(Error::Unsupported {
            operation: "batch device removal",
            mode: self.mode().as_str(),
        })?;
        debug!(count = device_ids.len(), "removing devices");
        let _: Value = self.delete(path, &ids_query(device_ids)).await?;
        Ok(())
    }

    /// Restore factory settings. SmartHome uses POST, Custom uses DELETE.
    pub async fn factory_reset(&self, device_id: &str) -> Result<(), Error> {
        debug!(device_id, "factory reset");
        let path = self.mode().factory_reset_path(device_id);
        let _: Value = match self.mode() {
            AccountMode::SmartHome => self.post(&path, None).await?,
            AccountMode::Custom => self.delete(&path, &Query::new()).await?,
        };
        Ok(())
    }
}
