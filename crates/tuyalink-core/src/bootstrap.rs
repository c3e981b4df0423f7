// ── Fleet bootstrap ──
//
// Initial population of the registry. Custom projects enumerate device ids
// through the asset tree; smart-home accounts list the user's devices in
// one call that already carries status.

use tracing::info;

use tuyalink_api::AccountMode;
use tuyalink_api::assets::ROOT_ASSET_ID;

use crate::error::CoreError;
use crate::model::Device;
use crate::store::DeviceRegistry;

/// Clear `registry` and reload the whole fleet. Returns the device count.
pub async fn refresh_fleet(registry: &DeviceRegistry) -> Result<usize, CoreError> {
    registry.clear();
    let api = registry.api();

    match api.mode() {
        AccountMode::Custom => {
            let ids = api.collect_device_ids(ROOT_ASSET_ID).await?;
            registry.hydrate(&ids).await?;
        }
        AccountMode::SmartHome => {
            for info in api.list_user_devices().await? {
                registry.insert(Device::from(info));
            }
            registry.refresh_specifications(&[]).await?;
        }
    }

    let count = registry.len();
    info!(count, mode = ?api.mode(), "fleet loaded");
    Ok(count)
}
