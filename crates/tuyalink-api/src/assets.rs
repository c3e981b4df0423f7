// Asset endpoints (Custom accounts)
//
// Custom projects organise devices in an asset tree rooted at `-1`. Both
// listings are cursor-paginated with `last_row_key` and `has_next`.

use tracing::debug;

use crate::client::{OpenApiClient, Query};
use crate::error::Error;
use crate::models::{Asset, AssetDeviceRef, AssetPage};

/// Id of the implicit root asset.
pub const ROOT_ASSET_ID: &str = "-1";

const PAGE_SIZE: &str = "100";

impl OpenApiClient {
    /// All device ids directly under `asset_id`.
    ///
    /// `GET /v1.0/iot-02/assets/{id}/devices`, following `has_next`.
    /// Fails if the platform hands back more ids than it announced in
    /// `total_size`.
    pub async fn list_asset_devices(&self, asset_id: &str) -> Result<Vec<String>, Error> {
        let path = format!("/v1.0/iot-02/assets/{asset_id}/devices");
        let mut ids = Vec::new();
        let mut last_row_key = String::new();

        loop {
            let query = Query::from([
                ("last_row_key".to_owned(), last_row_key.clone()),
                ("page_size".to_owned(), PAGE_SIZE.to_owned()),
            ]);
            let page: AssetPage<AssetDeviceRef> = self.get(&path, &query).await?;

            if ids.len() > page.total_size {
                return Err(Error::Pagination(format!(
                    "asset {asset_id}: received {} device ids, total_size is {}",
                    ids.len(),
                    page.total_size
                )));
            }
            ids.extend(page.list.into_iter().map(|d| d.device_id));

            if !page.has_next {
                break;
            }
            last_row_key = page.last_row_key;
        }

        debug!(asset_id, count = ids.len(), "listed asset devices");
        Ok(ids)
    }

    /// Direct children of `parent_asset_id`.
    ///
    /// `GET /v1.0/iot-02/assets/{parent}/sub-assets`
    pub async fn list_sub_assets(&self, parent_asset_id: &str) -> Result<Vec<Asset>, Error> {
        let path = format!("/v1.0/iot-02/assets/{parent_asset_id}/sub-assets");
        let mut assets = Vec::new();
        let mut last_row_key = String::new();

        loop {
            let query = Query::from([
                ("asset_id".to_owned(), parent_asset_id.to_owned()),
                ("last_row_key".to_owned(), last_row_key.clone()),
                ("page_size".to_owned(), PAGE_SIZE.to_owned()),
            ]);
            let page: AssetPage<Asset> = self.get(&path, &query).await?;
            assets.extend(page.list);

            if !page.has_next {
                break;
            }
            last_row_key = page.last_row_key;
        }
        Ok(assets)
    }

    /// Depth-first walk from `root`, collecting every device id below it.
    ///
    /// The implicit root [`ROOT_ASSET_ID`] holds no devices of its own and
    /// is only used to enumerate its children.
    pub async fn collect_device_ids(&self, root: &str) -> Result<Vec<String>, Error> {
        let mut ids = Vec::new();
        let mut pending = vec![root.to_owned()];

        while let Some(asset_id) = pending.pop() {
            if asset_id != ROOT_ASSET_ID {
                ids.extend(self.list_asset_devices(&asset_id).await?);
            }
            let children = self.list_sub_assets(&asset_id).await?;
            // Reverse so the first child is visited next.
            pending.extend(children.into_iter().rev().map(|a| a.asset_id));
        }
        Ok(ids)
    }
}
