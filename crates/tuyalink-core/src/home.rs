// ── Infrared hubs ──
//
// Remotes learned by the infrared hubs (category `qt`) in the registry,
// each with its button list. Smart-home accounts only.

use serde::Serialize;
use tracing::{debug, warn};

use tuyalink_api::{AccountMode, RemoteDevice, RemoteKey};

use crate::error::CoreError;
use crate::store::DeviceRegistry;

/// Category of infrared hub devices.
pub const INFRARED_HUB_CATEGORY: &str = "qt";

/// Remote category without key support (air conditioners).
const AIR_CONDITIONER_REMOTE: &str = "5";

/// One infrared hub and the remotes it has learned.
#[derive(Debug, Clone, Serialize)]
pub struct InfraredHub {
    pub infrared_id: String,
    pub remotes: Vec<LearnedRemote>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LearnedRemote {
    #[serde(flatten)]
    pub remote: RemoteDevice,
    pub keys: Vec<RemoteKey>,
}

/// Every hub in `registry` that has at least one usable remote.
///
/// A hub or remote whose listing the platform rejects is skipped; transport
/// failures abort the query.
pub async fn query_infrared(registry: &DeviceRegistry) -> Result<Vec<InfraredHub>, CoreError> {
    let api = registry.api();
    if api.mode() == AccountMode::Custom {
        return Ok(Vec::new());
    }

    let mut hub_ids: Vec<String> = registry
        .devices()
        .into_iter()
        .filter(|d| d.category == INFRARED_HUB_CATEGORY)
        .map(|d| d.id)
        .collect();
    hub_ids.sort();

    let mut hubs = Vec::new();
    for infrared_id in hub_ids {
        let listed = match api.list_remotes(&infrared_id).await {
            Ok(listed) => listed,
            Err(e @ tuyalink_api::Error::Api { .. }) => {
                warn!(infrared_id, error = %e, "skipping infrared hub");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut remotes = Vec::new();
        for remote in listed {
            if remote.category_id == AIR_CONDITIONER_REMOTE {
                debug!(remote_id = %remote.remote_id, "skipping air conditioner remote");
                continue;
            }
            match api.list_remote_keys(&infrared_id, &remote.remote_id).await {
                Ok(keys) => remotes.push(LearnedRemote { remote, keys }),
                Err(e @ tuyalink_api::Error::Api { .. }) => {
                    warn!(remote_id = %remote.remote_id, error = %e, "skipping remote");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if !remotes.is_empty() {
            hubs.push(InfraredHub { infrared_id, remotes });
        }
    }
    Ok(hubs)
}
