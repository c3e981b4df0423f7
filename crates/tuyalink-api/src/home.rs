// Home endpoints (SmartHome accounts)
//
// Homes, their tap-to-run scenes, and remotes learned by infrared hubs.
// Custom projects have no homes: listings come back empty there and the
// trigger calls fail with `Error::Unsupported`.

use serde_json::{Value, json};
use tracing::debug;

use crate::client::{OpenApiClient, Query};
use crate::error::Error;
use crate::mode::AccountMode;
use crate::models::{Home, RemoteDevice, RemoteKey, RemoteKeyList, Scene};

impl OpenApiClient {
    fn require_smart_home(&self, operation: &'static str) -> Result<(), Error> {
        match self.mode() {
            AccountMode::SmartHome => Ok(()),
            mode @ AccountMode::Custom => Err(Error::Unsupported {
                operation,
                mode: mode.as_str(),
            }),
        }
    }

    /// Homes of the logged-in user.
    ///
    /// `GET /v1.0/users/{uid}/homes`
    pub async fn list_homes(&self) -> Result<Vec<Home>, Error> {
        if self.mode() == AccountMode::Custom {
            return Ok(Vec::new());
        }
        let uid = self.uid().ok_or(Error::NotConnected)?;
        self.get(&format!("/v1.0/users/{uid}/homes"), &Query::new())
            .await
    }

    /// Scenes of one home, tagged with `home_id`.
    ///
    /// `GET /v1.0/homes/{home_id}/scenes`
    pub async fn list_scenes(&self, home_id: &str) -> Result<Vec<Scene>, Error> {
        let mut scenes: Vec<Scene> = self
            .get(&format!("/v1.0/homes/{home_id}/scenes"), &Query::new())
            .await?;
        for scene in &mut scenes {
            home_id.clone_into(&mut scene.home_id);
        }
        Ok(scenes)
    }

    /// Scenes across every home of the user. Empty for Custom accounts.
    pub async fn query_scenes(&self) -> Result<Vec<Scene>, Error> {
        let mut scenes = Vec::new();
        for home in self.list_homes().await? {
            scenes.extend(self.list_scenes(&home.home_id).await?);
        }
        debug!(count = scenes.len(), "listed scenes");
        Ok(scenes)
    }

    /// Run a scene.
    ///
    /// `POST /v1.0/homes/{home_id}/scenes/{scene_id}/trigger`
    pub async fn trigger_scene(&self, home_id: &str, scene_id: &str) -> Result<bool, Error> {
        self.require_smart_home("scene trigger")?;
        debug!(home_id, scene_id, "triggering scene");
        self.post(
            &format!("/v1.0/homes/{home_id}/scenes/{scene_id}/trigger"),
            None,
        )
        .await
    }

    /// Remotes learned by the infrared hub `infrared_id`.
    ///
    /// `GET /v1.0/infrareds/{infrared_id}/remotes`
    pub async fn list_remotes(&self, infrared_id: &str) -> Result<Vec<RemoteDevice>, Error> {
        self.require_smart_home("infrared remotes")?;
        self.get(&format!("/v1.0/infrareds/{infrared_id}/remotes"), &Query::new())
            .await
    }

    /// Buttons of one learned remote.
    ///
    /// `GET /v1.0/infrareds/{infrared_id}/remotes/{remote_id}/keys`
    pub async fn list_remote_keys(&self, infrared_id: &str, remote_id: &str) -> Result<Vec<RemoteKey>, Error> {
        self.require_smart_home("infrared remotes")?;
        let keys: RemoteKeyList = self
            .get(
                &format!("/v1.0/infrareds/{infrared_id}/remotes/{remote_id}/keys"),
                &Query::new(),
            )
            .await?;
        Ok(keys.key_list)
    }

    /// Press `key` on a learned remote.
    ///
    /// `POST /v1.0/infrareds/{infrared_id}/remotes/{remote_id}/command`
    pub async fn send_infrared_key(&self, infrared_id: &str, remote_id: &str, key: &str) -> Result<(), Error> {
        self.require_smart_home("infrared command")?;
        debug!(infrared_id, remote_id, key, "sending infrared key");
        let _: Value = self
            .post(
                &format!("/v1.0/infrareds/{infrared_id}/remotes/{remote_id}/command"),
                Some(&json!({ "key": key })),
            )
            .await?;
        Ok(())
    }
}
