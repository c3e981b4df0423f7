// ── Session facade ──
//
// Owns the three long-lived pieces of a connection: the REST client, the
// broker ingestion loop and the device registry. `connect` logs in and
// loads the fleet; `listen` starts event ingestion; `shutdown` tears the
// broker loop down.

use std::sync::Arc;

use tracing::info;

use tuyalink_api::{Command, MqClient, OpenApiClient, Scene};

use crate::bootstrap::refresh_fleet;
use crate::config::ConnectConfig;
use crate::error::CoreError;
use crate::home::{InfraredHub, query_infrared};
use crate::model::Device;
use crate::store::DeviceRegistry;

pub struct Session {
    api: Arc<OpenApiClient>,
    mq: MqClient,
    registry: Arc<DeviceRegistry>,
}

impl Session {
    /// Log in and load the device fleet. Event ingestion is not started.
    pub async fn connect(config: &ConnectConfig) -> Result<Self, CoreError> {
        let api = Arc::new(config.build_client()?);
        api.connect(config.identity.clone()).await?;
        info!(endpoint = %config.endpoint, mode = ?config.mode, "logged in");

        let session = Self::from_client(api, config);
        refresh_fleet(&session.registry).await?;
        Ok(session)
    }

    /// Assemble a session around an already authenticated client.
    pub fn from_client(api: Arc<OpenApiClient>, config: &ConnectConfig) -> Self {
        let mq = MqClient::with_settings(Arc::clone(&api), config.mq.clone());
        let registry = DeviceRegistry::new(Arc::clone(&api));
        Self { api, mq, registry }
    }

    pub fn api(&self) -> &Arc<OpenApiClient> {
        &self.api
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn mq(&self) -> &MqClient {
        &self.mq
    }

    pub fn devices(&self) -> Vec<Device> {
        self.registry.devices()
    }

    /// Route broker events into the registry and start ingestion.
    pub fn listen(&self) {
        self.registry.attach(&self.mq);
        self.mq.start();
    }

    /// Reload every device from the platform.
    pub async fn refresh(&self) -> Result<usize, CoreError> {
        refresh_fleet(&self.registry).await
    }

    pub async fn send_commands(&self, device_id: &str, commands: &[Command]) -> Result<bool, CoreError> {
        self.registry.send_commands(device_id, commands).await
    }

    /// Scenes across every home. Empty for custom projects.
    pub async fn scenes(&self) -> Result<Vec<Scene>, CoreError> {
        Ok(self.api.query_scenes().await?)
    }

    pub async fn trigger_scene(&self, home_id: &str, scene_id: &str) -> Result<bool, CoreError> {
        Ok(self.api.trigger_scene(home_id, scene_id).await?)
    }

    pub async fn infrared(&self) -> Result<Vec<InfraredHub>, CoreError> {
        query_infrared(&self.registry).await
    }

    pub async fn send_infrared_key(&self, infrared_id: &str, remote_id: &str, key: &str) -> Result<(), CoreError> {
        Ok(self.api.send_infrared_key(infrared_id, remote_id, key).await?)
    }

    pub async fn shutdown(&self) {
        self.registry.detach(&self.mq);
        self.mq.stop().await;
        info!("session closed");
    }
}
