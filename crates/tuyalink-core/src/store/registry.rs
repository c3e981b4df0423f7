// ── Device registry ──
//
// Authoritative in-memory map of the fleet. REST snapshots replace entries
// wholesale; broker events patch them. One mutex guards the map and every
// read-modify-write happens inside a single lock scope. Listeners are
// notified after the lock is released, with a clone of the affected device.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tracing::{debug, info, warn};

use tuyalink_api::devices::MAX_BATCH_IDS;
use tuyalink_api::{Command, ListenerId, ListenerSet, MqClient, MqMessage, OpenApiClient};

use crate::error::CoreError;
use crate::model::{BizCode, Device, DeviceEvent};

/// Default wait before fetching a freshly bound device.
pub const DEFAULT_BIND_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Observer of registry membership and device changes.
///
/// Called synchronously on the thread applying the change.
pub trait DeviceListener: Send + Sync {
    fn add_device(&self, device: &Device);
    fn update_device(&self, device: &Device);
    fn remove_device(&self, device_id: &str);
}

/// The authoritative device map.
pub struct DeviceRegistry {
    api: Arc<OpenApiClient>,
    devices: Mutex<HashMap<String, Device>>,
    listeners: ListenerSet<dyn DeviceListener>,
    bind_settle_delay: Duration,
    attachment: Mutex<Option<ListenerId>>,
}

impl DeviceRegistry {
    pub fn new(api: Arc<OpenApiClient>) -> Arc<Self> {
        Self::with_bind_delay(api, DEFAULT_BIND_SETTLE_DELAY)
    }

    /// Like [`new`](Self::new) with a custom settle delay for `bindUser`.
    pub fn with_bind_delay(api: Arc<OpenApiClient>, bind_settle_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            api,
            devices: Mutex::new(HashMap::new()),
            listeners: ListenerSet::new(),
            bind_settle_delay,
            attachment: Mutex::new(None),
        })
    }

    pub fn api(&self) -> &Arc<OpenApiClient> {
        &self.api
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn get(&self, device_id: &str) -> Option<Device> {
        self.lock().get(device_id).cloned()
    }

    /// Snapshot of every device, sorted by id.
    pub fn devices(&self) -> Vec<Device> {
        let mut all: Vec<Device> = self.lock().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, device_id: &str) -> bool {
        self.lock().contains_key(device_id)
    }

    /// Drop every device without notifying listeners.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Insert or replace a device without notifying listeners.
    pub fn insert(&self, device: Device) {
        self.lock().insert(device.id.clone(), device);
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Arc<dyn DeviceListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Route `mq`'s messages into this registry.
    ///
    /// The subscription holds only a weak reference; dropping the registry
    /// turns it into a no-op.
    pub fn attach(self: &Arc<Self>, mq: &MqClient) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let id = mq.add_message_listener(Arc::new(move |message: &MqMessage| {
            if let Some(registry) = weak.upgrade() {
                registry.handle_message(message);
            }
        }));
        if let Some(previous) = self.attachment_lock().replace(id) {
            mq.remove_message_listener(previous);
        }
    }

    pub fn detach(&self, mq: &MqClient) {
        if let Some(id) = self.attachment_lock().take() {
            mq.remove_message_listener(id);
        }
    }

    // ── Hydration ────────────────────────────────────────────────────

    /// Fetch info, status and specification for `device_ids` and replace
    /// the corresponding entries.
    ///
    /// Works in batches of [`MAX_BATCH_IDS`]. Does not notify listeners.
    pub async fn hydrate(&self, device_ids: &[String]) -> Result<(), CoreError> {
        for batch in device_ids.chunks(MAX_BATCH_IDS) {
            let infos = self.api.get_devices(batch).await?;
            let statuses = self.api.get_devices_status(batch).await?;

            {
                let mut devices = self.lock();
                for info in infos {
                    devices.insert(info.id.clone(), Device::from(info));
                }
                for snapshot in statuses {
                    if let Some(device) = devices.get_mut(&snapshot.id) {
                        device.apply_status(&snapshot.status);
                    }
                }
            }

            self.refresh_specifications(batch).await?;
            debug!(count = batch.len(), "hydrated device batch");
        }
        Ok(())
    }

    /// Fetch and attach specifications for `device_ids`, or for every
    /// device when the slice is empty.
    pub async fn refresh_specifications(&self, device_ids: &[String]) -> Result<(), CoreError> {
        let targets: Vec<String> = {
            let devices = self.lock();
            if device_ids.is_empty() {
                devices.keys().cloned().collect()
            } else {
                device_ids
                    .iter()
                    .filter(|id| devices.contains_key(id.as_str()))
                    .cloned()
                    .collect()
            }
        };

        for id in targets {
            let spec = self.api.get_specification(&id).await?;
            if let Some(device) = self.lock().get_mut(&id) {
                device.set_specification(spec);
            }
        }
        Ok(())
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Send commands to a registered device.
    pub async fn send_commands(&self, device_id: &str, commands: &[Command]) -> Result<bool, CoreError> {
        if !self.contains(device_id) {
            return Err(CoreError::DeviceNotFound {
                identifier: device_id.into(),
            });
        }
        Ok(self.api.send_commands(device_id, commands).await?)
    }

    // ── Event application ────────────────────────────────────────────

    /// Apply one decoded broker message.
    ///
    /// `bindUser` is handled on a spawned task after the settle delay, so
    /// this must run inside a tokio runtime.
    pub fn handle_message(self: &Arc<Self>, message: &MqMessage) {
        match DeviceEvent::from_message(message) {
            DeviceEvent::StatusReport { device_id, status } => {
                self.update_with(&device_id, |d| d.apply_status(&status));
            }
            DeviceEvent::Business {
                device_id,
                code,
                name,
            } => self.handle_business(device_id, code, name),
            DeviceEvent::Ignored => {
                debug!(protocol = message.protocol, "ignoring message");
            }
        }
    }

    fn handle_business(self: &Arc<Self>, device_id: String, code: BizCode, name: Option<String>) {
        match code {
            BizCode::Online => self.update_with(&device_id, |d| d.online = true),
            BizCode::Offline => self.update_with(&device_id, |d| d.online = false),
            BizCode::NameUpdate => match name {
                Some(name) => self.update_with(&device_id, |d| d.name = name),
                None => debug!(device_id, "nameUpdate without a name"),
            },
            BizCode::Delete => self.remove(&device_id),
            BizCode::BindUser => {
                let registry = Arc::clone(self);
                tokio::spawn(async move {
                    tokio::time::sleep(registry.bind_settle_delay).await;
                    if let Err(e) = registry.bind(&device_id).await {
                        warn!(device_id, error = %e, "failed to fetch bound device");
                    }
                });
            }
            BizCode::DpNameUpdate | BizCode::P2pSignal | BizCode::Other(_) => {
                debug!(device_id, code = %code, "ignoring business event");
            }
        }
    }

    /// Hydrate a newly bound device and announce it.
    pub async fn bind(&self, device_id: &str) -> Result<(), CoreError> {
        self.hydrate(&[device_id.to_owned()]).await?;
        match self.get(device_id) {
            Some(device) => {
                info!(device_id, "device bound");
                self.listeners.notify(|l| l.add_device(&device));
            }
            None => debug!(device_id, "bound device not returned by the platform"),
        }
        Ok(())
    }

    /// Run `mutate` on a registered device and notify "update".
    /// Events for unknown devices are dropped.
    fn update_with(&self, device_id: &str, mutate: impl FnOnce(&mut Device)) {
        let updated = {
            let mut devices = self.lock();
            devices.get_mut(device_id).map(|device| {
                mutate(device);
                device.clone()
            })
        };

        match updated {
            Some(device) => self.listeners.notify(|l| l.update_device(&device)),
            None => debug!(device_id, "event for unknown device dropped"),
        }
    }

    fn remove(&self, device_id: &str) {
        let removed = self.lock().remove(device_id);
        if removed.is_some() {
            info!(device_id, "device removed");
            self.listeners.notify(|l| l.remove_device(device_id));
        } else {
            debug!(device_id, "delete for unknown device dropped");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Device>> {
        self.devices.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn attachment_lock(&self) -> MutexGuard<'_, Option<ListenerId>> {
        self.attachment.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
