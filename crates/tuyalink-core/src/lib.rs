//! Device state layer between `tuyalink-api` and consumers.
//!
//! - **[`DeviceRegistry`]** keeps the authoritative map of devices. REST
//!   snapshots replace entries; decoded broker events patch them and fan out
//!   to [`DeviceListener`]s.
//! - **[`refresh_fleet`]** loads the whole fleet, choosing between the asset
//!   walk (custom projects) and the user device listing (smart-home apps).
//! - **[`Session`]** ties the REST client, the broker loop and the registry
//!   together for one connection.
//! - **[`query_infrared`]** gathers the remotes learned by infrared hubs.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod home;
pub mod model;
pub mod session;
pub mod store;

pub use bootstrap::refresh_fleet;
pub use config::ConnectConfig;
pub use error::CoreError;
pub use home::{InfraredHub, LearnedRemote, query_infrared};
pub use model::{BizCode, Device, DeviceEvent};
pub use session::Session;
pub use store::{DEFAULT_BIND_SETTLE_DELAY, DeviceListener, DeviceRegistry};

pub use tuyalink_api::{AccountMode, Command, Identity, Scene};
