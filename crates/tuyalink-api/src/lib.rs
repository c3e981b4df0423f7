// tuyalink-api: Async Rust client for the Tuya open platform (signed REST + encrypted MQTT)

pub mod assets;
pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod home;
pub mod listeners;
pub mod mode;
pub mod models;
pub mod mq;
pub mod pulsar;
pub mod redact;
pub mod sign;
pub mod transport;

pub use auth::{Credential, Identity};
pub use client::{OpenApiClient, Query, TOKEN_INVALID_CODE};
pub use error::Error;
pub use listeners::{ListenerId, ListenerSet};
pub use mode::AccountMode;
pub use models::{
    CategoryFunctions, Command, DeviceFunction, DeviceInfo, DeviceStatus, FactoryInfo, Home, RemoteDevice, RemoteKey, Scene,
    Specification, StatusEntry, StatusRange,
};
pub use mq::{MessageListener, MqClient, MqMessage, MqSettings};
pub use pulsar::{PulsarClient, PulsarEndpoint, PulsarListener, PulsarMessage, PulsarSettings, PulsarTopic};
pub use transport::TransportConfig;
