// ── Device storage ──

pub mod registry;

pub use registry::{DEFAULT_BIND_SETTLE_DELAY, DeviceListener, DeviceRegistry};
