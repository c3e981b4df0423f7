// ── Domain model ──
//
// Types consumers work with. API records are converted on the way in so
// callers never deal with the wire shapes.

pub mod device;
pub mod event;

pub use device::Device;
pub use event::{BizCode, DeviceEvent, PROTOCOL_BUSINESS, PROTOCOL_DEVICE_REPORT};
