pub mod data;
pub mod device;

pub use data::{AlertCondition, AlertRecord, AlertStatus, Command, TelemetryUpdate};
pub use device::{
    Device, DeviceKind, DeviceSpec, DeviceStatus, Thresholds, Transport, TransportBinding,
};
