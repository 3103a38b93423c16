use device_core::{Device, DeviceId, DeviceMode, Phase};
use serde::{Deserialize, Serialize};

/// Authority-side view of one device, returned by queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub id: DeviceId,
    pub mode: DeviceMode,
    pub phase: Phase,
    pub busy: bool,
}

impl From<&Device> for DeviceStatus {
    fn from(device: &Device) -> Self {
        Self {
            id: device.id(),
            mode: device.mode(),
            phase: device.phase(),
            busy: device.is_busy(),
        }
    }
}
