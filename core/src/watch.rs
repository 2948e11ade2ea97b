use std::time::Duration;

use anyhow::Result;

use crate::record::DeviceRecord;

/// Access to the OS device layer. One backend per platform mechanism
/// (libusb hotplug, WMI watchers, udev, ...); the monitor loop only ever
/// talks to this trait.
///
/// Timing out while waiting is a normal, frequent outcome and is reported
/// as `Ok(None)`; `Err` is reserved for real OS-level failures. The waits
/// take `&mut self`: the monitor thread owns its watcher exclusively, so
/// backends need no internal locking around their blocking receives.
pub trait DeviceWatcher {
    /// Lists the devices attached right now.
    fn list_current(&self) -> Result<Vec<DeviceRecord>>;

    /// Blocks until a device is connected, or until the timeout elapses.
    fn wait_for_creation(&mut self, timeout: Duration) -> Result<Option<DeviceRecord>>;

    /// Blocks until a device is removed, or until the timeout elapses.
    fn wait_for_deletion(&mut self, timeout: Duration) -> Result<Option<DeviceRecord>>;
}
