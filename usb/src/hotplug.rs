use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use anyhow::{anyhow, bail, Context as _, Result};
use log::debug;
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};

use usbmon_core::record::DeviceRecord;
use usbmon_core::watch::DeviceWatcher;

use crate::usb::{new_ctx, EventPump};

/// libusb hotplug backend of [DeviceWatcher]. Arrival and departure
/// callbacks run on the event-pump thread and feed two channels; the waits
/// are timed receives on those channels.
pub struct UsbWatcher {
    ctx: Context,
    registration: Option<Registration<Context>>,
    created: Receiver<Device<Context>>,
    removed: Receiver<Device<Context>>,
    // dropped after the registration is gone
    pump: EventPump,
}

struct HotplugHandler {
    created: Sender<Device<Context>>,
    removed: Sender<Device<Context>>,
}

/// The callbacks run inside `handle_events` on the event-pump thread.
/// libusb allows opening a device there but not transfers: a synchronous
/// transfer would wait on event handling that only this thread performs.
/// So the callbacks only hand the device over; the record (and the product
/// string read it involves) is resolved on the monitor thread.
impl Hotplug<Context> for HotplugHandler {
    fn device_arrived(&mut self, device: Device<Context>) {
        debug!("Device arrived: {device:?}");
        let _ = self.created.send(device);
    }

    fn device_left(&mut self, device: Device<Context>) {
        debug!("Device left: {device:?}");
        let _ = self.removed.send(device);
    }
}

impl UsbWatcher {
    pub fn new() -> Result<Self> {
        if !rusb::has_hotplug() {
            bail!("libusb hotplug support is not available on this platform");
        }
        let ctx = new_ctx()?;

        let (created_tx, created_rx) = mpsc::channel();
        let (removed_tx, removed_rx) = mpsc::channel();
        // already-attached devices are reported via list_current() instead
        let registration = HotplugBuilder::new()
            .enumerate(false)
            .register(
                &ctx,
                Box::new(HotplugHandler { created: created_tx, removed: removed_tx }),
            )
            .context("Failed to register USB hotplug callback")?;

        let pump = EventPump::start(ctx.clone());
        Ok(Self {
            ctx,
            registration: Some(registration),
            created: created_rx,
            removed: removed_rx,
            pump,
        })
    }
}

impl DeviceWatcher for UsbWatcher {
    fn list_current(&self) -> Result<Vec<DeviceRecord>> {
        let devices = self.ctx.devices().context("Failed to enumerate USB devices")?;
        Ok(devices.iter().map(|dev| device_record(&dev, true)).collect())
    }

    fn wait_for_creation(&mut self, timeout: Duration) -> Result<Option<DeviceRecord>> {
        Ok(recv_with_timeout(&self.created, timeout)?
            .map(|device| device_record(&device, true)))
    }

    fn wait_for_deletion(&mut self, timeout: Duration) -> Result<Option<DeviceRecord>> {
        Ok(recv_with_timeout(&self.removed, timeout)?
            .map(|device| device_record(&device, false)))
    }
}

impl Drop for UsbWatcher {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            self.ctx.unregister_callback(registration);
        }
        self.pump.stop();
    }
}

fn recv_with_timeout<T>(rx: &Receiver<T>, timeout: Duration) -> Result<Option<T>> {
    match rx.recv_timeout(timeout) {
        Ok(value) => Ok(Some(value)),
        Err(RecvTimeoutError::Timeout) => Ok(None),
        Err(RecvTimeoutError::Disconnected) => Err(anyhow!("USB hotplug event channel closed")),
    }
}

/// Runs on the monitor thread, where blocking device I/O is expected.
fn device_record(device: &Device<Context>, attached: bool) -> DeviceRecord {
    let Ok(desc) = device.device_descriptor() else {
        return DeviceRecord::default();
    };
    let device_id = device_id_string(
        desc.vendor_id(),
        desc.product_id(),
        device.bus_number(),
        device.address(),
    );
    // Product strings require opening the device, which fails routinely for
    // devices we lack permissions for and always for detached ones.
    let name = attached
        .then(|| device.open().ok())
        .flatten()
        .and_then(|handle| handle.read_product_string_ascii(&desc).ok());
    let status = attached.then(|| "OK".to_string());
    DeviceRecord::new(name, Some(&device_id), status)
}

/// Instance-id style identifier, the shape the vendor-id parser expects:
/// `USB\VID_1234&PID_5678\001:004`.
fn device_id_string(vid: u16, pid: u16, bus: u8, address: u8) -> String {
    format!(r"USB\VID_{vid:04X}&PID_{pid:04X}\{bus:03}:{address:03}")
}
