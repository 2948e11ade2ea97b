mod hotplug;
mod usb;

pub use hotplug::UsbWatcher;
