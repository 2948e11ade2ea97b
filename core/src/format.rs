use crate::record::DeviceRecord;

/// Header line printed before the initial device listing.
pub const ENUMERATION_BANNER: &str = "=== Current USB Devices ===";

const SEPARATOR_LEN: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeviceEventKind {
    /// Device was already attached when monitoring started.
    Present,
    Connected,
    Disconnected,
}

/// Formats a device observation into the message shown in the window.
/// Disconnect messages carry no `Status:` line; a device that is gone has
/// no status to report.
pub fn format_event(kind: DeviceEventKind, record: &DeviceRecord) -> String {
    let header = match kind {
        DeviceEventKind::Present => "Device Found:",
        DeviceEventKind::Connected => "New Device Connected:",
        DeviceEventKind::Disconnected => "Device Disconnected:",
    };
    let mut msg = format!(
        "{}\nName: {}\nVendor ID: {}\n",
        header, record.name, record.vendor_id
    );
    if kind != DeviceEventKind::Disconnected {
        msg.push_str(&format!("Status: {}\n", record.status));
    }
    msg.push_str(&"-".repeat(SEPARATOR_LEN));
    msg
}
