use once_cell::sync::Lazy;
use regex::Regex;

pub const UNKNOWN: &str = "Unknown";

/// Vendor id is the part of a platform device identifier between `VID_`
/// and the next `&`, e.g. `USB\VID_1234&PID_5678\...` -> `1234`.
static VENDOR_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"VID_([^&]*)").unwrap());

/// A single observation of a USB device. Constructed per event, formatted
/// into a message and then dropped; never persisted as structured data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRecord {
    pub name: String,
    pub vendor_id: String,
    pub status: String,
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self {
            name: UNKNOWN.into(),
            vendor_id: UNKNOWN.into(),
            status: UNKNOWN.into(),
        }
    }
}

impl DeviceRecord {
    /// Builds a record from whatever fields the OS handed over, substituting
    /// `"Unknown"` for anything missing or malformed.
    pub fn new(name: Option<String>, device_id: Option<&str>, status: Option<String>) -> Self {
        let vendor_id = device_id.and_then(vendor_id_from_device_id);
        Self {
            name: name.unwrap_or_else(|| UNKNOWN.into()),
            vendor_id: vendor_id.unwrap_or_else(|| UNKNOWN.into()),
            status: status.unwrap_or_else(|| UNKNOWN.into()),
        }
    }
}

pub fn vendor_id_from_device_id(device_id: &str) -> Option<String> {
    VENDOR_ID_RE.captures(device_id)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vendor_id_between_vid_and_ampersand() {
        let id = r"USB\VID_1234&PID_5678\5&2a1b3c4d&0&1";
        assert_eq!(vendor_id_from_device_id(id), Some("1234".to_string()));
    }

    #[test]
    fn vendor_id_without_vid_marker() {
        assert_eq!(vendor_id_from_device_id(r"USB\ROOT_HUB30\4&1a2b3c4d&0&0"), None);
    }

    #[test]
    fn vendor_id_runs_to_end_without_ampersand() {
        assert_eq!(vendor_id_from_device_id("VID_ABCD"), Some("ABCD".to_string()));
    }

    #[test]
    fn missing_fields_default_to_unknown() {
        let record = DeviceRecord::new(None, None, None);
        assert_eq!(record.name, UNKNOWN);
        assert_eq!(record.vendor_id, UNKNOWN);
        assert_eq!(record.status, UNKNOWN);
    }

    #[test]
    fn malformed_device_id_defaults_vendor_id() {
        let record = DeviceRecord::new(Some("Hub".into()), Some("garbage"), Some("OK".into()));
        assert_eq!(record.name, "Hub");
        assert_eq!(record.vendor_id, UNKNOWN);
        assert_eq!(record.status, "OK");
    }

    #[test]
    fn full_record_from_parts() {
        let record = DeviceRecord::new(
            Some("Test Device".into()),
            Some(r"USB\VID_ABCD&PID_0001"),
            Some("OK".into()),
        );
        assert_eq!(record.vendor_id, "ABCD");
    }
}
