pub mod descriptor;
#[cfg(target_os = "linux")]
pub mod udev_discovery;
#[cfg(target_os = "windows")]
pub mod windows_discovery;

use std::path::PathBuf;

pub const SYNAPTICS_VENDOR_ID: u16 = 0x06cb;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub devnode: PathBuf,
    pub product_id: u16,
}

#[derive(Debug)]
pub enum DiscoveryError {
    Enumeration(String),
    NotFound,
}

impl std::fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiscoveryError::Enumeration(msg) => write!(f, "device enumeration failed: {}", msg),
            DiscoveryError::NotFound => write!(f, "no Synaptics RMI touchpad found"),
        }
    }
}

impl std::error::Error for DiscoveryError {}

pub trait DeviceDiscovery {
    /// HID interfaces from Synaptics that carry the RMI register reports.
    fn find_rmi_devices() -> Result<Vec<DeviceInfo>, DiscoveryError>;
}

/// Parse the vendor and product out of a udev `HID_ID` value
/// (`bus:vendor:product`, hex).
pub fn parse_hid_id(value: &str) -> Option<(u16, u16)> {
    let mut parts = value.split(':');
    let _bus = parts.next()?;
    let vendor = u32::from_str_radix(parts.next()?, 16).ok()?;
    let product = u32::from_str_radix(parts.next()?, 16).ok()?;
    Some((u16::try_from(vendor).ok()?, u16::try_from(product).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hid_id_parsing() {
        assert_eq!(parse_hid_id("0018:000006CB:00007E7E"), Some((0x06cb, 0x7e7e)));
        assert_eq!(parse_hid_id("0018:000006CB"), None);
        assert_eq!(parse_hid_id("0018:0001000000:0001"), None);
        assert_eq!(parse_hid_id("garbage"), None);
    }
}
