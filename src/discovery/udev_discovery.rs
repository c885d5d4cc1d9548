use super::descriptor::report_ids;
use super::{parse_hid_id, DeviceDiscovery, DeviceInfo, DiscoveryError, SYNAPTICS_VENDOR_ID};
use std::fs;
use std::path::PathBuf;

pub struct UdevDiscovery;

impl DeviceDiscovery for UdevDiscovery {
    fn find_rmi_devices() -> Result<Vec<DeviceInfo>, DiscoveryError> {
        let mut enumerator =
            udev::Enumerator::new().map_err(|e| DiscoveryError::Enumeration(e.to_string()))?;

        enumerator
            .match_subsystem("hidraw")
            .map_err(|e| DiscoveryError::Enumeration(e.to_string()))?;

        let mut results = Vec::new();

        for device in enumerator
            .scan_devices()
            .map_err(|e| DiscoveryError::Enumeration(e.to_string()))?
        {
            let Some(devnode) = device.devnode() else {
                continue;
            };
            let Ok(Some(hid)) = device.parent_with_subsystem("hid") else {
                continue;
            };
            let Some((vendor, product_id)) = hid
                .property_value("HID_ID")
                .and_then(|v| v.to_str())
                .and_then(parse_hid_id)
            else {
                continue;
            };
            if vendor != SYNAPTICS_VENDOR_ID {
                continue;
            }

            let desc_path = hid.syspath().join("report_descriptor");
            let desc = match fs::read(&desc_path) {
                Ok(d) => d,
                Err(e) => {
                    tracing::debug!(path = %desc_path.display(), error = %e, "no report descriptor");
                    continue;
                }
            };
            if !report_ids(&desc).is_rmi() {
                tracing::debug!(devnode = %devnode.display(), "Synaptics interface without RMI reports");
                continue;
            }

            tracing::debug!(devnode = %devnode.display(), product_id, "RMI interface found");
            results.push(DeviceInfo {
                devnode: PathBuf::from(devnode),
                product_id,
            });
        }

        if results.is_empty() {
            Err(DiscoveryError::NotFound)
        } else {
            Ok(results)
        }
    }
}
