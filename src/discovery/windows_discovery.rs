use super::{DeviceDiscovery, DeviceInfo, DiscoveryError, SYNAPTICS_VENDOR_ID};
use std::path::PathBuf;
use windows::core::{GUID, PCWSTR};
use windows::Win32::Devices::DeviceAndDriverInstallation::*;
use windows::Win32::Devices::HumanInterfaceDevice::*;
use windows::Win32::Foundation::*;
use windows::Win32::Storage::FileSystem::*;

/// Vendor-defined usage pages start here; the RMI collection lives in one.
const VENDOR_USAGE_PAGE: u16 = 0xff00;

pub struct WindowsDiscovery;

impl DeviceDiscovery for WindowsDiscovery {
    fn find_rmi_devices() -> Result<Vec<DeviceInfo>, DiscoveryError> {
        let hid_guid = unsafe { HidD_GetHidGuid() };
        let set = InterfaceSet::present(&hid_guid)?;

        let results: Vec<DeviceInfo> = set
            .paths(&hid_guid)
            .filter_map(|path| {
                let info = inspect(&path)?;
                tracing::debug!(devnode = %path, product_id = info.product_id, "RMI interface found");
                Some(info)
            })
            .collect();

        if results.is_empty() {
            Err(DiscoveryError::NotFound)
        } else {
            Ok(results)
        }
    }
}

/// Present HID device interfaces; the list is destroyed on drop.
struct InterfaceSet(HDEVINFO);

impl InterfaceSet {
    fn present(guid: &GUID) -> Result<Self, DiscoveryError> {
        unsafe {
            SetupDiGetClassDevsW(
                Some(guid),
                PCWSTR::null(),
                None,
                DIGCF_PRESENT | DIGCF_DEVICEINTERFACE,
            )
        }
        .map(InterfaceSet)
        .map_err(|e| DiscoveryError::Enumeration(format!("SetupDiGetClassDevsW: {}", e)))
    }

    fn paths<'a>(&'a self, guid: &'a GUID) -> impl Iterator<Item = String> + 'a {
        (0u32..)
            .map_while(move |index| {
                let mut data = SP_DEVICE_INTERFACE_DATA {
                    cbSize: std::mem::size_of::<SP_DEVICE_INTERFACE_DATA>() as u32,
                    ..Default::default()
                };
                unsafe { SetupDiEnumDeviceInterfaces(self.0, None, guid, index, &mut data) }
                    .ok()
                    .map(|()| data)
            })
            .filter_map(move |mut data| self.detail_path(&mut data))
    }

    fn detail_path(&self, data: &mut SP_DEVICE_INTERFACE_DATA) -> Option<String> {
        let mut needed = 0u32;
        let _ = unsafe {
            SetupDiGetDeviceInterfaceDetailW(self.0, data, None, 0, Some(&mut needed), None)
        };
        if needed == 0 {
            return None;
        }

        // u32 backing keeps the detail struct aligned
        let mut buf = vec![0u32; (needed as usize).div_ceil(4)];
        let detail = buf.as_mut_ptr() as *mut SP_DEVICE_INTERFACE_DETAIL_DATA_W;
        unsafe {
            // cbSize is the fixed part of the struct, not the buffer
            (*detail).cbSize = std::mem::size_of::<SP_DEVICE_INTERFACE_DETAIL_DATA_W>() as u32;
            SetupDiGetDeviceInterfaceDetailW(self.0, data, Some(detail), needed, None, None)
                .ok()?;
            Some(wide_to_string(std::ptr::addr_of!((*detail).DevicePath) as *const u16))
        }
    }
}

impl Drop for InterfaceSet {
    fn drop(&mut self) {
        let _ = unsafe { SetupDiDestroyDeviceInfoList(self.0) };
    }
}

/// Zero-access handle, enough for attribute and capability queries.
struct QueryHandle(HANDLE);

impl QueryHandle {
    fn open(path: &str) -> Option<Self> {
        let wide: Vec<u16> = path.encode_utf16().chain(std::iter::once(0)).collect();
        unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                0,
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            )
        }
        .ok()
        .map(QueryHandle)
    }

    fn attributes(&self) -> Option<HIDD_ATTRIBUTES> {
        let mut attributes = HIDD_ATTRIBUTES {
            Size: std::mem::size_of::<HIDD_ATTRIBUTES>() as u32,
            ..Default::default()
        };
        unsafe { HidD_GetAttributes(self.0, &mut attributes) }.then_some(attributes)
    }

    fn usage_page(&self) -> Option<u16> {
        let mut preparsed = PHIDP_PREPARSED_DATA::default();
        if !unsafe { HidD_GetPreparsedData(self.0, &mut preparsed) } {
            return None;
        }
        let mut caps = HIDP_CAPS::default();
        let status = unsafe { HidP_GetCaps(preparsed, &mut caps) };
        let _ = unsafe { HidD_FreePreparsedData(preparsed) };
        (status == HIDP_STATUS_SUCCESS).then_some(caps.UsagePage)
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        let _ = unsafe { CloseHandle(self.0) };
    }
}

/// A Synaptics interface whose top-level collection is vendor defined.
fn inspect(path: &str) -> Option<DeviceInfo> {
    let handle = QueryHandle::open(path)?;
    let attributes = handle.attributes()?;
    if attributes.VendorID != SYNAPTICS_VENDOR_ID {
        return None;
    }
    if handle.usage_page()? < VENDOR_USAGE_PAGE {
        return None;
    }
    Some(DeviceInfo {
        devnode: PathBuf::from(path),
        product_id: attributes.ProductID,
    })
}

unsafe fn wide_to_string(ptr: *const u16) -> String {
    let len = (0..).take_while(|&i| *ptr.add(i) != 0).count();
    String::from_utf16_lossy(std::slice::from_raw_parts(ptr, len))
}
