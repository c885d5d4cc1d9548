use super::{
    RmiTransport, COMMAND_REGISTER, INPUT_TRANSACTION_LEN, OUTPUT_HEADER_LEN, OUTPUT_REGISTER,
    SET_REPORT_PAYLOAD_OFFSET,
};
use std::io;
use std::path::Path;
use windows::core::PCWSTR;
use windows::Win32::Devices::HumanInterfaceDevice::*;
use windows::Win32::Foundation::*;
use windows::Win32::Storage::FileSystem::*;

/// RMI transport over a Windows HID collection handle.
pub struct WinHidTransport {
    handle: HANDLE,
}

// The handle is only used through synchronous HidD_*/ReadFile calls.
unsafe impl Send for WinHidTransport {}

impl WinHidTransport {
    pub fn open(path: &Path) -> io::Result<Self> {
        let wide: Vec<u16> = path
            .to_string_lossy()
            .encode_utf16()
            .chain(std::iter::once(0))
            .collect();

        let handle = unsafe {
            CreateFileW(
                PCWSTR(wide.as_ptr()),
                0x80000000 | 0x40000000, // GENERIC_READ | GENERIC_WRITE
                FILE_SHARE_READ | FILE_SHARE_WRITE,
                None,
                OPEN_EXISTING,
                FILE_FLAGS_AND_ATTRIBUTES(0),
                None,
            )
        }
        .map_err(|e| io::Error::new(io::ErrorKind::PermissionDenied, e.to_string()))?;

        Ok(Self { handle })
    }
}

impl Drop for WinHidTransport {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.handle);
        }
    }
}

impl RmiTransport for WinHidTransport {
    fn write_command(&self, register: u8, buf: &[u8]) -> io::Result<()> {
        let (report, ok) = match register {
            COMMAND_REGISTER => {
                let report = buf.get(SET_REPORT_PAYLOAD_OFFSET..).unwrap_or_default();
                let ok = unsafe {
                    HidD_SetFeature(
                        self.handle,
                        report.as_ptr() as *const std::ffi::c_void,
                        report.len() as u32,
                    )
                };
                (report, ok)
            }
            OUTPUT_REGISTER => {
                let report = buf.get(OUTPUT_HEADER_LEN..).unwrap_or_default();
                let ok = unsafe {
                    HidD_SetOutputReport(
                        self.handle,
                        report.as_ptr() as *const std::ffi::c_void,
                        report.len() as u32,
                    )
                };
                (report, ok)
            }
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::Unsupported,
                    format!("unsupported I2C-HID register 0x{:02X}", other),
                ))
            }
        };
        if ok {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "HID write of report 0x{:02X} failed",
                report.first().copied().unwrap_or(0)
            )))
        }
    }

    fn read_input(&self, buf: &mut [u8; INPUT_TRANSACTION_LEN]) -> io::Result<()> {
        buf.fill(0);
        let mut read = 0u32;
        unsafe { ReadFile(self.handle, Some(&mut buf[2..]), Some(&mut read), None) }
            .map_err(|e| io::Error::other(format!("ReadFile: {}", e)))?;
        let len = (read as u16).saturating_add(2);
        buf[..2].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}
