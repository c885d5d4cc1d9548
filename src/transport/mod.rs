#[cfg(target_os = "linux")]
pub mod hidraw;
#[cfg(test)]
pub mod mock;
#[cfg(target_os = "windows")]
pub mod windows_hid;

use std::io;

/// I2C-HID command register; feature SET_REPORT requests are written here.
pub const COMMAND_REGISTER: u8 = 0x22;
/// I2C-HID output register; RMI write/read-address reports are written here.
pub const OUTPUT_REGISTER: u8 = 0x25;

/// Bytes of framing in front of an output report: length (u16 LE) + pad.
pub const OUTPUT_HEADER_LEN: usize = 3;
/// Offset of the feature report (id + payload) inside a SET_REPORT command.
pub const SET_REPORT_PAYLOAD_OFFSET: usize = 8;

/// One RMI input report as carried on the bus.
pub const RMI_REPORT_LEN: usize = 40;
/// One input transaction: 2-byte little-endian length header + RMI report.
pub const INPUT_TRANSACTION_LEN: usize = RMI_REPORT_LEN + 2;

/// Synchronous bus access used by the RMI register client and the
/// attention-report reader.
pub trait RmiTransport {
    /// Write a fully framed command to the given I2C-HID register.
    fn write_command(&self, register: u8, buf: &[u8]) -> io::Result<()>;

    /// Block until one input transaction is available and copy it into `buf`.
    fn read_input(&self, buf: &mut [u8; INPUT_TRANSACTION_LEN]) -> io::Result<()>;
}

/// Split the 40-byte RMI report out of an input transaction.
pub fn rmi_report(transaction: &[u8; INPUT_TRANSACTION_LEN]) -> [u8; RMI_REPORT_LEN] {
    let mut report = [0u8; RMI_REPORT_LEN];
    report.copy_from_slice(&transaction[2..]);
    report
}
