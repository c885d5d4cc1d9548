pub mod f01;
pub mod f11;
pub mod f30;
pub mod frame;
pub mod pdt;
pub mod protocol;
pub mod query;

use crate::transport::RmiTransport;
use f01::DeviceControl;
use f11::SensorCapabilities;
use f30::ButtonLayout;
use pdt::{FunctionDescriptor, F01_DEVICE_CONTROL};
use protocol::{RmiClient, RmiMode};
use std::io;

#[derive(Debug)]
pub enum RmiError {
    Transport(io::Error),
    MissingFunction(u8),
    NoAbsoluteReporting,
    BlockTooLong { len: usize, max: usize },
}

impl std::fmt::Display for RmiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RmiError::Transport(e) => write!(f, "transport error: {}", e),
            RmiError::MissingFunction(n) => write!(f, "required function F{:02X} not found", n),
            RmiError::NoAbsoluteReporting => write!(f, "sensor does not report absolute positions"),
            RmiError::BlockTooLong { len, max } => {
                write!(f, "register block of {} bytes exceeds {} byte limit", len, max)
            }
        }
    }
}

impl std::error::Error for RmiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RmiError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for RmiError {
    fn from(e: io::Error) -> Self {
        RmiError::Transport(e)
    }
}

/// Everything learned about the touchpad during initialisation.
#[derive(Debug, Clone)]
pub struct DeviceLayout {
    pub f01: FunctionDescriptor,
    pub f11: FunctionDescriptor,
    pub f30: FunctionDescriptor,
    pub interrupt_enable_mask: u32,
    pub control: DeviceControl,
    pub sensor: SensorCapabilities,
    pub buttons: ButtonLayout,
}

/// Discover the function blocks and configure them. Leaves the device in
/// RMI mode `Off`; attention reporting is enabled by the caller.
pub fn populate<T: RmiTransport>(client: &mut RmiClient<T>) -> Result<DeviceLayout, RmiError> {
    client.set_mode(RmiMode::Off)?;

    let table = pdt::scan(client)?;
    let f01 = table
        .f01
        .ok_or(RmiError::MissingFunction(F01_DEVICE_CONTROL))?;
    let control = f01::populate(client, &f01, table.interrupt_enable_mask)?;
    let sensor = f11::populate(client, table.f11.as_ref())?;
    let buttons = f30::populate(client, table.f30.as_ref())?;

    // populate has already rejected missing blocks
    let mut f11 = table.f11.unwrap_or_default();
    let mut f30 = table.f30.unwrap_or_default();
    f11.report_size = sensor.report_size;
    f30.report_size = buttons.bytes_per_ctrl;

    Ok(DeviceLayout {
        f01,
        f11,
        f30,
        interrupt_enable_mask: table.interrupt_enable_mask,
        control,
        sensor,
        buttons,
    })
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::transport::mock::MockTransport;

    pub const F11_QUERY: u16 = 0x0020;
    pub const F11_CTRL: u16 = 0x0060;
    pub const F30_QUERY: u16 = 0x0105;
    pub const F30_CTRL: u16 = 0x0107;

    /// A five-finger clickpad: F01 (1 irq), F11 (1 irq), F30 on page 1
    /// (1 irq) with a single button on GPIO bit 1.
    pub fn clickpad(max_x: u16, max_y: u16) -> MockTransport {
        let mock = MockTransport::new();
        mock.set_block(0x00e9, &[0x10, 0x00, 0x50, 0x58, 1, 0x01]);
        mock.set_block(0x00e3, &[0x20, 0x00, 0x60, 0x70, 1, 0x11]);
        mock.set_block(0x01e9, &[0x05, 0x00, 0x07, 0x09, 1, 0x30]);

        mock.set_block(0x0010 + 11, b"TM3096");
        mock.set_block(0x0050, &[0x00, 0x07]);

        mock.set_register(F11_QUERY + 1, 0x04 | 1 << 4);
        mock.set_block(F11_CTRL + 6, &max_x.to_le_bytes());
        mock.set_block(F11_CTRL + 8, &max_y.to_le_bytes());

        mock.set_block(F30_QUERY, &[1 << 3, 2]);
        mock.set_block(F30_CTRL + 1, &[0b00, 0b10]);
        mock
    }
}
