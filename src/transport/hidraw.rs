use super::{
    RmiTransport, COMMAND_REGISTER, INPUT_TRANSACTION_LEN, OUTPUT_HEADER_LEN, OUTPUT_REGISTER,
    RMI_REPORT_LEN, SET_REPORT_PAYLOAD_OFFSET,
};
use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

// HIDIOCSFEATURE = _IOC(_IOC_WRITE|_IOC_READ, 'H', 0x06, len)
// _IOC(dir, type, nr, size) = (dir << 30) | (size << 16) | (type << 8) | nr

const IOC_WRITE: u32 = 1;
const IOC_READ: u32 = 2;

const fn ioc(dir: u32, ty: u32, nr: u32, size: u32) -> libc::c_ulong {
    ((dir << 30) | (size << 16) | (ty << 8) | nr) as libc::c_ulong
}

fn hidiocsfeature(len: u32) -> libc::c_ulong {
    ioc(IOC_WRITE | IOC_READ, b'H' as u32, 0x06, len)
}

/// How long a blocking input read waits before giving up.
const READ_TIMEOUT_MS: i32 = 1000;

/// RMI transport over a Linux hidraw node.
///
/// The kernel's i2c-hid layer owns the register framing, so the I2C-HID
/// header of each command is stripped and only the HID report is handed to
/// hidraw.
pub struct HidrawTransport {
    fd: OwnedFd,
}

impl HidrawTransport {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)?;
        Ok(Self {
            fd: OwnedFd::from(file),
        })
    }

    fn set_feature(&self, buf: &[u8]) -> io::Result<()> {
        let ret = unsafe {
            libc::ioctl(
                self.fd.as_raw_fd(),
                hidiocsfeature(buf.len() as u32),
                buf.as_ptr(),
            )
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    fn write_report(&self, report: &[u8]) -> io::Result<()> {
        let ret = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                report.as_ptr() as *const libc::c_void,
                report.len(),
            )
        };
        if ret < 0 {
            Err(io::Error::last_os_error())
        } else if ret as usize != report.len() {
            Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short hidraw write: {} of {} bytes", ret, report.len()),
            ))
        } else {
            Ok(())
        }
    }

    fn wait_readable(&self) -> io::Result<()> {
        let mut pfd = libc::pollfd {
            fd: self.fd.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, READ_TIMEOUT_MS) };
        match ret {
            r if r < 0 => Err(io::Error::last_os_error()),
            0 => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "no input report from device",
            )),
            _ => Ok(()),
        }
    }
}

impl RmiTransport for HidrawTransport {
    fn write_command(&self, register: u8, buf: &[u8]) -> io::Result<()> {
        match register {
            COMMAND_REGISTER => {
                let report = buf.get(SET_REPORT_PAYLOAD_OFFSET..).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "SET_REPORT command too short")
                })?;
                self.set_feature(report)
            }
            OUTPUT_REGISTER => {
                let report = buf.get(OUTPUT_HEADER_LEN..).ok_or_else(|| {
                    io::Error::new(io::ErrorKind::InvalidInput, "output command too short")
                })?;
                self.write_report(report)
            }
            other => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("unsupported I2C-HID register 0x{:02X}", other),
            )),
        }
    }

    fn read_input(&self, buf: &mut [u8; INPUT_TRANSACTION_LEN]) -> io::Result<()> {
        loop {
            self.wait_readable()?;
            buf.fill(0);
            let ret = unsafe {
                libc::read(
                    self.fd.as_raw_fd(),
                    buf[2..].as_mut_ptr() as *mut libc::c_void,
                    RMI_REPORT_LEN,
                )
            };
            if ret < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    continue;
                }
                return Err(err);
            }
            let len = (ret as u16).saturating_add(2);
            buf[..2].copy_from_slice(&len.to_le_bytes());
            return Ok(());
        }
    }
}
