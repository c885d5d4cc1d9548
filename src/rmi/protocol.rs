use super::RmiError;
use crate::transport::{
    rmi_report, RmiTransport, COMMAND_REGISTER, INPUT_TRANSACTION_LEN, OUTPUT_HEADER_LEN,
    OUTPUT_REGISTER, RMI_REPORT_LEN,
};

pub const WRITE_REPORT_ID: u8 = 0x09;
pub const READ_ADDR_REPORT_ID: u8 = 0x0a;
pub const READ_DATA_REPORT_ID: u8 = 0x0b;
/// Attention (touch data) input report id as Synaptics firmware sends it.
pub const ATTN_REPORT_ID: u8 = 0x0c;
pub const SET_RMI_MODE_REPORT_ID: u8 = 0x0f;

/// Register that holds the currently selected page.
pub const PAGE_SELECT_REGISTER: u16 = 0x00ff;

/// Size of a write / read-address report, report id included.
pub const REGISTER_REPORT_LEN: usize = 21;
const WRITE_HEADER_LEN: usize = 4;
pub const MAX_WRITE_LEN: usize = REGISTER_REPORT_LEN - WRITE_HEADER_LEN;
/// Read-data reports carry the payload after the id and a reserved byte.
pub const MAX_READ_LEN: usize = RMI_REPORT_LEN - 2;

/// Output-register length field: the 21-byte report plus the 2 length bytes.
const OUTPUT_COMMAND_LEN: u16 = (REGISTER_REPORT_LEN + 2) as u16;

/// SET_REPORT(feature, id 0x0f) to data register 0x0023, 4 bytes long.
const SET_MODE_COMMAND: [u8; 9] = [
    0x00,
    0x3f,
    0x03,
    0x0f,
    0x23,
    0x00,
    0x04,
    0x00,
    SET_RMI_MODE_REPORT_ID,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RmiMode {
    Off = 0,
    AttnReports = 1,
    NoPackedAttnReports = 2,
}

pub fn page_of(addr: u16) -> u8 {
    (addr >> 8) as u8
}

/// Page-addressed register access over an I2C-HID transport.
///
/// The selected page is cached; any access to another page is preceded by a
/// page-select write. The cache starts out unknown so the first access always
/// selects.
pub struct RmiClient<T> {
    transport: T,
    page: Option<u8>,
}

impl<T: RmiTransport> RmiClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            page: None,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn set_mode(&mut self, mode: RmiMode) -> Result<(), RmiError> {
        let mut command = [0u8; SET_MODE_COMMAND.len() + 1];
        command[..SET_MODE_COMMAND.len()].copy_from_slice(&SET_MODE_COMMAND);
        command[SET_MODE_COMMAND.len()] = mode as u8;
        tracing::debug!(?mode, "set RMI mode");
        self.transport.write_command(COMMAND_REGISTER, &command)?;
        Ok(())
    }

    pub fn read_byte(&mut self, addr: u16) -> Result<u8, RmiError> {
        let mut buf = [0u8; 1];
        self.read_block(addr, &mut buf)?;
        Ok(buf[0])
    }

    /// Read `buf.len()` registers starting at `addr`.
    ///
    /// A response carrying any report id other than read-data leaves `buf`
    /// zeroed and is not an error.
    pub fn read_block(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), RmiError> {
        if buf.len() > MAX_READ_LEN {
            return Err(RmiError::BlockTooLong {
                len: buf.len(),
                max: MAX_READ_LEN,
            });
        }
        self.select_page(addr)?;

        let len = buf.len() as u16;
        let mut report = [0u8; REGISTER_REPORT_LEN];
        report[0] = READ_ADDR_REPORT_ID;
        report[2..4].copy_from_slice(&addr.to_le_bytes());
        report[4..6].copy_from_slice(&len.to_le_bytes());
        self.write_report(&report)?;

        let mut transaction = [0u8; INPUT_TRANSACTION_LEN];
        self.transport.read_input(&mut transaction)?;
        let input = rmi_report(&transaction);

        buf.fill(0);
        if input[0] == READ_DATA_REPORT_ID {
            buf.copy_from_slice(&input[2..2 + buf.len()]);
            tracing::trace!(addr = format!("0x{:04X}", addr), data = ?buf, "RMI read");
        } else {
            tracing::debug!(
                addr = format!("0x{:04X}", addr),
                report_id = format!("0x{:02X}", input[0]),
                "unexpected report in place of read data"
            );
        }
        Ok(())
    }

    pub fn write_byte(&mut self, addr: u16, value: u8) -> Result<(), RmiError> {
        self.write_block(addr, &[value])
    }

    pub fn write_block(&mut self, addr: u16, data: &[u8]) -> Result<(), RmiError> {
        if data.len() > MAX_WRITE_LEN {
            return Err(RmiError::BlockTooLong {
                len: data.len(),
                max: MAX_WRITE_LEN,
            });
        }
        self.select_page(addr)?;
        self.write_register_report(addr, data)
    }

    fn select_page(&mut self, addr: u16) -> Result<(), RmiError> {
        let page = page_of(addr);
        if self.page == Some(page) {
            return Ok(());
        }
        tracing::trace!(page, "select RMI page");
        self.write_register_report(PAGE_SELECT_REGISTER, &[page])?;
        self.page = Some(page);
        Ok(())
    }

    fn write_register_report(&self, addr: u16, data: &[u8]) -> Result<(), RmiError> {
        let mut report = [0u8; REGISTER_REPORT_LEN];
        report[0] = WRITE_REPORT_ID;
        report[1] = data.len() as u8;
        report[2..4].copy_from_slice(&addr.to_le_bytes());
        report[WRITE_HEADER_LEN..WRITE_HEADER_LEN + data.len()].copy_from_slice(data);
        self.write_report(&report)
    }

    fn write_report(&self, report: &[u8; REGISTER_REPORT_LEN]) -> Result<(), RmiError> {
        let mut command = [0u8; OUTPUT_HEADER_LEN + REGISTER_REPORT_LEN];
        command[..2].copy_from_slice(&OUTPUT_COMMAND_LEN.to_le_bytes());
        command[OUTPUT_HEADER_LEN..].copy_from_slice(report);
        self.transport.write_command(OUTPUT_REGISTER, &command)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    #[test]
    fn first_access_selects_page_and_cache_suppresses_repeat() {
        let mut client = RmiClient::new(MockTransport::new());
        client.read_byte(0x00e9).unwrap();
        client.read_byte(0x00e3).unwrap();
        assert_eq!(client.transport().page_selects(), vec![0]);
        assert_eq!(client.transport().page_faults(), 0);
    }

    #[test]
    fn crossing_pages_issues_page_select_each_time() {
        let mut client = RmiClient::new(MockTransport::new());
        client.write_byte(0x0012, 1).unwrap();
        client.read_byte(0x0134).unwrap();
        client.read_byte(0x0012).unwrap();
        assert_eq!(client.transport().page_selects(), vec![0, 1, 0]);
        assert_eq!(client.transport().page_faults(), 0);
    }

    #[test]
    fn page_select_report_layout() {
        let mut client = RmiClient::new(MockTransport::new());
        client.read_byte(0x0305).unwrap();
        let (register, command) = &client.transport().commands()[0];
        assert_eq!(*register, OUTPUT_REGISTER);
        assert_eq!(command.len(), 24);
        assert_eq!(&command[..3], &[0x00, 0x17, 0x00]);
        assert_eq!(&command[3..8], &[WRITE_REPORT_ID, 1, 0xff, 0x00, 0x03]);
        assert!(command[8..].iter().all(|&b| b == 0));
    }

    #[test]
    fn read_request_report_layout() {
        let mut client = RmiClient::new(MockTransport::new());
        let mut buf = [0u8; 6];
        client.read_block(0x00e9, &mut buf).unwrap();
        let (_, command) = &client.transport().commands()[1];
        assert_eq!(&command[3..9], &[READ_ADDR_REPORT_ID, 0, 0xe9, 0x00, 6, 0]);
        assert!(command[9..].iter().all(|&b| b == 0));
    }

    #[test]
    fn read_returns_register_contents() {
        let mock = MockTransport::new();
        mock.set_block(0x0040, &[1, 2, 3, 4]);
        let mut client = RmiClient::new(mock);
        let mut buf = [0u8; 4];
        client.read_block(0x0040, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn write_lands_in_register_map() {
        let mut client = RmiClient::new(MockTransport::new());
        client.write_block(0x0150, &[0xaa, 0xbb]).unwrap();
        assert_eq!(client.transport().register(0x0150), 0xaa);
        assert_eq!(client.transport().register(0x0151), 0xbb);
        let (_, command) = client.transport().commands().last().cloned().unwrap();
        assert_eq!(&command[3..9], &[WRITE_REPORT_ID, 2, 0x50, 0x01, 0xaa, 0xbb]);
    }

    #[test]
    fn mismatched_response_id_yields_zeroes_without_error() {
        let mock = MockTransport::new();
        mock.set_block(0x0010, &[9, 9, 9]);
        mock.respond_with_id(ATTN_REPORT_ID);
        let mut client = RmiClient::new(mock);
        let mut buf = [0xffu8; 3];
        client.read_block(0x0010, &mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0]);
    }

    #[test]
    fn transport_failure_propagates() {
        let mock = MockTransport::new();
        mock.fail_io();
        let mut client = RmiClient::new(mock);
        assert!(matches!(client.read_byte(0x0001), Err(RmiError::Transport(_))));
    }

    #[test]
    fn oversized_blocks_are_rejected() {
        let mut client = RmiClient::new(MockTransport::new());
        let mut buf = [0u8; MAX_READ_LEN + 1];
        assert!(matches!(
            client.read_block(0, &mut buf),
            Err(RmiError::BlockTooLong { .. })
        ));
        assert!(client.write_block(0, &[0u8; MAX_WRITE_LEN + 1]).is_err());
    }

    #[test]
    fn set_mode_writes_feature_command() {
        let mut client = RmiClient::new(MockTransport::new());
        client.set_mode(RmiMode::AttnReports).unwrap();
        let commands = client.transport().commands();
        assert_eq!(
            commands[0],
            (
                COMMAND_REGISTER,
                vec![0x00, 0x3f, 0x03, 0x0f, 0x23, 0x00, 0x04, 0x00, 0x0f, 0x01]
            )
        );
    }
}
