use super::pdt::FunctionDescriptor;
use super::protocol::RmiClient;
use super::query::{has, QueryCursor};
use super::RmiError;
use crate::transport::RmiTransport;

pub const BASIC_QUERY_LEN: usize = 11;
const PRODUCT_ID_LEN: usize = 10;
/// Product info (build id) sits this far past the product id block.
const PRODUCT_INFO_OFFSET: u16 = 6;
const LTS_QUERY_LEN: u16 = 20;

const Q0_HAS_LTS: u8 = 1 << 2;
const Q1_HAS_SENSOR_ID: u8 = 1 << 3;
const Q1_HAS_QUERY42: u8 = 1 << 7;
const Q42_HAS_DS4_QUERIES: u8 = 1 << 0;
const DS4_HAS_PACKAGE_ID_QUERY: u8 = 1 << 0;
const DS4_HAS_BUILD_ID_QUERY: u8 = 1 << 1;

const CTRL_LEN: usize = 2;
const CTRL_INTERRUPT_ENABLE: u16 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub product_id: String,
    pub firmware_id: Option<u32>,
}

impl DeviceIdentity {
    pub fn firmware_version(&self) -> String {
        match self.firmware_id {
            Some(id) => id.to_string(),
            None => String::from("unknown"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceControl {
    pub identity: DeviceIdentity,
    pub control0: u8,
    /// Firmware cleared the interrupt-enable register; it was rewritten.
    pub restore_interrupt_mask: bool,
}

pub fn populate<T: RmiTransport>(
    client: &mut RmiClient<T>,
    f01: &FunctionDescriptor,
    interrupt_enable_mask: u32,
) -> Result<DeviceControl, RmiError> {
    let mut basic = [0u8; BASIC_QUERY_LEN];
    QueryCursor::new(f01.query_base).read_block(client, &mut basic)?;

    let has_lts = has(basic[0], Q0_HAS_LTS);
    let has_sensor_id = has(basic[1], Q1_HAS_SENSOR_ID);
    let has_query42 = has(basic[1], Q1_HAS_QUERY42);

    let mut cursor = QueryCursor::at(f01.query_base, BASIC_QUERY_LEN as u16);
    let mut product_id = [0u8; PRODUCT_ID_LEN];
    cursor.read_block(client, &mut product_id)?;
    let mut prod_info = QueryCursor::at(f01.query_base, cursor.offset() + PRODUCT_INFO_OFFSET);
    cursor.skip(PRODUCT_ID_LEN as u16);
    cursor.skip_if(has_lts, LTS_QUERY_LEN);
    cursor.skip_if(has_sensor_id, 1);

    let mut has_ds4_queries = false;
    if has_query42 {
        has_ds4_queries = has(cursor.read_byte(client)?, Q42_HAS_DS4_QUERIES);
        cursor.skip(1);
    }

    let mut has_package_id_query = false;
    let mut has_build_id_query = false;
    if has_ds4_queries {
        let ds4_query_len = cursor.read_byte(client)?;
        cursor.skip(1);
        if ds4_query_len > 0 {
            let ds4 = cursor.read_byte(client)?;
            has_package_id_query = has(ds4, DS4_HAS_PACKAGE_ID_QUERY);
            has_build_id_query = has(ds4, DS4_HAS_BUILD_ID_QUERY);
        }
    }

    prod_info.skip_if(has_package_id_query, 1);

    let mut firmware_id = None;
    if has_build_id_query {
        let mut info = [0u8; 3];
        prod_info.read_block(client, &mut info)?;
        firmware_id = Some(u32::from(info[0]) | u32::from(info[1]) << 8 | u32::from(info[2]) << 16);
    }

    let mut ctrl = [0u8; CTRL_LEN];
    client.read_block(f01.control_base, &mut ctrl)?;

    let restore_interrupt_mask = ctrl[1] == 0;
    if restore_interrupt_mask {
        // Some firmware clears the interrupt enable register on reset.
        client.write_byte(
            f01.control_base + CTRL_INTERRUPT_ENABLE,
            interrupt_enable_mask as u8,
        )?;
        tracing::warn!("F01 interrupt enable was cleared by firmware, restored");
    }

    let identity = DeviceIdentity {
        product_id: decode_product_id(&product_id),
        firmware_id,
    };
    tracing::info!(
        product = %identity.product_id,
        firmware = %identity.firmware_version(),
        "device control ready"
    );

    Ok(DeviceControl {
        identity,
        control0: ctrl[0],
        restore_interrupt_mask,
    })
}

fn decode_product_id(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    fn f01() -> FunctionDescriptor {
        FunctionDescriptor {
            number: 0x01,
            query_base: 0x0010,
            control_base: 0x0050,
            ..Default::default()
        }
    }

    #[test]
    fn reads_product_id_and_leaves_interrupt_enable_alone() {
        let mock = MockTransport::new();
        mock.set_block(0x0010 + 11, b"TM3038-001");
        mock.set_block(0x0050, &[0x80, 0x0f]);
        let mut client = RmiClient::new(mock);

        let control = populate(&mut client, &f01(), 0x0b).unwrap();
        assert_eq!(control.identity.product_id, "TM3038-001");
        assert_eq!(control.identity.firmware_id, None);
        assert_eq!(control.control0, 0x80);
        assert!(!control.restore_interrupt_mask);
        assert_eq!(client.transport().register(0x0051), 0x0f);
    }

    #[test]
    fn zero_interrupt_enable_is_rewritten() {
        let mock = MockTransport::new();
        mock.set_block(0x0050, &[0x00, 0x00]);
        let mut client = RmiClient::new(mock);

        let control = populate(&mut client, &f01(), 0x0b).unwrap();
        assert!(control.restore_interrupt_mask);
        assert_eq!(client.transport().register(0x0051), 0x0b);
    }

    #[test]
    fn follows_query_chain_to_build_id() {
        let mock = MockTransport::new();
        // LTS, sensor id and query42 present
        mock.set_register(0x0010, Q0_HAS_LTS);
        mock.set_register(0x0011, Q1_HAS_SENSOR_ID | Q1_HAS_QUERY42);
        // 0x10 + 11 + 10 + 20 + 1 = query42
        let q42 = 0x0010 + 42;
        mock.set_register(q42, Q42_HAS_DS4_QUERIES);
        mock.set_register(q42 + 1, 1);
        mock.set_register(q42 + 2, DS4_HAS_PACKAGE_ID_QUERY | DS4_HAS_BUILD_ID_QUERY);
        // product info at 0x10 + 11 + 6, +1 for the package id
        mock.set_block(0x0010 + 18, &[0x34, 0x12, 0x01]);
        mock.set_block(0x0050, &[0, 1]);
        let mut client = RmiClient::new(mock);

        let control = populate(&mut client, &f01(), 1).unwrap();
        assert_eq!(control.identity.firmware_id, Some(0x01_1234));
        assert_eq!(control.identity.firmware_version(), "70196");
    }

    #[test]
    fn empty_ds4_query_skips_build_id() {
        let mock = MockTransport::new();
        mock.set_register(0x0011, Q1_HAS_QUERY42);
        let q42 = 0x0010 + 21;
        mock.set_register(q42, Q42_HAS_DS4_QUERIES);
        mock.set_register(q42 + 1, 0);
        mock.set_register(q42 + 2, DS4_HAS_BUILD_ID_QUERY);
        mock.set_block(0x0050, &[0, 1]);
        let mut client = RmiClient::new(mock);

        let control = populate(&mut client, &f01(), 1).unwrap();
        assert_eq!(control.identity.firmware_id, None);
    }
}
