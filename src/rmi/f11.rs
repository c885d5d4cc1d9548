use super::pdt::FunctionDescriptor;
use super::protocol::RmiClient;
use super::query::{has, QueryCursor};
use super::RmiError;
use crate::transport::RmiTransport;

const Q0_HAS_QUERY9: u8 = 1 << 3;
const Q0_HAS_QUERY11: u8 = 1 << 4;
const Q0_HAS_QUERY12: u8 = 1 << 5;
const Q0_HAS_QUERY27: u8 = 1 << 6;
const Q0_HAS_QUERY28: u8 = 1 << 7;

const Q1_FINGER_COUNT_MASK: u8 = 0x07;
const Q1_HAS_REL: u8 = 1 << 3;
const Q1_HAS_ABS: u8 = 1 << 4;
const Q1_HAS_GESTURES: u8 = 1 << 5;

const Q5_HAS_DRIBBLE: u8 = 1 << 4;
const Q8_HAS_PALM_DETECT: u8 = 1 << 0;
const Q8_HAS_QUERY10: u8 = 1 << 2;
const Q12_HAS_PHYSICAL_PROPS: u8 = 1 << 5;
const Q28_HAS_QUERY36: u8 = 1 << 6;
const Q36_HAS_DATA40: u8 = 1 << 5;

const CTRL0_DRIBBLE: u8 = 1 << 6;
const CTRL11_PALM_DETECT: u8 = 1 << 0;

/// Queries 0-5 are always present once absolute reporting is supported.
const FIXED_QUERY_LEN: u16 = 6;
/// Queries 19-26 (bezel dimensions) follow the sensor size block.
const BEZEL_QUERY_LEN: u16 = 12;

pub const CTRL_REG_COUNT: usize = 12;
const CTRL_MAX_X: usize = 6;
const CTRL_MAX_Y: usize = 8;
const CTRL_PALM_DETECT_REG: usize = 11;

/// Finger counts above this are reported by the firmware as ten.
const MAX_FINGERS_BEFORE_EXTENDED: usize = 5;
const EXTENDED_MAX_FINGERS: usize = 10;
const FINGER_RECORD_LEN: usize = 5;
const DATA40_RECORD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorCapabilities {
    pub max_fingers: usize,
    pub max_x: u16,
    pub max_y: u16,
    pub report_size: usize,
    pub has_relative: bool,
    pub has_gestures: bool,
    pub has_dribble: bool,
    pub has_palm_detect: bool,
    pub has_data40: bool,
    /// Sensor size in millimetres, when the firmware reports it.
    pub size_mm: Option<(u16, u16)>,
    pub control: [u8; CTRL_REG_COUNT],
}

pub fn finger_report_size(max_fingers: usize) -> usize {
    max_fingers * FINGER_RECORD_LEN + max_fingers.div_ceil(4)
}

pub fn populate<T: RmiTransport>(
    client: &mut RmiClient<T>,
    f11: Option<&FunctionDescriptor>,
) -> Result<SensorCapabilities, RmiError> {
    let f11 = match f11 {
        Some(f) if f.query_base != 0 => f,
        _ => return Err(RmiError::MissingFunction(super::pdt::F11_2D_SENSOR)),
    };
    let base = f11.query_base;

    let q0 = QueryCursor::at(base, 0).read_byte(client)?;
    let q1 = QueryCursor::at(base, 1).read_byte(client)?;

    let mut max_fingers = usize::from(q1 & Q1_FINGER_COUNT_MASK) + 1;
    if max_fingers > MAX_FINGERS_BEFORE_EXTENDED {
        max_fingers = EXTENDED_MAX_FINGERS;
    }
    let mut report_size = finger_report_size(max_fingers);

    if !has(q1, Q1_HAS_ABS) {
        return Err(RmiError::NoAbsoluteReporting);
    }
    let has_relative = has(q1, Q1_HAS_REL);
    let has_gestures = has(q1, Q1_HAS_GESTURES);

    let q5 = QueryCursor::at(base, 5).read_byte(client)?;
    let has_dribble = has(q5, Q5_HAS_DRIBBLE);

    let mut cursor = QueryCursor::at(base, FIXED_QUERY_LEN);
    cursor.skip_if(has_relative, 1);

    let mut has_palm_detect = false;
    let mut has_query10 = false;
    if has_gestures {
        // query 8 follows query 7
        let q8 = cursor.peek(client, 1)?;
        has_palm_detect = has(q8, Q8_HAS_PALM_DETECT);
        has_query10 = has(q8, Q8_HAS_QUERY10);
        cursor.skip(2);
    }

    cursor.skip_if(has(q0, Q0_HAS_QUERY9), 1);
    cursor.skip_if(has_query10, 1);
    cursor.skip_if(has(q0, Q0_HAS_QUERY11), 1);

    let mut size_mm = None;
    if has(q0, Q0_HAS_QUERY12) {
        let q12 = cursor.read_byte(client)?;
        if has(q12, Q12_HAS_PHYSICAL_PROPS) {
            cursor.skip(1);
            let mut size = [0u8; 4];
            cursor.read_block(client, &mut size)?;
            let x_size = u16::from_le_bytes([size[0], size[1]]);
            let y_size = u16::from_le_bytes([size[2], size[3]]);
            size_mm = Some((x_size / 10, y_size / 10));
            cursor.skip(BEZEL_QUERY_LEN);
        }
    }

    cursor.skip_if(has(q0, Q0_HAS_QUERY27), 1);

    let mut has_query36 = false;
    if has(q0, Q0_HAS_QUERY28) {
        has_query36 = has(cursor.read_byte(client)?, Q28_HAS_QUERY36);
    }

    let mut has_data40 = false;
    if has_query36 {
        cursor.skip(2);
        has_data40 = has(cursor.read_byte(client)?, Q36_HAS_DATA40);
    }

    if has_data40 {
        report_size += max_fingers * DATA40_RECORD_LEN;
    }

    let mut control = [0u8; CTRL_REG_COUNT];
    client.read_block(f11.control_base, &mut control)?;

    let max_x = u16::from_le_bytes([control[CTRL_MAX_X], control[CTRL_MAX_X + 1]]);
    let max_y = u16::from_le_bytes([control[CTRL_MAX_Y], control[CTRL_MAX_Y + 1]]);

    if has_dribble {
        control[0] &= !CTRL0_DRIBBLE;
        client.write_byte(f11.control_base, control[0])?;
        tracing::debug!("dribble reporting disabled");
    }

    if has_palm_detect {
        control[CTRL_PALM_DETECT_REG] &= !CTRL11_PALM_DETECT;
        client.write_byte(
            f11.control_base + CTRL_PALM_DETECT_REG as u16,
            control[CTRL_PALM_DETECT_REG],
        )?;
        tracing::debug!("palm detect disabled");
    }

    tracing::info!(max_fingers, max_x, max_y, report_size, ?size_mm, "2-D sensor ready");

    Ok(SensorCapabilities {
        max_fingers,
        max_x,
        max_y,
        report_size,
        has_relative,
        has_gestures,
        has_dribble,
        has_palm_detect,
        has_data40,
        size_mm,
        control,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockTransport;

    const QUERY: u16 = 0x0020;
    const CTRL: u16 = 0x0060;

    fn f11() -> FunctionDescriptor {
        FunctionDescriptor {
            number: 0x11,
            query_base: QUERY,
            control_base: CTRL,
            ..Default::default()
        }
    }

    fn with_resolution(mock: &MockTransport, max_x: u16, max_y: u16) {
        mock.set_block(CTRL + 6, &max_x.to_le_bytes());
        mock.set_block(CTRL + 8, &max_y.to_le_bytes());
    }

    #[test]
    fn missing_sensor_is_a_configuration_error() {
        let mut client = RmiClient::new(MockTransport::new());
        assert!(matches!(
            populate(&mut client, None),
            Err(RmiError::MissingFunction(0x11))
        ));
    }

    #[test]
    fn relative_only_sensor_is_rejected() {
        let mock = MockTransport::new();
        mock.set_register(QUERY + 1, 0x04 | Q1_HAS_REL);
        let mut client = RmiClient::new(mock);
        assert!(matches!(
            populate(&mut client, Some(&f11())),
            Err(RmiError::NoAbsoluteReporting)
        ));
    }

    #[test]
    fn five_finger_sensor_without_extras() {
        let mock = MockTransport::new();
        mock.set_register(QUERY + 1, 0x04 | Q1_HAS_ABS);
        with_resolution(&mock, 1200, 700);
        let mut client = RmiClient::new(mock);

        let caps = populate(&mut client, Some(&f11())).unwrap();
        assert_eq!(caps.max_fingers, 5);
        assert_eq!(caps.report_size, 27);
        assert_eq!((caps.max_x, caps.max_y), (1200, 700));
        assert_eq!(caps.size_mm, None);
    }

    #[test]
    fn finger_counts_above_five_become_ten() {
        let mock = MockTransport::new();
        mock.set_register(QUERY + 1, 0x05 | Q1_HAS_ABS);
        let mut client = RmiClient::new(mock);
        let caps = populate(&mut client, Some(&f11())).unwrap();
        assert_eq!(caps.max_fingers, 10);
        assert_eq!(caps.report_size, 53);
    }

    #[test]
    fn full_query_chain_reaches_data40_and_physical_size() {
        let mock = MockTransport::new();
        mock.set_register(
            QUERY,
            Q0_HAS_QUERY9 | Q0_HAS_QUERY11 | Q0_HAS_QUERY12 | Q0_HAS_QUERY27 | Q0_HAS_QUERY28,
        );
        mock.set_register(QUERY + 1, 0x04 | Q1_HAS_ABS | Q1_HAS_REL | Q1_HAS_GESTURES);
        // query 8 at offset 6 + 1 (rel) + 1
        mock.set_register(QUERY + 8, Q8_HAS_PALM_DETECT | Q8_HAS_QUERY10);
        // 6 + 1 + 2 + 1 + 1 + 1 = query 12 at offset 12
        mock.set_register(QUERY + 12, Q12_HAS_PHYSICAL_PROPS);
        mock.set_block(QUERY + 13, &[0xd4, 0x03, 0x3a, 0x02]);
        // 13 + 12 + 1 = query 28 at offset 26
        mock.set_register(QUERY + 26, Q28_HAS_QUERY36);
        mock.set_register(QUERY + 28, Q36_HAS_DATA40);
        with_resolution(&mock, 3000, 2000);
        mock.set_register(CTRL, 0xff);
        mock.set_register(CTRL + 11, 0xff);
        let mut client = RmiClient::new(mock);

        let caps = populate(&mut client, Some(&f11())).unwrap();
        assert!(caps.has_relative && caps.has_gestures && caps.has_palm_detect);
        assert!(caps.has_data40);
        assert_eq!(caps.size_mm, Some((98, 57)));
        assert_eq!(caps.report_size, 27 + 10);
        assert_eq!(client.transport().register(CTRL + 11), 0xfe);
        assert_eq!(client.transport().register(CTRL), 0xff);
    }

    #[test]
    fn dribble_bit_is_cleared_once() {
        let mock = MockTransport::new();
        mock.set_register(QUERY + 1, Q1_HAS_ABS);
        mock.set_register(QUERY + 5, Q5_HAS_DRIBBLE);
        mock.set_register(CTRL, 0xff);
        let mut client = RmiClient::new(mock);

        let caps = populate(&mut client, Some(&f11())).unwrap();
        assert!(caps.has_dribble);
        assert_eq!(caps.max_fingers, 1);
        assert_eq!(client.transport().register(CTRL), 0xbf);
        assert_eq!(caps.control[0], 0xbf);
    }
}
