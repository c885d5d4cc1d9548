//! Vendor HID reports exchanged with the host: pointer, scroll and keyboard
//! reports going out, scroll-control and settings reports coming in.

use packed_struct::prelude::*;
use std::sync::mpsc::{Receiver, Sender, SyncSender, TrySendError};

pub const REPORTID_FEATURE: u8 = 0x02;
pub const REPORTID_RELATIVE_MOUSE: u8 = 0x04;
pub const REPORTID_SCROLL: u8 = 0x06;
pub const REPORTID_KEYBOARD: u8 = 0x07;
pub const REPORTID_SCROLLCTRL: u8 = 0x08;
pub const REPORTID_SETTINGS: u8 = 0x09;

pub const MOUSE_BUTTON_1: u8 = 0x01;
pub const MOUSE_BUTTON_2: u8 = 0x02;
pub const MOUSE_BUTTON_3: u8 = 0x04;

pub const KBD_LCONTROL_BIT: u8 = 0x01;
pub const KBD_LSHIFT_BIT: u8 = 0x02;
pub const KBD_LALT_BIT: u8 = 0x04;
pub const KBD_LGUI_BIT: u8 = 0x08;
pub const KBD_KEY_CODES: usize = 6;

pub const DEVICE_MODE_MOUSE: u8 = 0x00;

/// Scroll report coordinate meaning "no touch".
pub const SCROLL_NO_TOUCH: u16 = 65535;
pub const INFO_VALUE_LEN: usize = 64;

#[derive(PackedStruct, Debug, Copy, Clone, Default, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "6")]
pub struct RelativeMouseReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub button: u8,
    #[packed_field(bytes = "2")]
    pub x: u8,
    #[packed_field(bytes = "3")]
    pub y: u8,
    #[packed_field(bytes = "4")]
    pub wheel: u8,
    #[packed_field(bytes = "5")]
    pub hwheel: u8,
}

impl RelativeMouseReport {
    /// Deltas are clamped to the signed 8-bit range the descriptor declares.
    pub fn new(button: u8, dx: i32, dy: i32, wheel: i32, hwheel: i32) -> Self {
        Self {
            report_id: REPORTID_RELATIVE_MOUSE,
            button,
            x: clamp_i8(dx),
            y: clamp_i8(dy),
            wheel: clamp_i8(wheel),
            hwheel: clamp_i8(hwheel),
        }
    }

    pub fn dx(&self) -> i32 {
        i32::from(self.x as i8)
    }

    pub fn dy(&self) -> i32 {
        i32::from(self.y as i8)
    }

    /// Same payload, ignoring the report id.
    pub fn same_as(&self, other: &Self) -> bool {
        self.button == other.button
            && self.x == other.x
            && self.y == other.y
            && self.wheel == other.wheel
            && self.hwheel == other.hwheel
    }
}

fn clamp_i8(v: i32) -> u8 {
    v.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8 as u8
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "10")]
pub struct ScrollReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub flag: u8,
    #[packed_field(bytes = "2..=3", endian = "lsb")]
    pub touch1_x: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "4..=5", endian = "lsb")]
    pub touch1_y: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "6..=7", endian = "lsb")]
    pub touch2_x: Integer<u16, packed_bits::Bits<16>>,
    #[packed_field(bytes = "8..=9", endian = "lsb")]
    pub touch2_y: Integer<u16, packed_bits::Bits<16>>,
}

impl ScrollReport {
    pub const FLAG_SCROLLING: u8 = 0;
    pub const FLAG_STOP: u8 = 1;

    pub fn touches(t1: (u16, u16), t2: (u16, u16)) -> Self {
        Self {
            report_id: REPORTID_SCROLL,
            flag: Self::FLAG_SCROLLING,
            touch1_x: t1.0.into(),
            touch1_y: t1.1.into(),
            touch2_x: t2.0.into(),
            touch2_y: t2.1.into(),
        }
    }

    pub fn stop() -> Self {
        Self {
            flag: Self::FLAG_STOP,
            ..Self::touches(
                (SCROLL_NO_TOUCH, SCROLL_NO_TOUCH),
                (SCROLL_NO_TOUCH, SCROLL_NO_TOUCH),
            )
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, Default, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "9")]
pub struct KeyboardReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub shift_key_flags: u8,
    #[packed_field(bytes = "2")]
    pub reserved: u8,
    #[packed_field(bytes = "3..=8")]
    pub key_codes: [u8; 6],
}

impl KeyboardReport {
    pub fn new(shift_key_flags: u8, key: u8) -> Self {
        let mut key_codes = [0u8; KBD_KEY_CODES];
        key_codes[0] = key;
        Self {
            report_id: REPORTID_KEYBOARD,
            shift_key_flags,
            reserved: 0,
            key_codes,
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "2")]
pub struct ScrollControlReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub flag: u8,
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "3")]
pub struct SettingsReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub register: u8,
    #[packed_field(bytes = "2")]
    pub value: u8,
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "3")]
pub struct FeatureReport {
    #[packed_field(bytes = "0")]
    pub report_id: u8,
    #[packed_field(bytes = "1")]
    pub device_mode: u8,
    #[packed_field(bytes = "2")]
    pub device_identifier: u8,
}

impl FeatureReport {
    pub fn mouse() -> Self {
        Self {
            report_id: REPORTID_FEATURE,
            device_mode: DEVICE_MODE_MOUSE,
            device_identifier: 0,
        }
    }
}

/// Settings-register echo carrying a NUL padded string.
#[derive(Debug, Clone, PartialEq)]
pub struct InfoReport {
    pub value: [u8; INFO_VALUE_LEN],
}

impl InfoReport {
    pub fn new(text: &str) -> Self {
        let mut value = [0u8; INFO_VALUE_LEN];
        // keep a terminating NUL
        let len = text.len().min(INFO_VALUE_LEN - 1);
        value[..len].copy_from_slice(&text.as_bytes()[..len]);
        Self { value }
    }

    pub fn to_bytes(&self) -> [u8; INFO_VALUE_LEN + 1] {
        let mut bytes = [0u8; INFO_VALUE_LEN + 1];
        bytes[0] = REPORTID_SETTINGS;
        bytes[1..].copy_from_slice(&self.value);
        bytes
    }
}

/// Reports the host sends to the touchpad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostReport {
    ScrollControl { inertia_active: bool },
    Setting { register: u8, value: u8 },
}

impl HostReport {
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        match bytes.first().copied()? {
            REPORTID_SCROLLCTRL => {
                let report = ScrollControlReport::unpack_from_slice(bytes.get(..2)?).ok()?;
                Some(HostReport::ScrollControl {
                    inertia_active: report.flag == 1,
                })
            }
            REPORTID_SETTINGS => {
                let report = SettingsReport::unpack_from_slice(bytes.get(..3)?).ok()?;
                Some(HostReport::Setting {
                    register: report.register,
                    value: report.value,
                })
            }
            _ => None,
        }
    }
}

/// Destination of synthesized reports. Returns the number of bytes
/// delivered; 0 means the report was dropped.
pub trait ReportSink {
    fn emit(&mut self, report: &[u8]) -> usize;
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn emit(&mut self, report: &[u8]) -> usize {
        (**self).emit(report)
    }
}

pub fn emit_packed<R>(sink: &mut dyn ReportSink, report: &R) -> usize
where
    R: PackedStruct + std::fmt::Debug,
    R::ByteArray: AsRef<[u8]>,
{
    match report.pack() {
        Ok(bytes) => sink.emit(bytes.as_ref()),
        Err(e) => {
            tracing::error!(error = ?e, ?report, "failed to pack report");
            0
        }
    }
}

/// Hands each report to a host that has a read outstanding. With no reader
/// waiting the report is dropped, never queued.
pub struct PendingReadSink {
    tx: SyncSender<Vec<u8>>,
}

impl PendingReadSink {
    pub fn new() -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(0);
        (Self { tx }, rx)
    }
}

impl ReportSink for PendingReadSink {
    fn emit(&mut self, report: &[u8]) -> usize {
        match self.tx.try_send(report.to_vec()) {
            Ok(()) => report.len(),
            Err(TrySendError::Full(_)) => {
                tracing::trace!(report_id = report.first().copied(), "no pending read, dropped");
                0
            }
            Err(TrySendError::Disconnected(_)) => 0,
        }
    }
}

/// Queues every report for a local consumer thread; nothing is dropped
/// while the receiver is alive.
pub struct ChannelSink {
    tx: Sender<Vec<u8>>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = std::sync::mpsc::channel();
        (Self { tx }, rx)
    }
}

impl ReportSink for ChannelSink {
    fn emit(&mut self, report: &[u8]) -> usize {
        match self.tx.send(report.to_vec()) {
            Ok(()) => report.len(),
            Err(_) => {
                tracing::debug!(report_id = report.first().copied(), "output consumer gone");
                0
            }
        }
    }
}

/// Logs every report instead of delivering it.
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, report: &[u8]) -> usize {
        tracing::info!(report = format!("{:02X?}", report), "report");
        report.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    /// Collects every emitted report.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub reports: Vec<Vec<u8>>,
    }

    impl RecordingSink {
        pub fn with_id(&self, id: u8) -> Vec<&Vec<u8>> {
            self.reports.iter().filter(|r| r[0] == id).collect()
        }

        pub fn mouse(&self) -> Vec<RelativeMouseReport> {
            self.with_id(REPORTID_RELATIVE_MOUSE)
                .into_iter()
                .filter_map(|r| RelativeMouseReport::unpack_from_slice(r).ok())
                .collect()
        }

        pub fn keyboard(&self) -> Vec<(u8, u8)> {
            self.with_id(REPORTID_KEYBOARD)
                .into_iter()
                .map(|r| (r[1], r[3]))
                .collect()
        }

        pub fn clear(&mut self) {
            self.reports.clear();
        }
    }

    impl ReportSink for RecordingSink {
        fn emit(&mut self, report: &[u8]) -> usize {
            self.reports.push(report.to_vec());
            report.len()
        }
    }

    #[test]
    fn relative_mouse_layout_and_clamping() {
        let report = RelativeMouseReport::new(MOUSE_BUTTON_2, -3, 400, 1, -1);
        let bytes = report.pack().unwrap();
        assert_eq!(bytes, [0x04, 0x02, 0xfd, 0x7f, 0x01, 0xff]);
        assert_eq!(report.dx(), -3);
        assert_eq!(report.dy(), 127);
    }

    #[test]
    fn scroll_report_is_little_endian() {
        let bytes = ScrollReport::touches((0x0102, 7), (SCROLL_NO_TOUCH, 0))
            .pack()
            .unwrap();
        assert_eq!(bytes, [0x06, 0x00, 0x02, 0x01, 0x07, 0x00, 0xff, 0xff, 0x00, 0x00]);

        let stop = ScrollReport::stop().pack().unwrap();
        assert_eq!(stop[1], ScrollReport::FLAG_STOP);
        assert!(stop[2..].iter().all(|&b| b == 0xff));
    }

    #[test]
    fn keyboard_report_layout() {
        let bytes = KeyboardReport::new(KBD_LGUI_BIT, 0x2b).pack().unwrap();
        assert_eq!(bytes, [0x07, 0x08, 0x00, 0x2b, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn info_report_is_nul_padded() {
        let bytes = InfoReport::new("TM3096").to_bytes();
        assert_eq!(bytes.len(), 65);
        assert_eq!(bytes[0], REPORTID_SETTINGS);
        assert_eq!(&bytes[1..7], b"TM3096");
        assert!(bytes[7..].iter().all(|&b| b == 0));

        let long = "x".repeat(100);
        assert_eq!(InfoReport::new(&long).to_bytes()[64], 0);
    }

    #[test]
    fn parses_host_reports() {
        assert_eq!(
            HostReport::parse(&[REPORTID_SCROLLCTRL, 1]),
            Some(HostReport::ScrollControl {
                inertia_active: true
            })
        );
        assert_eq!(
            HostReport::parse(&[REPORTID_SETTINGS, 3, 0]),
            Some(HostReport::Setting {
                register: 3,
                value: 0
            })
        );
        assert_eq!(HostReport::parse(&[REPORTID_SETTINGS, 3]), None);
        assert_eq!(HostReport::parse(&[0x42, 0, 0]), None);
        assert_eq!(HostReport::parse(&[]), None);
    }

    #[test]
    fn pending_read_sink_drops_without_reader() {
        let (mut sink, rx) = PendingReadSink::new();
        assert_eq!(sink.emit(&[1, 2, 3]), 0);

        let reader = thread::spawn(move || rx.recv_timeout(Duration::from_secs(5)).ok());
        let mut delivered = 0;
        for _ in 0..500 {
            delivered = sink.emit(&[4, 5]);
            if delivered > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert_eq!(delivered, 2);
        assert_eq!(reader.join().unwrap(), Some(vec![4, 5]));
    }

    #[test]
    fn channel_sink_queues_while_consumer_is_busy() {
        let (mut sink, rx) = ChannelSink::new();
        for id in 0..5u8 {
            assert_eq!(sink.emit(&[id, 0]), 2);
        }
        drop(sink);
        let ids: Vec<u8> = rx.iter().map(|r| r[0]).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);

        let (mut sink, rx) = ChannelSink::new();
        drop(rx);
        assert_eq!(sink.emit(&[1]), 0);
    }
}
