use super::f30::ButtonLayout;
use super::protocol::ATTN_REPORT_ID;
use super::DeviceLayout;
use crate::transport::RMI_REPORT_LEN;

pub const FRAME_LEN: usize = RMI_REPORT_LEN;
/// Slots surfaced to the gesture engine.
pub const MAX_FINGERS: usize = 5;
/// Report id a latch holds before the first attention report arrives.
pub const STALE_REPORT_ID: u8 = 0xff;

const FINGER_PRESENT: u8 = 0x01;
const FINGER_RECORD_LEN: usize = 5;
const FRAME_HEADER_LEN: usize = 2;

pub type Frame = [u8; FRAME_LEN];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Touch {
    pub x: i32,
    pub y: i32,
    pub pressure: i32,
    pub width_x: u8,
    pub width_y: u8,
}

impl Touch {
    pub fn is_wide(&self) -> bool {
        self.width_x > self.width_y
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TouchFrame {
    pub touches: [Option<Touch>; MAX_FINGERS],
    /// Clickpad button level; `None` when the frame carried no button data.
    pub button_down: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// Report id 0x00: the device had nothing new.
    NoData,
    /// Not an attention report (or the never-latched marker).
    Skipped(u8),
    Decoded(TouchFrame),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub x: i32,
    pub y: i32,
}

/// Map `value` from `0..=native` onto `0..=out`, truncating.
pub fn scale_axis(value: i32, out: i32, native: i32) -> i32 {
    if native == 0 {
        return value;
    }
    (i64::from(value) * i64::from(out) / i64::from(native)) as i32
}

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_fingers: usize,
    max_x: i32,
    max_y: i32,
    sensor_irq_base: u32,
    sensor_report_size: usize,
    buttons: ButtonLayout,
    button_irq_base: u32,
    button_irq_mask: u32,
    button_report_size: usize,
    resolution: Resolution,
}

impl FrameDecoder {
    pub fn new(layout: &DeviceLayout, resolution: Resolution) -> Self {
        Self {
            max_fingers: layout.sensor.max_fingers,
            max_x: i32::from(layout.sensor.max_x),
            max_y: i32::from(layout.sensor.max_y),
            sensor_irq_base: layout.f11.interrupt_base,
            sensor_report_size: layout.f11.report_size,
            buttons: layout.buttons,
            button_irq_base: layout.f30.interrupt_base,
            button_irq_mask: layout.f30.irq_mask,
            button_report_size: layout.f30.report_size,
            resolution,
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn decode(&self, frame: &Frame) -> FrameStatus {
        match frame[0] {
            0x00 => return FrameStatus::NoData,
            ATTN_REPORT_ID => {}
            other => return FrameStatus::Skipped(other),
        }

        let irq = u32::from(frame[1]);
        let mut out = TouchFrame::default();
        let mut index = FRAME_HEADER_LEN;

        if self.sensor_irq_base < self.button_irq_base {
            index += self.decode_fingers(&frame[index..], &mut out);
            self.decode_buttons(irq, &frame[index.min(FRAME_LEN)..], &mut out);
        } else {
            index += self.decode_buttons(irq, &frame[index..], &mut out);
            self.decode_fingers(&frame[index.min(FRAME_LEN)..], &mut out);
        }

        FrameStatus::Decoded(out)
    }

    fn decode_fingers(&self, data: &[u8], out: &mut TouchFrame) -> usize {
        let state_len = (self.max_fingers >> 2) + 1;

        for slot in 0..self.max_fingers.min(MAX_FINGERS) {
            let Some(&state_byte) = data.get(slot >> 2) else {
                break;
            };
            let state = (state_byte >> ((slot & 0x3) << 1)) & 0x03;
            if state != FINGER_PRESENT {
                continue;
            }
            let start = state_len + FINGER_RECORD_LEN * slot;
            let Some(record) = data.get(start..start + FINGER_RECORD_LEN) else {
                tracing::debug!(slot, "finger record truncated");
                continue;
            };
            out.touches[slot] = Some(self.touch_from_record(record));
        }

        self.sensor_report_size
    }

    fn touch_from_record(&self, record: &[u8]) -> Touch {
        let x = i32::from(record[0]) << 4 | i32::from(record[2] & 0x0f);
        let y = i32::from(record[1]) << 4 | i32::from(record[2] >> 4);
        let y = self.max_y - y;

        Touch {
            x: scale_axis(x, self.resolution.x, self.max_x),
            y: scale_axis(y, self.resolution.y, self.max_y),
            pressure: i32::from(record[4]),
            width_x: record[3] & 0x0f,
            width_y: record[3] >> 4,
        }
    }

    fn decode_buttons(&self, irq: u32, data: &[u8], out: &mut TouchFrame) -> usize {
        if irq & self.button_irq_mask == 0 {
            return 0;
        }
        if data.len() < self.button_report_size {
            tracing::warn!("button interrupt without button data");
            return 0;
        }

        // bit 0 is never treated as a button
        for bit in 1..self.buttons.gpio_led_count {
            if !self.buttons.is_button(bit) {
                continue;
            }
            let Some(&byte) = data.get(usize::from(bit / 8)) else {
                break;
            };
            let mut value = (byte >> (bit & 0x07)) & 1 == 1;
            if self.buttons.is_inverted(bit) {
                value = !value;
            }
            out.button_down = Some(value);
        }

        self.button_report_size
    }
}
