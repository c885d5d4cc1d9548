//! Delivery of synthesized reports to the local input stack.
//!
//! The gesture engine speaks HID reports. [`ReportTranslator`] turns them
//! into press/release and motion events that a platform backend can inject.

#[cfg(target_os = "linux")]
pub mod uinput;

use crate::report::{
    KeyboardReport, ReportSink, RelativeMouseReport, ScrollReport, MOUSE_BUTTON_1, MOUSE_BUTTON_2,
    MOUSE_BUTTON_3, REPORTID_KEYBOARD, REPORTID_RELATIVE_MOUSE, REPORTID_SCROLL, SCROLL_NO_TOUCH,
};
use packed_struct::prelude::*;
use packed_struct::types::SizedInteger;
use std::sync::mpsc::Receiver;
use std::thread;

/// HID usage of the first modifier key (left control).
pub const MODIFIER_USAGE_BASE: u8 = 0xe0;
/// Two-finger travel, in output units, per wheel detent.
const SCROLL_STEP: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Left,
    Right,
    Middle,
}

const BUTTONS: [(u8, PointerButton); 3] = [
    (MOUSE_BUTTON_1, PointerButton::Left),
    (MOUSE_BUTTON_2, PointerButton::Right),
    (MOUSE_BUTTON_3, PointerButton::Middle),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Button { button: PointerButton, pressed: bool },
    /// Keyboard page usage; modifiers use 0xE0..=0xE7.
    Key { usage: u8, pressed: bool },
    Motion { dx: i32, dy: i32 },
    Wheel { vertical: i32, horizontal: i32 },
}

/// Stateful report-to-event conversion: keeps the pressed buttons and keys so
/// that full-state reports become edges.
#[derive(Debug, Default)]
pub struct ReportTranslator {
    buttons: u8,
    keys: Vec<u8>,
    scroll_origin: Option<(i32, i32)>,
    scroll_remainder: (i32, i32),
}

impl ReportTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate(&mut self, report: &[u8]) -> Vec<OutputEvent> {
        let mut events = Vec::new();
        match report.first().copied() {
            Some(REPORTID_RELATIVE_MOUSE) => {
                if let Ok(mouse) = RelativeMouseReport::unpack_from_slice(report) {
                    self.mouse(&mouse, &mut events);
                }
            }
            Some(REPORTID_KEYBOARD) => {
                if let Ok(keyboard) = KeyboardReport::unpack_from_slice(report) {
                    self.keyboard(&keyboard, &mut events);
                }
            }
            Some(REPORTID_SCROLL) => {
                if let Ok(scroll) = ScrollReport::unpack_from_slice(report) {
                    self.scroll(&scroll, &mut events);
                }
            }
            other => tracing::trace!(report_id = ?other, "report not translated"),
        }
        events
    }

    fn mouse(&mut self, report: &RelativeMouseReport, events: &mut Vec<OutputEvent>) {
        for (bit, button) in BUTTONS {
            let was = self.buttons & bit != 0;
            let is = report.button & bit != 0;
            if was != is {
                events.push(OutputEvent::Button {
                    button,
                    pressed: is,
                });
            }
        }
        self.buttons = report.button;

        let (dx, dy) = (report.dx(), report.dy());
        if dx != 0 || dy != 0 {
            events.push(OutputEvent::Motion { dx, dy });
        }
        let wheel = i32::from(report.wheel as i8);
        let hwheel = i32::from(report.hwheel as i8);
        if wheel != 0 || hwheel != 0 {
            events.push(OutputEvent::Wheel {
                vertical: wheel,
                horizontal: hwheel,
            });
        }
    }

    fn keyboard(&mut self, report: &KeyboardReport, events: &mut Vec<OutputEvent>) {
        let mut pressed: Vec<u8> = (0..8)
            .filter(|bit| report.shift_key_flags & (1 << bit) != 0)
            .map(|bit| MODIFIER_USAGE_BASE + bit)
            .collect();
        pressed.extend(report.key_codes.iter().copied().filter(|&k| k != 0));

        for &usage in self.keys.iter().filter(|k| !pressed.contains(k)) {
            events.push(OutputEvent::Key {
                usage,
                pressed: false,
            });
        }
        for &usage in pressed.iter().filter(|k| !self.keys.contains(k)) {
            events.push(OutputEvent::Key {
                usage,
                pressed: true,
            });
        }
        self.keys = pressed;
    }

    /// Two-touch positions become wheel detents from the pair's centroid.
    fn scroll(&mut self, report: &ScrollReport, events: &mut Vec<OutputEvent>) {
        let coords = [
            report.touch1_x.to_primitive(),
            report.touch1_y.to_primitive(),
            report.touch2_x.to_primitive(),
            report.touch2_y.to_primitive(),
        ];
        if report.flag == ScrollReport::FLAG_STOP || coords.contains(&SCROLL_NO_TOUCH) {
            self.scroll_origin = None;
            self.scroll_remainder = (0, 0);
            return;
        }

        let centroid = (
            (i32::from(coords[0]) + i32::from(coords[2])) / 2,
            (i32::from(coords[1]) + i32::from(coords[3])) / 2,
        );
        let Some(origin) = self.scroll_origin.replace(centroid) else {
            return;
        };

        let travel_x = self.scroll_remainder.0 + centroid.0 - origin.0;
        let travel_y = self.scroll_remainder.1 + centroid.1 - origin.1;
        let steps_x = travel_x / SCROLL_STEP;
        let steps_y = travel_y / SCROLL_STEP;
        self.scroll_remainder = (travel_x - steps_x * SCROLL_STEP, travel_y - steps_y * SCROLL_STEP);

        if steps_x != 0 || steps_y != 0 {
            // content follows the fingers
            events.push(OutputEvent::Wheel {
                vertical: steps_y,
                horizontal: -steps_x,
            });
        }
    }
}

/// Drain `reports` into `out` on its own thread until every sender is gone.
pub fn spawn_delivery(
    reports: Receiver<Vec<u8>>,
    mut out: Box<dyn ReportSink + Send>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        for report in reports {
            if out.emit(&report) == 0 {
                tracing::warn!(report_id = report.first().copied(), "report not delivered");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{KBD_LALT_BIT, KBD_LGUI_BIT};

    fn pack<R>(report: R) -> Vec<u8>
    where
        R: PackedStruct,
        R::ByteArray: AsRef<[u8]>,
    {
        report.pack().unwrap().as_ref().to_vec()
    }

    #[test]
    fn mouse_buttons_become_edges() {
        let mut t = ReportTranslator::new();
        let events = t.translate(&pack(RelativeMouseReport::new(MOUSE_BUTTON_1, 3, -2, 0, 0)));
        assert_eq!(
            events,
            vec![
                OutputEvent::Button {
                    button: PointerButton::Left,
                    pressed: true
                },
                OutputEvent::Motion { dx: 3, dy: -2 },
            ]
        );

        let events = t.translate(&pack(RelativeMouseReport::new(MOUSE_BUTTON_2, 0, 0, 0, 0)));
        assert_eq!(
            events,
            vec![
                OutputEvent::Button {
                    button: PointerButton::Left,
                    pressed: false
                },
                OutputEvent::Button {
                    button: PointerButton::Right,
                    pressed: true
                },
            ]
        );
    }

    #[test]
    fn keyboard_reports_press_then_release() {
        let mut t = ReportTranslator::new();
        let events = t.translate(&pack(KeyboardReport::new(KBD_LGUI_BIT, 0x2b)));
        assert_eq!(
            events,
            vec![
                OutputEvent::Key {
                    usage: 0xe3,
                    pressed: true
                },
                OutputEvent::Key {
                    usage: 0x2b,
                    pressed: true
                },
            ]
        );
        let events = t.translate(&pack(KeyboardReport::new(0, 0)));
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, OutputEvent::Key { pressed: false, .. })));
    }

    #[test]
    fn held_alt_survives_tab_release() {
        let mut t = ReportTranslator::new();
        t.translate(&pack(KeyboardReport::new(KBD_LALT_BIT, 0x2b)));
        let events = t.translate(&pack(KeyboardReport::new(KBD_LALT_BIT, 0)));
        assert_eq!(
            events,
            vec![OutputEvent::Key {
                usage: 0x2b,
                pressed: false
            }]
        );
        assert!(t.translate(&pack(KeyboardReport::new(KBD_LALT_BIT, 0))).is_empty());
    }

    #[test]
    fn scroll_positions_become_wheel_steps() {
        let mut t = ReportTranslator::new();
        assert!(t.translate(&pack(ScrollReport::touches((100, 400), (300, 400)))).is_empty());
        assert!(t.translate(&pack(ScrollReport::touches((100, 420), (300, 420)))).is_empty());
        assert_eq!(
            t.translate(&pack(ScrollReport::touches((100, 470), (300, 470)))),
            vec![OutputEvent::Wheel {
                vertical: 2,
                horizontal: 0
            }]
        );
        assert_eq!(
            t.translate(&pack(ScrollReport::touches((160, 470), (360, 470)))),
            vec![OutputEvent::Wheel {
                vertical: 0,
                horizontal: -2
            }]
        );
    }

    #[test]
    fn scroll_stop_resets_the_origin() {
        let mut t = ReportTranslator::new();
        t.translate(&pack(ScrollReport::touches((100, 400), (300, 400))));
        assert!(t.translate(&pack(ScrollReport::stop())).is_empty());
        assert!(t.translate(&pack(ScrollReport::touches((100, 900), (300, 900)))).is_empty());
    }

    #[test]
    fn settings_reports_are_ignored() {
        let mut t = ReportTranslator::new();
        assert!(t.translate(&[0x09, 1, 1]).is_empty());
        assert!(t.translate(&[]).is_empty());
    }
}
