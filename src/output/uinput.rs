use super::{OutputEvent, PointerButton, ReportTranslator};
use crate::report::ReportSink;
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, EventType, InputEvent, Key, RelativeAxisType};
use std::io;

/// Keyboard-page usages the gesture engine can send.
const USAGE_KEYS: [(u8, Key); 12] = [
    (0x04, Key::KEY_A),
    (0x06, Key::KEY_C),
    (0x07, Key::KEY_D),
    (0x2b, Key::KEY_TAB),
    (0x4f, Key::KEY_RIGHT),
    (0x50, Key::KEY_LEFT),
    (0x51, Key::KEY_DOWN),
    (0x52, Key::KEY_UP),
    (0xe0, Key::KEY_LEFTCTRL),
    (0xe1, Key::KEY_LEFTSHIFT),
    (0xe2, Key::KEY_LEFTALT),
    (0xe3, Key::KEY_LEFTMETA),
];

fn key_for_usage(usage: u8) -> Option<Key> {
    USAGE_KEYS
        .iter()
        .find(|(u, _)| *u == usage)
        .map(|(_, key)| *key)
}

fn button_key(button: PointerButton) -> Key {
    match button {
        PointerButton::Left => Key::BTN_LEFT,
        PointerButton::Right => Key::BTN_RIGHT,
        PointerButton::Middle => Key::BTN_MIDDLE,
    }
}

/// Virtual pointer and keyboard fed from the gesture engine's reports.
pub struct UinputSink {
    device: VirtualDevice,
    translator: ReportTranslator,
}

impl UinputSink {
    pub fn create(name: &str) -> io::Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for button in [PointerButton::Left, PointerButton::Right, PointerButton::Middle] {
            keys.insert(button_key(button));
        }
        for (_, key) in USAGE_KEYS {
            keys.insert(key);
        }

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()?
            .name(name)
            .with_keys(&keys)?
            .with_relative_axes(&axes)?
            .build()?;

        tracing::info!(name, "virtual input device created");
        Ok(Self {
            device,
            translator: ReportTranslator::new(),
        })
    }

    fn input_events(events: &[OutputEvent]) -> Vec<InputEvent> {
        let mut out = Vec::with_capacity(events.len() * 2);
        for event in events {
            match *event {
                OutputEvent::Button { button, pressed } => {
                    out.push(InputEvent::new(EventType::KEY, button_key(button).code(), i32::from(pressed)));
                }
                OutputEvent::Key { usage, pressed } => match key_for_usage(usage) {
                    Some(key) => out.push(InputEvent::new(EventType::KEY, key.code(), i32::from(pressed))),
                    None => tracing::warn!(usage, "no key for HID usage"),
                },
                OutputEvent::Motion { dx, dy } => {
                    out.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_X.0, dx));
                    out.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_Y.0, dy));
                }
                OutputEvent::Wheel { vertical, horizontal } => {
                    if vertical != 0 {
                        out.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_WHEEL.0, vertical));
                    }
                    if horizontal != 0 {
                        out.push(InputEvent::new(EventType::RELATIVE, RelativeAxisType::REL_HWHEEL.0, horizontal));
                    }
                }
            }
        }
        out
    }
}

impl ReportSink for UinputSink {
    fn emit(&mut self, report: &[u8]) -> usize {
        let events = Self::input_events(&self.translator.translate(report));
        if events.is_empty() {
            return report.len();
        }
        match self.device.emit(&events) {
            Ok(()) => report.len(),
            Err(e) => {
                tracing::warn!(error = %e, "uinput write failed");
                0
            }
        }
    }
}
