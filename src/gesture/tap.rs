use super::settings::ThreeFingerTapAction;
use super::{GestureState, Motion};
use crate::report::{ReportSink, KBD_LGUI_BIT, MOUSE_BUTTON_3};

const KEY_A: u8 = 0x04;
const KEY_C: u8 = 0x06;

/// Ticks a tap-latched button waits for a drag before it lets go.
const TAP_HOLD_TICKS: i32 = 10;
/// Contacts younger than this add to the tap finger count.
const BRIEF_CONTACT_TICKS: u32 = 10;
/// Bottom-edge band, in output units, for the corner right-click.
const BOTTOM_EDGE: i32 = 60;

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct TapState {
    pub(super) down_due_to_tap: bool,
    /// Slot dragging with the tap-latched button.
    pub(super) carrier: Option<usize>,
    ticks_since_click: i32,
    pub(super) ticks_since_release: i32,
}

impl GestureState {
    /// Map the clickpad button edge to a mouse button mask.
    pub(super) fn synthesize_click(&mut self, motion: &Motion) {
        let mut count = motion.recently_added;

        if self.settings.right_click_bottom_right && count == 1 {
            let corner = motion
                .last_recently_added
                .and_then(|i| self.slots[i].current)
                .is_some_and(|t| {
                    t.x > self.resolution.x / 2 && t.y > self.resolution.y - BOTTOM_EDGE
                });
            if corner {
                count = 2;
            }
        }

        if count == 0 {
            count = motion.above;
        }
        if count == 0 {
            count = if self.pan.is_some() { 1 } else { motion.contacts };
            if count == 0 && self.settings.click_with_no_fingers {
                count = 1;
            }
        }
        let count = count.min(3);

        if self.tap.down_due_to_tap {
            return;
        }

        if self.button_down && !self.mouse_down {
            self.mouse_down = true;
            self.tap.ticks_since_click = 0;
            self.button_mask = match count {
                1 => self.primary_button(),
                2 if self.settings.multi_finger_click => self.secondary_button(),
                3 if self.settings.multi_finger_click => MOUSE_BUTTON_3,
                _ => 0,
            };
            tracing::debug!(fingers = count, mask = self.button_mask, "clickpad pressed");
        } else if self.mouse_down && !self.button_down {
            self.mouse_down = false;
            self.button_mask = 0;
        }
    }

    /// A new contact shortly after a tap carries the latched button.
    pub(super) fn bind_tap_drag(&mut self, slot: usize) {
        if self.tap.ticks_since_release < TAP_HOLD_TICKS
            && self.tap.down_due_to_tap
            && self.tap.carrier.is_none()
            && self.settings.tap_drag_enabled
        {
            tracing::debug!(slot, "tap drag");
            self.tap.carrier = Some(slot);
        }
    }

    /// The tap-drag finger lifted. A brief second touch commits as a
    /// double click.
    pub(super) fn clear_tap_drag(&mut self, slot: usize, sink: &mut dyn ReportSink) {
        if self.tap.carrier != Some(slot) || !self.tap.down_due_to_tap {
            return;
        }
        if self.slots[slot].tick < BRIEF_CONTACT_TICKS as usize {
            let mask = self.button_mask;
            self.send_mouse(sink, 0, 0, 0);
            self.send_mouse(sink, mask, 0, 0);
        }
        self.tap.down_due_to_tap = false;
        self.tap.carrier = None;
        self.mouse_down = false;
        self.button_mask = 0;
    }

    pub(super) fn tap_to_click(&mut self, released: usize, sink: &mut dyn ReportSink) {
        if !self.settings.tap_to_click_enabled || self.scroll_inertia {
            return;
        }

        self.tap.ticks_since_click += 1;
        if self.tap.down_due_to_tap && self.tap.carrier.is_none() {
            if self.tap.ticks_since_click > TAP_HOLD_TICKS {
                self.tap.down_due_to_tap = false;
                self.mouse_down = false;
                self.button_mask = 0;
            }
            return;
        }
        if self.mouse_down {
            self.tap.ticks_since_click = 0;
            return;
        }
        if released == 0 {
            return;
        }

        let brief = self
            .slots
            .iter()
            .filter(|s| s.true_tick > 0 && s.true_tick < BRIEF_CONTACT_TICKS)
            .count();
        let fingers = released + brief;

        let mask = match fingers {
            1 => self.primary_button(),
            2 if self.settings.multi_finger_tap => self.secondary_button(),
            3 if self.settings.multi_finger_tap => match self.settings.three_finger_tap_action {
                ThreeFingerTapAction::WheelClick => MOUSE_BUTTON_3,
                ThreeFingerTapAction::Search => {
                    self.key_pulse(sink, KBD_LGUI_BIT, KEY_C, 0);
                    0
                }
                ThreeFingerTapAction::Disabled => 0,
            },
            4 if self.settings.four_finger_tap_enabled => {
                self.key_pulse(sink, KBD_LGUI_BIT, KEY_A, 0);
                0
            }
            _ => 0,
        };
        tracing::trace!(fingers, mask, "tap");

        if mask != 0 && self.tap.ticks_since_click > TAP_HOLD_TICKS && self.tap.ticks_since_release == 0 {
            self.tap.carrier = None;
            self.tap.down_due_to_tap = true;
            self.button_mask = mask;
            self.mouse_down = true;
            self.tap.ticks_since_click = 0;
        }
    }
}
