use super::settings::{SwipeDownGesture, SwipeGesture, SwipeUpGesture};
use super::{GestureState, Motion, TRACKED_IDS};
use crate::report::{ReportSink, KBD_LALT_BIT, KBD_LCONTROL_BIT, KBD_LGUI_BIT, KBD_LSHIFT_BIT};

const KEY_TAB: u8 = 0x2b;
const KEY_D: u8 = 0x07;
const KEY_RIGHT: u8 = 0x4f;
const KEY_LEFT: u8 = 0x50;
const KEY_DOWN: u8 = 0x51;
const KEY_UP: u8 = 0x52;

/// Accumulated travel before a direction is picked.
const AXIS_THRESHOLD: i32 = 15;
/// Accumulated travel before a one-shot action fires.
const FIRE_THRESHOLD: i32 = 50;
/// Ticks of accumulation before the direction is judged.
const SETTLE_TICKS: u32 = 5;
/// Ticks after which a fired episode may fire again.
const EPISODE_TICKS: u32 = 25;

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct SwipeState {
    x: i32,
    y: i32,
    tick: u32,
    pub(super) fired: bool,
    /// Slots holding the alt-tab switcher open.
    pub(super) alt_tab: Option<[usize; TRACKED_IDS]>,
}

impl SwipeState {
    fn reset(&mut self) {
        self.x = 0;
        self.y = 0;
        self.tick = 0;
        self.fired = false;
    }

    fn fire(&mut self) {
        self.x = 0;
        self.y = 0;
        self.fired = true;
    }
}

impl GestureState {
    pub(super) fn process_swipe(&mut self, motion: &Motion, sink: &mut dyn ReportSink) -> bool {
        if self.swipe.alt_tab.is_some() {
            self.send_keys(sink, KBD_LALT_BIT, 0);
        }

        let fingers = motion.above;
        if fingers != 3 && fingers != 4 {
            self.release_alt_tab(sink);
            self.swipe.reset();
            return false;
        }

        self.stop_scroll(sink);

        // four-finger swipes are tracked through the first three ids only
        let mut ids = [0usize; TRACKED_IDS];
        let (mut sum_x, mut sum_y, mut travel_x, mut travel_y) = (0, 0, 0, 0);
        for (n, id) in motion.tracked().enumerate() {
            ids[n] = id;
            let (dx, dy) = self.slots[id].delta();
            sum_x += dx;
            sum_y += dy;
            travel_x += dx.abs();
            travel_y += dy.abs();
        }

        self.swipe.x += sum_x / TRACKED_IDS as i32;
        self.swipe.y += sum_y / TRACKED_IDS as i32;
        self.swipe.tick += 1;

        if self.swipe.tick > SETTLE_TICKS && !self.swipe.fired {
            if travel_y > travel_x {
                self.vertical_swipe(fingers, ids, sink);
            } else {
                self.horizontal_swipe(fingers, ids, sink);
            }
        } else if self.swipe.tick > EPISODE_TICKS {
            self.swipe.reset();
        }
        true
    }

    fn vertical_swipe(&mut self, fingers: usize, ids: [usize; TRACKED_IDS], sink: &mut dyn ReportSink) {
        let y = self.swipe.y;
        if y.abs() <= AXIS_THRESHOLD {
            return;
        }
        let actions = self.settings.swipe_actions(fingers);
        let showing = self.swipe.alt_tab.is_some();

        if y < 0 {
            if showing {
                self.swipe.alt_tab = Some(ids);
                self.key_pulse(sink, KBD_LALT_BIT, KEY_UP, KBD_LALT_BIT);
                self.swipe.fire();
            } else if actions.up == SwipeUpGesture::TaskView && y.abs() > FIRE_THRESHOLD {
                tracing::debug!(fingers, "swipe up: task view");
                self.key_pulse(sink, KBD_LGUI_BIT, KEY_TAB, 0);
                self.swipe.fire();
            }
        } else if showing {
            self.swipe.alt_tab = Some(ids);
            self.key_pulse(sink, KBD_LALT_BIT, KEY_DOWN, KBD_LALT_BIT);
            self.swipe.fire();
        } else if actions.down == SwipeDownGesture::ShowDesktop && y.abs() > FIRE_THRESHOLD {
            tracing::debug!(fingers, "swipe down: show desktop");
            self.key_pulse(sink, KBD_LGUI_BIT, KEY_D, 0);
            self.swipe.fire();
        }
    }

    fn horizontal_swipe(&mut self, fingers: usize, ids: [usize; TRACKED_IDS], sink: &mut dyn ReportSink) {
        let x = self.swipe.x;
        if x.abs() <= AXIS_THRESHOLD {
            return;
        }
        let action = self.settings.swipe_actions(fingers).left_right;
        let showing = self.swipe.alt_tab.is_some();

        if action == SwipeGesture::SwitchWorkspace && !showing {
            if x.abs() > FIRE_THRESHOLD {
                let key = if x > 0 { KEY_LEFT } else { KEY_RIGHT };
                tracing::debug!(fingers, x, "swipe: switch workspace");
                self.key_pulse(sink, KBD_LGUI_BIT | KBD_LCONTROL_BIT, key, 0);
                self.swipe.fire();
            }
            return;
        }
        if action != SwipeGesture::AltTabSwitcher && !showing {
            return;
        }

        self.swipe.alt_tab = Some(ids);
        if showing {
            let key = if x > 0 { KEY_RIGHT } else { KEY_LEFT };
            self.key_pulse(sink, KBD_LALT_BIT, key, KBD_LALT_BIT);
        } else {
            let modifiers = if x > 0 {
                KBD_LALT_BIT
            } else {
                KBD_LALT_BIT | KBD_LSHIFT_BIT
            };
            tracing::debug!(fingers, "alt-tab switcher shown");
            self.key_pulse(sink, modifiers, KEY_TAB, KBD_LALT_BIT);
        }
        self.swipe.fire();
    }

    /// Let go of Alt once none of the switcher's fingers are still down.
    fn release_alt_tab(&mut self, sink: &mut dyn ReportSink) {
        let Some(ids) = self.swipe.alt_tab else {
            return;
        };
        let holding = self
            .slots
            .iter()
            .enumerate()
            .any(|(i, slot)| slot.in_contact() && ids.contains(&i));
        if !holding {
            self.send_keys(sink, 0, 0);
            self.swipe.alt_tab = None;
            tracing::debug!("alt-tab switcher released");
        }
    }
}
