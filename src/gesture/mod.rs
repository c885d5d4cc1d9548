//! Turns decoded touch frames into pointer, scroll and keyboard reports.
//!
//! [`GestureState::process_frame`] runs once per tick. Phases run in a fixed
//! order: motion classification, then swipe, scroll and pointer move (first
//! to claim the tick wins), clickpad button synthesis, per-slot bookkeeping,
//! tap handling, and finally the relative mouse report.

pub mod settings;
mod slots;
mod swipe;
mod scroll;
mod pointer;
mod tap;

use crate::report::{
    emit_packed, KeyboardReport, RelativeMouseReport, ReportSink, ScrollReport, MOUSE_BUTTON_1,
    MOUSE_BUTTON_2,
};
use crate::rmi::frame::{Resolution, TouchFrame, MAX_FINGERS};
use scroll::ScrollState;
use settings::Settings;
use slots::FingerSlot;
use swipe::SwipeState;
use tap::TapState;

/// Slot ids tracked for multi-finger gestures.
const TRACKED_IDS: usize = 3;

/// Result of the threshold pass for one tick.
#[derive(Debug, Clone, Copy, Default)]
struct Motion {
    /// Slots moving above threshold, uncapped.
    above: usize,
    /// The first `TRACKED_IDS` of them, in slot order.
    ids: [Option<usize>; TRACKED_IDS],
    recently_added: usize,
    last_recently_added: Option<usize>,
    contacts: usize,
}

impl Motion {
    fn tracked(&self) -> impl Iterator<Item = usize> + '_ {
        self.ids.iter().flatten().copied()
    }
}

pub struct GestureState {
    pub settings: Settings,
    resolution: Resolution,
    slots: [FingerSlot; MAX_FINGERS],

    /// Physical clickpad button level.
    button_down: bool,
    mouse_down: bool,
    button_mask: u8,

    dx: i32,
    dy: i32,

    /// Slot driving the pointer while a pan is active.
    pan: Option<usize>,
    scroll: ScrollState,
    scroll_inertia: bool,
    swipe: SwipeState,
    tap: TapState,

    last_mouse: RelativeMouseReport,
}

impl GestureState {
    pub fn new(settings: Settings, resolution: Resolution) -> Self {
        Self {
            settings,
            resolution,
            slots: [FingerSlot::default(); MAX_FINGERS],
            button_down: false,
            mouse_down: false,
            button_mask: 0,
            dx: 0,
            dy: 0,
            pan: None,
            scroll: ScrollState::default(),
            scroll_inertia: false,
            swipe: SwipeState::default(),
            tap: TapState::default(),
            last_mouse: RelativeMouseReport::default(),
        }
    }

    /// The host reports whether it is still animating a scroll fling.
    pub fn set_scroll_inertia(&mut self, active: bool) {
        tracing::debug!(active, "scroll inertia");
        self.scroll_inertia = active;
    }

    pub fn scroll_inertia(&self) -> bool {
        self.scroll_inertia
    }

    pub fn process_frame(&mut self, frame: &TouchFrame, sink: &mut dyn ReportSink) {
        if let Some(down) = frame.button_down {
            self.button_down = down;
        }
        for (slot, touch) in self.slots.iter_mut().zip(frame.touches.iter()) {
            slot.current = *touch;
        }

        self.dx = 0;
        self.dy = 0;

        let motion = self.classify();

        if !self.process_swipe(&motion, sink) && !self.process_scroll(&motion, sink) {
            self.process_move(&motion, sink);
        }

        self.synthesize_click(&motion);
        let released = self.update_slots(sink);
        self.tap_to_click(released, sink);

        let (button, dx, dy) = (self.button_mask, self.dx, self.dy);
        self.send_mouse(sink, button, dx, dy);
    }

    fn classify(&self) -> Motion {
        let mut motion = Motion::default();
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.in_contact() {
                motion.contacts += 1;
            }
            if slot.is_recent() {
                motion.recently_added += 1;
                motion.last_recently_added = Some(i);
            }
            if slot.blacklisted || !slot.is_moving() {
                continue;
            }
            if let Some(id) = motion.ids.get_mut(motion.above) {
                *id = Some(i);
            }
            motion.above += 1;
        }
        motion
    }

    /// Per-slot history, release handling and tap-drag carrier binding.
    /// Returns the number of fingers released as taps this tick.
    fn update_slots(&mut self, sink: &mut dyn ReportSink) -> usize {
        let mut released = 0;

        for i in 0..MAX_FINGERS {
            if self.slots[i].in_contact() {
                if self.slots[i].previous.is_none() {
                    self.bind_tap_drag(i);
                }
                self.slots[i].advance();
            } else {
                self.clear_tap_drag(i, sink);
                if self.slots[i].previous.is_some() {
                    self.tap.ticks_since_release = -1;
                }
                if self.slots[i].release() {
                    released += 1;
                }
                if self.pan == Some(i) {
                    self.pan = None;
                }
            }
            self.slots[i].end_tick();
        }
        self.tap.ticks_since_release += 1;

        released
    }

    fn primary_button(&self) -> u8 {
        if self.settings.swap_left_right_fingers {
            MOUSE_BUTTON_2
        } else {
            MOUSE_BUTTON_1
        }
    }

    fn secondary_button(&self) -> u8 {
        if self.settings.swap_left_right_fingers {
            MOUSE_BUTTON_1
        } else {
            MOUSE_BUTTON_2
        }
    }

    /// Wheel fields stay zero; scrolling travels in the scroll report.
    fn send_mouse(&mut self, sink: &mut dyn ReportSink, button: u8, dx: i32, dy: i32) {
        let report = RelativeMouseReport::new(button, dx, dy, 0, 0);
        if report.same_as(&self.last_mouse) {
            return;
        }
        // an undelivered report is retried next tick
        if emit_packed(sink, &report) > 0 {
            self.last_mouse = report;
        }
    }

    fn send_keys(&self, sink: &mut dyn ReportSink, modifiers: u8, key: u8) {
        emit_packed(sink, &KeyboardReport::new(modifiers, key));
    }

    /// Press `modifiers + key`, then release to `held`.
    fn key_pulse(&self, sink: &mut dyn ReportSink, modifiers: u8, key: u8, held: u8) {
        self.send_keys(sink, modifiers, key);
        self.send_keys(sink, held, 0);
    }

    fn stop_scroll(&self, sink: &mut dyn ReportSink) {
        emit_packed(sink, &ScrollReport::stop());
    }
}
