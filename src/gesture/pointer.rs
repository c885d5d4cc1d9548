use super::{GestureState, Motion};
use crate::report::ReportSink;
use crate::rmi::frame::MAX_FINGERS;

/// Contact age before a finger may start moving the pointer.
const PAN_SETTLE_TICKS: usize = 5;
/// Per-tick travel treated as a contact jump.
const MAX_STEP: i32 = 75;
/// Age lead that marks a lower resting contact as a palm or thumb.
const REST_AGE_LEAD: u32 = 15;

impl GestureState {
    pub(super) fn process_move(&mut self, motion: &Motion, sink: &mut dyn ReportSink) -> bool {
        if motion.above != 1 && self.pan.is_none() {
            return false;
        }
        let candidate = motion.ids[0];
        if self.pan.is_none() && candidate.map_or(true, |i| self.slots[i].tick < PAN_SETTLE_TICKS) {
            return false;
        }

        self.stop_scroll(sink);

        let Some(id) = candidate.or(self.pan) else {
            return false;
        };

        let (mut dx, mut dy) = self.slots[id].delta();
        if dx.abs() > MAX_STEP || dy.abs() > MAX_STEP {
            tracing::trace!(id, dx, dy, "pointer jump discarded");
            dx = 0;
            dy = 0;
        }

        self.blacklist_resting(id);

        let multiplier = self.settings.pointer_multiplier;
        self.dx = dx * multiplier / 10;
        self.dy = dy * multiplier / 10;
        self.pan = Some(id);
        true
    }

    fn blacklist_resting(&mut self, id: usize) {
        let Some(pointer) = self.slots[id].current else {
            return;
        };
        let age = self.slots[id].true_tick;

        for j in (0..MAX_FINGERS).filter(|&j| j != id) {
            let slot = &mut self.slots[j];
            if slot.blacklisted {
                continue;
            }
            let below = slot.current.is_some_and(|t| t.y > pointer.y);
            if below && slot.true_tick > age + REST_AGE_LEAD {
                tracing::debug!(slot = j, "resting contact ignored");
                slot.blacklisted = true;
            }
        }
    }
}
