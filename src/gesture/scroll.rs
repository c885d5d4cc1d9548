use super::{GestureState, Motion};
use crate::report::{emit_packed, ReportSink, ScrollReport, SCROLL_NO_TOUCH};
use crate::rmi::frame::MAX_FINGERS;

/// Contact age both fingers need before a new scroll starts.
const SCROLL_SETTLE_TICKS: u32 = 4;
/// Ticks a scroll survives without both of its fingers down.
const SCROLL_GRACE_TICKS: u32 = 5;

#[derive(Debug, Clone, Copy, Default)]
pub(super) struct ScrollState {
    /// The two slots carrying the scroll; `Some` while scrolling.
    pub(super) pair: Option<[usize; 2]>,
    ticks_without_pair: u32,
}

fn scroll_coordinate(v: i32) -> u16 {
    if v > 0 {
        u16::try_from(v).unwrap_or(SCROLL_NO_TOUCH)
    } else {
        SCROLL_NO_TOUCH
    }
}

impl GestureState {
    pub(super) fn process_scroll(&mut self, motion: &Motion, sink: &mut dyn ReportSink) -> bool {
        if !self.settings.scroll_enabled {
            return false;
        }

        if motion.above != 2 && self.scroll.pair.is_none() {
            return false;
        }

        let mut first = motion.ids[0];
        let mut second = motion.ids[1];

        if self.scroll.pair.is_none() && !self.scroll_inertia {
            let settled =
                |id: Option<usize>| id.is_some_and(|i| self.slots[i].true_tick >= SCROLL_SETTLE_TICKS);
            if !(settled(first) && settled(second)) {
                return false;
            }
        }

        if let Some(pair) = self.scroll.pair {
            if first.is_none() {
                first = Some(if second != Some(pair[0]) { pair[0] } else { pair[1] });
            }
            if second.is_none() {
                second = Some(if first != Some(pair[0]) { pair[0] } else { pair[1] });
            }
        }
        let (Some(first), Some(second)) = (first, second) else {
            return false;
        };

        let position = |id: usize| {
            self.slots[id].current.map_or((SCROLL_NO_TOUCH, SCROLL_NO_TOUCH), |t| {
                (scroll_coordinate(t.x), scroll_coordinate(t.y))
            })
        };
        emit_packed(sink, &ScrollReport::touches(position(first), position(second)));

        let held = (0..MAX_FINGERS)
            .filter(|&i| self.slots[i].in_contact() && (i == first || i == second))
            .count();

        if held == 2 {
            self.scroll.ticks_without_pair = 0;
        } else {
            self.scroll.ticks_without_pair += 1;
        }

        if held == 2 || self.scroll.ticks_without_pair <= SCROLL_GRACE_TICKS {
            if let (2, [Some(a), Some(b), _]) = (motion.above, motion.ids) {
                if self.scroll.pair.is_none() {
                    tracing::debug!(a, b, "scroll started");
                }
                self.scroll.pair = Some([a, b]);
            }
        } else {
            tracing::debug!("scroll ended");
            self.scroll.pair = None;
        }
        true
    }
}
