use crate::rmi::frame::Touch;

/// Samples kept in the sliding displacement window.
pub const FLEX_WINDOW: usize = 10;
/// Squared average displacement a slot must exceed to count as moving.
const MOTION_THRESHOLD_SQ: i32 = 2;
/// Average pressure above which a short contact counts as a tap.
const TAP_PRESSURE: i32 = 7;

/// Per-finger history kept across ticks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FingerSlot {
    pub current: Option<Touch>,
    pub previous: Option<Touch>,
    /// Contact age, capped at the window length.
    pub tick: usize,
    /// Contact age, uncapped.
    pub true_tick: u32,
    pub flex_x: i32,
    pub flex_y: i32,
    total_x: i32,
    total_y: i32,
    total_p: i32,
    history_x: [i32; FLEX_WINDOW],
    history_y: [i32; FLEX_WINDOW],
    pub blacklisted: bool,
}

impl FingerSlot {
    pub fn in_contact(&self) -> bool {
        self.current.is_some()
    }

    /// Movement since the previous tick, zero unless both ends are touches.
    pub fn delta(&self) -> (i32, i32) {
        match (self.current, self.previous) {
            (Some(c), Some(p)) => (c.x - p.x, c.y - p.y),
            _ => (0, 0),
        }
    }

    pub fn is_moving(&self) -> bool {
        if self.tick == 0 {
            return false;
        }
        let avg_x = self.flex_x / self.tick as i32;
        let avg_y = self.flex_y / self.tick as i32;
        avg_x * avg_x + avg_y * avg_y > MOTION_THRESHOLD_SQ
    }

    pub fn is_recent(&self) -> bool {
        self.true_tick > 0 && self.true_tick < 30
    }

    /// Account one tick of contact.
    pub fn advance(&mut self) {
        self.true_tick += 1;

        let sample = match (self.current, self.previous) {
            (Some(c), Some(p)) => Some(((c.x - p.x).abs(), (c.y - p.y).abs(), c.pressure)),
            _ => None,
        };

        if self.tick < FLEX_WINDOW {
            if let Some((abs_x, abs_y, pressure)) = sample {
                self.total_x += abs_x;
                self.total_y += abs_y;
                self.total_p += pressure;
                self.flex_x = self.total_x;
                self.flex_y = self.total_y;
                self.history_x[self.tick] = abs_x;
                self.history_y[self.tick] = abs_y;
            }
            self.tick += 1;
        } else if let Some((abs_x, abs_y, _)) = sample {
            self.total_x += abs_x;
            self.total_y += abs_y;

            self.flex_x -= self.history_x[0];
            self.flex_y -= self.history_y[0];
            self.history_x.rotate_left(1);
            self.history_y.rotate_left(1);
            self.history_x[FLEX_WINDOW - 1] = abs_x;
            self.history_y[FLEX_WINDOW - 1] = abs_y;
            self.flex_x += abs_x;
            self.flex_y += abs_y;
        }
    }

    /// Forget the finger that just lifted. Returns true when it was a short,
    /// firm contact that counts toward a tap.
    pub fn release(&mut self) -> bool {
        let tapped = self.tick > 0
            && self.tick < FLEX_WINDOW
            && self.total_p / self.tick as i32 > TAP_PRESSURE;

        *self = FingerSlot {
            current: self.current,
            previous: self.previous,
            ..FingerSlot::default()
        };
        tapped
    }

    pub fn end_tick(&mut self) {
        self.previous = self.current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(x: i32, y: i32, pressure: i32) -> Option<Touch> {
        Some(Touch {
            x,
            y,
            pressure,
            width_x: 1,
            width_y: 1,
        })
    }

    fn step(slot: &mut FingerSlot, t: Option<Touch>) {
        slot.current = t;
        if slot.in_contact() {
            slot.advance();
        }
        slot.end_tick();
    }

    #[test]
    fn flex_window_slides_to_latest_ten_samples() {
        let mut slot = FingerSlot::default();
        let mut x = 0;
        step(&mut slot, touch(x, 0, 20));
        for _ in 0..5 {
            x += 20;
            step(&mut slot, touch(x, 0, 20));
        }
        for _ in 0..12 {
            x += 3;
            step(&mut slot, touch(x, 0, 20));
        }
        assert_eq!(slot.tick, FLEX_WINDOW);
        assert_eq!(slot.true_tick, 18);
        assert_eq!(slot.flex_x, 30);
        assert_eq!(slot.flex_y, 0);
        assert_eq!(slot.total_x, 100 + 36);
    }

    #[test]
    fn first_contact_tick_has_no_displacement() {
        let mut slot = FingerSlot::default();
        step(&mut slot, touch(500, 500, 30));
        assert_eq!(slot.tick, 1);
        assert_eq!(slot.flex_x, 0);
        assert!(!slot.is_moving());

        step(&mut slot, touch(504, 500, 30));
        assert_eq!(slot.flex_x, 4);
        assert!(slot.is_moving());
    }

    #[test]
    fn release_clears_accumulators() {
        let mut slot = FingerSlot::default();
        step(&mut slot, touch(0, 0, 40));
        step(&mut slot, touch(10, 10, 40));
        step(&mut slot, touch(20, 20, 40));
        slot.blacklisted = true;

        slot.current = None;
        assert!(slot.release());
        assert_eq!((slot.tick, slot.true_tick), (0, 0));
        assert_eq!((slot.total_x, slot.total_y, slot.total_p), (0, 0, 0));
        assert_eq!((slot.flex_x, slot.flex_y), (0, 0));
        assert!(slot.history_x.iter().all(|&h| h == 0));
        assert!(!slot.blacklisted);
    }

    #[test]
    fn light_or_long_contacts_are_not_taps() {
        let mut light = FingerSlot::default();
        step(&mut light, touch(0, 0, 6));
        step(&mut light, touch(0, 0, 6));
        light.current = None;
        assert!(!light.release());

        let mut long = FingerSlot::default();
        for _ in 0..FLEX_WINDOW {
            step(&mut long, touch(0, 0, 60));
        }
        long.current = None;
        assert!(!long.release());
    }
}
