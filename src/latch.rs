use crate::rmi::frame::{Frame, FRAME_LEN, STALE_REPORT_ID};
use std::sync::Mutex;

struct Latched {
    frame: Frame,
    /// Set by the reader, cleared by the timer.
    fresh: bool,
}

/// Last attention frame, shared between the reader and the replay timer.
/// Whole frames are swapped under the lock so neither side sees a torn copy.
pub struct FrameLatch {
    inner: Mutex<Latched>,
}

impl Default for FrameLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLatch {
    pub fn new() -> Self {
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = STALE_REPORT_ID;
        Self {
            inner: Mutex::new(Latched {
                frame,
                fresh: false,
            }),
        }
    }

    pub fn store(&self, frame: &Frame) {
        let mut latched = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        latched.frame = *frame;
        latched.fresh = true;
    }

    /// The latched frame if nothing new arrived since the last call.
    pub fn replay_if_stale(&self) -> Option<Frame> {
        let mut latched = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if latched.fresh {
            latched.fresh = false;
            return None;
        }
        if latched.frame[0] == STALE_REPORT_ID {
            return None;
        }
        Some(latched.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rmi::protocol::ATTN_REPORT_ID;

    #[test]
    fn nothing_to_replay_before_first_frame() {
        let latch = FrameLatch::new();
        assert_eq!(latch.replay_if_stale(), None);
        assert_eq!(latch.replay_if_stale(), None);
    }

    #[test]
    fn fresh_frame_is_not_replayed_in_the_same_period() {
        let latch = FrameLatch::new();
        let mut frame = [0u8; FRAME_LEN];
        frame[0] = ATTN_REPORT_ID;
        frame[5] = 0x42;
        latch.store(&frame);

        assert_eq!(latch.replay_if_stale(), None);
        assert_eq!(latch.replay_if_stale(), Some(frame));
        assert_eq!(latch.replay_if_stale(), Some(frame));

        frame[5] = 0x43;
        latch.store(&frame);
        assert_eq!(latch.replay_if_stale(), None);
        assert_eq!(latch.replay_if_stale().map(|f| f[5]), Some(0x43));
    }
}
