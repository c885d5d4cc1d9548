//! User settings for the gesture engine, addressed by register number the
//! same way the host's settings report does.

pub const REG_POINTER_MULTIPLIER: u8 = 0;
pub const REG_SWAP_LEFT_RIGHT: u8 = 1;
pub const REG_CLICK_WITH_NO_FINGERS: u8 = 2;
pub const REG_MULTI_FINGER_CLICK: u8 = 3;
pub const REG_RIGHT_CLICK_BOTTOM_RIGHT: u8 = 4;
pub const REG_TAP_TO_CLICK: u8 = 5;
pub const REG_MULTI_FINGER_TAP: u8 = 6;
pub const REG_TAP_DRAG: u8 = 7;
pub const REG_THREE_FINGER_TAP_ACTION: u8 = 8;
pub const REG_FOUR_FINGER_TAP: u8 = 9;
pub const REG_SCROLL: u8 = 10;
pub const REG_THREE_FINGER_SWIPE_UP: u8 = 11;
pub const REG_THREE_FINGER_SWIPE_DOWN: u8 = 12;
pub const REG_THREE_FINGER_SWIPE_LEFT_RIGHT: u8 = 13;
pub const REG_FOUR_FINGER_SWIPE_UP: u8 = 14;
pub const REG_FOUR_FINGER_SWIPE_DOWN: u8 = 15;
pub const REG_FOUR_FINGER_SWIPE_LEFT_RIGHT: u8 = 16;
/// Not a setting: the value selects which info string to report.
pub const REG_INFO: u8 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreeFingerTapAction {
    Disabled,
    WheelClick,
    Search,
}

impl From<u8> for ThreeFingerTapAction {
    fn from(v: u8) -> Self {
        match v {
            1 => ThreeFingerTapAction::WheelClick,
            2 => ThreeFingerTapAction::Search,
            _ => ThreeFingerTapAction::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeUpGesture {
    Disabled,
    TaskView,
}

impl From<u8> for SwipeUpGesture {
    fn from(v: u8) -> Self {
        match v {
            1 => SwipeUpGesture::TaskView,
            _ => SwipeUpGesture::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDownGesture {
    Disabled,
    ShowDesktop,
}

impl From<u8> for SwipeDownGesture {
    fn from(v: u8) -> Self {
        match v {
            1 => SwipeDownGesture::ShowDesktop,
            _ => SwipeDownGesture::Disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeGesture {
    Disabled,
    SwitchWorkspace,
    AltTabSwitcher,
}

impl From<u8> for SwipeGesture {
    fn from(v: u8) -> Self {
        match v {
            1 => SwipeGesture::SwitchWorkspace,
            2 => SwipeGesture::AltTabSwitcher,
            _ => SwipeGesture::Disabled,
        }
    }
}

/// Actions bound to one swipe finger count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwipeActions {
    pub up: SwipeUpGesture,
    pub down: SwipeDownGesture,
    pub left_right: SwipeGesture,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Pointer speed in tenths.
    pub pointer_multiplier: i32,
    pub swap_left_right_fingers: bool,
    pub click_with_no_fingers: bool,
    pub multi_finger_click: bool,
    pub right_click_bottom_right: bool,
    pub tap_to_click_enabled: bool,
    pub multi_finger_tap: bool,
    pub tap_drag_enabled: bool,
    pub three_finger_tap_action: ThreeFingerTapAction,
    pub four_finger_tap_enabled: bool,
    pub scroll_enabled: bool,
    pub three_finger_swipe: SwipeActions,
    pub four_finger_swipe: SwipeActions,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pointer_multiplier: 10,
            swap_left_right_fingers: false,
            click_with_no_fingers: true,
            multi_finger_click: true,
            right_click_bottom_right: false,
            tap_to_click_enabled: true,
            multi_finger_tap: true,
            tap_drag_enabled: true,
            three_finger_tap_action: ThreeFingerTapAction::Search,
            four_finger_tap_enabled: true,
            scroll_enabled: true,
            three_finger_swipe: SwipeActions {
                up: SwipeUpGesture::TaskView,
                down: SwipeDownGesture::ShowDesktop,
                left_right: SwipeGesture::AltTabSwitcher,
            },
            four_finger_swipe: SwipeActions {
                up: SwipeUpGesture::TaskView,
                down: SwipeDownGesture::ShowDesktop,
                left_right: SwipeGesture::SwitchWorkspace,
            },
        }
    }
}

impl Settings {
    /// Write one settings register. Returns false for registers that are not
    /// settings, which leaves everything unchanged.
    pub fn apply(&mut self, register: u8, value: u8) -> bool {
        let on = value != 0;
        match register {
            REG_POINTER_MULTIPLIER => self.pointer_multiplier = i32::from(value),
            REG_SWAP_LEFT_RIGHT => self.swap_left_right_fingers = on,
            REG_CLICK_WITH_NO_FINGERS => self.click_with_no_fingers = on,
            REG_MULTI_FINGER_CLICK => self.multi_finger_click = on,
            REG_RIGHT_CLICK_BOTTOM_RIGHT => self.right_click_bottom_right = on,
            REG_TAP_TO_CLICK => self.tap_to_click_enabled = on,
            REG_MULTI_FINGER_TAP => self.multi_finger_tap = on,
            REG_TAP_DRAG => self.tap_drag_enabled = on,
            REG_THREE_FINGER_TAP_ACTION => self.three_finger_tap_action = value.into(),
            REG_FOUR_FINGER_TAP => self.four_finger_tap_enabled = on,
            REG_SCROLL => self.scroll_enabled = on,
            REG_THREE_FINGER_SWIPE_UP => self.three_finger_swipe.up = value.into(),
            REG_THREE_FINGER_SWIPE_DOWN => self.three_finger_swipe.down = value.into(),
            REG_THREE_FINGER_SWIPE_LEFT_RIGHT => self.three_finger_swipe.left_right = value.into(),
            REG_FOUR_FINGER_SWIPE_UP => self.four_finger_swipe.up = value.into(),
            REG_FOUR_FINGER_SWIPE_DOWN => self.four_finger_swipe.down = value.into(),
            REG_FOUR_FINGER_SWIPE_LEFT_RIGHT => self.four_finger_swipe.left_right = value.into(),
            _ => return false,
        }
        tracing::debug!(register, value, "setting changed");
        true
    }

    pub fn swipe_actions(&self, fingers: usize) -> SwipeActions {
        if fingers == 4 {
            self.four_finger_swipe
        } else {
            self.three_finger_swipe
        }
    }
}
