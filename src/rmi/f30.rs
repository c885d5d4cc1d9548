use super::pdt::{FunctionDescriptor, F30_GPIO};
use super::protocol::RmiClient;
use super::query::has;
use super::RmiError;
use crate::transport::RmiTransport;

const Q0_HAS_LED: u8 = 1 << 2;
const Q0_HAS_GPIO: u8 = 1 << 3;
const Q1_GPIO_LED_COUNT_MASK: u8 = 0x1f;

/// Physical buttons wired to GPIO inputs of function 0x30.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonLayout {
    pub has_gpio: bool,
    pub has_led: bool,
    pub gpio_led_count: u8,
    pub bytes_per_ctrl: usize,
    pub button_count: u8,
    pub button_mask: u32,
    /// Buttons whose pressed level reads as 0 (pulled up).
    pub button_state_mask: u32,
}

impl ButtonLayout {
    pub fn is_button(&self, bit: u8) -> bool {
        self.button_mask & (1 << bit) != 0
    }

    pub fn is_inverted(&self, bit: u8) -> bool {
        self.button_state_mask & (1 << bit) != 0
    }
}

pub fn populate<T: RmiTransport>(
    client: &mut RmiClient<T>,
    f30: Option<&FunctionDescriptor>,
) -> Result<ButtonLayout, RmiError> {
    let f30 = match f30 {
        Some(f) if f.query_base != 0 => f,
        _ => return Err(RmiError::MissingFunction(F30_GPIO)),
    };

    let mut query = [0u8; 2];
    client.read_block(f30.query_base, &mut query)?;

    let has_gpio = has(query[0], Q0_HAS_GPIO);
    let has_led = has(query[0], Q0_HAS_LED);
    let gpio_led_count = query[1] & Q1_GPIO_LED_COUNT_MASK;

    let bytes_per_ctrl = usize::from(gpio_led_count).div_ceil(8);
    // ctrl0 only exists with both GPIO and LED support, ctrl1 always does
    let mut ctrl2_addr = if has_gpio && has_led { bytes_per_ctrl } else { 0 };
    ctrl2_addr += bytes_per_ctrl;

    // ctrl2 holds direction bits, ctrl3 the data bits
    let mut ctrl = vec![0u8; 2 * bytes_per_ctrl];
    client.read_block(f30.control_base + ctrl2_addr as u16, &mut ctrl)?;

    let mut layout = ButtonLayout {
        has_gpio,
        has_led,
        gpio_led_count,
        bytes_per_ctrl,
        ..Default::default()
    };

    for i in 0..gpio_led_count {
        let byte = usize::from(i >> 3);
        let bit = i & 0x07;
        let is_output = (ctrl[byte] >> bit) & 1 == 1;
        let data = (ctrl[byte + bytes_per_ctrl] >> bit) & 1 == 1;

        // input with a pull-up: a physical button
        if !is_output && data {
            layout.button_count += 1;
            layout.button_mask |= 1 << i;
            layout.button_state_mask |= 1 << i;
            tracing::debug!(bit = i, "button found");
        }
    }

    tracing::info!(
        buttons = layout.button_count,
        gpio_led_count,
        "GPIO buttons ready"
    );
    Ok(layout)
}
