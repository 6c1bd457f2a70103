//! # Input Normalization
//!
//! Turns raw controller readings into the values stored in a
//! [`ControllerState`](super::state::ControllerState).
//!
//! ## Deadzone
//!
//! Any axis with magnitude below [`AXIS_DEADZONE`] is forced to exactly `0.0`
//! to suppress stick drift. Values outside the band pass through unscaled.
//!
//! ## Buttons
//!
//! A button is pressed if its digital flag is set or its analog value exceeds
//! [`BUTTON_ANALOG_THRESHOLD`] (controllers that only expose analog triggers).
//!
//! ## Directional pad
//!
//! Most hardware has no native POV. The last four slots of the sixteen-button
//! layout are read as up/down/left/right and mapped to a compass angle:
//!
//! | Pressed | Angle |
//! |---------|-------|
//! | up + right | 45 |
//! | up + left | 315 |
//! | down + right | 135 |
//! | down + left | 225 |
//! | up | 0 |
//! | down | 180 |
//! | right | 90 |
//! | left | 270 |
//! | none | -1 |
//!
//! Rows are tried top to bottom and the first match wins, so opposing pairs
//! resolve as up+down = 0 and left+right = 90.
//!
//! ```
//! use frc_ds_joystick::joystick::normalize::{apply_deadzone, pov_from_dpad};
//!
//! assert_eq!(apply_deadzone(0.02), 0.0);
//! assert_eq!(pov_from_dpad(true, false, false, true), 45);
//! ```

use super::state::POV_NOT_PRESSED;

/// Axis magnitudes strictly below this are clamped to zero.
pub const AXIS_DEADZONE: f32 = 0.05;

/// Analog button values strictly above this count as pressed.
pub const BUTTON_ANALOG_THRESHOLD: f32 = 0.5;

/// Button slot read as d-pad up.
pub const DPAD_UP_BUTTON: usize = 12;
/// Button slot read as d-pad down.
pub const DPAD_DOWN_BUTTON: usize = 13;
/// Button slot read as d-pad left.
pub const DPAD_LEFT_BUTTON: usize = 14;
/// Button slot read as d-pad right.
pub const DPAD_RIGHT_BUTTON: usize = 15;

/// One raw button reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawButton {
    /// Digital pressed flag.
    pub pressed: bool,
    /// Analog value in `0.0..=1.0`.
    pub value: f32,
}

impl RawButton {
    /// A digital button reading with a matching analog value.
    #[must_use]
    pub fn digital(pressed: bool) -> Self {
        Self {
            pressed,
            value: if pressed { 1.0 } else { 0.0 },
        }
    }

    /// An analog-only reading.
    #[must_use]
    pub fn analog(value: f32) -> Self {
        Self {
            pressed: false,
            value,
        }
    }
}

/// Applies the fixed deadzone to a raw axis reading.
///
/// Non-finite readings become `0.0`; everything else is clamped to
/// `[-1.0, 1.0]` before the deadzone check.
#[must_use]
pub fn apply_deadzone(raw: f32) -> f32 {
    if !raw.is_finite() {
        return 0.0;
    }

    let value = raw.clamp(-1.0, 1.0);
    if value.abs() < AXIS_DEADZONE {
        0.0
    } else {
        value
    }
}

/// Resolves a raw button reading to pressed/released.
#[must_use]
pub fn button_pressed(raw: RawButton) -> bool {
    raw.pressed || raw.value > BUTTON_ANALOG_THRESHOLD
}

/// Maps four d-pad flags to a POV angle, first match wins.
#[must_use]
pub fn pov_from_dpad(up: bool, down: bool, left: bool, right: bool) -> i16 {
    match (up, down, left, right) {
        (true, _, _, true) => 45,
        (true, _, true, _) => 315,
        (_, true, _, true) => 135,
        (_, true, true, _) => 225,
        (true, _, _, _) => 0,
        (_, true, _, _) => 180,
        (_, _, _, true) => 90,
        (_, _, true, _) => 270,
        _ => POV_NOT_PRESSED,
    }
}

/// Synthesizes the POV angle from an already-resolved button list.
///
/// Missing slots (controllers with fewer than sixteen buttons) read as released.
#[must_use]
pub fn pov_from_buttons(buttons: &[bool]) -> i16 {
    let slot = |i: usize| buttons.get(i).copied().unwrap_or(false);
    pov_from_dpad(
        slot(DPAD_UP_BUTTON),
        slot(DPAD_DOWN_BUTTON),
        slot(DPAD_LEFT_BUTTON),
        slot(DPAD_RIGHT_BUTTON),
    )
}
