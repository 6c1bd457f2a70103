//! # Controller State
//!
//! The per-controller record shared by the registry, the safety gate and the
//! dashboard read path.

use serde::Serialize;

/// Maximum number of axes carried per controller.
pub const MAX_AXES: usize = 6;

/// Maximum number of buttons carried per controller (FRC sixteen-button layout).
pub const MAX_BUTTONS: usize = 16;

/// Number of POV entries synthesized per controller.
pub const POV_COUNT: usize = 1;

/// POV value reported when no direction is pressed.
pub const POV_NOT_PRESSED: i16 = -1;

/// Snapshot of one connected input source.
///
/// Axis values already have the deadzone applied. Nothing here has been
/// through the safety gate; only the dashboard path reads these directly.
///
/// # Examples
///
/// ```
/// use frc_ds_joystick::joystick::state::{ControllerState, POV_NOT_PRESSED};
///
/// let state = ControllerState::new(0, "Gamepad");
/// assert!(state.axes.is_empty());
/// assert_eq!(state.povs, vec![POV_NOT_PRESSED]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerState {
    /// Dense registry slot, `0..count`.
    pub id: usize,
    /// Display label.
    pub name: String,
    /// Normalized axes in `[-1.0, 1.0]`.
    pub axes: Vec<f32>,
    /// Button states, bit order as transmitted.
    pub buttons: Vec<bool>,
    /// POV angles in degrees, or [`POV_NOT_PRESSED`].
    pub povs: Vec<i16>,
    /// Whether the safety gate suppresses this controller.
    pub blacklisted: bool,
}

impl ControllerState {
    /// Creates an empty state with a released POV.
    #[must_use]
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            axes: Vec::new(),
            buttons: Vec::new(),
            povs: vec![POV_NOT_PRESSED; POV_COUNT],
            blacklisted: false,
        }
    }
}
