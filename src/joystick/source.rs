//! # Controller Sources
//!
//! The capability interface every input source implements, and the sampling
//! step that turns a source into a [`ControllerState`].

use super::normalize::{apply_deadzone, button_pressed, pov_from_buttons, RawButton};
use super::state::{ControllerState, MAX_AXES, MAX_BUTTONS};
use crate::error::Result;

/// Narrow read interface over a physical, virtual or simulated controller.
///
/// Readers return `None` for indices the source cannot provide; the sampler
/// treats those as neutral.
pub trait RawController: Send {
    /// Platform index identifying the underlying device.
    fn hardware_index(&self) -> usize;

    /// Human-readable device name.
    fn name(&self) -> &str;

    /// Number of axes the device reports.
    fn axis_count(&self) -> usize;

    /// Raw axis reading, nominally in `[-1.0, 1.0]`.
    fn axis(&self, index: usize) -> Option<f32>;

    /// Number of buttons the device reports.
    fn button_count(&self) -> usize;

    /// Raw button reading.
    fn button(&self, index: usize) -> Option<RawButton>;

    /// Pulls fresh readings from the device. Called once per poll tick.
    ///
    /// An error means the device is gone.
    fn refresh(&mut self) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for dyn RawController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawController")
            .field("hardware_index", &self.hardware_index())
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Re-samples `source` into `state`, keeping `id`, `name` and `blacklisted`.
///
/// Axes beyond [`MAX_AXES`] and buttons beyond [`MAX_BUTTONS`] are dropped.
pub fn sample_into(source: &dyn RawController, state: &mut ControllerState) {
    let axis_count = source.axis_count().min(MAX_AXES);
    state.axes.clear();
    state
        .axes
        .extend((0..axis_count).map(|i| apply_deadzone(source.axis(i).unwrap_or(0.0))));

    let button_count = source.button_count().min(MAX_BUTTONS);
    state.buttons.clear();
    state.buttons.extend(
        (0..button_count).map(|i| source.button(i).map(button_pressed).unwrap_or(false)),
    );

    let pov = pov_from_buttons(&state.buttons);
    for slot in state.povs.iter_mut() {
        *slot = pov;
    }
}

/// In-memory controller with directly settable readings.
///
/// Used by tests and the demo console; behaves like any other source.
///
/// # Examples
///
/// ```
/// use frc_ds_joystick::joystick::source::{RawController, SimulatedController};
///
/// let mut pad = SimulatedController::new(7, "Sim", 2, 3);
/// pad.set_axis(0, 0.75);
/// pad.set_button(2, true);
/// assert_eq!(pad.axis(0), Some(0.75));
/// assert_eq!(pad.hardware_index(), 7);
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedController {
    hardware_index: usize,
    name: String,
    axes: Vec<f32>,
    buttons: Vec<RawButton>,
    disconnected: bool,
}

impl SimulatedController {
    /// Creates a neutral controller with the given shape.
    #[must_use]
    pub fn new(hardware_index: usize, name: &str, axis_count: usize, button_count: usize) -> Self {
        Self {
            hardware_index,
            name: name.to_string(),
            axes: vec![0.0; axis_count],
            buttons: vec![RawButton::default(); button_count],
            disconnected: false,
        }
    }

    /// Sets an axis; out-of-range indices are ignored.
    pub fn set_axis(&mut self, index: usize, value: f32) {
        if let Some(axis) = self.axes.get_mut(index) {
            *axis = value;
        }
    }

    /// Sets a digital button; out-of-range indices are ignored.
    pub fn set_button(&mut self, index: usize, pressed: bool) {
        if let Some(button) = self.buttons.get_mut(index) {
            *button = RawButton::digital(pressed);
        }
    }

    /// Sets an analog-only button value.
    pub fn set_button_value(&mut self, index: usize, value: f32) {
        if let Some(button) = self.buttons.get_mut(index) {
            *button = RawButton::analog(value);
        }
    }

    /// Makes the next refresh fail as if the device was unplugged.
    pub fn unplug(&mut self) {
        self.disconnected = true;
    }
}

impl RawController for SimulatedController {
    fn hardware_index(&self) -> usize {
        self.hardware_index
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn axis_count(&self) -> usize {
        self.axes.len()
    }

    fn axis(&self, index: usize) -> Option<f32> {
        self.axes.get(index).copied()
    }

    fn button_count(&self) -> usize {
        self.buttons.len()
    }

    fn button(&self, index: usize) -> Option<RawButton> {
        self.buttons.get(index).copied()
    }

    fn refresh(&mut self) -> Result<()> {
        if self.disconnected {
            return Err(crate::error::JoystickError::Controller(format!(
                "{} disconnected",
                self.name
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::joystick::normalize::{DPAD_RIGHT_BUTTON, DPAD_UP_BUTTON};
    use crate::joystick::state::POV_NOT_PRESSED;

    /// Source that claims more readings than it can deliver.
    struct Truncated;

    impl RawController for Truncated {
        fn hardware_index(&self) -> usize {
            0
        }
        fn name(&self) -> &str {
            "truncated"
        }
        fn axis_count(&self) -> usize {
            3
        }
        fn axis(&self, index: usize) -> Option<f32> {
            (index == 0).then_some(0.8)
        }
        fn button_count(&self) -> usize {
            2
        }
        fn button(&self, _index: usize) -> Option<RawButton> {
            None
        }
    }

    #[test]
    fn test_sample_applies_deadzone_and_threshold() {
        let mut pad = SimulatedController::new(0, "Pad", 2, 2);
        pad.set_axis(0, 0.03);
        pad.set_axis(1, -0.6);
        pad.set_button_value(0, 0.9);
        pad.set_button_value(1, 0.2);

        let mut state = ControllerState::new(0, "Pad");
        sample_into(&pad, &mut state);

        assert_eq!(state.axes, vec![0.0, -0.6]);
        assert_eq!(state.buttons, vec![true, false]);
        assert_eq!(state.povs, vec![POV_NOT_PRESSED]);
    }

    #[test]
    fn test_sample_truncates_to_limits() {
        let pad = SimulatedController::new(0, "Big", 10, 20);
        let mut state = ControllerState::new(0, "Big");
        sample_into(&pad, &mut state);

        assert_eq!(state.axes.len(), MAX_AXES);
        assert_eq!(state.buttons.len(), MAX_BUTTONS);
    }

    #[test]
    fn test_sample_synthesizes_pov() {
        let mut pad = SimulatedController::new(0, "Pad", 0, 16);
        pad.set_button(DPAD_UP_BUTTON, true);
        pad.set_button(DPAD_RIGHT_BUTTON, true);

        let mut state = ControllerState::new(0, "Pad");
        sample_into(&pad, &mut state);

        assert_eq!(state.povs, vec![45]);
        // The d-pad slots stay visible as buttons too
        assert!(state.buttons[DPAD_UP_BUTTON]);
    }

    #[test]
    fn test_sample_missing_readings_are_neutral() {
        let mut state = ControllerState::new(0, "truncated");
        sample_into(&Truncated, &mut state);

        assert_eq!(state.axes, vec![0.8, 0.0, 0.0]);
        assert_eq!(state.buttons, vec![false, false]);
    }

    #[test]
    fn test_sample_keeps_identity_fields() {
        let pad = SimulatedController::new(4, "Pad", 1, 1);
        let mut state = ControllerState::new(2, "Label");
        state.blacklisted = true;
        sample_into(&pad, &mut state);

        assert_eq!(state.id, 2);
        assert_eq!(state.name, "Label");
        assert!(state.blacklisted);
    }

    #[test]
    fn test_simulated_unplug() {
        let mut pad = SimulatedController::new(0, "Pad", 1, 1);
        assert!(pad.refresh().is_ok());
        pad.unplug();
        assert!(pad.refresh().is_err());
    }

    #[test]
    fn test_simulated_ignores_out_of_range() {
        let mut pad = SimulatedController::new(0, "Pad", 1, 1);
        pad.set_axis(5, 1.0);
        pad.set_button(9, true);
        assert_eq!(pad.axis(5), None);
        assert_eq!(pad.button(9), None);
    }
}
