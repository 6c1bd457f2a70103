//! # Safety Gate
//!
//! The single choke point between raw controller state and anything that is
//! transmitted to the robot.
//!
//! Every read checks the armed flag and the blacklist for that exact field at
//! the moment it is made. While disarmed, or for a blacklisted controller, the
//! gate returns neutral values: `0.0` axes, released buttons, and
//! [`POV_NOT_PRESSED`]. Unknown ids and indices read neutral too.
//!
//! ```
//! use frc_ds_joystick::joystick::registry::ControllerRegistry;
//! use frc_ds_joystick::joystick::source::SimulatedController;
//! use frc_ds_joystick::safety::SafetyGate;
//!
//! let mut registry = ControllerRegistry::new();
//! let mut pad = SimulatedController::new(0, "Pad", 1, 1);
//! pad.set_axis(0, 1.0);
//! registry.add_controller(Box::new(pad));
//!
//! let mut gate = SafetyGate::new();
//! assert_eq!(gate.read_axis(&registry, 0, 0), 0.0);
//!
//! gate.set_armed(true);
//! assert_eq!(gate.read_axis(&registry, 0, 0), 1.0);
//! ```

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::joystick::registry::{ControllerRegistry, MAX_CONTROLLERS};
use crate::joystick::state::POV_NOT_PRESSED;

/// Gated view of one controller, ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct GatedController {
    /// Gated axis values.
    pub axes: Vec<f32>,
    /// Gated button states.
    pub buttons: Vec<bool>,
    /// Gated POV angles.
    pub povs: Vec<i16>,
}

/// Armed flag and blacklist.
///
/// Starts disarmed with an empty blacklist.
#[derive(Debug, Clone, Default)]
pub struct SafetyGate {
    armed: bool,
    blacklist: BTreeSet<usize>,
}

impl SafetyGate {
    /// Creates a disarmed gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the robot may receive non-neutral input.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Sets the armed flag. Takes effect on the next read.
    pub fn set_armed(&mut self, armed: bool) {
        if self.armed != armed {
            info!("Joystick output {}", if armed { "armed" } else { "disarmed" });
        }
        self.armed = armed;
    }

    /// Drops to disarmed after losing the robot status feed.
    pub fn link_lost(&mut self) {
        if self.armed {
            warn!("Robot status link lost, disarming joystick output");
        }
        self.armed = false;
    }

    /// Adds or removes `id` from the blacklist.
    ///
    /// Ids at or past [`MAX_CONTROLLERS`] can never be registered and are ignored.
    pub fn set_blacklisted(&mut self, id: usize, blacklisted: bool) {
        if id >= MAX_CONTROLLERS {
            debug!("Ignoring blacklist change for out-of-range id {}", id);
            return;
        }
        let changed = if blacklisted {
            self.blacklist.insert(id)
        } else {
            self.blacklist.remove(&id)
        };
        if changed {
            info!(
                "Controller {} {}",
                id,
                if blacklisted { "blacklisted" } else { "removed from blacklist" }
            );
        }
    }

    /// Whether `id` is blacklisted.
    #[must_use]
    pub fn is_blacklisted(&self, id: usize) -> bool {
        self.blacklist.contains(&id)
    }

    /// Keeps blacklist entries attached to their controllers after the
    /// registry re-indexes around a removed id.
    pub fn controller_removed(&mut self, removed: usize) {
        self.blacklist = self
            .blacklist
            .iter()
            .filter(|&&id| id != removed)
            .map(|&id| if id > removed { id - 1 } else { id })
            .collect();
    }

    /// Shifts blacklist entries up when a controller is inserted at
    /// `inserted`, as happens when a physical pad joins ahead of the virtual
    /// controller.
    pub fn controller_inserted(&mut self, inserted: usize) {
        self.blacklist = self
            .blacklist
            .iter()
            .map(|&id| if id >= inserted { id + 1 } else { id })
            .collect();
    }

    /// Disarms and clears the blacklist.
    pub fn reset(&mut self) {
        self.armed = false;
        self.blacklist.clear();
    }

    fn permits(&self, id: usize) -> bool {
        self.armed && !self.blacklist.contains(&id)
    }

    /// Gated axis read.
    #[must_use]
    pub fn read_axis(&self, registry: &ControllerRegistry, id: usize, axis: usize) -> f32 {
        if !self.permits(id) {
            return 0.0;
        }
        registry
            .state(id)
            .and_then(|state| state.axes.get(axis).copied())
            .unwrap_or(0.0)
    }

    /// Gated button read.
    #[must_use]
    pub fn read_button(&self, registry: &ControllerRegistry, id: usize, button: usize) -> bool {
        if !self.permits(id) {
            return false;
        }
        registry
            .state(id)
            .and_then(|state| state.buttons.get(button).copied())
            .unwrap_or(false)
    }

    /// Gated POV read.
    #[must_use]
    pub fn read_pov(&self, registry: &ControllerRegistry, id: usize, pov: usize) -> i16 {
        if !self.permits(id) {
            return POV_NOT_PRESSED;
        }
        registry
            .state(id)
            .and_then(|state| state.povs.get(pov).copied())
            .unwrap_or(POV_NOT_PRESSED)
    }

    /// Builds the gated record for `id` from individual field reads.
    ///
    /// Counts come from the registry unmasked; only values are gated.
    #[must_use]
    pub fn gated_controller(&self, registry: &ControllerRegistry, id: usize) -> Option<GatedController> {
        let state = registry.state(id)?;
        Some(GatedController {
            axes: (0..state.axes.len())
                .map(|i| self.read_axis(registry, id, i))
                .collect(),
            buttons: (0..state.buttons.len())
                .map(|i| self.read_button(registry, id, i))
                .collect(),
            povs: (0..state.povs.len())
                .map(|i| self.read_pov(registry, id, i))
                .collect(),
        })
    }

    /// Gated records for every registered controller, in id order.
    #[must_use]
    pub fn gated_all(&self, registry: &ControllerRegistry) -> Vec<GatedController> {
        (0..registry.count())
            .filter_map(|id| self.gated_controller(registry, id))
            .collect()
    }
}
