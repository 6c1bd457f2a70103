//! # Input Context
//!
//! Owns the controller registry and the safety gate, and exposes the
//! operations the rest of the driver station calls.
//!
//! Encoding always goes through the gate. The dashboard read path,
//! [`InputContext::all_controller_data`], deliberately does not: it shows the
//! true physical state even while disarmed.
//!
//! ```
//! use frc_ds_joystick::context::InputContext;
//! use frc_ds_joystick::joystick::source::SimulatedController;
//!
//! let mut ctx = InputContext::new();
//! let mut pad = SimulatedController::new(0, "Pad", 2, 3);
//! pad.set_axis(0, 1.0);
//! ctx.add_controller(Box::new(pad));
//! ctx.poll();
//!
//! // Disarmed: neutral on the wire, real values on the dashboard
//! assert_eq!(ctx.encode_packet()[3], 0x00);
//! assert_eq!(ctx.all_controller_data()[0].axes[0], 1.0);
//! ```

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::joystick::registry::{AddOutcome, ControllerRegistry, Disconnect};
use crate::joystick::source::RawController;
use crate::joystick::state::ControllerState;
use crate::safety::{GatedController, SafetyGate};
use crate::wire::encoder::encode_packet;

/// Timestamped dashboard view of every controller.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    /// When the snapshot was taken.
    pub captured_at: DateTime<Utc>,
    /// Whether joystick output is armed.
    pub armed: bool,
    /// Raw controller states in id order.
    pub controllers: Vec<ControllerState>,
}

/// Registry plus safety gate, owned by the poll driver.
#[derive(Debug, Default)]
pub struct InputContext {
    registry: ControllerRegistry,
    gate: SafetyGate,
}

impl InputContext {
    /// Creates an empty, disarmed context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller. See [`ControllerRegistry::add_controller`].
    pub fn add_controller(&mut self, source: Box<dyn RawController>) -> AddOutcome {
        let had_virtual = self.registry.virtual_id().is_some();
        let outcome = self.registry.add_controller(source);
        if let (AddOutcome::Added(id), true) = (outcome, had_virtual) {
            // The virtual controller moved up one id
            self.gate.controller_inserted(id);
        }
        outcome
    }

    /// Unregisters the controller with `hardware_index`.
    ///
    /// Returns true if it was registered.
    pub fn remove_controller(&mut self, hardware_index: usize) -> bool {
        match self.registry.remove_controller(hardware_index) {
            Some(id) => {
                self.gate.controller_removed(id);
                true
            }
            None => false,
        }
    }

    /// Enables or disables the keyboard virtual controller.
    pub fn set_virtual_enabled(&mut self, enabled: bool) -> Option<usize> {
        let before = self.registry.virtual_id();
        let after = self.registry.set_virtual_enabled(enabled);
        if let (Some(id), None) = (before, after) {
            self.gate.controller_removed(id);
        }
        after
    }

    /// Forwards a key press to the virtual controller, if enabled.
    pub fn key_down(&mut self, key: &str) {
        if let Some(keyboard) = self.registry.virtual_keyboard_mut() {
            keyboard.key_down(key);
        }
    }

    /// Forwards a key release to the virtual controller, if enabled.
    pub fn key_up(&mut self, key: &str) {
        if let Some(keyboard) = self.registry.virtual_keyboard_mut() {
            keyboard.key_up(key);
        }
    }

    /// Releases every held key on the virtual controller, if enabled.
    pub fn release_keys(&mut self) {
        if let Some(keyboard) = self.registry.virtual_keyboard_mut() {
            keyboard.release_all();
        }
    }

    /// Sets the armed flag from the robot status feed.
    pub fn set_armed(&mut self, armed: bool) {
        self.gate.set_armed(armed);
    }

    /// Whether joystick output is armed.
    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.gate.is_armed()
    }

    /// Blacklists or restores controller `id`.
    pub fn set_blacklisted(&mut self, id: usize, blacklisted: bool) {
        self.gate.set_blacklisted(id, blacklisted);
    }

    /// Disarms after losing the robot status feed.
    pub fn link_lost(&mut self) {
        self.gate.link_lost();
    }

    /// Samples every controller. Unplugged sources are removed.
    pub fn poll(&mut self) -> Vec<Disconnect> {
        let lost = self.registry.poll();
        for disconnect in lost.iter().rev() {
            self.gate.controller_removed(disconnect.id);
        }
        lost
    }

    /// Gated axis read.
    #[must_use]
    pub fn read_axis(&self, id: usize, axis: usize) -> f32 {
        self.gate.read_axis(&self.registry, id, axis)
    }

    /// Gated button read.
    #[must_use]
    pub fn read_button(&self, id: usize, button: usize) -> bool {
        self.gate.read_button(&self.registry, id, button)
    }

    /// Gated POV read.
    #[must_use]
    pub fn read_pov(&self, id: usize, pov: usize) -> i16 {
        self.gate.read_pov(&self.registry, id, pov)
    }

    /// Gated view of every controller.
    #[must_use]
    pub fn gated_controllers(&self) -> Vec<GatedController> {
        self.gate.gated_all(&self.registry)
    }

    /// Encodes the gated state of every controller.
    #[must_use]
    pub fn encode_packet(&self) -> Bytes {
        encode_packet(&self.gated_controllers())
    }

    /// Ungated controller states for display, blacklist flag filled in.
    #[must_use]
    pub fn all_controller_data(&self) -> Vec<ControllerState> {
        self.registry
            .states()
            .map(|state| ControllerState {
                blacklisted: self.gate.is_blacklisted(state.id),
                ..state.clone()
            })
            .collect()
    }

    /// Timestamped dashboard snapshot.
    #[must_use]
    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            captured_at: Utc::now(),
            armed: self.gate.is_armed(),
            controllers: self.all_controller_data(),
        }
    }

    /// Registered controllers, virtual included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.registry.count()
    }

    /// Subscribes to count-changed notifications.
    pub fn subscribe_count(&self) -> watch::Receiver<usize> {
        self.registry.subscribe()
    }

    /// Drops every controller and returns to the disarmed state.
    pub fn shutdown(&mut self) {
        debug!("Shutting down input context");
        self.registry.clear();
        self.gate.reset();
        info!("Input context shut down");
    }
}
