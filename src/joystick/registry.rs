//! # Controller Registry
//!
//! Owns the connected controllers and their dense ids.
//!
//! Physical controllers occupy ids `0..n` in connection order. The keyboard
//! virtual controller, when enabled, always takes the next id after them and
//! shares the [`MAX_CONTROLLERS`] budget.
//!
//! Every membership change re-indexes the remaining controllers and publishes
//! the new count on a `tokio::sync::watch` channel.

use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::keyboard::{VirtualKeyboard, VIRTUAL_CONTROLLER_NAME};
use super::source::{sample_into, RawController};
use super::state::ControllerState;

/// Maximum number of registered controllers, virtual included.
pub const MAX_CONTROLLERS: usize = 6;

/// Result of [`ControllerRegistry::add_controller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Registered under this id.
    Added(usize),
    /// The hardware index was already registered under this id.
    AlreadyPresent(usize),
    /// The registry is full; the controller was dropped.
    Rejected,
}

/// A controller removed during [`ControllerRegistry::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Disconnect {
    /// Id the controller held before removal.
    pub id: usize,
    /// Platform index of the device.
    pub hardware_index: usize,
}

#[derive(Debug)]
struct Slot {
    source: Box<dyn RawController>,
    state: ControllerState,
}

#[derive(Debug)]
struct VirtualSlot {
    keyboard: VirtualKeyboard,
    state: ControllerState,
}

/// Registry of connected controllers.
///
/// Not synchronized; the poll driver is its only owner.
///
/// # Examples
///
/// ```
/// use frc_ds_joystick::joystick::registry::{AddOutcome, ControllerRegistry};
/// use frc_ds_joystick::joystick::source::SimulatedController;
///
/// let mut registry = ControllerRegistry::new();
/// let outcome = registry.add_controller(Box::new(SimulatedController::new(3, "Pad", 2, 10)));
/// assert_eq!(outcome, AddOutcome::Added(0));
/// assert_eq!(registry.count(), 1);
/// ```
#[derive(Debug)]
pub struct ControllerRegistry {
    physical: Vec<Slot>,
    virtual_pad: Option<VirtualSlot>,
    count_tx: watch::Sender<usize>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ControllerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            physical: Vec::new(),
            virtual_pad: None,
            count_tx,
        }
    }

    /// Registered controllers, virtual included.
    #[must_use]
    pub fn count(&self) -> usize {
        self.physical.len() + usize::from(self.virtual_pad.is_some())
    }

    /// Registered physical controllers.
    #[must_use]
    pub fn physical_count(&self) -> usize {
        self.physical.len()
    }

    /// Subscribes to count-changed notifications.
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }

    /// Registers a controller.
    ///
    /// Re-adding a known hardware index is a no-op. A full registry rejects
    /// the controller with a warning rather than failing.
    pub fn add_controller(&mut self, source: Box<dyn RawController>) -> AddOutcome {
        let hardware_index = source.hardware_index();

        if let Some(id) = self.find(hardware_index) {
            debug!("Controller {} already registered as {}", hardware_index, id);
            return AddOutcome::AlreadyPresent(id);
        }

        if self.count() >= MAX_CONTROLLERS {
            warn!(
                "Ignoring controller '{}': registry full ({} controllers)",
                source.name(),
                MAX_CONTROLLERS
            );
            return AddOutcome::Rejected;
        }

        let id = self.physical.len();
        let mut state = ControllerState::new(id, source.name());
        sample_into(source.as_ref(), &mut state);
        info!("Controller '{}' connected as id {}", state.name, id);

        self.physical.push(Slot { source, state });
        self.reindex();
        self.notify();
        AddOutcome::Added(id)
    }

    /// Removes the controller with `hardware_index`.
    ///
    /// Returns the id it held, or `None` if it was not registered.
    pub fn remove_controller(&mut self, hardware_index: usize) -> Option<usize> {
        let id = self.find(hardware_index)?;
        let slot = self.physical.remove(id);
        info!("Controller '{}' (id {}) disconnected", slot.state.name, id);

        self.reindex();
        self.notify();
        Some(id)
    }

    /// Enables or disables the keyboard virtual controller.
    ///
    /// Returns the virtual controller's id when enabled, `None` when disabled
    /// or when the registry has no free slot.
    pub fn set_virtual_enabled(&mut self, enabled: bool) -> Option<usize> {
        match (enabled, self.virtual_pad.is_some()) {
            (true, true) => self.virtual_id(),
            (true, false) => {
                if self.count() >= MAX_CONTROLLERS {
                    warn!("Cannot enable keyboard controller: registry full");
                    return None;
                }
                let id = self.physical.len();
                self.virtual_pad = Some(VirtualSlot {
                    keyboard: VirtualKeyboard::new(),
                    state: ControllerState::new(id, VIRTUAL_CONTROLLER_NAME),
                });
                info!("Keyboard controller enabled as id {}", id);
                self.notify();
                Some(id)
            }
            (false, true) => {
                self.virtual_pad = None;
                info!("Keyboard controller disabled");
                self.notify();
                None
            }
            (false, false) => None,
        }
    }

    /// Id of the virtual controller, if enabled.
    #[must_use]
    pub fn virtual_id(&self) -> Option<usize> {
        self.virtual_pad.as_ref().map(|v| v.state.id)
    }

    /// Mutable access to the virtual keyboard for key transitions.
    pub fn virtual_keyboard_mut(&mut self) -> Option<&mut VirtualKeyboard> {
        self.virtual_pad.as_mut().map(|v| &mut v.keyboard)
    }

    /// Refreshes every source and re-samples its state.
    ///
    /// Sources whose refresh fails are treated as unplugged and removed.
    pub fn poll(&mut self) -> Vec<Disconnect> {
        let mut lost = Vec::new();
        for slot in &mut self.physical {
            match slot.source.refresh() {
                Ok(()) => sample_into(slot.source.as_ref(), &mut slot.state),
                Err(e) => {
                    warn!("Lost controller '{}': {}", slot.state.name, e);
                    lost.push(Disconnect {
                        id: slot.state.id,
                        hardware_index: slot.source.hardware_index(),
                    });
                }
            }
        }

        // Remove highest id first so the recorded ids stay valid
        for disconnect in lost.iter().rev() {
            self.physical.remove(disconnect.id);
        }
        if !lost.is_empty() {
            self.reindex();
            self.notify();
        }

        if let Some(pad) = &mut self.virtual_pad {
            sample_into(&pad.keyboard, &mut pad.state);
        }

        lost
    }

    /// Raw, ungated state of controller `id`.
    #[must_use]
    pub fn state(&self, id: usize) -> Option<&ControllerState> {
        if let Some(slot) = self.physical.get(id) {
            return Some(&slot.state);
        }
        self.virtual_pad
            .as_ref()
            .filter(|v| v.state.id == id)
            .map(|v| &v.state)
    }

    /// All raw states in id order.
    pub fn states(&self) -> impl Iterator<Item = &ControllerState> {
        self.physical
            .iter()
            .map(|slot| &slot.state)
            .chain(self.virtual_pad.as_ref().map(|v| &v.state))
    }

    /// Removes every controller, virtual included.
    pub fn clear(&mut self) {
        if self.count() == 0 {
            return;
        }
        self.physical.clear();
        self.virtual_pad = None;
        info!("All controllers cleared");
        self.notify();
    }

    fn find(&self, hardware_index: usize) -> Option<usize> {
        self.physical
            .iter()
            .position(|slot| slot.source.hardware_index() == hardware_index)
    }

    fn reindex(&mut self) {
        for (id, slot) in self.physical.iter_mut().enumerate() {
            slot.state.id = id;
        }
        if let Some(pad) = &mut self.virtual_pad {
            pad.state.id = self.physical.len();
        }
    }

    fn notify(&self) {
        self.count_tx.send_replace(self.count());
    }
}
