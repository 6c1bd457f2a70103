//! # Keyboard Virtual Controller
//!
//! A controller driven by key transitions instead of hardware.
//!
//! ## Key Map
//!
//! | Keys | Target |
//! |------|--------|
//! | `a` / `d` | Axis 0 (-1 / +1) |
//! | `w` / `s` | Axis 1 (-1 / +1) |
//! | `j` / `l` | Axis 2 (-1 / +1) |
//! | `i` / `k` | Axis 3 (-1 / +1) |
//! | `q` | Axis 4 (+1) |
//! | `e` | Axis 5 (+1) |
//! | `1`..`9`, `0` | Buttons 0..9 |
//! | `z`, `x` | Buttons 10, 11 |
//! | `ArrowUp`, `ArrowDown`, `ArrowLeft`, `ArrowRight` | Buttons 12..15 (d-pad) |
//!
//! Key state updates immediately on every transition; the registry only picks
//! it up on the next poll tick.

use std::collections::HashSet;

use tracing::trace;

use super::normalize::RawButton;
use super::source::RawController;
use super::state::{MAX_AXES, MAX_BUTTONS};

/// Hardware index reported by the virtual controller.
pub const VIRTUAL_HARDWARE_INDEX: usize = usize::MAX;

/// Display name of the virtual controller.
pub const VIRTUAL_CONTROLLER_NAME: &str = "Keyboard";

/// Negative and positive key for each axis. `None` means the axis only moves
/// one way.
const AXIS_KEYS: [(Option<&str>, &str); MAX_AXES] = [
    (Some("a"), "d"),
    (Some("w"), "s"),
    (Some("j"), "l"),
    (Some("i"), "k"),
    (None, "q"),
    (None, "e"),
];

const BUTTON_KEYS: [&str; MAX_BUTTONS] = [
    "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "z", "x",
    "arrowup", "arrowdown", "arrowleft", "arrowright",
];

/// Keyboard-driven controller with a fixed key map.
///
/// # Examples
///
/// ```
/// use frc_ds_joystick::joystick::keyboard::VirtualKeyboard;
/// use frc_ds_joystick::joystick::source::RawController;
///
/// let mut kb = VirtualKeyboard::new();
/// kb.key_down("d");
/// assert_eq!(kb.axis(0), Some(1.0));
/// kb.key_up("d");
/// assert_eq!(kb.axis(0), Some(0.0));
/// ```
#[derive(Debug, Default, Clone)]
pub struct VirtualKeyboard {
    held: HashSet<String>,
}

impl VirtualKeyboard {
    /// Creates a keyboard with nothing held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a key press. Returns true if the key is mapped.
    pub fn key_down(&mut self, key: &str) -> bool {
        let key = canonical_key(key);
        if !is_mapped(&key) {
            return false;
        }
        trace!("Virtual key down: {}", key);
        self.held.insert(key);
        true
    }

    /// Records a key release. Returns true if the key is mapped.
    pub fn key_up(&mut self, key: &str) -> bool {
        let key = canonical_key(key);
        if !is_mapped(&key) {
            return false;
        }
        trace!("Virtual key up: {}", key);
        self.held.remove(&key);
        true
    }

    /// Releases every key.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    fn is_held(&self, key: &str) -> bool {
        self.held.contains(key)
    }
}

/// Keys compare case-insensitively.
fn canonical_key(key: &str) -> String {
    key.to_ascii_lowercase()
}

fn is_mapped(key: &str) -> bool {
    BUTTON_KEYS.contains(&key)
        || AXIS_KEYS
            .iter()
            .any(|(neg, pos)| *pos == key || *neg == Some(key))
}

impl RawController for VirtualKeyboard {
    fn hardware_index(&self) -> usize {
        VIRTUAL_HARDWARE_INDEX
    }

    fn name(&self) -> &str {
        VIRTUAL_CONTROLLER_NAME
    }

    fn axis_count(&self) -> usize {
        MAX_AXES
    }

    fn axis(&self, index: usize) -> Option<f32> {
        let (neg, pos) = AXIS_KEYS.get(index)?;
        let mut value = 0.0;
        if neg.is_some_and(|k| self.is_held(k)) {
            value -= 1.0;
        }
        if self.is_held(pos) {
            value += 1.0;
        }
        Some(value)
    }

    fn button_count(&self) -> usize {
        MAX_BUTTONS
    }

    fn button(&self, index: usize) -> Option<RawButton> {
        BUTTON_KEYS
            .get(index)
            .map(|key| RawButton::digital(self.is_held(key)))
    }
}
