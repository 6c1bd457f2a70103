//! # Linux evdev Sources
//!
//! Physical gamepads and keyboards read through the Linux evdev interface.
//!
//! ## Gamepad Layout
//!
//! Axes are taken from the device in this order, skipping ones it lacks:
//! `ABS_X`, `ABS_Y`, `ABS_RX`, `ABS_RY`, `ABS_Z`, `ABS_RZ`. Each is normalized
//! from the device's reported range to `[-1.0, 1.0]`.
//!
//! Buttons follow the FRC sixteen-button order:
//!
//! | Slot | evdev Code |
//! |------|------------|
//! | 0-3 | BTN_SOUTH, BTN_EAST, BTN_NORTH, BTN_WEST |
//! | 4-5 | BTN_TL, BTN_TR |
//! | 6-7 | BTN_SELECT, BTN_START |
//! | 8-9 | BTN_THUMBL, BTN_THUMBR |
//! | 10-11 | BTN_TL2, BTN_TR2 |
//! | 12-15 | D-pad up/down/left/right (hat switch or BTN_DPAD_*) |

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use evdev::{AbsoluteAxisType, Device, InputEventKind, Key};
use tracing::{debug, info, warn};

use super::normalize::{
    RawButton, DPAD_DOWN_BUTTON, DPAD_LEFT_BUTTON, DPAD_RIGHT_BUTTON, DPAD_UP_BUTTON,
};
use super::source::RawController;
use super::state::{MAX_AXES, MAX_BUTTONS};
use crate::error::{JoystickError, Result};

const AXIS_ORDER: [AbsoluteAxisType; MAX_AXES] = [
    AbsoluteAxisType::ABS_X,
    AbsoluteAxisType::ABS_Y,
    AbsoluteAxisType::ABS_RX,
    AbsoluteAxisType::ABS_RY,
    AbsoluteAxisType::ABS_Z,
    AbsoluteAxisType::ABS_RZ,
];

const BUTTON_ORDER: [Key; 12] = [
    Key::BTN_SOUTH,
    Key::BTN_EAST,
    Key::BTN_NORTH,
    Key::BTN_WEST,
    Key::BTN_TL,
    Key::BTN_TR,
    Key::BTN_SELECT,
    Key::BTN_START,
    Key::BTN_THUMBL,
    Key::BTN_THUMBR,
    Key::BTN_TL2,
    Key::BTN_TR2,
];

/// Range of one absolute axis as reported by the kernel.
#[derive(Debug, Clone, Copy)]
struct AxisRange {
    axis: AbsoluteAxisType,
    minimum: i32,
    maximum: i32,
}

/// Maps a raw absolute value onto `[-1.0, 1.0]`.
///
/// A degenerate range reads as centered.
#[must_use]
pub fn normalize_abs(value: i32, minimum: i32, maximum: i32) -> f32 {
    if maximum <= minimum {
        return 0.0;
    }
    let span = (maximum as f64) - (minimum as f64);
    let scaled = ((value as f64) - (minimum as f64)) / span * 2.0 - 1.0;
    scaled.clamp(-1.0, 1.0) as f32
}

/// Extracts `N` from an `/dev/input/eventN` path.
#[must_use]
pub fn hardware_index_from_path(path: &Path) -> Option<usize> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Returns true if the device looks like a gamepad or joystick.
fn is_gamepad(device: &Device) -> bool {
    let has_buttons = device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::BTN_SOUTH) || keys.contains(Key::BTN_TRIGGER));
    let has_stick = device
        .supported_absolute_axes()
        .is_some_and(|axes| axes.contains(AbsoluteAxisType::ABS_X));
    has_buttons && has_stick
}

/// A gamepad opened through evdev.
///
/// Readings are cached by [`RawController::refresh`]; the readers never touch
/// the device.
pub struct EvdevGamepad {
    device: Device,
    path: PathBuf,
    hardware_index: usize,
    name: String,
    ranges: Vec<AxisRange>,
    axes: Vec<f32>,
    buttons: [bool; MAX_BUTTONS],
}

impl std::fmt::Debug for EvdevGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevGamepad")
            .field("path", &self.path)
            .field("hardware_index", &self.hardware_index)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl EvdevGamepad {
    /// Opens the device at `path` if it is a gamepad.
    ///
    /// # Errors
    ///
    /// - `Io`: the device could not be opened
    /// - `ControllerNotFound`: the device is not a gamepad or has no event index
    pub fn open(path: &Path) -> Result<Self> {
        let hardware_index =
            hardware_index_from_path(path).ok_or(JoystickError::ControllerNotFound)?;
        let device = Device::open(path)?;

        if !is_gamepad(&device) {
            return Err(JoystickError::ControllerNotFound);
        }

        let abs_state = device
            .get_abs_state()
            .map_err(|e| JoystickError::Controller(format!("Failed to read axes: {}", e)))?;

        let ranges: Vec<AxisRange> = match device.supported_absolute_axes() {
            Some(supported) => AXIS_ORDER
                .iter()
                .copied()
                .filter(|&axis| supported.contains(axis))
                .map(|axis| {
                    let info = abs_state[axis.0 as usize];
                    AxisRange {
                        axis,
                        minimum: info.minimum,
                        maximum: info.maximum,
                    }
                })
                .collect(),
            None => Vec::new(),
        };

        let name = device.name().unwrap_or("Gamepad").to_string();
        info!(
            "Opened gamepad '{}' at {} ({} axes)",
            name,
            path.display(),
            ranges.len()
        );

        let mut gamepad = Self {
            device,
            path: path.to_path_buf(),
            hardware_index,
            name,
            axes: vec![0.0; ranges.len()],
            ranges,
            buttons: [false; MAX_BUTTONS],
        };
        gamepad.refresh()?;
        Ok(gamepad)
    }

    /// Device node this gamepad was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RawController for EvdevGamepad {
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
        MAX_BUTTONS
    }

    fn button(&self, index: usize) -> Option<RawButton> {
        self.buttons.get(index).map(|&b| RawButton::digital(b))
    }

    fn refresh(&mut self) -> Result<()> {
        let abs_state = self.device.get_abs_state().map_err(|e| {
            JoystickError::Controller(format!("{}: {}", self.path.display(), e))
        })?;
        let keys = self.device.get_key_state().map_err(|e| {
            JoystickError::Controller(format!("{}: {}", self.path.display(), e))
        })?;

        for (slot, range) in self.axes.iter_mut().zip(&self.ranges) {
            let value = abs_state[range.axis.0 as usize].value;
            *slot = normalize_abs(value, range.minimum, range.maximum);
        }

        for (slot, key) in self.buttons.iter_mut().zip(BUTTON_ORDER) {
            *slot = keys.contains(key);
        }

        let hat_x = abs_state[AbsoluteAxisType::ABS_HAT0X.0 as usize].value;
        let hat_y = abs_state[AbsoluteAxisType::ABS_HAT0Y.0 as usize].value;
        self.buttons[DPAD_UP_BUTTON] = hat_y < 0 || keys.contains(Key::BTN_DPAD_UP);
        self.buttons[DPAD_DOWN_BUTTON] = hat_y > 0 || keys.contains(Key::BTN_DPAD_DOWN);
        self.buttons[DPAD_LEFT_BUTTON] = hat_x < 0 || keys.contains(Key::BTN_DPAD_LEFT);
        self.buttons[DPAD_RIGHT_BUTTON] = hat_x > 0 || keys.contains(Key::BTN_DPAD_RIGHT);

        Ok(())
    }
}

/// Watches an input directory for gamepads appearing and disappearing.
///
/// # Examples
///
/// ```no_run
/// use frc_ds_joystick::joystick::evdev::HotplugMonitor;
///
/// let mut monitor = HotplugMonitor::new("/dev/input");
/// for gamepad in monitor.scan()? {
///     println!("New gamepad at {}", gamepad.path().display());
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct HotplugMonitor {
    dir: PathBuf,
    known: HashSet<PathBuf>,
}

impl HotplugMonitor {
    /// Creates a monitor for `dir` with nothing seen yet.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            known: HashSet::new(),
        }
    }

    /// Returns gamepads attached since the previous scan.
    ///
    /// Paths that no longer exist are forgotten so a replug is reported again.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the directory cannot be listed.
    pub fn scan(&mut self) -> Result<Vec<EvdevGamepad>> {
        self.known.retain(|path| path.exists());

        let mut entries: Vec<PathBuf> = std::fs::read_dir(&self.dir)
            .map_err(|e| {
                JoystickError::Controller(format!("Failed to read {}: {}", self.dir.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| hardware_index_from_path(path).is_some())
            .collect();

        // Deterministic order when several pads appear at once
        entries.sort();

        let mut found = Vec::new();
        for path in entries {
            if self.known.contains(&path) {
                continue;
            }

            match EvdevGamepad::open(&path) {
                Ok(gamepad) => {
                    self.known.insert(path);
                    found.push(gamepad);
                }
                Err(JoystickError::ControllerNotFound) => {
                    // Not a gamepad; remember it so it is not reopened every scan
                    self.known.insert(path);
                }
                Err(e) => {
                    debug!("Could not open {}: {}", path.display(), e);
                }
            }
        }

        Ok(found)
    }

    /// Forgets the node for `hardware_index` so the next scan offers it again.
    ///
    /// Called when the registry rejected or dropped the gamepad; the node may
    /// still exist, so the existence check alone would never re-offer it.
    pub fn forget(&mut self, hardware_index: usize) {
        self.known
            .retain(|path| hardware_index_from_path(path) != Some(hardware_index));
    }
}

/// A key press or release from a physical keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyTransition {
    /// Key identifier as understood by the virtual controller.
    pub key: &'static str,
    /// True on press, false on release.
    pub pressed: bool,
}

/// Translates an evdev key to the identifier used by the virtual controller.
#[must_use]
pub fn key_identifier(key: Key) -> Option<&'static str> {
    let id = match key {
        Key::KEY_A => "a",
        Key::KEY_D => "d",
        Key::KEY_W => "w",
        Key::KEY_S => "s",
        Key::KEY_J => "j",
        Key::KEY_L => "l",
        Key::KEY_I => "i",
        Key::KEY_K => "k",
        Key::KEY_Q => "q",
        Key::KEY_E => "e",
        Key::KEY_Z => "z",
        Key::KEY_X => "x",
        Key::KEY_1 => "1",
        Key::KEY_2 => "2",
        Key::KEY_3 => "3",
        Key::KEY_4 => "4",
        Key::KEY_5 => "5",
        Key::KEY_6 => "6",
        Key::KEY_7 => "7",
        Key::KEY_8 => "8",
        Key::KEY_9 => "9",
        Key::KEY_0 => "0",
        Key::KEY_UP => "ArrowUp",
        Key::KEY_DOWN => "ArrowDown",
        Key::KEY_LEFT => "ArrowLeft",
        Key::KEY_RIGHT => "ArrowRight",
        _ => return None,
    };
    Some(id)
}

/// A physical keyboard feeding the virtual controller.
pub struct EvdevKeyboard {
    device: Device,
    path: PathBuf,
}

impl std::fmt::Debug for EvdevKeyboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvdevKeyboard")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl EvdevKeyboard {
    /// Opens the keyboard at `path`.
    ///
    /// # Errors
    ///
    /// - `Io`: the device could not be opened
    /// - `ControllerNotFound`: the device reports no letter keys
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let device = Device::open(&path)?;

        let is_keyboard = device
            .supported_keys()
            .is_some_and(|keys| keys.contains(Key::KEY_A));
        if !is_keyboard {
            warn!("{} does not look like a keyboard", path.display());
            return Err(JoystickError::ControllerNotFound);
        }

        info!("Opened keyboard at {}", path.display());
        Ok(Self { device, path })
    }

    /// Blocks until events arrive and returns the mapped key transitions.
    ///
    /// Auto-repeat events are dropped.
    ///
    /// # Errors
    ///
    /// Returns `Controller` if the device stops delivering events.
    pub fn fetch_transitions(&mut self) -> Result<Vec<KeyTransition>> {
        let events = self
            .device
            .fetch_events()
            .map_err(|e| JoystickError::Controller(format!("Failed to fetch events: {}", e)))?;

        Ok(events
            .filter_map(|event| match event.kind() {
                InputEventKind::Key(key) if event.value() != 2 => {
                    key_identifier(key).map(|id| KeyTransition {
                        key: id,
                        pressed: event.value() == 1,
                    })
                }
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_abs_full_range() {
        assert_eq!(normalize_abs(0, 0, 255), -1.0);
        assert_eq!(normalize_abs(255, 0, 255), 1.0);
        assert!(normalize_abs(128, 0, 255).abs() < 0.01);
    }

    #[test]
    fn test_normalize_abs_signed_range() {
        assert_eq!(normalize_abs(-32768, -32768, 32767), -1.0);
        assert_eq!(normalize_abs(32767, -32768, 32767), 1.0);
    }

    #[test]
    fn test_normalize_abs_out_of_range_clamps() {
        assert_eq!(normalize_abs(300, 0, 255), 1.0);
        assert_eq!(normalize_abs(-5, 0, 255), -1.0);
    }

    #[test]
    fn test_normalize_abs_degenerate_range() {
        assert_eq!(normalize_abs(10, 5, 5), 0.0);
        assert_eq!(normalize_abs(10, 9, 1), 0.0);
    }

    #[test]
    fn test_hardware_index_from_path() {
        assert_eq!(hardware_index_from_path(Path::new("/dev/input/event7")), Some(7));
        assert_eq!(hardware_index_from_path(Path::new("/dev/input/event12")), Some(12));
        assert_eq!(hardware_index_from_path(Path::new("/dev/input/js0")), None);
        assert_eq!(hardware_index_from_path(Path::new("/dev/input/mice")), None);
        assert_eq!(hardware_index_from_path(Path::new("/dev/input/eventX")), None);
    }

    #[test]
    fn test_key_identifier() {
        assert_eq!(key_identifier(Key::KEY_W), Some("w"));
        assert_eq!(key_identifier(Key::KEY_0), Some("0"));
        assert_eq!(key_identifier(Key::KEY_UP), Some("ArrowUp"));
        assert_eq!(key_identifier(Key::KEY_ESC), None);
    }

    #[test]
    fn test_button_order_leaves_dpad_slots() {
        assert_eq!(BUTTON_ORDER.len(), DPAD_UP_BUTTON);
        assert_eq!(DPAD_RIGHT_BUTTON, MAX_BUTTONS - 1);
    }

    #[test]
    fn test_scan_missing_directory() {
        let mut monitor = HotplugMonitor::new("/nonexistent/input/dir");
        assert!(monitor.scan().is_err());
    }

    #[test]
    fn test_scan_ignores_non_event_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("mice"), b"").unwrap();
        std::fs::write(dir.path().join("js0"), b"").unwrap();

        let mut monitor = HotplugMonitor::new(dir.path());
        let found = monitor.scan().unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_forget_reoffers_existing_node() {
        let dir = tempfile::tempdir().unwrap();
        let event20 = dir.path().join("event20");
        let event21 = dir.path().join("event21");
        std::fs::write(&event20, b"").unwrap();
        std::fs::write(&event21, b"").unwrap();

        let mut monitor = HotplugMonitor::new(dir.path());
        monitor.known.insert(event20.clone());
        monitor.known.insert(event21.clone());

        // Node still exists, so a scan alone keeps it known
        monitor.scan().unwrap();
        assert!(monitor.known.contains(&event20));

        monitor.forget(20);
        assert!(!monitor.known.contains(&event20));
        assert!(monitor.known.contains(&event21));

        // Unknown index is a no-op
        monitor.forget(99);
        assert!(monitor.known.contains(&event21));
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_scan_with_real_hardware() {
        let mut monitor = HotplugMonitor::new("/dev/input");
        let found = monitor.scan().unwrap();
        assert!(!found.is_empty(), "Should detect a connected gamepad");

        // A second scan reports nothing new
        assert!(monitor.scan().unwrap().is_empty());
    }
}
